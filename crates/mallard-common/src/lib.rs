//! Shared foundation types for the Mallard inference engine.
//!
//! - [`span`]: byte-offset spans, source locations, line/column lookup
//! - [`error`]: typed errors for the query APIs and IR invariants

pub mod error;
pub mod span;

pub use error::{IrError, QueryError};
pub use span::{LineIndex, SourceLoc, Span};
