//! Gem-aware signature caching for the Mallard inference engine.
//!
//! Inferring types through a project's installed gems is expensive and the
//! answers change only when versions change. This crate makes it a
//! once-per-upgrade cost:
//! - [`lockfile`]: Gemfile.lock parsing into a pinned dependency graph
//! - [`partition`]: splitting indexed paths into per-gem groups vs project
//!   code
//! - [`fingerprint`]: digests of a package's transitive pinned versions
//! - [`extract`]: turning a package's registered defs into concrete
//!   signatures via inference
//! - [`cache`]: the per-package on-disk store, fingerprint-validated
//! - [`source`]: a [`SignatureSource`](mallard_typeck::source::SignatureSource)
//!   over merged cache records, plugged into the engine for warm sessions

pub mod cache;
pub mod extract;
pub mod fingerprint;
pub mod lockfile;
pub mod partition;
pub mod source;

pub use cache::{CacheRecord, CacheStore, CACHE_FORMAT_VERSION};
pub use extract::{extract_package, Extraction, PackageSignatures};
pub use fingerprint::fingerprint;
pub use lockfile::{LockedGem, Lockfile};
pub use partition::{partition, PackageFiles, Partition};
pub use source::CachedGemSource;
