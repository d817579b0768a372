use std::fmt;

use serde::Serialize;

/// An error returned by the engine's query APIs.
///
/// "Type not determined" is never an error -- the resolver answers that with
/// an `Unknown` result and a reason. These variants cover the cases where
/// the question itself cannot be answered: the file was never indexed, the
/// position does not map to a node, or a queried declaration does not exist
/// anywhere the engine can see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum QueryError {
    /// The file has no entries in the location index.
    FileNotIndexed(String),
    /// No node covers the given (line, column) position.
    PositionNotFound {
        file: Option<String>,
        line: u32,
        column: u32,
    },
    /// No definition or signature is known for the method.
    UnknownMethod { class: String, method: String },
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileNotIndexed(file) => write!(f, "file not indexed: {file}"),
            Self::PositionNotFound { file, line, column } => match file {
                Some(file) => write!(f, "no node at {file}:{line}:{column}"),
                None => write!(f, "no node at {line}:{column} in any indexed file"),
            },
            Self::UnknownMethod { class, method } => {
                write!(f, "no known method {class}#{method}")
            }
        }
    }
}

impl std::error::Error for QueryError {}

/// A violation of the IR contract the converter is supposed to uphold.
///
/// These are defects, not expected outcomes: the arena surfaces them loudly
/// instead of degrading to `Unknown`, because a broken node graph means the
/// upstream conversion pass is wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum IrError {
    /// Two structurally different nodes produced the same scope-qualified key.
    NodeKeyCollision { key: String },
    /// A write-node back-reference targets a key that is not in the arena.
    UnknownNode { key: String },
    /// A write-node patch targets a node that is not a read variant.
    NotAReadNode { key: String },
}

impl fmt::Display for IrError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeKeyCollision { key } => {
                write!(f, "node key collision between unrelated declarations: {key}")
            }
            Self::UnknownNode { key } => write!(f, "unknown node key: {key}"),
            Self::NotAReadNode { key } => {
                write!(f, "write-node patch target is not a read node: {key}")
            }
        }
    }
}

impl std::error::Error for IrError {}
