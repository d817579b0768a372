//! The IR node model.
//!
//! Nodes are produced by an external syntax-tree converter and form a
//! directed dependency graph (not necessarily acyclic: `write_node`
//! back-references can close cycles for self-referential code). Each node
//! carries a scope-qualified, content-addressable key used for memoization
//! and location indexing.
//!
//! The node kind is a closed sum type matched exhaustively everywhere in
//! the resolver, so adding a variant is a forced compile error rather than
//! a silently ignored runtime case.

use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use mallard_common::SourceLoc;

use crate::sig::ParamKind;
use crate::ty::Ty;

/// Scope-qualified node identity: `"{scope}:{hash:016x}"`.
///
/// The scope is the qualifying context ("Foo::Bar#baz"); the hash is the
/// shallow structural hash of the node. This is the key for memoization,
/// the arena, and the location index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(pub String);

impl NodeKey {
    pub fn new(scope: &str, hash: u64) -> Self {
        NodeKey(format!("{scope}:{hash:016x}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle into the arena-owned called-methods sets.
///
/// Evidence is shared: the declaring `Param` and every read-site aliasing
/// the same variable reference one set, owned by the arena. Written only
/// during the conversion pass, frozen thereafter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodSetId(pub u32);

/// One syntactic construct in the dependency graph.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A literal with its carried type.
    Literal { ty: Ty },
    /// `x = <value>`.
    LocalWrite { name: String, value: Option<NodeKey> },
    /// A read of a local variable, back-linked to its write.
    LocalRead {
        name: String,
        write_node: Option<NodeKey>,
        called: Option<MethodSetId>,
    },
    /// `@x = <value>` inside `class_name`.
    InstanceVariableWrite {
        name: String,
        class_name: String,
        value: Option<NodeKey>,
    },
    /// A read of `@x`; falls back to the registry when the write is absent.
    InstanceVariableRead {
        name: String,
        class_name: String,
        write_node: Option<NodeKey>,
    },
    /// `@@x = <value>` inside `class_name`.
    ClassVariableWrite {
        name: String,
        class_name: String,
        value: Option<NodeKey>,
    },
    /// A read of `@@x`; class variables never traverse ancestors.
    ClassVariableRead {
        name: String,
        class_name: String,
        write_node: Option<NodeKey>,
    },
    /// A method parameter, with duck-typing evidence accumulated by the
    /// converter.
    Param {
        name: String,
        kind: ParamKind,
        default_value: Option<NodeKey>,
        called: MethodSetId,
    },
    /// A constant reference or definition.
    Constant { name: String, dependency: Option<NodeKey> },
    /// A method call. A missing receiver is the implicit top-level object.
    Call {
        receiver: Option<NodeKey>,
        method: String,
        positional: Vec<NodeKey>,
        keywords: Vec<(String, NodeKey)>,
    },
    /// The `index`-th block parameter of the enclosing call.
    BlockParamSlot { call: NodeKey, index: u32 },
    /// Join point of sibling branches.
    Merge { branches: Vec<NodeKey> },
    /// `lhs || rhs` (and `||=`) short-circuit.
    Or { lhs: NodeKey, rhs: NodeKey },
    /// A method definition.
    Def {
        name: String,
        class_name: String,
        singleton: bool,
        params: Vec<NodeKey>,
        return_node: Option<NodeKey>,
    },
    /// A class or module body.
    ClassModule { name: String, body: Option<NodeKey> },
    /// `self` inside `class_name`.
    SelfRef { class_name: String },
    /// An explicit `return`; bare `return` yields nil.
    Return { value: Option<NodeKey> },
}

/// An immutable IR node: kind, qualifying scope, optional source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub scope: String,
    pub loc: Option<SourceLoc>,
}

impl Node {
    pub fn new(kind: NodeKind, scope: impl Into<String>, loc: Option<SourceLoc>) -> Self {
        Self { kind, scope: scope.into(), loc }
    }

    /// The scope-qualified key identifying this node.
    pub fn key(&self) -> NodeKey {
        NodeKey::new(&self.scope, self.node_hash())
    }

    /// Shallow structural hash.
    ///
    /// Hashes the kind tag, scalar fields, source location, and *forward*
    /// dependency keys. `write_node` back-references are excluded: a
    /// content-addressed key cannot include a link to a node whose own key
    /// includes this node, and excluding them keeps keys computable for
    /// cyclic graphs.
    pub fn node_hash(&self) -> u64 {
        let mut h = FxHasher::default();
        self.loc.hash(&mut h);
        match &self.kind {
            NodeKind::Literal { ty } => {
                0u8.hash(&mut h);
                ty.hash(&mut h);
            }
            NodeKind::LocalWrite { name, value } => {
                1u8.hash(&mut h);
                name.hash(&mut h);
                value.hash(&mut h);
            }
            NodeKind::LocalRead { name, .. } => {
                2u8.hash(&mut h);
                name.hash(&mut h);
            }
            NodeKind::InstanceVariableWrite { name, class_name, value } => {
                3u8.hash(&mut h);
                name.hash(&mut h);
                class_name.hash(&mut h);
                value.hash(&mut h);
            }
            NodeKind::InstanceVariableRead { name, class_name, .. } => {
                4u8.hash(&mut h);
                name.hash(&mut h);
                class_name.hash(&mut h);
            }
            NodeKind::ClassVariableWrite { name, class_name, value } => {
                5u8.hash(&mut h);
                name.hash(&mut h);
                class_name.hash(&mut h);
                value.hash(&mut h);
            }
            NodeKind::ClassVariableRead { name, class_name, .. } => {
                6u8.hash(&mut h);
                name.hash(&mut h);
                class_name.hash(&mut h);
            }
            NodeKind::Param { name, kind, default_value, .. } => {
                7u8.hash(&mut h);
                name.hash(&mut h);
                (*kind as u8).hash(&mut h);
                default_value.hash(&mut h);
            }
            NodeKind::Constant { name, dependency } => {
                8u8.hash(&mut h);
                name.hash(&mut h);
                dependency.hash(&mut h);
            }
            NodeKind::Call { receiver, method, positional, keywords } => {
                9u8.hash(&mut h);
                receiver.hash(&mut h);
                method.hash(&mut h);
                positional.hash(&mut h);
                keywords.hash(&mut h);
            }
            NodeKind::BlockParamSlot { call, index } => {
                10u8.hash(&mut h);
                call.hash(&mut h);
                index.hash(&mut h);
            }
            NodeKind::Merge { branches } => {
                11u8.hash(&mut h);
                branches.hash(&mut h);
            }
            NodeKind::Or { lhs, rhs } => {
                12u8.hash(&mut h);
                lhs.hash(&mut h);
                rhs.hash(&mut h);
            }
            NodeKind::Def { name, class_name, singleton, params, return_node } => {
                13u8.hash(&mut h);
                name.hash(&mut h);
                class_name.hash(&mut h);
                singleton.hash(&mut h);
                params.hash(&mut h);
                return_node.hash(&mut h);
            }
            NodeKind::ClassModule { name, body } => {
                14u8.hash(&mut h);
                name.hash(&mut h);
                body.hash(&mut h);
            }
            NodeKind::SelfRef { class_name } => {
                15u8.hash(&mut h);
                class_name.hash(&mut h);
            }
            NodeKind::Return { value } => {
                16u8.hash(&mut h);
                value.hash(&mut h);
            }
        }
        h.finish()
    }

    /// The nodes this node should be inferred from: forward dependencies
    /// plus `write_node` back-references.
    pub fn dependencies(&self) -> Vec<NodeKey> {
        let mut deps = Vec::new();
        match &self.kind {
            NodeKind::Literal { .. } | NodeKind::SelfRef { .. } => {}
            NodeKind::LocalWrite { value, .. }
            | NodeKind::InstanceVariableWrite { value, .. }
            | NodeKind::ClassVariableWrite { value, .. }
            | NodeKind::Return { value } => deps.extend(value.clone()),
            NodeKind::LocalRead { write_node, .. }
            | NodeKind::InstanceVariableRead { write_node, .. }
            | NodeKind::ClassVariableRead { write_node, .. } => {
                deps.extend(write_node.clone())
            }
            NodeKind::Param { default_value, .. } => deps.extend(default_value.clone()),
            NodeKind::Constant { dependency, .. } => deps.extend(dependency.clone()),
            NodeKind::Call { receiver, positional, keywords, .. } => {
                deps.extend(receiver.clone());
                deps.extend(positional.iter().cloned());
                deps.extend(keywords.iter().map(|(_, k)| k.clone()));
            }
            NodeKind::BlockParamSlot { call, .. } => deps.push(call.clone()),
            NodeKind::Merge { branches } => deps.extend(branches.iter().cloned()),
            NodeKind::Or { lhs, rhs } => {
                deps.push(lhs.clone());
                deps.push(rhs.clone());
            }
            NodeKind::Def { params, return_node, .. } => {
                deps.extend(params.iter().cloned());
                deps.extend(return_node.clone());
            }
            NodeKind::ClassModule { body, .. } => deps.extend(body.clone()),
        }
        deps
    }

    /// Whether this node is an assignment (preferred by the location index
    /// tie-break over a same-positioned read).
    pub fn is_assignment(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::LocalWrite { .. }
                | NodeKind::InstanceVariableWrite { .. }
                | NodeKind::ClassVariableWrite { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mallard_common::{SourceLoc, Span};

    fn loc(line: u32, start: u32, end: u32) -> Option<SourceLoc> {
        Some(SourceLoc::new(start, line, Span::new(start, end)))
    }

    #[test]
    fn key_is_scope_qualified_and_stable() {
        let node = Node::new(
            NodeKind::LocalRead { name: "x".into(), write_node: None, called: None },
            "Foo#bar",
            loc(1, 1, 2),
        );
        let key = node.key();
        assert!(key.as_str().starts_with("Foo#bar:"));
        assert_eq!(key, node.key());
    }

    #[test]
    fn same_shape_different_scope_differs() {
        let kind = NodeKind::LocalRead { name: "x".into(), write_node: None, called: None };
        let a = Node::new(kind.clone(), "Foo#bar", loc(1, 1, 2));
        let b = Node::new(kind, "Foo#baz", loc(1, 1, 2));
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn write_node_backref_does_not_change_key() {
        let write_key = NodeKey::new("m", 42);
        let without = Node::new(
            NodeKind::LocalRead { name: "x".into(), write_node: None, called: None },
            "m",
            loc(2, 1, 2),
        );
        let with = Node::new(
            NodeKind::LocalRead {
                name: "x".into(),
                write_node: Some(write_key),
                called: None,
            },
            "m",
            loc(2, 1, 2),
        );
        assert_eq!(without.key(), with.key());
    }

    #[test]
    fn forward_deps_do_change_key() {
        let a = Node::new(NodeKind::Merge { branches: vec![NodeKey::new("m", 1)] }, "m", None);
        let b = Node::new(NodeKind::Merge { branches: vec![NodeKey::new("m", 2)] }, "m", None);
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn dependencies_include_backrefs() {
        let write_key = NodeKey::new("m", 7);
        let read = Node::new(
            NodeKind::LocalRead {
                name: "x".into(),
                write_node: Some(write_key.clone()),
                called: None,
            },
            "m",
            None,
        );
        assert_eq!(read.dependencies(), vec![write_key]);
    }

    #[test]
    fn assignment_classification() {
        let write = Node::new(NodeKind::LocalWrite { name: "x".into(), value: None }, "m", None);
        let read = Node::new(
            NodeKind::LocalRead { name: "x".into(), write_node: None, called: None },
            "m",
            None,
        );
        assert!(write.is_assignment());
        assert!(!read.is_assignment());
    }
}
