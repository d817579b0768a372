//! The node arena: owner of every IR node and every shared called-methods
//! set.
//!
//! Nodes are inserted once per file by the external converter and shared
//! read-only by the resolver and registries until their owning file is
//! removed. The arena is also where the two conversion-pass-only mutations
//! live: recording duck-typing evidence into a method set, and patching a
//! read node's `write_node` back-reference.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use mallard_common::IrError;

use crate::node::{MethodSetId, Node, NodeKey, NodeKind};

#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: FxHashMap<NodeKey, Node>,
    /// Keys contributed by each file, for exact per-file removal.
    by_file: FxHashMap<String, Vec<NodeKey>>,
    /// The owned called-methods sets, referenced by handle from nodes.
    method_sets: Vec<BTreeSet<String>>,
    /// Set handles contributed by each file; freed on removal.
    sets_by_file: FxHashMap<String, Vec<MethodSetId>>,
    /// Freed slots in `method_sets`, reused before growing the arena.
    free_sets: Vec<MethodSetId>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node owned by `file` and return its key.
    ///
    /// Re-inserting a structurally identical node is idempotent. A key
    /// collision between two different nodes is a defect in the upstream
    /// converter and is surfaced loudly rather than papered over.
    pub fn insert(&mut self, file: &str, node: Node) -> Result<NodeKey, IrError> {
        let key = node.key();
        if let Some(existing) = self.nodes.get(&key) {
            if *existing != node {
                return Err(IrError::NodeKeyCollision { key: key.0 });
            }
            return Ok(key);
        }
        self.by_file.entry(file.to_string()).or_default().push(key.clone());
        self.nodes.insert(key.clone(), node);
        Ok(key)
    }

    pub fn get(&self, key: &NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Patch the `write_node` back-reference of an already inserted read
    /// node. Conversion-pass only; back-references are excluded from the
    /// node hash, so the key is unaffected.
    pub fn set_write_node(&mut self, read: &NodeKey, write: NodeKey) -> Result<(), IrError> {
        let node = self
            .nodes
            .get_mut(read)
            .ok_or_else(|| IrError::UnknownNode { key: read.0.clone() })?;
        match &mut node.kind {
            NodeKind::LocalRead { write_node, .. }
            | NodeKind::InstanceVariableRead { write_node, .. }
            | NodeKind::ClassVariableRead { write_node, .. } => {
                *write_node = Some(write);
                Ok(())
            }
            _ => Err(IrError::NotAReadNode { key: read.0.clone() }),
        }
    }

    /// Allocate an empty called-methods set owned by `file`. Freed slots
    /// from removed files are reused before the arena grows.
    pub fn new_method_set(&mut self, file: &str) -> MethodSetId {
        let id = match self.free_sets.pop() {
            Some(id) => id,
            None => {
                self.method_sets.push(BTreeSet::new());
                MethodSetId((self.method_sets.len() - 1) as u32)
            }
        };
        self.sets_by_file.entry(file.to_string()).or_default().push(id);
        id
    }

    /// Record one observed call against a shared evidence set.
    /// Conversion-pass only.
    pub fn record_called_method(&mut self, id: MethodSetId, method: impl Into<String>) {
        if let Some(set) = self.method_sets.get_mut(id.0 as usize) {
            set.insert(method.into());
        }
    }

    /// The accumulated evidence behind a handle. Empty for an unknown
    /// handle, which reads the same as "no evidence".
    pub fn called_methods(&self, id: MethodSetId) -> &BTreeSet<String> {
        static EMPTY: BTreeSet<String> = BTreeSet::new();
        self.method_sets.get(id.0 as usize).unwrap_or(&EMPTY)
    }

    /// Drop every node and called-methods set the file contributed, in
    /// O(entries-in-file).
    pub fn remove_file(&mut self, file: &str) {
        if let Some(keys) = self.by_file.remove(file) {
            for key in keys {
                self.nodes.remove(&key);
            }
        }
        if let Some(ids) = self.sets_by_file.remove(file) {
            for id in ids {
                if let Some(set) = self.method_sets.get_mut(id.0 as usize) {
                    set.clear();
                }
                self.free_sets.push(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use crate::ty::Ty;

    fn literal(scope: &str, ty: Ty) -> Node {
        Node::new(NodeKind::Literal { ty }, scope, None)
    }

    #[test]
    fn insert_and_get() {
        let mut arena = NodeArena::new();
        let key = arena.insert("a.rb", literal("main", Ty::instance("Integer"))).unwrap();
        assert!(arena.get(&key).is_some());
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn reinsert_identical_is_idempotent() {
        let mut arena = NodeArena::new();
        let k1 = arena.insert("a.rb", literal("main", Ty::instance("Integer"))).unwrap();
        let k2 = arena.insert("a.rb", literal("main", Ty::instance("Integer"))).unwrap();
        assert_eq!(k1, k2);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn remove_file_drops_only_that_files_nodes() {
        let mut arena = NodeArena::new();
        let ka = arena.insert("a.rb", literal("main", Ty::instance("Integer"))).unwrap();
        let kb = arena.insert("b.rb", literal("main", Ty::instance("String"))).unwrap();
        arena.remove_file("a.rb");
        assert!(arena.get(&ka).is_none());
        assert!(arena.get(&kb).is_some());
    }

    #[test]
    fn write_node_patching() {
        let mut arena = NodeArena::new();
        let read = arena
            .insert(
                "a.rb",
                Node::new(
                    NodeKind::LocalRead { name: "x".into(), write_node: None, called: None },
                    "main",
                    None,
                ),
            )
            .unwrap();
        let write = arena
            .insert(
                "a.rb",
                Node::new(
                    NodeKind::LocalWrite { name: "x".into(), value: Some(read.clone()) },
                    "main",
                    None,
                ),
            )
            .unwrap();
        arena.set_write_node(&read, write.clone()).unwrap();
        match &arena.get(&read).unwrap().kind {
            NodeKind::LocalRead { write_node, .. } => {
                assert_eq!(write_node.as_ref(), Some(&write))
            }
            other => panic!("unexpected kind {other:?}"),
        }
        // Patching a non-read node is a distinct error from a missing key.
        assert_eq!(
            arena.set_write_node(&write, read.clone()),
            Err(IrError::NotAReadNode { key: write.0.clone() })
        );
        assert_eq!(
            arena.set_write_node(&NodeKey::new("nowhere", 0), read),
            Err(IrError::UnknownNode { key: NodeKey::new("nowhere", 0).0 })
        );
    }

    #[test]
    fn key_collision_between_unrelated_nodes_is_loud() {
        let mut arena = NodeArena::new();
        // Two reads identical except for their evidence handle, which the
        // structural hash excludes: same key, different node.
        let first = Node::new(
            NodeKind::LocalRead { name: "x".into(), write_node: None, called: None },
            "main",
            None,
        );
        let second = Node::new(
            NodeKind::LocalRead {
                name: "x".into(),
                write_node: None,
                called: Some(MethodSetId(0)),
            },
            "main",
            None,
        );
        let key = arena.insert("a.rb", first).unwrap();
        assert_eq!(
            arena.insert("a.rb", second),
            Err(IrError::NodeKeyCollision { key: key.0 })
        );
    }

    #[test]
    fn called_methods_are_shared_by_handle() {
        let mut arena = NodeArena::new();
        let set = arena.new_method_set("a.rb");
        arena.record_called_method(set, "each");
        arena.record_called_method(set, "size");
        arena.record_called_method(set, "each");
        let methods: Vec<&str> = arena.called_methods(set).iter().map(|s| s.as_str()).collect();
        assert_eq!(methods, vec!["each", "size"]);
    }

    #[test]
    fn remove_file_frees_called_method_sets_for_reuse() {
        let mut arena = NodeArena::new();
        let first = arena.new_method_set("a.rb");
        arena.record_called_method(first, "each");
        arena.remove_file("a.rb");

        // The freed slot is reused, emptied, by the next allocation.
        let second = arena.new_method_set("b.rb");
        assert_eq!(first, second);
        assert!(arena.called_methods(second).is_empty());

        // Sets owned by other files survive.
        let kept = arena.new_method_set("c.rb");
        arena.record_called_method(kept, "warn");
        arena.remove_file("b.rb");
        assert_eq!(arena.called_methods(kept).iter().count(), 1);
    }
}
