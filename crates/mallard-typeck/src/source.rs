//! Collaborator seams: the traits the resolver is constructed over.
//!
//! Everything the engine consumes from outside -- ancestor chains, the
//! global code index behind duck-typing search, and signature providers --
//! is a dependency-injected trait object, so per-session isolation needs no
//! hidden global state.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::registry::MethodRegistry;
use crate::sig::{MethodKind, MethodSig};
use crate::ty::Ty;

/// Supplies the ordered ancestor chain of a class, excluding the class
/// itself (the registries filter it defensively either way).
pub trait AncestorProvider {
    fn ancestors_of(&self, class: &str) -> Vec<String>;
}

/// A map-backed ancestor provider. Classes without an entry have no
/// ancestors beyond the implicit top-level object.
#[derive(Debug, Default)]
pub struct MapAncestors {
    chains: FxHashMap<String, Vec<String>>,
}

impl MapAncestors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, class: impl Into<String>, ancestors: Vec<String>) {
        self.chains.insert(class.into(), ancestors);
    }
}

impl AncestorProvider for MapAncestors {
    fn ancestors_of(&self, class: &str) -> Vec<String> {
        self.chains.get(class).cloned().unwrap_or_default()
    }
}

/// The global symbol index the duck-typing search queries: all classes
/// whose public method set is a superset of the given names.
pub trait CodeIndex {
    fn classes_with_methods(&self, methods: &BTreeSet<String>) -> Vec<String>;
}

/// Code index over the project's own method registry.
pub struct RegistryIndex<'a>(pub &'a MethodRegistry);

impl CodeIndex for RegistryIndex<'_> {
    fn classes_with_methods(&self, methods: &BTreeSet<String>) -> Vec<String> {
        self.0
            .classes()
            .into_iter()
            .filter(|class| {
                let defined = self.0.instance_methods_of(class);
                methods.iter().all(|m| defined.contains(m.as_str()))
            })
            .map(str::to_string)
            .collect()
    }
}

/// A provider answering "what does this method return given these argument
/// types" for classes the project did not define: core classes, cached
/// gems, external interface corpora.
///
/// Sources are queried in a priority chain; the first non-`Unknown` answer
/// wins.
pub trait SignatureSource {
    /// Return type of `class`'s method for the given argument types.
    fn resolve_call(
        &self,
        class: &str,
        method: &str,
        positional: &[Ty],
        keywords: &[(String, Ty)],
        kind: MethodKind,
    ) -> Option<Ty>;

    /// The types a method yields to its block parameters.
    fn block_params(&self, _class: &str, _method: &str) -> Option<Vec<Ty>> {
        None
    }

    /// A full signature, when the source can produce one (the
    /// signature-query API consults this after the project registries).
    fn signature(&self, _class: &str, _method: &str, _kind: MethodKind) -> Option<MethodSig> {
        None
    }
}
