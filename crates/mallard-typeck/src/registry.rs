//! Per-scope declaration registries.
//!
//! Four registries index declarations by `(class, member name)`: methods,
//! instance variables, class variables, and external signatures. All share
//! the same contract: registration is first-write-wins within a scope, and
//! removing a file undoes exactly the registrations that file contributed,
//! resurfacing same-named entries from other files -- which is what makes
//! incremental re-indexing on file change correct.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::node::NodeKey;
use crate::sig::{MethodKind, MethodSig};

#[derive(Debug, Clone)]
struct RegEntry<V> {
    value: V,
    file: String,
}

/// A `(class, name) -> value` table with ancestor fallback and per-file
/// bookkeeping.
///
/// Entries for one key are kept in registration order; lookup returns the
/// first (first-write-wins), so removing the winning file's entry exposes
/// the next registration instead of losing it.
#[derive(Debug, Clone)]
pub struct ScopedRegistry<V> {
    entries: FxHashMap<(String, String), Vec<RegEntry<V>>>,
    by_file: FxHashMap<String, Vec<(String, String)>>,
    /// Whether `lookup` walks the supplied ancestor chain on a direct miss.
    ancestor_fallback: bool,
}

impl<V> ScopedRegistry<V> {
    pub fn new(ancestor_fallback: bool) -> Self {
        Self {
            entries: FxHashMap::default(),
            by_file: FxHashMap::default(),
            ancestor_fallback,
        }
    }

    /// Register a declaration contributed by `file`.
    pub fn register(
        &mut self,
        class: impl Into<String>,
        name: impl Into<String>,
        value: V,
        file: impl Into<String>,
    ) {
        let key = (class.into(), name.into());
        let file = file.into();
        self.by_file.entry(file.clone()).or_default().push(key.clone());
        self.entries.entry(key).or_default().push(RegEntry { value, file });
    }

    fn direct(&self, class: &str, name: &str) -> Option<&V> {
        self.entries
            .get(&(class.to_string(), name.to_string()))
            .and_then(|v| v.first())
            .map(|e| &e.value)
    }

    /// Look up a member: the class itself first, then the supplied ancestor
    /// chain (the queried class is skipped if the caller included it).
    pub fn lookup(&self, class: &str, name: &str, ancestors: &[String]) -> Option<&V> {
        if let Some(v) = self.direct(class, name) {
            return Some(v);
        }
        if !self.ancestor_fallback {
            return None;
        }
        ancestors
            .iter()
            .filter(|a| a.as_str() != class)
            .find_map(|a| self.direct(a, name))
    }

    /// Undo exactly the registrations `file` contributed.
    pub fn remove_file(&mut self, file: &str) {
        let Some(keys) = self.by_file.remove(file) else { return };
        for key in keys {
            if let Some(entries) = self.entries.get_mut(&key) {
                entries.retain(|e| e.file != file);
                if entries.is_empty() {
                    self.entries.remove(&key);
                }
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Defined methods, instance and singleton sides, with ancestor fallback.
#[derive(Debug)]
pub struct MethodRegistry {
    instance: ScopedRegistry<NodeKey>,
    singleton: ScopedRegistry<NodeKey>,
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self {
            instance: ScopedRegistry::new(true),
            singleton: ScopedRegistry::new(true),
        }
    }
}

impl MethodRegistry {
    fn side(&self, kind: MethodKind) -> &ScopedRegistry<NodeKey> {
        match kind {
            MethodKind::Instance => &self.instance,
            MethodKind::Singleton => &self.singleton,
        }
    }

    pub fn register(
        &mut self,
        class: &str,
        kind: MethodKind,
        name: &str,
        def: NodeKey,
        file: &str,
    ) {
        match kind {
            MethodKind::Instance => self.instance.register(class, name, def, file),
            MethodKind::Singleton => self.singleton.register(class, name, def, file),
        }
    }

    pub fn lookup(
        &self,
        class: &str,
        kind: MethodKind,
        name: &str,
        ancestors: &[String],
    ) -> Option<&NodeKey> {
        self.side(kind).lookup(class, name, ancestors)
    }

    /// Every class with at least one registered method, either side.
    pub fn classes(&self) -> BTreeSet<&str> {
        self.instance
            .entries
            .keys()
            .chain(self.singleton.entries.keys())
            .map(|(class, _)| class.as_str())
            .collect()
    }

    /// The instance-method names of a class, the duck-typing search's view
    /// of its public interface.
    pub fn instance_methods_of(&self, class: &str) -> BTreeSet<&str> {
        self.instance
            .entries
            .keys()
            .filter(|(c, _)| c == class)
            .map(|(_, name)| name.as_str())
            .collect()
    }

    /// Enumerate one side's members of a class, for signature extraction.
    pub fn members_of(&self, class: &str, kind: MethodKind) -> Vec<(String, NodeKey)> {
        let mut members: Vec<(String, NodeKey)> = self
            .side(kind)
            .entries
            .iter()
            .filter(|((c, _), entries)| c == class && !entries.is_empty())
            .map(|((_, name), entries)| (name.clone(), entries[0].value.clone()))
            .collect();
        members.sort_by(|a, b| a.0.cmp(&b.0));
        members
    }

    /// Enumerate one side's methods that were registered by any of the
    /// given files, sorted by (class, name). Used by gem signature
    /// extraction to find what a package's files defined.
    pub fn members_in_files(
        &self,
        kind: MethodKind,
        files: &BTreeSet<String>,
    ) -> Vec<(String, String, NodeKey)> {
        let mut members: Vec<(String, String, NodeKey)> = self
            .side(kind)
            .entries
            .iter()
            .filter_map(|((class, name), entries)| {
                entries
                    .iter()
                    .find(|e| files.contains(&e.file))
                    .map(|e| (class.clone(), name.clone(), e.value.clone()))
            })
            .collect();
        members.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
        members
    }

    pub fn remove_file(&mut self, file: &str) {
        self.instance.remove_file(file);
        self.singleton.remove_file(file);
    }

    pub fn is_empty(&self) -> bool {
        self.instance.is_empty() && self.singleton.is_empty()
    }
}

/// Declared external signatures (overload lists), both method kinds.
#[derive(Debug)]
pub struct SignatureRegistry {
    instance: ScopedRegistry<Vec<MethodSig>>,
    singleton: ScopedRegistry<Vec<MethodSig>>,
}

impl Default for SignatureRegistry {
    fn default() -> Self {
        Self {
            instance: ScopedRegistry::new(true),
            singleton: ScopedRegistry::new(true),
        }
    }
}

impl SignatureRegistry {
    pub fn register(
        &mut self,
        class: &str,
        kind: MethodKind,
        name: &str,
        sigs: Vec<MethodSig>,
        file: &str,
    ) {
        match kind {
            MethodKind::Instance => self.instance.register(class, name, sigs, file),
            MethodKind::Singleton => self.singleton.register(class, name, sigs, file),
        }
    }

    pub fn lookup(
        &self,
        class: &str,
        kind: MethodKind,
        name: &str,
        ancestors: &[String],
    ) -> Option<&Vec<MethodSig>> {
        match kind {
            MethodKind::Instance => self.instance.lookup(class, name, ancestors),
            MethodKind::Singleton => self.singleton.lookup(class, name, ancestors),
        }
    }

    pub fn remove_file(&mut self, file: &str) {
        self.instance.remove_file(file);
        self.singleton.remove_file(file);
    }
}

/// The four per-scope registries, bundled so file removal is one call.
///
/// Instance variables and methods traverse ancestors; class variables never
/// do (their registry is constructed without fallback).
#[derive(Debug)]
pub struct Registries {
    pub methods: MethodRegistry,
    pub instance_variables: ScopedRegistry<NodeKey>,
    pub class_variables: ScopedRegistry<NodeKey>,
    pub signatures: SignatureRegistry,
}

impl Default for Registries {
    fn default() -> Self {
        Self {
            methods: MethodRegistry::default(),
            instance_variables: ScopedRegistry::new(true),
            class_variables: ScopedRegistry::new(false),
            signatures: SignatureRegistry::default(),
        }
    }
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remove_file(&mut self, file: &str) {
        self.methods.remove_file(file);
        self.instance_variables.remove_file(file);
        self.class_variables.remove_file(file);
        self.signatures.remove_file(file);
    }
}
