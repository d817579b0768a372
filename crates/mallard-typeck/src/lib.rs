//! Lazy type-inference engine for duck-typed code.
//!
//! An external converter turns syntax trees into IR nodes ([`node`]) and
//! feeds them to an [`Engine`], which owns the arena, the declaration
//! registries, and the location index. Queries run through a [`Session`]:
//! a memoizing [`resolve::Resolver`] over an immutable snapshot of the
//! engine's state. The engine implements:
//! - a structural type algebra with unions, containers, and duck types
//!   ([`ty`])
//! - lazy recursive inference over the node graph with cycle safety
//!   ([`resolve`])
//! - duck-typing candidate search against a global code index ([`duck`])
//! - overload-scored signatures for core classes and external sources
//!   ([`sig`], [`builtins`], [`source`])
//! - position-based lookup for editor-style "type at cursor" queries
//!   ([`location`])
//! - per-file removal everywhere, so re-indexing a changed file is
//!   remove-then-insert ([`arena`], [`registry`])

pub mod arena;
pub mod builtins;
pub mod duck;
pub mod location;
pub mod node;
pub mod registry;
pub mod resolve;
pub mod sig;
pub mod source;
pub mod ty;

use std::rc::Rc;

use mallard_common::{IrError, QueryError};

use crate::arena::NodeArena;
use crate::location::LocationIndex;
use crate::node::{Node, NodeKey, NodeKind};
use crate::registry::Registries;
use crate::resolve::{Inference, Resolver};
use crate::sig::{MethodKind, MethodSig, ParamSig};
use crate::source::{AncestorProvider, MapAncestors, RegistryIndex, SignatureSource};

pub use crate::resolve::TypeSource;
pub use crate::ty::Ty;

/// Owner of all indexed state: nodes, registries, locations, ancestry, and
/// the signature source chain.
///
/// The engine is the single writer. Indexing mutates it; queries never do.
/// A [`Session`] borrows the engine immutably, so the borrow checker rejects
/// indexing while any session is alive.
pub struct Engine {
    pub arena: NodeArena,
    pub registries: Registries,
    pub locations: LocationIndex,
    ancestors: Box<dyn AncestorProvider>,
    sources: Vec<Box<dyn SignatureSource>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine with empty indexes, no ancestry, and the core-class
    /// signatures as the base of the source chain.
    pub fn new() -> Self {
        Self {
            arena: NodeArena::new(),
            registries: Registries::new(),
            locations: LocationIndex::new(),
            ancestors: Box::new(MapAncestors::new()),
            sources: vec![Box::new(builtins::CoreSignatures::new())],
        }
    }

    /// Insert a converted node, registering it in the arena and, when it
    /// carries a location, in the location index.
    pub fn insert_node(&mut self, file: &str, node: Node) -> Result<NodeKey, IrError> {
        self.locations.add(file, &node);
        self.arena.insert(file, node)
    }

    /// Replace the ancestry provider (typically once, after the converter
    /// has seen every class definition).
    pub fn set_ancestors(&mut self, ancestors: Box<dyn AncestorProvider>) {
        self.ancestors = ancestors;
    }

    /// Append a signature source to the chain. Earlier sources win; the
    /// core-class source installed by [`Engine::new`] is always first.
    pub fn push_source(&mut self, source: Box<dyn SignatureSource>) {
        self.sources.push(source);
    }

    /// Sort the location index. Call after indexing, before queries.
    pub fn finalize(&mut self) {
        self.locations.finalize();
    }

    /// Undo everything a file contributed, across all indexes.
    pub fn remove_file(&mut self, file: &str) {
        self.arena.remove_file(file);
        self.registries.remove_file(file);
        self.locations.remove_file(file);
    }

    /// Open a query session over the current state.
    pub fn session(&self) -> Session<'_> {
        Session {
            engine: self,
            resolver: Resolver::new(
                &self.arena,
                &self.registries,
                self.ancestors.as_ref(),
                Box::new(RegistryIndex(&self.registries.methods)),
                &self.sources,
            ),
        }
    }
}

/// A memoizing view over an [`Engine`] snapshot.
///
/// Results for one key are reference-equal for the lifetime of the cache;
/// dropping the session (or calling [`clear_cache`](Self::clear_cache))
/// forgets them.
pub struct Session<'e> {
    engine: &'e Engine,
    resolver: Resolver<'e>,
}

impl Session<'_> {
    /// Infer the type of a node by key.
    pub fn infer(&mut self, key: &NodeKey) -> Rc<Inference> {
        self.resolver.infer(key)
    }

    pub fn clear_cache(&mut self) {
        self.resolver.clear_cache();
    }

    /// Infer the type of whatever sits at a 1-based (line, column)
    /// position. `file == None` searches every indexed file.
    pub fn infer_at(
        &mut self,
        file: Option<&str>,
        line: u32,
        column: u32,
    ) -> Result<Rc<Inference>, QueryError> {
        if let Some(f) = file {
            if !self.engine.locations.has_file(f) {
                return Err(QueryError::FileNotIndexed(f.to_string()));
            }
        }
        let key = self
            .engine
            .locations
            .find(file, line, column)
            .cloned()
            .ok_or(QueryError::PositionNotFound {
                file: file.map(str::to_string),
                line,
                column,
            })?;
        Ok(self.infer(&key))
    }

    /// A rendered signature for a method: the project's own definition
    /// first, then declared signatures, then the source chain.
    pub fn method_signature(&mut self, class: &str, method: &str) -> Result<String, QueryError> {
        let ancestors = self.engine.ancestors.ancestors_of(class);
        for kind in [MethodKind::Instance, MethodKind::Singleton] {
            if let Some(def) = self
                .engine
                .registries
                .methods
                .lookup(class, kind, method, &ancestors)
                .cloned()
            {
                if let Some(sig) = self.signature_of_def(&def) {
                    return Ok(sig.to_string());
                }
            }
        }
        for kind in [MethodKind::Instance, MethodKind::Singleton] {
            if let Some(sigs) =
                self.engine.registries.signatures.lookup(class, kind, method, &ancestors)
            {
                if let Some(sig) = sigs.first() {
                    return Ok(sig.to_string());
                }
            }
            for source in &self.engine.sources {
                if let Some(sig) = source.signature(class, method, kind) {
                    return Ok(sig.to_string());
                }
            }
        }
        Err(QueryError::UnknownMethod {
            class: class.to_string(),
            method: method.to_string(),
        })
    }

    /// Build a full [`MethodSig`] from a `Def` node by inferring each
    /// parameter and the return value. `None` when the key is not a `Def`
    /// or a parameter key does not resolve to a `Param` node.
    pub fn signature_of_def(&mut self, def: &NodeKey) -> Option<MethodSig> {
        let NodeKind::Def { params, .. } = &self.engine.arena.get(def)?.kind else {
            return None;
        };
        let param_keys = params.clone();
        let mut sig_params = Vec::with_capacity(param_keys.len());
        for key in &param_keys {
            let NodeKind::Param { name, kind, .. } = &self.engine.arena.get(key)?.kind else {
                return None;
            };
            let (name, kind) = (name.clone(), *kind);
            let ty = self.infer(key).ty.clone();
            sig_params.push(ParamSig::new(name, kind, ty));
        }
        let ret = self.infer(def).ty.clone();
        Some(MethodSig::new(sig_params, ret))
    }
}
