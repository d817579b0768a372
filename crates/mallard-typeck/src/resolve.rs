//! The resolver: lazy recursive graph evaluation over IR nodes.
//!
//! `infer` walks a node's dependencies, consults the registries and the
//! signature source chain, and produces a best-effort type with a
//! human-readable reason. Results are memoized per node key; an in-flight
//! key set breaks write/read cycles for self-referential code.
//!
//! Failure policy: a malformed or missing dependency never raises -- it
//! degrades to `Unknown` with a reason. The only loud failures in the
//! engine live at the arena boundary, where the IR contract itself is
//! violated.

use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::arena::NodeArena;
use crate::builtins;
use crate::duck::resolve_duck;
use crate::node::{MethodSetId, NodeKey, NodeKind};
use crate::registry::Registries;
use crate::sig::{select_overload, MethodKind};
use crate::source::{AncestorProvider, CodeIndex, SignatureSource};
use crate::ty::Ty;

/// Where an inferred type came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSource {
    /// Carried directly by a literal node.
    Literal,
    /// Followed the dependency graph (assignment, merge, pass-through).
    Dataflow,
    /// Resolved through a declaration registry.
    Registry,
    /// Answered by a signature source or signature registry.
    Signature,
    /// Concretized from duck-typing evidence.
    DuckSearch,
    /// Nothing to go on.
    Missing,
}

/// The result of inferring one node: the type, a human-readable reason,
/// and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    pub ty: Ty,
    pub reason: String,
    pub source: TypeSource,
}

impl Inference {
    fn new(ty: Ty, reason: impl Into<String>, source: TypeSource) -> Self {
        Self { ty, reason: reason.into(), source }
    }

    fn unknown(reason: impl Into<String>) -> Self {
        Self::new(Ty::Unknown, reason, TypeSource::Missing)
    }
}

/// The graph-traversal engine.
///
/// All collaborators are injected; the resolver owns only its memoization
/// cache and the per-call-stack in-flight set. One resolver serves one
/// logical session -- the cache and cycle guard are mutable state that must
/// not be shared across concurrent consumers.
pub struct Resolver<'a> {
    arena: &'a NodeArena,
    registries: &'a Registries,
    ancestors: &'a dyn AncestorProvider,
    index: Box<dyn CodeIndex + 'a>,
    sources: &'a [Box<dyn SignatureSource>],
    cache: FxHashMap<NodeKey, Rc<Inference>>,
    in_flight: FxHashSet<NodeKey>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        arena: &'a NodeArena,
        registries: &'a Registries,
        ancestors: &'a dyn AncestorProvider,
        index: Box<dyn CodeIndex + 'a>,
        sources: &'a [Box<dyn SignatureSource>],
    ) -> Self {
        Self {
            arena,
            registries,
            ancestors,
            index,
            sources,
            cache: FxHashMap::default(),
            in_flight: FxHashSet::default(),
        }
    }

    /// Infer the type of a node, memoized by node key.
    ///
    /// Two calls for the same key return the same `Rc` until
    /// [`clear_cache`](Self::clear_cache). Revisiting a key that is still
    /// being computed (a write/read cycle) returns an unmemoized `Unknown`
    /// instead of recursing forever.
    pub fn infer(&mut self, key: &NodeKey) -> Rc<Inference> {
        if let Some(hit) = self.cache.get(key) {
            return Rc::clone(hit);
        }
        if self.in_flight.contains(key) {
            return Rc::new(Inference::unknown("cyclic definition"));
        }
        self.in_flight.insert(key.clone());
        let result = Rc::new(self.infer_node(key));
        self.in_flight.remove(key);
        self.cache.insert(key.clone(), Rc::clone(&result));
        result
    }

    /// Drop every memoized result. The only way to force re-computation.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    fn infer_node(&mut self, key: &NodeKey) -> Inference {
        let Some(node) = self.arena.get(key).cloned() else {
            return Inference::unknown(format!("node not indexed: {key}"));
        };
        match node.kind {
            NodeKind::Literal { ty } => Inference::new(ty, "literal", TypeSource::Literal),

            NodeKind::LocalWrite { value, .. }
            | NodeKind::InstanceVariableWrite { value, .. }
            | NodeKind::ClassVariableWrite { value, .. } => match value {
                Some(v) => self.follow(&v, "assigned value"),
                None => Inference::unknown("unassigned variable"),
            },

            NodeKind::LocalRead { name, write_node, called } => {
                if let Some(w) = write_node {
                    return self.follow(&w, format!("read of `{name}`"));
                }
                self.duck_evidence(called)
                    .unwrap_or_else(|| Inference::unknown(format!("no assignment found for `{name}`")))
            }

            NodeKind::InstanceVariableRead { name, class_name, write_node } => {
                if let Some(w) = write_node {
                    return self.follow(&w, format!("read of `{name}`"));
                }
                let ancestors = self.ancestors.ancestors_of(&class_name);
                match self
                    .registries
                    .instance_variables
                    .lookup(&class_name, &name, &ancestors)
                    .cloned()
                {
                    Some(def) => {
                        let ty = self.infer(&def).ty.clone();
                        Inference::new(
                            ty,
                            format!("registered assignment of `{name}` in {class_name}"),
                            TypeSource::Registry,
                        )
                    }
                    None => Inference::unknown(format!("`{name}` is never assigned")),
                }
            }

            NodeKind::ClassVariableRead { name, class_name, write_node } => {
                if let Some(w) = write_node {
                    return self.follow(&w, format!("read of `{name}`"));
                }
                match self.registries.class_variables.lookup(&class_name, &name, &[]).cloned() {
                    Some(def) => {
                        let ty = self.infer(&def).ty.clone();
                        Inference::new(
                            ty,
                            format!("registered assignment of `{name}` in {class_name}"),
                            TypeSource::Registry,
                        )
                    }
                    None => Inference::unknown(format!("`{name}` is never assigned")),
                }
            }

            NodeKind::Param { name, default_value, called, .. } => {
                if let Some(d) = default_value {
                    return self.follow(&d, format!("default value of `{name}`"));
                }
                self.duck_evidence(Some(called)).unwrap_or_else(|| {
                    Inference::unknown(format!("parameter `{name}` has no default or call evidence"))
                })
            }

            NodeKind::Constant { name, dependency } => match dependency {
                Some(d) => self.follow(&d, format!("definition of `{name}`")),
                None => Inference::unknown(format!("constant `{name}` has no definition")),
            },

            NodeKind::Call { receiver, method, positional, keywords } => {
                self.infer_call(receiver, &method, &positional, &keywords)
            }

            NodeKind::BlockParamSlot { call, index } => self.infer_block_slot(&call, index),

            NodeKind::Merge { branches } => {
                if branches.is_empty() {
                    return Inference::unknown("merge of no branches");
                }
                let ty = Ty::union_of(branches.iter().map(|b| self.infer(b).ty.clone()));
                Inference::new(ty, "merged branches", TypeSource::Dataflow)
            }

            NodeKind::Or { lhs, rhs } => {
                let left = self.infer(&lhs).ty.clone();
                if !left.can_be_falsy() {
                    return Inference::new(left, "left side of `||` is never falsy", TypeSource::Dataflow);
                }
                let right = self.infer(&rhs).ty.clone();
                let ty = Ty::union(left.without_falsy(), right);
                Inference::new(ty, "either side of `||`", TypeSource::Dataflow)
            }

            NodeKind::Def { return_node, .. } => match return_node {
                Some(r) => self.follow(&r, "method return value"),
                None => Inference::new(Ty::nil(), "method body is empty", TypeSource::Dataflow),
            },

            NodeKind::ClassModule { name, body } => match body {
                Some(b) => self.follow(&b, format!("body of {name}")),
                None => Inference::unknown(format!("{name} has an empty body")),
            },

            NodeKind::SelfRef { class_name } => Inference::new(
                Ty::instance(class_name),
                "self in enclosing class",
                TypeSource::Dataflow,
            ),

            NodeKind::Return { value } => match value {
                Some(v) => self.follow(&v, "returned value"),
                None => Inference::new(Ty::nil(), "bare return", TypeSource::Dataflow),
            },
        }
    }

    /// Structural pass-through: the node's type is its dependency's type.
    fn follow(&mut self, dep: &NodeKey, reason: impl Into<String>) -> Inference {
        let inner = self.infer(dep);
        Inference::new(inner.ty.clone(), reason, TypeSource::Dataflow)
    }

    /// Concretize a shared called-methods set, if it holds any evidence.
    fn duck_evidence(&mut self, called: Option<MethodSetId>) -> Option<Inference> {
        let set = self.arena.called_methods(called?);
        if set.is_empty() {
            return None;
        }
        let ty = resolve_duck(set, &*self.index);
        let inference = if ty.is_unknown() {
            Inference::unknown("duck-typing evidence was inconclusive")
        } else {
            Inference::new(ty, "duck-typed from observed calls", TypeSource::DuckSearch)
        };
        Some(inference)
    }

    fn infer_call(
        &mut self,
        receiver: Option<NodeKey>,
        method: &str,
        positional: &[NodeKey],
        keywords: &[(String, NodeKey)],
    ) -> Inference {
        let pos_tys: Vec<Ty> = positional.iter().map(|a| self.infer(a).ty.clone()).collect();
        let kw_tys: Vec<(String, Ty)> = keywords
            .iter()
            .map(|(n, a)| (n.clone(), self.infer(a).ty.clone()))
            .collect();

        // A constant or class/module receiver is a reference to the class
        // object itself: dispatch on the singleton side.
        if let Some(class) = receiver.as_ref().and_then(|r| self.class_reference(r)) {
            return match self.resolve_singleton_call(&class, method, &pos_tys, &kw_tys) {
                Some(ty) => Inference::new(
                    ty,
                    format!("signature of {class}.{method}"),
                    TypeSource::Signature,
                ),
                None => Inference::unknown(format!("no signature for {class}.{method}")),
            };
        }

        let recv_ty = match &receiver {
            Some(r) => self.infer(r).ty.clone(),
            None => Ty::instance("Object"),
        };
        match self.resolve_method_call(&recv_ty, method, &pos_tys, &kw_tys) {
            Some((ty, source)) => {
                Inference::new(ty, format!("signature of {recv_ty}#{method}"), source)
            }
            None => Inference::unknown(format!("no signature for {recv_ty}#{method}")),
        }
    }

    /// The class name a receiver node denotes when it is a class reference
    /// rather than a value.
    fn class_reference(&self, receiver: &NodeKey) -> Option<String> {
        match &self.arena.get(receiver)?.kind {
            NodeKind::ClassModule { name, .. } => Some(name.clone()),
            // An unlinked constant, or one whose definition is a class or
            // module body, names the class itself. A constant assigned a
            // value stays a value.
            NodeKind::Constant { name, dependency } => match dependency {
                None => Some(name.clone()),
                Some(dep) => match self.arena.get(dep).map(|n| &n.kind) {
                    Some(NodeKind::ClassModule { name, .. }) => Some(name.clone()),
                    _ => None,
                },
            },
            _ => None,
        }
    }

    /// Resolve an instance-side call against a receiver type.
    fn resolve_method_call(
        &mut self,
        recv: &Ty,
        method: &str,
        positional: &[Ty],
        keywords: &[(String, Ty)],
    ) -> Option<(Ty, TypeSource)> {
        match recv {
            Ty::Unknown => None,

            Ty::Duck(names) => {
                let concrete = resolve_duck(names, &*self.index);
                if concrete.is_unknown() {
                    return None;
                }
                self.resolve_method_call(&concrete, method, positional, keywords)
                    .map(|(ty, _)| (ty, TypeSource::DuckSearch))
            }

            Ty::Union(members) => {
                let answers: Vec<Ty> = members
                    .iter()
                    .filter_map(|m| {
                        self.resolve_method_call(&m.clone(), method, positional, keywords)
                            .map(|(ty, _)| ty)
                    })
                    .collect();
                if answers.is_empty() {
                    return None;
                }
                Some((Ty::union_of(answers), TypeSource::Signature))
            }

            // Element-type substitution runs before any generic lookup so
            // `Array[T]` keeps its `T`.
            Ty::Array(_) | Ty::Hash(_) => {
                if let Some(ty) = builtins::container_call(recv, method, positional) {
                    return Some((ty, TypeSource::Signature));
                }
                let class = match recv {
                    Ty::Array(_) => "Array",
                    _ => "Hash",
                };
                self.resolve_instance_call(class, method, positional, keywords)
            }

            Ty::Instance(class) => {
                self.resolve_instance_call(&class.clone(), method, positional, keywords)
            }
        }
    }

    /// Priority chain for a named class: external sources first, then the
    /// project's signature registry, then the project's own defs.
    fn resolve_instance_call(
        &mut self,
        class: &str,
        method: &str,
        positional: &[Ty],
        keywords: &[(String, Ty)],
    ) -> Option<(Ty, TypeSource)> {
        for source in self.sources {
            if let Some(ty) =
                source.resolve_call(class, method, positional, keywords, MethodKind::Instance)
            {
                if !ty.is_unknown() {
                    return Some((ty, TypeSource::Signature));
                }
            }
        }
        let ancestors = self.ancestors.ancestors_of(class);
        if let Some(sigs) =
            self.registries.signatures.lookup(class, MethodKind::Instance, method, &ancestors)
        {
            if let Some(sig) = select_overload(sigs, positional, keywords) {
                return Some((sig.ret.clone(), TypeSource::Signature));
            }
        }
        if let Some(def) = self
            .registries
            .methods
            .lookup(class, MethodKind::Instance, method, &ancestors)
            .cloned()
        {
            return Some((self.infer(&def).ty.clone(), TypeSource::Registry));
        }
        None
    }

    fn resolve_singleton_call(
        &mut self,
        class: &str,
        method: &str,
        positional: &[Ty],
        keywords: &[(String, Ty)],
    ) -> Option<Ty> {
        for source in self.sources {
            if let Some(ty) =
                source.resolve_call(class, method, positional, keywords, MethodKind::Singleton)
            {
                if !ty.is_unknown() {
                    return Some(ty);
                }
            }
        }
        let ancestors = self.ancestors.ancestors_of(class);
        if let Some(sigs) =
            self.registries.signatures.lookup(class, MethodKind::Singleton, method, &ancestors)
        {
            if let Some(sig) = select_overload(sigs, positional, keywords) {
                return Some(sig.ret.clone());
            }
        }
        if let Some(def) = self
            .registries
            .methods
            .lookup(class, MethodKind::Singleton, method, &ancestors)
            .cloned()
        {
            return Some(self.infer(&def).ty.clone());
        }
        // `new` without an explicit definition constructs an instance.
        if method == "new" {
            return Some(Ty::instance(class));
        }
        None
    }

    fn infer_block_slot(&mut self, call: &NodeKey, index: u32) -> Inference {
        let Some(call_node) = self.arena.get(call).cloned() else {
            return Inference::unknown("block outside an indexed call");
        };
        let NodeKind::Call { receiver, method, .. } = call_node.kind else {
            return Inference::unknown("block parameter not attached to a call");
        };
        let recv_ty = match &receiver {
            Some(r) => self.infer(r).ty.clone(),
            None => Ty::instance("Object"),
        };
        if let Some(tys) = builtins::block_param_tys(&recv_ty, &method) {
            if let Some(ty) = tys.into_iter().nth(index as usize) {
                return Inference::new(
                    ty,
                    format!("element yielded by {method}"),
                    TypeSource::Signature,
                );
            }
        }
        if let Ty::Instance(class) = &recv_ty {
            for source in self.sources {
                if let Some(tys) = source.block_params(class, &method) {
                    if let Some(ty) = tys.into_iter().nth(index as usize) {
                        return Inference::new(
                            ty,
                            format!("block parameter of {class}#{method}"),
                            TypeSource::Signature,
                        );
                    }
                }
            }
        }
        Inference::unknown(format!("no block parameter information for {method}"))
    }
}

/// Convenience for tests and embedders that need a resolver over bare
/// parts without an [`Engine`](crate::Engine).
pub fn resolver_over<'a>(
    arena: &'a NodeArena,
    registries: &'a Registries,
    ancestors: &'a dyn AncestorProvider,
    sources: &'a [Box<dyn SignatureSource>],
) -> Resolver<'a> {
    Resolver::new(
        arena,
        registries,
        ancestors,
        Box::new(crate::source::RegistryIndex(&registries.methods)),
        sources,
    )
}
