//! Duck-typing candidate search.
//!
//! Given only the set of method names observed being called on a value, ask
//! the code index which classes respond to all of them. Universal methods
//! are stripped first -- they match every class and would blow the
//! candidate set wide open -- and anything beyond a small fixed number of
//! survivors degrades to `Unknown` rather than a uselessly wide union.

use std::collections::BTreeSet;

use crate::builtins::is_universal_method;
use crate::source::CodeIndex;
use crate::ty::Ty;

/// Candidate-set cutoff. More survivors than this means the evidence does
/// not discriminate, and the search gives up.
pub const MAX_CANDIDATES: usize = 3;

/// Resolve duck-typing evidence to a concrete type.
pub fn resolve_duck(methods: &BTreeSet<String>, index: &dyn CodeIndex) -> Ty {
    let discriminating: BTreeSet<String> = methods
        .iter()
        .filter(|m| !is_universal_method(m))
        .cloned()
        .collect();
    if discriminating.is_empty() {
        return Ty::Unknown;
    }
    let candidates = index.classes_with_methods(&discriminating);
    if candidates.is_empty() || candidates.len() > MAX_CANDIDATES {
        return Ty::Unknown;
    }
    Ty::union_of(candidates.into_iter().map(Ty::Instance))
}
