//! Extracting a package's method signatures from an indexed engine.
//!
//! After a gem's files have been converted and registered, every method the
//! package defined is turned into a concrete [`MethodSig`] by running
//! inference over its def node. One unresolvable method does not abort the
//! package; it is skipped and the extraction is marked incomplete, so the
//! cache layer knows to retry it next session.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use mallard_typeck::sig::{MethodKind, MethodSig};
use mallard_typeck::Engine;

/// Every signature a package exports: `class -> method -> signature`, for
/// both method kinds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSignatures {
    pub instance_methods: BTreeMap<String, BTreeMap<String, MethodSig>>,
    pub class_methods: BTreeMap<String, BTreeMap<String, MethodSig>>,
}

impl PackageSignatures {
    pub fn is_empty(&self) -> bool {
        self.instance_methods.is_empty() && self.class_methods.is_empty()
    }

    pub fn method_count(&self) -> usize {
        self.instance_methods.values().map(BTreeMap::len).sum::<usize>()
            + self.class_methods.values().map(BTreeMap::len).sum::<usize>()
    }
}

/// The result of extracting one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub signatures: PackageSignatures,
    /// False when at least one method could not be turned into a
    /// signature. Incomplete extractions are cached too, but flagged.
    pub complete: bool,
}

/// Extract signatures for every method registered by the given files.
pub fn extract_package(engine: &Engine, files: &BTreeSet<String>) -> Extraction {
    let mut session = engine.session();
    let mut signatures = PackageSignatures::default();
    let mut complete = true;

    for (kind, bucket) in [
        (MethodKind::Instance, &mut signatures.instance_methods),
        (MethodKind::Singleton, &mut signatures.class_methods),
    ] {
        for (class, method, def) in engine.registries.methods.members_in_files(kind, files) {
            match session.signature_of_def(&def) {
                Some(sig) => {
                    bucket.entry(class).or_default().insert(method, sig);
                }
                None => complete = false,
            }
        }
    }
    Extraction { signatures, complete }
}
