//! A signature source backed by cached gem extractions.
//!
//! Merged records answer the engine's call and signature queries without
//! the gem's files being indexed at all -- that is the point of the cache:
//! a warm session only converts project code.

use std::collections::BTreeMap;

use mallard_typeck::sig::{MethodKind, MethodSig};
use mallard_typeck::source::SignatureSource;
use mallard_typeck::Ty;

use crate::cache::CacheRecord;
use crate::extract::PackageSignatures;

/// Signatures from any number of cached packages, merged into one source.
///
/// First inserted wins on a `(class, method)` collision, so records should
/// be added in dependency order.
#[derive(Debug, Default)]
pub struct CachedGemSource {
    instance: BTreeMap<String, BTreeMap<String, MethodSig>>,
    singleton: BTreeMap<String, BTreeMap<String, MethodSig>>,
}

impl CachedGemSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_record(&mut self, record: &CacheRecord) {
        self.add_signatures(&record.signatures);
    }

    pub fn add_signatures(&mut self, signatures: &PackageSignatures) {
        merge(&mut self.instance, &signatures.instance_methods);
        merge(&mut self.singleton, &signatures.class_methods);
    }

    fn side(&self, kind: MethodKind) -> &BTreeMap<String, BTreeMap<String, MethodSig>> {
        match kind {
            MethodKind::Instance => &self.instance,
            MethodKind::Singleton => &self.singleton,
        }
    }

    fn get(&self, class: &str, method: &str, kind: MethodKind) -> Option<&MethodSig> {
        self.side(kind).get(class)?.get(method)
    }

    pub fn is_empty(&self) -> bool {
        self.instance.is_empty() && self.singleton.is_empty()
    }
}

fn merge(
    into: &mut BTreeMap<String, BTreeMap<String, MethodSig>>,
    from: &BTreeMap<String, BTreeMap<String, MethodSig>>,
) {
    for (class, methods) in from {
        let bucket = into.entry(class.clone()).or_default();
        for (method, sig) in methods {
            bucket.entry(method.clone()).or_insert_with(|| sig.clone());
        }
    }
}

impl SignatureSource for CachedGemSource {
    fn resolve_call(
        &self,
        class: &str,
        method: &str,
        _positional: &[Ty],
        _keywords: &[(String, Ty)],
        kind: MethodKind,
    ) -> Option<Ty> {
        self.get(class, method, kind).map(|sig| sig.ret.clone())
    }

    fn signature(&self, class: &str, method: &str, kind: MethodKind) -> Option<MethodSig> {
        self.get(class, method, kind).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signatures(class: &str, method: &str, ret: Ty) -> PackageSignatures {
        let mut out = PackageSignatures::default();
        out.instance_methods
            .entry(class.to_string())
            .or_default()
            .insert(method.to_string(), MethodSig::constant(ret));
        out
    }

    #[test]
    fn answers_calls_from_merged_records() {
        let mut source = CachedGemSource::new();
        source.add_signatures(&signatures("Rack::Request", "path", Ty::instance("String")));
        source.add_signatures(&signatures("Money", "cents", Ty::instance("Integer")));

        assert_eq!(
            source.resolve_call("Rack::Request", "path", &[], &[], MethodKind::Instance),
            Some(Ty::instance("String"))
        );
        assert_eq!(
            source.resolve_call("Money", "cents", &[], &[], MethodKind::Instance),
            Some(Ty::instance("Integer"))
        );
        assert_eq!(source.resolve_call("Money", "cents", &[], &[], MethodKind::Singleton), None);
        assert_eq!(source.resolve_call("Missing", "x", &[], &[], MethodKind::Instance), None);
    }

    #[test]
    fn first_package_wins_on_collision() {
        let mut source = CachedGemSource::new();
        source.add_signatures(&signatures("Helper", "run", Ty::instance("String")));
        source.add_signatures(&signatures("Helper", "run", Ty::instance("Integer")));

        assert_eq!(
            source.resolve_call("Helper", "run", &[], &[], MethodKind::Instance),
            Some(Ty::instance("String"))
        );
    }

    #[test]
    fn full_signature_is_exposed() {
        let mut source = CachedGemSource::new();
        source.add_signatures(&signatures("Money", "cents", Ty::instance("Integer")));
        let sig = source.signature("Money", "cents", MethodKind::Instance).unwrap();
        assert_eq!(sig.to_string(), "() -> Integer");
    }
}
