//! End-to-end cache lifecycle: index a gem, extract, persist, then serve a
//! warm session from the cache alone.

use std::collections::BTreeSet;

use tempfile::TempDir;

use mallard_gems::{
    extract_package, fingerprint, partition, CacheRecord, CacheStore, CachedGemSource, Lockfile,
};
use mallard_typeck::node::{Node, NodeKind};
use mallard_typeck::sig::MethodKind;
use mallard_typeck::{Engine, Ty};

const LOCK: &str = "\
GEM
  remote: https://rubygems.org/
  specs:
    money (6.16.0)
      i18n (>= 0.6.4)
    i18n (1.14.1)

PLATFORMS
  ruby

DEPENDENCIES
  money
";

/// Index a tiny money gem: `Money#cents -> Integer`.
fn index_money_gem(engine: &mut Engine, file: &str) {
    let ret = engine
        .insert_node(
            file,
            Node::new(NodeKind::Literal { ty: Ty::instance("Integer") }, "Money#cents", None),
        )
        .unwrap();
    let def = engine
        .insert_node(
            file,
            Node::new(
                NodeKind::Def {
                    name: "cents".into(),
                    class_name: "Money".into(),
                    singleton: false,
                    params: vec![],
                    return_node: Some(ret),
                },
                "Money#cents",
                None,
            ),
        )
        .unwrap();
    engine
        .registries
        .methods
        .register("Money", MethodKind::Instance, "cents", def, file);
}

#[test]
fn cold_session_extracts_and_warm_session_hits_the_cache() {
    let cache_dir = TempDir::new().unwrap();
    let store = CacheStore::new(cache_dir.path());
    let lock = Lockfile::parse(LOCK);

    let gem_file = "vendor/bundle/ruby/3.2.0/gems/money-6.16.0/lib/money.rb".to_string();
    let parts = partition(&lock, [gem_file.clone(), "app/models/order.rb".to_string()]);
    assert_eq!(parts.packages.len(), 1);
    let package = &parts.packages[0];
    assert_eq!((package.name.as_str(), package.version.as_str()), ("money", "6.16.0"));
    assert_eq!(package.dependency_versions["i18n"], "1.14.1");

    let print = fingerprint(&package.version, &package.dependency_versions);

    // Cold: nothing cached yet.
    assert!(store.load(&package.name, &print).is_none());

    let mut engine = Engine::new();
    index_money_gem(&mut engine, &gem_file);
    let files: BTreeSet<String> = package.files.iter().cloned().collect();
    let out = extract_package(&engine, &files);
    assert!(out.complete);

    store
        .save(&CacheRecord::new(
            &package.name,
            &package.version,
            &print,
            out.complete,
            out.signatures,
        ))
        .unwrap();

    // Warm: a fresh engine with no gem files indexed answers from the
    // cached source.
    let record = store.load(&package.name, &print).expect("cache hit");
    let mut source = CachedGemSource::new();
    source.add_record(&record);

    let mut warm = Engine::new();
    warm.push_source(Box::new(source));
    let recv = warm
        .insert_node(
            "app/models/order.rb",
            Node::new(NodeKind::Literal { ty: Ty::instance("Money") }, "Order#total", None),
        )
        .unwrap();
    let call = warm
        .insert_node(
            "app/models/order.rb",
            Node::new(
                NodeKind::Call {
                    receiver: Some(recv),
                    method: "cents".into(),
                    positional: vec![],
                    keywords: vec![],
                },
                "Order#total",
                None,
            ),
        )
        .unwrap();

    let mut session = warm.session();
    assert_eq!(session.infer(&call).ty, Ty::instance("Integer"));
    assert_eq!(session.method_signature("Money", "cents").unwrap(), "() -> Integer");
}

#[test]
fn dependency_upgrade_invalidates_the_cache() {
    let cache_dir = TempDir::new().unwrap();
    let store = CacheStore::new(cache_dir.path());

    let lock_before = Lockfile::parse(LOCK);
    let lock_after = Lockfile::parse(&LOCK.replace("i18n (1.14.1)", "i18n (1.14.2)"));

    let before = fingerprint("6.16.0", &lock_before.transitive_versions("money"));
    let after = fingerprint("6.16.0", &lock_after.transitive_versions("money"));
    assert_ne!(before, after);

    let mut engine = Engine::new();
    index_money_gem(&mut engine, "gems/money-6.16.0/lib/money.rb");
    let files: BTreeSet<String> = ["gems/money-6.16.0/lib/money.rb".to_string()].into();
    let out = extract_package(&engine, &files);
    store
        .save(&CacheRecord::new("money", "6.16.0", &before, out.complete, out.signatures))
        .unwrap();

    // The record is valid for the old closure, a miss for the new one.
    assert!(store.load("money", &before).is_some());
    assert!(store.load("money", &after).is_none());
}

#[test]
fn packages_cache_in_dependency_order() {
    let lock = Lockfile::parse(LOCK);
    let requested: BTreeSet<String> = ["money".to_string(), "i18n".to_string()].into();
    let order = lock.topo_order(&requested);
    assert_eq!(order, vec!["i18n", "money"]);
}
