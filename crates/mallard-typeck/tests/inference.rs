//! End-to-end inference tests over hand-built node graphs.
//!
//! These tests exercise:
//! - Literal, branch-merge, and or-node dataflow
//! - Duck-typing concretization of parameters from call evidence
//! - Registry fallback for instance variables, with ancestor traversal
//! - Call dispatch through core signatures, container substitution, and
//!   project method definitions
//! - Memoization identity and the file-removal/re-index lifecycle

use std::rc::Rc;

use mallard_typeck::node::{Node, NodeKey, NodeKind};
use mallard_typeck::sig::{MethodKind, ParamKind};
use mallard_typeck::source::MapAncestors;
use mallard_typeck::{Engine, Ty};

// ── Helpers ────────────────────────────────────────────────────────────

fn literal(engine: &mut Engine, file: &str, scope: &str, ty: Ty) -> NodeKey {
    engine
        .insert_node(file, Node::new(NodeKind::Literal { ty }, scope, None))
        .unwrap()
}

fn insert(engine: &mut Engine, file: &str, scope: &str, kind: NodeKind) -> NodeKey {
    engine.insert_node(file, Node::new(kind, scope, None)).unwrap()
}

/// A class whose only instance method is a def returning a string literal.
fn define_string_method(engine: &mut Engine, file: &str, class: &str, method: &str) -> NodeKey {
    let scope = format!("{class}#{method}");
    let ret = literal(engine, file, &scope, Ty::instance("String"));
    let def = insert(
        engine,
        file,
        &scope,
        NodeKind::Def {
            name: method.into(),
            class_name: class.into(),
            singleton: false,
            params: vec![],
            return_node: Some(ret),
        },
    );
    engine
        .registries
        .methods
        .register(class, MethodKind::Instance, method, def.clone(), file);
    def
}

// ── Dataflow ───────────────────────────────────────────────────────────

#[test]
fn literal_assignment_flows_to_read() {
    let mut engine = Engine::new();
    let lit = literal(&mut engine, "a.rb", "main", Ty::instance("Integer"));
    let write = insert(
        &mut engine,
        "a.rb",
        "main",
        NodeKind::LocalWrite { name: "x".into(), value: Some(lit) },
    );
    let read = insert(
        &mut engine,
        "a.rb",
        "main",
        NodeKind::LocalRead { name: "x".into(), write_node: None, called: None },
    );
    engine.arena.set_write_node(&read, write).unwrap();

    let mut session = engine.session();
    assert_eq!(session.infer(&read).ty, Ty::instance("Integer"));
}

#[test]
fn branch_merge_is_an_order_independent_union() {
    let mut engine = Engine::new();
    let s = literal(&mut engine, "a.rb", "main", Ty::instance("String"));
    let i = literal(&mut engine, "a.rb", "main", Ty::instance("Integer"));
    let ab = insert(
        &mut engine,
        "a.rb",
        "main",
        NodeKind::Merge { branches: vec![s.clone(), i.clone()] },
    );
    let ba = insert(&mut engine, "a.rb", "main", NodeKind::Merge { branches: vec![i, s] });

    let mut session = engine.session();
    let expected = Ty::union(Ty::instance("String"), Ty::instance("Integer"));
    assert_eq!(session.infer(&ab).ty, expected);
    assert_eq!(session.infer(&ba).ty, expected);
}

#[test]
fn or_assignment_drops_nil_from_the_left() {
    let mut engine = Engine::new();
    // x = maybe_name || "anonymous"
    let lhs = literal(&mut engine, "a.rb", "main", Ty::optional(Ty::instance("String")));
    let rhs = literal(&mut engine, "a.rb", "main", Ty::instance("String"));
    let or = insert(&mut engine, "a.rb", "main", NodeKind::Or { lhs, rhs });

    let mut session = engine.session();
    assert_eq!(session.infer(&or).ty, Ty::instance("String"));
}

#[test]
fn unknown_branch_does_not_poison_a_merge() {
    let mut engine = Engine::new();
    let known = literal(&mut engine, "a.rb", "main", Ty::instance("Float"));
    let unknown = insert(
        &mut engine,
        "a.rb",
        "main",
        NodeKind::LocalRead { name: "mystery".into(), write_node: None, called: None },
    );
    let merge = insert(
        &mut engine,
        "a.rb",
        "main",
        NodeKind::Merge { branches: vec![known, unknown] },
    );

    let mut session = engine.session();
    assert_eq!(session.infer(&merge).ty, Ty::instance("Float"));
}

// ── Duck typing ────────────────────────────────────────────────────────

#[test]
fn parameter_concretized_from_unique_call_evidence() {
    let mut engine = Engine::new();
    define_string_method(&mut engine, "logger.rb", "Logger", "warn");
    define_string_method(&mut engine, "user.rb", "User", "name");

    let set = engine.arena.new_method_set("svc.rb");
    engine.arena.record_called_method(set, "warn");
    let param = insert(
        &mut engine,
        "svc.rb",
        "Service#run",
        NodeKind::Param {
            name: "out".into(),
            kind: ParamKind::Required,
            default_value: None,
            called: set,
        },
    );

    let mut session = engine.session();
    assert_eq!(session.infer(&param).ty, Ty::instance("Logger"));
}

#[test]
fn universal_methods_carry_no_duck_evidence() {
    let mut engine = Engine::new();
    define_string_method(&mut engine, "logger.rb", "Logger", "warn");

    let set = engine.arena.new_method_set("svc.rb");
    engine.arena.record_called_method(set, "to_s");
    engine.arena.record_called_method(set, "inspect");
    let param = insert(
        &mut engine,
        "svc.rb",
        "Service#run",
        NodeKind::Param {
            name: "anything".into(),
            kind: ParamKind::Required,
            default_value: None,
            called: set,
        },
    );

    let mut session = engine.session();
    assert!(session.infer(&param).ty.is_unknown());
}

#[test]
fn shared_evidence_becomes_a_union_of_candidates() {
    let mut engine = Engine::new();
    define_string_method(&mut engine, "a.rb", "File", "read");
    define_string_method(&mut engine, "b.rb", "StringIO", "read");

    let set = engine.arena.new_method_set("svc.rb");
    engine.arena.record_called_method(set, "read");
    let param = insert(
        &mut engine,
        "svc.rb",
        "Service#run",
        NodeKind::Param {
            name: "io".into(),
            kind: ParamKind::Required,
            default_value: None,
            called: set,
        },
    );

    let mut session = engine.session();
    assert_eq!(
        session.infer(&param).ty,
        Ty::union(Ty::instance("File"), Ty::instance("StringIO"))
    );
}

// ── Registry fallback ──────────────────────────────────────────────────

#[test]
fn instance_variable_read_falls_back_to_registry() {
    let mut engine = Engine::new();
    let value = literal(&mut engine, "user.rb", "User#initialize", Ty::instance("String"));
    let write = insert(
        &mut engine,
        "user.rb",
        "User#initialize",
        NodeKind::InstanceVariableWrite {
            name: "@name".into(),
            class_name: "User".into(),
            value: Some(value),
        },
    );
    engine
        .registries
        .instance_variables
        .register("User", "@name", write, "user.rb");

    // A read in a different method, never linked to the write directly.
    let read = insert(
        &mut engine,
        "user.rb",
        "User#greeting",
        NodeKind::InstanceVariableRead {
            name: "@name".into(),
            class_name: "User".into(),
            write_node: None,
        },
    );

    let mut session = engine.session();
    assert_eq!(session.infer(&read).ty, Ty::instance("String"));
}

#[test]
fn instance_variable_fallback_traverses_ancestors() {
    let mut engine = Engine::new();
    let value = literal(&mut engine, "base.rb", "Base#initialize", Ty::instance("Integer"));
    let write = insert(
        &mut engine,
        "base.rb",
        "Base#initialize",
        NodeKind::InstanceVariableWrite {
            name: "@id".into(),
            class_name: "Base".into(),
            value: Some(value),
        },
    );
    engine.registries.instance_variables.register("Base", "@id", write, "base.rb");

    let mut ancestors = MapAncestors::new();
    ancestors.insert("User", vec!["Base".to_string(), "Object".to_string()]);
    engine.set_ancestors(Box::new(ancestors));

    let read = insert(
        &mut engine,
        "user.rb",
        "User#show",
        NodeKind::InstanceVariableRead {
            name: "@id".into(),
            class_name: "User".into(),
            write_node: None,
        },
    );

    let mut session = engine.session();
    assert_eq!(session.infer(&read).ty, Ty::instance("Integer"));
}

#[test]
fn class_variables_do_not_traverse_ancestors() {
    let mut engine = Engine::new();
    let value = literal(&mut engine, "base.rb", "Base", Ty::instance("Integer"));
    let write = insert(
        &mut engine,
        "base.rb",
        "Base",
        NodeKind::ClassVariableWrite {
            name: "@@count".into(),
            class_name: "Base".into(),
            value: Some(value),
        },
    );
    engine.registries.class_variables.register("Base", "@@count", write, "base.rb");

    let mut ancestors = MapAncestors::new();
    ancestors.insert("User", vec!["Base".to_string()]);
    engine.set_ancestors(Box::new(ancestors));

    let read = insert(
        &mut engine,
        "user.rb",
        "User",
        NodeKind::ClassVariableRead {
            name: "@@count".into(),
            class_name: "User".into(),
            write_node: None,
        },
    );

    let mut session = engine.session();
    assert!(session.infer(&read).ty.is_unknown());
}

// ── Calls ──────────────────────────────────────────────────────────────

#[test]
fn call_on_project_class_infers_the_def() {
    let mut engine = Engine::new();
    define_string_method(&mut engine, "user.rb", "User", "name");
    let recv = literal(&mut engine, "a.rb", "main", Ty::instance("User"));
    let call = insert(
        &mut engine,
        "a.rb",
        "main",
        NodeKind::Call {
            receiver: Some(recv),
            method: "name".into(),
            positional: vec![],
            keywords: vec![],
        },
    );

    let mut session = engine.session();
    assert_eq!(session.infer(&call).ty, Ty::instance("String"));
}

#[test]
fn scalar_calls_answered_by_core_signatures() {
    let mut engine = Engine::new();
    let recv = literal(&mut engine, "a.rb", "main", Ty::instance("String"));
    let call = insert(
        &mut engine,
        "a.rb",
        "main",
        NodeKind::Call {
            receiver: Some(recv),
            method: "length".into(),
            positional: vec![],
            keywords: vec![],
        },
    );

    let mut session = engine.session();
    assert_eq!(session.infer(&call).ty, Ty::instance("Integer"));
}

#[test]
fn container_calls_preserve_the_element_type() {
    let mut engine = Engine::new();
    let arr = literal(&mut engine, "a.rb", "main", Ty::array(Ty::instance("Integer")));
    let first = insert(
        &mut engine,
        "a.rb",
        "main",
        NodeKind::Call {
            receiver: Some(arr.clone()),
            method: "first".into(),
            positional: vec![],
            keywords: vec![],
        },
    );
    let size = insert(
        &mut engine,
        "a.rb",
        "main",
        NodeKind::Call {
            receiver: Some(arr),
            method: "size".into(),
            positional: vec![],
            keywords: vec![],
        },
    );

    let mut session = engine.session();
    assert_eq!(session.infer(&first).ty, Ty::optional(Ty::instance("Integer")));
    assert_eq!(session.infer(&size).ty, Ty::instance("Integer"));
}

#[test]
fn union_receiver_fans_out_and_unions_the_answers() {
    let mut engine = Engine::new();
    define_string_method(&mut engine, "a.rb", "Markdown", "render");
    let html = {
        // Html#render returns Integer, to make the union observable.
        let ret = literal(&mut engine, "b.rb", "Html#render", Ty::instance("Integer"));
        let def = insert(
            &mut engine,
            "b.rb",
            "Html#render",
            NodeKind::Def {
                name: "render".into(),
                class_name: "Html".into(),
                singleton: false,
                params: vec![],
                return_node: Some(ret),
            },
        );
        def
    };
    engine
        .registries
        .methods
        .register("Html", MethodKind::Instance, "render", html, "b.rb");

    let recv = literal(
        &mut engine,
        "c.rb",
        "main",
        Ty::union(Ty::instance("Markdown"), Ty::instance("Html")),
    );
    let call = insert(
        &mut engine,
        "c.rb",
        "main",
        NodeKind::Call {
            receiver: Some(recv),
            method: "render".into(),
            positional: vec![],
            keywords: vec![],
        },
    );

    let mut session = engine.session();
    assert_eq!(
        session.infer(&call).ty,
        Ty::union(Ty::instance("String"), Ty::instance("Integer"))
    );
}

#[test]
fn receiverless_call_dispatches_on_object() {
    let mut engine = Engine::new();
    define_string_method(&mut engine, "obj.rb", "Object", "helper");
    let call = insert(
        &mut engine,
        "a.rb",
        "main",
        NodeKind::Call {
            receiver: None,
            method: "helper".into(),
            positional: vec![],
            keywords: vec![],
        },
    );

    let mut session = engine.session();
    assert_eq!(session.infer(&call).ty, Ty::instance("String"));
}

#[test]
fn class_receiver_dispatches_singleton_methods() {
    let mut engine = Engine::new();
    // class User; def self.find; ...; end; end  plus  User.find / User.new
    let body = literal(&mut engine, "user.rb", "User", Ty::nil());
    let class = insert(
        &mut engine,
        "user.rb",
        "main",
        NodeKind::ClassModule { name: "User".into(), body: Some(body) },
    );
    let ret = literal(&mut engine, "user.rb", "User.find", Ty::instance("User"));
    let def = insert(
        &mut engine,
        "user.rb",
        "User.find",
        NodeKind::Def {
            name: "find".into(),
            class_name: "User".into(),
            singleton: true,
            params: vec![],
            return_node: Some(ret),
        },
    );
    engine
        .registries
        .methods
        .register("User", MethodKind::Singleton, "find", def, "user.rb");

    let constant = insert(
        &mut engine,
        "app.rb",
        "main",
        NodeKind::Constant { name: "User".into(), dependency: Some(class) },
    );
    let find = insert(
        &mut engine,
        "app.rb",
        "main",
        NodeKind::Call {
            receiver: Some(constant.clone()),
            method: "find".into(),
            positional: vec![],
            keywords: vec![],
        },
    );
    let new = insert(
        &mut engine,
        "app.rb",
        "main",
        NodeKind::Call {
            receiver: Some(constant),
            method: "new".into(),
            positional: vec![],
            keywords: vec![],
        },
    );

    let mut session = engine.session();
    assert_eq!(session.infer(&find).ty, Ty::instance("User"));
    assert_eq!(session.infer(&new).ty, Ty::instance("User"));
}

#[test]
fn block_parameters_take_the_element_type() {
    let mut engine = Engine::new();
    let arr = literal(&mut engine, "a.rb", "main", Ty::array(Ty::instance("String")));
    let each = insert(
        &mut engine,
        "a.rb",
        "main",
        NodeKind::Call {
            receiver: Some(arr),
            method: "each_with_index".into(),
            positional: vec![],
            keywords: vec![],
        },
    );
    let slot0 = insert(
        &mut engine,
        "a.rb",
        "main",
        NodeKind::BlockParamSlot { call: each.clone(), index: 0 },
    );
    let slot1 = insert(&mut engine, "a.rb", "main", NodeKind::BlockParamSlot { call: each, index: 1 });

    let mut session = engine.session();
    assert_eq!(session.infer(&slot0).ty, Ty::instance("String"));
    assert_eq!(session.infer(&slot1).ty, Ty::instance("Integer"));
}

// ── Session lifecycle ──────────────────────────────────────────────────

#[test]
fn memoized_results_are_reference_equal_until_cleared() {
    let mut engine = Engine::new();
    let lit = literal(&mut engine, "a.rb", "main", Ty::instance("Integer"));

    let mut session = engine.session();
    let a = session.infer(&lit);
    let b = session.infer(&lit);
    assert!(Rc::ptr_eq(&a, &b));

    session.clear_cache();
    let c = session.infer(&lit);
    assert!(!Rc::ptr_eq(&a, &c));
    assert_eq!(a.ty, c.ty);
}

#[test]
fn self_referential_assignment_terminates_as_unknown() {
    let mut engine = Engine::new();
    let read = insert(
        &mut engine,
        "a.rb",
        "main",
        NodeKind::LocalRead { name: "x".into(), write_node: None, called: None },
    );
    let write = insert(
        &mut engine,
        "a.rb",
        "main",
        NodeKind::LocalWrite { name: "x".into(), value: Some(read.clone()) },
    );
    engine.arena.set_write_node(&read, write.clone()).unwrap();

    let mut session = engine.session();
    assert!(session.infer(&write).ty.is_unknown());
    assert!(session.infer(&read).ty.is_unknown());
}

#[test]
fn removing_a_file_unregisters_its_definitions() {
    let mut engine = Engine::new();
    define_string_method(&mut engine, "user.rb", "User", "name");

    {
        let mut session = engine.session();
        assert!(session.method_signature("User", "name").is_ok());
    }

    engine.remove_file("user.rb");
    let mut session = engine.session();
    assert!(session.method_signature("User", "name").is_err());
}
