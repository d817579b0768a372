//! Built-in knowledge about the language's core classes.
//!
//! Three pieces live here:
//! - the universal-method list the duck-typing search must ignore,
//! - element-type substitution for container receivers (`Array[T]` /
//!   `Hash[K, V]`), applied before any generic signature lookup so the
//!   element type is preserved rather than re-queried,
//! - `CoreSignatures`, a signature source covering the scalar core classes.

use rustc_hash::FxHashMap;

use crate::sig::{MethodKind, MethodSig, ParamKind, ParamSig};
use crate::source::SignatureSource;
use crate::ty::{HashShape, Ty};

/// Methods present on every object. They carry zero discriminating power
/// for duck typing and would explode the candidate set, so the search
/// strips them from its query.
pub const UNIVERSAL_METHODS: &[&str] = &[
    "==", "!=", "!", "equal?", "eql?", "hash", "object_id", "inspect", "to_s",
    "class", "is_a?", "kind_of?", "instance_of?", "nil?", "respond_to?",
    "frozen?", "freeze", "dup", "clone", "send", "public_send", "method",
    "methods", "tap", "then", "display", "instance_variable_get",
    "instance_variable_set",
];

pub fn is_universal_method(name: &str) -> bool {
    UNIVERSAL_METHODS.contains(&name)
}

/// Methods whose block receives the receiver's elements. Used by
/// `BlockParamSlot` inference.
pub const ITERATION_METHODS: &[&str] = &[
    "each", "map", "collect", "flat_map", "select", "filter", "reject",
    "find", "detect", "find_all", "sort_by", "min_by", "max_by", "group_by",
    "partition", "count", "sum", "all?", "any?", "none?", "each_with_object",
];

pub fn is_iteration_method(name: &str) -> bool {
    ITERATION_METHODS.contains(&name)
}

fn int() -> Ty {
    Ty::instance("Integer")
}

fn string() -> Ty {
    Ty::instance("String")
}

/// Element-type substitution for container receivers.
///
/// Answers calls on `Array[T]` and hash receivers directly from the element
/// types (`compact` on `Array[T?]` keeps `T`; `first` is `T?`; `keys` on
/// `Hash[K, V]` is `Array[K]`), so `T` is never lost to a generic `Array`
/// signature. Returns `None` for methods the substitution does not cover;
/// the resolver then falls through to the signature chain.
pub fn container_call(receiver: &Ty, method: &str, _args: &[Ty]) -> Option<Ty> {
    match receiver {
        Ty::Array(elem) => array_call(elem, method),
        Ty::Hash(shape) => hash_call(shape, method),
        _ => None,
    }
}

fn array_call(elem: &Ty, method: &str) -> Option<Ty> {
    let elem = elem.clone();
    let ty = match method {
        "first" | "last" | "pop" | "shift" | "sample" | "min" | "max" | "find" | "detect" => {
            Ty::optional(elem)
        }
        "compact" => Ty::array(elem.without_falsy()),
        "uniq" | "sort" | "reverse" | "flatten" | "take" | "drop" | "select" | "filter"
        | "reject" | "sort_by" | "shuffle" | "rotate" | "each" | "push" | "concat" => {
            Ty::array(elem)
        }
        "map" | "collect" | "flat_map" => Ty::array(Ty::Unknown),
        "sum" => elem,
        "size" | "length" | "count" | "index" => int(),
        "empty?" | "include?" | "any?" | "all?" | "none?" => Ty::bool_ty(),
        "join" => string(),
        "to_a" => Ty::array(elem),
        _ => return None,
    };
    Some(ty)
}

fn hash_call(shape: &HashShape, method: &str) -> Option<Ty> {
    let (key_ty, value_ty) = match shape {
        HashShape::Map(k, v) => (k.as_ref().clone(), v.as_ref().clone()),
        HashShape::Record(fields) => (
            Ty::instance("Symbol"),
            Ty::union_of(fields.values().cloned()),
        ),
    };
    let ty = match method {
        "keys" => Ty::array(key_ty),
        "values" => Ty::array(value_ty),
        "fetch" | "dig" => value_ty,
        "[]" => Ty::optional(value_ty),
        "size" | "length" | "count" => int(),
        "empty?" | "key?" | "has_key?" | "include?" | "member?" | "value?" | "has_value?" => {
            Ty::bool_ty()
        }
        "merge" | "to_h" | "each" => Ty::Hash(shape.clone()),
        _ => return None,
    };
    Some(ty)
}

/// The types a container method yields to its block, by slot.
pub fn block_param_tys(receiver: &Ty, method: &str) -> Option<Vec<Ty>> {
    match receiver {
        Ty::Array(elem) => {
            if method == "each_with_index" {
                return Some(vec![elem.as_ref().clone(), int()]);
            }
            is_iteration_method(method).then(|| vec![elem.as_ref().clone()])
        }
        Ty::Hash(HashShape::Map(k, v)) => is_iteration_method(method)
            .then(|| vec![k.as_ref().clone(), v.as_ref().clone()]),
        Ty::Hash(HashShape::Record(fields)) => is_iteration_method(method).then(|| {
            vec![
                Ty::instance("Symbol"),
                Ty::union_of(fields.values().cloned()),
            ]
        }),
        _ => None,
    }
}

/// Signature source for the scalar core classes (`Integer`, `Float`,
/// `String`, `Symbol`, `NilClass`).
///
/// Container classes are intentionally absent: their calls go through
/// `container_call` so element types survive.
pub struct CoreSignatures {
    sigs: FxHashMap<(&'static str, &'static str), Vec<MethodSig>>,
}

impl Default for CoreSignatures {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreSignatures {
    pub fn new() -> Self {
        let mut sigs: FxHashMap<(&'static str, &'static str), Vec<MethodSig>> =
            FxHashMap::default();

        let mut add = |class, method, params: Vec<ParamSig>, ret| {
            sigs.entry((class, method))
                .or_default()
                .push(MethodSig::new(params, ret));
        };

        // ── Integer ─────────────────────────────────────────────────────
        for op in ["+", "-", "*", "%", "&", "|", "^", "abs", "succ", "pred"] {
            let params = if op.chars().all(|c| c.is_ascii_punctuation()) {
                vec![ParamSig::required("other", int())]
            } else {
                vec![]
            };
            add("Integer", op, params, int());
        }
        // Division is overloaded: Integer / Integer -> Integer,
        // Integer / Float -> Float.
        add("Integer", "/", vec![ParamSig::required("other", int())], int());
        add(
            "Integer",
            "/",
            vec![ParamSig::required("other", Ty::instance("Float"))],
            Ty::instance("Float"),
        );
        add("Integer", "to_s", vec![], string());
        add("Integer", "to_i", vec![], int());
        add("Integer", "to_f", vec![], Ty::instance("Float"));
        add("Integer", "times", vec![], int());
        for pred in ["zero?", "positive?", "negative?", "even?", "odd?"] {
            add("Integer", pred, vec![], Ty::bool_ty());
        }

        // ── Float ───────────────────────────────────────────────────────
        for op in ["+", "-", "*", "/", "abs"] {
            let params = if op.len() == 1 {
                vec![ParamSig::required("other", Ty::instance("Float"))]
            } else {
                vec![]
            };
            add("Float", op, params, Ty::instance("Float"));
        }
        add("Float", "round", vec![], int());
        add("Float", "floor", vec![], int());
        add("Float", "ceil", vec![], int());
        add("Float", "to_i", vec![], int());
        add("Float", "to_f", vec![], Ty::instance("Float"));
        add("Float", "to_s", vec![], string());
        add("Float", "nan?", vec![], Ty::bool_ty());

        // ── String ──────────────────────────────────────────────────────
        for m in ["upcase", "downcase", "capitalize", "strip", "chomp", "chop", "reverse", "squeeze", "tr"] {
            add("String", m, vec![], string());
        }
        add("String", "+", vec![ParamSig::required("other", string())], string());
        add("String", "*", vec![ParamSig::required("count", int())], string());
        add("String", "length", vec![], int());
        add("String", "size", vec![], int());
        add("String", "bytesize", vec![], int());
        add("String", "to_i", vec![], int());
        add("String", "to_f", vec![], Ty::instance("Float"));
        add("String", "to_s", vec![], string());
        add("String", "to_sym", vec![], Ty::instance("Symbol"));
        add("String", "chars", vec![], Ty::array(string()));
        add("String", "lines", vec![], Ty::array(string()));
        add(
            "String",
            "split",
            vec![ParamSig::new("sep", ParamKind::Optional, string())],
            Ty::array(string()),
        );
        for pred in ["empty?", "include?", "start_with?", "end_with?", "match?"] {
            let params = if pred == "empty?" {
                vec![]
            } else {
                vec![ParamSig::required("other", string())]
            };
            add("String", pred, params, Ty::bool_ty());
        }

        // ── Symbol ──────────────────────────────────────────────────────
        add("Symbol", "to_s", vec![], string());
        add("Symbol", "to_sym", vec![], Ty::instance("Symbol"));
        add("Symbol", "to_proc", vec![], Ty::instance("Proc"));

        // ── NilClass ────────────────────────────────────────────────────
        add("NilClass", "to_s", vec![], string());
        add("NilClass", "to_a", vec![], Ty::array(Ty::Unknown));
        add("NilClass", "to_i", vec![], int());
        add("NilClass", "nil?", vec![], Ty::bool_ty());

        // ── Comparison, shared by the scalar classes ────────────────────
        for class in ["Integer", "Float", "String"] {
            for cmp in ["<", ">", "<=", ">=", "=="] {
                add(
                    class,
                    cmp,
                    vec![ParamSig::required("other", Ty::Unknown)],
                    Ty::bool_ty(),
                );
            }
        }

        Self { sigs }
    }
}

impl SignatureSource for CoreSignatures {
    fn resolve_call(
        &self,
        class: &str,
        method: &str,
        positional: &[Ty],
        keywords: &[(String, Ty)],
        kind: MethodKind,
    ) -> Option<Ty> {
        if kind == MethodKind::Singleton {
            return None;
        }
        let sigs = self.sigs.get(&(class, method))?;
        crate::sig::select_overload(sigs, positional, keywords).map(|s| s.ret.clone())
    }

    fn signature(&self, class: &str, method: &str, kind: MethodKind) -> Option<MethodSig> {
        if kind == MethodKind::Singleton {
            return None;
        }
        self.sigs.get(&(class, method)).and_then(|s| s.first()).cloned()
    }
}
