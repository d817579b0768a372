//! Type representation for the Mallard inference engine.
//!
//! Defines the core `Ty` enum and the algebra over it: union construction,
//! simplification (flatten, dedup, singleton collapse), and the shape
//! classifications (`optional`, `boolean`) that are detected from union
//! membership rather than stored as dedicated tags.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Class names the algebra treats specially.
pub const NIL_CLASS: &str = "NilClass";
pub const TRUE_CLASS: &str = "TrueClass";
pub const FALSE_CLASS: &str = "FalseClass";

/// The shape of a hash type -- either a fixed symbol-keyed record or a
/// homogeneous `Hash[K, V]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HashShape {
    /// A fixed record: `{ name: String, age: Integer }`.
    Record(BTreeMap<String, Ty>),
    /// A homogeneous map: `Hash[Symbol, Integer]`.
    Map(Box<Ty>, Box<Ty>),
}

/// An inferred type.
///
/// `Union` members live in a `BTreeSet`, so deduplication by structural
/// equality and order-independence hold by construction; `simplify`
/// maintains the remaining invariants (no nested unions, never a
/// single-member union).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Ty {
    /// An instance of a named class: `Integer`, `String`, `User`.
    Instance(String),
    /// A parametric array: `Array[T]`.
    Array(Box<Ty>),
    /// A hash, record-shaped or homogeneous.
    Hash(HashShape),
    /// Duck-typing evidence: the set of method names observed being called.
    Duck(BTreeSet<String>),
    /// An ambiguous result: at least two structurally distinct members.
    Union(BTreeSet<Ty>),
    /// Nothing could be determined.
    Unknown,
}

impl Ty {
    /// Create a class instance type.
    pub fn instance(name: impl Into<String>) -> Ty {
        Ty::Instance(name.into())
    }

    /// Create the `NilClass` instance type.
    pub fn nil() -> Ty {
        Ty::Instance(NIL_CLASS.into())
    }

    /// Create the boolean union `TrueClass | FalseClass`.
    pub fn bool_ty() -> Ty {
        Ty::Union(
            [Ty::instance(TRUE_CLASS), Ty::instance(FALSE_CLASS)]
                .into_iter()
                .collect(),
        )
    }

    /// Create `T?`, the two-member union of `t` and `NilClass`.
    pub fn optional(t: Ty) -> Ty {
        Ty::union(t, Ty::nil())
    }

    /// Create an `Array[T]` type.
    pub fn array(elem: Ty) -> Ty {
        Ty::Array(Box::new(elem))
    }

    /// Create a `Hash[K, V]` type.
    pub fn hash_map(key: Ty, value: Ty) -> Ty {
        Ty::Hash(HashShape::Map(Box::new(key), Box::new(value)))
    }

    /// Create duck-typing evidence from method names.
    pub fn duck<I, S>(methods: I) -> Ty
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ty::Duck(methods.into_iter().map(Into::into).collect())
    }

    /// Union of two types, normalized through `simplify`.
    pub fn union(a: Ty, b: Ty) -> Ty {
        Ty::Union([a, b].into_iter().collect()).simplify()
    }

    /// Union of an arbitrary number of types, normalized through `simplify`.
    pub fn union_of<I: IntoIterator<Item = Ty>>(members: I) -> Ty {
        Ty::Union(members.into_iter().collect()).simplify()
    }

    /// Normalize a type.
    ///
    /// Flattens nested unions, simplifies members recursively, drops
    /// duplicates, collapses a singleton union to its member, and turns an
    /// empty union into `Unknown`. A union mixing `Unknown` with known
    /// members drops the `Unknown` members: this engine reports best-effort
    /// guesses, and one undeterminable branch should not poison a merge.
    ///
    /// Idempotent: `t.simplify().simplify() == t.simplify()`.
    pub fn simplify(self) -> Ty {
        match self {
            Ty::Union(members) => {
                let mut flat: BTreeSet<Ty> = BTreeSet::new();
                for m in members {
                    match m.simplify() {
                        Ty::Union(inner) => flat.extend(inner),
                        other => {
                            flat.insert(other);
                        }
                    }
                }
                if flat.len() > 1 {
                    flat.remove(&Ty::Unknown);
                }
                let mut iter = flat.into_iter();
                match (iter.next(), iter.next()) {
                    (None, _) => Ty::Unknown,
                    (Some(only), None) => only,
                    (Some(a), Some(b)) => {
                        let mut set: BTreeSet<Ty> = [a, b].into_iter().collect();
                        set.extend(iter);
                        Ty::Union(set)
                    }
                }
            }
            Ty::Array(elem) => Ty::Array(Box::new(elem.simplify())),
            Ty::Hash(HashShape::Map(k, v)) => {
                Ty::Hash(HashShape::Map(Box::new(k.simplify()), Box::new(v.simplify())))
            }
            Ty::Hash(HashShape::Record(fields)) => Ty::Hash(HashShape::Record(
                fields.into_iter().map(|(k, v)| (k, v.simplify())).collect(),
            )),
            other => other,
        }
    }

    /// Whether this is the optional shape: a 2-member union containing
    /// `NilClass`.
    pub fn is_optional(&self) -> bool {
        match self {
            Ty::Union(members) => {
                members.len() == 2 && members.contains(&Ty::nil())
            }
            _ => false,
        }
    }

    /// Whether this is the boolean shape: exactly `TrueClass | FalseClass`.
    pub fn is_boolean(&self) -> bool {
        match self {
            Ty::Union(members) => {
                members.len() == 2
                    && members.contains(&Ty::instance(TRUE_CLASS))
                    && members.contains(&Ty::instance(FALSE_CLASS))
            }
            _ => false,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Ty::Unknown)
    }

    /// Whether a value of this type can be `nil` or `false` at runtime.
    ///
    /// `Unknown` and `Duck` conservatively can; so can any union carrying a
    /// falsy member.
    pub fn can_be_falsy(&self) -> bool {
        match self {
            Ty::Instance(name) => name == NIL_CLASS || name == FALSE_CLASS,
            Ty::Union(members) => members.iter().any(Ty::can_be_falsy),
            Ty::Unknown | Ty::Duck(_) => true,
            Ty::Array(_) | Ty::Hash(_) => false,
        }
    }

    /// The type with `NilClass` and `FalseClass` stripped.
    ///
    /// Models the value that survives the left side of `||`: if nothing
    /// survives (the type *is* falsy), the result is `Unknown` so the `Or`
    /// node falls through to its right side alone.
    pub fn without_falsy(self) -> Ty {
        fn is_falsy(t: &Ty) -> bool {
            matches!(t, Ty::Instance(name) if name == NIL_CLASS || name == FALSE_CLASS)
        }
        match self {
            Ty::Union(members) => {
                Ty::Union(members.into_iter().filter(|m| !is_falsy(m)).collect()).simplify()
            }
            t if is_falsy(&t) => Ty::Unknown,
            t => t,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Instance(name) => write!(f, "{name}"),
            Ty::Array(elem) => write!(f, "Array[{elem}]"),
            Ty::Hash(HashShape::Map(k, v)) => write!(f, "Hash[{k}, {v}]"),
            Ty::Hash(HashShape::Record(fields)) => {
                write!(f, "{{ ")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {ty}")?;
                }
                write!(f, " }}")
            }
            Ty::Duck(methods) => {
                write!(f, "duck(")?;
                for (i, m) in methods.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{m}")?;
                }
                write!(f, ")")
            }
            Ty::Union(members) => {
                if self.is_boolean() {
                    return write!(f, "bool");
                }
                if self.is_optional() {
                    let inner = members.iter().find(|m| **m != Ty::nil());
                    if let Some(inner) = inner {
                        return write!(f, "{inner}?");
                    }
                }
                for (i, m) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{m}")?;
                }
                Ok(())
            }
            Ty::Unknown => write!(f, "untyped"),
        }
    }
}
