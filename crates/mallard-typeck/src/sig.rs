//! Method signatures and overload resolution.
//!
//! A signature records the parameter list (name, kind, type) and return type
//! of a method, whether it came from project code, a cached gem, or an
//! external interface corpus. `select_overload` implements the scoring the
//! resolver uses to pick among candidate signatures at a call site.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ty::Ty;

/// Whether a method lives on instances or on the class itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MethodKind {
    Instance,
    Singleton,
}

/// The calling-convention slot a parameter occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamKind {
    Required,
    Optional,
    Rest,
    Keyword,
    KeywordOptional,
    Block,
}

/// One parameter of a method signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamSig {
    pub name: String,
    pub kind: ParamKind,
    pub ty: Ty,
}

impl ParamSig {
    pub fn new(name: impl Into<String>, kind: ParamKind, ty: Ty) -> Self {
        Self { name: name.into(), kind, ty }
    }

    pub fn required(name: impl Into<String>, ty: Ty) -> Self {
        Self::new(name, ParamKind::Required, ty)
    }
}

/// An inferred or declared method signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSig {
    pub params: Vec<ParamSig>,
    pub ret: Ty,
}

impl MethodSig {
    pub fn new(params: Vec<ParamSig>, ret: Ty) -> Self {
        Self { params, ret }
    }

    /// A parameterless signature.
    pub fn constant(ret: Ty) -> Self {
        Self { params: Vec::new(), ret }
    }

    fn positional_params(&self) -> impl Iterator<Item = &ParamSig> {
        self.params
            .iter()
            .filter(|p| matches!(p.kind, ParamKind::Required | ParamKind::Optional | ParamKind::Rest))
    }

    fn keyword_param(&self, name: &str) -> Option<&ParamSig> {
        self.params.iter().find(|p| {
            p.name == name && matches!(p.kind, ParamKind::Keyword | ParamKind::KeywordOptional)
        })
    }

    fn count(&self, kind: ParamKind) -> usize {
        self.params.iter().filter(|p| p.kind == kind).count()
    }
}

impl fmt::Display for MethodSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match p.kind {
                ParamKind::Required => write!(f, "{} {}", p.ty, p.name)?,
                ParamKind::Optional => write!(f, "?{} {}", p.ty, p.name)?,
                ParamKind::Rest => write!(f, "*{} {}", p.ty, p.name)?,
                ParamKind::Keyword => write!(f, "{}: {}", p.name, p.ty)?,
                ParamKind::KeywordOptional => write!(f, "?{}: {}", p.name, p.ty)?,
                ParamKind::Block => write!(f, "&{}", p.name)?,
            }
        }
        write!(f, ") -> {}", self.ret)
    }
}

/// How well an argument fits a parameter slot.
///
/// Exact structural equality scores highest; `Unknown` on either side is
/// weak evidence either way; a union parameter accepting the argument as a
/// member still counts.
fn compat(arg: &Ty, param: &Ty) -> i32 {
    if arg == param {
        return 2;
    }
    if arg.is_unknown() || param.is_unknown() {
        return 1;
    }
    if let Ty::Union(members) = param {
        if members.contains(arg) {
            return 1;
        }
    }
    0
}

/// Score a candidate signature against a call site, or `None` when the
/// arity cannot fit at all.
fn score(sig: &MethodSig, positional: &[Ty], keywords: &[(String, Ty)]) -> Option<i32> {
    let required = sig.count(ParamKind::Required);
    let optional = sig.count(ParamKind::Optional);
    let has_rest = sig.count(ParamKind::Rest) > 0;

    if positional.len() < required {
        return None;
    }
    if !has_rest && positional.len() > required + optional {
        return None;
    }

    let mut total = 1;
    if positional.len() == required {
        total += 2;
    }

    // Pair positional args with positional params in order; a rest param
    // absorbs the tail.
    let params: Vec<&ParamSig> = sig.positional_params().collect();
    for (i, arg) in positional.iter().enumerate() {
        let param = params.get(i).or_else(|| {
            params.last().filter(|p| p.kind == ParamKind::Rest)
        });
        if let Some(param) = param {
            let slot_ty = match (&param.kind, &param.ty) {
                (ParamKind::Rest, Ty::Array(elem)) => (**elem).clone(),
                _ => param.ty.clone(),
            };
            total += compat(arg, &slot_ty);
        }
    }

    for (name, arg) in keywords {
        match sig.keyword_param(name) {
            Some(param) => total += 2 + compat(arg, &param.ty),
            None => total -= 1,
        }
    }

    // A required keyword with no matching argument disqualifies the
    // candidate outright.
    for p in &sig.params {
        if p.kind == ParamKind::Keyword && !keywords.iter().any(|(n, _)| n == &p.name) {
            return None;
        }
    }

    Some(total)
}

/// Pick the best-fitting overload for a call site.
///
/// The maximum-scoring candidate wins; ties go to the earliest candidate.
/// When no candidate scores above zero the first signature is returned as
/// the fallback. `None` only for an empty candidate list.
pub fn select_overload<'s>(
    sigs: &'s [MethodSig],
    positional: &[Ty],
    keywords: &[(String, Ty)],
) -> Option<&'s MethodSig> {
    let mut best: Option<(&MethodSig, i32)> = None;
    for sig in sigs {
        if let Some(s) = score(sig, positional, keywords) {
            if s > 0 && best.map_or(true, |(_, b)| s > b) {
                best = Some((sig, s));
            }
        }
    }
    best.map(|(sig, _)| sig).or_else(|| sigs.first())
}
