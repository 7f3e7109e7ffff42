//! The `SExpr` data model (spec §3): the tree shape shared by every stage of
//! the pipeline from just after parsing through the end of macro expansion.
//!
//! `SExpr` is a closed, three-variant sum type. Everything else — named
//! arguments, dot-notation, vector import/export sugar, the placeholder `_`
//! — is a *property of a `Symbol`'s text* or a *shape of a `List`*, not a
//! separate variant. The [`crate::syntax`] module is the only place sugar is
//! allowed to exist; by the time an `SExpr` reaches the macro expander or the
//! lowerer it has already been canonicalized.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A half-open byte range into the original source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The smallest span covering both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// A value paired with the span it was read from. Used where the payload
/// isn't itself an `SExpr` (e.g. a resolved import path).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spanned<T> {
    pub value: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(value: T, span: Span) -> Self {
        Self { value, span }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Spanned<U> {
        Spanned {
            value: f(self.value),
            span: self.span,
        }
    }
}

/// A literal value: one of null, boolean, integer/float, or string (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Float(n) => write!(f, "{n}"),
            Literal::String(s) => write!(f, "{s:?}"),
        }
    }
}

/// The placeholder symbol. Reserved; never a binding target (spec §3).
pub const PLACEHOLDER: &str = "_";

/// The sigil that escapes a symbol to the host (ECMAScript) namespace.
pub const JS_ESCAPE_SIGIL: &str = "js/";

/// A symbol's textual identity. Case is preserved; `-` is mapped to `_` only
/// during lowering, never earlier (spec §3 invariant).
///
/// Sugar encoded in the text is inspected via the helper methods below
/// rather than split into separate fields, so that `SExpr` stays a genuine
/// three-variant sum type as spec §3 requires.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(s: impl Into<String>) -> Self {
        Symbol(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `js/`-prefixed symbols escape to the host namespace and are exempt
    /// from dot-chain and named-argument rewriting.
    pub fn is_js_escape(&self) -> bool {
        self.0.starts_with(JS_ESCAPE_SIGIL)
    }

    /// The identifier text with the `js/` sigil stripped, if present.
    pub fn without_js_escape(&self) -> &str {
        self.0.strip_prefix(JS_ESCAPE_SIGIL).unwrap_or(&self.0)
    }

    /// A trailing colon marks a named-argument label (e.g. `name:`).
    pub fn is_named_arg_label(&self) -> bool {
        !self.is_js_escape() && self.0.ends_with(':') && self.0.len() > 1
    }

    /// The label text with the trailing colon stripped.
    pub fn named_arg_label(&self) -> Option<&str> {
        if self.is_named_arg_label() {
            Some(&self.0[..self.0.len() - 1])
        } else {
            None
        }
    }

    /// `_` requests "use this parameter's declared default" at a call site.
    pub fn is_placeholder(&self) -> bool {
        self.0 == PLACEHOLDER
    }

    /// An embedded `.` (outside the `js/` escape) marks method-access sugar.
    /// Returns the dot-separated segments, left to right.
    pub fn dot_segments(&self) -> Option<Vec<&str>> {
        if self.is_js_escape() || !self.0.contains('.') {
            return None;
        }
        let segments: Vec<&str> = self.0.split('.').collect();
        if segments.len() > 1 && segments.iter().all(|s| !s.is_empty()) {
            Some(segments)
        } else {
            None
        }
    }

    /// Lowering's `-` → `_` identifier-mangling rule (spec §3 invariant).
    pub fn mangled(&self) -> String {
        self.0.replace('-', "_")
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The S-expression tree (spec §3): `Literal | Symbol | List`.
///
/// The empty list is the empty array literal; it has no special variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SExpr {
    Literal(Literal, Span),
    Symbol(Symbol, Span),
    List(Vec<SExpr>, Span),
}

impl SExpr {
    pub fn symbol(name: impl Into<String>, span: Span) -> Self {
        SExpr::Symbol(Symbol::new(name), span)
    }

    pub fn list(items: Vec<SExpr>, span: Span) -> Self {
        SExpr::List(items, span)
    }

    pub fn span(&self) -> Span {
        match self {
            SExpr::Literal(_, span) | SExpr::Symbol(_, span) | SExpr::List(_, span) => *span,
        }
    }

    /// The head symbol of a list, if this is a non-empty list whose first
    /// element is itself a symbol. Every dispatch decision in the syntax
    /// transformer and the lowerer starts here.
    pub fn head_symbol(&self) -> Option<&Symbol> {
        match self {
            SExpr::List(items, _) => match items.first() {
                Some(SExpr::Symbol(s, _)) => Some(s),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SExpr]> {
        match self {
            SExpr::List(items, _) => Some(items),
            _ => None,
        }
    }

    pub fn into_list(self) -> Option<Vec<SExpr>> {
        match self {
            SExpr::List(items, _) => Some(items),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            SExpr::Symbol(s, _) => Some(s),
            _ => None,
        }
    }

    /// A compact textual rendering, used in diagnostics and expansion traces.
    pub fn pretty(&self) -> String {
        match self {
            SExpr::Literal(lit, _) => lit.to_string(),
            SExpr::Symbol(s, _) => s.to_string(),
            SExpr::List(items, _) => {
                let inner = items.iter().map(SExpr::pretty).collect::<Vec<_>>().join(" ");
                format!("({inner})")
            }
        }
    }
}

/// `CanonicalSExpr` is the output of the [`crate::syntax`] stage: an `SExpr`
/// whose head (at every list position) is a member of the closed form set
/// in spec §3. It is a thin newtype rather than a distinct tree shape —
/// canonicalization only rewrites sugar, it never introduces node kinds
/// `SExpr` can't already represent — but the wrapper lets every later stage
/// require "already canonical" in its signature instead of re-checking it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalSExpr(pub SExpr);

impl CanonicalSExpr {
    /// Wraps an already-canonical `SExpr`. Callers outside [`crate::syntax`]
    /// should only ever receive these from [`crate::syntax::canonicalize`].
    pub fn assume_canonical(expr: SExpr) -> Self {
        CanonicalSExpr(expr)
    }

    pub fn span(&self) -> Span {
        self.0.span()
    }
}
