//! The Syntax Transformer (spec §4.1): `SExpr → CanonicalSExpr`.
//!
//! This stage normalizes surface sugar into the small closed set of forms
//! spec §3 lists. After this stage nothing downstream needs to know that
//! `[a, b as c]` or a dotted `obj.method` call ever existed in the source
//! text — only the canonical shapes below.
//!
//! Two sugars need a concrete representation choice the spec leaves open:
//!
//! - **Bracket vectors** (`[a, b]`) have no dedicated `SExpr` variant (spec
//!   §3 is a strict three-variant sum type), so the reference parser
//!   ([`crate::parser`]) emits them as a `List` headed by the sentinel
//!   symbol [`VECTOR_MARKER`]. This stage consumes that marker; nothing
//!   past this stage should ever see one.
//! - **`as`-aliasing** (`b as c`) inside an import vector is regrouped into
//!   a two-element `(alias b c)` sublist.
//!
//! Dot-notation is rewritten everywhere *except* inside `quote`d data, since
//! a quoted dotted symbol is literal data, not a method-access expression.

use crate::sexpr::{CanonicalSExpr, SExpr, Span, Symbol};

/// Sentinel head marking a bracket-vector list, emitted by the reference
/// parser for `[...]` syntax. Never valid as a user-written function name.
pub const VECTOR_MARKER: &str = "%vector";

/// Canonicalizes a full top-level sequence of parsed forms.
pub fn canonicalize_program(forms: Vec<SExpr>) -> Vec<CanonicalSExpr> {
    forms
        .into_iter()
        .map(|f| CanonicalSExpr::assume_canonical(canonicalize(f, false)))
        .collect()
}

/// Canonicalizes a single form. `in_quote` suppresses sugar rewriting for
/// quoted data (see module docs).
fn canonicalize(expr: SExpr, in_quote: bool) -> SExpr {
    match expr {
        SExpr::Literal(..) => expr,
        SExpr::Symbol(ref sym, span) if !in_quote => canonicalize_symbol(sym, span),
        SExpr::Symbol(..) => expr,
        SExpr::List(items, span) => canonicalize_list(items, span, in_quote),
    }
}

/// A bare dotted symbol in value position has no canonical "symbol with a
/// dot" form, so it's rewritten to a chain of `js-get` accesses (spec §4.1,
/// generalized to N segments per SPEC_FULL.md §10.6).
fn canonicalize_symbol(sym: &Symbol, span: Span) -> SExpr {
    match sym.dot_segments() {
        Some(segments) => build_get_chain(&segments, span),
        None => SExpr::Symbol(sym.clone(), span),
    }
}

/// Builds `(js-get (js-get a b) c)` from `["a", "b", "c"]`.
fn build_get_chain(segments: &[&str], span: Span) -> SExpr {
    let mut object = SExpr::symbol(segments[0], span);
    for prop in &segments[1..] {
        object = SExpr::list(
            vec![SExpr::symbol("js-get", span), object, SExpr::symbol(*prop, span)],
            span,
        );
    }
    object
}

fn canonicalize_list(items: Vec<SExpr>, span: Span, in_quote: bool) -> SExpr {
    if items.is_empty() {
        return SExpr::List(items, span);
    }

    // `quote`/`quasiquote` suppress sugar rewriting in their payload; the
    // reader-macro head itself still canonicalizes normally (it's a plain
    // symbol, never dotted).
    if let Some(head) = items[0].as_symbol() {
        if matches!(head.as_str(), "quote" | "quasiquote") {
            let mut rewritten = vec![items[0].clone()];
            rewritten.extend(items[1..].iter().cloned().map(|i| canonicalize(i, true)));
            return SExpr::List(rewritten, span);
        }
    }

    // The head is dispatched on its *raw* form — a dotted head is call
    // syntax (spec §4.1), not a value-position reference, so it must not go
    // through `canonicalize_symbol`'s js-get rewrite before we get a chance
    // to recognize it as a method call.
    let raw_head = items[0].clone();
    let mut rest: Vec<SExpr> = items[1..].iter().cloned().map(|i| canonicalize(i, in_quote)).collect();
    if in_quote {
        let mut out = vec![canonicalize(raw_head, true)];
        out.append(&mut rest);
        return SExpr::List(out, span);
    }

    match raw_head.as_symbol().map(Symbol::as_str) {
        Some("export") => {
            let mut out = vec![raw_head];
            out.append(&mut rest);
            canonicalize_export(out, span)
        }
        Some("import") => {
            let mut out = vec![raw_head];
            out.append(&mut rest);
            canonicalize_import(out, span)
        }
        Some(VECTOR_MARKER) => {
            let mut out = vec![raw_head];
            out.append(&mut rest);
            canonicalize_vector_contents(out, span)
        }
        Some(head_text) if Symbol::new(head_text).dot_segments().is_some() => {
            let mut out = vec![raw_head];
            out.append(&mut rest);
            canonicalize_call_head(out, span)
        }
        _ => {
            let mut out = vec![canonicalize(raw_head, false)];
            out.append(&mut rest);
            SExpr::List(out, span)
        }
    }
}

/// `(export (%vector a b))` → `(export a b)`. Non-macro filtering happens
/// later, once the Import Resolver knows which names are macros; this stage
/// only flattens the bracket sugar.
fn canonicalize_export(items: Vec<SExpr>, span: Span) -> SExpr {
    let mut out = vec![items[0].clone()];
    for item in &items[1..] {
        match item {
            SExpr::List(inner, _) if inner.first().and_then(SExpr::as_symbol).map(Symbol::as_str) == Some(VECTOR_MARKER) => {
                out.extend(inner[1..].iter().cloned());
            }
            other => out.push(other.clone()),
        }
    }
    SExpr::List(out, span)
}

/// `(import (%vector a (alias b c)) from "path")` → `(import (%vector a
/// (alias b c)) "path")` — drops the `from` keyword once the vector and path
/// are both in hand. `(import name from "path")` (namespace form) is
/// likewise reduced to `(import name "path")`.
fn canonicalize_import(items: Vec<SExpr>, span: Span) -> SExpr {
    if items.len() == 4 {
        if let Some(kw) = items[2].as_symbol() {
            if kw.as_str() == "from" {
                return SExpr::List(vec![items[0].clone(), items[1].clone(), items[3].clone()], span);
            }
        }
    }
    SExpr::List(items, span)
}

/// Regroups `a as b` runs inside a bracket-vector into `(alias a b)`, and
/// discards stray comma tokens the reader may have preserved as symbols.
fn canonicalize_vector_contents(items: Vec<SExpr>, span: Span) -> SExpr {
    let mut out = vec![items[0].clone()];
    let mut rest = items[1..].iter().cloned().peekable();
    while let Some(item) = rest.next() {
        if is_bare_symbol(&item, ",") {
            continue;
        }
        if let Some(next) = rest.peek() {
            if is_bare_symbol(next, "as") {
                rest.next(); // consume "as"
                if let Some(alias) = rest.next() {
                    let item_span = item.span();
                    out.push(SExpr::list(
                        vec![SExpr::symbol("alias", item_span), item, alias],
                        item_span,
                    ));
                    continue;
                }
            }
        }
        out.push(item);
    }
    SExpr::List(out, span)
}

fn is_bare_symbol(expr: &SExpr, text: &str) -> bool {
    expr.as_symbol().map(Symbol::as_str) == Some(text)
}

/// A dotted head rewrites the call to a canonical `method-call` (spec
/// §4.1). `(obj.method a b)` → `(method-call obj method a b)`; for a chain
/// longer than two segments the receiver itself becomes a `js-get` chain
/// (SPEC_FULL.md §10.6), e.g. `(a.b.c x)` → `(method-call (js-get a b) c x)`.
fn canonicalize_call_head(items: Vec<SExpr>, span: Span) -> SExpr {
    let Some(head_sym) = items[0].as_symbol() else {
        return SExpr::List(items, span);
    };
    let Some(segments) = head_sym.dot_segments() else {
        return SExpr::List(items, span);
    };
    let head_span = items[0].span();
    let method = *segments.last().unwrap();
    let receiver = if segments.len() == 2 {
        SExpr::symbol(segments[0], head_span)
    } else {
        build_get_chain(&segments[..segments.len() - 1], head_span)
    };
    let mut call = vec![SExpr::symbol("method-call", head_span), receiver, SExpr::symbol(method, head_span)];
    call.extend(items.into_iter().skip(1));
    SExpr::List(call, span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sexpr::Literal;

    fn sym(name: &str) -> SExpr {
        SExpr::symbol(name, Span::default())
    }

    fn list(items: Vec<SExpr>) -> SExpr {
        SExpr::list(items, Span::default())
    }

    #[test]
    fn dotted_call_head_becomes_method_call() {
        let input = list(vec![sym("console.log"), SExpr::Literal(Literal::Int(1), Span::default())]);
        let out = canonicalize(input, false);
        let items = out.into_list().unwrap();
        assert_eq!(items[0].as_symbol().unwrap().as_str(), "method-call");
        assert_eq!(items[1].as_symbol().unwrap().as_str(), "console");
        assert_eq!(items[2].as_symbol().unwrap().as_str(), "log");
    }

    #[test]
    fn js_escaped_dotted_symbol_is_not_rewritten() {
        let input = sym("js/console.log");
        let out = canonicalize(input, false);
        assert_eq!(out.as_symbol().unwrap().as_str(), "js/console.log");
    }

    #[test]
    fn multi_segment_dot_chain_nests_js_get() {
        let input = sym("a.b.c");
        let out = canonicalize(input, false);
        // (js-get (js-get a b) c)
        let items = out.as_list().unwrap();
        assert_eq!(items[0].as_symbol().unwrap().as_str(), "js-get");
        assert_eq!(items[2].as_symbol().unwrap().as_str(), "c");
        let inner = items[1].as_list().unwrap();
        assert_eq!(inner[2].as_symbol().unwrap().as_str(), "b");
    }

    #[test]
    fn quoted_dotted_symbol_is_untouched() {
        let input = list(vec![sym("quote"), sym("obj.method")]);
        let out = canonicalize(input, false);
        let items = out.into_list().unwrap();
        assert_eq!(items[1].as_symbol().unwrap().as_str(), "obj.method");
    }

    #[test]
    fn vector_export_flattens_bracket_sugar() {
        let vector = list(vec![sym(VECTOR_MARKER), sym("a"), sym("b")]);
        let input = list(vec![sym("export"), vector]);
        let out = canonicalize(input, false);
        let items = out.into_list().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].as_symbol().unwrap().as_str(), "a");
        assert_eq!(items[2].as_symbol().unwrap().as_str(), "b");
    }

    #[test]
    fn vector_import_with_alias_and_from_keyword() {
        let vector = list(vec![
            sym(VECTOR_MARKER),
            sym("a"),
            sym("b"),
            sym("as"),
            sym("c"),
        ]);
        let input = list(vec![
            sym("import"),
            vector,
            sym("from"),
            SExpr::Literal(Literal::String("./mod".into()), Span::default()),
        ]);
        let out = canonicalize(input, false);
        let items = out.into_list().unwrap();
        assert_eq!(items.len(), 3, "from keyword is dropped");
        let vec_items = items[1].as_list().unwrap();
        // %vector, a, (alias b c)
        assert_eq!(vec_items.len(), 3);
        let alias = vec_items[2].as_list().unwrap();
        assert_eq!(alias[0].as_symbol().unwrap().as_str(), "alias");
    }
}
