//! Macro definitions and parameter lists (spec §4.3).
//!
//! A macro is purely a declarative template: a parameter list plus a body
//! form, both already-canonical `SExpr`. There is no native-function macro
//! kind here — every macro a `.hql` file can define comes from `defmacro`/
//! `macro`, so the registry only ever needs to store templates.

use crate::errors::{ErrorKind, HqlError};
use crate::diagnostics::PhaseContext;
use crate::sexpr::{SExpr, Span, Symbol};

/// Expansion depth cap (spec §4.3: "default 1024").
pub const MAX_MACRO_RECURSION_DEPTH: usize = 1024;

/// The reserved token marking the rest parameter in a parameter list (spec
/// §4.4.1's `&` convention, reused here for macro parameter lists).
pub const REST_MARKER: &str = "&";

/// A macro's formal parameter list: named positional parameters, plus an
/// optional rest parameter collecting every extra argument as a list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MacroParams {
    pub required: Vec<String>,
    pub rest: Option<String>,
}

impl MacroParams {
    /// Parses `(x y & rest)` style parameter lists. A second `&` is a
    /// duplicate rest parameter and fatal, matching the `fn`/`fx` rule
    /// spec §4.4.1 states for ordinary functions.
    pub fn parse(items: &[SExpr], macro_name: &str, span: Span, ctx: &PhaseContext) -> Result<Self, HqlError> {
        let mut required = Vec::new();
        let mut rest = None;
        let mut iter = items.iter();
        while let Some(item) = iter.next() {
            let Some(sym) = item.as_symbol() else {
                return Err(ctx.error(
                    ErrorKind::Validation {
                        message: format!("macro '{macro_name}' has a non-symbol parameter"),
                        expected: Some("symbol".into()),
                        found: Some(describe(item)),
                    },
                    item.span(),
                ));
            };
            if sym.as_str() == REST_MARKER {
                if rest.is_some() {
                    return Err(ctx.error(
                        ErrorKind::Validation {
                            message: format!("macro '{macro_name}' declares more than one rest parameter"),
                            expected: None,
                            found: None,
                        },
                        span,
                    ));
                }
                let Some(rest_sym) = iter.next().and_then(SExpr::as_symbol) else {
                    return Err(ctx.error(
                        ErrorKind::Validation {
                            message: format!("macro '{macro_name}': '&' must be followed by a parameter name"),
                            expected: Some("symbol".into()),
                            found: None,
                        },
                        span,
                    ));
                };
                rest = Some(rest_sym.as_str().to_string());
                continue;
            }
            required.push(sym.as_str().to_string());
        }
        Ok(MacroParams { required, rest })
    }

    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        self.required.iter().map(String::as_str).chain(self.rest.as_deref())
    }
}

fn describe(expr: &SExpr) -> String {
    match expr {
        SExpr::Literal(lit, _) => lit.to_string(),
        SExpr::Symbol(s, _) => s.to_string(),
        SExpr::List(..) => "list".to_string(),
    }
}

/// A declarative macro: `(defmacro name (params…) body…)` or `(macro name
/// (params…) body…)`. Multiple body forms are wrapped in an implicit `do`.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroTemplate {
    pub name: String,
    pub params: MacroParams,
    pub body: SExpr,
}

/// Recognizes the two macro-definition heads (spec §4.3/§4.4 item 2).
pub fn is_macro_definition_head(head: &Symbol) -> bool {
    matches!(head.as_str(), "defmacro" | "macro")
}

/// Parses a `(defmacro name (params…) body…)` form into a [`MacroTemplate`],
/// or `None` if `expr` isn't a macro-definition form at all.
pub fn try_parse_macro_definition(expr: &SExpr, ctx: &PhaseContext) -> Result<Option<MacroTemplate>, HqlError> {
    let Some(items) = expr.as_list() else { return Ok(None) };
    let Some(head) = items.first().and_then(SExpr::as_symbol) else { return Ok(None) };
    if !is_macro_definition_head(head) {
        return Ok(None);
    }
    let span = expr.span();
    if items.len() < 3 {
        return Err(ctx.error(
            ErrorKind::Validation {
                message: "macro definition requires a name, a parameter list, and a body".into(),
                expected: Some("(defmacro name (params…) body…)".into()),
                found: Some(format!("{} form(s)", items.len())),
            },
            span,
        ));
    }
    let Some(name) = items[1].as_symbol() else {
        return Err(ctx.error(
            ErrorKind::Validation {
                message: "macro name must be a symbol".into(),
                expected: Some("symbol".into()),
                found: Some(describe(&items[1])),
            },
            items[1].span(),
        ));
    };
    let Some(param_items) = items[2].as_list() else {
        return Err(ctx.error(
            ErrorKind::Validation {
                message: format!("macro '{name}' parameter list must be a list"),
                expected: Some("list".into()),
                found: Some(describe(&items[2])),
            },
            items[2].span(),
        ));
    };
    let params = MacroParams::parse(param_items, name.as_str(), span, ctx)?;
    let body = if items.len() == 4 {
        items[3].clone()
    } else {
        let mut do_form = vec![SExpr::symbol("do", span)];
        do_form.extend(items[3..].iter().cloned());
        SExpr::List(do_form, span)
    };
    Ok(Some(MacroTemplate { name: name.as_str().to_string(), params, body }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::PhaseContext;
    use crate::errors::Phase;

    fn ctx() -> PhaseContext {
        PhaseContext::new(Phase::MacroExpansion, "test.hql", "")
    }

    fn sym(name: &str) -> SExpr {
        SExpr::symbol(name, Span::default())
    }

    #[test]
    fn parses_required_and_rest_params() {
        let items = vec![sym("a"), sym("b"), sym(REST_MARKER), sym("rest")];
        let params = MacroParams::parse(&items, "m", Span::default(), &ctx()).unwrap();
        assert_eq!(params.required, vec!["a", "b"]);
        assert_eq!(params.rest, Some("rest".to_string()));
    }

    #[test]
    fn duplicate_rest_marker_is_fatal() {
        let items = vec![sym(REST_MARKER), sym("a"), sym(REST_MARKER), sym("b")];
        assert!(MacroParams::parse(&items, "m", Span::default(), &ctx()).is_err());
    }

    #[test]
    fn parses_single_body_form_macro_definition() {
        let span = Span::default();
        let expr = SExpr::list(
            vec![
                sym("defmacro"),
                sym("twice"),
                SExpr::list(vec![sym("x")], span),
                SExpr::list(vec![sym("+"), sym("x"), sym("x")], span),
            ],
            span,
        );
        let def = try_parse_macro_definition(&expr, &ctx()).unwrap().unwrap();
        assert_eq!(def.name, "twice");
        assert_eq!(def.params.required, vec!["x"]);
    }

    #[test]
    fn multiple_body_forms_wrap_in_do() {
        let span = Span::default();
        let expr = SExpr::list(
            vec![sym("macro"), sym("m"), SExpr::list(vec![], span), sym("a"), sym("b")],
            span,
        );
        let def = try_parse_macro_definition(&expr, &ctx()).unwrap().unwrap();
        let body_items = def.body.as_list().unwrap();
        assert_eq!(body_items[0].as_symbol().unwrap().as_str(), "do");
        assert_eq!(body_items.len(), 3);
    }

    #[test]
    fn non_macro_form_returns_none() {
        let expr = SExpr::list(vec![sym("fn"), sym("f")], Span::default());
        assert!(try_parse_macro_definition(&expr, &ctx()).unwrap().is_none());
    }
}
