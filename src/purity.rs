//! The `fx` purity verifier (spec §4.5).
//!
//! Invoked on an `fx` body before the lowerer emits its declaration. Walks
//! the canonical form tracking which names are in scope (parameters,
//! `let`-locals, a registry of previously-verified pure functions) and
//! fails fatally the moment it sees a reference or call it can't prove
//! pure.

use std::collections::HashSet;

use crate::diagnostics::PhaseContext;
use crate::errors::{ErrorKind, HqlError};
use crate::sexpr::{SExpr, Symbol};

/// Built-in pure operations allowed inside `fx` bodies (spec §4.5): the
/// primitive operators, the control forms that don't themselves perform
/// IO, and the data constructors.
const PURE_BUILTINS: &[&str] = &[
    "+", "-", "*", "/", "%", "=", "!=", "<", ">", "<=", ">=", "eq?",
    "if", "cond", "let", "lambda", "return",
    "list", "vector", "hash-map", "empty-array", "empty-map", "get",
];

/// Safe global objects whose methods are assumed pure enough to call from
/// `fx` bodies (spec §4.5).
const SAFE_GLOBALS: &[&str] = &["String", "Number", "Boolean", "Object", "Array", "JSON", "Math", "Date"];

/// JS literals a pure body may reference directly.
const PURE_LITERALS: &[&str] = &["null", "undefined", "NaN", "Infinity"];

/// Operators that are unconditionally impure and fatal inside `fx` (spec
/// §4.5).
const IMPURE_OPS: &[&str] = &["print", "console.log", "var", "fn"];

/// Registry of function names already proven pure, consulted when an `fx`
/// body calls another user-defined function (spec §4.5: "a previously
/// registered pure function").
#[derive(Debug, Clone, Default)]
pub struct PureRegistry {
    names: HashSet<String>,
}

impl PureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

/// Verifies that `body` is pure given `params` in scope. On success the
/// caller is responsible for registering the function's own name in the
/// [`PureRegistry`] (spec §4.5: "on success the function name is added to
/// the pure registry" — after, not during, so a function can't vouch for
/// its own recursive calls by being self-referential mid-verification).
pub fn verify_purity(
    body: &SExpr,
    params: &[String],
    registry: &PureRegistry,
    ctx: &PhaseContext,
) -> Result<(), HqlError> {
    let mut locals: HashSet<String> = params.iter().cloned().collect();
    walk(body, &mut locals, registry, ctx)
}

fn walk(expr: &SExpr, locals: &mut HashSet<String>, registry: &PureRegistry, ctx: &PhaseContext) -> Result<(), HqlError> {
    match expr {
        SExpr::Literal(..) => Ok(()),
        SExpr::Symbol(sym, span) => check_symbol_reference(sym, *span, locals, registry, ctx),
        SExpr::List(items, span) => {
            if items.is_empty() {
                return Ok(());
            }
            let head = items[0].as_symbol().map(Symbol::as_str);
            match head {
                Some("let") => walk_let(items, locals, registry, ctx),
                Some("lambda") => walk_lambda(items, locals, registry, ctx),
                Some("js-call") => walk_js_call(items, *span, locals, registry, ctx),
                Some(op) if IMPURE_OPS.contains(&op) => Err(impure_error(op, *span, ctx)),
                Some(op) if op == "console" => Err(impure_error("console.log", *span, ctx)),
                _ => {
                    if let Some(head_sym) = items[0].as_symbol() {
                        check_callable_head(head_sym, *span, locals, registry, ctx)?;
                    } else {
                        walk(&items[0], locals, registry, ctx)?;
                    }
                    for arg in &items[1..] {
                        walk(arg, locals, registry, ctx)?;
                    }
                    Ok(())
                }
            }
        }
    }
}

fn check_symbol_reference(
    sym: &Symbol,
    span: crate::sexpr::Span,
    locals: &HashSet<String>,
    registry: &PureRegistry,
    ctx: &PhaseContext,
) -> Result<(), HqlError> {
    let text = sym.as_str();
    if locals.contains(text)
        || PURE_BUILTINS.contains(&text)
        || SAFE_GLOBALS.contains(&text)
        || PURE_LITERALS.contains(&text)
        || registry.contains(text)
    {
        return Ok(());
    }
    Err(impurity_violation(text, span, ctx))
}

/// A list head position is either a builtin/known-pure operator or a
/// reference subject to the same rules as a plain symbol.
fn check_callable_head(
    sym: &Symbol,
    span: crate::sexpr::Span,
    locals: &HashSet<String>,
    registry: &PureRegistry,
    ctx: &PhaseContext,
) -> Result<(), HqlError> {
    let text = sym.as_str();
    if PURE_BUILTINS.contains(&text) {
        return Ok(());
    }
    check_symbol_reference(sym, span, locals, registry, ctx)
}

fn walk_let(items: &[SExpr], locals: &mut HashSet<String>, registry: &PureRegistry, ctx: &PhaseContext) -> Result<(), HqlError> {
    // `(let name v)` or `(let (n1 v1 n2 v2 …) body…)`; binding-list form
    // registers names before verifying initializers (letrec-style
    // visibility, spec §4.5).
    match items.get(1) {
        Some(SExpr::Symbol(name, _)) => {
            if let Some(value) = items.get(2) {
                walk(value, locals, registry, ctx)?;
            }
            locals.insert(name.as_str().to_string());
            for rest in items.iter().skip(3) {
                walk(rest, locals, registry, ctx)?;
            }
            Ok(())
        }
        Some(SExpr::List(pairs, _)) => {
            for chunk in pairs.chunks(2) {
                if let Some(SExpr::Symbol(name, _)) = chunk.first() {
                    locals.insert(name.as_str().to_string());
                }
            }
            for chunk in pairs.chunks(2) {
                if let Some(value) = chunk.get(1) {
                    walk(value, locals, registry, ctx)?;
                }
            }
            for rest in items.iter().skip(2) {
                walk(rest, locals, registry, ctx)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn walk_lambda(items: &[SExpr], locals: &mut HashSet<String>, registry: &PureRegistry, ctx: &PhaseContext) -> Result<(), HqlError> {
    let mut extended = locals.clone();
    if let Some(params) = items.get(1).and_then(SExpr::as_list) {
        for p in params {
            if let Some(sym) = p.as_symbol() {
                if sym.as_str() != "&" {
                    extended.insert(sym.as_str().to_string());
                }
            }
        }
    }
    for body_form in items.iter().skip(2) {
        walk(body_form, &mut extended, registry, ctx)?;
    }
    Ok(())
}

fn walk_js_call(
    items: &[SExpr],
    span: crate::sexpr::Span,
    locals: &mut HashSet<String>,
    registry: &PureRegistry,
    ctx: &PhaseContext,
) -> Result<(), HqlError> {
    // `(js-call receiver method arg…)`; allowed only when the receiver is a
    // safe global (spec §4.5).
    let Some(receiver) = items.get(1).and_then(SExpr::as_symbol) else {
        return Err(impurity_violation("js-call with a non-symbol receiver", span, ctx));
    };
    if !SAFE_GLOBALS.contains(&receiver.as_str()) {
        return Err(impurity_violation(receiver.as_str(), span, ctx));
    }
    for arg in items.iter().skip(3) {
        walk(arg, locals, registry, ctx)?;
    }
    Ok(())
}

fn impure_error(op: &str, span: crate::sexpr::Span, ctx: &PhaseContext) -> HqlError {
    ctx.error(
        ErrorKind::Validation {
            message: format!("'{op}' is impure and not allowed inside a pure function"),
            expected: Some("pure expression".into()),
            found: Some(op.to_string()),
        },
        span,
    )
}

fn impurity_violation(name: &str, span: crate::sexpr::Span, ctx: &PhaseContext) -> HqlError {
    ctx.error(
        ErrorKind::Validation {
            message: format!("'{name}' is not a parameter, local, pure built-in, or previously verified pure function"),
            expected: Some("pure reference".into()),
            found: Some(name.to_string()),
        },
        span,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Phase;
    use crate::sexpr::{Literal, Span};

    fn ctx() -> PhaseContext {
        PhaseContext::new(Phase::PurityCheck, "test.hql", "")
    }

    fn sym(name: &str) -> SExpr {
        SExpr::symbol(name, Span::default())
    }

    fn list(items: Vec<SExpr>) -> SExpr {
        SExpr::list(items, Span::default())
    }

    #[test]
    fn arithmetic_over_parameters_is_pure() {
        let body = list(vec![sym("*"), sym("x"), sym("x")]);
        let registry = PureRegistry::new();
        assert!(verify_purity(&body, &["x".into()], &registry, &ctx()).is_ok());
    }

    #[test]
    fn console_log_is_impure() {
        let body = list(vec![sym("console.log"), sym("x")]);
        let registry = PureRegistry::new();
        assert!(verify_purity(&body, &["x".into()], &registry, &ctx()).is_err());
    }

    #[test]
    fn unbound_free_variable_is_impure() {
        let body = list(vec![sym("+"), sym("x"), sym("y")]);
        let registry = PureRegistry::new();
        assert!(verify_purity(&body, &["x".into()], &registry, &ctx()).is_err());
    }

    #[test]
    fn call_to_previously_registered_pure_function_is_allowed() {
        let body = list(vec![sym("helper"), sym("x")]);
        let mut registry = PureRegistry::new();
        registry.register("helper");
        assert!(verify_purity(&body, &["x".into()], &registry, &ctx()).is_ok());
    }

    #[test]
    fn let_binding_is_visible_in_later_body_forms() {
        let body = list(vec![
            sym("let"),
            sym("y"),
            SExpr::Literal(Literal::Int(1), Span::default()),
            list(vec![sym("+"), sym("x"), sym("y")]),
        ]);
        let registry = PureRegistry::new();
        assert!(verify_purity(&body, &["x".into()], &registry, &ctx()).is_ok());
    }

    #[test]
    fn safe_global_js_call_is_pure() {
        let body = list(vec![sym("js-call"), sym("Math"), sym("max"), sym("x")]);
        let registry = PureRegistry::new();
        assert!(verify_purity(&body, &["x".into()], &registry, &ctx()).is_ok());
    }

    #[test]
    fn js_call_on_unsafe_receiver_is_impure() {
        let body = list(vec![sym("js-call"), sym("document"), sym("write"), sym("x")]);
        let registry = PureRegistry::new();
        assert!(verify_purity(&body, &["x".into()], &registry, &ctx()).is_err());
    }
}
