//! The hygienic macro expander (spec §4.3).
//!
//! Expansion is outside-in: a macro call is substituted, then the result is
//! re-expanded in full (so a macro that expands into another macro call is
//! handled correctly) before recursing into subforms. `quote` suppresses
//! all rewriting; `quasiquote`/`unquote`/`unquote-splicing` are handled by
//! the standard nested-depth algorithm, independent of whether they appear
//! inside a macro template or directly in source.
//!
//! Hygiene only needs to rename variables a macro *template* itself binds
//! (`let`/`var`/`fn`/`fx`/`lambda`/`loop` targets written literally in the
//! defmacro body) — arguments substituted in from the call site already
//! carry the caller's own scope, so they're left untouched.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::diagnostics::PhaseContext;
use crate::environment::{Environment, ExpansionCacheKey};
use crate::errors::{ErrorKind, HqlError};
use crate::macros::registry::MacroRegistry;
use crate::macros::types::{try_parse_macro_definition, MacroParams, MacroTemplate, MAX_MACRO_RECURSION_DEPTH};
use crate::sexpr::{CanonicalSExpr, SExpr, Span, Symbol};

/// Expands every top-level form in a canonicalized program. `defmacro`/
/// `macro` forms are registered (into both `registry` and, for
/// import-resolution bookkeeping, `env`) and then elided from the output
/// (spec §4.4 item 2).
pub fn expand_program(
    forms: Vec<CanonicalSExpr>,
    registry: &mut MacroRegistry,
    env: &mut Environment,
    file: &Path,
    source_name: &str,
    source_text: &str,
) -> Result<Vec<CanonicalSExpr>, HqlError> {
    let ctx = PhaseContext::new(crate::errors::Phase::MacroExpansion, source_name, source_text);

    for form in &forms {
        if let Some(def) = try_parse_macro_definition(&form.0, &ctx)? {
            env.record_module_macro(file, def.name.clone());
            registry.define(def);
        }
    }

    let mut out = Vec::with_capacity(forms.len());
    for form in forms {
        if is_macro_definition(&form.0) {
            continue;
        }
        let expanded = expand_form(form.0, registry, env, file, &ctx)?;
        out.push(CanonicalSExpr::assume_canonical(expanded));
    }
    Ok(out)
}

fn is_macro_definition(expr: &SExpr) -> bool {
    expr.head_symbol()
        .map(crate::macros::types::is_macro_definition_head)
        .unwrap_or(false)
}

/// Expands a single form to a fixed point, with expansion memoized on
/// (form, file) (spec §4.3).
pub fn expand_form(
    expr: SExpr,
    registry: &MacroRegistry,
    env: &mut Environment,
    file: &Path,
    ctx: &PhaseContext,
) -> Result<SExpr, HqlError> {
    expand_form_depth(expr, registry, env, file, ctx, 0)
}

fn expand_form_depth(
    expr: SExpr,
    registry: &MacroRegistry,
    env: &mut Environment,
    file: &Path,
    ctx: &PhaseContext,
    depth: usize,
) -> Result<SExpr, HqlError> {
    if matches!(expr, SExpr::Literal(..) | SExpr::Symbol(..)) {
        return Ok(expr);
    }

    let key = ExpansionCacheKey::new(file, &expr);
    if let Some(cached) = env.cached_expansion(&key) {
        return Ok(cached.0);
    }

    let result = expand_uncached(expr, registry, env, file, ctx, depth)?;
    env.cache_expansion(key, CanonicalSExpr::assume_canonical(result.clone()));
    Ok(result)
}

fn expand_uncached(
    expr: SExpr,
    registry: &MacroRegistry,
    env: &mut Environment,
    file: &Path,
    ctx: &PhaseContext,
    depth: usize,
) -> Result<SExpr, HqlError> {
    if depth > MAX_MACRO_RECURSION_DEPTH {
        return Err(depth_exceeded(ctx, expr.span(), depth));
    }

    let Some(items) = expr.as_list() else { return Ok(expr) };
    if items.is_empty() {
        return Ok(expr);
    }

    let head = items[0].as_symbol().map(Symbol::as_str);

    if head == Some("quote") && items.len() == 2 {
        return Ok(expr);
    }
    if head == Some("quasiquote") && items.len() == 2 {
        return qq_expand(&items[1], 1, registry, env, file, ctx, depth);
    }

    if let Some(name) = head {
        if let Some(template) = registry.lookup(name) {
            let span = expr.span();
            let expanded_once = expand_macro_call(template, items, span, ctx, env)?;
            return expand_form_depth(expanded_once, registry, env, file, ctx, depth + 1);
        }
    }

    let span = expr.span();
    let items = expr.into_list().expect("checked above");
    let new_items = items
        .into_iter()
        .map(|i| expand_form_depth(i, registry, env, file, ctx, depth + 1))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(SExpr::List(new_items, span))
}

fn depth_exceeded(ctx: &PhaseContext, span: Span, depth: usize) -> HqlError {
    ctx.error(
        ErrorKind::Macro {
            message: format!("macro expansion depth exceeded (limit {MAX_MACRO_RECURSION_DEPTH}, reached {depth})"),
            macro_name: None,
        },
        span,
    )
    .with_suggestion("check for a macro that expands into itself without making progress")
}

/// Instantiates one macro call: checks arity, alpha-renames the template's
/// own binders, then substitutes arguments for parameters. The result is
/// *not* further expanded here — the caller re-enters the expander so a
/// macro-producing-a-macro-call is handled by the normal outside-in loop.
fn expand_macro_call(
    template: &MacroTemplate,
    call_items: &[SExpr],
    span: Span,
    ctx: &PhaseContext,
    env: &mut Environment,
) -> Result<SExpr, HqlError> {
    let args = &call_items[1..];
    check_arity(&template.name, &template.params, args.len(), span, ctx)?;

    let mut bindings: HashMap<String, SExpr> = HashMap::new();
    for (name, arg) in template.params.required.iter().zip(args.iter()) {
        bindings.insert(name.clone(), arg.clone());
    }
    if let Some(rest_name) = &template.params.rest {
        let rest_args: Vec<SExpr> = if args.len() > template.params.required.len() {
            args[template.params.required.len()..].to_vec()
        } else {
            Vec::new()
        };
        bindings.insert(rest_name.clone(), SExpr::List(rest_args, span));
    }

    let macro_param_names: HashSet<String> = template.params.all_names().map(str::to_string).collect();
    let mut binder_names = HashSet::new();
    collect_binder_names(&template.body, &macro_param_names, false, &mut binder_names);

    let body = if binder_names.is_empty() {
        template.body.clone()
    } else {
        let suffix = env.next_gensym();
        let rename_map: HashMap<String, String> =
            binder_names.into_iter().map(|n| (n.clone(), format!("{n}__hyg{suffix}"))).collect();
        rename_symbols(template.body.clone(), &rename_map, false)
    };

    Ok(substitute_params(body, &bindings, false))
}

fn check_arity(name: &str, params: &MacroParams, arg_count: usize, span: Span, ctx: &PhaseContext) -> Result<(), HqlError> {
    let required = params.required.len();
    if arg_count < required {
        return Err(ctx.error(
            ErrorKind::Macro {
                message: format!("macro '{name}' expects at least {required} argument(s), got {arg_count}"),
                macro_name: Some(name.to_string()),
            },
            span,
        ));
    }
    if params.rest.is_none() && arg_count > required {
        return Err(ctx.error(
            ErrorKind::Macro {
                message: format!("macro '{name}' expects exactly {required} argument(s), got {arg_count}"),
                macro_name: Some(name.to_string()),
            },
            span,
        ));
    }
    Ok(())
}

/// Substitutes macro parameters with their bound argument forms. `quote`d
/// subforms are left untouched — quoted data in a macro template is literal,
/// not a substitution site.
fn substitute_params(expr: SExpr, bindings: &HashMap<String, SExpr>, in_quote: bool) -> SExpr {
    match expr {
        SExpr::Literal(..) => expr,
        SExpr::Symbol(ref sym, _) => {
            if in_quote {
                expr
            } else {
                bindings.get(sym.as_str()).cloned().unwrap_or(expr)
            }
        }
        SExpr::List(items, span) => {
            let next_in_quote = in_quote || is_quote_head(&items);
            SExpr::List(
                items.into_iter().map(|i| substitute_params(i, bindings, next_in_quote)).collect(),
                span,
            )
        }
    }
}

fn is_quote_head(items: &[SExpr]) -> bool {
    items.first().and_then(SExpr::as_symbol).map(Symbol::as_str) == Some("quote")
}

/// Standard nested quasiquote/unquote/unquote-splicing expansion (spec
/// §4.3). `depth` tracks quasiquote nesting: an `unquote` at depth 1 is
/// evaluated (via the ordinary expander, so nested macro calls inside it
/// still run); at depth > 1 it's reconstructed with depth decremented.
fn qq_expand(
    expr: &SExpr,
    depth: usize,
    registry: &MacroRegistry,
    env: &mut Environment,
    file: &Path,
    ctx: &PhaseContext,
    expand_depth: usize,
) -> Result<SExpr, HqlError> {
    let Some(items) = expr.as_list() else { return Ok(expr.clone()) };
    if items.is_empty() {
        return Ok(expr.clone());
    }
    let head = items[0].as_symbol().map(Symbol::as_str);
    let span = expr.span();

    if head == Some("unquote") && items.len() == 2 {
        return if depth == 1 {
            expand_form_depth(items[1].clone(), registry, env, file, ctx, expand_depth + 1)
        } else {
            let inner = qq_expand(&items[1], depth - 1, registry, env, file, ctx, expand_depth)?;
            Ok(SExpr::list(vec![items[0].clone(), inner], span))
        };
    }
    if head == Some("quasiquote") && items.len() == 2 {
        let inner = qq_expand(&items[1], depth + 1, registry, env, file, ctx, expand_depth)?;
        return Ok(SExpr::list(vec![items[0].clone(), inner], span));
    }

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        if let Some(spliced) = try_unquote_splicing(item, depth, registry, env, file, ctx, expand_depth)? {
            match spliced {
                Spliced::Elements(elems) => {
                    out.extend(elems);
                    continue;
                }
                Spliced::Reconstructed(form) => {
                    out.push(form);
                    continue;
                }
            }
        }
        out.push(qq_expand(item, depth, registry, env, file, ctx, expand_depth)?);
    }
    Ok(SExpr::List(out, span))
}

enum Spliced {
    Elements(Vec<SExpr>),
    Reconstructed(SExpr),
}

#[allow(clippy::too_many_arguments)]
fn try_unquote_splicing(
    item: &SExpr,
    depth: usize,
    registry: &MacroRegistry,
    env: &mut Environment,
    file: &Path,
    ctx: &PhaseContext,
    expand_depth: usize,
) -> Result<Option<Spliced>, HqlError> {
    let Some(item_items) = item.as_list() else { return Ok(None) };
    if item_items.len() != 2 {
        return Ok(None);
    }
    let Some(head) = item_items[0].as_symbol() else { return Ok(None) };
    if head.as_str() != "unquote-splicing" {
        return Ok(None);
    }
    if depth == 1 {
        let evaluated = expand_form_depth(item_items[1].clone(), registry, env, file, ctx, expand_depth + 1)?;
        let Some(elems) = evaluated.into_list() else {
            return Err(ctx.error(
                ErrorKind::Macro {
                    message: "unquote-splicing must evaluate to a list".into(),
                    macro_name: None,
                },
                item.span(),
            ));
        };
        Ok(Some(Spliced::Elements(elems)))
    } else {
        let inner = qq_expand(&item_items[1], depth - 1, registry, env, file, ctx, expand_depth)?;
        Ok(Some(Spliced::Reconstructed(SExpr::list(vec![item_items[0].clone(), inner], item.span()))))
    }
}

/// Collects the names a macro *template* binds itself — via `let`/`var`/
/// `fn`/`fx`/`lambda`/`loop` written literally in the body — excluding the
/// macro's own parameters (those are substitution targets, not binders to
/// rename).
fn collect_binder_names(expr: &SExpr, macro_params: &HashSet<String>, in_quote: bool, out: &mut HashSet<String>) {
    if in_quote {
        return;
    }
    let Some(items) = expr.as_list() else { return };
    if items.is_empty() {
        return;
    }
    let head = items[0].as_symbol().map(Symbol::as_str);
    match head {
        Some("quote") => {}
        Some("let") | Some("var") => {
            collect_binding_pairs(&items[1], macro_params, out);
            for item in &items[2..] {
                collect_binder_names(item, macro_params, false, out);
            }
        }
        Some("loop") => {
            collect_binding_pairs(&items[1], macro_params, out);
            for item in &items[2..] {
                collect_binder_names(item, macro_params, false, out);
            }
        }
        Some("fn") | Some("fx") => {
            if let Some(name) = items.get(1).and_then(SExpr::as_symbol) {
                insert_binder(name.as_str(), macro_params, out);
            }
            if let Some(param_items) = items.get(2).and_then(SExpr::as_list) {
                collect_param_binders(param_items, macro_params, out);
            }
            for item in items.iter().skip(3) {
                collect_binder_names(item, macro_params, false, out);
            }
        }
        Some("lambda") => {
            if let Some(param_items) = items.get(1).and_then(SExpr::as_list) {
                collect_param_binders(param_items, macro_params, out);
            }
            for item in items.iter().skip(2) {
                collect_binder_names(item, macro_params, false, out);
            }
        }
        _ => {
            for item in items {
                collect_binder_names(item, macro_params, false, out);
            }
        }
    }
}

fn collect_binding_pairs(bindings_form: &SExpr, macro_params: &HashSet<String>, out: &mut HashSet<String>) {
    match bindings_form {
        SExpr::Symbol(name, _) => insert_binder(name.as_str(), macro_params, out),
        SExpr::List(pairs, _) => {
            for chunk in pairs.chunks(2) {
                if let Some(SExpr::Symbol(name, _)) = chunk.first() {
                    insert_binder(name.as_str(), macro_params, out);
                }
                if let Some(value) = chunk.get(1) {
                    collect_binder_names(value, macro_params, false, out);
                }
            }
        }
        _ => {}
    }
}

fn collect_param_binders(params: &[SExpr], macro_params: &HashSet<String>, out: &mut HashSet<String>) {
    for p in params {
        if let Some(sym) = p.as_symbol() {
            if sym.as_str() == crate::macros::types::REST_MARKER {
                continue;
            }
            insert_binder(sym.as_str(), macro_params, out);
        } else if let Some(list) = p.as_list() {
            if let Some(SExpr::Symbol(name, _)) = list.first() {
                let bare = name.as_str().trim_end_matches(':');
                insert_binder(bare, macro_params, out);
            }
        }
    }
}

fn insert_binder(name: &str, macro_params: &HashSet<String>, out: &mut HashSet<String>) {
    if !macro_params.contains(name) {
        out.insert(name.to_string());
    }
}

fn rename_symbols(expr: SExpr, rename_map: &HashMap<String, String>, in_quote: bool) -> SExpr {
    match expr {
        SExpr::Literal(..) => expr,
        SExpr::Symbol(ref sym, span) => {
            if !in_quote {
                if let Some(renamed) = rename_map.get(sym.as_str()) {
                    return SExpr::Symbol(Symbol::new(renamed.clone()), span);
                }
            }
            expr
        }
        SExpr::List(items, span) => {
            let next_in_quote = in_quote || is_quote_head(&items);
            SExpr::List(
                items.into_iter().map(|i| rename_symbols(i, rename_map, next_in_quote)).collect(),
                span,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macros::types::MacroParams;
    use crate::sexpr::Literal;

    fn sym(name: &str) -> SExpr {
        SExpr::symbol(name, Span::default())
    }

    fn list(items: Vec<SExpr>) -> SExpr {
        SExpr::list(items, Span::default())
    }

    fn ctx() -> PhaseContext {
        PhaseContext::new(crate::errors::Phase::MacroExpansion, "test.hql", "")
    }

    #[test]
    fn expands_simple_template_macro() {
        let mut registry = MacroRegistry::new();
        registry.define(MacroTemplate {
            name: "twice".into(),
            params: MacroParams { required: vec!["x".into()], rest: None },
            body: list(vec![sym("+"), sym("x"), sym("x")]),
        });
        let mut env = Environment::new();
        let call = list(vec![sym("twice"), SExpr::Literal(Literal::Int(5), Span::default())]);
        let out = expand_form(call, &registry, &mut env, Path::new("a.hql"), &ctx()).unwrap();
        let items = out.into_list().unwrap();
        assert_eq!(items[0].as_symbol().unwrap().as_str(), "+");
        assert_eq!(items[1], SExpr::Literal(Literal::Int(5), Span::default()));
        assert_eq!(items[2], SExpr::Literal(Literal::Int(5), Span::default()));
    }

    #[test]
    fn macro_expanding_to_another_macro_call_is_reexpanded() {
        let mut registry = MacroRegistry::new();
        registry.define(MacroTemplate {
            name: "a".into(),
            params: MacroParams::default(),
            body: list(vec![sym("b")]),
        });
        registry.define(MacroTemplate {
            name: "b".into(),
            params: MacroParams::default(),
            body: SExpr::Literal(Literal::Int(42), Span::default()),
        });
        let mut env = Environment::new();
        let call = list(vec![sym("a")]);
        let out = expand_form(call, &registry, &mut env, Path::new("a.hql"), &ctx()).unwrap();
        assert_eq!(out, SExpr::Literal(Literal::Int(42), Span::default()));
    }

    #[test]
    fn wrong_arity_is_fatal() {
        let mut registry = MacroRegistry::new();
        registry.define(MacroTemplate {
            name: "m".into(),
            params: MacroParams { required: vec!["x".into()], rest: None },
            body: sym("x"),
        });
        let mut env = Environment::new();
        let call = list(vec![sym("m")]);
        assert!(expand_form(call, &registry, &mut env, Path::new("a.hql"), &ctx()).is_err());
    }

    #[test]
    fn quote_suppresses_expansion() {
        let registry = MacroRegistry::new();
        let mut env = Environment::new();
        let call = list(vec![sym("quote"), list(vec![sym("twice"), sym("x")])]);
        let out = expand_form(call, &registry, &mut env, Path::new("a.hql"), &ctx()).unwrap();
        let items = out.into_list().unwrap();
        assert_eq!(items[0].as_symbol().unwrap().as_str(), "quote");
    }

    #[test]
    fn quasiquote_unquote_substitutes_and_preserves_literal_parts() {
        let registry = MacroRegistry::new();
        let mut env = Environment::new();
        let call = list(vec![
            sym("quasiquote"),
            list(vec![sym("+"), list(vec![sym("unquote"), SExpr::Literal(Literal::Int(1), Span::default())]), sym("y")]),
        ]);
        let out = expand_form(call, &registry, &mut env, Path::new("a.hql"), &ctx()).unwrap();
        let items = out.into_list().unwrap();
        assert_eq!(items[0].as_symbol().unwrap().as_str(), "+");
        assert_eq!(items[1], SExpr::Literal(Literal::Int(1), Span::default()));
        assert_eq!(items[2].as_symbol().unwrap().as_str(), "y");
    }

    #[test]
    fn unquote_splicing_flattens_into_enclosing_list() {
        let registry = MacroRegistry::new();
        let mut env = Environment::new();
        let spliced_list = list(vec![sym("quote"), list(vec![sym("a"), sym("b")])]);
        let call = list(vec![
            sym("quasiquote"),
            list(vec![sym("f"), list(vec![sym("unquote-splicing"), spliced_list])]),
        ]);
        let out = expand_form(call, &registry, &mut env, Path::new("a.hql"), &ctx()).unwrap();
        let items = out.into_list().unwrap();
        // f, a, b
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].as_symbol().unwrap().as_str(), "a");
        assert_eq!(items[2].as_symbol().unwrap().as_str(), "b");
    }

    #[test]
    fn hygiene_renames_template_let_binder_but_not_substituted_arg() {
        let mut registry = MacroRegistry::new();
        // (defmacro with-tmp (v) (let (tmp 1) (+ tmp v)))
        registry.define(MacroTemplate {
            name: "with-tmp".into(),
            params: MacroParams { required: vec!["v".into()], rest: None },
            body: list(vec![
                sym("let"),
                list(vec![sym("tmp"), SExpr::Literal(Literal::Int(1), Span::default())]),
                list(vec![sym("+"), sym("tmp"), sym("v")]),
            ]),
        });
        let mut env = Environment::new();
        let call = list(vec![sym("with-tmp"), sym("tmp")]);
        let out = expand_form(call, &registry, &mut env, Path::new("a.hql"), &ctx()).unwrap();
        let items = out.into_list().unwrap();
        assert_eq!(items[0].as_symbol().unwrap().as_str(), "let");
        let binding = items[1].as_list().unwrap();
        let renamed_binder = binding[0].as_symbol().unwrap().as_str();
        assert_ne!(renamed_binder, "tmp");
        assert!(renamed_binder.starts_with("tmp__hyg"));
        let body = items[2].as_list().unwrap();
        assert_eq!(body[1].as_symbol().unwrap().as_str(), renamed_binder);
        // the caller's argument `tmp` (substituted for `v`) is untouched
        assert_eq!(body[2].as_symbol().unwrap().as_str(), "tmp");
    }

    #[test]
    fn repeated_expansion_of_identical_call_is_memoized_with_same_hygiene_suffix() {
        let mut registry = MacroRegistry::new();
        registry.define(MacroTemplate {
            name: "m".into(),
            params: MacroParams::default(),
            body: list(vec![sym("let"), list(vec![sym("tmp"), SExpr::Literal(Literal::Int(1), Span::default())]), sym("tmp")]),
        });
        let mut env = Environment::new();
        let call = list(vec![sym("m")]);
        let out1 = expand_form(call.clone(), &registry, &mut env, Path::new("a.hql"), &ctx()).unwrap();
        let out2 = expand_form(call, &registry, &mut env, Path::new("a.hql"), &ctx()).unwrap();
        assert_eq!(out1, out2);
    }
}
