//! `fn`/`fx` declarations and their shared call-site resolver (spec §4.4.1,
//! §4.4.2).

use std::collections::HashMap;

use crate::diagnostics::PhaseContext;
use crate::errors::{ErrorKind, HqlError};
use crate::ir::IrNode;
use crate::purity::verify_purity;
use crate::sexpr::{SExpr, Span, Symbol};

use super::LoweringContext;

/// One declared parameter: name, optional type annotation (`fx` requires
/// one; `fn` never carries one), optional default expression.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub param_type: Option<String>,
    pub default: Option<SExpr>,
}

#[derive(Debug, Clone)]
pub struct FnSignature {
    pub params: Vec<ParamSpec>,
    pub rest: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FxSignature {
    pub params: Vec<ParamSpec>,
    pub return_type: String,
}

impl FnSignature {
    fn required_count(&self) -> usize {
        self.params.iter().filter(|p| p.default.is_none()).count()
    }
}

impl FxSignature {
    fn required_count(&self) -> usize {
        self.params.iter().filter(|p| p.default.is_none()).count()
    }
}

/// Parses a parameter list shared by `fn` and `fx`: bare symbols, `(name =
/// default)`, `(name: Type)`, and `(name: Type = default)`; a lone `&ident`
/// introduces the rest parameter.
fn parse_params(items: &[SExpr], require_types: bool, span: Span, ctx: &PhaseContext) -> Result<(Vec<ParamSpec>, Option<String>), HqlError> {
    let mut params = Vec::new();
    let mut rest = None;
    let mut i = 0;
    while i < items.len() {
        if let Some(sym) = items[i].as_symbol() {
            if sym.as_str() == "&" {
                if rest.is_some() {
                    return Err(ctx.error(
                        ErrorKind::Validation {
                            message: "duplicate rest parameter".into(),
                            expected: Some("at most one rest parameter".into()),
                            found: Some("two".into()),
                        },
                        span,
                    ));
                }
                let name_expr = items.get(i + 1).ok_or_else(|| malformed_param(&items[i], ctx))?;
                let name = name_expr.as_symbol().ok_or_else(|| malformed_param(name_expr, ctx))?;
                rest = Some(name.as_str().to_string());
                i += 2;
                continue;
            }
            if require_types {
                return Err(untyped_param(sym, items[i].span(), ctx));
            }
            params.push(ParamSpec { name: sym.as_str().to_string(), param_type: None, default: None });
            i += 1;
            continue;
        }
        let fields = items[i].as_list().ok_or_else(|| malformed_param(&items[i], ctx))?;
        params.push(parse_param_list(fields, require_types, items[i].span(), ctx)?);
        i += 1;
    }
    Ok((params, rest))
}

/// `(name)`, `(name = default)`, `(name : Type)`, `(name : Type = default)`.
fn parse_param_list(fields: &[SExpr], require_types: bool, span: Span, ctx: &PhaseContext) -> Result<ParamSpec, HqlError> {
    let name = fields
        .first()
        .and_then(SExpr::as_symbol)
        .ok_or_else(|| malformed_param_list(span, ctx))?
        .as_str()
        .to_string();

    let mut param_type = None;
    let mut default = None;
    let mut i = 1;
    if fields.get(i).and_then(SExpr::as_symbol).map(Symbol::as_str) == Some(":") {
        let type_sym = fields.get(i + 1).and_then(SExpr::as_symbol).ok_or_else(|| malformed_param_list(span, ctx))?;
        param_type = Some(type_sym.as_str().to_string());
        i += 2;
    }
    if fields.get(i).and_then(SExpr::as_symbol).map(Symbol::as_str) == Some("=") {
        default = Some(fields.get(i + 1).ok_or_else(|| malformed_param_list(span, ctx))?.clone());
    }

    if require_types && param_type.is_none() {
        return Err(untyped_param(&Symbol::new(name), span, ctx));
    }
    Ok(ParamSpec { name, param_type, default })
}

fn malformed_param(expr: &SExpr, ctx: &PhaseContext) -> HqlError {
    ctx.error(
        ErrorKind::Validation { message: "malformed parameter".into(), expected: Some("parameter".into()), found: Some(expr.pretty()) },
        expr.span(),
    )
}

fn malformed_param_list(span: Span, ctx: &PhaseContext) -> HqlError {
    ctx.error(ErrorKind::Validation { message: "malformed parameter".into(), expected: Some("(name [: Type] [= default])".into()), found: None }, span)
}

fn untyped_param(sym: &Symbol, span: Span, ctx: &PhaseContext) -> HqlError {
    ctx.error(
        ErrorKind::Validation {
            message: format!("fx parameter '{sym}' must carry a type annotation"),
            expected: Some("Int | Double | String | Bool | Any | <enum>".into()),
            found: Some("untyped".into()),
        },
        span,
    )
}

/// `(fn name (params…) body…)`.
pub fn lower_fn_decl(items: &[SExpr], span: Span, lctx: &mut LoweringContext) -> Result<IrNode, HqlError> {
    let name = decl_name(items, span, lctx.phase)?;
    let param_items = items.get(2).and_then(SExpr::as_list).ok_or_else(|| malformed_decl("fn", span, lctx.phase))?;
    let (params, rest) = parse_params(param_items, false, span, lctx.phase)?;

    let param_names: Vec<String> = params.iter().map(|p| p.name.clone()).collect();
    let defaults = params.iter().map(|p| p.default.as_ref().map(|d| super::lower_form(d, lctx)).transpose()).collect::<Result<Vec<_>, _>>()?;
    let body = super::lower_body(&items[3..], lctx)?;
    lctx.fn_registry.insert(name.clone(), FnSignature { params, rest: rest.clone() });

    Ok(IrNode::FnFunctionDeclaration { name, params: param_names, defaults, rest, body: Box::new(body) })
}

/// `(fx name (params…) (-> ReturnType) body…)`.
pub fn lower_fx_decl(items: &[SExpr], span: Span, lctx: &mut LoweringContext) -> Result<IrNode, HqlError> {
    let name = decl_name(items, span, lctx.phase)?;
    let param_items = items.get(2).and_then(SExpr::as_list).ok_or_else(|| malformed_decl("fx", span, lctx.phase))?;
    let (params, _rest) = parse_params(param_items, true, span, lctx.phase)?;

    let return_type = parse_return_type(items.get(3), span, lctx.phase)?;

    let body_forms = &items[4..];
    if body_forms.is_empty() {
        return Err(malformed_decl("fx", span, lctx.phase));
    }
    let param_names: Vec<String> = params.iter().map(|p| p.name.clone()).collect();
    let body_expr = wrap_as_do(body_forms, span);
    verify_purity(&body_expr, &param_names, &lctx.pure_registry, lctx.phase)?;

    let defaults = params.iter().map(|p| p.default.as_ref().map(|d| super::lower_form(d, lctx)).transpose()).collect::<Result<Vec<_>, _>>()?;
    let param_types = params.iter().map(|p| p.param_type.clone().unwrap_or_default()).collect();
    let body = super::lower_body(body_forms, lctx)?;

    lctx.pure_registry.register(name.clone());
    lctx.fx_registry.insert(name.clone(), FxSignature { params, return_type: return_type.clone() });

    Ok(IrNode::FxFunctionDeclaration { name, params: param_names, defaults, param_types, return_type, body: Box::new(body) })
}

fn wrap_as_do(forms: &[SExpr], span: Span) -> SExpr {
    if forms.len() == 1 {
        forms[0].clone()
    } else {
        let mut items = vec![SExpr::symbol("do", span)];
        items.extend(forms.iter().cloned());
        SExpr::list(items, span)
    }
}

fn parse_return_type(form: Option<&SExpr>, span: Span, ctx: &PhaseContext) -> Result<String, HqlError> {
    let form = form.ok_or_else(|| malformed_decl("fx", span, ctx))?;
    let items = form.as_list().filter(|items| items.first().and_then(SExpr::as_symbol).map(Symbol::as_str) == Some("->"));
    let items = items.ok_or_else(|| malformed_decl("fx", span, ctx))?;
    let ty = items.get(1).and_then(SExpr::as_symbol).ok_or_else(|| malformed_decl("fx", span, ctx))?;
    Ok(ty.as_str().to_string())
}

fn decl_name(items: &[SExpr], span: Span, ctx: &PhaseContext) -> Result<String, HqlError> {
    items
        .get(1)
        .and_then(SExpr::as_symbol)
        .map(|s| s.mangled())
        .ok_or_else(|| malformed_decl("declaration", span, ctx))
}

fn malformed_decl(kind: &str, span: Span, ctx: &PhaseContext) -> HqlError {
    ctx.error(ErrorKind::Validation { message: format!("malformed '{kind}' declaration"), expected: None, found: None }, span)
}

/// The call-site resolver shared by `fn` and `fx` (spec §4.4.1/§4.4.2):
/// resolves positional, placeholder, and all-named argument lists against a
/// declared parameter order, producing a final call argument list.
pub fn resolve_call_args(
    name: &str,
    params: &[ParamSpec],
    rest: Option<&str>,
    required_count: usize,
    args: &[SExpr],
    span: Span,
    lctx: &mut LoweringContext,
) -> Result<Vec<IrNode>, HqlError> {
    let is_named = args.first().and_then(SExpr::as_symbol).map(Symbol::is_named_arg_label).unwrap_or(false);

    if is_named {
        if rest.is_some() {
            return Err(ctx_err(lctx.phase, "rest parameters cannot be combined with named arguments", span));
        }
        return resolve_named_args(name, params, args, span, lctx);
    }
    resolve_positional_args(name, params, rest, required_count, args, span, lctx)
}

fn resolve_named_args(name: &str, params: &[ParamSpec], args: &[SExpr], span: Span, lctx: &mut LoweringContext) -> Result<Vec<IrNode>, HqlError> {
    if args.len() % 2 != 0 {
        return Err(ctx_err(lctx.phase, "named arguments must come in label/value pairs", span));
    }
    let mut values: HashMap<String, &SExpr> = HashMap::new();
    for pair in args.chunks(2) {
        let label = pair[0].as_symbol().and_then(Symbol::named_arg_label).ok_or_else(|| ctx_err(lctx.phase, "expected a 'name:' label", pair[0].span()))?;
        if values.insert(label.to_string(), &pair[1]).is_some() {
            return Err(ctx_err(lctx.phase, &format!("duplicate named argument '{label}'"), pair[0].span()));
        }
    }

    let mut resolved = Vec::with_capacity(params.len());
    for param in params {
        if let Some(value) = values.remove(&param.name) {
            resolved.push(super::lower_form(value, lctx)?);
        } else if let Some(default) = &param.default {
            resolved.push(super::lower_form(default, lctx)?);
        } else {
            return Err(ctx_err(lctx.phase, &format!("'{name}' is missing required argument '{}'", param.name), span));
        }
    }
    if let Some(unknown) = values.keys().next() {
        return Err(ctx_err(lctx.phase, &format!("'{name}' has no parameter named '{unknown}'"), span));
    }
    Ok(resolved)
}

fn resolve_positional_args(
    name: &str,
    params: &[ParamSpec],
    rest: Option<&str>,
    required_count: usize,
    args: &[SExpr],
    span: Span,
    lctx: &mut LoweringContext,
) -> Result<Vec<IrNode>, HqlError> {
    let mut resolved = Vec::with_capacity(params.len());
    for (i, param) in params.iter().enumerate() {
        match args.get(i) {
            Some(arg) if arg.as_symbol().map(Symbol::is_placeholder).unwrap_or(false) => {
                let default = param.default.as_ref().ok_or_else(|| {
                    ctx_err(lctx.phase, &format!("'{}' has no default for placeholder at position {i}", param.name), arg.span())
                })?;
                resolved.push(super::lower_form(default, lctx)?);
            }
            Some(arg) => resolved.push(super::lower_form(arg, lctx)?),
            None => {
                let default = param.default.as_ref().ok_or_else(|| {
                    ctx_err(lctx.phase, &format!("'{name}' called with too few arguments (needs {required_count})"), span)
                })?;
                resolved.push(super::lower_form(default, lctx)?);
            }
        }
    }

    let extra = &args[params.len().min(args.len())..];
    if !extra.is_empty() {
        if rest.is_none() {
            return Err(ctx_err(lctx.phase, &format!("'{name}' called with too many arguments"), span));
        }
        for arg in extra {
            resolved.push(super::lower_form(arg, lctx)?);
        }
    }
    Ok(resolved)
}

fn ctx_err(ctx: &PhaseContext, message: &str, span: Span) -> HqlError {
    ctx.error(ErrorKind::Validation { message: message.to_string(), expected: None, found: None }, span)
}

/// Lowers a call to a registered `fn`/`fx` name (dispatch rule 6, spec
/// §4.4).
pub fn lower_registered_call(head: &str, args: &[SExpr], span: Span, lctx: &mut LoweringContext) -> Result<IrNode, HqlError> {
    if let Some(sig) = lctx.fn_registry.get(head).cloned() {
        let required = sig.required_count();
        let arguments = resolve_call_args(head, &sig.params, sig.rest.as_deref(), required, args, span, lctx)?;
        return Ok(IrNode::call(IrNode::ident(head), arguments));
    }
    if let Some(sig) = lctx.fx_registry.get(head).cloned() {
        let required = sig.required_count();
        let arguments = resolve_call_args(head, &sig.params, None, required, args, span, lctx)?;
        return Ok(IrNode::call(IrNode::ident(head), arguments));
    }
    unreachable!("lower_registered_call must only be invoked for a registered name")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Phase;

    fn ctx() -> PhaseContext {
        PhaseContext::new(Phase::Lowering, "test.hql", "")
    }

    fn lctx(phase: &PhaseContext) -> LoweringContext<'_> {
        LoweringContext::new(phase)
    }

    fn sym(name: &str) -> SExpr {
        SExpr::symbol(name, Span::default())
    }

    fn int(n: i64) -> SExpr {
        SExpr::Literal(crate::sexpr::Literal::Int(n), Span::default())
    }

    fn list(items: Vec<SExpr>) -> SExpr {
        SExpr::list(items, Span::default())
    }

    #[test]
    fn fn_decl_registers_signature_and_lowers_body() {
        let phase = ctx();
        let mut l = lctx(&phase);
        let decl = list(vec![sym("fn"), sym("add"), list(vec![sym("x"), sym("y")]), list(vec![sym("+"), sym("x"), sym("y")])]);
        let ir = lower_fn_decl(decl.as_list().unwrap(), Span::default(), &mut l).unwrap();
        assert!(matches!(ir, IrNode::FnFunctionDeclaration { .. }));
        assert!(l.fn_registry.contains_key("add"));
    }

    #[test]
    fn placeholder_substitutes_declared_default() {
        let phase = ctx();
        let mut l = lctx(&phase);
        let params = vec![ParamSpec { name: "name".into(), param_type: None, default: Some(SExpr::Literal(crate::sexpr::Literal::String("world".into()), Span::default())) }];
        let args = vec![sym("_")];
        let resolved = resolve_call_args("greet", &params, None, 0, &args, Span::default(), &mut l).unwrap();
        assert_eq!(resolved, vec![IrNode::StringLiteral("world".into())]);
    }

    #[test]
    fn missing_required_argument_is_fatal() {
        let phase = ctx();
        let mut l = lctx(&phase);
        let params = vec![ParamSpec { name: "x".into(), param_type: None, default: None }];
        assert!(resolve_call_args("f", &params, None, 1, &[], Span::default(), &mut l).is_err());
    }

    #[test]
    fn named_args_build_declaration_order_list() {
        let phase = ctx();
        let mut l = lctx(&phase);
        let params = vec![
            ParamSpec { name: "a".into(), param_type: None, default: None },
            ParamSpec { name: "b".into(), param_type: None, default: None },
        ];
        let args = vec![sym("b:"), int(2), sym("a:"), int(1)];
        let resolved = resolve_call_args("f", &params, None, 2, &args, Span::default(), &mut l).unwrap();
        assert_eq!(resolved, vec![IrNode::NumericLiteral(1.0), IrNode::NumericLiteral(2.0)]);
    }

    #[test]
    fn unknown_named_argument_is_fatal() {
        let phase = ctx();
        let mut l = lctx(&phase);
        let params = vec![ParamSpec { name: "a".into(), param_type: None, default: None }];
        let args = vec![sym("z:"), int(1)];
        assert!(resolve_call_args("f", &params, None, 1, &args, Span::default(), &mut l).is_err());
    }

    #[test]
    fn fx_decl_rejects_impure_body() {
        let phase = ctx();
        let mut l = lctx(&phase);
        let decl = list(vec![
            sym("fx"),
            sym("bad"),
            list(vec![list(vec![sym("x"), sym(":"), sym("Int")])]),
            list(vec![sym("->"), sym("Int")]),
            list(vec![sym("console.log"), sym("x")]),
            sym("x"),
        ]);
        assert!(lower_fx_decl(decl.as_list().unwrap(), Span::default(), &mut l).is_err());
    }

    #[test]
    fn fx_decl_requires_typed_params() {
        let phase = ctx();
        let mut l = lctx(&phase);
        let decl = list(vec![sym("fx"), sym("square"), list(vec![sym("x")]), list(vec![sym("->"), sym("Int")]), list(vec![sym("*"), sym("x"), sym("x")])]);
        assert!(lower_fx_decl(decl.as_list().unwrap(), Span::default(), &mut l).is_err());
    }

    #[test]
    fn fx_decl_accepts_pure_typed_body() {
        let phase = ctx();
        let mut l = lctx(&phase);
        let decl = list(vec![
            sym("fx"),
            sym("square"),
            list(vec![list(vec![sym("x"), sym(":"), sym("Int")])]),
            list(vec![sym("->"), sym("Int")]),
            list(vec![sym("*"), sym("x"), sym("x")]),
        ]);
        let ir = lower_fx_decl(decl.as_list().unwrap(), Span::default(), &mut l).unwrap();
        assert!(matches!(ir, IrNode::FxFunctionDeclaration { .. }));
        assert!(l.pure_registry.contains("square"));
    }
}
