//! Host interop forms (spec §4.4.7): direct MemberExpression / CallExpression
//! / NewExpression lowerings, plus the two safe-dynamic-dispatch IR nodes
//! `InteropIIFE` and `GetAndCall`.

use crate::diagnostics::PhaseContext;
use crate::errors::{ErrorKind, HqlError};
use crate::ir::IrNode;
use crate::sexpr::{SExpr, Span};

/// `(js-get obj prop)` → `obj.prop` (or `obj[prop]` when `prop` isn't a bare
/// identifier symbol).
pub fn lower_js_get(args: &[SExpr], span: Span, lower: &mut dyn FnMut(&SExpr) -> Result<IrNode, HqlError>, ctx: &PhaseContext) -> Result<IrNode, HqlError> {
    let [object, property] = require_arity(args, 2, "js-get", span, ctx)?;
    let object = lower(object)?;
    let (property, computed) = lower_property(property, lower)?;
    Ok(IrNode::member(object, property, computed))
}

/// `(js-call obj method arg…)` → `obj.method(arg…)`.
pub fn lower_js_call(args: &[SExpr], span: Span, lower: &mut dyn FnMut(&SExpr) -> Result<IrNode, HqlError>, ctx: &PhaseContext) -> Result<IrNode, HqlError> {
    if args.len() < 2 {
        return Err(arity_error("js-call", "≥2", args.len(), span, ctx));
    }
    let object = lower(&args[0])?;
    let (property, computed) = lower_property(&args[1], lower)?;
    let callee = IrNode::member(object, property, computed);
    let arguments = args[2..].iter().map(|a| lower(a)).collect::<Result<Vec<_>, _>>()?;
    Ok(IrNode::call(callee, arguments))
}

/// `(js-new ctor arg…)` → `new ctor(arg…)`.
pub fn lower_js_new(args: &[SExpr], span: Span, lower: &mut dyn FnMut(&SExpr) -> Result<IrNode, HqlError>, ctx: &PhaseContext) -> Result<IrNode, HqlError> {
    if args.is_empty() {
        return Err(arity_error("js-new", "≥1", 0, span, ctx));
    }
    let callee = lower(&args[0])?;
    let arguments = args[1..].iter().map(|a| lower(a)).collect::<Result<Vec<_>, _>>()?;
    Ok(IrNode::NewExpression { callee: Box::new(callee), arguments })
}

/// `(js-set obj prop value)` → `obj.prop = value`.
pub fn lower_js_set(args: &[SExpr], span: Span, lower: &mut dyn FnMut(&SExpr) -> Result<IrNode, HqlError>, ctx: &PhaseContext) -> Result<IrNode, HqlError> {
    let [object, property, value] = require_arity(args, 3, "js-set", span, ctx)?;
    let object = lower(object)?;
    let (property, computed) = lower_property(property, lower)?;
    let target = IrNode::member(object, property, computed);
    let value = lower(value)?;
    Ok(IrNode::AssignmentExpression { operator: "=".into(), target: Box::new(target), value: Box::new(value) })
}

/// `(js-get-invoke obj prop arg…)` → `InteropIIFE`, the safe dynamic
/// accessor (spec §4.4.7).
pub fn lower_js_get_invoke(args: &[SExpr], span: Span, lower: &mut dyn FnMut(&SExpr) -> Result<IrNode, HqlError>, ctx: &PhaseContext) -> Result<IrNode, HqlError> {
    if args.len() < 2 {
        return Err(arity_error("js-get-invoke", "≥2", args.len(), span, ctx));
    }
    let object = lower(&args[0])?;
    let property = property_name(&args[1], ctx)?;
    let arguments = args[2..].iter().map(|a| lower(a)).collect::<Result<Vec<_>, _>>()?;
    Ok(IrNode::InteropIIFE { object: Box::new(object), property, arguments })
}

/// `(method-call obj method arg…)` → `GetAndCall`: dispatch on a method
/// whose callability isn't statically knowable (spec §4.4.7).
pub fn lower_method_call(args: &[SExpr], span: Span, lower: &mut dyn FnMut(&SExpr) -> Result<IrNode, HqlError>, ctx: &PhaseContext) -> Result<IrNode, HqlError> {
    if args.len() < 2 {
        return Err(arity_error("method-call", "≥2", args.len(), span, ctx));
    }
    let object = lower(&args[0])?;
    let method = property_name(&args[1], ctx)?;
    let arguments = args[2..].iter().map(|a| lower(a)).collect::<Result<Vec<_>, _>>()?;
    Ok(IrNode::GetAndCall { object: Box::new(object), method, arguments })
}

fn property_name(expr: &SExpr, ctx: &PhaseContext) -> Result<String, HqlError> {
    match expr.as_symbol() {
        Some(sym) => Ok(sym.as_str().to_string()),
        None => match expr {
            SExpr::Literal(crate::sexpr::Literal::String(s), _) => Ok(s.clone()),
            _ => Err(ctx.error(
                ErrorKind::Validation {
                    message: "property name must be a symbol or string literal".into(),
                    expected: Some("symbol or string".into()),
                    found: Some(expr.pretty()),
                },
                expr.span(),
            )),
        },
    }
}

/// A bare symbol property lowers to a static (non-computed) member access;
/// anything else is lowered and accessed as a computed member.
fn lower_property(expr: &SExpr, lower: &mut dyn FnMut(&SExpr) -> Result<IrNode, HqlError>) -> Result<(IrNode, bool), HqlError> {
    match expr.as_symbol() {
        Some(sym) => Ok((IrNode::ident(sym.without_js_escape()), false)),
        None => Ok((lower(expr)?, true)),
    }
}

fn arity_error(name: &str, expected: &str, found: usize, span: Span, ctx: &PhaseContext) -> HqlError {
    ctx.error(
        ErrorKind::Validation {
            message: format!("'{name}' called with the wrong number of arguments"),
            expected: Some(expected.into()),
            found: Some(found.to_string()),
        },
        span,
    )
}

fn require_arity<'a, const N: usize>(args: &'a [SExpr], n: usize, name: &str, span: Span, ctx: &PhaseContext) -> Result<&'a [SExpr; N], HqlError> {
    args.try_into().map_err(|_| arity_error(name, &n.to_string(), args.len(), span, ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Phase;
    use crate::sexpr::Literal;

    fn ctx() -> PhaseContext {
        PhaseContext::new(Phase::Lowering, "test.hql", "")
    }

    fn sym(name: &str) -> SExpr {
        SExpr::symbol(name, Span::default())
    }

    fn trivial_lower(expr: &SExpr) -> Result<IrNode, HqlError> {
        Ok(match expr {
            SExpr::Symbol(s, _) => IrNode::ident(s.as_str()),
            SExpr::Literal(Literal::Int(i), _) => IrNode::NumericLiteral(*i as f64),
            _ => IrNode::NullLiteral,
        })
    }

    #[test]
    fn js_get_lowers_to_static_member() {
        let args = [sym("obj"), sym("prop")];
        let ir = lower_js_get(&args, Span::default(), &mut trivial_lower, &ctx()).unwrap();
        assert_eq!(ir, IrNode::member(IrNode::ident("obj"), IrNode::ident("prop"), false));
    }

    #[test]
    fn js_get_invoke_builds_interop_iife() {
        let args = [sym("obj"), sym("maybeFn")];
        let ir = lower_js_get_invoke(&args, Span::default(), &mut trivial_lower, &ctx()).unwrap();
        match ir {
            IrNode::InteropIIFE { property, arguments, .. } => {
                assert_eq!(property, "maybeFn");
                assert!(arguments.is_empty());
            }
            _ => panic!("expected InteropIIFE"),
        }
    }

    #[test]
    fn method_call_builds_get_and_call() {
        let args = [sym("obj"), sym("run"), sym("x")];
        let ir = lower_method_call(&args, Span::default(), &mut trivial_lower, &ctx()).unwrap();
        match ir {
            IrNode::GetAndCall { method, arguments, .. } => {
                assert_eq!(method, "run");
                assert_eq!(arguments.len(), 1);
            }
            _ => panic!("expected GetAndCall"),
        }
    }

    #[test]
    fn js_call_with_too_few_args_is_fatal() {
        let args = [sym("obj")];
        assert!(lower_js_call(&args, Span::default(), &mut trivial_lower, &ctx()).is_err());
    }
}
