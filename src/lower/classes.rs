//! Class declarations (spec §4.4.4): fields, one constructor, and methods,
//! with `self` rewritten to `this` within the class body.

use crate::diagnostics::PhaseContext;
use crate::errors::{ErrorKind, HqlError};
use crate::ir::{ClassConstructor, ClassField, ClassMethod, IrNode};
use crate::sexpr::{SExpr, Span, Symbol};

use super::LoweringContext;

/// `(class Name (var/let field [init])… (constructor (params…) body…) (fn/fx
/// method (params…) body…)…)`.
pub fn lower_class(items: &[SExpr], span: Span, lctx: &mut LoweringContext) -> Result<IrNode, HqlError> {
    let name = items.get(1).and_then(SExpr::as_symbol).map(Symbol::mangled).ok_or_else(|| malformed(span, lctx.phase))?;

    let mut fields = Vec::new();
    let mut constructor = None;
    let mut methods = Vec::new();

    for member in &items[2..] {
        let member_items = member.as_list().ok_or_else(|| malformed(member.span(), lctx.phase))?;
        let head = member_items.first().and_then(SExpr::as_symbol).map(Symbol::as_str).ok_or_else(|| malformed(member.span(), lctx.phase))?;
        match head {
            "var" | "let" => fields.push(lower_field(member_items, head == "var", member.span(), lctx)?),
            "constructor" => {
                if constructor.is_some() {
                    return Err(lctx.phase.error(
                        ErrorKind::Validation { message: "a class may declare at most one constructor".into(), expected: None, found: None },
                        member.span(),
                    ));
                }
                constructor = Some(lower_constructor(member_items, member.span(), lctx)?);
            }
            "fn" | "fx" => methods.push(lower_method(member_items, head == "fx", member.span(), lctx)?),
            other => {
                return Err(lctx.phase.error(
                    ErrorKind::Validation { message: format!("'{other}' is not a valid class member"), expected: None, found: Some(other.to_string()) },
                    member.span(),
                ))
            }
        }
    }

    Ok(IrNode::ClassDeclaration { name, fields, constructor, methods })
}

fn lower_field(items: &[SExpr], mutable: bool, span: Span, lctx: &mut LoweringContext) -> Result<ClassField, HqlError> {
    let name = items.get(1).and_then(SExpr::as_symbol).map(Symbol::mangled).ok_or_else(|| malformed(span, lctx.phase))?;
    let init = items.get(2).map(|e| lower_self_rewritten(e, lctx)).transpose()?;
    Ok(ClassField { name, mutable, init })
}

fn lower_constructor(items: &[SExpr], span: Span, lctx: &mut LoweringContext) -> Result<ClassConstructor, HqlError> {
    let param_items = items.get(1).and_then(SExpr::as_list).ok_or_else(|| malformed(span, lctx.phase))?;
    let params = param_items.iter().map(|p| p.as_symbol().map(Symbol::mangled).ok_or_else(|| malformed(p.span(), lctx.phase))).collect::<Result<Vec<_>, _>>()?;

    let body_forms: Vec<SExpr> = items[2..].iter().map(|f| rewrite_self(f)).collect();
    let mut body = super::lower_body(&body_forms, lctx)?;
    ensure_implicit_return_this(&mut body);
    Ok(ClassConstructor { params, body: Box::new(body) })
}

/// Constructors that don't explicitly return append `return this` (spec
/// §4.4.4).
fn ensure_implicit_return_this(body: &mut IrNode) {
    if let IrNode::BlockStatement(stmts) = body {
        let needs_return = !matches!(stmts.last(), Some(IrNode::ReturnStatement(_)));
        if needs_return {
            stmts.push(IrNode::return_stmt(Some(IrNode::ident("this"))));
        }
    }
}

fn lower_method(items: &[SExpr], is_fx: bool, span: Span, lctx: &mut LoweringContext) -> Result<ClassMethod, HqlError> {
    let name = items.get(1).and_then(SExpr::as_symbol).map(Symbol::mangled).ok_or_else(|| malformed(span, lctx.phase))?;
    let param_items = items.get(2).and_then(SExpr::as_list).ok_or_else(|| malformed(span, lctx.phase))?;

    let body_start = if is_fx { 4 } else { 3 };
    let (params, defaults) = parse_method_params(param_items, is_fx, span, lctx)?;

    let body_forms: Vec<SExpr> = items.get(body_start..).unwrap_or(&[]).iter().map(|f| rewrite_self(f)).collect();
    if body_forms.is_empty() {
        return Err(malformed(span, lctx.phase));
    }
    let body = super::lower_body(&body_forms, lctx)?;
    Ok(ClassMethod { name, is_fx, params, defaults, body: Box::new(body) })
}

fn parse_method_params(items: &[SExpr], is_fx: bool, span: Span, lctx: &mut LoweringContext) -> Result<(Vec<String>, Vec<Option<IrNode>>), HqlError> {
    let mut names = Vec::new();
    let mut defaults = Vec::new();
    for item in items {
        match item.as_symbol() {
            Some(sym) => {
                names.push(sym.mangled());
                defaults.push(None);
            }
            None => {
                let fields = item.as_list().ok_or_else(|| malformed(item.span(), lctx.phase))?;
                let name = fields.first().and_then(SExpr::as_symbol).map(Symbol::mangled).ok_or_else(|| malformed(item.span(), lctx.phase))?;
                let default_expr = fields.iter().position(|f| f.as_symbol().map(Symbol::as_str) == Some("=")).and_then(|i| fields.get(i + 1));
                let default = default_expr.map(|d| lower_self_rewritten(d, lctx)).transpose()?;
                names.push(name);
                defaults.push(default);
            }
        }
    }
    let _ = is_fx; // fx methods carry defaults too but skip the deep-copy prologue (printer's concern).
    Ok((names, defaults))
}

fn lower_self_rewritten(expr: &SExpr, lctx: &mut LoweringContext) -> Result<IrNode, HqlError> {
    let rewritten = rewrite_self(expr);
    super::lower_form(&rewritten, lctx)
}

/// Replaces every occurrence of the identifier `self` with `this` within a
/// class body (spec §4.4.4). Operates on the canonical `SExpr` tree before
/// lowering, since `this` has no meaning outside a class and the rewrite is
/// purely textual.
fn rewrite_self(expr: &SExpr) -> SExpr {
    match expr {
        SExpr::Symbol(sym, span) if sym.as_str() == "self" => SExpr::symbol("this", *span),
        SExpr::List(items, span) => SExpr::List(items.iter().map(rewrite_self).collect(), *span),
        other => other.clone(),
    }
}

fn malformed(span: Span, ctx: &PhaseContext) -> HqlError {
    ctx.error(ErrorKind::Validation { message: "malformed class member".into(), expected: None, found: None }, span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Phase;

    fn ctx() -> PhaseContext {
        PhaseContext::new(Phase::Lowering, "test.hql", "")
    }

    fn sym(name: &str) -> SExpr {
        SExpr::symbol(name, Span::default())
    }

    fn list(items: Vec<SExpr>) -> SExpr {
        SExpr::list(items, Span::default())
    }

    #[test]
    fn self_is_rewritten_to_this() {
        let expr = list(vec![sym("js-get"), sym("self"), sym("count")]);
        let rewritten = rewrite_self(&expr);
        assert_eq!(rewritten.as_list().unwrap()[1].as_symbol().unwrap().as_str(), "this");
    }

    #[test]
    fn constructor_without_explicit_return_appends_return_this() {
        let phase = ctx();
        let mut l = LoweringContext::new(&phase);
        let ctor = list(vec![sym("constructor"), list(vec![sym("x")]), list(vec![sym("js-set"), sym("self"), sym("x"), sym("x")])]);
        let result = lower_constructor(ctor.as_list().unwrap(), Span::default(), &mut l).unwrap();
        match *result.body {
            IrNode::BlockStatement(stmts) => assert!(matches!(stmts.last(), Some(IrNode::ReturnStatement(_)))),
            _ => panic!("expected block body"),
        }
    }

    #[test]
    fn class_with_duplicate_constructor_is_fatal() {
        let phase = ctx();
        let mut l = LoweringContext::new(&phase);
        let class = list(vec![
            sym("class"),
            sym("Foo"),
            list(vec![sym("constructor"), list(vec![]), sym("self")]),
            list(vec![sym("constructor"), list(vec![]), sym("self")]),
        ]);
        assert!(lower_class(class.as_list().unwrap(), Span::default(), &mut l).is_err());
    }
}
