//! `loop`/`recur` (spec §4.4.3): explicit tail recursion sugar, lowered to a
//! named function invoked immediately, plus a tail-position call back into
//! it.

use crate::diagnostics::PhaseContext;
use crate::errors::{ErrorKind, HqlError};
use crate::ir::IrNode;
use crate::sexpr::{SExpr, Span};

use super::LoweringContext;

/// `(loop (b1 v1 b2 v2 …) body…)` → an IIFE over a named function whose
/// parameters are the binding names and whose initial call supplies the
/// initial values.
pub fn lower_loop(items: &[SExpr], span: Span, lctx: &mut LoweringContext) -> Result<IrNode, HqlError> {
    let bindings = items.get(1).and_then(SExpr::as_list).ok_or_else(|| malformed(span, lctx.phase))?;
    if bindings.len() % 2 != 0 {
        return Err(malformed(span, lctx.phase));
    }

    let mut names = Vec::with_capacity(bindings.len() / 2);
    let mut initials = Vec::with_capacity(bindings.len() / 2);
    for pair in bindings.chunks(2) {
        let name = pair[0].as_symbol().ok_or_else(|| malformed(span, lctx.phase))?.mangled();
        names.push(name);
        initials.push(super::lower_form(&pair[1], lctx)?);
    }

    let loop_name = lctx.fresh_loop_name();
    lctx.loop_context_stack.push(loop_name.clone());
    let body = super::lower_body(&items[2..], lctx);
    lctx.loop_context_stack.pop();
    let body = body?;

    let declaration = IrNode::FunctionDeclaration { name: loop_name.clone(), params: names, body: Box::new(body) };
    let initial_call = IrNode::call(IrNode::ident(loop_name), initials);

    // An IIFE: `(function(){ function loop_N(...){...}; return loop_N(initials); })()`
    let iife_body = IrNode::block(vec![declaration, IrNode::return_stmt(Some(initial_call))]);
    let iife = IrNode::FunctionExpression { name: None, params: vec![], body: Box::new(iife_body) };
    Ok(IrNode::call(iife, vec![]))
}

/// `(recur v1 v2 …)` in tail position → `return loop_N(v1, v2, …)`. Fatal
/// outside a surrounding `loop`.
pub fn lower_recur_tail(items: &[SExpr], span: Span, lctx: &mut LoweringContext) -> Result<IrNode, HqlError> {
    let Some(loop_name) = lctx.loop_context_stack.last().cloned() else {
        return Err(lctx.phase.error(
            ErrorKind::Transform { message: "'recur' used outside any enclosing 'loop'".into() },
            span,
        ));
    };
    let args = items[1..].iter().map(|a| super::lower_form(a, lctx)).collect::<Result<Vec<_>, _>>()?;
    Ok(IrNode::return_stmt(Some(IrNode::call(IrNode::ident(loop_name), args))))
}

/// A bare, non-tail `(recur …)` reference is just as fatal: `recur` only
/// has meaning as a tail call.
pub fn lower_recur_non_tail(span: Span, ctx: &PhaseContext) -> HqlError {
    ctx.error(
        ErrorKind::Transform { message: "'recur' may only appear in tail position".into() },
        span,
    )
}

fn malformed(span: Span, ctx: &PhaseContext) -> HqlError {
    ctx.error(
        ErrorKind::Validation { message: "malformed 'loop' form".into(), expected: Some("(loop (b1 v1 …) body…)".into()), found: None },
        span,
    )
}
