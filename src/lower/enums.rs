//! Enum declarations (spec §4.4.5): bare, raw-valued, and associated-value
//! cases, with mixed shapes rejected within one enum.

use crate::diagnostics::PhaseContext;
use crate::errors::{ErrorKind, HqlError};
use crate::ir::{EnumCase, IrNode};
use crate::sexpr::{SExpr, Span, Symbol};

use super::LoweringContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaseShape {
    Bare,
    RawValued,
    Associated,
}

/// `(enum Name[:RawType] (case c [raw-or-associated…])…)`.
pub fn lower_enum(items: &[SExpr], span: Span, lctx: &mut LoweringContext) -> Result<IrNode, HqlError> {
    let (name, raw_type) = parse_enum_head(items.get(1), span, lctx.phase)?;

    let mut cases = Vec::new();
    let mut shape_seen: Option<CaseShape> = None;

    for case_form in &items[2..] {
        let case_items = case_form.as_list().filter(|it| it.first().and_then(SExpr::as_symbol).map(Symbol::as_str) == Some("case"));
        let case_items = case_items.ok_or_else(|| malformed(case_form.span(), lctx.phase))?;
        let (case, shape) = lower_case(case_items, raw_type.is_some(), case_form.span(), lctx)?;

        match shape_seen {
            None => shape_seen = Some(shape),
            Some(seen) if seen == shape => {}
            Some(_) => {
                return Err(lctx.phase.error(
                    ErrorKind::Validation {
                        message: "mixed enum case shapes are forbidden within one enum".into(),
                        expected: None,
                        found: None,
                    },
                    case_form.span(),
                ))
            }
        }
        cases.push(case);
    }

    Ok(IrNode::EnumDeclaration { name, raw_type, cases })
}

fn parse_enum_head(head: Option<&SExpr>, span: Span, ctx: &PhaseContext) -> Result<(String, Option<String>), HqlError> {
    let head = head.and_then(SExpr::as_symbol).ok_or_else(|| malformed(span, ctx))?;
    let text = head.as_str();
    match text.split_once(':') {
        Some((name, raw)) => Ok((name.to_string(), Some(raw.to_string()))),
        None => Ok((text.to_string(), None)),
    }
}

fn lower_case(items: &[SExpr], has_raw_type: bool, span: Span, lctx: &mut LoweringContext) -> Result<(EnumCase, CaseShape), HqlError> {
    let name = items.get(1).and_then(SExpr::as_symbol).map(Symbol::mangled).ok_or_else(|| malformed(span, lctx.phase))?;
    let payload = &items[2..];

    if payload.is_empty() {
        return Ok((EnumCase { name, raw_value: None, associated: Vec::new() }, CaseShape::Bare));
    }

    if let Some(associated) = try_parse_associated(payload) {
        return Ok((EnumCase { name, raw_value: None, associated }, CaseShape::Associated));
    }

    if !has_raw_type {
        return Err(lctx.phase.error(
            ErrorKind::Validation {
                message: "a raw-valued enum case requires the enum to declare a raw type".into(),
                expected: Some("enum Name:RawType".into()),
                found: None,
            },
            span,
        ));
    }
    let raw_value = super::lower_form(&payload[0], lctx)?;
    Ok((EnumCase { name, raw_value: Some(raw_value), associated: Vec::new() }, CaseShape::RawValued))
}

/// Associated-value cases carry one or more `label: Type` markers.
fn try_parse_associated(payload: &[SExpr]) -> Option<Vec<(String, String)>> {
    let mut out = Vec::new();
    for chunk in payload.chunks(2) {
        let label = chunk.first()?.as_symbol().and_then(Symbol::named_arg_label)?;
        let ty = chunk.get(1)?.as_symbol()?;
        out.push((label.to_string(), ty.as_str().to_string()));
    }
    if out.is_empty() { None } else { Some(out) }
}

fn malformed(span: Span, ctx: &PhaseContext) -> HqlError {
    ctx.error(ErrorKind::Validation { message: "malformed enum declaration".into(), expected: None, found: None }, span)
}
