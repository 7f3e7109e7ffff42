//! Arithmetic and comparison operator lowering (spec §4.4.6).

use crate::diagnostics::PhaseContext;
use crate::errors::{ErrorKind, HqlError};
use crate::ir::IrNode;
use crate::sexpr::Span;

const ARITHMETIC: &[&str] = &["+", "-", "*", "/", "%"];
const COMPARISON: &[&str] = &["=", "eq?", "!=", "<", ">", "<=", ">="];

pub fn is_primitive_operator(head: &str) -> bool {
    ARITHMETIC.contains(&head) || COMPARISON.contains(&head)
}

/// The JS operator token and, for unary arithmetic, the identity element to
/// left-fold against (spec §4.4.6: "unary with other ops uses an implicit
/// identity").
fn js_operator(op: &str) -> &'static str {
    match op {
        "=" | "eq?" => "===",
        "!=" => "!==",
        other => match other {
            "+" => "+",
            "-" => "-",
            "*" => "*",
            "/" => "/",
            "%" => "%",
            "<" => "<",
            ">" => ">",
            "<=" => "<=",
            ">=" => ">=",
            _ => unreachable!("js_operator called on non-primitive op {other}"),
        },
    }
}

fn unary_identity(op: &str) -> Option<f64> {
    match op {
        "+" | "-" => Some(0.0),
        "*" | "/" => Some(1.0),
        _ => None,
    }
}

/// Lowers an already-lowered argument list under operator `op` (spec
/// §4.4.6). `+`/`-` accept a single argument as a prefix unary operator;
/// every other arity folds left into a chain of binary expressions against
/// an implicit identity when there's only one operand.
pub fn lower_primitive(op: &str, args: Vec<IrNode>, span: Span, ctx: &PhaseContext) -> Result<IrNode, HqlError> {
    if COMPARISON.contains(&op) {
        return lower_comparison(op, args, span, ctx);
    }
    lower_arithmetic(op, args, span, ctx)
}

fn lower_arithmetic(op: &str, mut args: Vec<IrNode>, span: Span, ctx: &PhaseContext) -> Result<IrNode, HqlError> {
    if args.is_empty() {
        return Err(ctx.error(
            ErrorKind::Validation {
                message: format!("operator '{op}' requires at least one operand"),
                expected: Some("≥1 argument".into()),
                found: Some("0".into()),
            },
            span,
        ));
    }

    if args.len() == 1 {
        let operand = args.remove(0);
        if op == "+" || op == "-" {
            return Ok(IrNode::UnaryExpression {
                operator: op.to_string(),
                argument: Box::new(operand),
                prefix: true,
            });
        }
        let identity = unary_identity(op).expect("arithmetic op always has an identity");
        return Ok(IrNode::BinaryExpression {
            operator: js_operator(op).to_string(),
            left: Box::new(IrNode::NumericLiteral(identity)),
            right: Box::new(operand),
        });
    }

    let mut iter = args.into_iter();
    let mut acc = iter.next().expect("checked len above");
    for next in iter {
        acc = IrNode::BinaryExpression {
            operator: js_operator(op).to_string(),
            left: Box::new(acc),
            right: Box::new(next),
        };
    }
    Ok(acc)
}

fn lower_comparison(op: &str, args: Vec<IrNode>, span: Span, ctx: &PhaseContext) -> Result<IrNode, HqlError> {
    if args.len() != 2 {
        return Err(ctx.error(
            ErrorKind::Validation {
                message: format!("comparison operator '{op}' is strictly binary"),
                expected: Some("2 arguments".into()),
                found: Some(args.len().to_string()),
            },
            span,
        ));
    }
    let mut iter = args.into_iter();
    let left = iter.next().unwrap();
    let right = iter.next().unwrap();
    Ok(IrNode::BinaryExpression {
        operator: js_operator(op).to_string(),
        left: Box::new(left),
        right: Box::new(right),
    })
}
