use crate::ast::{BinaryOperator, Expr, MAX_HEIGHT, UnaryOperator};
use crate::error::CalcError;

/// Evaluate an expression tree to a finite number.
pub fn evaluate(expr: &Expr) -> Result<f64, CalcError> {
    let value = eval_at(expr, 0)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CalcError::NonFinite)
    }
}

fn eval_at(expr: &Expr, depth: usize) -> Result<f64, CalcError> {
    if depth >= MAX_HEIGHT {
        return Err(CalcError::TooDeep);
    }

    match expr {
        Expr::NumberLiteral(n) => Ok(*n),

        Expr::UnaryOperation { operator, operand } => {
            let n = eval_at(operand, depth + 1)?;
            Ok(match operator {
                UnaryOperator::Negation => -n,
                UnaryOperator::Identity => n,
            })
        }

        Expr::BinaryOperation {
            operator,
            left,
            right,
            span,
        } => {
            let l = eval_at(left, depth + 1)?;
            let r = eval_at(right, depth + 1)?;
            match operator {
                BinaryOperator::Addition => Ok(l + r),
                BinaryOperator::Subtraction => Ok(l - r),
                BinaryOperator::Multiplication => Ok(l * r),
                BinaryOperator::Division => {
                    if r == 0.0 {
                        Err(CalcError::DivisionByZero { span: span.clone() })
                    } else {
                        Ok(l / r)
                    }
                }
            }
        }
    }
}

/// Render a number the way it should appear in document text.
///
/// Whole numbers print without a fraction (`200`, not `200.0`); everything
/// else uses the shortest representation that round-trips.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n == n.floor() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}
