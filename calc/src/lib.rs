//! Arithmetic over plain numbers: `+ - * /`, unary signs and parentheses.
//!
//! There are no identifiers, calls or strings, so nothing an input can say
//! reaches beyond the number it evaluates to.

pub mod ast;
pub mod error;
pub mod evaluator;
pub mod parser;
mod token;

pub use error::CalcError;
pub use evaluator::{evaluate, format_number};
pub use parser::parse;

/// Parse and evaluate `source` in one step.
pub fn eval_str(source: &str) -> Result<f64, CalcError> {
    let expr = parser::parse(source)?;
    evaluator::evaluate(&expr)
}
