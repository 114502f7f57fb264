use std::ops::Range;

use thiserror::Error;

/// Everything that can go wrong between source text and a finite number.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalcError {
    #[error("empty expression")]
    Empty,

    #[error("unexpected character {ch:?}")]
    UnexpectedChar { ch: char, span: Range<usize> },

    #[error("invalid number literal {text:?}")]
    InvalidNumber { text: String, span: Range<usize> },

    #[error("unexpected token")]
    UnexpectedToken { span: Range<usize> },

    #[error("unexpected end of expression")]
    UnexpectedEnd { span: Range<usize> },

    #[error("unclosed parenthesis")]
    UnclosedParen { span: Range<usize> },

    #[error("division by zero")]
    DivisionByZero { span: Range<usize> },

    #[error("result is not a finite number")]
    NonFinite,

    #[error("expression nested too deeply")]
    TooDeep,
}

impl CalcError {
    /// Byte span in the source the error points at, if it has one.
    pub fn span(&self) -> Option<Range<usize>> {
        match self {
            CalcError::UnexpectedChar { span, .. }
            | CalcError::InvalidNumber { span, .. }
            | CalcError::UnexpectedToken { span }
            | CalcError::UnexpectedEnd { span }
            | CalcError::UnclosedParen { span }
            | CalcError::DivisionByZero { span } => Some(span.clone()),
            CalcError::Empty | CalcError::NonFinite | CalcError::TooDeep => None,
        }
    }
}
