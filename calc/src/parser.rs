use std::ops::Range;

use crate::ast::{BinaryOperator, Expr, MAX_HEIGHT, UnaryOperator};
use crate::error::CalcError;
use crate::token::{Token, tokenize};

// Binding powers (precedence). Higher = tighter binding.
// All binary operators are left-associative: right = left + 1.
const BP_ADDITIVE: u8 = 2; // + -
const BP_MULTIPLICATIVE: u8 = 4; // * /
const BP_UNARY: u8 = 6; // -x +x

/// Nesting of parentheses and unary signs the parser will recurse into.
const MAX_NESTING: usize = 128;

/// Parse a complete arithmetic expression. Trailing tokens are an error.
pub fn parse(source: &str) -> Result<Expr, CalcError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(CalcError::Empty);
    }

    let mut parser = ExprParser::new(tokens, source.len());
    let parsed = parser.parse_expr(0, 0)?;
    if let Some((_, span)) = parser.peek() {
        return Err(CalcError::UnexpectedToken { span: span.clone() });
    }
    Ok(parsed.expr)
}

/// A subtree and its height. Left folds grow the tree without recursing, so
/// the height is checked as it is built.
struct Parsed {
    expr: Expr,
    height: usize,
}

impl Parsed {
    fn leaf(expr: Expr) -> Self {
        Parsed { expr, height: 1 }
    }

    fn node(expr: Expr, height: usize) -> Result<Self, CalcError> {
        if height > MAX_HEIGHT {
            return Err(CalcError::TooDeep);
        }
        Ok(Parsed { expr, height })
    }
}

// ---------------------------------------------------------------------------
// Pratt parser
// ---------------------------------------------------------------------------

struct ExprParser {
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
    source_len: usize,
}

impl ExprParser {
    fn new(tokens: Vec<(Token, Range<usize>)>, source_len: usize) -> Self {
        ExprParser {
            tokens,
            pos: 0,
            source_len,
        }
    }

    fn peek(&self) -> Option<&(Token, Range<usize>)> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<(Token, Range<usize>)> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn end_span(&self) -> Range<usize> {
        self.source_len..self.source_len
    }

    fn parse_expr(&mut self, min_bp: u8, depth: usize) -> Result<Parsed, CalcError> {
        if depth > MAX_NESTING {
            return Err(CalcError::TooDeep);
        }

        let mut left = self.parse_prefix(depth)?;

        while let Some((token, span)) = self.peek().cloned() {
            let Some((operator, l_bp, r_bp)) = infix(token) else {
                break;
            };
            if l_bp < min_bp {
                break;
            }

            self.advance();
            let right = self.parse_expr(r_bp, depth + 1)?;
            let height = left.height.max(right.height) + 1;
            left = Parsed::node(
                Expr::BinaryOperation {
                    operator,
                    left: Box::new(left.expr),
                    right: Box::new(right.expr),
                    span,
                },
                height,
            )?;
        }

        Ok(left)
    }

    fn parse_prefix(&mut self, depth: usize) -> Result<Parsed, CalcError> {
        let (token, span) = self.advance().ok_or_else(|| CalcError::UnexpectedEnd {
            span: self.end_span(),
        })?;

        match token {
            Token::Number(n) => Ok(Parsed::leaf(Expr::NumberLiteral(n))),

            Token::Minus | Token::Plus => {
                let operator = if token == Token::Minus {
                    UnaryOperator::Negation
                } else {
                    UnaryOperator::Identity
                };
                let operand = self.parse_expr(BP_UNARY, depth + 1)?;
                Parsed::node(
                    Expr::UnaryOperation {
                        operator,
                        operand: Box::new(operand.expr),
                    },
                    operand.height + 1,
                )
            }

            Token::LParen => {
                let inner = self.parse_expr(0, depth + 1)?;
                match self.advance() {
                    Some((Token::RParen, _)) => Ok(inner),
                    Some((_, other)) => Err(CalcError::UnexpectedToken { span: other }),
                    None => Err(CalcError::UnclosedParen { span }),
                }
            }

            Token::Star | Token::Slash | Token::RParen => Err(CalcError::UnexpectedToken { span }),
        }
    }
}

/// Infix operator and its (left_bp, right_bp), or None if `token` is not infix.
fn infix(token: Token) -> Option<(BinaryOperator, u8, u8)> {
    match token {
        Token::Plus => Some((BinaryOperator::Addition, BP_ADDITIVE, BP_ADDITIVE + 1)),
        Token::Minus => Some((BinaryOperator::Subtraction, BP_ADDITIVE, BP_ADDITIVE + 1)),
        Token::Star => Some((
            BinaryOperator::Multiplication,
            BP_MULTIPLICATIVE,
            BP_MULTIPLICATIVE + 1,
        )),
        Token::Slash => Some((
            BinaryOperator::Division,
            BP_MULTIPLICATIVE,
            BP_MULTIPLICATIVE + 1,
        )),
        _ => None,
    }
}
