use std::ops::Range;

use crate::error::CalcError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

/// Split `text` into tokens with their byte spans.
///
/// Unlike a lenient lexer this refuses anything it does not recognise, so a
/// stray letter fails the whole expression instead of being skipped.
pub(crate) fn tokenize(text: &str) -> Result<Vec<(Token, Range<usize>)>, CalcError> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        let single = |token: Token| (token, start..start + c.len_utf8());
        match c {
            c if c.is_whitespace() => {}

            '0'..='9' | '.' => {
                let mut end = start + 1;
                while let Some(&(pos, next)) = chars.peek() {
                    if next.is_ascii_digit() || next == '.' {
                        end = pos + 1;
                        chars.next();
                    } else {
                        break;
                    }
                }
                let literal = &text[start..end];
                let value = literal.parse::<f64>().map_err(|_| CalcError::InvalidNumber {
                    text: literal.to_string(),
                    span: start..end,
                })?;
                tokens.push((Token::Number(value), start..end));
            }

            '+' => tokens.push(single(Token::Plus)),
            '-' => tokens.push(single(Token::Minus)),
            '*' => tokens.push(single(Token::Star)),
            '/' => tokens.push(single(Token::Slash)),
            '(' => tokens.push(single(Token::LParen)),
            ')' => tokens.push(single(Token::RParen)),

            other => {
                return Err(CalcError::UnexpectedChar {
                    ch: other,
                    span: start..start + other.len_utf8(),
                });
            }
        }
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<Token> {
        tokenize(text).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn numbers_and_operators() {
        assert_eq!(
            kinds("1000*0.2"),
            vec![Token::Number(1000.0), Token::Star, Token::Number(0.2)]
        );
        assert_eq!(
            kinds(" (1 + .5) / 2 "),
            vec![
                Token::LParen,
                Token::Number(1.0),
                Token::Plus,
                Token::Number(0.5),
                Token::RParen,
                Token::Slash,
                Token::Number(2.0),
            ]
        );
    }

    #[test]
    fn spans_are_byte_offsets() {
        let tokens = tokenize("12 - 3").unwrap();
        assert_eq!(tokens[0].1, 0..2);
        assert_eq!(tokens[1].1, 3..4);
        assert_eq!(tokens[2].1, 5..6);
    }

    #[test]
    fn malformed_number_is_rejected() {
        assert!(matches!(
            tokenize("1.2.3"),
            Err(CalcError::InvalidNumber { .. })
        ));
        assert!(matches!(tokenize("."), Err(CalcError::InvalidNumber { .. })));
    }

    #[test]
    fn unknown_characters_are_rejected() {
        assert_eq!(
            tokenize("2 ^ 3"),
            Err(CalcError::UnexpectedChar { ch: '^', span: 2..3 })
        );
        assert!(tokenize("alert(1)").is_err());
    }
}
