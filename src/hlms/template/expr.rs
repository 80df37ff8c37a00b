//! Condition expressions of `@property( ... )`.
//!
//! Grammar, loosest binding first:
//!
//! ```text
//! or      := and ( "||" and )*
//! and     := compare ( "&&" compare )*
//! compare := unary ( ( "==" | "!=" | "<" | "<=" | ">" | ">=" ) unary )?
//! unary   := "!" unary | primary
//! primary := "(" or ")" | identifier | integer
//! ```
//!
//! Identifiers evaluate to their property value, 0 when unset.

use crate::hlms::property::PropertySet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Ident(&'a str),
    Number(i64),
    Not,
    And,
    Or,
    LParen,
    RParen,
    Cmp(CmpOp),
}

fn tokenize(src: &str) -> Result<Vec<Token<'_>>, String> {
    let bytes = src.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match b {
            b' ' | b'\t' | b'\r' | b'\n' => i += 1,
            b'(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            b')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            b'&' if next == Some(b'&') => {
                tokens.push(Token::And);
                i += 2;
            }
            b'|' if next == Some(b'|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            b'=' if next == Some(b'=') => {
                tokens.push(Token::Cmp(CmpOp::Eq));
                i += 2;
            }
            b'!' if next == Some(b'=') => {
                tokens.push(Token::Cmp(CmpOp::Ne));
                i += 2;
            }
            b'!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            b'<' | b'>' => {
                let or_equal = next == Some(b'=');
                tokens.push(Token::Cmp(match (b, or_equal) {
                    (b'<', false) => CmpOp::Lt,
                    (b'<', true) => CmpOp::Le,
                    (_, false) => CmpOp::Gt,
                    (_, true) => CmpOp::Ge,
                }));
                i += if or_equal { 2 } else { 1 };
            }
            b'0'..=b'9' | b'-' => {
                let start = i;
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let literal = &src[start..i];
                let value = literal
                    .parse::<i64>()
                    .map_err(|_| format!("invalid number '{literal}'"))?;
                tokens.push(Token::Number(value));
            }
            b if b.is_ascii_alphabetic() || b == b'_' => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                tokens.push(Token::Ident(&src[start..i]));
            }
            _ => {
                let ch = src[i..].chars().next().unwrap_or('?');
                return Err(format!("unexpected character '{ch}'"));
            }
        }
    }

    Ok(tokens)
}

struct Parser<'a, 'p> {
    tokens: Vec<Token<'a>>,
    pos: usize,
    props: &'p PropertySet,
}

impl<'a> Parser<'a, '_> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn or(&mut self) -> Result<i64, String> {
        let mut value = self.and()?;
        while self.peek() == Some(Token::Or) {
            self.pos += 1;
            let rhs = self.and()?;
            value = i64::from(value != 0 || rhs != 0);
        }
        Ok(value)
    }

    fn and(&mut self) -> Result<i64, String> {
        let mut value = self.compare()?;
        while self.peek() == Some(Token::And) {
            self.pos += 1;
            let rhs = self.compare()?;
            value = i64::from(value != 0 && rhs != 0);
        }
        Ok(value)
    }

    fn compare(&mut self) -> Result<i64, String> {
        let lhs = self.unary()?;
        let Some(Token::Cmp(op)) = self.peek() else {
            return Ok(lhs);
        };
        self.pos += 1;
        let rhs = self.unary()?;
        let result = match op {
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
        };
        Ok(i64::from(result))
    }

    fn unary(&mut self) -> Result<i64, String> {
        if self.peek() == Some(Token::Not) {
            self.pos += 1;
            return Ok(i64::from(self.unary()? == 0));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<i64, String> {
        let token = self.peek().ok_or_else(|| "unexpected end of expression".to_string())?;
        self.pos += 1;
        match token {
            Token::Number(n) => Ok(n),
            Token::Ident(name) => Ok(i64::from(self.props.get(name))),
            Token::LParen => {
                let value = self.or()?;
                if self.peek() != Some(Token::RParen) {
                    return Err("expected ')'".to_string());
                }
                self.pos += 1;
                Ok(value)
            }
            other => Err(format!("unexpected token {other:?}")),
        }
    }
}

/// Evaluates a `@property` condition against `props`.
pub(super) fn evaluate(src: &str, props: &PropertySet) -> Result<bool, String> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err("empty expression".to_string());
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        props,
    };
    let value = parser.or()?;
    if parser.pos != parser.tokens.len() {
        return Err("trailing tokens after expression".to_string());
    }
    Ok(value != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props() -> PropertySet {
        [("a", 1), ("b", 0), ("count", 4)].into_iter().collect()
    }

    #[test]
    fn identifiers_and_logic() {
        let p = props();
        assert!(evaluate("a", &p).unwrap());
        assert!(!evaluate("b", &p).unwrap());
        assert!(!evaluate("never_defined_property", &p).unwrap());
        assert!(evaluate("a && !b", &p).unwrap());
        assert!(evaluate("b || a", &p).unwrap());
        assert!(!evaluate("!(a || b)", &p).unwrap());
    }

    #[test]
    fn comparisons() {
        let p = props();
        assert!(evaluate("count == 4", &p).unwrap());
        assert!(evaluate("count >= 4 && count < 5", &p).unwrap());
        assert!(evaluate("count != 3", &p).unwrap());
        assert!(evaluate("b > -1", &p).unwrap());
    }

    #[test]
    fn malformed_expressions() {
        let p = props();
        assert!(evaluate("", &p).is_err());
        assert!(evaluate("(a && b", &p).is_err());
        assert!(evaluate("a b", &p).is_err());
        assert!(evaluate("a $ b", &p).is_err());
    }
}
