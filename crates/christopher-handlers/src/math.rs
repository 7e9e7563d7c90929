//! Arithmetic handler.
//!
//! Evaluates a single arithmetic expression without ever executing input as
//! code.  The grammar, lowest precedence first:
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/') unary)*
//! unary  := '-' unary | power
//! power  := atom ('**' unary)?
//! atom   := number | '(' expr ')'
//! ```
//!
//! `**` is right-associative and binds tighter than a leading minus on its
//! left (`-2 ** 2 == -4`).  Every result is a float.  Evaluation problems
//! are part of the reply text, not a handler failure.

use std::iter::Peekable;
use std::str::CharIndices;

use async_trait::async_trait;
use christopher_kernel::{Handler, HandlerContext, HandlerError, HandlerOutput};

pub const MATH_ID: &str = "math";

pub const MATH_DESCRIPTION: &str =
    "A math agent that can perform calculations and solve mathematical expressions";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why an expression could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MathError {
    #[error("invalid syntax: {0}")]
    Syntax(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    #[error("Unsupported node type: {0}")]
    UnsupportedNode(&'static str),

    #[error("Complex numbers are not supported")]
    Complex,

    #[error("division by zero")]
    DivisionByZero,

    #[error("numerical result out of range")]
    Overflow,
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Num(f64),
    Plus,
    Minus,
    Star,
    Slash,
    Pow,
    LParen,
    RParen,
}

fn tokenize(src: &str) -> Result<Vec<Token>, MathError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '0'..='9' | '.' => tokens.push(Token::Num(number(src, start, &mut chars)?)),
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                if chars.next_if(|&(_, c)| c == '*').is_some() {
                    tokens.push(Token::Pow);
                } else {
                    tokens.push(Token::Star);
                }
            }
            '/' => {
                chars.next();
                if chars.next_if(|&(_, c)| c == '/').is_some() {
                    return Err(MathError::UnsupportedOperation("FloorDiv"));
                }
                tokens.push(Token::Slash);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '%' => return Err(MathError::UnsupportedOperation("Mod")),
            '~' => return Err(MathError::UnsupportedOperation("Invert")),
            c if c.is_alphabetic() || c == '_' => return Err(MathError::UnsupportedNode("Name")),
            other => return Err(MathError::Syntax(format!("unexpected character `{other}`"))),
        }
    }
    Ok(tokens)
}

/// Lex a numeric literal starting at byte offset `start`.
fn number(
    src: &str,
    start: usize,
    chars: &mut Peekable<CharIndices<'_>>,
) -> Result<f64, MathError> {
    let mut end = start;
    let mut prev = '\0';
    while let Some(&(i, c)) = chars.peek() {
        let exponent_sign = (c == '+' || c == '-') && matches!(prev, 'e' | 'E');
        if c.is_ascii_digit() || c == '.' || c == '_' || c == 'e' || c == 'E' || exponent_sign {
            end = i + c.len_utf8();
            prev = c;
            chars.next();
        } else {
            break;
        }
    }

    if chars.next_if(|&(_, c)| c == 'j' || c == 'J').is_some() {
        return Err(MathError::Complex);
    }

    let literal = src[start..end].replace('_', "");
    literal
        .parse::<f64>()
        .map_err(|_| MathError::Syntax(format!("invalid number `{}`", &src[start..end])))
}

// ---------------------------------------------------------------------------
// Parser / evaluator
// ---------------------------------------------------------------------------

/// Deepest nesting of parentheses, unary minuses and exponents accepted.
const MAX_DEPTH: usize = 256;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    /// Run `f` one nesting level deeper, failing past [`MAX_DEPTH`].
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, MathError>,
    ) -> Result<T, MathError> {
        if self.depth >= MAX_DEPTH {
            return Err(MathError::Syntax("expression is nested too deeply".into()));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expr(&mut self) -> Result<f64, MathError> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.bump();
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.bump();
                    value -= self.term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn term(&mut self) -> Result<f64, MathError> {
        let mut value = self.unary()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.bump();
                    value *= self.unary()?;
                }
                Some(Token::Slash) => {
                    self.bump();
                    let divisor = self.unary()?;
                    if divisor == 0.0 {
                        return Err(MathError::DivisionByZero);
                    }
                    value /= divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    fn unary(&mut self) -> Result<f64, MathError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.bump();
                Ok(-self.nested(Self::unary)?)
            }
            Some(Token::Plus) => Err(MathError::UnsupportedOperation("UAdd")),
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<f64, MathError> {
        let base = self.atom()?;
        if self.peek() == Some(Token::Pow) {
            self.bump();
            let exponent = self.nested(Self::unary)?;
            if base == 0.0 && exponent < 0.0 {
                return Err(MathError::DivisionByZero);
            }
            let value = base.powf(exponent);
            if value.is_nan() && !base.is_nan() && !exponent.is_nan() {
                return Err(MathError::Complex);
            }
            return Ok(value);
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<f64, MathError> {
        match self.bump() {
            Some(Token::Num(n)) => Ok(n),
            Some(Token::LParen) => {
                let value = self.nested(Self::expr)?;
                match self.bump() {
                    Some(Token::RParen) => Ok(value),
                    _ => Err(MathError::Syntax("unclosed parenthesis".into())),
                }
            }
            Some(other) => Err(MathError::Syntax(format!("unexpected token {other:?}"))),
            None => Err(MathError::Syntax("unexpected end of expression".into())),
        }
    }
}

/// Evaluate `expression` to a float.
pub fn evaluate(expression: &str) -> Result<f64, MathError> {
    let tokens = tokenize(expression)?;
    if tokens.is_empty() {
        return Err(MathError::Syntax("empty expression".into()));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(MathError::Syntax("unexpected trailing input".into()));
    }
    if !value.is_finite() {
        return Err(MathError::Overflow);
    }
    Ok(value)
}

/// Evaluate and render as the handler reply, e.g. `Result: 4.0`.
pub fn render(expression: &str) -> String {
    match evaluate(expression) {
        // `{:?}` keeps the fractional part on whole numbers (4.0, not 4).
        Ok(value) => format!("Result: {value:?}"),
        Err(e) => format!("Error evaluating expression: {e}"),
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Safe arithmetic evaluation.
#[derive(Debug, Default, Clone, Copy)]
pub struct MathHandler;

#[async_trait]
impl Handler for MathHandler {
    fn id(&self) -> &str {
        MATH_ID
    }

    fn description(&self) -> &str {
        MATH_DESCRIPTION
    }

    async fn run(
        &self,
        input: &str,
        _context: &HandlerContext,
    ) -> Result<HandlerOutput, HandlerError> {
        let reply = render(input.trim());
        tracing::debug!(expression = %input, reply = %reply, "math evaluated");
        Ok(HandlerOutput::Text(reply))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_operations() {
        for (expression, expected) in [
            ("2 + 2", "Result: 4.0"),
            ("10 - 5", "Result: 5.0"),
            ("3 * 4", "Result: 12.0"),
            ("15 / 3", "Result: 5.0"),
            ("2 ** 3", "Result: 8.0"),
            ("-5", "Result: -5.0"),
        ] {
            assert_eq!(render(expression), expected, "{expression}");
        }
    }

    #[test]
    fn precedence_and_grouping() {
        assert_eq!(render("2 + 3 * 4"), "Result: 14.0");
        assert_eq!(render("(2 + 3) * 4"), "Result: 20.0");
        assert_eq!(render("10 - 5 * 2 + 3"), "Result: 3.0");
        assert_eq!(render("-2 ** 2"), "Result: -4.0");
        assert_eq!(render("2 ** 3 ** 2"), "Result: 512.0");
        assert_eq!(render("2 ** -1"), "Result: 0.5");
        assert_eq!(render("--3"), "Result: 3.0");
    }

    #[test]
    fn literals() {
        assert_eq!(render("1.5 * 2"), "Result: 3.0");
        assert_eq!(render(".5 + .5"), "Result: 1.0");
        assert_eq!(render("1e3"), "Result: 1000.0");
        assert_eq!(render("2.5e-1"), "Result: 0.25");
        assert_eq!(render("1_000 + 1"), "Result: 1001.0");
    }

    #[test]
    fn unsupported_constructs() {
        assert_eq!(
            render("abc"),
            "Error evaluating expression: Unsupported node type: Name"
        );
        assert_eq!(
            render("1j"),
            "Error evaluating expression: Complex numbers are not supported"
        );
        assert_eq!(
            render("2 % 3"),
            "Error evaluating expression: Unsupported operation: Mod"
        );
        assert_eq!(
            render("2 // 3"),
            "Error evaluating expression: Unsupported operation: FloorDiv"
        );
        assert_eq!(
            render("~2"),
            "Error evaluating expression: Unsupported operation: Invert"
        );
    }

    #[test]
    fn syntax_errors() {
        for expression in ["2 +", "(1 + 2", "1 2", "", "1..2", ")"] {
            assert!(
                matches!(evaluate(expression), Err(MathError::Syntax(_))),
                "{expression:?}"
            );
            assert!(render(expression).starts_with("Error evaluating expression: invalid syntax"));
        }
    }

    #[test]
    fn arithmetic_faults() {
        assert_eq!(evaluate("1 / 0"), Err(MathError::DivisionByZero));
        assert_eq!(evaluate("0 ** -1"), Err(MathError::DivisionByZero));
        assert_eq!(evaluate("(-8) ** 0.5"), Err(MathError::Complex));
    }

    #[test]
    fn overflow_is_an_error() {
        assert_eq!(evaluate("10 ** 400"), Err(MathError::Overflow));
        assert_eq!(evaluate("1e308 * 10 - 1e308 * 10"), Err(MathError::Overflow));
        assert_eq!(
            render("10 ** 400"),
            "Error evaluating expression: numerical result out of range"
        );
        assert_eq!(render("10 ** 300"), "Result: 1e300");
    }

    #[test]
    fn deep_nesting_is_rejected_not_overflowed() {
        let minuses = format!("{}1", "-".repeat(100_000));
        let parens = "(".repeat(100_000);
        let powers = format!("2{}", " ** 1".repeat(100_000));
        for expression in [&minuses, &parens, &powers] {
            assert!(render(expression).starts_with("Error evaluating expression"));
            assert_eq!(
                evaluate(expression),
                Err(MathError::Syntax("expression is nested too deeply".into()))
            );
        }

        let shallow = format!("{}1{}", "(".repeat(200), ")".repeat(200));
        assert_eq!(render(&shallow), "Result: 1.0");
        assert_eq!(render(&format!("{}1", "-".repeat(200))), "Result: 1.0");
    }

    #[tokio::test]
    async fn handler_replies_with_text() {
        let output = MathHandler
            .run(" 2+2 \n", &HandlerContext::new())
            .await
            .unwrap();
        assert_eq!(output.into_text(), "Result: 4.0");

        let output = MathHandler
            .run("what is love", &HandlerContext::new())
            .await
            .unwrap();
        assert!(output.into_text().starts_with("Error evaluating expression"));
    }
}
