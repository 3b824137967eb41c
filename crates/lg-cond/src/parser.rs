//! Condition parser.
//!
//! Parses a token stream into a [`Condition`] using recursive descent.
//!
//! # Grammar
//!
//! ```text
//! cond    → or
//! or      → and ("OR" and)*
//! and     → not ("AND" not)*
//! not     → "NOT" not | primary
//! primary → "(" cond ")" | atom
//! ```

use crate::ast::Condition;
use crate::error::ConditionParseError;
use crate::lexer::{Token, tokenize};

/// Recursive descent parser over the token stream.
struct Parser<'a> {
    /// Original input, for error messages.
    input: &'a str,
    /// Token stream to parse.
    tokens: Vec<Token>,
    /// Current position in the token stream.
    position: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            input,
            tokens,
            position: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> ConditionParseError {
        ConditionParseError::new(message, self.position, self.input)
    }

    fn parse(mut self) -> Result<Condition, ConditionParseError> {
        if self.tokens.is_empty() {
            return Err(self.error("empty condition"));
        }
        let cond = self.parse_or()?;
        if self.position < self.tokens.len() {
            return Err(self.error(format!(
                "unexpected token {:?}",
                self.tokens[self.position]
            )));
        }
        Ok(cond)
    }

    /// or → and ("OR" and)*
    fn parse_or(&mut self) -> Result<Condition, ConditionParseError> {
        let mut operands = vec![self.parse_and()?];
        while self.check(&Token::Or) {
            self.advance();
            operands.push(self.parse_and()?);
        }
        Ok(Condition::or(operands))
    }

    /// and → not ("AND" not)*
    fn parse_and(&mut self) -> Result<Condition, ConditionParseError> {
        let mut operands = vec![self.parse_not()?];
        while self.check(&Token::And) {
            self.advance();
            operands.push(self.parse_not()?);
        }
        Ok(Condition::and(operands))
    }

    /// not → "NOT" not | primary
    fn parse_not(&mut self) -> Result<Condition, ConditionParseError> {
        if self.check(&Token::Not) {
            self.advance();
            let inner = self.parse_not()?;
            return Ok(Condition::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    /// primary → "(" cond ")" | atom
    fn parse_primary(&mut self) -> Result<Condition, ConditionParseError> {
        match self.peek().cloned() {
            Some(Token::Atom(atom)) => {
                self.advance();
                Ok(Condition::Atom(atom))
            }
            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_or()?;
                if !self.check(&Token::RParen) {
                    return Err(self.error("expected closing parenthesis"));
                }
                self.advance();
                Ok(inner)
            }
            Some(Token::RParen) => Err(self.error("unexpected closing parenthesis")),
            Some(Token::And) | Some(Token::Or) => {
                Err(self.error("operator needs an expression before it"))
            }
            Some(Token::Not) => Err(self.error("unexpected NOT")),
            None => Err(self.error("unexpected end of condition")),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }
}

/// Parses a condition string into an AST.
pub fn parse(input: &str) -> Result<Condition, ConditionParseError> {
    let tokens = tokenize(input)?;
    Parser::new(input, tokens).parse()
}
