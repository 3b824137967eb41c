//! Condition lexer (tokenizer).
//!
//! Converts a condition string into a stream of tokens. Keywords are
//! case-sensitive (`AND`, `OR`, `NOT`, `tag`, `TAGSET`, `scope`,
//! `provider`); whitespace is insignificant.

use crate::ast::{Atom, ScopeKind};
use crate::error::ConditionParseError;

/// A token in the condition language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    /// A complete atom (`tag:x`, `TAGSET:s:t`, `scope:local`, `provider:p`).
    Atom(Atom),
    /// The `AND` keyword.
    And,
    /// The `OR` keyword.
    Or,
    /// The `NOT` keyword.
    Not,
    /// Left parenthesis.
    LParen,
    /// Right parenthesis.
    RParen,
}

/// True for characters allowed in identifiers: `[A-Za-z0-9_.\-/]`.
fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '.' | '-' | '/')
}

/// Tokenizes a condition string.
pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, ConditionParseError> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        let ch = bytes[pos] as char;

        if ch.is_whitespace() {
            pos += 1;
            continue;
        }
        if ch == '(' {
            tokens.push(Token::LParen);
            pos += 1;
            continue;
        }
        if ch == ')' {
            tokens.push(Token::RParen);
            pos += 1;
            continue;
        }

        if !is_ident_char(ch) && ch != ':' {
            return Err(ConditionParseError::new(
                format!("unexpected character '{ch}'"),
                pos,
                input,
            ));
        }

        // Read a word up to whitespace/parens; atoms embed their colons.
        let start = pos;
        while pos < bytes.len() {
            let c = bytes[pos] as char;
            if is_ident_char(c) || c == ':' {
                pos += 1;
            } else {
                break;
            }
        }
        let word = &input[start..pos];

        let token = match word {
            "AND" => Token::And,
            "OR" => Token::Or,
            "NOT" => Token::Not,
            _ => Token::Atom(parse_atom(word, start, input)?),
        };
        tokens.push(token);
    }

    Ok(tokens)
}

/// Parses a colon-separated word into an atom.
fn parse_atom(word: &str, position: usize, input: &str) -> Result<Atom, ConditionParseError> {
    let err = |message: String| ConditionParseError::new(message, position, input);

    let Some((head, rest)) = word.split_once(':') else {
        return Err(err(format!("expected `kind:value`, got `{word}`")));
    };

    match head {
        "tag" => {
            if rest.is_empty() || !rest.chars().all(is_ident_char) {
                return Err(err(format!("invalid tag identifier `{rest}`")));
            }
            Ok(Atom::Tag(rest.to_string()))
        }
        "TAGSET" => {
            let Some((set, tag)) = rest.split_once(':') else {
                return Err(err(format!("expected `TAGSET:set:tag`, got `{word}`")));
            };
            if set.is_empty() || tag.is_empty() {
                return Err(err(format!("empty identifier in `{word}`")));
            }
            if !set.chars().all(is_ident_char) || !tag.chars().all(is_ident_char) {
                return Err(err(format!("invalid identifier in `{word}`")));
            }
            Ok(Atom::TagSet {
                set: set.to_string(),
                tag: tag.to_string(),
            })
        }
        "scope" => match rest {
            "local" => Ok(Atom::Scope(ScopeKind::Local)),
            "parent" => Ok(Atom::Scope(ScopeKind::Parent)),
            other => Err(err(format!("unknown scope `{other}` (expected local or parent)"))),
        },
        "provider" => {
            if rest.is_empty() || !rest.chars().all(is_ident_char) {
                return Err(err(format!("invalid provider identifier `{rest}`")));
            }
            Ok(Atom::Provider(rest.to_string()))
        }
        other => Err(err(format!("unknown atom kind `{other}`"))),
    }
}
