//! Error type for condition parsing.

use thiserror::Error;

/// Invalid condition syntax.
///
/// Carries the byte offset of the offending token and the original input so
/// messages can point at the problem.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid condition at offset {position}: {message} (in `{input}`)")]
pub struct ConditionParseError {
    /// What went wrong.
    pub message: String,
    /// Byte offset in the input where the error was detected.
    pub position: usize,
    /// The full condition string.
    pub input: String,
}

impl ConditionParseError {
    /// Creates a parse error at a position in the input.
    pub fn new(message: impl Into<String>, position: usize, input: &str) -> Self {
        Self {
            message: message.into(),
            position,
            input: input.to_string(),
        }
    }
}
