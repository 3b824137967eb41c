//! Condition mini-language for lg.
//!
//! Conditional filters, conditional adapter options, and template `{% if %}`
//! blocks all share one small boolean language over tags, tag-sets, scopes,
//! and providers:
//!
//! ```text
//! tag:tests AND NOT (scope:parent OR TAGSET:language:python)
//! ```
//!
//! This crate provides the AST, lexer, recursive-descent parser, and the
//! evaluator against a [`ConditionContext`].

#![warn(missing_docs)]

mod ast;
mod context;
mod error;
mod eval;
mod lexer;
mod parser;

pub use ast::{Atom, Condition, ScopeKind};
pub use context::ConditionContext;
pub use error::ConditionParseError;
pub use eval::evaluate;
pub use parser::parse;

/// Parses and evaluates a condition string in one step.
///
/// Convenience used by conditional filters and adapter options, which store
/// conditions as raw strings.
pub fn evaluate_text(
    text: &str,
    ctx: &ConditionContext,
) -> Result<bool, ConditionParseError> {
    let cond = parse(text)?;
    Ok(evaluate(&cond, ctx))
}
