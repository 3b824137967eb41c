//! Token accounting for lg.
//!
//! The tokenizer itself is an external collaborator behind the
//! [`TokenCounter`] trait (`count(text) -> u32`); this crate wraps it with
//! the two-tier cache, collects per-file / per-section / per-document
//! statistics incrementally during rendering, and shapes the final report.

#![warn(missing_docs)]

mod collector;
mod counter;
mod report;

pub use collector::StatsCollector;
pub use counter::{HeuristicCounter, ModelInfo, TokenCounter, TokenService};
pub use report::{ContextReport, FileReport, Report, Scope, TotalReport, build_report};
