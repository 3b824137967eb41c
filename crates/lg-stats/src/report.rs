//! The token-accounting report.

use std::collections::BTreeMap;

use serde::Serialize;

use lg_adapter::Meta;

use crate::collector::{StatsCollector, numeric_meta};
use crate::counter::TokenService;

/// Report protocol version.
const PROTOCOL_VERSION: u32 = 4;

/// What kind of target was rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// A context template.
    Context,
    /// A single section.
    Section,
}

/// Document-level totals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalReport {
    /// Total size of the selected files in bytes.
    pub size_bytes: u64,
    /// Tokens after adapter processing.
    pub tokens_processed: u32,
    /// Tokens of the raw files.
    pub tokens_raw: u32,
    /// Tokens saved by processing.
    pub saved_tokens: u32,
    /// Percentage saved.
    pub saved_pct: f64,
    /// Processed tokens as a share of the context window.
    pub ctx_share: f64,
    /// Tokens of the rendered sections (markers and fences included).
    pub rendered_tokens: u32,
    /// Rendering overhead over the processed text.
    pub rendered_overhead_tokens: u32,
    /// Aggregated numeric adapter meta.
    pub meta_summary: BTreeMap<String, i64>,
}

/// Per-file row.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    /// Repository-relative path.
    pub path: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Tokens of the raw text.
    pub tokens_raw: u32,
    /// Tokens of the processed text.
    pub tokens_processed: u32,
    /// Tokens saved by processing.
    pub saved_tokens: u32,
    /// Percentage saved.
    pub saved_pct: f64,
    /// Share of the whole prompt's processed tokens.
    pub prompt_share: f64,
    /// Share of the context window.
    pub ctx_share: f64,
    /// Adapter meta of the file.
    pub meta: Meta,
}

/// Context-level block, present when a context was rendered.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextReport {
    /// The context template's name.
    pub template_name: String,
    /// Canonical section key → number of uses.
    pub sections_used: BTreeMap<String, u32>,
    /// Tokens of the final document.
    pub final_rendered_tokens: u32,
    /// Tokens contributed by the template glue.
    pub template_only_tokens: u32,
    /// Glue share of the final document.
    pub template_overhead_pct: f64,
    /// Final document as a share of the context window.
    pub final_ctx_share: f64,
}

/// The complete run report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Report protocol version.
    pub protocol: u32,
    /// Target kind.
    pub scope: Scope,
    /// Normalised target (`ctx:name` / `sec:name`).
    pub target: String,
    /// Model label.
    pub model: String,
    /// Encoder identifier.
    pub encoder: String,
    /// Context window in tokens.
    pub ctx_limit: u32,
    /// Document totals.
    pub total: TotalReport,
    /// Per-file rows, sorted by path.
    pub files: Vec<FileReport>,
    /// Context block (contexts only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextReport>,
}

fn pct(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (1.0 - f64::from(part) / f64::from(whole)) * 100.0
    }
}

fn share(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        f64::from(part) / f64::from(whole) * 100.0
    }
}

/// Builds the report from a filled collector.
///
/// The collector must have its final text registered; the template name is
/// the bare target without its `ctx:`/`sec:` prefix.
pub fn build_report(
    collector: &StatsCollector,
    service: &TokenService,
    scope: Scope,
    template_name: &str,
) -> Report {
    let model = service.model();
    let final_tokens = collector
        .final_text()
        .map(|text| service.count_cached(text))
        .unwrap_or(0);
    let sections_only = collector.sections_only_tokens();

    let total_raw: u32 = collector.files.values().map(|f| f.tokens_raw).sum();
    let total_processed: u32 = collector.files.values().map(|f| f.tokens_processed).sum();
    let total_size: u64 = collector.files.values().map(|f| f.size_bytes).sum();

    let mut meta_summary: BTreeMap<String, i64> = BTreeMap::new();
    for stats in collector.files.values() {
        for (key, value) in numeric_meta(&stats.meta) {
            *meta_summary.entry(key).or_insert(0) += value;
        }
    }

    let files = collector
        .files
        .iter()
        .map(|(path, stats)| FileReport {
            path: path.clone(),
            size_bytes: stats.size_bytes,
            tokens_raw: stats.tokens_raw,
            tokens_processed: stats.tokens_processed,
            saved_tokens: stats.tokens_raw.saturating_sub(stats.tokens_processed),
            saved_pct: pct(stats.tokens_processed, stats.tokens_raw),
            prompt_share: share(stats.tokens_processed, total_processed),
            ctx_share: share(stats.tokens_processed, model.ctx_limit),
            meta: stats.meta.clone(),
        })
        .collect();

    let total = TotalReport {
        size_bytes: total_size,
        tokens_processed: total_processed,
        tokens_raw: total_raw,
        saved_tokens: total_raw.saturating_sub(total_processed),
        saved_pct: pct(total_processed, total_raw),
        ctx_share: share(total_processed, model.ctx_limit),
        rendered_tokens: sections_only,
        rendered_overhead_tokens: sections_only.saturating_sub(total_processed),
        meta_summary,
    };

    let context = match scope {
        Scope::Section => None,
        Scope::Context => {
            let template_only = final_tokens.saturating_sub(sections_only);
            Some(ContextReport {
                template_name: template_name.to_string(),
                sections_used: collector.usage.clone(),
                final_rendered_tokens: final_tokens,
                template_only_tokens: template_only,
                template_overhead_pct: share(template_only, final_tokens),
                final_ctx_share: share(final_tokens, model.ctx_limit),
            })
        }
    };

    let prefix = match scope {
        Scope::Context => "ctx",
        Scope::Section => "sec",
    };

    Report {
        protocol: PROTOCOL_VERSION,
        scope,
        target: format!("{prefix}:{template_name}"),
        model: model.name.clone(),
        encoder: model.encoder.clone(),
        ctx_limit: model.ctx_limit,
        total,
        files,
        context,
    }
}
