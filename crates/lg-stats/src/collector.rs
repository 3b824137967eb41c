//! The incremental statistics collector.
//!
//! The template engine and section processor feed the collector as they
//! work: every processed file, every rendered section (including repeated
//! uses), and finally the whole document. Token counts go through the
//! cached [`TokenService`].

use std::collections::BTreeMap;

use serde_json::Value;

use lg_adapter::{Meta, ProcessedFile};

use crate::counter::TokenService;

/// Per-file statistics, keyed by `rel_path`.
#[derive(Debug, Clone)]
pub(crate) struct FileStats {
    /// File size in bytes.
    pub size_bytes: u64,
    /// Tokens of the raw text.
    pub tokens_raw: u32,
    /// Tokens of the processed text.
    pub tokens_processed: u32,
    /// Adapter meta of the file.
    pub meta: Meta,
}

/// Per-section statistics, keyed by canonical key.
#[derive(Debug, Clone)]
pub(crate) struct SectionStats {
    /// Tokens of the rendered section text.
    pub tokens_rendered: u32,
    /// Aggregated numeric meta of the section's files.
    pub meta_summary: BTreeMap<String, i64>,
}

/// Collects statistics incrementally during a render.
pub struct StatsCollector {
    /// Target label (`ctx:name` / `sec:name`).
    target: Option<String>,
    /// File statistics by `rel_path`.
    pub(crate) files: BTreeMap<String, FileStats>,
    /// Section statistics by canonical key.
    pub(crate) sections: BTreeMap<String, SectionStats>,
    /// How often each section was used.
    pub(crate) usage: BTreeMap<String, u32>,
    /// The final rendered document.
    final_text: Option<String>,
}

impl StatsCollector {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self {
            target: None,
            files: BTreeMap::new(),
            sections: BTreeMap::new(),
            usage: BTreeMap::new(),
            final_text: None,
        }
    }

    /// Sets the target label for the report.
    pub fn set_target(&mut self, target: &str) {
        self.target = Some(target.to_string());
    }

    /// The target label, if set.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Registers one processed file. Repeated registrations of the same
    /// path (the same file in several sections) count once.
    pub fn register_processed_file(&mut self, file: &ProcessedFile, service: &TokenService) {
        if self.files.contains_key(&file.rel_path) {
            return;
        }
        let tokens_raw = service.count_cached(&file.raw_text);
        let tokens_processed = service.count_cached(&file.processed_text);
        self.files.insert(
            file.rel_path.clone(),
            FileStats {
                size_bytes: file
                    .abs_path
                    .metadata()
                    .map(|m| m.len())
                    .unwrap_or(file.raw_text.len() as u64),
                tokens_raw,
                tokens_processed,
                meta: file.meta.clone(),
            },
        );
    }

    /// Registers one rendered section (every use counts toward usage).
    pub fn register_section_rendered(
        &mut self,
        canon_key: &str,
        text: &str,
        files: &[ProcessedFile],
        service: &TokenService,
    ) {
        *self.usage.entry(canon_key.to_string()).or_insert(0) += 1;

        let tokens_rendered = service.count_cached(text);
        let mut meta_summary = BTreeMap::new();
        for file in files {
            for (key, value) in numeric_meta(&file.meta) {
                *meta_summary.entry(key).or_insert(0) += value;
            }
        }
        self.sections.insert(
            canon_key.to_string(),
            SectionStats {
                tokens_rendered,
                meta_summary,
            },
        );
    }

    /// Registers the final rendered document.
    pub fn set_final_text(&mut self, text: &str) {
        self.final_text = Some(text.to_string());
    }

    /// The final rendered document, once registered.
    pub fn final_text(&self) -> Option<&str> {
        self.final_text.as_deref()
    }

    /// Sum of the sections-only token counts.
    pub(crate) fn sections_only_tokens(&self) -> u32 {
        self.sections.values().map(|s| s.tokens_rendered).sum()
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Projects the numeric entries of a meta map (bools count as 0/1).
pub(crate) fn numeric_meta(meta: &Meta) -> Vec<(String, i64)> {
    meta.iter()
        .filter_map(|(key, value)| match value {
            Value::Bool(b) => Some((key.clone(), i64::from(*b))),
            Value::Number(num) => num
                .as_i64()
                .or_else(|| num.as_f64().map(|f| f as i64))
                .map(|n| (key.clone(), n)),
            _ => None,
        })
        .collect()
}
