//! Adapter traits and shared types.

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;

use lg_cond::ConditionContext;
use lg_config::Options;

/// Adapter meta: numeric counters plus string diagnostics. Numeric entries
/// aggregate into the report's `metaSummary`.
pub type Meta = BTreeMap<String, Value>;

/// Everything an adapter may look at while processing one file.
pub struct AdapterContext<'a> {
    /// The file on disk.
    pub path: &'a Path,
    /// Raw file text.
    pub raw_text: &'a str,
    /// Lowercase extension without the dot ("py", "md", …).
    pub extension: &'a str,
    /// Number of files in the file's render group.
    pub group_size: usize,
    /// Whether the group mixes languages.
    pub mixed: bool,
    /// Condition context of the active run state (markdown templating).
    pub conditions: &'a ConditionContext,
}

/// A registered adapter: knows its name and how to bind options.
pub trait Adapter {
    /// Registry name (also the section YAML key for its options).
    fn name(&self) -> &'static str;

    /// Extensions this adapter claims (lowercase, with dot).
    fn extensions(&self) -> &'static [&'static str];

    /// Binds a raw option map into a ready-to-run instance.
    ///
    /// Unknown options are ignored; the pipeline memoises the result per
    /// frozen option map.
    fn bind(&self, options: &Options) -> Box<dyn BoundAdapter>;
}

/// An adapter bound to concrete options.
pub trait BoundAdapter {
    /// Whether the file should be dropped entirely (logged, not an error).
    fn should_skip(&self, ctx: &AdapterContext<'_>) -> bool {
        let _ = ctx;
        false
    }

    /// Produces the processed text and meta for one file.
    fn process(&self, ctx: &AdapterContext<'_>) -> (String, Meta);
}
