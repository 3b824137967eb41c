//! Provider id normalisation.

/// The universal provider: compatible with every integration mode-set and
/// never filtered.
pub const CLIPBOARD_PROVIDER: &str = "clipboard";

/// Technical suffixes stripped when normalising a full provider id to its
/// base id.
const TECHNICAL_SUFFIXES: &[&str] = &[".cli", ".ext", ".api", ".app"];

/// Strips one known technical suffix from a full provider id.
///
/// `com.anthropic.claude.cli` → `com.anthropic.claude`; ids without a known
/// suffix (including `clipboard`) pass through unchanged.
pub fn normalize_provider_id(full_id: &str) -> &str {
    for suffix in TECHNICAL_SUFFIXES {
        if let Some(base) = full_id.strip_suffix(suffix) {
            if !base.is_empty() {
                return base;
            }
        }
    }
    full_id
}
