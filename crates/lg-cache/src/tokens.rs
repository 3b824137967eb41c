//! L1 token cache keying.

use lg_path::sha1_hex;

/// Texts at or above this length (in characters) are keyed by their SHA-1
/// instead of the text itself, bounding L1 memory per entry.
pub const SMALL_TEXT_THRESHOLD: usize = 200;

/// L1 key for a text: the text itself when short, its hash when long.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum TextKey {
    /// Short text stored inline.
    Inline(String),
    /// SHA-1 of a long text.
    Hash(String),
}

impl TextKey {
    pub(crate) fn of(text: &str) -> Self {
        if text.chars().count() < SMALL_TEXT_THRESHOLD {
            Self::Inline(text.to_string())
        } else {
            Self::Hash(sha1_hex(text))
        }
    }
}
