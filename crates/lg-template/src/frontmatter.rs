//! YAML frontmatter for context files.
//!
//! A context may open with a `---` delimited YAML block whose `include:`
//! list seeds adaptive-model collection. The frontmatter never reaches the
//! rendered output.

use serde::Deserialize;

/// Parsed context frontmatter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Frontmatter {
    /// Section references whose adaptive data the context pulls in.
    #[serde(default)]
    pub include: Vec<String>,
}

/// Splits frontmatter off a context file.
///
/// Returns the parsed block (if present and valid) and the remaining body.
/// A malformed block is treated as ordinary content.
pub fn parse_frontmatter(content: &str) -> (Option<Frontmatter>, &str) {
    let content = content.trim_start_matches('\u{feff}');
    if !content.starts_with("---") {
        return (None, content);
    }

    let after_opening = &content[3..];
    let after_opening = after_opening
        .strip_prefix('\n')
        .or_else(|| after_opening.strip_prefix("\r\n"))
        .unwrap_or(after_opening);

    let Some(closing) = find_closing_delimiter(after_opening) else {
        return (None, content);
    };

    let yaml = &after_opening[..closing];
    let mut remaining = &after_opening[closing..];
    remaining = remaining.strip_prefix("---").unwrap_or(remaining);
    for _ in 0..2 {
        remaining = remaining
            .strip_prefix("\r\n")
            .or_else(|| remaining.strip_prefix('\n'))
            .unwrap_or(remaining);
    }

    match serde_yaml::from_str::<Frontmatter>(yaml) {
        Ok(frontmatter) => (Some(frontmatter), remaining),
        Err(_) => (None, content),
    }
}

/// Byte offset of the closing `---` line.
fn find_closing_delimiter(content: &str) -> Option<usize> {
    let mut pos = 0;
    for line in content.lines() {
        if line == "---" {
            return Some(pos);
        }
        pos += line.len() + 1;
    }
    None
}
