//! File-name → fence-language mapping.

use std::path::Path;

/// Special file names with no (or misleading) extension.
const BY_NAME: &[(&str, &str)] = &[
    ("pyproject.toml", "toml"),
    ("pom.xml", "xml"),
    ("build.gradle", "groovy"),
    ("build.gradle.kts", "kotlin"),
    ("package.json", "json"),
    ("tsconfig.json", "json"),
    ("Dockerfile", "dockerfile"),
    ("Makefile", "make"),
    ("README", ""),
];

/// Extension → fence language. Markdown and plain text map to the empty
/// string, which is what the doc-only rules key on.
const BY_EXTENSION: &[(&str, &str)] = &[
    (".py", "python"),
    (".java", "java"),
    (".js", "javascript"),
    (".jsx", "javascript"),
    (".ts", "typescript"),
    (".tsx", "typescript"),
    (".sh", "bash"),
    (".bash", "bash"),
    (".zsh", "bash"),
    (".md", ""),
    (".markdown", ""),
    (".txt", ""),
    (".json", "json"),
    (".yml", "yaml"),
    (".yaml", "yaml"),
    (".ini", ""),
    (".cfg", ""),
    (".toml", "toml"),
    (".xml", "xml"),
    (".html", "html"),
    (".css", "css"),
    (".scss", "scss"),
    (".go", "go"),
    (".rs", "rust"),
    (".cpp", "cpp"),
    (".c", "c"),
    (".h", "c"),
    (".sql", "sql"),
];

/// Returns the fence language for a file, by exact name first, then by
/// extension. Unknown files get the empty string (no language tag).
pub fn language_for_file(path: &Path) -> &'static str {
    let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
    for (known, lang) in BY_NAME {
        if name.as_ref() == *known {
            return lang;
        }
    }
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
        .unwrap_or_default();
    for (known, lang) in BY_EXTENSION {
        if ext == *known {
            return lang;
        }
    }
    ""
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_extension() {
        assert_eq!(language_for_file(Path::new("a/b/main.py")), "python");
        assert_eq!(language_for_file(Path::new("lib.rs")), "rust");
        assert_eq!(language_for_file(Path::new("X.PY")), "python");
    }

    #[test]
    fn markdown_and_text_are_blank() {
        assert_eq!(language_for_file(Path::new("README.md")), "");
        assert_eq!(language_for_file(Path::new("notes.txt")), "");
    }

    #[test]
    fn by_special_name() {
        assert_eq!(language_for_file(Path::new("x/Dockerfile")), "dockerfile");
        assert_eq!(language_for_file(Path::new("pyproject.toml")), "toml");
        assert_eq!(language_for_file(Path::new("Makefile")), "make");
    }

    #[test]
    fn unknown_is_blank() {
        assert_eq!(language_for_file(Path::new("data.bin")), "");
    }
}
