//! The adapter registry.
//!
//! A table from file extension to adapter, constructed once at start-up
//! and injected into the pipeline; no global mutable state.

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use crate::adapter::Adapter;
use crate::base::BaseAdapter;
use crate::markdown::MarkdownAdapter;
use crate::python::PythonAdapter;

/// Extension → adapter table with a passthrough fallback.
pub struct AdapterRegistry {
    /// Adapters keyed by extension (lowercase, with dot).
    by_extension: HashMap<String, Rc<dyn Adapter>>,
    /// The fallback adapter.
    base: Rc<dyn Adapter>,
}

impl AdapterRegistry {
    /// Builds the registry of built-in adapters.
    pub fn builtin() -> Self {
        let mut registry = Self {
            by_extension: HashMap::new(),
            base: Rc::new(BaseAdapter),
        };
        registry.register(Rc::new(MarkdownAdapter));
        registry.register(Rc::new(PythonAdapter));
        registry
    }

    /// Registers an adapter for all the extensions it claims.
    pub fn register(&mut self, adapter: Rc<dyn Adapter>) {
        for ext in adapter.extensions() {
            self.by_extension
                .insert(ext.to_ascii_lowercase(), Rc::clone(&adapter));
        }
    }

    /// The adapter responsible for a file, by extension; unknown extensions
    /// get the base adapter.
    pub fn adapter_for_path(&self, path: &Path) -> Rc<dyn Adapter> {
        let ext = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_ascii_lowercase()))
            .unwrap_or_default();
        self.by_extension
            .get(&ext)
            .map(Rc::clone)
            .unwrap_or_else(|| Rc::clone(&self.base))
    }

    /// The adapter name for a file (for policy lookups without binding).
    pub fn adapter_name_for_path(&self, path: &Path) -> String {
        self.adapter_for_path(path).name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_extensions_resolve() {
        let registry = AdapterRegistry::builtin();
        assert_eq!(registry.adapter_for_path(Path::new("a.py")).name(), "python");
        assert_eq!(registry.adapter_for_path(Path::new("a.md")).name(), "markdown");
        assert_eq!(
            registry.adapter_for_path(Path::new("a.MARKDOWN")).name(),
            "markdown"
        );
    }

    #[test]
    fn unknown_falls_back_to_base() {
        let registry = AdapterRegistry::builtin();
        assert_eq!(registry.adapter_for_path(Path::new("a.rs")).name(), "base");
        assert_eq!(registry.adapter_for_path(Path::new("Makefile")).name(), "base");
    }
}
