//! Adaptive-system error types.

use thiserror::Error;

/// Errors raised by adaptive resolution and validation.
#[derive(Debug, Error)]
pub enum AdaptiveError {
    /// Circular dependency in an `extends` chain.
    #[error("circular extends dependency: {}", cycle.join(" -> "))]
    ExtendsCycle {
        /// The cycle, starting and ending at the repeated key.
        cycle: Vec<String>,
    },

    /// A section referenced in `extends` does not exist.
    #[error("section '{name}' referenced in extends of '{parent}' not found")]
    SectionNotFoundInExtends {
        /// The missing reference.
        name: String,
        /// The section whose extends list names it.
        parent: String,
    },

    /// An attempt to render a meta-section.
    #[error("cannot render meta-section '{name}' (it has no filters)")]
    MetaSectionRender {
        /// The meta-section's name.
        name: String,
    },

    /// More than one integration mode-set after merging.
    #[error(
        "multiple integration mode-sets found{}: {}; only one integration mode-set is allowed per context",
        context_suffix(context), mode_sets.join(", ")
    )]
    MultipleIntegrationModeSets {
        /// Ids of the offending mode-sets.
        mode_sets: Vec<String>,
        /// Context name, when known.
        context: String,
    },

    /// No integration mode-set after merging.
    #[error(
        "no integration mode-set found{}; at least one mode-set with 'runs' is required",
        context_suffix(context)
    )]
    NoIntegrationModeSet {
        /// Context name, when known.
        context: String,
    },

    /// The selected provider is not supported by the integration mode-set.
    #[error(
        "provider '{provider}' is not supported by context '{context}'{}",
        available_suffix(available)
    )]
    ProviderNotSupported {
        /// The requested provider (full id).
        provider: String,
        /// Context name.
        context: String,
        /// Providers that would work.
        available: Vec<String>,
    },

    /// A `{% mode set:mode %}` block names an unknown mode.
    #[error(
        "mode '{set}:{mode}' not found{}{}",
        context_suffix(context), available_suffix(available)
    )]
    InvalidModeReference {
        /// Mode-set id from the block.
        set: String,
        /// Mode id from the block.
        mode: String,
        /// Context name, when known.
        context: String,
        /// Modes that exist in the set.
        available: Vec<String>,
    },

    /// A `--mode` argument names an unknown mode-set.
    #[error("unknown mode set '{set}'{}", available_suffix(available))]
    UnknownModeSet {
        /// The unknown mode-set id.
        set: String,
        /// Mode-set ids that exist.
        available: Vec<String>,
    },

    /// Raw `mode-sets`/`tag-sets` YAML has an invalid shape.
    #[error("invalid adaptive configuration in section '{section}': {message}")]
    InvalidShape {
        /// The section carrying the bad data.
        section: String,
        /// What is wrong.
        message: String,
    },

    /// Lookup failure while resolving an addressed reference.
    #[error(transparent)]
    Addressing(#[from] lg_address::AddressingError),

    /// Lookup failure in the section store.
    #[error(transparent)]
    Config(#[from] lg_config::ConfigError),
}

fn context_suffix(context: &str) -> String {
    if context.is_empty() {
        String::new()
    } else {
        format!(" in context '{context}'")
    }
}

fn available_suffix(available: &[String]) -> String {
    if available.is_empty() {
        String::new()
    } else {
        format!(". Available: {}", available.join(", "))
    }
}
