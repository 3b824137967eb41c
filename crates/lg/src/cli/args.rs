//! Argument definitions.

use clap::{Args, Parser, Subcommand};

/// Deterministic context assembly for LLM prompts.
#[derive(Debug, Parser)]
#[command(name = "lg", version, about)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Render a context or section to stdout.
    Render(RenderArgs),
    /// Render a target and print the token-accounting report as JSON.
    Report(RenderArgs),
    /// List configuration: sections, mode-sets, tag-sets, contexts.
    List {
        /// What to list.
        #[command(subcommand)]
        what: ListWhat,
    },
    /// Cache maintenance.
    Cache {
        /// Operation to perform.
        #[command(subcommand)]
        op: CacheOp,
    },
}

/// Options shared by `render` and `report`.
#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Target: `name`, `ctx:name`, or `sec:name`.
    pub target: String,

    /// Activate a mode: `set:mode`. Repeatable.
    #[arg(long = "mode", value_name = "SET:MODE")]
    pub modes: Vec<String>,

    /// Activate an extra tag. Repeatable.
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Full provider id driving the run (e.g. `com.example.tool.cli`).
    #[arg(long)]
    pub provider: Option<String>,

    /// Which files to include: all, changes, or branch-changes.
    #[arg(long, value_name = "MODE")]
    pub vcs: Option<String>,

    /// Target branch for `branch-changes`.
    #[arg(long)]
    pub target_branch: Option<String>,

    /// Disable code fences globally.
    #[arg(long)]
    pub no_fence: bool,

    /// Bypass cache reads (writes still happen).
    #[arg(long)]
    pub fresh: bool,

    /// Model label for token accounting.
    #[arg(long, default_value = "default")]
    pub model: String,

    /// Context window used for share calculations.
    #[arg(long, default_value_t = 128_000)]
    pub ctx_limit: u32,
}

/// `list` subcommands.
#[derive(Debug, Subcommand)]
pub enum ListWhat {
    /// Renderable sections with their adaptive configuration.
    Sections,
    /// Mode-sets of a context, filtered for a provider.
    ModeSets {
        /// Context name.
        #[arg(long)]
        context: String,
        /// Full provider id (use `clipboard` for no filtering).
        #[arg(long)]
        provider: String,
    },
    /// Tag-sets of a context.
    TagSets {
        /// Context name.
        #[arg(long)]
        context: String,
    },
    /// Context names, optionally filtered by provider compatibility.
    Contexts {
        /// Full provider id.
        #[arg(long)]
        provider: Option<String>,
    },
}

/// `cache` subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheOp {
    /// Remove everything under `.lg-cache/`.
    Purge,
}

/// Parses the process arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}
