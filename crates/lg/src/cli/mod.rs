//! CLI command dispatch.

pub mod args;

use std::fmt;
use std::path::PathBuf;

use lg_core::{Engine, EngineError, RunOptions};
use lg_stats::ModelInfo;
use lg_vcs::VcsMode;

use args::{CacheOp, Cli, Commands, ListWhat, RenderArgs};

/// A user-facing CLI failure: either an engine error or a usage problem.
#[derive(Debug)]
pub enum CliError {
    /// Engine-level user error.
    Engine(EngineError),
    /// Bad command-line usage (e.g. malformed `--mode`).
    Usage(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Engine(err) => err.fmt(f),
            Self::Usage(message) => f.write_str(message),
        }
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

/// Finds the repository root from the working directory.
fn repo_root() -> Result<PathBuf, CliError> {
    let cwd = std::env::current_dir()
        .map_err(|err| CliError::Usage(format!("cannot determine working directory: {err}")))?;
    lg_path::find_repo_root(&cwd).ok_or_else(|| {
        CliError::Engine(EngineError::NoRepository { start: cwd })
    })
}

/// Builds run options from render arguments.
fn run_options(args: &RenderArgs) -> Result<RunOptions, CliError> {
    let mut options = RunOptions::new();
    options.model = ModelInfo {
        name: args.model.clone(),
        encoder: "heuristic".to_string(),
        ctx_limit: args.ctx_limit,
    };
    options.code_fence = !args.no_fence;
    options.fresh = args.fresh;
    options.provider = args.provider.clone();
    options.target_branch = args.target_branch.clone();

    for mode in &args.modes {
        let Some((set, mode_id)) = mode.split_once(':') else {
            return Err(CliError::Usage(format!(
                "--mode takes SET:MODE, got '{mode}'"
            )));
        };
        options
            .modes
            .insert(set.trim().to_string(), mode_id.trim().to_string());
    }
    options.extra_tags = args.tags.iter().map(|t| t.trim().to_string()).collect();

    if let Some(vcs) = &args.vcs {
        options.vcs_mode = Some(VcsMode::parse(vcs).ok_or_else(|| {
            CliError::Usage(format!(
                "--vcs takes all, changes, or branch-changes, got '{vcs}'"
            ))
        })?);
    }

    Ok(options)
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("Error: failed to serialize output: {err}"),
    }
}

/// Runs one parsed CLI invocation.
pub fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Render(args) => {
            let root = repo_root()?;
            let engine = Engine::new(&root, run_options(&args)?);
            let outcome = engine.render(&args.target)?;
            print!("{}", outcome.text);
            Ok(())
        }
        Commands::Report(args) => {
            let root = repo_root()?;
            let engine = Engine::new(&root, run_options(&args)?);
            let outcome = engine.render(&args.target)?;
            print_json(&outcome.report);
            Ok(())
        }
        Commands::List { what } => {
            let root = repo_root()?;
            match what {
                ListWhat::Sections => {
                    print_json(&lg_core::list_sections(&root)?);
                }
                ListWhat::ModeSets { context, provider } => {
                    print_json(&lg_core::list_mode_sets(&root, &context, &provider)?);
                }
                ListWhat::TagSets { context } => {
                    print_json(&lg_core::list_tag_sets(&root, &context)?);
                }
                ListWhat::Contexts { provider } => match provider {
                    Some(provider) => {
                        print_json(&lg_core::list_contexts_for_provider(&root, &provider));
                    }
                    None => {
                        print_json(&lg_core::ContextsList {
                            contexts: lg_core::list_contexts(&root),
                        });
                    }
                },
            }
            Ok(())
        }
        Commands::Cache { op } => {
            let root = repo_root()?;
            match op {
                CacheOp::Purge => {
                    let cache = lg_cache_handle(&root);
                    if cache.purge_all() {
                        eprintln!("cache purged");
                        Ok(())
                    } else {
                        Err(CliError::Usage("failed to purge cache".to_string()))
                    }
                }
            }
        }
    }
}

/// A cache handle for maintenance commands.
fn lg_cache_handle(root: &std::path::Path) -> lg_cache::Cache {
    lg_cache::Cache::new(root, None, false, env!("CARGO_PKG_VERSION"))
}
