//! The CLI surface, per spec.md §6. Grounded in `cli/mod.rs`'s top-level
//! `Args`/`Subcommand` derive split: global flags live on [`Cli`], each
//! subcommand gets its own flags struct.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

use crate::format::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "zr", about = "Declarative, monorepo-aware task orchestrator", version)]
pub struct Cli {
    /// Path to the workspace's `zr.toml`. Defaults to walking up from `--cwd`
    /// looking for one.
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Directory to resolve the active workspace member from. Defaults to
    /// the process's current directory.
    #[arg(long, global = true)]
    pub cwd: Option<Utf8PathBuf>,

    /// Selects a `[profiles.<name>]` overlay.
    #[arg(long, global = true)]
    pub profile: Option<String>,

    #[arg(long, value_enum, global = true, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[arg(long, global = true)]
    pub no_color: bool,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Executes a task and its dependency subgraph.
    Run(RunArgs),
    /// Maps changed paths onto affected workspace members and tasks.
    Affected(AffectedArgs),
    /// Drives a named workflow through its stages.
    Workflow(WorkflowArgs),
    /// Inspects or clears the local cache.
    Cache(CacheArgs),
    /// Validates configuration without executing anything.
    Validate(ValidateArgs),
    /// Reports a historical duration estimate for a task.
    Estimate(EstimateArgs),
}

#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Task names to run; each pulls in its own dependency subgraph.
    #[arg(required = true)]
    pub tasks: Vec<String>,
    #[arg(long)]
    pub jobs: Option<usize>,
    #[arg(long)]
    pub keep_going: bool,
}

#[derive(clap::Args, Debug)]
pub struct AffectedArgs {
    /// Task to check; its owning members and cache inputs are matched
    /// against the changed-path set.
    pub task: String,
    #[arg(long, default_value = "HEAD")]
    pub base: String,
    #[arg(long)]
    pub list: bool,
    #[arg(long)]
    pub include_dependents: bool,
    #[arg(long)]
    pub include_dependencies: bool,
    #[arg(long)]
    pub exclude_self: bool,
}

#[derive(clap::Args, Debug)]
pub struct WorkflowArgs {
    pub name: String,
    #[arg(long)]
    pub jobs: Option<usize>,
}

#[derive(clap::Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    Status,
    Clear {
        #[arg(long)]
        selective: Option<String>,
    },
}

#[derive(clap::Args, Debug)]
pub struct ValidateArgs {
    #[arg(long)]
    pub strict: bool,
    /// Prints the `zr.toml` schema reference instead of validating.
    #[arg(long)]
    pub schema: bool,
}

#[derive(clap::Args, Debug)]
pub struct EstimateArgs {
    pub task: String,
    #[arg(long, default_value_t = zr_history::DEFAULT_LIMIT)]
    pub limit: usize,
}
