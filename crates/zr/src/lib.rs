//! The `zr` binary's library surface: the CLI grammar, the Config Model,
//! process-wide context, and the per-subcommand drivers in [`commands`].
//! `main.rs` is the thin entry point; everything it calls lives here so it
//! can be exercised from integration tests without spawning a process.

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod format;
pub mod signal;
pub mod tracing;

use std::path::{Path, PathBuf};

use crate::error::CliError;

const CONFIG_FILE_NAME: &str = "zr.toml";

/// Walks up from `start` looking for a `zr.toml`, per spec.md §6: the
/// workspace root is wherever the nearest one lives, not necessarily the
/// process's current directory.
pub fn find_workspace_root(start: &Path) -> Result<PathBuf, CliError> {
    let mut dir = start;
    loop {
        if dir.join(CONFIG_FILE_NAME).is_file() {
            return Ok(dir.to_path_buf());
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => return Err(CliError::WorkspaceRootNotFound(start.display().to_string())),
        }
    }
}

/// Dispatches a parsed [`cli::Cli`] to its subcommand driver. Builds the
/// [`context::CommandContext`] (workspace root discovery, config load,
/// signal handler) once, then hands it to whichever subcommand matched.
pub async fn dispatch(cli: cli::Cli) -> Result<(), CliError> {
    use cli::Command;

    let cwd = match &cli.cwd {
        Some(path) => path.clone().into_std_path_buf(),
        None => std::env::current_dir().map_err(|source| CliError::Io { path: ".".to_string(), source })?,
    };

    let root = match &cli.config {
        Some(path) => path
            .parent()
            .map(|p| p.to_path_buf().into_std_path_buf())
            .unwrap_or_else(|| cwd.clone()),
        None => find_workspace_root(&cwd)?,
    };

    let overrides = config::ConfigOverrides::default();
    let config = config::load(&root, &cwd, cli.profile.as_deref(), &overrides, false)?;

    let color = if cli.no_color { context::ColorMode::Never } else { context::ColorMode::Auto };
    // A Ctrl-C handler is process-global; `validate` never runs anything
    // cancellable, so it skips installing one rather than contending with
    // other tests that install their own within the same process.
    let signals = (!matches!(cli.command, Command::Validate(_))).then(signal::SignalHandler::new_from_ctrlc);

    let ctx = context::CommandContext::new(
        root,
        cwd,
        color,
        None,
        cli.dry_run,
        config,
        cli.profile.clone(),
        cli.format,
        signals,
    );

    match &cli.command {
        Command::Run(args) => commands::run::run(&ctx, args).await,
        Command::Affected(args) => commands::affected::affected(&ctx, args).await,
        Command::Workflow(args) => commands::workflow::workflow(&ctx, args).await,
        Command::Cache(args) => commands::cache::cache(&ctx, args).await,
        Command::Validate(args) => commands::validate::validate(&ctx, args).await,
        Command::Estimate(args) => commands::estimate::estimate(&ctx, args).await,
    }
}
