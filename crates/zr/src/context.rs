//! Process-wide state threaded explicitly through components instead of
//! globals (spec.md Design Note §9). Grounded in `commands/mod.rs`'s
//! `CommandBase`: a small struct built once in `main`, then passed by
//! reference into the Config Model, Scheduler, and Workflow Engine.

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::format::OutputFormat;
use crate::signal::SignalHandler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub fn should_strip_ansi(self) -> bool {
        match self {
            ColorMode::Always => false,
            ColorMode::Never => true,
            ColorMode::Auto => !console::colors_enabled(),
        }
    }
}

/// Everything a command needs beyond its own flags: where the workspace
/// lives, how loud to be, and how many workers to run with.
pub struct CommandContext {
    pub root: PathBuf,
    pub cwd: PathBuf,
    pub color: ColorMode,
    pub jobs: usize,
    pub dry_run: bool,
    pub config: Config,
    pub profile: Option<String>,
    pub format: OutputFormat,
    /// `None` when Ctrl-C handling couldn't be installed (tests, or a
    /// platform where [`SignalHandler::new_from_ctrlc`] failed); commands
    /// fall back to running uncancellable rather than treating it as fatal.
    pub signals: Option<SignalHandler>,
}

impl CommandContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        root: PathBuf,
        cwd: PathBuf,
        color: ColorMode,
        jobs: Option<usize>,
        dry_run: bool,
        config: Config,
        profile: Option<String>,
        format: OutputFormat,
        signals: Option<SignalHandler>,
    ) -> Self {
        Self {
            root,
            cwd,
            color,
            jobs: jobs.unwrap_or_else(num_cpus::get),
            dry_run,
            config,
            profile,
            format,
            signals,
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        if self.config.cache.local_dir.is_absolute() {
            self.config.cache.local_dir.clone()
        } else {
            self.root.join(&self.config.cache.local_dir)
        }
    }

    /// `<root>/.zr/history/`, per spec.md §6's on-disk layout — a sibling
    /// of the cache directory, not nested under it, so `cache clear` never
    /// touches run history.
    pub fn history_dir(&self) -> PathBuf {
        self.root.join(".zr").join("history")
    }

    pub fn relative_to_root<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}
