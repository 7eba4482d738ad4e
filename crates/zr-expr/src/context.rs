//! The values an expression can see while it evaluates: platform info, the
//! process environment, per-run runtime fields, and the VCS-derived changed
//! path set used by `file.changed`.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::process::Command;

/// Static platform facts, fixed at process start (`std::env::consts`).
#[derive(Debug, Clone)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }

    pub fn is_linux(&self) -> bool {
        self.os == "linux"
    }

    pub fn is_macos(&self) -> bool {
        self.os == "macos"
    }

    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }
}

/// Fields that vary per task invocation: the task's own name, its
/// fingerprint (once computed), and the matrix iteration index, if any.
#[derive(Debug, Clone, Default)]
pub struct Runtime {
    pub task: String,
    pub hash: Option<String>,
    pub iteration: Option<String>,
}

/// Evaluation context threaded through every expression evaluated for a
/// single task. `shell()` results are memoized per context instance: a task
/// config referencing the same `shell("git rev-parse HEAD")` twice (e.g. once
/// in a `when` condition, once in an env var) shells out only once.
pub struct Context {
    pub platform: Platform,
    pub env: HashMap<String, String>,
    pub runtime: Runtime,
    /// Paths the VCS Bridge reports as changed relative to the configured
    /// base ref. `None` means "affected-set computation wasn't requested";
    /// `file.changed` then always evaluates to `false`.
    pub changed_paths: Option<HashSet<PathBuf>>,
    shell_cache: RefCell<HashMap<String, String>>,
}

impl Context {
    pub fn new(env: HashMap<String, String>, runtime: Runtime) -> Self {
        Self {
            platform: Platform::current(),
            env,
            runtime,
            changed_paths: None,
            shell_cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn with_changed_paths(mut self, changed: HashSet<PathBuf>) -> Self {
        self.changed_paths = Some(changed);
        self
    }

    /// Runs `cmd` through the platform shell and returns trimmed stdout. A
    /// non-zero exit or spawn failure resolves to an empty string rather
    /// than failing the whole evaluation (Design Note §9: `shell()` failures
    /// are not propagated as evaluation errors).
    pub fn shell(&self, cmd: &str) -> String {
        if let Some(cached) = self.shell_cache.borrow().get(cmd) {
            return cached.clone();
        }
        let output = if cfg!(windows) {
            Command::new("cmd").arg("/C").arg(cmd).output()
        } else {
            Command::new("sh").arg("-c").arg(cmd).output()
        };
        let result = match output {
            Ok(out) if out.status.success() => {
                String::from_utf8_lossy(&out.stdout).trim().to_string()
            }
            _ => String::new(),
        };
        self.shell_cache
            .borrow_mut()
            .insert(cmd.to_string(), result.clone());
        result
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn platform_reports_current_os() {
        let platform = Platform::current();
        assert_eq!(platform.os, std::env::consts::OS);
    }

    #[test]
    fn shell_memoizes_results() {
        let ctx = Context::new(HashMap::new(), Runtime::default());
        let first = ctx.shell("echo hello");
        let second = ctx.shell("echo hello");
        assert_eq!(first, second);
        assert_eq!(ctx.shell_cache.borrow().len(), 1);
    }

    #[test]
    fn shell_failure_is_empty_string() {
        let ctx = Context::new(HashMap::new(), Runtime::default());
        assert_eq!(ctx.shell("exit 1"), "");
    }
}
