//! Builds the platform-shell invocation of a task's command string, per
//! spec.md §4.7: `sh -c <cmd>` on POSIX, `cmd.exe /C <cmd>` on Windows.

use std::{collections::BTreeMap, path::PathBuf};

#[derive(Debug, Clone)]
pub struct Command {
    cmd: String,
    cwd: Option<PathBuf>,
    env: BTreeMap<String, String>,
    label: String,
}

impl Command {
    pub fn new(cmd: impl Into<String>) -> Self {
        let cmd = cmd.into();
        Self {
            label: cmd.clone(),
            cmd,
            cwd: None,
            env: BTreeMap::new(),
        }
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, vars: BTreeMap<String, String>) -> Self {
        self.env = vars;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }
}

impl From<Command> for tokio::process::Command {
    fn from(value: Command) -> Self {
        let mut tokio_cmd = if cfg!(windows) {
            let mut c = tokio::process::Command::new("cmd.exe");
            c.args(["/C", &value.cmd]);
            c
        } else {
            let mut c = tokio::process::Command::new("sh");
            c.args(["-c", &value.cmd]);
            c
        };

        if let Some(cwd) = &value.cwd {
            tokio_cmd.current_dir(cwd);
        }
        if !value.env.is_empty() {
            tokio_cmd.envs(&value.env);
        }
        tokio_cmd.stdin(std::process::Stdio::null());
        tokio_cmd.stdout(std::process::Stdio::piped());
        tokio_cmd.stderr(std::process::Stdio::piped());
        // A child dropped before `Child::run` observes its exit (global
        // cancellation racing the grace period) must not leak as an orphan.
        tokio_cmd.kill_on_drop(true);
        tokio_cmd
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn label_defaults_to_command_string() {
        let cmd = Command::new("echo hi");
        assert_eq!(cmd.label(), "echo hi");
    }

    #[test]
    fn label_can_be_overridden() {
        let mut cmd = Command::new("echo hi");
        cmd.set_label("build[os=linux]");
        assert_eq!(cmd.label(), "build[os=linux]");
    }
}
