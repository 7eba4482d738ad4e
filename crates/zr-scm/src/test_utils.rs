//! Shared test helpers for creating temporary git repos with known state.
//!
//! These helpers are used across multiple test modules to avoid duplicating
//! the boilerplate of setting up git repos for testing.

use std::{path::Path, process::Command};

pub fn require_git_cmd(repo_root: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_root)
        .output()
        .unwrap_or_else(|e| panic!("failed to run git {:?}: {}", args, e));
    assert!(
        output.status.success(),
        "git {:?} failed in {}: {}",
        args,
        repo_root.display(),
        String::from_utf8_lossy(&output.stderr),
    );
}

pub fn init_repo(repo_root: &Path) {
    let cmds: &[&[&str]] = &[
        &["init", "-q", "."],
        &["config", "--local", "user.name", "test"],
        &["config", "--local", "user.email", "test@example.com"],
    ];
    for cmd in cmds {
        require_git_cmd(repo_root, cmd);
    }
}

pub fn commit_all(repo_root: &Path, message: &str) {
    let cmds: &[&[&str]] = &[&["add", "."], &["commit", "-q", "-m", message]];
    for cmd in cmds {
        require_git_cmd(repo_root, cmd);
    }
}
