//! Changed-path detection against a base ref, per spec.md §4.9. Grounded in
//! `turborepo-lib`'s choice of `git2` as the VCS backend (the
//! `turborepo-scm` crate this bridge replaces only shipped test utilities
//! in the retrieval pack, not a diff implementation to carry over).

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use git2::Repository;

use crate::error::ScmError;

pub struct Scm {
    repo: Repository,
}

impl Scm {
    /// Opens the repository containing `path`, walking up to find the
    /// nearest `.git`. Absence of a repository is `NotVcsRepo`, not an
    /// error the caller has to special-case out of a generic `git2::Error`.
    pub fn discover(path: &Path) -> Result<Self, ScmError> {
        match Repository::discover(path) {
            Ok(repo) => Ok(Self { repo }),
            Err(_) => Err(ScmError::NotVcsRepo(path.display().to_string())),
        }
    }

    /// The repository's working directory, or its git dir if bare (git2
    /// always returns `Some` for non-bare repos, which is the only shape
    /// this bridge is meant to operate on).
    pub fn workdir(&self) -> Option<&Path> {
        self.repo.workdir()
    }

    /// Every path that differs between `base_ref`'s tree and the current
    /// working tree (including the index), relative to the repository
    /// root. Covers additions, modifications, deletions, and renames: a
    /// rename contributes both its old and new path, since either one may
    /// match a task's `cache.inputs` glob.
    pub fn changed_paths(&self, base_ref: &str) -> Result<BTreeSet<PathBuf>, ScmError> {
        let object = self
            .repo
            .revparse_single(base_ref)
            .map_err(|_| ScmError::RefUnknown(base_ref.to_string()))?;
        let commit = object
            .peel_to_commit()
            .map_err(|_| ScmError::RefUnknown(base_ref.to_string()))?;
        let tree = commit.tree()?;

        let diff = self
            .repo
            .diff_tree_to_workdir_with_index(Some(&tree), None)?;

        let mut paths = BTreeSet::new();
        for delta in diff.deltas() {
            if let Some(p) = delta.old_file().path() {
                paths.insert(p.to_path_buf());
            }
            if let Some(p) = delta.new_file().path() {
                paths.insert(p.to_path_buf());
            }
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::test_utils::{commit_all, init_repo, require_git_cmd};

    #[test]
    fn non_repo_path_is_not_vcs_repo() {
        let dir = tempdir().unwrap();
        let result = Scm::discover(dir.path());
        assert!(matches!(result, Err(ScmError::NotVcsRepo(_))));
    }

    #[test]
    fn unknown_ref_is_reported() {
        let dir = tempdir().unwrap();
        init_repo(dir.path());
        fs::write(dir.path().join("a.txt"), "hi").unwrap();
        commit_all(dir.path(), "init");

        let scm = Scm::discover(dir.path()).unwrap();
        let result = scm.changed_paths("does-not-exist");
        assert!(matches!(result, Err(ScmError::RefUnknown(_))));
    }

    #[test]
    fn detects_modified_and_new_files() {
        let dir = tempdir().unwrap();
        init_repo(dir.path());
        fs::write(dir.path().join("a.txt"), "hi").unwrap();
        commit_all(dir.path(), "init");

        fs::write(dir.path().join("a.txt"), "changed").unwrap();
        fs::write(dir.path().join("b.txt"), "new").unwrap();
        require_git_cmd(dir.path(), &["add", "b.txt"]);

        let scm = Scm::discover(dir.path()).unwrap();
        let changed = scm.changed_paths("HEAD").unwrap();
        assert!(changed.contains(Path::new("a.txt")));
        assert!(changed.contains(Path::new("b.txt")));
    }
}
