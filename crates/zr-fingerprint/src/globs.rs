//! Resolves a `cache.inputs` glob set against the filesystem into the sorted
//! `(relative_path, content_hash)` records spec.md §4.3 category 4 wants.
//!
//! Walking is hand-rolled rather than delegated to `wax`'s own directory
//! walker so that a symlink cycle can be caught and sentineled one path at a
//! time instead of aborting the whole walk.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use wax::{Glob, Pattern};

use crate::canon::hash_bytes;

/// One resolved input: either real file content, or a sentinel standing in
/// for a path the filesystem couldn't produce content for.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum InputRecord {
    Hashed { path: String, hash: String },
    Missing { path: String },
    Cycle { path: String },
}

impl InputRecord {
    pub fn canonical_record(&self) -> String {
        match self {
            InputRecord::Hashed { path, hash } => format!("{path}:{hash}"),
            InputRecord::Missing { path } => format!("{path}:MISSING"),
            InputRecord::Cycle { path } => format!("{path}:CYCLE"),
        }
    }
}

fn has_glob_metachars(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', ']'])
}

/// Resolves every entry of `patterns` against `root`, returning sorted,
/// deduplicated input records.
pub fn resolve_inputs(root: &Path, patterns: &[String]) -> Vec<InputRecord> {
    let mut records = Vec::new();
    let mut seen_paths = HashSet::new();

    for pattern in patterns {
        if !has_glob_metachars(pattern) {
            let full = root.join(pattern);
            if seen_paths.insert(pattern.clone()) {
                records.push(literal_record(pattern, &full));
            }
            continue;
        }

        let Ok(glob) = Glob::new(pattern) else {
            records.push(InputRecord::Missing {
                path: pattern.clone(),
            });
            continue;
        };

        let mut visited = HashSet::new();
        let mut matched = Vec::new();
        walk(root, root, &glob, &mut visited, &mut matched);

        if matched.is_empty() {
            if seen_paths.insert(pattern.clone()) {
                records.push(InputRecord::Missing {
                    path: pattern.clone(),
                });
            }
            continue;
        }

        for record in matched {
            let key = match &record {
                InputRecord::Hashed { path, .. }
                | InputRecord::Missing { path }
                | InputRecord::Cycle { path } => path.clone(),
            };
            if seen_paths.insert(key) {
                records.push(record);
            }
        }
    }

    records.sort();
    records
}

fn literal_record(rel: &str, full: &Path) -> InputRecord {
    match fs::read(full) {
        Ok(bytes) => InputRecord::Hashed {
            path: rel.to_string(),
            hash: hash_bytes(&bytes),
        },
        Err(_) => InputRecord::Missing {
            path: rel.to_string(),
        },
    }
}

fn walk(
    root: &Path,
    dir: &Path,
    glob: &Glob,
    visited: &mut HashSet<PathBuf>,
    out: &mut Vec<InputRecord>,
) {
    let canonical = match fs::canonicalize(dir) {
        Ok(c) => c,
        Err(_) => return,
    };
    if !visited.insert(canonical) {
        let rel = dir.strip_prefix(root).unwrap_or(dir).display().to_string();
        out.push(InputRecord::Cycle { path: rel });
        return;
    }

    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() || (file_type.is_symlink() && path.is_dir()) {
            walk(root, &path, glob, visited, out);
            continue;
        }

        let rel = path.strip_prefix(root).unwrap_or(&path);
        if glob.is_match(rel) {
            let rel_str = rel.display().to_string();
            match fs::read(&path) {
                Ok(bytes) => out.push(InputRecord::Hashed {
                    path: rel_str,
                    hash: hash_bytes(&bytes),
                }),
                Err(_) => out.push(InputRecord::Missing { path: rel_str }),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn matches_nested_glob() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("src/main.rs"), b"fn main() {}").unwrap();
        fs::write(dir.path().join("README.md"), b"hello").unwrap();

        let records = resolve_inputs(dir.path(), &["src/**/*.rs".to_string()]);
        assert_eq!(records.len(), 1);
        assert!(matches!(&records[0], InputRecord::Hashed { path, .. } if path == "src/main.rs"));
    }

    #[test]
    fn missing_literal_path_is_sentineled() {
        let dir = tempdir().unwrap();
        let records = resolve_inputs(dir.path(), &["nope.txt".to_string()]);
        assert_eq!(records, vec![InputRecord::Missing { path: "nope.txt".to_string() }]);
    }

    #[test]
    fn missing_glob_match_is_sentineled() {
        let dir = tempdir().unwrap();
        let records = resolve_inputs(dir.path(), &["*.absent".to_string()]);
        assert_eq!(
            records,
            vec![InputRecord::Missing { path: "*.absent".to_string() }]
        );
    }

    #[test]
    fn same_content_hashes_identically() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"same").unwrap();
        fs::write(dir.path().join("b.txt"), b"same").unwrap();
        let records = resolve_inputs(dir.path(), &["*.txt".to_string()]);
        let hashes: Vec<_> = records
            .iter()
            .map(|r| match r {
                InputRecord::Hashed { hash, .. } => hash.clone(),
                _ => panic!("expected hashed record"),
            })
            .collect();
        assert_eq!(hashes[0], hashes[1]);
    }

    #[test]
    fn detects_symlink_cycle() {
        #[cfg(unix)]
        {
            let dir = tempdir().unwrap();
            let sub = dir.path().join("sub");
            fs::create_dir(&sub).unwrap();
            std::os::unix::fs::symlink(dir.path(), sub.join("loop")).unwrap();

            let records = resolve_inputs(dir.path(), &["**/*.txt".to_string()]);
            assert!(records.iter().any(|r| matches!(r, InputRecord::Cycle { .. })));
        }
    }
}
