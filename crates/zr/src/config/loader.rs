//! Discovers and reads `zr.toml` files from disk and assembles them into the
//! precedence chain spec.md §4.1 defines: workspace root, then the active
//! member (if any), then the selected profile, then CLI overrides.
//!
//! Workspace member discovery walks `[workspace] members` glob patterns by
//! hand (mirroring `zr_fingerprint::globs`'s approach) rather than via
//! `wax`'s own walker, so a single unreadable directory doesn't abort
//! discovery of the rest.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use wax::{Glob, Pattern};
use zr_task_id::{MemberName, TaskName};

use super::error::{ConfigError, ValidationErrors};
use super::processed::{self, Config, ConfigOverrides, Layer, MemberInfo};
use super::raw::RawConfig;
use super::validate;

const CONFIG_FILE_NAME: &str = "zr.toml";

fn read_layer(path: &Path) -> Result<Layer, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_layer(path, &text)
}

fn parse_layer(path: &Path, text: &str) -> Result<Layer, ConfigError> {
    toml::from_str::<RawConfig>(text)
        .map(Layer::from)
        .map_err(|source| {
            let span = source.span().map(|range| (range.start, range.len()).into());
            ConfigError::Parse {
                path: path.display().to_string(),
                message: source.message().to_string(),
                span,
                source_code: text.to_string(),
            }
        })
}

fn discover_members(root: &Path, patterns: &[String]) -> Vec<MemberInfo> {
    let mut seen = HashSet::new();
    let mut members = Vec::new();

    for pattern in patterns {
        let Ok(glob) = Glob::new(pattern) else {
            continue;
        };
        walk_for_members(root, root, &glob, &mut seen, &mut members);
    }

    members.sort_by(|a, b| a.root.cmp(&b.root));
    members
}

fn walk_for_members(
    root: &Path,
    dir: &Path,
    glob: &Glob,
    seen: &mut HashSet<PathBuf>,
    out: &mut Vec<MemberInfo>,
) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if !file_type.is_dir() {
            continue;
        }

        let rel = path.strip_prefix(root).unwrap_or(&path);
        if glob.is_match(rel) && path.join(CONFIG_FILE_NAME).is_file() {
            if seen.insert(path.clone()) {
                let name = rel.display().to_string().replace('\\', "/");
                out.push(MemberInfo {
                    name: MemberName::new(name),
                    root: path.clone(),
                });
            }
        }

        walk_for_members(root, &path, glob, seen, out);
    }
}

/// Picks the workspace member whose root is the longest path-prefix match of
/// `cwd`, falling back to the workspace root when `cwd` is outside every
/// member.
fn active_member<'a>(members: &'a [MemberInfo], cwd: &Path) -> Option<&'a MemberInfo> {
    members
        .iter()
        .filter(|m| cwd.starts_with(&m.root))
        .max_by_key(|m| m.root.components().count())
}

/// Loads and resolves the full configuration rooted at `root`, with `cwd`
/// used to pick the active workspace member and `profile_name` selecting a
/// named `[profiles.*]` overlay. Discards non-fatal warnings; see
/// [`load_with_warnings`] to keep them (used by `zr validate`).
pub fn load(
    root: &Path,
    cwd: &Path,
    profile_name: Option<&str>,
    overrides: &ConfigOverrides,
    strict: bool,
) -> Result<Config, ConfigError> {
    load_with_warnings(root, cwd, profile_name, overrides, strict).map(|(config, _)| config)
}

pub fn load_with_warnings(
    root: &Path,
    cwd: &Path,
    profile_name: Option<&str>,
    overrides: &ConfigOverrides,
    strict: bool,
) -> Result<(Config, Vec<super::error::ValidationWarning>), ConfigError> {
    let root_path = root.join(CONFIG_FILE_NAME);
    let root_config_text = fs::read_to_string(&root_path).map_err(|source| ConfigError::Io {
        path: root_path.display().to_string(),
        source,
    })?;
    let root_parsed: RawConfig = toml::from_str(&root_config_text).map_err(|source| {
        let span = source.span().map(|range| (range.start, range.len()).into());
        ConfigError::Parse {
            path: root_path.display().to_string(),
            message: source.message().to_string(),
            span,
            source_code: root_config_text.clone(),
        }
    })?;

    let member_globs: Vec<String> = root_parsed
        .workspace
        .as_ref()
        .map(|w| w.members.clone())
        .unwrap_or_default();
    let members = discover_members(root, &member_globs);

    let mut layers = vec![Layer::from(root_parsed.clone())];

    let active = active_member(&members, cwd);
    if let Some(member) = active {
        let member_path = member.root.join(CONFIG_FILE_NAME);
        if member_path.is_file() {
            layers.push(read_layer(&member_path)?);
        }
    }

    let profile = profile_name
        .and_then(|name| root_parsed.profiles.get(name))
        .cloned();

    let mut merged_for_validation = Layer::default();
    for layer in &layers {
        merged_for_validation.tasks.extend(layer.tasks.clone());
        merged_for_validation.templates.extend(layer.templates.clone());
        merged_for_validation.workflows.extend(layer.workflows.clone());
    }

    let (errors, warnings) = validate::validate(&merged_for_validation, strict);
    if !errors.is_empty() {
        return Err(ConfigError::Validation(ValidationErrors(errors)));
    }

    let config = processed::resolve(layers, profile.as_ref(), overrides, members);
    Ok((config, warnings))
}

/// Maps each task name a workspace member's own `zr.toml` directly declares
/// to that member's root directory, by re-reading every member's file in
/// isolation (not through the precedence chain [`load`] uses). Used by the
/// `affected` command to tell which member a task belongs to, independent of
/// which member happens to be active for the current invocation.
pub fn member_task_owners(members: &[MemberInfo]) -> BTreeMap<TaskName, PathBuf> {
    let mut owners = BTreeMap::new();
    for member in members {
        let path = member.root.join(CONFIG_FILE_NAME);
        let Ok(layer) = read_layer(&path) else { continue };
        for name in layer.tasks.keys() {
            if let Ok(task_name) = TaskName::new(name.clone()) {
                owners.insert(task_name, member.root.clone());
            }
        }
    }
    owners
}

#[cfg(test)]
mod test {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn loads_root_only_workspace() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
            [tasks.build]
            cmd = "echo build"
            "#,
        )
        .unwrap();

        let config = load(dir.path(), dir.path(), None, &ConfigOverrides::default(), false).unwrap();
        assert!(config.tasks.contains_key(&zr_task_id::TaskName::new("build").unwrap()));
    }

    #[test]
    fn member_overlay_overrides_root_task() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
            [workspace]
            members = ["packages/*"]

            [tasks.build]
            cmd = "echo root"
            "#,
        )
        .unwrap();
        fs::create_dir_all(dir.path().join("packages/app")).unwrap();
        fs::write(
            dir.path().join("packages/app").join(CONFIG_FILE_NAME),
            r#"
            [tasks.build]
            cmd = "echo app"
            "#,
        )
        .unwrap();

        let config = load(
            dir.path(),
            &dir.path().join("packages/app"),
            None,
            &ConfigOverrides::default(),
            false,
        )
        .unwrap();
        let build = config
            .tasks
            .get(&zr_task_id::TaskName::new("build").unwrap())
            .unwrap();
        assert_eq!(build.cmd.as_deref(), Some("echo app"));
    }

    #[test]
    fn bad_dependency_reference_is_rejected() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"
            [tasks.build]
            cmd = "echo build"
            deps = ["ghost"]
            "#,
        )
        .unwrap();

        let result = load(dir.path(), dir.path(), None, &ConfigOverrides::default(), false);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn malformed_toml_reports_parse_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE_NAME), "not valid [ toml").unwrap();

        let result = load(dir.path(), dir.path(), None, &ConfigOverrides::default(), false);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }
}
