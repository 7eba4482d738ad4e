//! Task and workspace-member identifiers.
//!
//! Grounded in `turborepo-lib`'s `run/task_id.rs`, which represents a task as
//! a flat `pkg#task` string. Our configuration uses a flat task namespace
//! (spec.md invariant 1: task names are unique within a config after member
//! overlay) instead of package-qualified names, so this crate validates the
//! name syntax and models the runtime identity of a matrix-expanded task
//! node instead of a package/task pair.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of a task name, per spec.md §3.
pub const MAX_TASK_NAME_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NameError {
    #[error("task name must be 1-{MAX_TASK_NAME_LEN} characters, got {0}")]
    BadLength(usize),
    #[error(
        "task name {0:?} contains a character outside [A-Za-z0-9_.-]: {1:?}"
    )]
    BadCharacter(String, char),
}

fn validate(name: &str) -> Result<(), NameError> {
    if name.is_empty() || name.len() > MAX_TASK_NAME_LEN {
        return Err(NameError::BadLength(name.len()));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
    {
        return Err(NameError::BadCharacter(name.to_string(), c));
    }
    Ok(())
}

/// A validated task name, drawn from `[A-Za-z0-9_.-]`, length <= 64.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskName(String);

impl TaskName {
    pub fn new(name: impl Into<String>) -> Result<Self, NameError> {
        let name = name.into();
        validate(&name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TaskName {
    type Error = NameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TaskName> for String {
    fn from(value: TaskName) -> Self {
        value.0
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for TaskName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Identifies a workspace member: the root (`None`) or a named sub-package.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemberName(String);

/// The sentinel member name for the workspace root, mirroring
/// `turborepo-lib`'s `ROOT_PKG_NAME` (`"//"`).
pub const ROOT_MEMBER: &str = "//";

impl MemberName {
    pub fn root() -> Self {
        Self(ROOT_MEMBER.to_string())
    }

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn is_root(&self) -> bool {
        self.0 == ROOT_MEMBER
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemberName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Default for MemberName {
    fn default() -> Self {
        Self::root()
    }
}

/// A resolved matrix coordinate: one concrete value per axis, always kept
/// sorted by axis name so two coordinates with the same assignments compare
/// and display identically regardless of construction order (spec.md §4.5
/// rule 2: "a stable coordinate suffix").
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MatrixCoordinate(BTreeMap<String, String>);

impl MatrixCoordinate {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self(pairs.into_iter().collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn get(&self, axis: &str) -> Option<&str> {
        self.0.get(axis).map(String::as_str)
    }

    /// A stable, order-independent suffix such as `arch=amd64,os=linux`.
    pub fn suffix(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for MatrixCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.0.is_empty() {
            write!(f, "[{}]", self.suffix())?;
        }
        Ok(())
    }
}

/// The runtime identity of a Task Node: `(task name, matrix coordinate)`,
/// per spec.md §3.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskNodeId {
    pub task: TaskName,
    pub coordinate: MatrixCoordinate,
}

impl TaskNodeId {
    pub fn new(task: TaskName, coordinate: MatrixCoordinate) -> Self {
        Self { task, coordinate }
    }

    pub fn unexpanded(task: TaskName) -> Self {
        Self {
            task,
            coordinate: MatrixCoordinate::empty(),
        }
    }
}

impl fmt::Display for TaskNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.task, self.coordinate)
    }
}

#[cfg(test)]
mod test {
    use test_case::test_case;

    use super::*;

    #[test_case("build", true; "simple")]
    #[test_case("build-prod_v2.1", true; "punctuation")]
    #[test_case("", false; "empty")]
    #[test_case("has space", false; "space")]
    #[test_case("has/slash", false; "slash")]
    #[test_case(&"a".repeat(64), true; "max length")]
    #[test_case(&"a".repeat(65), false; "over max length")]
    fn validates_task_names(name: &str, valid: bool) {
        assert_eq!(TaskName::new(name).is_ok(), valid);
    }

    #[test]
    fn matrix_coordinate_is_order_independent() {
        let a = MatrixCoordinate::from_pairs([
            ("os".to_string(), "linux".to_string()),
            ("arch".to_string(), "amd64".to_string()),
        ]);
        let b = MatrixCoordinate::from_pairs([
            ("arch".to_string(), "amd64".to_string()),
            ("os".to_string(), "linux".to_string()),
        ]);
        assert_eq!(a, b);
        assert_eq!(a.suffix(), "arch=amd64,os=linux");
    }

    #[test]
    fn node_id_display_round_trips_unexpanded() {
        let id = TaskNodeId::unexpanded(TaskName::new("build").unwrap());
        assert_eq!(id.to_string(), "build");
    }

    #[test]
    fn node_id_display_includes_coordinate() {
        let id = TaskNodeId::new(
            TaskName::new("build").unwrap(),
            MatrixCoordinate::from_pairs([("os".to_string(), "linux".to_string())]),
        );
        assert_eq!(id.to_string(), "build[os=linux]");
    }
}
