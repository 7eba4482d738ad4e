//! `zr validate [--strict] [--schema]`, per spec.md §4.1 / §6.

use serde::Serialize;

use crate::cli::ValidateArgs;
use crate::config::{self, ConfigOverrides, ValidationWarning, SCHEMA};
use crate::context::CommandContext;
use crate::error::CliError;
use crate::format::{self, Render};

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub warnings: Vec<String>,
}

impl Render for ValidationReport {
    fn render_text(&self) -> String {
        if self.warnings.is_empty() {
            return "configuration is valid".to_string();
        }
        let mut lines = vec!["configuration is valid, with warnings:".to_string()];
        lines.extend(self.warnings.iter().map(|w| format!("  - {w}")));
        lines.join("\n")
    }
}

fn describe(warning: &ValidationWarning) -> String {
    match warning {
        ValidationWarning::MissingDescription(task) => format!("task {task:?} has no description"),
        ValidationWarning::ExplicitEmptyDeps(task) => {
            format!("task {task:?} declares an empty `deps = []`, which is redundant")
        }
        ValidationWarning::UnknownField { task, field } => {
            format!("task {task:?} sets unrecognized field {field:?}")
        }
    }
}

/// `--schema` takes priority over actually validating: it's a reference
/// lookup, not an operation against the current workspace's `zr.toml`.
pub async fn validate(ctx: &CommandContext, args: &ValidateArgs) -> Result<(), CliError> {
    if args.schema {
        println!("{SCHEMA}");
        return Ok(());
    }

    let (_config, warnings) = config::load_with_warnings(
        &ctx.root,
        &ctx.cwd,
        None,
        &ConfigOverrides::default(),
        args.strict,
    )?;

    let report = ValidationReport {
        valid: true,
        warnings: warnings.iter().map(describe).collect(),
    };
    println!("{}", format::render(&report, ctx.format)?);
    Ok(())
}
