//! The single rendering capability every read-only command funnels its
//! output through (Design Note §9: "the `--format {text,json,yaml,toml}`
//! surface is best served by a single rendering capability consumed by all
//! read-only commands, not one-off formatters inside each command").
//!
//! A command builds whatever `Serialize` value best represents its result
//! and additionally implements [`Render::render_text`] for the human-facing
//! default; [`render`] picks the serializer for `--format json|yaml|toml`
//! and falls back to the text rendering otherwise.

use clap::ValueEnum;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
#[clap(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Yaml,
    Toml,
}

/// Implemented by every command's result type so [`render`] can produce its
/// human-facing form without each command hand-rolling its own `--format`
/// dispatch.
pub trait Render {
    fn render_text(&self) -> String;
}

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("failed to serialize output as JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to serialize output as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to serialize output as TOML: {0}")]
    Toml(#[from] toml::ser::Error),
}

pub fn render<T: Render + Serialize>(value: &T, format: OutputFormat) -> Result<String, FormatError> {
    Ok(match format {
        OutputFormat::Text => value.render_text(),
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
        OutputFormat::Toml => toml::to_string_pretty(value)?,
    })
}

#[cfg(test)]
mod test {
    use serde::Serialize;

    use super::*;

    #[derive(Serialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    impl Render for Sample {
        fn render_text(&self) -> String {
            format!("{}: {}", self.name, self.count)
        }
    }

    #[test]
    fn text_uses_render_text() {
        let sample = Sample { name: "a".to_string(), count: 1 };
        assert_eq!(render(&sample, OutputFormat::Text).unwrap(), "a: 1");
    }

    #[test]
    fn json_round_trips_fields() {
        let sample = Sample { name: "a".to_string(), count: 1 };
        let out = render(&sample, OutputFormat::Json).unwrap();
        assert!(out.contains("\"name\""));
        assert!(out.contains("\"count\""));
    }

    #[test]
    fn yaml_round_trips_fields() {
        let sample = Sample { name: "a".to_string(), count: 1 };
        let out = render(&sample, OutputFormat::Yaml).unwrap();
        assert!(out.contains("name: a"));
    }
}
