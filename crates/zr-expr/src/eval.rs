//! Evaluates an `Expr` against a `Context`, implementing spec.md §4.2's
//! built-ins: `file.exists`, `file.changed`, `file.newer`, `file.hash`,
//! `semver.gt`, and `shell`.

use std::path::Path;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::ast::{Expr, InterpPart};
use crate::context::Context;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Str(String),
}

impl Value {
    pub fn truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Str(s) => !s.is_empty(),
        }
    }

    pub fn as_str(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Str(s) => s.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("unknown path '{0}'")]
    UnknownPath(String),
    #[error("unknown function '{0}'")]
    UnknownFunction(String),
    #[error("'{0}' expects {1} argument(s), got {2}")]
    ArityMismatch(String, usize, usize),
}

pub fn eval(expr: &Expr, ctx: &Context) -> Result<Value, EvalError> {
    match expr {
        Expr::BoolLit(b) => Ok(Value::Bool(*b)),
        Expr::StrLit(s) => Ok(Value::Str(s.clone())),
        Expr::Path(segments) => eval_path(segments, ctx),
        Expr::Call { target, args } => eval_call(target, args, ctx),
        Expr::Not(inner) => Ok(Value::Bool(!eval(inner, ctx)?.truthy())),
        Expr::And(lhs, rhs) => {
            Ok(Value::Bool(eval(lhs, ctx)?.truthy() && eval(rhs, ctx)?.truthy()))
        }
        Expr::Or(lhs, rhs) => {
            Ok(Value::Bool(eval(lhs, ctx)?.truthy() || eval(rhs, ctx)?.truthy()))
        }
        Expr::Eq(lhs, rhs) => Ok(Value::Bool(
            eval(lhs, ctx)?.as_str() == eval(rhs, ctx)?.as_str(),
        )),
        Expr::NotEq(lhs, rhs) => Ok(Value::Bool(
            eval(lhs, ctx)?.as_str() != eval(rhs, ctx)?.as_str(),
        )),
        Expr::Interpolated(parts) => {
            let mut out = String::new();
            for part in parts {
                match part {
                    InterpPart::Literal(s) => out.push_str(s),
                    InterpPart::Expr(e) => out.push_str(&eval(e, ctx)?.as_str()),
                }
            }
            Ok(Value::Str(out))
        }
    }
}

fn eval_path(segments: &[String], ctx: &Context) -> Result<Value, EvalError> {
    let joined = || segments.join(".");
    match segments.first().map(String::as_str) {
        Some("platform") => match segments.get(1).map(String::as_str) {
            Some("os") => Ok(Value::Str(ctx.platform.os.clone())),
            Some("arch") => Ok(Value::Str(ctx.platform.arch.clone())),
            Some("is_linux") => Ok(Value::Bool(ctx.platform.is_linux())),
            Some("is_macos") => Ok(Value::Bool(ctx.platform.is_macos())),
            Some("is_windows") => Ok(Value::Bool(ctx.platform.is_windows())),
            _ => Err(EvalError::UnknownPath(joined())),
        },
        Some("env") => {
            let name = segments.get(1).ok_or_else(|| EvalError::UnknownPath(joined()))?;
            Ok(Value::Str(ctx.env.get(name).cloned().unwrap_or_default()))
        }
        Some("runtime") => match segments.get(1).map(String::as_str) {
            Some("task") => Ok(Value::Str(ctx.runtime.task.clone())),
            Some("hash") => Ok(Value::Str(ctx.runtime.hash.clone().unwrap_or_default())),
            Some("iteration") => {
                Ok(Value::Str(ctx.runtime.iteration.clone().unwrap_or_default()))
            }
            _ => Err(EvalError::UnknownPath(joined())),
        },
        _ => Err(EvalError::UnknownPath(joined())),
    }
}

fn eval_call(target: &[String], args: &[Expr], ctx: &Context) -> Result<Value, EvalError> {
    let name = target.join(".");
    let values = args
        .iter()
        .map(|a| eval(a, ctx))
        .collect::<Result<Vec<_>, _>>()?;

    match name.as_str() {
        "file.exists" => {
            let path = expect_one_str(&name, &values)?;
            Ok(Value::Bool(Path::new(&path).exists()))
        }
        "file.changed" => {
            let path = expect_one_str(&name, &values)?;
            let changed = ctx
                .changed_paths
                .as_ref()
                .map(|set| set.contains(Path::new(&path)))
                .unwrap_or(false);
            Ok(Value::Bool(changed))
        }
        "file.newer" => {
            if values.len() != 2 {
                return Err(EvalError::ArityMismatch(name, 2, values.len()));
            }
            let a = mtime(&values[0].as_str());
            let b = mtime(&values[1].as_str());
            Ok(Value::Bool(match (a, b) {
                (Some(a), Some(b)) => a > b,
                (Some(_), None) => true,
                _ => false,
            }))
        }
        "file.hash" => {
            let path = expect_one_str(&name, &values)?;
            match std::fs::read(&path) {
                Ok(bytes) => {
                    let mut hasher = Sha256::new();
                    hasher.update(&bytes);
                    Ok(Value::Str(hex::encode(hasher.finalize())))
                }
                Err(_) => Ok(Value::Str(String::new())),
            }
        }
        "semver.gt" => {
            if values.len() != 2 {
                return Err(EvalError::ArityMismatch(name, 2, values.len()));
            }
            let a = semver::Version::parse(values[0].as_str().trim_start_matches('v'));
            let b = semver::Version::parse(values[1].as_str().trim_start_matches('v'));
            Ok(Value::Bool(matches!((a, b), (Ok(a), Ok(b)) if a > b)))
        }
        "shell" => {
            let cmd = expect_one_str(&name, &values)?;
            Ok(Value::Str(ctx.shell(&cmd)))
        }
        other => Err(EvalError::UnknownFunction(other.to_string())),
    }
}

fn expect_one_str(name: &str, values: &[Value]) -> Result<String, EvalError> {
    if values.len() != 1 {
        return Err(EvalError::ArityMismatch(name.to_string(), 1, values.len()));
    }
    Ok(values[0].as_str())
}

fn mtime(path: &str) -> Option<std::time::SystemTime> {
    std::fs::metadata(path).ok()?.modified().ok()
}
