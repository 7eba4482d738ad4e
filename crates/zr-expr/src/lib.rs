//! The boolean/string expression language used for task `when` conditions,
//! `env` value interpolation, and cache input expressions (spec.md §4.2).
//!
//! Grammar: `==`, `!=`, `&&`, `||`, `!`, parenthesization, dotted-path
//! lookups (`platform.os`, `env.NAME`, `runtime.task`), built-in calls
//! (`file.exists`, `file.changed`, `file.newer`, `file.hash`, `semver.gt`,
//! `shell`), and `"{{ expr }}"` string interpolation.

mod ast;
mod context;
mod eval;
mod lexer;
mod parser;

pub use ast::Expr;
pub use context::{Context, Platform, Runtime};
pub use eval::{EvalError, Value};
pub use parser::InvalidExpression;

/// Parses and evaluates a bare boolean/comparison expression in one step.
/// Used for `when` conditions, where the only thing callers need is the
/// final truthiness.
pub fn eval_condition(src: &str, ctx: &Context) -> Result<bool, ExprError> {
    let expr = parser::parse(src)?;
    Ok(eval::eval(&expr, ctx)?.truthy())
}

/// Parses and evaluates a `"{{ expr }}"` interpolation string, returning the
/// substituted text. Used for `env` values and other string fields that
/// allow interpolation.
pub fn eval_interpolated(src: &str, ctx: &Context) -> Result<String, ExprError> {
    let expr = parser::parse_interpolated(src)?;
    Ok(eval::eval(&expr, ctx)?.as_str())
}

#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ExprError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parse(#[from] InvalidExpression),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn eval_condition_roundtrips_through_public_api() {
        let mut env = HashMap::new();
        env.insert("CI".to_string(), "true".to_string());
        let ctx = Context::new(env, Runtime::default());
        assert!(eval_condition(r#"env.CI == "true""#, &ctx).unwrap());
    }

    #[test]
    fn eval_interpolated_substitutes_values() {
        let mut env = HashMap::new();
        env.insert("NAME".to_string(), "world".to_string());
        let ctx = Context::new(env, Runtime::default());
        assert_eq!(
            eval_interpolated("hello {{ env.NAME }}", &ctx).unwrap(),
            "hello world"
        );
    }

    #[test]
    fn malformed_condition_surfaces_as_expr_error() {
        let ctx = Context::new(HashMap::new(), Runtime::default());
        assert!(eval_condition("a ==", &ctx).is_err());
    }
}
