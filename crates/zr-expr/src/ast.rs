//! The expression AST. Kept deliberately small: the grammar in spec.md §4.2
//! has exactly two binary boolean operators, unary negation, equality, and a
//! handful of built-in calls, so one flat enum (rather than a family of
//! node-per-operator structs) keeps `eval.rs` a single straightforward match.

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    BoolLit(bool),
    StrLit(String),
    /// A dotted path lookup, e.g. `platform.os`, `env.CI`, `runtime.task`.
    Path(Vec<String>),
    Call {
        /// Dotted call target, e.g. `["file", "exists"]` for `file.exists(...)`.
        target: Vec<String>,
        args: Vec<Expr>,
    },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    NotEq(Box<Expr>, Box<Expr>),
    /// A string literal containing one or more `{{ expr }}` interpolations,
    /// e.g. `"build-{{ env.STAGE }}"`. Plain string literals with no `{{`
    /// parse as `StrLit` instead.
    Interpolated(Vec<InterpPart>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterpPart {
    Literal(String),
    Expr(Box<Expr>),
}
