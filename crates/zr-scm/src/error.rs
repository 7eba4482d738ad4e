use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScmError {
    #[error("{0} is not inside a git repository")]
    NotVcsRepo(String),
    #[error("unknown ref '{0}'")]
    RefUnknown(String),
    #[error("git error: {0}")]
    Git(#[from] git2::Error),
}
