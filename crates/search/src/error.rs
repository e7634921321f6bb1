use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Path access denied: {}", .0.display())]
    AccessDenied(PathBuf),

    #[error("Invalid ignore pattern: {0}")]
    InvalidPattern(String),
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Empty query")]
    EmptyQuery,

    #[error("maxResults must be greater than zero")]
    InvalidMaxResults,

    #[error("Invalid regex: {0}")]
    InvalidPattern(String),

    #[error("Invalid glob: {0}")]
    InvalidGlob(String),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error("No search strategy could complete: {0}")]
    Exhausted(String),
}

/// Internal signal from a search strategy; the engine reacts by trying the next one.
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("{0}")]
    Unavailable(String),
}
