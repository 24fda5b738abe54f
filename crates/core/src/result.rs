// crates/core/src/result.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HishoError {
    #[error("NLU error: {0}")]
    Nlu(String),

    #[error("Action error: {0}")]
    Action(String),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("{0}は利用できません")]
    Unavailable(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

pub type HishoResult<T> = Result<T, HishoError>;

/// Failures reported by an auth provider when a token is requested.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("not signed in")]
    Unauthenticated,
    #[error("access token expired")]
    Expired,
}
