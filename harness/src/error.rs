use fixtures::FixtureError;
use std::path::PathBuf;
use style::StyleError;
use thiserror::Error;

/// Errors that stop a harness command
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Invalid test selection '{input}': {reason}")]
    InvalidSelection { input: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse config file '{}': {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to launch '{program}': {source}. Is it built and on the expected path?")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot save run outputs to '{}': {reason}", path.display())]
    SaveFailed { path: PathBuf, reason: String },

    #[error("Fixture error: {0}")]
    Fixture(#[from] FixtureError),

    #[error("Style check error: {0}")]
    Style(#[from] StyleError),

    #[error("Glob pattern error: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type HarnessResult<T> = Result<T, HarnessError>;
