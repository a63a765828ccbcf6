use std::path::PathBuf;

/// Failures while loading or validating [`crate::EngineConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Caller-visible engine failures.
///
/// Collaborator failures never surface here: a failed probe or repair is a
/// skipped pass, and missing evidence is a normal outcome.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("query was cancelled")]
    Cancelled,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
