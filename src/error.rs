use thiserror::Error;

/// Custom error type for Tanya operations.
///
/// Errors never cross the conversational boundary: the engine converts them
/// into lower-confidence or fallback envelopes. They surface only from the
/// caller-facing plumbing (configuration, knowledge loading, session files).
#[derive(Debug, Error)]
pub enum TanyaError {
    /// Knowledge base could not be loaded or indexed.
    #[error("Knowledge base error: {0}")]
    KnowledgeBase(String),

    /// Configuration file or environment override was invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input validation failed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Session state could not be read, written, or committed.
    #[error("Session error: {0}")]
    Session(String),

    /// A turn result arrived after a newer turn had already started.
    #[error("Stale turn {turn_id}: latest turn is {latest}")]
    StaleTurn { turn_id: u64, latest: u64 },
}

impl From<serde_json::Error> for TanyaError {
    fn from(err: serde_json::Error) -> Self {
        TanyaError::Session(format!("JSON serialization error: {}", err))
    }
}

impl From<std::io::Error> for TanyaError {
    fn from(err: std::io::Error) -> Self {
        TanyaError::Session(format!("I/O error: {}", err))
    }
}

impl From<toml::de::Error> for TanyaError {
    fn from(err: toml::de::Error) -> Self {
        TanyaError::Config(format!("TOML parse error: {}", err))
    }
}

impl From<serde_yaml_ng::Error> for TanyaError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        TanyaError::KnowledgeBase(format!("YAML parse error: {}", err))
    }
}
