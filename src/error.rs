//! Error types for holeguard.

use thiserror::Error;

/// Error type for holeguard operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Feed answered with a non-success status
    #[error("HTTP error {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// Network-level failure talking to a feed
    #[error("transport error: {0}")]
    Transport(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Persistent storage failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Declarative rule engine rejected an update
    #[error("rule engine error: {0}")]
    RuleEngine(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for holeguard operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for a single action log line.
#[derive(Error, Debug)]
pub enum LogLineError {
    /// Line is not a JSON record of the expected shape
    #[error("malformed log record: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Action kind other than `block` or `unblock`
    #[error("unknown action type: {0}")]
    UnknownAction(String),
}

impl From<ureq::Error> for Error {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Status(status, response) => Error::HttpStatus {
                status,
                url: response.get_url().to_string(),
            },
            ureq::Error::Transport(t) => Error::Transport(t.to_string()),
        }
    }
}
