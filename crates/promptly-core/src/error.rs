use thiserror::Error;

#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing credential: `{0}` is not set")]
    MissingCredential(String),

    #[error("Authentication rejected by {service}: {message}")]
    Auth { service: String, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed report: {0}")]
    MalformedReport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl SummaryError {
    /// True when the error should end the run as a credential problem
    /// rather than an analysis failure.
    pub fn is_credential(&self) -> bool {
        matches!(self, Self::MissingCredential(_) | Self::Auth { .. })
    }
}

pub type Result<T> = std::result::Result<T, SummaryError>;
