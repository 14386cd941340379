use thiserror::Error;

pub type Result<T> = std::result::Result<T, HarvestError>;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("inbox list never became ready: {0}")]
    SourceUnavailable(String),

    #[error("viewport error: {0}")]
    Viewport(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("store error (status {status}): {message}")]
    Store { status: u16, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for HarvestError {
    fn from(err: reqwest::Error) -> Self {
        HarvestError::Network(err.to_string())
    }
}

impl From<url::ParseError> for HarvestError {
    fn from(err: url::ParseError) -> Self {
        HarvestError::Config(format!("bad store url: {err}"))
    }
}
