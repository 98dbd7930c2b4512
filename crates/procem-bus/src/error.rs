use procem_core::PublishError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BusError {
    #[error("http request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("invalid management url: {0}")]
    InvalidUrl(String),

    #[error("broker answered {status}: {message}")]
    Status { status: u16, message: String },

    #[error("payload is not valid UTF-8")]
    Payload,

    #[error("bus client is closed")]
    Closed,
}

impl From<BusError> for PublishError {
    fn from(e: BusError) -> Self {
        match e {
            BusError::HttpRequest(e) => PublishError::Transport(e.to_string()),
            BusError::Closed => PublishError::Closed,
            other => PublishError::Rejected(other.to_string()),
        }
    }
}
