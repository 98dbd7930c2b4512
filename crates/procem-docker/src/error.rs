use procem_core::EngineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DockerError {
    #[error("http request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("engine answered {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid engine response: {0}")]
    InvalidResponse(String),

    #[error("engine client is closed")]
    Closed,
}

impl From<DockerError> for EngineError {
    fn from(e: DockerError) -> Self {
        match e {
            DockerError::Status { status: 404, message } => EngineError::NotFound(message),
            DockerError::Status { status: 409, message } => EngineError::Conflict(message),
            DockerError::Status { status, message } => {
                EngineError::Rejected(format!("{status}: {message}"))
            }
            DockerError::HttpRequest(e) => EngineError::Transport(e.to_string()),
            DockerError::InvalidResponse(msg) => EngineError::Rejected(msg),
            DockerError::Closed => EngineError::Closed,
        }
    }
}
