use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("invalid image reference: {0:?}")]
    InvalidImage(String),
    #[error("invalid timestamp {value:?}: {reason}")]
    InvalidTimestamp { value: String, reason: String },
    #[error("invalid run definition: {0}")]
    InvalidRunDefinition(String),
    #[error("invalid worker registry: {0}")]
    InvalidRegistry(String),
    #[error("failed to parse {format}: {reason}")]
    Parse { format: &'static str, reason: String },
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ModelError {
    fn from(e: std::io::Error) -> Self {
        ModelError::Io(e.to_string())
    }
}

impl From<serde_yaml::Error> for ModelError {
    fn from(e: serde_yaml::Error) -> Self {
        ModelError::Parse {
            format: "yaml",
            reason: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(e: serde_json::Error) -> Self {
        ModelError::Parse {
            format: "json",
            reason: e.to_string(),
        }
    }
}
