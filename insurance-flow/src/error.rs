use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Document extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Policy generation failed: {0}")]
    PolicyGenerationFailed(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Assistant failed: {0}")]
    AssistantFailed(String),

    #[error("Invalid session state: {0}")]
    InvalidState(String),
}

impl From<sqlx::Error> for FlowError {
    fn from(err: sqlx::Error) -> Self {
        FlowError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
