use thiserror::Error;

/// Failure modes of a single recognition call or engine lifecycle step.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("tesseract initialization failed: {0}")]
    Init(String),

    #[error("tesseract recognition failed: {0}")]
    Recognition(String),

    #[error("recognition profile rejected: {0}")]
    InvalidProfile(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
