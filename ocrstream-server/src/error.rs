use thiserror::Error;
use tonic::Status;

/// Server-level faults: transport/startup failures that abort before a
/// per-image result can even be formed. Per-image failures (decode,
/// overloaded, engine errors) never reach this type — they are folded
/// into a successful RPC carrying `OcrResult { success: false, .. }`.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {0}")]
    Bind(String),

    #[error("startup aborted: {0}")]
    Startup(String),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error(transparent)]
    Pool(#[from] ocrstream_pool::PoolError),

    #[error(transparent)]
    Transport(#[from] tonic::transport::Error),
}

impl From<ServerError> for Status {
    fn from(err: ServerError) -> Self {
        Status::internal(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
