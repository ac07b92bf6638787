use thiserror::Error;

/// Failure modes surfaced by the pool.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("worker pool is shutting down, task rejected")]
    ShuttingDown,

    #[error("no worker could initialize its OCR engine")]
    AllWorkersFailedToInit,
}

pub type Result<T> = std::result::Result<T, PoolError>;
