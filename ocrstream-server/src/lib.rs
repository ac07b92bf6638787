//! gRPC host (C5) and stream session (C4) for the OCR service: wires the
//! engine adapter and worker pool crates to a `tonic` transport, with
//! layered configuration, signal-driven graceful shutdown, and panic
//! logging.

pub mod cli;
pub mod config;
pub mod error;
pub mod grpc;
pub mod server;

pub use error::{Result, ServerError};
