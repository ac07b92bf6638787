//! Generated wire types for the ocrstream gRPC service.
//!
//! `pb` re-exports the `tonic`/`prost` output of `proto/ocr.proto`:
//! `ImageRequest`, `OcrResult`, and the `ocr_service_server`/
//! `ocr_service_client` modules.

pub mod pb {
    tonic::include_proto!("ocrstream");
}

pub use pb::{
    ocr_service_client::OcrServiceClient,
    ocr_service_server::{OcrService, OcrServiceServer},
    ImageRequest, OcrResult,
};
