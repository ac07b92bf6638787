//! OCR engine adapter (C1): a small, non-reentrant contract around a
//! third-party recognizer, plus the deterministic pre/post-processing
//! pipelines that make its output reproducible.
//!
//! Callers must serialize calls to one [`RecognitionEngine`] instance; the
//! pool crate enforces this by pinning exactly one engine per worker
//! thread and never sharing it.

mod error;
mod postprocessing;
mod preprocessing;
mod profile;
mod tesseract_engine;

pub use error::{EngineError, Result};
pub use profile::{PageSegmentationMode, RecognitionProfile};
pub use tesseract_engine::{RecognitionEngine, TesseractEngine};
