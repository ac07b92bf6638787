use image::ImageFormat;
use tesseract::Tesseract;
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::postprocessing::postprocess;
use crate::preprocessing::preprocess;
use crate::profile::RecognitionProfile;

/// Seam between the pool and whatever OCR library a worker is bound to.
///
/// Not reentrant: implementors retain state between calls and callers must
/// serialize access to one instance (the pool enforces this by construction,
/// pinning exactly one engine per worker thread).
pub trait RecognitionEngine {
    /// Prepares the engine for the given profile. Called once before any
    /// `recognize` call.
    fn init(&mut self, profile: &RecognitionProfile) -> Result<()>;

    /// Decodes `bytes`, runs the preprocessing pipeline, recognizes text,
    /// and applies post-processing. Decode failures and genuine recognizer
    /// failures are returned as `Err`; "no text found" is `Ok(String::new())`,
    /// since the recognizer itself succeeded.
    fn recognize(&mut self, bytes: &[u8]) -> Result<String>;

    /// Tears down and rebuilds the underlying engine in place, reclaiming
    /// any memory the recognizer has leaked over many calls.
    fn reinit(&mut self) -> Result<()>;
}

/// Production [`RecognitionEngine`] backed by the `tesseract` crate
/// (Leptonica/Tesseract FFI bindings).
pub struct TesseractEngine {
    inner: Option<Tesseract>,
    profile: RecognitionProfile,
}

impl TesseractEngine {
    pub fn new() -> Self {
        Self {
            inner: None,
            profile: RecognitionProfile::default(),
        }
    }

    fn build(profile: &RecognitionProfile) -> Result<Tesseract> {
        let mut tess = Tesseract::new(None, Some(&profile.language))
            .map_err(|e| EngineError::Init(e.to_string()))?;

        tess = tess
            .set_variable("tessedit_pageseg_mode", &profile.page_segmentation_mode.as_psm_value().to_string())
            .map_err(|e| EngineError::Init(e.to_string()))?;

        if let Some(whitelist) = &profile.char_whitelist {
            tess = tess
                .set_variable("tessedit_char_whitelist", whitelist)
                .map_err(|e| EngineError::Init(e.to_string()))?;
        }

        Ok(tess)
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RecognitionEngine for TesseractEngine {
    fn init(&mut self, profile: &RecognitionProfile) -> Result<()> {
        let tess = Self::build(profile)?;
        self.inner = Some(tess);
        self.profile = profile.clone();
        Ok(())
    }

    fn recognize(&mut self, bytes: &[u8]) -> Result<String> {
        let decoded = match image::load_from_memory(bytes) {
            Ok(img) => img,
            Err(e) => {
                debug!(error = %e, "image decode failed");
                return Err(EngineError::Decode("decode failed".to_string()));
            }
        };

        let processed = preprocess(&decoded);

        let mut png_bytes: Vec<u8> = Vec::new();
        {
            use std::io::Cursor;
            processed
                .write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)
                .map_err(|e| EngineError::Decode(format!("re-encode failed: {e}")))?;
        }

        let tess = self
            .inner
            .take()
            .ok_or_else(|| EngineError::Init("engine not initialized".to_string()))?;
        let tess = match tess.set_image_from_mem(&png_bytes) {
            Ok(tess) => tess,
            Err(e) => {
                // Rebuild before returning: leaving `self.inner` empty would
                // make every subsequent call fail with "engine not
                // initialized" instead of just this one recognition.
                self.inner = Some(Self::build(&self.profile)?);
                return Err(EngineError::Recognition(e.to_string()));
            }
        };

        let raw_text = match tess.get_text() {
            Ok(text) => text,
            Err(e) => {
                // A genuine recognizer failure, not "no text found" — Tesseract
                // reports an empty page as `Ok("")`, so `Err` here means the
                // underlying call itself broke.
                warn!(error = %e, "tesseract recognition call failed");
                self.inner = Some(Self::build(&self.profile)?);
                return Err(EngineError::Recognition(e.to_string()));
            }
        };

        self.inner = Some(tess);

        Ok(postprocess(&raw_text))
    }

    fn reinit(&mut self) -> Result<()> {
        let tess = Self::build(&self.profile)?;
        self.inner = Some(tess);
        Ok(())
    }
}
