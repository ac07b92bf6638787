/// Fixed recognition configuration applied to every image a worker processes.
///
/// Built once when a worker starts and handed to [`crate::RecognitionEngine::init`];
/// it does not vary per-request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionProfile {
    /// Tesseract language tag, e.g. `"eng"`, `"eng+fra"`.
    pub language: String,
    /// Tesseract page segmentation mode (`--psm`).
    pub page_segmentation_mode: PageSegmentationMode,
    /// Restrict recognition to this character set when set.
    pub char_whitelist: Option<String>,
}

impl Default for RecognitionProfile {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            page_segmentation_mode: PageSegmentationMode::Auto,
            char_whitelist: None,
        }
    }
}

/// Subset of Tesseract's `--psm` values relevant to a streaming OCR workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSegmentationMode {
    /// psm 3: fully automatic page segmentation, no orientation detection.
    Auto,
    /// psm 6: assume a single uniform block of text.
    SingleBlock,
    /// psm 7: treat the image as a single text line.
    SingleLine,
    /// psm 11: sparse text, find as much as possible in no particular order.
    SparseText,
}

impl PageSegmentationMode {
    pub fn as_psm_value(self) -> i32 {
        match self {
            PageSegmentationMode::Auto => 3,
            PageSegmentationMode::SingleBlock => 6,
            PageSegmentationMode::SingleLine => 7,
            PageSegmentationMode::SparseText => 11,
        }
    }
}
