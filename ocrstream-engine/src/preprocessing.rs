//! Deterministic image preprocessing applied before a frame reaches the
//! recognizer. Every step here is pure and depends only on the decoded
//! pixels, so two workers given the same bytes produce the same input to
//! Tesseract.

use image::{imageops, DynamicImage, GrayImage};
use imageproc::contrast::threshold;
use imageproc::filter::median_filter;

/// Images smaller than this on either edge skip denoising: the median filter
/// blurs detail out of already-small glyphs more than it removes noise.
const DENOISE_MIN_DIMENSION: u32 = 100;

const MEDIAN_FILTER_RADIUS: u32 = 1;

/// Midpoint binarization threshold, applied after grayscale + denoise.
const BINARY_THRESHOLD: u8 = 128;

/// Converts to grayscale, denoises when large enough, then binarizes.
pub fn preprocess(image: &DynamicImage) -> GrayImage {
    let gray = imageops::grayscale(image);

    let denoised = if gray.width() >= DENOISE_MIN_DIMENSION && gray.height() >= DENOISE_MIN_DIMENSION {
        median_filter(&gray, MEDIAN_FILTER_RADIUS, MEDIAN_FILTER_RADIUS)
    } else {
        gray
    };

    threshold(&denoised, BINARY_THRESHOLD)
}
