//! Model bindings for glyphclick
//!
//! Concrete [`Recognizer`](core_pipeline::Recognizer) and
//! [`RegionDetector`](core_pipeline::RegionDetector) implementations:
//! Tesseract for glyph recognition and a connected-component detector for
//! candidate regions.

pub mod components;
pub mod tesseract;

pub use components::{ComponentDetector, ComponentDetectorConfig};
pub use tesseract::{TesseractConfig, TesseractRecognizer};

use core_pipeline::RecognizerSet;
use std::sync::Arc;

/// Both recognizer families backed by the same Tesseract language data
pub fn tesseract_recognizers(datapath: Option<String>, language: &str) -> RecognizerSet {
    RecognizerSet::new(
        Arc::new(TesseractRecognizer::single_char(datapath.clone(), language)),
        Arc::new(TesseractRecognizer::single_word(datapath, language)),
    )
}
