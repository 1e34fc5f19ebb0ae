//! Tesseract recognizers
//!
//! Glyph recognition using Tesseract (via leptess). Two page segmentation
//! modes give the two differently tuned families the voting engine needs:
//! single character for the primary, single word for the secondary.

use anyhow::{Context, Result};
use core_pipeline::Recognizer;
use image::DynamicImage;
use leptess::{LepTess, Variable};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::debug;

/// Tesseract page segmentation mode: treat the image as a single word
pub const PSM_SINGLE_WORD: u8 = 8;
/// Tesseract page segmentation mode: treat the image as a single character
pub const PSM_SINGLE_CHAR: u8 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TesseractConfig {
    /// Directory holding `tessdata`; `None` uses Tesseract's default lookup
    pub datapath: Option<String>,
    /// Traineddata name, e.g. `chi_sim`
    pub language: String,
    pub page_seg_mode: u8,
    /// Restrict output to these characters
    pub whitelist: Option<String>,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            datapath: None,
            language: "chi_sim".to_string(),
            page_seg_mode: PSM_SINGLE_CHAR,
            whitelist: None,
        }
    }
}

/// Which traineddata a handle was initialised with
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ModelKey {
    datapath: Option<String>,
    language: String,
}

thread_local! {
    /// Initialised Tesseract handles owned by the current worker thread
    static ENGINES: RefCell<HashMap<ModelKey, LepTess>> = RefCell::new(HashMap::new());
}

/// Recognizer backed by per-thread Tesseract handles
///
/// Each worker thread loads a model once and reuses it; only the page
/// segmentation mode, the whitelist and the image change per call. The
/// recognizer itself is plain configuration, so it can be shared with the
/// parallel voting engine.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    config: TesseractConfig,
}

impl TesseractRecognizer {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    pub fn single_char(datapath: Option<String>, language: &str) -> Self {
        Self::new(TesseractConfig {
            datapath,
            language: language.to_string(),
            page_seg_mode: PSM_SINGLE_CHAR,
            whitelist: None,
        })
    }

    pub fn single_word(datapath: Option<String>, language: &str) -> Self {
        Self::new(TesseractConfig {
            datapath,
            language: language.to_string(),
            page_seg_mode: PSM_SINGLE_WORD,
            whitelist: None,
        })
    }

    pub fn config(&self) -> &TesseractConfig {
        &self.config
    }

    fn model_key(&self) -> ModelKey {
        ModelKey {
            datapath: self.config.datapath.clone(),
            language: self.config.language.clone(),
        }
    }

    /// Run `f` on this thread's handle for the configured model
    fn with_engine<T>(&self, f: impl FnOnce(&mut LepTess) -> Result<T>) -> Result<T> {
        ENGINES.with(|engines| {
            let mut engines = engines.borrow_mut();
            let engine = match engines.entry(self.model_key()) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    debug!(language = %self.config.language, "loading Tesseract model");
                    let tesseract =
                        LepTess::new(self.config.datapath.as_deref(), &self.config.language)
                            .context("Failed to initialize Tesseract. Is Tesseract installed?")?;
                    entry.insert(tesseract)
                }
            };
            f(engine)
        })
    }
}

/// Number of models loaded on the calling thread
#[cfg(test)]
fn loaded_models() -> usize {
    ENGINES.with(|engines| engines.borrow().len())
}

impl Recognizer for TesseractRecognizer {
    fn recognize(&self, image: &DynamicImage) -> Result<String> {
        // leptess reads encoded images, not raw buffers
        let mut png_bytes = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut png_bytes);
        image
            .write_to(&mut cursor, image::ImageFormat::Png)
            .context("Failed to encode image as PNG")?;

        self.with_engine(|tesseract| {
            tesseract
                .set_variable(
                    Variable::TesseditPagesegMode,
                    &self.config.page_seg_mode.to_string(),
                )
                .map_err(|e| anyhow::anyhow!("Failed to set page segmentation mode: {:?}", e))?;
            // handles are shared across configs, so an unset whitelist is reset
            let whitelist = self.config.whitelist.as_deref().unwrap_or("");
            tesseract
                .set_variable(Variable::TesseditCharWhitelist, whitelist)
                .map_err(|e| anyhow::anyhow!("Failed to set character whitelist: {:?}", e))?;

            tesseract
                .set_image_from_mem(&png_bytes)
                .context("Failed to load image into Tesseract")?;

            let text = tesseract
                .get_utf8_text()
                .context("Failed to extract text from image")?;

            Ok(clean_text(&text))
        })
    }
}

/// Drop the whitespace Tesseract pads its output with
pub fn clean_text(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}
