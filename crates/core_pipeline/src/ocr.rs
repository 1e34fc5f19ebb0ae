//! Recognition and detection capabilities
//!
//! The solver never owns a model. It is handed objects implementing these
//! traits, built once by the caller and shared across calls, so tests can
//! substitute deterministic doubles.

use crate::types::BoundingBox;
use anyhow::Result;
use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Single-glyph recognizer
///
/// Returns its best guess for the text in `image`. Length is used as a
/// confidence signal by the voting engine: only a one-character answer
/// counts.
pub trait Recognizer: Send + Sync {
    fn recognize(&self, image: &DynamicImage) -> Result<String>;
}

/// Locator of glyph-like shapes in the click area
///
/// Boxes are in the coordinates of `image`. Order is significant: the solver
/// keeps the first four.
pub trait RegionDetector: Send + Sync {
    fn detect(&self, image: &RgbImage) -> Result<Vec<BoundingBox>>;
}

/// Which differently tuned recognizer a variant is sent to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineFamily {
    /// Tuned for cleanly rendered glyphs; also reads the title band
    Primary,
    /// General-purpose second opinion
    Secondary,
}

impl EngineFamily {
    pub const ALL: [EngineFamily; 2] = [EngineFamily::Primary, EngineFamily::Secondary];
}

/// The two recognizer families, shared between solver instances
#[derive(Clone)]
pub struct RecognizerSet {
    primary: Arc<dyn Recognizer>,
    secondary: Arc<dyn Recognizer>,
}

impl RecognizerSet {
    pub fn new(primary: Arc<dyn Recognizer>, secondary: Arc<dyn Recognizer>) -> Self {
        Self { primary, secondary }
    }

    pub fn get(&self, family: EngineFamily) -> &dyn Recognizer {
        match family {
            EngineFamily::Primary => self.primary.as_ref(),
            EngineFamily::Secondary => self.secondary.as_ref(),
        }
    }
}

impl std::fmt::Debug for RecognizerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognizerSet").finish_non_exhaustive()
    }
}

impl<F> Recognizer for F
where
    F: Fn(&DynamicImage) -> Result<String> + Send + Sync,
{
    fn recognize(&self, image: &DynamicImage) -> Result<String> {
        self(image)
    }
}
