//! Provider geometry
//!
//! The click area, title slots and abnormality probe are empirical constants
//! of one provider's rendering. They live here as data so a template change
//! on the provider side is a config edit.

use crate::types::BoundingBox;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptchaTemplate {
    /// Region holding the candidate glyphs, in full-image coordinates
    pub click_area: BoundingBox,
    /// Vertical extent of the title band `[top, bottom)`
    pub title_band: (u32, u32),
    /// Horizontal `[x1, x2)` ranges of the four title glyphs
    pub title_slots: Vec<(u32, u32)>,
    /// Pixel that is near-black only on the provider's error placeholder
    pub probe: (u32, u32),
    /// All channels below this => abnormal
    pub abnormal_below: u8,
    /// All channels above this => normal
    pub normal_above: u8,
    /// Ratio applied to `y` when encoding a submission
    pub submit_y_scale: (u32, u32),
}

impl Default for CaptchaTemplate {
    fn default() -> Self {
        Self {
            click_area: BoundingBox::new(0, 0, 250, 100),
            title_band: (100, 120),
            title_slots: vec![(118, 138), (140, 160), (162, 182), (185, 205)],
            probe: (218, 110),
            abnormal_below: 50,
            normal_above: 200,
            submit_y_scale: (5, 6),
        }
    }
}

impl CaptchaTemplate {
    /// Boxes of the title glyphs in full-image coordinates, in click order
    pub fn title_boxes(&self) -> Vec<BoundingBox> {
        let (top, bottom) = self.title_band;
        self.title_slots
            .iter()
            .map(|&(x1, x2)| BoundingBox::new(x1, top, x2, bottom))
            .collect()
    }

    /// Smallest image size that contains every region the template reads
    pub fn required_size(&self) -> (u32, u32) {
        let mut width = self.click_area.x2.max(self.probe.0 + 1);
        let mut height = self.click_area.y2.max(self.probe.1 + 1);
        for b in self.title_boxes() {
            width = width.max(b.x2);
            height = height.max(b.y2);
        }
        (width, height)
    }
}
