//! Decoder module for challenge payloads
//!
//! Handles:
//! - base64 payloads, with or without a `data:` URL prefix
//! - any raster container the `image` crate reads (GIF, PNG, JPEG)
//! - cropping the template regions out of the decoded bitmap
//! - the probe-pixel abnormality check

use crate::error::{Result, SolveError};
use crate::template::CaptchaTemplate;
use crate::types::BoundingBox;
use base64::{engine::general_purpose, Engine as _};
use image::{imageops, RgbImage};
use tracing::debug;

/// Decoded challenge with its two working crops
#[derive(Debug, Clone)]
pub struct CaptchaImage {
    full: RgbImage,
    click_area: RgbImage,
    title_band: RgbImage,
}

impl CaptchaImage {
    /// Decode a base64 payload against `template`
    pub fn from_base64(payload: &str, template: &CaptchaTemplate) -> Result<Self> {
        let bytes = decode_base64(payload)?;
        Self::from_bytes(&bytes, template)
    }

    /// Decode encoded image bytes against `template`
    pub fn from_bytes(bytes: &[u8], template: &CaptchaTemplate) -> Result<Self> {
        let image =
            image::load_from_memory(bytes).map_err(|e| SolveError::Decode(e.to_string()))?;
        Self::from_rgb(image.to_rgb8(), template)
    }

    /// Wrap an already decoded bitmap
    pub fn from_rgb(full: RgbImage, template: &CaptchaTemplate) -> Result<Self> {
        let (width, height) = full.dimensions();
        let (need_w, need_h) = template.required_size();
        if width < need_w || height < need_h {
            return Err(SolveError::TemplateMismatch { width, height });
        }

        let click_area = crop(&full, &template.click_area);
        let (top, bottom) = template.title_band;
        let title_band = crop(&full, &BoundingBox::new(0, top, width, bottom));
        debug!(width, height, "decoded challenge image");

        Ok(Self {
            full,
            click_area,
            title_band,
        })
    }

    pub fn full(&self) -> &RgbImage {
        &self.full
    }

    pub fn click_area(&self) -> &RgbImage {
        &self.click_area
    }

    pub fn title_band(&self) -> &RgbImage {
        &self.title_band
    }

    /// Returns the probe pixel when it marks the provider's error placeholder
    ///
    /// Near-black on every channel is abnormal. Near-white and anything in
    /// between count as normal.
    pub fn abnormal_probe(&self, template: &CaptchaTemplate) -> Option<[u8; 3]> {
        let (x, y) = template.probe;
        let pixel = self.full.get_pixel(x, y).0;
        if pixel.iter().all(|&c| c > template.normal_above) {
            return None;
        }
        if pixel.iter().all(|&c| c < template.abnormal_below) {
            return Some(pixel);
        }
        None
    }
}

/// Strip an optional `data:...;base64,` prefix and decode
pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    let body = match payload.split_once(',') {
        Some((_, body)) => body,
        None => payload,
    };
    let body: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    general_purpose::STANDARD
        .decode(body.as_bytes())
        .map_err(|e| SolveError::Decode(e.to_string()))
}

/// Copy `region` out of `image`, clamped to the image bounds
pub fn crop(image: &RgbImage, region: &BoundingBox) -> RgbImage {
    let (w, h) = image.dimensions();
    let x1 = region.x1.min(w);
    let y1 = region.y1.min(h);
    let x2 = region.x2.min(w).max(x1);
    let y2 = region.y2.min(h).max(y1);
    imageops::crop_imm(image, x1, y1, x2 - x1, y2 - y1).to_image()
}
