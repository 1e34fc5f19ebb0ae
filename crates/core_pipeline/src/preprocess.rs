//! Image preprocessing module
//!
//! Pixel-level variants fed to the recognizers:
//! - Grayscale conversion
//! - Photometric inversion
//! - Contrast enhancement around the mean luminance
//! - Square resizing (Lanczos)
//! - Otsu binarization for contour extraction

use image::{imageops::FilterType, DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use serde::{Deserialize, Serialize};

/// Contrast factor of the "enhanced" variant
pub const CONTRAST_FACTOR: f32 = 2.0;

/// Pixel transform applied to a candidate crop before recognition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelTransform {
    Identity,
    Grayscale,
    Inverted,
    Contrast,
}

impl PixelTransform {
    pub const ALL: [PixelTransform; 4] = [
        PixelTransform::Identity,
        PixelTransform::Grayscale,
        PixelTransform::Inverted,
        PixelTransform::Contrast,
    ];

    pub fn apply(self, crop: &RgbImage) -> DynamicImage {
        match self {
            PixelTransform::Identity => DynamicImage::ImageRgb8(crop.clone()),
            PixelTransform::Grayscale => DynamicImage::ImageLuma8(luma_601(crop)),
            PixelTransform::Inverted => {
                let mut inverted = DynamicImage::ImageRgb8(crop.clone());
                inverted.invert();
                inverted
            }
            PixelTransform::Contrast => {
                DynamicImage::ImageRgb8(enhance_contrast(crop, CONTRAST_FACTOR))
            }
        }
    }
}

/// Output size of a variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeTarget {
    /// Keep the crop's own size
    Native,
    /// Resample to `n x n`
    Square(u32),
}

impl ResizeTarget {
    pub fn apply(self, image: DynamicImage) -> DynamicImage {
        match self {
            ResizeTarget::Native => image,
            ResizeTarget::Square(side) => image.resize_exact(side, side, FilterType::Lanczos3),
        }
    }
}

/// ITU-R 601 luma in 16-bit fixed point, rounded
///
/// `(19595 R + 38470 G + 7471 B + 2^15) >> 16`, the same levels classic
/// imaging libraries produce for an `L` conversion.
pub fn luma_601(input: &RgbImage) -> GrayImage {
    GrayImage::from_fn(input.width(), input.height(), |x, y| {
        let Rgb([r, g, b]) = *input.get_pixel(x, y);
        let l = (19595 * r as u32 + 38470 * g as u32 + 7471 * b as u32 + 0x8000) >> 16;
        Luma([l as u8])
    })
}

/// Stretch every channel away from the mean luminance by `factor`
///
/// `out = mean + factor * (pixel - mean)`, clamped to `0..=255`.
pub fn enhance_contrast(input: &RgbImage, factor: f32) -> RgbImage {
    let mean = mean_luma(&luma_601(input));
    let mut out = input.clone();
    for pixel in out.pixels_mut() {
        let Rgb(channels) = *pixel;
        *pixel = Rgb(channels.map(|c| {
            let v = mean + factor * (c as f32 - mean);
            v.round().clamp(0.0, 255.0) as u8
        }));
    }
    out
}

/// Mean intensity rounded to the nearest integer level
fn mean_luma(gray: &GrayImage) -> f32 {
    let count = gray.width() as u64 * gray.height() as u64;
    if count == 0 {
        return 0.0;
    }
    let sum: u64 = gray.pixels().map(|p| p.0[0] as u64).sum();
    (sum as f32 / count as f32).round()
}

/// Binarize with an automatic global (Otsu) threshold
///
/// Foreground (above the threshold) becomes 255, unless `inverted`, in which
/// case the polarity is swapped.
pub fn binarize_otsu(gray: &GrayImage, inverted: bool) -> GrayImage {
    let level = otsu_level(gray);
    let kind = if inverted {
        ThresholdType::BinaryInverted
    } else {
        ThresholdType::Binary
    };
    threshold(gray, level, kind)
}
