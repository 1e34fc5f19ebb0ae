//! Candidate region detector based on connected components
//!
//! The click area is binarized with an Otsu threshold, strokes belonging to
//! the same glyph are merged with a small dilation, and every remaining
//! component whose bounds look like a glyph becomes a candidate box.

use anyhow::Result;
use core_pipeline::{BoundingBox, RegionDetector};
use image::{GrayImage, Luma, RgbImage};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::morphology::dilate;
use imageproc::region_labelling::{connected_components, Connectivity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentDetectorConfig {
    /// Glyphs are darker than the background
    pub dark_glyphs: bool,
    /// Dilation radius (L-infinity) used to join strokes
    pub merge_radius: u8,
    pub min_side: u32,
    pub max_side: u32,
}

impl Default for ComponentDetectorConfig {
    fn default() -> Self {
        Self {
            dark_glyphs: true,
            merge_radius: 2,
            min_side: 8,
            max_side: 80,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ComponentDetector {
    config: ComponentDetectorConfig,
}

impl ComponentDetector {
    pub fn new(config: ComponentDetectorConfig) -> Self {
        Self { config }
    }

    /// Foreground mask: glyph pixels are 255
    fn foreground(&self, gray: &GrayImage) -> GrayImage {
        let level = otsu_level(gray);
        let kind = if self.config.dark_glyphs {
            ThresholdType::BinaryInverted
        } else {
            ThresholdType::Binary
        };
        let binary = threshold(gray, level, kind);
        if self.config.merge_radius == 0 {
            binary
        } else {
            dilate(&binary, Norm::LInf, self.config.merge_radius)
        }
    }

    fn accepts(&self, bbox: &BoundingBox) -> bool {
        let (w, h) = (bbox.width(), bbox.height());
        w >= self.config.min_side
            && h >= self.config.min_side
            && w <= self.config.max_side
            && h <= self.config.max_side
    }
}

impl RegionDetector for ComponentDetector {
    fn detect(&self, click_area: &RgbImage) -> Result<Vec<BoundingBox>> {
        let gray = image::imageops::grayscale(click_area);
        let mask = self.foreground(&gray);
        let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

        // label -> (min_x, min_y, max_x, max_y), inclusive
        let mut extents: BTreeMap<u32, (u32, u32, u32, u32)> = BTreeMap::new();
        for (x, y, pixel) in labels.enumerate_pixels() {
            let label = pixel[0];
            if label == 0 {
                continue;
            }
            extents
                .entry(label)
                .and_modify(|e| {
                    e.0 = e.0.min(x);
                    e.1 = e.1.min(y);
                    e.2 = e.2.max(x);
                    e.3 = e.3.max(y);
                })
                .or_insert((x, y, x, y));
        }

        let mut boxes: Vec<BoundingBox> = extents
            .values()
            .map(|&(x1, y1, x2, y2)| BoundingBox::new(x1, y1, x2 + 1, y2 + 1))
            .filter(|bbox| self.accepts(bbox))
            .collect();

        // Largest first, so truncation keeps the most glyph-like regions
        boxes.sort_by(|a, b| {
            b.area()
                .cmp(&a.area())
                .then(a.x1.cmp(&b.x1))
                .then(a.y1.cmp(&b.y1))
        });

        debug!(
            components = extents.len(),
            candidates = boxes.len(),
            "detected regions"
        );
        Ok(boxes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn blank() -> RgbImage {
        ImageBuffer::from_pixel(250, 100, Rgb([235u8, 235, 235]))
    }

    fn fill(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32) {
        for yy in y..y + h {
            for xx in x..x + w {
                img.put_pixel(xx, yy, Rgb([20, 20, 20]));
            }
        }
    }

    #[test]
    fn test_detects_glyph_sized_blobs_largest_first() {
        let mut img = blank();
        fill(&mut img, 10, 10, 20, 20);
        fill(&mut img, 60, 40, 30, 30);
        fill(&mut img, 120, 20, 24, 24);
        fill(&mut img, 190, 50, 16, 16);

        let detector = ComponentDetector::new(ComponentDetectorConfig {
            merge_radius: 0,
            ..Default::default()
        });
        let boxes = detector.detect(&img).unwrap();

        assert_eq!(boxes.len(), 4);
        assert_eq!(boxes[0], BoundingBox::new(60, 40, 90, 70));
        assert_eq!(boxes[1], BoundingBox::new(120, 20, 144, 44));
        assert_eq!(boxes[3], BoundingBox::new(190, 50, 206, 66));
    }

    #[test]
    fn test_specks_and_bars_are_filtered() {
        let mut img = blank();
        fill(&mut img, 10, 10, 20, 20);
        fill(&mut img, 100, 80, 2, 2);
        fill(&mut img, 0, 95, 250, 3);

        let boxes = ComponentDetector::default().detect(&img).unwrap();
        assert_eq!(boxes.len(), 1);
        // Dilation grows the blob by the merge radius on each side
        assert_eq!(boxes[0], BoundingBox::new(8, 8, 32, 32));
    }

    #[test]
    fn test_nearby_strokes_merge_into_one_glyph() {
        let mut img = blank();
        fill(&mut img, 40, 20, 6, 30);
        fill(&mut img, 48, 20, 6, 30);

        let separate = ComponentDetector::new(ComponentDetectorConfig {
            merge_radius: 0,
            min_side: 4,
            ..Default::default()
        });
        assert_eq!(separate.detect(&img).unwrap().len(), 2);

        let merged = ComponentDetector::default().detect(&img).unwrap();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].width(), 14 + 4);
    }

    #[test]
    fn test_light_glyph_polarity() {
        let mut img: RgbImage = ImageBuffer::from_pixel(250, 100, Rgb([15u8, 15, 15]));
        for y in 30..60 {
            for x in 100..130 {
                img.put_pixel(x, y, Rgb([240, 240, 240]));
            }
        }
        let detector = ComponentDetector::new(ComponentDetectorConfig {
            dark_glyphs: false,
            merge_radius: 0,
            ..Default::default()
        });
        assert_eq!(
            detector.detect(&img).unwrap(),
            vec![BoundingBox::new(100, 30, 130, 60)]
        );
    }
}
