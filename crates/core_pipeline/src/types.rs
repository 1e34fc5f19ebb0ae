//! Core types for the glyphclick pipeline
//!
//! Everything here is transient per solve call, except the template and
//! profile values that configure a solver.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Axis-aligned box in click-area pixel coordinates
///
/// `x2`/`y2` are exclusive, matching the crop convention of the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }

    pub fn area(&self) -> u32 {
        self.width() * self.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Integer center, rounded down on both axes
    pub fn center(&self) -> ClickPoint {
        ClickPoint {
            x: (self.x1 + self.x2) / 2,
            y: (self.y1 + self.y2) / 2,
        }
    }

    /// Grow the box by `pad` on every side, clamped to `[0, max_w) x [0, max_h)`
    pub fn padded(&self, pad: u32, max_w: u32, max_h: u32) -> BoundingBox {
        BoundingBox {
            x1: self.x1.saturating_sub(pad).min(max_w),
            y1: self.y1.saturating_sub(pad).min(max_h),
            x2: self.x2.saturating_add(pad).min(max_w),
            y2: self.y2.saturating_add(pad).min(max_h),
        }
    }
}

/// Final output unit: where to click, in click-area pixel space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClickPoint {
    pub x: u32,
    pub y: u32,
}

/// One of the four ordered target characters from the title band
#[derive(Debug, Clone)]
pub struct TitleCharacter {
    /// Position in the required click order (0..4)
    pub position: usize,
    /// Cropped glyph, kept for shape refinement
    pub glyph: image::RgbImage,
    /// Best-guess label from the primary recognizer
    pub label: String,
}

/// Per-box histogram of confident single-character recognition results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    votes: BTreeMap<String, u32>,
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count `label` if it is exactly one character long
    ///
    /// Returns whether the vote was accepted. Anything else is noise and
    /// leaves the tally untouched.
    pub fn record(&mut self, label: &str) -> bool {
        if label.chars().count() != 1 {
            return false;
        }
        *self.votes.entry(label.to_string()).or_insert(0) += 1;
        true
    }

    pub fn count(&self, label: &str) -> u32 {
        self.votes.get(label).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.votes.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// Label with the most votes; ties go to the smallest label
    pub fn leader(&self) -> Option<(&str, u32)> {
        self.votes
            .iter()
            .fold(None, |best: Option<(&str, u32)>, (label, &count)| match best {
                Some((_, best_count)) if best_count >= count => best,
                _ => Some((label.as_str(), count)),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.votes.iter().map(|(label, &count)| (label.as_str(), count))
    }
}

/// Render click points the way the provider's login form expects them
///
/// Each point becomes `x-y`, joined by `,`. The provider scales the vertical
/// axis of the displayed image, so `y` is multiplied by
/// `y_scale.0 / y_scale.1` and truncated.
pub fn encode_verify_code(points: &[ClickPoint], y_scale: (u32, u32)) -> String {
    let (num, den) = y_scale;
    points
        .iter()
        .map(|p| {
            let y = if den == 0 { p.y } else { p.y * num / den };
            format!("{}-{}", p.x, y)
        })
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_rounds_down() {
        let b = BoundingBox::new(10, 20, 41, 51);
        assert_eq!(b.center(), ClickPoint { x: 25, y: 35 });
    }

    #[test]
    fn test_padded_clamps_to_area() {
        let b = BoundingBox::new(2, 3, 245, 98);
        let p = b.padded(8, 250, 100);
        assert_eq!(p, BoundingBox::new(0, 0, 250, 100));

        let inner = BoundingBox::new(50, 50, 60, 60).padded(5, 250, 100);
        assert_eq!(inner, BoundingBox::new(45, 45, 65, 65));
    }

    #[test]
    fn test_empty_box() {
        assert!(BoundingBox::new(5, 5, 5, 20).is_empty());
        assert!(BoundingBox::new(9, 5, 3, 20).is_empty());
        assert!(!BoundingBox::new(0, 0, 1, 1).is_empty());
    }

    #[test]
    fn test_vote_tally_only_counts_single_characters() {
        let mut tally = VoteTally::new();
        assert!(tally.record("甲"));
        assert!(tally.record("甲"));
        assert!(tally.record("a"));
        assert!(!tally.record(""));
        assert!(!tally.record("ab"));
        assert!(!tally.record("甲乙"));

        assert_eq!(tally.count("甲"), 2);
        assert_eq!(tally.count("a"), 1);
        assert_eq!(tally.count("ab"), 0);
        assert_eq!(tally.total(), 3);
    }

    #[test]
    fn test_vote_tally_leader_breaks_ties_by_label() {
        let mut tally = VoteTally::new();
        assert_eq!(tally.leader(), None);
        tally.record("b");
        tally.record("a");
        assert_eq!(tally.leader(), Some(("a", 1)));
        tally.record("b");
        assert_eq!(tally.leader(), Some(("b", 2)));
    }

    #[test]
    fn test_encode_verify_code_scales_y() {
        let points = vec![
            ClickPoint { x: 30, y: 60 },
            ClickPoint { x: 100, y: 25 },
        ];
        assert_eq!(encode_verify_code(&points, (5, 6)), "30-50,100-20");
        assert_eq!(encode_verify_code(&points, (1, 1)), "30-60,100-25");
    }

    #[test]
    fn test_bounding_box_serialization() {
        let b = BoundingBox::new(1, 2, 3, 4);
        let json = serde_json::to_string(&b).unwrap();
        let back: BoundingBox = serde_json::from_str(&json).unwrap();
        assert_eq!(b, back);
    }
}
