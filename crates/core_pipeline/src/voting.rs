//! Voting engine
//!
//! Every candidate box is re-rendered under each variant of the active
//! profile and sent to the requested recognizer. One-character answers are
//! votes; everything else is noise and is dropped without affecting any
//! label.
//!
//! Variants are evaluated in parallel. Results are collected in canonical
//! variant order before tallying, so the tally does not depend on thread
//! scheduling.

use crate::decoder::crop;
use crate::ocr::{Recognizer, RecognizerSet};
use crate::profile::Variant;
use crate::types::{BoundingBox, VoteTally};
use image::{DynamicImage, RgbImage};
use rayon::prelude::*;
use tracing::{debug, trace};

/// Render `variant` of `bbox` from the click area
///
/// Returns `None` when the padded, clamped crop is empty.
pub fn render_variant(
    click_area: &RgbImage,
    bbox: &BoundingBox,
    variant: &Variant,
) -> Option<DynamicImage> {
    let (width, height) = click_area.dimensions();
    let region = bbox.padded(variant.pad, width, height);
    if region.is_empty() {
        return None;
    }
    let cropped = crop(click_area, &region);
    Some(variant.size.apply(variant.transform.apply(&cropped)))
}

pub struct VotingEngine<'a> {
    recognizers: &'a RecognizerSet,
    variants: &'a [Variant],
}

impl<'a> VotingEngine<'a> {
    pub fn new(recognizers: &'a RecognizerSet, variants: &'a [Variant]) -> Self {
        Self {
            recognizers,
            variants,
        }
    }

    /// Tally one box
    pub fn tally(&self, click_area: &RgbImage, bbox: &BoundingBox) -> VoteTally {
        let answers: Vec<Option<String>> = self
            .variants
            .par_iter()
            .map(|variant| self.attempt(click_area, bbox, variant))
            .collect();

        let mut tally = VoteTally::new();
        let mut accepted = 0usize;
        for answer in answers.iter().flatten() {
            if tally.record(answer) {
                accepted += 1;
            } else {
                trace!(answer = %answer, "discarding multi-character answer");
            }
        }
        debug!(
            ?bbox,
            evaluated = self.variants.len(),
            accepted,
            leader = ?tally.leader(),
            "box tallied"
        );
        tally
    }

    /// Tally every box, preserving box order
    pub fn tally_all(&self, click_area: &RgbImage, boxes: &[BoundingBox]) -> Vec<VoteTally> {
        boxes
            .par_iter()
            .map(|bbox| self.tally(click_area, bbox))
            .collect()
    }

    fn attempt(
        &self,
        click_area: &RgbImage,
        bbox: &BoundingBox,
        variant: &Variant,
    ) -> Option<String> {
        let image = render_variant(click_area, bbox, variant)?;
        match self.recognizers.get(variant.engine).recognize(&image) {
            Ok(text) => Some(text),
            Err(e) => {
                trace!(?variant, error = %e, "recognizer failed on variant");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::EngineFamily;
    use crate::preprocess::{PixelTransform, ResizeTarget};
    use crate::profile::{Level, Profile};
    use image::{ImageBuffer, Rgb};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn click_area() -> RgbImage {
        ImageBuffer::from_pixel(250, 100, Rgb([255u8, 255, 255]))
    }

    fn constant(answer: &'static str) -> Arc<dyn Recognizer> {
        Arc::new(move |_: &DynamicImage| -> anyhow::Result<String> {
            Ok(answer.to_string())
        })
    }

    #[test]
    fn test_render_variant_pads_and_resizes() {
        let area = click_area();
        let bbox = BoundingBox::new(10, 10, 30, 40);
        let variant = Variant {
            pad: 5,
            transform: PixelTransform::Identity,
            size: ResizeTarget::Native,
            engine: EngineFamily::Primary,
        };
        let img = render_variant(&area, &bbox, &variant).unwrap();
        assert_eq!((img.width(), img.height()), (30, 40));

        let resized = Variant {
            size: ResizeTarget::Square(32),
            ..variant
        };
        let img = render_variant(&area, &bbox, &resized).unwrap();
        assert_eq!((img.width(), img.height()), (32, 32));
    }

    #[test]
    fn test_render_variant_skips_empty_crop() {
        let area = click_area();
        let outside = BoundingBox::new(300, 200, 320, 220);
        let variant = Profile::for_level(Level::Fast).variants()[0];
        assert!(render_variant(&area, &outside, &variant).is_none());
    }

    #[test]
    fn test_single_character_answers_are_votes() {
        let recognizers = RecognizerSet::new(constant("甲"), constant("乙"));
        let variants = Profile::for_level(Level::Fast).variants();
        let engine = VotingEngine::new(&recognizers, &variants);

        let tally = engine.tally(&click_area(), &BoundingBox::new(20, 20, 50, 50));
        assert_eq!(tally.count("甲"), 6);
        assert_eq!(tally.count("乙"), 1);
        assert_eq!(tally.total(), 7);
    }

    #[test]
    fn test_noise_never_counts() {
        let recognizers = RecognizerSet::new(
            constant("甲乙"),
            Arc::new(|_: &DynamicImage| -> anyhow::Result<String> {
                anyhow::bail!("model crashed")
            }),
        );
        let variants = Profile::for_level(Level::Accurate).variants();
        let engine = VotingEngine::new(&recognizers, &variants);

        let tally = engine.tally(&click_area(), &BoundingBox::new(20, 20, 50, 50));
        assert!(tally.is_empty());
    }

    #[test]
    fn test_empty_answers_never_count() {
        let recognizers = RecognizerSet::new(constant(""), constant("x"));
        let variants = Profile::for_level(Level::Balanced).variants();
        let engine = VotingEngine::new(&recognizers, &variants);

        let tally = engine.tally(&click_area(), &BoundingBox::new(20, 20, 50, 50));
        assert_eq!(tally.count("x"), 6);
        assert_eq!(tally.total(), 6);
    }

    #[test]
    fn test_total_votes_bounded_by_variants() {
        let recognizers = RecognizerSet::new(constant("a"), constant("b"));
        for level in Level::ALL {
            let variants = Profile::for_level(level).variants();
            let engine = VotingEngine::new(&recognizers, &variants);
            let tally = engine.tally(&click_area(), &BoundingBox::new(100, 30, 130, 60));
            assert!(tally.total() as usize <= variants.len());
        }
    }

    #[test]
    fn test_every_variant_is_attempted_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let counting: Arc<dyn Recognizer> =
            Arc::new(move |_: &DynamicImage| -> anyhow::Result<String> {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok("z".to_string())
            });
        let recognizers = RecognizerSet::new(Arc::clone(&counting), counting);
        let variants = Profile::for_level(Level::Max).variants();
        let engine = VotingEngine::new(&recognizers, &variants);

        let boxes = vec![
            BoundingBox::new(10, 10, 40, 40),
            BoundingBox::new(60, 10, 90, 40),
        ];
        let tallies = engine.tally_all(&click_area(), &boxes);
        assert_eq!(tallies.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 320);
        assert!(tallies.iter().all(|t| t.count("z") == 160));
    }
}
