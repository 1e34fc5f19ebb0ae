//! Title band reader
//!
//! Title glyphs are rendered clean, so each slot gets exactly one pass
//! through the primary recognizer and no voting.

use crate::decoder::{crop, CaptchaImage};
use crate::ocr::Recognizer;
use crate::template::CaptchaTemplate;
use crate::types::{BoundingBox, TitleCharacter};
use anyhow::{Context, Result};
use image::DynamicImage;
use tracing::debug;

/// Read the four ordered target characters
pub fn extract_titles(
    image: &CaptchaImage,
    template: &CaptchaTemplate,
    recognizer: &dyn Recognizer,
) -> Result<Vec<TitleCharacter>> {
    let band = image.title_band();
    template
        .title_slots
        .iter()
        .enumerate()
        .map(|(position, &(x1, x2))| {
            let glyph = crop(band, &BoundingBox::new(x1, 0, x2, band.height()));
            let label = recognizer
                .recognize(&DynamicImage::ImageRgb8(glyph.clone()))
                .with_context(|| format!("title slot {} could not be recognized", position))?;
            debug!(position, label = %label, "title character");
            Ok(TitleCharacter {
                position,
                glyph,
                label,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb, RgbImage};

    /// Answers with the red channel of the slot's first pixel as a digit
    fn red_digit(image: &DynamicImage) -> Result<String> {
        let pixel = image.to_rgb8().get_pixel(0, 0).0;
        Ok(((pixel[0] / 10) % 10).to_string())
    }

    fn challenge() -> RgbImage {
        let template = CaptchaTemplate::default();
        let mut img: RgbImage = ImageBuffer::from_pixel(250, 120, Rgb([255u8, 255, 255]));
        for (k, slot) in template.title_boxes().iter().enumerate() {
            for y in slot.y1..slot.y2 {
                for x in slot.x1..slot.x2 {
                    img.put_pixel(x, y, Rgb([(k as u8 + 1) * 10, 0, 0]));
                }
            }
        }
        img
    }

    #[test]
    fn test_titles_follow_slot_order() {
        let template = CaptchaTemplate::default();
        let image = CaptchaImage::from_rgb(challenge(), &template).unwrap();
        let titles = extract_titles(&image, &template, &red_digit).unwrap();

        let labels: Vec<&str> = titles.iter().map(|t| t.label.as_str()).collect();
        assert_eq!(labels, vec!["1", "2", "3", "4"]);
        assert_eq!(titles[2].position, 2);
        assert_eq!(titles[0].glyph.dimensions(), (20, 20));
        // slots are cut from the decoded title band
        assert_eq!(
            titles[1].glyph,
            crop(image.title_band(), &BoundingBox::new(140, 0, 160, 20))
        );
        assert_eq!(titles[1].glyph.get_pixel(0, 0), &Rgb([20, 0, 0]));
    }

    #[test]
    fn test_recognizer_failure_is_reported() {
        let template = CaptchaTemplate::default();
        let image = CaptchaImage::from_rgb(challenge(), &template).unwrap();
        let failing = |_: &DynamicImage| -> Result<String> { anyhow::bail!("no model") };
        let err = extract_titles(&image, &template, &failing).unwrap_err();
        assert!(err.to_string().contains("title slot 0"));
    }
}
