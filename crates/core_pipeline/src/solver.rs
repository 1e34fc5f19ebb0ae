//! Public solve operation
//!
//! payload -> decode -> abnormality check -> titles + regions -> votes
//! -> (shape refinement) -> score matrix -> assignment -> click points

use crate::assignment::{self, Assignment, ScoreMatrix};
use crate::config::SolverConfig;
use crate::decoder::CaptchaImage;
use crate::error::{Result, SolveError};
use crate::ocr::{EngineFamily, RecognizerSet, RegionDetector};
use crate::profile::{Profile, ShapeRefinement, Variant};
use crate::shape::ShapeScorer;
use crate::template::CaptchaTemplate;
use crate::title::extract_titles;
use crate::types::{BoundingBox, ClickPoint, TitleCharacter, VoteTally};
use crate::voting::VotingEngine;
use image::RgbImage;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Number of clicks a challenge asks for
pub const REQUIRED_CLICKS: usize = 4;

/// Everything a successful solve computed, for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct Solution {
    pub titles: Vec<String>,
    pub boxes: Vec<BoundingBox>,
    pub tallies: Vec<VoteTally>,
    pub matrix: ScoreMatrix,
    pub assignment: Assignment,
    pub points: Vec<ClickPoint>,
}

/// Click-order solver bound to a template, a profile and its capabilities
///
/// Cheap to share: capabilities are behind `Arc`, and every solve call keeps
/// its crops, tallies and matrices local.
#[derive(Clone)]
pub struct Solver {
    template: CaptchaTemplate,
    profile: Profile,
    variants: Vec<Variant>,
    recognizers: RecognizerSet,
    detector: Arc<dyn RegionDetector>,
}

impl std::fmt::Debug for Solver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Solver")
            .field("template", &self.template)
            .field("profile", &self.profile.name)
            .field("variants", &self.variants.len())
            .finish_non_exhaustive()
    }
}

impl Solver {
    /// Solver with the default template and the balanced profile
    pub fn new(recognizers: RecognizerSet, detector: Arc<dyn RegionDetector>) -> Self {
        let profile = Profile::default();
        Self {
            template: CaptchaTemplate::default(),
            variants: profile.variants(),
            profile,
            recognizers,
            detector,
        }
    }

    pub fn from_config(
        config: &SolverConfig,
        recognizers: RecognizerSet,
        detector: Arc<dyn RegionDetector>,
    ) -> Self {
        Self::new(recognizers, detector)
            .with_template(config.template.clone())
            .with_profile(config.profile())
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.variants = profile.variants();
        self.profile = profile;
        self
    }

    pub fn with_template(mut self, template: CaptchaTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn template(&self) -> &CaptchaTemplate {
        &self.template
    }

    /// Click points in title order, or `None` on any failure
    ///
    /// Callers treat `None` as "fetch a new challenge and retry".
    pub fn solve(&self, payload: &str) -> Option<Vec<ClickPoint>> {
        guarded(|| self.try_solve(payload))
    }

    /// [`Solver::solve`] for encoded image bytes
    pub fn solve_bytes(&self, bytes: &[u8]) -> Option<Vec<ClickPoint>> {
        guarded(|| self.try_solve_bytes(bytes))
    }

    /// Solve a base64 payload, keeping the failure kind
    pub fn try_solve(&self, payload: &str) -> Result<Solution> {
        let image = CaptchaImage::from_base64(payload, &self.template)?;
        self.solve_image(&image)
    }

    /// Solve encoded image bytes, keeping the failure kind
    pub fn try_solve_bytes(&self, bytes: &[u8]) -> Result<Solution> {
        let image = CaptchaImage::from_bytes(bytes, &self.template)?;
        self.solve_image(&image)
    }

    pub fn solve_image(&self, image: &CaptchaImage) -> Result<Solution> {
        if let Some(pixel) = image.abnormal_probe(&self.template) {
            return Err(SolveError::AbnormalImage { pixel });
        }

        let titles = extract_titles(
            image,
            &self.template,
            self.recognizers.get(EngineFamily::Primary),
        )?;

        let mut boxes = self.detector.detect(image.click_area())?;
        if boxes.len() < REQUIRED_CLICKS {
            return Err(SolveError::InsufficientRegions { found: boxes.len() });
        }
        boxes.truncate(REQUIRED_CLICKS);

        let engine = VotingEngine::new(&self.recognizers, &self.variants);
        let tallies = engine.tally_all(image.click_area(), &boxes);

        let labels: Vec<String> = titles.iter().map(|t| t.label.clone()).collect();
        let mut matrix = ScoreMatrix::from_votes(&labels, &tallies);
        if let Some(settings) = self.profile.shape {
            let shape = shape_matrix(settings, &titles, image.click_area(), &boxes);
            matrix = matrix.blend(&shape, settings.vote_weight, settings.shape_weight);
        }

        let assignment = assignment::solve(&matrix);
        let points: Vec<ClickPoint> = assignment
            .columns
            .iter()
            .map(|&j| boxes[j].center())
            .collect();
        if points.len() != REQUIRED_CLICKS {
            return Err(SolveError::InsufficientMatches {
                found: points.len(),
            });
        }

        info!(
            profile = %self.profile.name,
            titles = ?labels,
            columns = ?assignment.columns,
            score = assignment.score,
            "captcha solved"
        );

        Ok(Solution {
            titles: labels,
            boxes,
            tallies,
            matrix,
            assignment,
            points,
        })
    }
}

/// Similarity of every title glyph with every candidate box
fn shape_matrix(
    settings: ShapeRefinement,
    titles: &[TitleCharacter],
    click_area: &RgbImage,
    boxes: &[BoundingBox],
) -> ScoreMatrix {
    let n = titles.len().min(boxes.len());
    let scorer = ShapeScorer::new(settings);
    let title_moments: Vec<_> = titles
        .iter()
        .take(n)
        .map(|t| scorer.title_moments(&t.glyph))
        .collect();
    let candidate_moments: Vec<_> = boxes
        .iter()
        .take(n)
        .map(|b| scorer.candidate_moments(click_area, b))
        .collect();

    let mut matrix = ScoreMatrix::zeros(n);
    for (i, title) in title_moments.iter().enumerate() {
        for (j, candidate) in candidate_moments.iter().enumerate() {
            matrix.set(i, j, scorer.similarity(title.as_ref(), candidate));
        }
    }
    debug!(?matrix, "shape similarity");
    matrix
}

/// Collapse every failure, panics included, to `None`
fn guarded(attempt: impl FnOnce() -> Result<Solution>) -> Option<Vec<ClickPoint>> {
    match panic::catch_unwind(AssertUnwindSafe(attempt)) {
        Ok(Ok(solution)) => Some(solution.points),
        Ok(Err(e)) => {
            warn!(kind = e.kind(), error = %e, "captcha not solved");
            None
        }
        Err(_) => {
            error!("captcha solver panicked");
            None
        }
    }
}
