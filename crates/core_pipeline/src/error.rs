//! Failure kinds of a solve call
//!
//! All of these collapse to `None` at [`crate::Solver::solve`]; the typed
//! form is kept for logging and tests.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SolveError {
    /// Payload is not valid base64 or not a readable image
    #[error("failed to decode challenge image: {0}")]
    Decode(String),

    /// Image is smaller than the geometry the template expects
    #[error("image {width}x{height} does not cover the template geometry")]
    TemplateMismatch { width: u32, height: u32 },

    /// Provider rendered its error placeholder instead of a challenge
    #[error("abnormal challenge image (probe pixel {pixel:?})")]
    AbnormalImage { pixel: [u8; 3] },

    #[error("detector found {found} candidate regions, need 4")]
    InsufficientRegions { found: usize },

    #[error("only {found} title positions could be assigned, need 4")]
    InsufficientMatches { found: usize },

    /// Title recognition or region detection failed outright
    #[error("capability failure: {0}")]
    Capability(#[from] anyhow::Error),
}

impl SolveError {
    /// Short stable name for log fields
    pub fn kind(&self) -> &'static str {
        match self {
            SolveError::Decode(_) => "decode",
            SolveError::TemplateMismatch { .. } => "template_mismatch",
            SolveError::AbnormalImage { .. } => "abnormal_image",
            SolveError::InsufficientRegions { .. } => "insufficient_regions",
            SolveError::InsufficientMatches { .. } => "insufficient_matches",
            SolveError::Capability(_) => "capability",
        }
    }
}

pub type Result<T> = std::result::Result<T, SolveError>;
