//! Voting profiles
//!
//! A profile is pure data: a list of passes, each the cartesian product of
//! padding margins, pixel transforms, resize targets and recognizer families.
//! The four named levels trade recognition calls for latency; a new level is
//! a new value, not new code.

use crate::ocr::EngineFamily;
use crate::preprocess::{PixelTransform, ResizeTarget};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One rendered-and-recognized attempt for a candidate box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variant {
    pub pad: u32,
    pub transform: PixelTransform,
    pub size: ResizeTarget,
    pub engine: EngineFamily,
}

/// Cartesian product of variant parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantPass {
    pub pads: Vec<u32>,
    pub transforms: Vec<PixelTransform>,
    pub sizes: Vec<ResizeTarget>,
    pub engines: Vec<EngineFamily>,
}

impl VariantPass {
    /// Variants in pad, transform, size, engine nesting order
    pub fn variants(&self) -> impl Iterator<Item = Variant> + '_ {
        self.pads.iter().flat_map(move |&pad| {
            self.transforms.iter().flat_map(move |&transform| {
                self.sizes.iter().flat_map(move |&size| {
                    self.engines.iter().map(move |&engine| Variant {
                        pad,
                        transform,
                        size,
                        engine,
                    })
                })
            })
        })
    }

    pub fn len(&self) -> usize {
        self.pads.len() * self.transforms.len() * self.sizes.len() * self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Contour-shape tie-breaker settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeRefinement {
    /// Weight of the raw vote count in the blended score
    pub vote_weight: f64,
    /// Weight of the shape similarity in the blended score
    pub shape_weight: f64,
    /// Margin around the candidate box for the contour crop
    pub candidate_pad: u32,
    /// Similarity is `max(0, ceiling - distance)`
    pub distance_ceiling: f64,
}

impl Default for ShapeRefinement {
    fn default() -> Self {
        Self {
            vote_weight: 0.1,
            shape_weight: 0.5,
            candidate_pad: 5,
            distance_ceiling: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub passes: Vec<VariantPass>,
    #[serde(default)]
    pub shape: Option<ShapeRefinement>,
}

impl Profile {
    /// All variants evaluated per box, in canonical order
    pub fn variants(&self) -> Vec<Variant> {
        self.passes.iter().flat_map(|p| p.variants()).collect()
    }

    pub fn variants_per_box(&self) -> usize {
        self.passes.iter().map(VariantPass::len).sum()
    }

    pub fn for_level(level: Level) -> Self {
        use EngineFamily::{Primary, Secondary};
        use PixelTransform::{Identity, Inverted};
        use ResizeTarget::{Native, Square};

        let pass = |pads: &[u32],
                    transforms: &[PixelTransform],
                    sizes: &[ResizeTarget],
                    engines: &[EngineFamily]| VariantPass {
            pads: pads.to_vec(),
            transforms: transforms.to_vec(),
            sizes: sizes.to_vec(),
            engines: engines.to_vec(),
        };

        let (passes, shape) = match level {
            Level::Fast => (
                vec![
                    pass(&[3, 5, 8], &[Identity], &[Native, Square(64)], &[Primary]),
                    pass(&[5], &[Identity], &[Native], &[Secondary]),
                ],
                None,
            ),
            Level::Balanced => (
                vec![pass(
                    &[3, 5, 8],
                    &[Identity],
                    &[Native, Square(64)],
                    &[Primary, Secondary],
                )],
                None,
            ),
            Level::Accurate => (
                vec![
                    pass(&[3, 5, 8], &[Identity, Inverted], &[Native, Square(64)], &[Primary]),
                    pass(&[3, 5, 8], &[Identity], &[Native, Square(64)], &[Secondary]),
                ],
                None,
            ),
            Level::Max => (
                vec![pass(
                    &[0, 3, 5, 8, 12],
                    &PixelTransform::ALL,
                    &[Native, Square(64), Square(48), Square(32)],
                    &EngineFamily::ALL,
                )],
                Some(ShapeRefinement::default()),
            ),
        };

        Self {
            name: level.to_string(),
            passes,
            shape,
        }
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::for_level(Level::default())
    }
}

/// Named effort level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Fast,
    #[default]
    Balanced,
    Accurate,
    Max,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::Fast, Level::Balanced, Level::Accurate, Level::Max];
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Fast => "fast",
            Level::Balanced => "balanced",
            Level::Accurate => "accurate",
            Level::Max => "max",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown captcha level '{0}' (expected fast, balanced, accurate or max)")]
pub struct UnknownLevel(pub String);

impl FromStr for Level {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(Level::Fast),
            "balanced" => Ok(Level::Balanced),
            "accurate" => Ok(Level::Accurate),
            "max" => Ok(Level::Max),
            _ => Err(UnknownLevel(s.to_string())),
        }
    }
}
