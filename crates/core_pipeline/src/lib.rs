//! Core pipeline for glyphclick
//!
//! This crate turns a click-order challenge image (four title glyphs above
//! a cluttered field of candidates) into the four click coordinates in the
//! required order. Recognition and detection models are supplied by the
//! caller through the traits in [`ocr`].

pub mod assignment;
pub mod config;
pub mod decoder;
pub mod error;
pub mod ocr;
pub mod preprocess;
pub mod profile;
pub mod shape;
pub mod solver;
pub mod template;
pub mod title;
pub mod types;
pub mod voting;

pub use config::SolverConfig;
pub use error::SolveError;
pub use ocr::{EngineFamily, Recognizer, RecognizerSet, RegionDetector};
pub use profile::{Level, Profile};
pub use solver::{Solution, Solver};
pub use template::CaptchaTemplate;
pub use types::*;
