//! Solver configuration
//!
//! Loaded from a JSON file shared with the surrounding client, e.g.
//!
//! ```json
//! { "CAPTCHA_LEVEL": "accurate" }
//! ```
//!
//! A custom `profile` overrides the named level; `template` overrides the
//! provider geometry field by field.

use crate::profile::{Level, Profile};
use crate::template::CaptchaTemplate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Level name as written in the file; see [`SolverConfig::level`]
    #[serde(alias = "CAPTCHA_LEVEL")]
    pub captcha_level: Option<String>,
    /// Fully custom profile, takes precedence over the level
    pub profile: Option<Profile>,
    pub template: CaptchaTemplate,
}

impl SolverConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Like [`SolverConfig::load`], but any failure yields the defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "using default solver config");
                Self::default()
            }
        }
    }

    /// Configured level; missing or unknown names fall back to balanced
    pub fn level(&self) -> Level {
        match self.captcha_level.as_deref() {
            None => Level::default(),
            Some(name) => name.parse().unwrap_or_else(|e| {
                warn!(error = %e, "falling back to balanced");
                Level::default()
            }),
        }
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.captcha_level = Some(level.to_string());
        self.profile = None;
        self
    }

    /// Profile the solver should run
    pub fn profile(&self) -> Profile {
        match &self.profile {
            Some(custom) => custom.clone(),
            None => Profile::for_level(self.level()),
        }
    }
}
