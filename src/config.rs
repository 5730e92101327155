use crate::api::DEFAULT_API_BASE;
use crate::{FrinkyError, Result, RAMPS};
use log::debug;
use serde::Deserialize;
use std::path::Path;

/// Defaults that can be kept in a JSON config file. Every field is optional
/// in the file; command-line flags override whatever is loaded.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_base: String,
    pub width: u32,
    pub contrast: f64,
    pub ramp: usize,
    pub interval: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            width: 100,
            contrast: 2.0,
            ramp: 0,
            interval: 0.2,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or the defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        debug!("Loading settings from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_base.trim().is_empty() {
            return Err(FrinkyError::InvalidConfig("api_base must not be empty".to_string()));
        }
        if self.width == 0 {
            return Err(FrinkyError::InvalidConfig("width must be greater than 0".to_string()));
        }
        if !self.contrast.is_finite() || self.contrast <= 0.0 {
            return Err(FrinkyError::InvalidConfig("contrast must be greater than 0".to_string()));
        }
        if self.ramp >= RAMPS.len() {
            return Err(FrinkyError::InvalidConfig(format!(
                "ramp must be between 0 and {}",
                RAMPS.len() - 1
            )));
        }
        if !self.interval.is_finite() || self.interval < 0.0 {
            return Err(FrinkyError::InvalidConfig("interval must not be negative".to_string()));
        }
        Ok(())
    }
}
