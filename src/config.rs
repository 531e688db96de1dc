use serde::Deserialize;

use crate::error::ConfigError;
use crate::operations::voxel::GridOffset;

/// Parameters shared by every skeleton in a batch.
///
/// Read from TOML; missing keys take their [`Default`] values:
///
/// ```toml
/// step_length = 1.0
/// grid_size = 20.0
/// overlapping_windows = true
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Target arc-length step of the resampler.
    pub step_length: f64,
    /// Voxel edge length.
    pub grid_size: f64,
    /// Aggregate on all eight half-cell staggered grids instead of one.
    pub overlapping_windows: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            step_length: 1.0,
            grid_size: 20.0,
            overlapping_windows: true,
        }
    }
}

impl PipelineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
    /// [`ConfigError::InvalidValue`] if validation fails.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that both lengths are positive and finite.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [("step_length", self.step_length), ("grid_size", self.grid_size)] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ConfigError::InvalidValue(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Grid offsets to aggregate on.
    #[must_use]
    pub fn offsets(&self) -> &'static [GridOffset] {
        if self.overlapping_windows {
            &GridOffset::STAGGERED
        } else {
            &[GridOffset::ZERO]
        }
    }
}
