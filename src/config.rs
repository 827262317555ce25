//! Detector configuration and frame geometry.
//!
//! All algorithm parameters are frozen at `initialize` and read by every
//! step; nothing here changes while a detector is live. Defaults assume
//! 8-bit intensity range; use [`DetectorConfig::for_unit_range`] for
//! floating-point imagery normalized to [0, 1].

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Maximum supported channel count (grayscale or RGB).
pub const MAX_CHANNELS: usize = 3;

/// Algorithm parameters of the Gaussian-mixture detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Maximum mixture components per pixel (K).
    pub num_gaussians: usize,
    /// Variance assigned to a newly created component, uniform across
    /// channels.
    pub initial_variance: f64,
    /// Weight assigned to a newly created component, before
    /// renormalization.
    pub initial_weight: f64,
    /// Match threshold: a component matches when the summed squared
    /// channel distance is below `variance_threshold` times the summed
    /// channel variance.
    pub variance_threshold: f64,
    /// Fraction of total mixture weight the top-ranked components must
    /// reach to jointly represent background.
    pub min_background_ratio: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            num_gaussians: 5,
            initial_variance: 900.0,  // 30² in 8-bit intensity units
            initial_weight: 0.05,
            variance_threshold: 6.25, // 2.5² standard deviations
            min_background_ratio: 0.7,
        }
    }
}

impl DetectorConfig {
    /// Creates a configuration with the specified component capacity.
    pub fn with_components(num_gaussians: usize) -> Self {
        Self {
            num_gaussians,
            ..Default::default()
        }
    }

    /// Default parameters rescaled for floating-point imagery in [0, 1].
    pub fn for_unit_range() -> Self {
        let sigma = 30.0 / 255.0;
        Self {
            initial_variance: sigma * sigma,
            ..Default::default()
        }
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_gaussians == 0 {
            return Err(ConfigError::InvalidComponentCount);
        }
        if !(self.initial_variance > 0.0) {
            return Err(ConfigError::NonPositiveVariance(self.initial_variance));
        }
        if !(self.initial_weight > 0.0 && self.initial_weight <= 1.0) {
            return Err(ConfigError::InvalidInitialWeight(self.initial_weight));
        }
        if !(self.variance_threshold > 0.0) {
            return Err(ConfigError::NonPositiveThreshold(self.variance_threshold));
        }
        if !(self.min_background_ratio > 0.0 && self.min_background_ratio <= 1.0) {
            return Err(ConfigError::InvalidBackgroundRatio(self.min_background_ratio));
        }
        Ok(())
    }
}

/// Frame geometry: spatial size and channel count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameDims {
    /// Frame height in pixels.
    pub rows: usize,
    /// Frame width in pixels.
    pub cols: usize,
    /// Channels per pixel (1 = grayscale, 3 = RGB).
    pub channels: usize,
}

impl FrameDims {
    /// Creates frame geometry from rows, columns, and channels.
    pub fn new(rows: usize, cols: usize, channels: usize) -> Self {
        Self {
            rows,
            cols,
            channels,
        }
    }

    /// Number of pixels per frame.
    pub fn pixel_count(&self) -> usize {
        self.rows * self.cols
    }

    /// Number of samples per frame (pixels × channels).
    pub fn sample_count(&self) -> usize {
        self.rows * self.cols * self.channels
    }

    /// Validates the geometry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rows == 0 || self.cols == 0 {
            return Err(ConfigError::InvalidDimensions {
                rows: self.rows,
                cols: self.cols,
            });
        }
        if self.channels == 0 || self.channels > MAX_CHANNELS {
            return Err(ConfigError::UnsupportedChannels(self.channels));
        }
        self.rows
            .checked_mul(self.cols)
            .and_then(|p| p.checked_mul(self.channels))
            .ok_or(ConfigError::InvalidDimensions {
                rows: self.rows,
                cols: self.cols,
            })?;
        Ok(())
    }
}

/// Memory layout of frame buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameLayout {
    /// Column-major channel planes: pixel stride 1, channel stride =
    /// pixel count.
    #[default]
    Planar,
    /// Row-major interleaved channels: pixel stride = channel count,
    /// channel stride 1.
    Interleaved,
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("at least one mixture component is required")]
    InvalidComponentCount,
    #[error("initial variance must be positive, got {0}")]
    NonPositiveVariance(f64),
    #[error("initial weight must be in (0, 1], got {0}")]
    InvalidInitialWeight(f64),
    #[error("variance threshold must be positive, got {0}")]
    NonPositiveThreshold(f64),
    #[error("minimum background ratio must be in (0, 1], got {0}")]
    InvalidBackgroundRatio(f64),
    #[error("invalid frame dimensions {rows}x{cols}")]
    InvalidDimensions { rows: usize, cols: usize },
    #[error("unsupported channel count {0} (expected 1 to 3)")]
    UnsupportedChannels(usize),
    #[error("learning rate must be in (0, 1], got {0}")]
    InvalidLearningRate(f64),
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format for the CLI.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub frame: FrameConfig,
    #[serde(default)]
    pub run: RunConfig,
}

/// Frame geometry and layout as configured for the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameConfig {
    /// Frame height in pixels.
    pub rows: usize,
    /// Frame width in pixels.
    pub cols: usize,
    /// Channels per pixel.
    pub channels: usize,
    /// Frame buffer memory layout.
    pub layout: FrameLayout,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            rows: 240,
            cols: 320,
            channels: 1,
            layout: FrameLayout::Planar,
        }
    }
}

impl FrameConfig {
    /// The configured geometry as [`FrameDims`].
    pub fn dims(&self) -> FrameDims {
        FrameDims::new(self.rows, self.cols, self.channels)
    }
}

/// Run parameters for the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Run continuously (true) or process a fixed number of frames.
    pub continuous: bool,
    /// Number of frames to process if not continuous.
    pub frame_count: u32,
    /// Per-frame learning rate.
    pub learning_rate: f64,
    /// Seed for the synthetic scene generator.
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            continuous: false,
            frame_count: 300,
            learning_rate: 0.01,
            seed: 42,
        }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        let config: FileConfig =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every table of the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detector.validate()?;
        self.frame.dims().validate()?;
        if !(self.run.learning_rate > 0.0 && self.run.learning_rate <= 1.0) {
            return Err(ConfigError::InvalidLearningRate(self.run.learning_rate));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = DetectorConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_components_invalid() {
        let config = DetectorConfig::with_components(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidComponentCount)
        ));
    }

    #[test]
    fn test_negative_variance_invalid() {
        let mut config = DetectorConfig::default();
        config.initial_variance = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NonPositiveVariance(_))
        ));
    }

    #[test]
    fn test_nan_variance_invalid() {
        let mut config = DetectorConfig::default();
        config.initial_variance = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_background_ratio_above_one_invalid() {
        let mut config = DetectorConfig::default();
        config.min_background_ratio = 1.5;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBackgroundRatio(_))
        ));
    }

    #[test]
    fn test_unit_range_preset_valid() {
        let config = DetectorConfig::for_unit_range();
        assert!(config.validate().is_ok());
        assert!(config.initial_variance < 1.0);
    }

    #[test]
    fn test_zero_dimensions_invalid() {
        let dims = FrameDims::new(0, 320, 1);
        assert!(matches!(
            dims.validate(),
            Err(ConfigError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn test_four_channels_invalid() {
        let dims = FrameDims::new(240, 320, 4);
        assert!(matches!(
            dims.validate(),
            Err(ConfigError::UnsupportedChannels(4))
        ));
    }

    #[test]
    fn test_sample_count() {
        let dims = FrameDims::new(4, 8, 3);
        assert_eq!(dims.pixel_count(), 32);
        assert_eq!(dims.sample_count(), 96);
    }

    #[test]
    fn test_file_config_parses_toml() {
        let text = r#"
            [detector]
            num_gaussians = 3
            initial_variance = 36.0
            initial_weight = 0.05
            variance_threshold = 6.25
            min_background_ratio = 0.7

            [frame]
            rows = 120
            cols = 160
            channels = 3
            layout = "interleaved"

            [run]
            continuous = false
            frame_count = 50
            learning_rate = 0.05
            seed = 7
        "#;
        let config: FileConfig = toml::from_str(text).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.detector.num_gaussians, 3);
        assert_eq!(config.frame.layout, FrameLayout::Interleaved);
        assert_eq!(config.run.frame_count, 50);
    }

    #[test]
    fn test_file_config_defaults_missing_tables() {
        let config: FileConfig = toml::from_str("").unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.detector.num_gaussians, 5);
        assert_eq!(config.frame.layout, FrameLayout::Planar);
    }
}
