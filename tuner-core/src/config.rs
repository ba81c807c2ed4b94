//! # Configuration Module
//!
//! Runtime settings for capture, analysis and display. Every field has a sane
//! default so the tuner runs without any file; a `tuner.toml` only needs to
//! name the values it changes.
//!
//! ```toml
//! buffer_size = 8192
//! input_device = "USB Audio"
//!
//! [pitch]
//! strategy = "spectral_peak"
//! max_frequency = 1500.0
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TunerError};

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV_VAR: &str = "TUNER_CONFIG";

/// Config file looked up in the working directory when the variable is unset.
pub const DEFAULT_CONFIG_FILE: &str = "tuner.toml";

/// Top-level tuner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Capture sample rate requested from the device, in Hz.
    pub sample_rate: u32,
    /// Samples per analysis buffer.
    pub buffer_size: usize,
    /// Peak amplitude at or below which a buffer counts as silence.
    pub silence_threshold: f32,
    /// Period of the analysis cycle.
    pub update_interval_ms: u64,
    /// Highest frequency shipped to the spectrum display.
    pub display_limit_hz: f32,
    /// JSON file with the reference notes and instrument groupings.
    pub reference_path: PathBuf,
    /// Input device name; `None` walks the default-device fallback chain.
    pub input_device: Option<String>,
    pub pitch: PitchConfig,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            buffer_size: 4096,
            silence_threshold: 0.01,
            update_interval_ms: 100,
            display_limit_hz: 1000.0,
            reference_path: PathBuf::from("data/reference_notes.json"),
            input_device: None,
            pitch: PitchConfig::default(),
        }
    }
}

/// Which pitch estimator drives the analysis cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PitchStrategy {
    /// Frame-based peak tracking, median over frames.
    #[default]
    Tracking,
    /// Single strongest bin of the whole-buffer spectrum.
    SpectralPeak,
}

/// Pitch estimation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    pub strategy: PitchStrategy,
    /// Lower edge of the search band in Hz.
    pub min_frequency: f32,
    /// Upper edge of the search band in Hz.
    pub max_frequency: f32,
    /// Minimum peak magnitude for the spectral-peak strategy.
    pub energy_floor: f32,
    /// Peak threshold relative to the frame maximum (tracking strategy).
    pub threshold: f32,
    /// Minimum candidate salience (tracking strategy).
    pub salience_floor: f32,
    /// Analysis frame length in samples (tracking strategy).
    pub frame_size: usize,
    /// Distance between frame starts in samples (tracking strategy).
    pub hop_size: usize,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            strategy: PitchStrategy::Tracking,
            min_frequency: 50.0,
            max_frequency: 2000.0,
            energy_floor: 0.01,
            threshold: 0.1,
            salience_floor: 0.01,
            frame_size: 2048,
            hop_size: 512,
        }
    }
}

impl TunerConfig {
    /// Parses and validates a TOML config file.
    ///
    /// Keys missing from the file keep their defaults.
    ///
    /// # Errors
    /// `ConfigIo` if the file cannot be read, `ConfigFormat` if it is not
    /// valid TOML for this schema, `InvalidConfig` if validation fails.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| TunerError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config: TunerConfig =
            toml::from_str(&content).map_err(|e| TunerError::ConfigFormat {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path`, falling back to defaults when the file is absent or bad.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => {
                log::info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("{e}; using default configuration");
                Self::default()
            }
        }
    }

    /// Config file location: `$TUNER_CONFIG`, else `tuner.toml`.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Rejects values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(TunerError::InvalidConfig(msg.to_string()));
        if self.sample_rate == 0 {
            return invalid("sample_rate must be positive");
        }
        if self.buffer_size == 0 {
            return invalid("buffer_size must be positive");
        }
        if self.update_interval_ms == 0 {
            return invalid("update_interval_ms must be positive");
        }
        if !(self.silence_threshold >= 0.0) {
            return invalid("silence_threshold must be non-negative");
        }
        let p = &self.pitch;
        if !(p.min_frequency > 0.0 && p.min_frequency < p.max_frequency) {
            return invalid("pitch band must satisfy 0 < min_frequency < max_frequency");
        }
        if p.frame_size < 2 || p.hop_size == 0 {
            return invalid("frame_size must be at least 2 and hop_size positive");
        }
        if !(p.energy_floor >= 0.0 && p.threshold >= 0.0 && p.salience_floor >= 0.0) {
            return invalid("pitch floors and threshold must be non-negative");
        }
        Ok(())
    }

    /// Capture period as a `Duration`.
    pub fn update_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.update_interval_ms)
    }
}
