//! # Error Types
//!
//! Every failure the tuner expects to meet at runtime. The analysis pipeline
//! absorbs all of them at its boundary and turns them into a neutral
//! "no signal" result, so only setup code ever needs to match on these.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, TunerError>;

/// Errors originating from the tuner core.
#[derive(Debug, Error)]
pub enum TunerError {
    /// A configuration or reference-data file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration or reference-data file was read but is malformed.
    #[error("{} is malformed: {reason}", path.display())]
    ConfigFormat { path: PathBuf, reason: String },

    /// Configuration values that cannot drive the pipeline.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The audio source failed to deliver a buffer.
    #[error("audio capture failed: {0}")]
    Capture(String),

    /// No usable input device, or the device refused the stream.
    #[error("audio device error: {0}")]
    Device(String),
}

impl TunerError {
    /// True for the configuration family (file missing, unparseable or invalid).
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            TunerError::ConfigIo { .. }
                | TunerError::ConfigFormat { .. }
                | TunerError::InvalidConfig(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_family_is_recognised() {
        let missing = TunerError::ConfigIo {
            path: PathBuf::from("notes.json"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(missing.is_config());
        assert!(missing.to_string().contains("notes.json"));
        assert!(TunerError::InvalidConfig("x".into()).is_config());
        assert!(!TunerError::Capture("timeout".into()).is_config());
    }
}
