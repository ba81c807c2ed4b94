//! # Analysis Cycle Module
//!
//! One pass of the pipeline: gate the buffer on its peak level, estimate the
//! pitch, classify it, and prepare the spectrum for display. A cycle keeps no
//! state between invocations; the only thing shared across cycles is the
//! immutable reference table.

use std::sync::Arc;

use crate::config::TunerConfig;
use crate::error::Result;
use crate::fft::{SpectralAnalyzer, Spectrum};
use crate::pitch::{build_estimator, PitchEstimator};
use crate::reference::ReferenceTable;
use crate::tuning::{TuningClassifier, TuningResult};

/// Something that yields fixed-size mono buffers at a known sample rate.
pub trait AudioSource {
    fn sample_rate(&self) -> u32;

    /// Blocks until one fixed-size buffer is available.
    fn capture_buffer(&mut self) -> Result<Vec<f32>>;

    /// Switches to the named input device, or the default one for `None`.
    ///
    /// On error the source may have fallen back to another device, or be
    /// left without one; [`AudioSource::device_name`] tells which.
    fn configure_device(&mut self, device: Option<&str>) -> Result<()>;

    /// The device actually captured from, `None` when capture is down.
    fn device_name(&self) -> Option<&str> {
        None
    }

    /// Names of the input devices the user can choose from.
    fn devices(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Receives the outcome of every cycle.
pub trait DisplaySink {
    fn update(&mut self, result: &TuningResult, spectrum: Option<&Spectrum>);

    /// Called whenever the device list or the device in use may have
    /// changed: after the source is opened and after every device switch.
    ///
    /// # Arguments
    /// * `devices` - Input devices available for selection
    /// * `current` - The device capture is running on, if any
    fn list_devices(&mut self, devices: &[String], current: Option<&str>);
}

/// What one cycle produces for the display.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutput {
    pub result: TuningResult,
    /// Present only when the buffer passed the silence gate.
    pub spectrum: Option<Spectrum>,
}

impl CycleOutput {
    pub fn no_signal() -> Self {
        Self {
            result: TuningResult::no_signal(),
            spectrum: None,
        }
    }
}

/// Largest absolute sample value; 0.0 for an empty buffer.
pub fn peak_amplitude(buffer: &[f32]) -> f32 {
    buffer.iter().fold(0.0f32, |peak, &s| peak.max(s.abs()))
}

/// The capture-to-display pipeline for one buffer.
pub struct AnalysisCycle {
    table: Arc<ReferenceTable>,
    classifier: TuningClassifier,
    estimator: Box<dyn PitchEstimator>,
    analyzer: SpectralAnalyzer,
    silence_threshold: f32,
    display_limit_hz: f32,
}

impl AnalysisCycle {
    /// Assembles a cycle from its parts.
    ///
    /// # Arguments
    /// * `table` - Reference notes shared with the rest of the tuner
    /// * `estimator` - Pitch strategy
    /// * `buffer_size` - Expected buffer length, used to plan the display FFT
    /// * `silence_threshold` - Peak amplitude at or below which a buffer is silent
    /// * `display_limit_hz` - Highest frequency kept in the display spectrum
    pub fn new(
        table: Arc<ReferenceTable>,
        estimator: Box<dyn PitchEstimator>,
        buffer_size: usize,
        silence_threshold: f32,
        display_limit_hz: f32,
    ) -> Self {
        Self {
            classifier: TuningClassifier::new(Arc::clone(&table)),
            table,
            estimator,
            analyzer: SpectralAnalyzer::new(buffer_size),
            silence_threshold,
            display_limit_hz,
        }
    }

    /// Builds the cycle described by the config.
    pub fn from_config(config: &TunerConfig, table: Arc<ReferenceTable>) -> Self {
        let estimator = build_estimator(&config.pitch, config.buffer_size);
        log::info!("Pitch estimation strategy: {}", estimator.name());
        Self::new(
            table,
            estimator,
            config.buffer_size,
            config.silence_threshold,
            config.display_limit_hz,
        )
    }

    /// Restricts note matching to one instrument's notes.
    ///
    /// `None`, an unknown instrument, or one whose notes are all missing from
    /// the table restores matching against the full table.
    pub fn focus_instrument(&mut self, instrument: Option<&str>) {
        let notes = instrument
            .map(|name| self.table.notes_for_instrument(name))
            .unwrap_or(&[]);
        let focused = self.table.restricted_to(notes);

        self.classifier = if focused.is_empty() {
            if let Some(name) = instrument {
                log::warn!("Instrument '{name}' has no known notes, matching all notes");
            }
            TuningClassifier::new(Arc::clone(&self.table))
        } else {
            log::info!("Matching {} notes of '{}'", focused.len(), instrument.unwrap_or_default());
            TuningClassifier::new(Arc::new(focused))
        };
    }

    pub fn classifier(&self) -> &TuningClassifier {
        &self.classifier
    }

    /// Runs one buffer through the pipeline.
    ///
    /// An absent buffer (capture failure) or one whose peak does not exceed
    /// the silence threshold yields a no-signal result without any spectral
    /// work.
    pub fn run(&self, buffer: Option<&[f32]>, sample_rate: u32) -> CycleOutput {
        let Some(buffer) = buffer else {
            return CycleOutput::no_signal();
        };
        if peak_amplitude(buffer) <= self.silence_threshold {
            return CycleOutput::no_signal();
        }

        let frequency = self.estimator.estimate(buffer, sample_rate);
        let result = self.classifier.analyze(frequency);
        let spectrum = self
            .analyzer
            .spectrum_up_to(buffer, sample_rate, self.display_limit_hz);

        CycleOutput {
            result,
            spectrum: Some(spectrum),
        }
    }

    /// Captures one buffer, analyses it and hands the outcome to the sink.
    pub fn tick(&self, source: &mut dyn AudioSource, sink: &mut dyn DisplaySink) -> CycleOutput {
        let buffer = match source.capture_buffer() {
            Ok(buffer) => Some(buffer),
            Err(e) => {
                log::warn!("{e}");
                None
            }
        };
        let output = self.run(buffer.as_deref(), source.sample_rate());
        sink.update(&output.result, output.spectrum.as_ref());
        output
    }
}
