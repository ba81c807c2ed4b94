// tuner-core/src/lib.rs

//! The core logic for the instrument tuner.
//! This crate is responsible for audio capture, spectral analysis, pitch
//! detection and tuning classification. It is completely headless
//! and contains no GUI code.
//!
//! One analysis cycle flows in a single direction:
//! buffer → silence gate → pitch estimate → nearest note → cents → state,
//! with the display spectrum computed alongside.

pub mod audio;
pub mod config;
pub mod cycle;
pub mod device;
pub mod error;
pub mod fft;
pub mod pitch;
pub mod reference;
pub mod tuning;
pub mod worker;

pub use config::TunerConfig;
pub use cycle::{AnalysisCycle, AudioSource, CycleOutput, DisplaySink};
pub use error::{Result, TunerError};
pub use fft::Spectrum;
pub use reference::ReferenceTable;
pub use tuning::{Direction, TuningResult, TuningState};
