//! # UI Module
//!
//! This module contains the layout and panels of the tuner window.

pub mod cent_meter;
pub mod main_display;

use iced::Color;
use tuner_core::TuningState;

/// Accent colour for a tuning verdict, shared by the note label and the meter.
pub fn state_color(state: TuningState) -> Color {
    match state {
        TuningState::InTune => Color::from_rgb8(0x34, 0xDB, 0x98),
        TuningState::Near => Color::from_rgb8(0xFF, 0xC3, 0x00),
        TuningState::OutOfTune => Color::from_rgb8(0xFF, 0x33, 0x33),
        TuningState::NoSignal => Color::from_rgb8(0x80, 0x80, 0x80),
    }
}
