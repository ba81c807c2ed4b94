//! # Main Display Module
//!
//! This module contains the main display components and layout logic
//! for the tuner window: the note readout, the cent meter, the spectrum
//! and the device and instrument pickers.

use iced::widget::{column, container, horizontal_space, pick_list, row, text, Space};
use iced::{Alignment, Color, Element, Length};
use tuner_core::{Direction, TuningResult, TuningState};

use super::{cent_meter, state_color};
use crate::widgets::spectrum_plot;

/// Creates the complete main application view
pub fn create_main_view(data: &crate::AppDisplayData) -> Element<'static, crate::Message> {
    log::trace!("[VIEW] Rendering GUI...");

    let title = text("Instrument Tuner").size(28);

    let main_content = column![
        row![title, horizontal_space(), create_worker_badge(data)].align_y(Alignment::Center),
        Space::with_height(10),
        create_selector_row(data),
        Space::with_height(20),
        create_note_panel(&data.last_output.result),
        Space::with_height(10),
        create_cent_meter_panel(&data.last_output.result),
        Space::with_height(10),
        create_spectrum_panel(data),
    ]
    .width(Length::Fill)
    .spacing(10)
    .padding(20);

    container(main_content)
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

/// Text telling the user what to do with the string.
pub fn status_text(result: &TuningResult) -> &'static str {
    match (result.state, result.direction) {
        (TuningState::NoSignal, _) => "Waiting for audio...",
        (TuningState::InTune, _) => "IN TUNE",
        (_, Direction::Flat) => "TUNE UP",
        (_, Direction::Sharp) => "TUNE DOWN",
        (_, Direction::Centered) => "IN TUNE",
    }
}

/// Signed deviation label, e.g. "+3.2 cents".
pub fn cents_text(result: &TuningResult) -> String {
    if result.has_signal() {
        format!("{:+.1} cents", result.cents)
    } else {
        "-- cents".to_string()
    }
}

fn create_worker_badge(data: &crate::AppDisplayData) -> Element<'static, crate::Message> {
    if data.audio_worker_active {
        text("Listening").size(14).color(state_color(TuningState::InTune)).into()
    } else {
        text("Audio stopped").size(14).color(state_color(TuningState::OutOfTune)).into()
    }
}

fn create_selector_row(data: &crate::AppDisplayData) -> Element<'static, crate::Message> {
    let devices = pick_list(
        data.devices.clone(),
        data.selected_device.clone(),
        crate::Message::DeviceSelected,
    )
    .placeholder("No input device")
    .width(Length::Fill);

    let instruments = pick_list(
        data.instruments.clone(),
        Some(data.selected_instrument.clone()),
        crate::Message::InstrumentSelected,
    )
    .width(Length::Fixed(180.0));

    row![
        text("Microphone").size(16),
        devices,
        Space::with_width(20),
        text("Instrument").size(16),
        instruments,
    ]
    .spacing(10)
    .align_y(Alignment::Center)
    .into()
}

fn create_note_panel(result: &TuningResult) -> Element<'static, crate::Message> {
    let color = state_color(result.state);
    let note = result.note.clone().unwrap_or_else(|| "--".to_string());
    let solfege = result.solfege.clone().unwrap_or_default();
    let frequency = match (result.detected_frequency, result.reference_frequency) {
        (Some(detected), Some(reference)) => format!("{detected:.2} Hz  (target {reference:.2} Hz)"),
        (Some(detected), None) => format!("{detected:.2} Hz"),
        _ => "No signal".to_string(),
    };

    let panel = column![
        row![
            text(note).size(72).color(color),
            Space::with_width(20),
            text(solfege).size(36).color(Color::from_rgb8(0xB0, 0xB0, 0xB0)),
        ]
        .align_y(Alignment::End),
        text(frequency).size(20),
        text(status_text(result)).size(32).color(color),
    ]
    .spacing(8)
    .align_x(Alignment::Center);

    container(panel).width(Length::Fill).center_x(Length::Fill).into()
}

/// Creates the cent meter panel
fn create_cent_meter_panel(result: &TuningResult) -> Element<'static, crate::Message> {
    let cents = result.has_signal().then_some(result.cents);

    container(
        column![
            row![text("Deviation").size(18), horizontal_space(), text(cents_text(result)).size(18)],
            cent_meter::CentMeter::new(cents, result.state).view(),
        ]
        .spacing(5)
        .padding(15),
    )
    .width(Length::Fill)
    .into()
}

/// Creates the spectrum panel widget.
fn create_spectrum_panel(data: &crate::AppDisplayData) -> Element<'static, crate::Message> {
    let output = &data.last_output;
    let plot = spectrum_plot::SpectrumPlot::new(
        output.spectrum.clone(),
        output.result.detected_frequency,
        data.display_limit_hz,
    );

    container(
        column![
            text(format!("Spectrum (0 - {:.0} Hz)", data.display_limit_hz)).size(18),
            Space::with_height(10),
            plot.view(),
        ]
        .spacing(5)
        .padding(15),
    )
    .width(Length::Fill)
    .height(Length::Fixed(260.0))
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(cents: f32, state: TuningState) -> TuningResult {
        TuningResult {
            note: Some("A4".into()),
            solfege: Some("LA4".into()),
            detected_frequency: Some(440.0),
            reference_frequency: Some(440.0),
            cents,
            state,
            direction: Direction::from_cents(cents),
        }
    }

    #[test]
    fn status_follows_state_and_direction() {
        assert_eq!(status_text(&TuningResult::no_signal()), "Waiting for audio...");
        assert_eq!(status_text(&result(2.0, TuningState::InTune)), "IN TUNE");
        assert_eq!(status_text(&result(-10.0, TuningState::Near)), "TUNE UP");
        assert_eq!(status_text(&result(30.0, TuningState::OutOfTune)), "TUNE DOWN");
    }

    #[test]
    fn cents_are_signed() {
        assert_eq!(cents_text(&result(3.24, TuningState::InTune)), "+3.2 cents");
        assert_eq!(cents_text(&result(-12.0, TuningState::Near)), "-12.0 cents");
        assert_eq!(cents_text(&TuningResult::no_signal()), "-- cents");
    }
}
