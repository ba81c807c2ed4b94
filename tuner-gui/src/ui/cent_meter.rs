//! # Cent Meter Widget
//!
//! This module provides a visual cent deviation meter for string tuning.
//! It displays the tuning accuracy with colour-coded zones and a
//! needle showing how far the current pitch is from the nearest note.
//!
//! ## Features
//! - Deviation display from -50 to +50 cents
//! - Shaded in-tune and near zones matching the classifier thresholds
//! - Needle coloured by the tuning verdict
//! - Tick marks every 10 cents

use iced::widget::canvas::{self, Geometry, Path, Stroke};
use iced::widget::container;
use iced::{mouse, Color, Element, Point, Rectangle, Renderer, Size, Theme};
use tuner_core::tuning::{IN_TUNE_CENTS, NEAR_CENTS};
use tuner_core::TuningState;

use super::state_color;

/// Maximum cent deviation range for the meter display.
/// The meter shows deviations from -50 to +50 cents.
const METER_RANGE: f32 = 50.0;

const TICK_STEP: usize = 10;

/// Cent meter widget for displaying tuning accuracy.
pub struct CentMeter {
    /// Current cent deviation (None if no pitch detected)
    cents: Option<f32>,
    state: TuningState,
}

impl CentMeter {
    pub fn new(cents: Option<f32>, state: TuningState) -> Self {
        Self { cents, state }
    }

    /// Creates the view element for the cent meter.
    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fixed(80.0)),
        )
        .into()
    }
}

/// Horizontal position of a deviation on a meter `width` pixels wide.
fn cents_to_x(cents: f32, width: f32) -> f32 {
    let clamped = cents.clamp(-METER_RANGE, METER_RANGE);
    (clamped + METER_RANGE) / (2.0 * METER_RANGE) * width
}

impl<Message> canvas::Program<Message> for CentMeter {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());

        // Draw meter background
        let background = Path::rectangle(Point::ORIGIN, bounds.size());
        frame.fill(&background, Color::from_rgb8(0x40, 0x40, 0x40));

        // Near zone first, in-tune zone on top of it
        for (limit, state) in [(NEAR_CENTS, TuningState::Near), (IN_TUNE_CENTS, TuningState::InTune)] {
            let left = cents_to_x(-limit, bounds.width);
            let right = cents_to_x(limit, bounds.width);
            let zone = Path::rectangle(Point::new(left, 0.0), Size::new(right - left, bounds.height));
            frame.fill(&zone, Color { a: 0.25, ..state_color(state) });
        }

        for tick in (-(METER_RANGE as i32)..=METER_RANGE as i32).step_by(TICK_STEP) {
            let x = cents_to_x(tick as f32, bounds.width);
            let length = if tick == 0 { bounds.height } else { bounds.height * 0.25 };
            let mark = Path::line(Point::new(x, bounds.height - length), Point::new(x, bounds.height));
            let width = if tick == 0 { 2.0 } else { 1.0 };
            frame.stroke(
                &mark,
                Stroke::default().with_width(width).with_color(Color::WHITE),
            );
        }

        // Draw needle
        if let Some(c) = self.cents {
            let needle_pos = cents_to_x(c, bounds.width);
            let needle =
                Path::rectangle(Point::new(needle_pos - 2.0, 0.0), Size::new(4.0, bounds.height));
            frame.fill(&needle, state_color(self.state));
        }

        vec![frame.into_geometry()]
    }
}
