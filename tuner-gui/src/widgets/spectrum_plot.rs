//! # Spectrum Plot Widget
//!
//! Real-time magnitude spectrum of the last analysed buffer, drawn as a bar
//! chart over a linear frequency axis, with the detected pitch marked.

use iced::alignment::Horizontal;
use iced::widget::canvas::{self, Geometry, Path, Stroke, Text};
use iced::widget::container;
use iced::{mouse, Color, Element, Pixels, Point, Rectangle, Renderer, Size, Theme};
use tuner_core::Spectrum;

/// Small epsilon value to prevent log(0) errors in magnitude calculations.
const EPSILON: f32 = 1e-12;

/// Height reserved under the bars for the frequency labels.
const AXIS_HEIGHT: f32 = 18.0;

/// Frequency between two axis labels.
const LABEL_STEP_HZ: f32 = 100.0;

pub struct SpectrumPlot {
    spectrum: Option<Spectrum>,
    detected_frequency: Option<f32>,
    limit_hz: f32,
}

impl SpectrumPlot {
    pub fn new(spectrum: Option<Spectrum>, detected_frequency: Option<f32>, limit_hz: f32) -> Self {
        Self {
            spectrum,
            detected_frequency,
            limit_hz,
        }
    }

    pub fn view(self) -> Element<'static, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fill),
        )
        .into()
    }

    fn x_of(&self, frequency: f32, width: f32) -> f32 {
        frequency / self.limit_hz * width
    }

    fn draw_axis(&self, frame: &mut canvas::Frame, width: f32, plot_height: f32) {
        let axis = Path::line(Point::new(0.0, plot_height), Point::new(width, plot_height));
        frame.stroke(&axis, Stroke::default().with_width(1.0).with_color(Color::WHITE));

        let labels = (self.limit_hz / LABEL_STEP_HZ) as usize;
        for i in 0..=labels {
            let frequency = i as f32 * LABEL_STEP_HZ;
            frame.fill_text(Text {
                content: format!("{frequency:.0}"),
                position: Point::new(self.x_of(frequency, width), plot_height + 2.0),
                color: Color::from_rgb8(0xB0, 0xB0, 0xB0),
                size: Pixels(11.0),
                horizontal_alignment: Horizontal::Center,
                ..Text::default()
            });
        }
    }
}

impl<Message> canvas::Program<Message> for SpectrumPlot {
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

        if !bounds.width.is_finite() || !bounds.height.is_finite() || self.limit_hz <= 0.0 {
            return vec![frame.into_geometry()];
        }
        let plot_height = (bounds.height - AXIS_HEIGHT).max(0.0);
        self.draw_axis(&mut frame, bounds.width, plot_height);

        let Some(spectrum) = self.spectrum.as_ref().filter(|s| !s.is_empty()) else {
            return vec![frame.into_geometry()];
        };

        let max_magnitude = spectrum.magnitudes.iter().fold(0.0f32, |max, &val| val.max(max));
        if max_magnitude <= 0.0 {
            return vec![frame.into_geometry()];
        }

        // Log scale relative to the peak, one decade per quarter of the height.
        let log_max = (max_magnitude + EPSILON).log10();
        let bar_width = (bounds.width / spectrum.len() as f32).max(1.0);

        for (&frequency, &magnitude) in spectrum.frequencies.iter().zip(&spectrum.magnitudes) {
            let decades_below = log_max - (magnitude + EPSILON).log10();
            let height = (1.0 - decades_below / 4.0).clamp(0.0, 1.0) * plot_height;

            if height.is_finite() && height > 0.0 {
                let bar = Path::rectangle(
                    Point::new(self.x_of(frequency, bounds.width), plot_height - height),
                    Size::new(bar_width, height),
                );
                frame.fill(&bar, Color::from_rgb8(0x34, 0x98, 0xDB));
            }
        }

        if let Some(detected) = self.detected_frequency.filter(|f| *f <= self.limit_hz) {
            let x = self.x_of(detected, bounds.width);
            let marker = Path::line(Point::new(x, 0.0), Point::new(x, plot_height));
            frame.stroke(
                &marker,
                Stroke::default()
                    .with_width(2.0)
                    .with_color(Color::from_rgb8(0xFF, 0x33, 0x33)),
            );
            frame.fill_text(Text {
                content: format!("{detected:.1} Hz"),
                position: Point::new(x + 4.0, 2.0),
                color: Color::from_rgb8(0xFF, 0x33, 0x33),
                size: Pixels(12.0),
                ..Text::default()
            });
        }

        vec![frame.into_geometry()]
    }
}
