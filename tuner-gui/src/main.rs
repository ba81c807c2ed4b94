//! # Instrument Tuner GUI
//!
//! This module contains the main GUI application for the instrument tuner.
//! It shows the nearest note, the deviation in cents and the live spectrum,
//! and lets the user pick the microphone and the instrument being tuned.
//!
//! ## Architecture
//! - **Main Thread**: Iced GUI application with dark theme
//! - **Audio Thread**: `TunerWorker` capturing and analysing one buffer per cycle
//! - **Communication**: Crossbeam channels for thread-safe data exchange
//! - **Updates**: 60 FPS UI refresh draining the latest analysis results

mod ui;
mod widgets;

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use iced::{window, Element, Subscription, Task, Theme};
use tuner_core::{
    audio::{self, CpalSource},
    worker::{ChannelSink, SinkEvent, TunerWorker},
    AnalysisCycle, AudioSource, CycleOutput, ReferenceTable, TunerConfig,
};
use ui::main_display::create_main_view;

/// Label of the instrument entry that matches every note in the table.
pub const CHROMATIC: &str = "Chromatic";

/// Results the GUI may fall behind on before the worker starts dropping them.
const RESULT_QUEUE_DEPTH: usize = 8;

/// Main entry point for the tuner application.
pub fn main() -> iced::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("[MAIN] Starting instrument tuner...");
    let result = iced::application("Instrument Tuner", TunerApp::update, TunerApp::view)
        .subscription(TunerApp::subscription)
        .theme(TunerApp::theme)
        .exit_on_close_request(false)
        .run();
    log::info!("[MAIN] Application finished with result: {result:?}");
    result
}

/// Application message types for the Iced GUI framework.
#[derive(Debug, Clone)]
pub enum Message {
    /// User picked an input device from the list
    DeviceSelected(String),
    /// User picked an instrument (or the chromatic entry)
    InstrumentSelected(String),
    /// Timer tick for real-time updates
    Tick,
    /// The window is about to close; the audio thread must stop first
    CloseRequested(window::Id),
}

/// UI-specific data needed for rendering the interface.
#[derive(Debug, Clone)]
pub struct AppDisplayData {
    pub audio_worker_active: bool,
    pub last_output: CycleOutput,
    pub display_limit_hz: f32,

    // Device selection, as last reported by the audio thread
    pub devices: Vec<String>,
    pub selected_device: Option<String>,

    // Instrument selection, chromatic first
    pub instruments: Vec<String>,
    pub selected_instrument: String,
}

/// Main application state for the tuner.
struct TunerApp {
    worker: Option<TunerWorker>,
    analysis_receiver: Receiver<SinkEvent>,
    display_data: AppDisplayData,
}

impl Default for TunerApp {
    /// Loads configuration and reference data, then starts the audio worker.
    fn default() -> Self {
        let config = TunerConfig::load_or_default(&TunerConfig::default_path());
        let table = Arc::new(ReferenceTable::load_or_empty(&config.reference_path));

        let instruments = std::iter::once(CHROMATIC.to_string())
            .chain(table.instrument_names().map(str::to_string))
            .collect();
        let cycle = AnalysisCycle::from_config(&config, Arc::clone(&table));
        let (sink, analysis_receiver) = ChannelSink::bounded(RESULT_QUEUE_DEPTH);

        let worker = start_audio_processing(&config, cycle, sink);
        Self {
            display_data: AppDisplayData {
                audio_worker_active: worker.is_some(),
                last_output: CycleOutput::no_signal(),
                display_limit_hz: config.display_limit_hz,
                devices: audio::list_input_devices(),
                selected_device: None,
                instruments,
                selected_instrument: CHROMATIC.to_string(),
            },
            worker,
            analysis_receiver,
        }
    }
}

/// Starts the dedicated audio processing thread.
///
/// The cpal stream is opened on the worker thread itself; if no device can
/// be opened the worker still runs and reports "no signal" every cycle.
fn start_audio_processing(
    config: &TunerConfig,
    cycle: AnalysisCycle,
    sink: ChannelSink,
) -> Option<TunerWorker> {
    let source_config = config.clone();
    let open_source = move |device: Option<&str>| -> anyhow::Result<Box<dyn AudioSource>> {
        let device = device.or(source_config.input_device.as_deref());
        let source = CpalSource::open(&source_config, device)?;
        Ok(Box::new(source))
    };

    match TunerWorker::spawn(open_source, cycle, sink, config.update_interval()) {
        Ok(worker) => Some(worker),
        Err(e) => {
            log::error!("[MAIN] Fatal error starting the audio thread: {e}");
            None
        }
    }
}

impl TunerApp {
    /// Handles application state updates based on incoming messages.
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::CloseRequested(id) => {
                log::info!("[MAIN] Window close requested, stopping audio worker...");
                if let Some(worker) = self.worker.take() {
                    worker.shutdown();
                }
                self.display_data.audio_worker_active = false;
                return window::close(id);
            }
            Message::DeviceSelected(device) => {
                log::info!("[MAIN] Switching input device to {device}");
                // The picker follows the worker's report, which names the
                // device actually in use after any fallback.
                if let Some(worker) = &self.worker {
                    worker.select_device(Some(device));
                }
            }
            Message::InstrumentSelected(instrument) => {
                let focus = (instrument != CHROMATIC).then(|| instrument.clone());
                if let Some(worker) = &self.worker {
                    worker.select_instrument(focus);
                }
                self.display_data.selected_instrument = instrument;
            }
            Message::Tick => {
                // Only the newest result matters for the display.
                for event in self.analysis_receiver.try_iter() {
                    match event {
                        SinkEvent::Cycle(output) => self.display_data.last_output = output,
                        SinkEvent::Devices { devices, current } => {
                            log::info!(
                                "[MAIN] Capturing from {}",
                                current.as_deref().unwrap_or("no device")
                            );
                            if !devices.is_empty() {
                                self.display_data.devices = devices;
                            }
                            self.display_data.selected_device = current;
                        }
                    }
                }
                self.display_data.audio_worker_active =
                    self.worker.as_ref().is_some_and(TunerWorker::is_running);
            }
        }
        Task::none()
    }

    /// Renders the main application interface.
    fn view(&self) -> Element<'_, Message> {
        create_main_view(&self.display_data)
    }

    /// Redraw timer at 60 FPS plus window close requests.
    fn subscription(&self) -> Subscription<Message> {
        Subscription::batch([
            iced::time::every(Duration::from_millis(16)).map(|_| Message::Tick),
            window::close_requests().map(Message::CloseRequested),
        ])
    }

    fn theme(&self) -> Theme {
        Theme::Dark
    }
}
