//! # Audio Worker Module
//!
//! Runs the analysis cycle on a dedicated thread at a fixed cadence and ships
//! every outcome to a [`DisplaySink`].
//!
//! ## Scheduling
//! - One thread, one cycle at a time: a tick that fires while a cycle is
//!   still capturing is coalesced into the next one, never run in parallel.
//! - Commands (device change, instrument focus, shutdown) are handled
//!   between cycles only.
//! - A missing or failing audio source degrades to no-signal results; the
//!   loop itself never stops on expected errors.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use crate::cycle::{AnalysisCycle, AudioSource, CycleOutput, DisplaySink};
use crate::fft::Spectrum;
use crate::tuning::TuningResult;

/// Requests the GUI can make of the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerCommand {
    /// Capture from the named device, or the default one for `None`.
    SelectDevice(Option<String>),
    /// Match only this instrument's notes, or all notes for `None`.
    SelectInstrument(Option<String>),
    Shutdown,
}

/// What the worker thread reports to the display thread.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    /// Outcome of one analysis cycle.
    Cycle(CycleOutput),
    /// The selectable devices and the one capture is running on.
    Devices {
        devices: Vec<String>,
        current: Option<String>,
    },
}

/// A display sink that forwards outcomes to another thread.
///
/// Cycle results are dropped rather than queued when the receiver falls
/// behind. Device reports are rare and must not be lost, so they wait
/// briefly for room in the queue.
pub struct ChannelSink {
    sender: Sender<SinkEvent>,
}

/// How long a device report may wait for a full queue to drain.
const DEVICE_REPORT_TIMEOUT: Duration = Duration::from_millis(250);

impl ChannelSink {
    pub fn new(sender: Sender<SinkEvent>) -> Self {
        Self { sender }
    }

    /// A sink and the receiving end of its channel.
    pub fn bounded(capacity: usize) -> (Self, Receiver<SinkEvent>) {
        let (sender, receiver) = crossbeam_channel::bounded(capacity);
        (Self::new(sender), receiver)
    }
}

impl DisplaySink for ChannelSink {
    fn update(&mut self, result: &TuningResult, spectrum: Option<&Spectrum>) {
        let output = CycleOutput {
            result: result.clone(),
            spectrum: spectrum.cloned(),
        };
        if self.sender.try_send(SinkEvent::Cycle(output)).is_err() {
            log::debug!("Display is behind, dropping a result");
        }
    }

    fn list_devices(&mut self, devices: &[String], current: Option<&str>) {
        let event = SinkEvent::Devices {
            devices: devices.to_vec(),
            current: current.map(str::to_string),
        };
        if let Err(e) = self.sender.send_timeout(event, DEVICE_REPORT_TIMEOUT) {
            log::warn!("[AUDIO-THREAD] Device report not delivered: {e}");
        }
    }
}

/// Handle to the running audio worker thread.
#[derive(Debug)]
pub struct TunerWorker {
    commands: Sender<WorkerCommand>,
    thread_handle: Option<JoinHandle<()>>,
}

impl TunerWorker {
    /// Starts the worker thread.
    ///
    /// `open_source` runs on the worker thread (audio streams are not always
    /// `Send`). It is called once at startup with `None`, and again with the
    /// requested device name whenever a device is selected while no source
    /// is open.
    pub fn spawn<F, S>(
        open_source: F,
        cycle: AnalysisCycle,
        sink: S,
        interval: Duration,
    ) -> std::io::Result<Self>
    where
        F: FnMut(Option<&str>) -> anyhow::Result<Box<dyn AudioSource>> + Send + 'static,
        S: DisplaySink + Send + 'static,
    {
        let (commands, command_rx) = crossbeam_channel::unbounded();
        let thread_handle = thread::Builder::new()
            .name("tuner-audio".into())
            .spawn(move || run(open_source, cycle, sink, command_rx, interval))?;

        Ok(Self {
            commands,
            thread_handle: Some(thread_handle),
        })
    }

    /// Queues a command; false if the worker has already stopped.
    pub fn send(&self, command: WorkerCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn select_device(&self, device: Option<String>) -> bool {
        self.send(WorkerCommand::SelectDevice(device))
    }

    pub fn select_instrument(&self, instrument: Option<String>) -> bool {
        self.send(WorkerCommand::SelectInstrument(instrument))
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stops the worker and waits for the current cycle to finish.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.commands.send(WorkerCommand::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("[AUDIO-THREAD] Worker panicked");
            }
        }
    }
}

impl Drop for TunerWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_logged<F>(open_source: &mut F, device: Option<&str>) -> Option<Box<dyn AudioSource>>
where
    F: FnMut(Option<&str>) -> anyhow::Result<Box<dyn AudioSource>>,
{
    match open_source(device) {
        Ok(source) => Some(source),
        Err(e) => {
            log::error!("[AUDIO-THREAD] Audio capture unavailable: {e:#}");
            None
        }
    }
}

/// Tells the sink which devices exist and which one is in use.
fn report_devices<S: DisplaySink>(source: Option<&dyn AudioSource>, sink: &mut S) {
    match source {
        Some(active) => sink.list_devices(&active.devices(), active.device_name()),
        None => sink.list_devices(&[], None),
    }
}

fn run<F, S>(
    mut open_source: F,
    mut cycle: AnalysisCycle,
    mut sink: S,
    commands: Receiver<WorkerCommand>,
    interval: Duration,
) where
    F: FnMut(Option<&str>) -> anyhow::Result<Box<dyn AudioSource>>,
    S: DisplaySink,
{
    log::info!("[AUDIO-THREAD] Started, one cycle every {} ms", interval.as_millis());
    let mut source = open_logged(&mut open_source, None);
    report_devices(source.as_deref(), &mut sink);
    let ticker = crossbeam_channel::tick(interval);

    loop {
        crossbeam_channel::select! {
            recv(commands) -> command => match command {
                Ok(WorkerCommand::SelectDevice(device)) => {
                    match source.as_mut() {
                        Some(active) => {
                            if let Err(e) = active.configure_device(device.as_deref()) {
                                log::error!("[AUDIO-THREAD] {e}");
                            }
                        }
                        None => source = open_logged(&mut open_source, device.as_deref()),
                    }
                    report_devices(source.as_deref(), &mut sink);
                }
                Ok(WorkerCommand::SelectInstrument(instrument)) => {
                    cycle.focus_instrument(instrument.as_deref());
                }
                Ok(WorkerCommand::Shutdown) | Err(_) => break,
            },
            recv(ticker) -> _ => match source.as_mut() {
                Some(active) => {
                    cycle.tick(&mut **active, &mut sink);
                }
                None => {
                    let output = CycleOutput::no_signal();
                    sink.update(&output.result, None);
                }
            },
        }
    }

    log::info!("[AUDIO-THREAD] Stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TunerError;
    use crate::pitch::{PitchTracker, SearchBand};
    use crate::reference::ReferenceTable;
    use crate::tuning::TuningState;
    use std::sync::Arc;

    const SAMPLE_RATE: u32 = 44_100;
    const DEVICES: [&str; 3] = ["Built-in", "USB", "Broken"];

    /// A sine generator posing as a host with three microphones, one of
    /// which refuses to open.
    struct SineSource {
        freq: f32,
        device: Option<String>,
    }

    impl SineSource {
        fn boxed(freq: f32) -> Box<dyn AudioSource> {
            Box::new(Self {
                freq,
                device: Some("Built-in".into()),
            })
        }
    }

    impl AudioSource for SineSource {
        fn sample_rate(&self) -> u32 {
            SAMPLE_RATE
        }

        fn capture_buffer(&mut self) -> crate::error::Result<Vec<f32>> {
            Ok((0..4096)
                .map(|i| {
                    0.4 * (2.0 * std::f32::consts::PI * self.freq * i as f32 / SAMPLE_RATE as f32)
                        .sin()
                })
                .collect())
        }

        fn configure_device(&mut self, device: Option<&str>) -> crate::error::Result<()> {
            match device {
                Some("Broken") => {
                    self.device = Some("Built-in".into());
                    Err(TunerError::Device("Broken refuses the stream".into()))
                }
                Some(name) => {
                    self.device = Some(name.to_string());
                    Ok(())
                }
                None => {
                    self.device = Some("Built-in".into());
                    Ok(())
                }
            }
        }

        fn device_name(&self) -> Option<&str> {
            self.device.as_deref()
        }

        fn devices(&self) -> Vec<String> {
            DEVICES.iter().map(|d| d.to_string()).collect()
        }
    }

    fn cycle() -> AnalysisCycle {
        let table = ReferenceTable::from_notes([("A4", 440.0), ("E4", 329.63)]);
        let tracker = PitchTracker::new(2048, 512, SearchBand::default(), 0.1, 0.01);
        AnalysisCycle::new(Arc::new(table), Box::new(tracker), 4096, 0.01, 1000.0)
    }

    fn next_event(receiver: &Receiver<SinkEvent>) -> SinkEvent {
        receiver
            .recv_timeout(Duration::from_secs(5))
            .expect("worker produced no output")
    }

    /// The next cycle result, skipping device reports.
    fn next(receiver: &Receiver<SinkEvent>) -> CycleOutput {
        loop {
            if let SinkEvent::Cycle(output) = next_event(receiver) {
                return output;
            }
        }
    }

    /// The next device report, skipping cycle results.
    fn next_devices(receiver: &Receiver<SinkEvent>) -> (Vec<String>, Option<String>) {
        loop {
            if let SinkEvent::Devices { devices, current } = next_event(receiver) {
                return (devices, current);
            }
        }
    }

    #[test]
    fn worker_streams_results_until_shutdown() {
        let (sink, results) = ChannelSink::bounded(16);
        let worker = TunerWorker::spawn(
            |_| Ok(SineSource::boxed(440.0)),
            cycle(),
            sink,
            Duration::from_millis(5),
        )
        .unwrap();

        for _ in 0..3 {
            let output = next(&results);
            assert_eq!(output.result.note.as_deref(), Some("A4"));
            assert_eq!(output.result.state, TuningState::InTune);
            assert!(output.spectrum.is_some());
        }
        assert!(worker.is_running());
        worker.shutdown();
    }

    #[test]
    fn worker_reports_the_device_in_use() {
        let (sink, results) = ChannelSink::bounded(16);
        let worker = TunerWorker::spawn(
            |_| Ok(SineSource::boxed(440.0)),
            cycle(),
            sink,
            Duration::from_millis(5),
        )
        .unwrap();

        let (devices, current) = next_devices(&results);
        assert_eq!(devices, DEVICES);
        assert_eq!(current.as_deref(), Some("Built-in"));

        assert!(worker.select_device(Some("USB".into())));
        assert_eq!(next_devices(&results).1.as_deref(), Some("USB"));
        worker.shutdown();
    }

    #[test]
    fn failed_device_switch_reports_the_fallback() {
        let (sink, results) = ChannelSink::bounded(16);
        let worker = TunerWorker::spawn(
            |_| Ok(SineSource::boxed(440.0)),
            cycle(),
            sink,
            Duration::from_millis(5),
        )
        .unwrap();
        next_devices(&results);

        assert!(worker.select_device(Some("Broken".into())));
        assert_eq!(next_devices(&results).1.as_deref(), Some("Built-in"));
        // Capture carries on after the failed switch.
        assert_eq!(next(&results).result.note.as_deref(), Some("A4"));
        worker.shutdown();
    }

    #[test]
    fn worker_without_source_reports_no_signal() {
        let (sink, results) = ChannelSink::bounded(16);
        let worker = TunerWorker::spawn(
            |_| Err(anyhow::anyhow!("no microphone")),
            cycle(),
            sink,
            Duration::from_millis(5),
        )
        .unwrap();

        assert_eq!(next_devices(&results), (Vec::new(), None));
        let output = next(&results);
        assert_eq!(output, CycleOutput::no_signal());
        worker.shutdown();
    }

    #[test]
    fn instrument_command_without_groupings_matches_all_notes() {
        let (sink, results) = ChannelSink::bounded(1);
        let mut cycle = cycle();
        // Without instruments in the table, focusing keeps the full table.
        cycle.focus_instrument(Some("guitar"));
        let worker = TunerWorker::spawn(
            |_| Ok(SineSource::boxed(330.0)),
            cycle,
            sink,
            Duration::from_millis(5),
        )
        .unwrap();

        assert!(worker.select_instrument(None));
        let output = next(&results);
        assert_eq!(output.result.note.as_deref(), Some("E4"));
        drop(worker);
    }

    #[test]
    fn failed_capture_counts_as_no_signal() {
        struct BrokenSource;

        impl AudioSource for BrokenSource {
            fn sample_rate(&self) -> u32 {
                SAMPLE_RATE
            }

            fn capture_buffer(&mut self) -> crate::error::Result<Vec<f32>> {
                Err(TunerError::Capture("device unplugged".into()))
            }

            fn configure_device(&mut self, _device: Option<&str>) -> crate::error::Result<()> {
                Ok(())
            }
        }

        let (mut sink, results) = ChannelSink::bounded(1);
        let output = cycle().tick(&mut BrokenSource, &mut sink);
        assert_eq!(output, CycleOutput::no_signal());
        assert_eq!(results.try_recv().unwrap(), SinkEvent::Cycle(CycleOutput::no_signal()));
    }
}
