//! # Audio Capture Module
//!
//! This module handles real-time audio capture using CPAL (Cross-Platform Audio Library).
//! It provides the microphone-backed [`AudioSource`], device enumeration, and the
//! device fallback chain wired to the real host.
//!
//! ## Features
//! - Device selection by name with default/first-available fallback
//! - Any channel count, downmixed to mono
//! - Fixed-size frames handed over through a bounded channel
//! - Capture calls that return the freshest frame instead of a stale backlog

use std::time::Duration;

use anyhow::anyhow;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::{Receiver, Sender};

use crate::config::TunerConfig;
use crate::cycle::AudioSource;
use crate::device::{device_names, open_first, DeviceCatalog};
use crate::error::{Result, TunerError};

/// Frames buffered between the stream callback and the analysis cycle.
const FRAME_QUEUE_DEPTH: usize = 4;

/// The input devices of a cpal host.
pub struct CpalCatalog<'a> {
    host: &'a cpal::Host,
}

impl<'a> CpalCatalog<'a> {
    pub fn new(host: &'a cpal::Host) -> Self {
        Self { host }
    }
}

impl DeviceCatalog for CpalCatalog<'_> {
    type Device = cpal::Device;

    fn default_input(&self) -> Option<cpal::Device> {
        self.host.default_input_device()
    }

    fn inputs(&self) -> Vec<cpal::Device> {
        match self.host.input_devices() {
            Ok(devices) => devices.collect(),
            Err(e) => {
                log::warn!("Cannot enumerate input devices: {e}");
                Vec::new()
            }
        }
    }

    fn name_of(&self, device: &cpal::Device) -> Option<String> {
        device.name().ok()
    }
}

/// Names of all input devices on the default host.
pub fn list_input_devices() -> Vec<String> {
    let host = cpal::default_host();
    device_names(&CpalCatalog::new(&host))
}

/// Microphone input through cpal.
pub struct CpalSource {
    host: cpal::Host,
    target_rate: u32,
    buffer_size: usize,
    sample_rate: u32,
    device_name: Option<String>,
    stream: Option<cpal::Stream>,
    frames: Receiver<Vec<f32>>,
}

impl CpalSource {
    /// Opens the requested device (or the fallback chain) and starts capturing.
    ///
    /// # Arguments
    /// * `config` - Supplies the target sample rate and buffer size
    /// * `device` - Input device name to try first
    ///
    /// # Returns
    /// A capturing source, or an error if no device in the chain accepts an
    /// f32 input stream.
    pub fn open(config: &TunerConfig, device: Option<&str>) -> anyhow::Result<Self> {
        let (_, frames) = crossbeam_channel::bounded(1);
        let mut source = Self {
            host: cpal::default_host(),
            target_rate: config.sample_rate,
            buffer_size: config.buffer_size,
            sample_rate: config.sample_rate,
            device_name: None,
            stream: None,
            frames,
        };
        source.start(device)?;
        Ok(source)
    }

    /// Starts capturing from `requested`, or from the first device of the
    /// fallback chain that accepts a stream.
    ///
    /// The running stream is released first, since some hosts refuse to open
    /// a device twice. On failure the source is left without a stream and
    /// without a device name, so it never reports a device it is not using.
    fn start(&mut self, requested: Option<&str>) -> anyhow::Result<()> {
        self.stream = None;
        self.device_name = None;

        let catalog = CpalCatalog::new(&self.host);
        let (target_rate, buffer_size) = (self.target_rate, self.buffer_size);
        let (strategy, device, (stream, sample_rate, frames)) =
            open_first(&catalog, requested, |device| {
                let (sender, frames) = crossbeam_channel::bounded(FRAME_QUEUE_DEPTH);
                start_stream(device, target_rate, buffer_size, sender)
                    .map(|(stream, sample_rate)| (stream, sample_rate, frames))
            })
            .ok_or_else(|| anyhow!("No usable input device"))?;

        let name = catalog.name_of(&device);
        log::info!(
            "Using audio input device: {} ({strategy})",
            name.as_deref().unwrap_or("<unnamed>")
        );
        if sample_rate != target_rate {
            log::warn!("Device does not support {target_rate} Hz, capturing at {sample_rate} Hz");
        }

        self.stream = Some(stream);
        self.frames = frames;
        self.sample_rate = sample_rate;
        self.device_name = name;
        Ok(())
    }

    /// Twice the buffer duration, plus slack for a sluggish host.
    fn capture_timeout(&self) -> Duration {
        let buffer_secs = self.buffer_size as f64 / self.sample_rate.max(1) as f64;
        Duration::from_secs_f64(2.0 * buffer_secs) + Duration::from_millis(100)
    }
}

impl AudioSource for CpalSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    fn devices(&self) -> Vec<String> {
        device_names(&CpalCatalog::new(&self.host))
    }

    fn capture_buffer(&mut self) -> Result<Vec<f32>> {
        if self.stream.is_none() {
            return Err(TunerError::Capture("no active input stream".into()));
        }
        if let Some(latest) = self.frames.try_iter().last() {
            return Ok(latest);
        }
        self.frames
            .recv_timeout(self.capture_timeout())
            .map_err(|e| TunerError::Capture(e.to_string()))
    }

    fn configure_device(&mut self, device: Option<&str>) -> Result<()> {
        self.start(device)
            .map_err(|e| TunerError::Device(format!("{e:#}")))
    }
}

/// Builds and starts an f32 input stream that sends mono frames of
/// `buffer_size` samples. Returns the stream and its actual sample rate.
fn start_stream(
    device: &cpal::Device,
    target_rate: u32,
    buffer_size: usize,
    sender: Sender<Vec<f32>>,
) -> anyhow::Result<(cpal::Stream, u32)> {
    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let (supported_config, sample_rate) = find_supported_config(configs, target_rate)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let config = supported_config.with_sample_rate(cpal::SampleRate(sample_rate));
    let channels = usize::from(config.channels()).max(1);
    let config: cpal::StreamConfig = config.into();

    // This buffer will accumulate audio data from the callback.
    let mut pending: Vec<f32> = Vec::with_capacity(buffer_size * 2);

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            pending.extend(
                data.chunks(channels)
                    .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
            );

            while pending.len() >= buffer_size {
                let frame: Vec<f32> = pending.drain(..buffer_size).collect();
                // A full queue means the analysis side is behind; drop the frame.
                let _ = sender.try_send(frame);
            }
        },
        |err| log::error!("An error occurred on the audio stream: {err}"),
        None,
    )?;

    stream.play()?;

    Ok((stream, sample_rate))
}

/// Picks the f32 configuration that can run closest to the target rate,
/// preferring fewer channels. Returns the range and the rate to request.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<(SupportedStreamConfigRange, u32)> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .map(|c| {
            let rate = target_rate.clamp(c.min_sample_rate().0, c.max_sample_rate().0);
            (c, rate)
        })
        .min_by_key(|(c, rate)| (rate.abs_diff(target_rate), c.channels()))
}
