//! # Fast Fourier Transform (FFT) Module
//!
//! Turns a raw sample buffer into a magnitude spectrum for peak detection and
//! for the spectrum display.
//!
//! ## Features
//! - High-performance FFT using RustFFT
//! - Hann windowing for reduced spectral leakage
//! - FFT plan and window cached for the configured buffer length
//! - Display truncation to a frequency limit

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Frequency/magnitude pairs for the non-negative half of a spectrum.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spectrum {
    /// Bin centre frequencies in Hz, ascending.
    pub frequencies: Vec<f32>,
    /// Magnitude of each bin.
    pub magnitudes: Vec<f32>,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    /// Keeps only the bins at or below `limit_hz`, in order.
    pub fn up_to(mut self, limit_hz: f32) -> Self {
        let keep = self.frequencies.partition_point(|&f| f <= limit_hz);
        self.frequencies.truncate(keep);
        self.magnitudes.truncate(keep);
        self
    }
}

/// Centre frequency of bin `k` of an `n`-point transform.
pub fn bin_frequency(k: usize, sample_rate: u32, n: usize) -> f32 {
    k as f32 * sample_rate as f32 / n as f32
}

/// Builds a periodic Hann window of length `n`.
///
/// The periodic form (denominator `n`, not `n - 1`) is the one that tiles
/// exactly under a DFT of the same length.
pub fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / n as f32).cos())
        .collect()
}

/// Windowed magnitude-spectrum analyzer for a fixed buffer length.
///
/// Holds no per-call state: analysing the same buffer twice yields identical
/// spectra.
#[derive(Clone)]
pub struct SpectralAnalyzer {
    size: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl std::fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl SpectralAnalyzer {
    /// Plans the FFT and precomputes the window for `size`-sample buffers.
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            size,
            window: hann_window(size),
            fft: planner.plan_fft_forward(size),
        }
    }

    /// Buffer length this analyzer was planned for.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Magnitudes of bins `0..=N/2` of the Hann-windowed buffer.
    ///
    /// # Arguments
    /// * `buffer` - Mono samples; a length other than the planned size gets a
    ///   one-off plan
    ///
    /// # Returns
    /// Unnormalised `|X[k]|` for every non-negative bin, empty for an empty
    /// buffer.
    pub fn magnitudes(&self, buffer: &[f32]) -> Vec<f32> {
        if buffer.is_empty() {
            return Vec::new();
        }
        if buffer.len() != self.size {
            return SpectralAnalyzer::new(buffer.len()).magnitudes(buffer);
        }

        let mut bins: Vec<Complex<f32>> = buffer
            .iter()
            .zip(&self.window)
            .map(|(&sample, &w)| Complex {
                re: sample * w,
                im: 0.0,
            })
            .collect();
        self.fft.process(&mut bins);

        bins.iter()
            .take(self.size / 2 + 1)
            .map(|c| c.norm()) // .norm() is sqrt(re^2 + im^2)
            .collect()
    }

    /// Full non-negative spectrum with bin frequencies.
    pub fn spectrum(&self, buffer: &[f32], sample_rate: u32) -> Spectrum {
        let magnitudes = self.magnitudes(buffer);
        let frequencies = (0..magnitudes.len())
            .map(|k| bin_frequency(k, sample_rate, buffer.len()))
            .collect();
        Spectrum {
            frequencies,
            magnitudes,
        }
    }

    /// Spectrum truncated to `limit_hz`, for display.
    pub fn spectrum_up_to(&self, buffer: &[f32], sample_rate: u32, limit_hz: f32) -> Spectrum {
        self.spectrum(buffer, sample_rate).up_to(limit_hz)
    }
}
