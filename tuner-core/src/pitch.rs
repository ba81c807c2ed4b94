//! # Pitch Detection Module
//!
//! Derives one fundamental-frequency estimate per sample buffer. Two
//! strategies sit behind the [`PitchEstimator`] trait so the analysis cycle
//! never depends on which one is configured:
//!
//! - [`SpectralPeakEstimator`]: the strongest bin of the whole-buffer
//!   spectrum inside the search band. Simple and cheap, but quantised to the
//!   bin width (`sample_rate / buffer_len`, about 10.8 Hz at 44.1 kHz/4096).
//! - [`PitchTracker`]: short overlapping frames, one interpolated spectral
//!   peak per frame, median across frames. Sub-bin accurate and robust to a
//!   noisy frame or two. This is the default.

use crate::config::{PitchConfig, PitchStrategy};
use crate::fft::{bin_frequency, SpectralAnalyzer};

/// A strategy that turns a buffer into a fundamental frequency.
pub trait PitchEstimator: Send + Sync {
    /// Estimated fundamental in Hz, or `None` when no pitch is present.
    fn estimate(&self, buffer: &[f32], sample_rate: u32) -> Option<f32>;

    /// Short strategy name for logging.
    fn name(&self) -> &'static str;
}

/// Inclusive frequency range searched for the fundamental.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchBand {
    pub min_hz: f32,
    pub max_hz: f32,
}

impl SearchBand {
    pub fn contains(&self, freq: f32) -> bool {
        freq >= self.min_hz && freq <= self.max_hz
    }
}

impl Default for SearchBand {
    fn default() -> Self {
        Self {
            min_hz: 50.0,
            max_hz: 2000.0,
        }
    }
}

/// Builds the estimator selected in the config.
pub fn build_estimator(config: &PitchConfig, buffer_size: usize) -> Box<dyn PitchEstimator> {
    let band = SearchBand {
        min_hz: config.min_frequency,
        max_hz: config.max_frequency,
    };
    match config.strategy {
        PitchStrategy::SpectralPeak => Box::new(SpectralPeakEstimator::new(
            buffer_size,
            band,
            config.energy_floor,
        )),
        PitchStrategy::Tracking => Box::new(PitchTracker::new(
            config.frame_size,
            config.hop_size,
            band,
            config.threshold,
            config.salience_floor,
        )),
    }
}

/// Picks the loudest in-band bin of the windowed buffer spectrum.
#[derive(Debug, Clone)]
pub struct SpectralPeakEstimator {
    analyzer: SpectralAnalyzer,
    band: SearchBand,
    energy_floor: f32,
}

impl SpectralPeakEstimator {
    pub fn new(buffer_size: usize, band: SearchBand, energy_floor: f32) -> Self {
        Self {
            analyzer: SpectralAnalyzer::new(buffer_size),
            band,
            energy_floor,
        }
    }
}

impl PitchEstimator for SpectralPeakEstimator {
    fn estimate(&self, buffer: &[f32], sample_rate: u32) -> Option<f32> {
        let spectrum = self.analyzer.spectrum(buffer, sample_rate);

        // Strict `>` keeps the first bin on ties.
        let mut best: Option<(f32, f32)> = None;
        for (&freq, &mag) in spectrum.frequencies.iter().zip(&spectrum.magnitudes) {
            if !self.band.contains(freq) {
                continue;
            }
            if best.is_none_or(|(_, best_mag)| mag > best_mag) {
                best = Some((freq, mag));
            }
        }

        let (freq, mag) = best?;
        (mag >= self.energy_floor).then_some(freq)
    }

    fn name(&self) -> &'static str {
        "spectral-peak"
    }
}

/// Frame-based peak tracker with median aggregation.
#[derive(Debug, Clone)]
pub struct PitchTracker {
    analyzer: SpectralAnalyzer,
    hop_size: usize,
    band: SearchBand,
    threshold: f32,
    salience_floor: f32,
}

/// Best peak found in one analysis frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameCandidate {
    pub frequency: f32,
    pub salience: f32,
}

impl PitchTracker {
    /// Creates a tracker.
    ///
    /// # Arguments
    /// * `frame_size` - Samples per analysis frame
    /// * `hop_size` - Distance between frame starts (at least 1)
    /// * `band` - Range the refined pitch must fall in
    /// * `threshold` - Candidate floor relative to the frame's loudest bin
    /// * `salience_floor` - Minimum interpolated peak height to accept a frame
    pub fn new(
        frame_size: usize,
        hop_size: usize,
        band: SearchBand,
        threshold: f32,
        salience_floor: f32,
    ) -> Self {
        Self {
            analyzer: SpectralAnalyzer::new(frame_size),
            hop_size: hop_size.max(1),
            band,
            threshold,
            salience_floor,
        }
    }

    /// Start offsets of the frames that fit entirely inside the buffer.
    fn frame_starts(&self, len: usize) -> impl Iterator<Item = usize> {
        let frame = self.analyzer.size();
        let last = len.saturating_sub(frame);
        (0..=last).step_by(self.hop_size)
    }

    /// Most salient local spectral maximum of one frame, if any.
    ///
    /// # Returns
    /// The candidate with the highest interpolated magnitude among the local
    /// maxima above the threshold whose refined pitch lies inside the band,
    /// or `None` if there is no such peak or it is below the salience floor.
    pub fn frame_candidate(&self, frame: &[f32], sample_rate: u32) -> Option<FrameCandidate> {
        let mags = self.analyzer.magnitudes(frame);
        if mags.len() < 3 {
            return None;
        }
        let floor = self.threshold * mags.iter().copied().fold(0.0, f32::max);
        let n = frame.len();

        let mut best: Option<FrameCandidate> = None;
        for k in 1..mags.len() - 1 {
            let (left, centre, right) = (mags[k - 1], mags[k], mags[k + 1]);
            if centre <= floor || centre <= left || centre < right {
                continue;
            }

            // The band applies to the refined pitch: near the band edges the
            // peak bin itself can sit just outside it.
            let offset = log_parabolic_offset(left, centre, right);
            let frequency = bin_frequency(k, sample_rate, n) + offset * sample_rate as f32 / n as f32;
            if !self.band.contains(frequency) {
                continue;
            }
            let (_, salience) = parabolic_peak(left, centre, right);

            if best.is_none_or(|b| salience > b.salience) {
                best = Some(FrameCandidate {
                    frequency,
                    salience,
                });
            }
        }

        best.filter(|c| c.salience >= self.salience_floor && c.frequency > 0.0)
    }
}

impl PitchEstimator for PitchTracker {
    fn estimate(&self, buffer: &[f32], sample_rate: u32) -> Option<f32> {
        let frame_size = self.analyzer.size();
        let pitches: Vec<f32> = if buffer.len() <= frame_size {
            self.frame_candidate(buffer, sample_rate)
                .map(|c| c.frequency)
                .into_iter()
                .collect()
        } else {
            self.frame_starts(buffer.len())
                .filter_map(|start| {
                    self.frame_candidate(&buffer[start..start + frame_size], sample_rate)
                })
                .map(|c| c.frequency)
                .collect()
        };
        median(pitches)
    }

    fn name(&self) -> &'static str {
        "tracking"
    }
}

/// Vertex of the parabola through three equally spaced points.
///
/// Returns `(offset, height)` where `offset` is in `[-0.5, 0.5]` bins from
/// the centre point.
fn parabolic_peak(left: f32, centre: f32, right: f32) -> (f32, f32) {
    let denominator = left - 2.0 * centre + right;
    if denominator.abs() < f32::EPSILON {
        return (0.0, centre);
    }
    let offset = (0.5 * (left - right) / denominator).clamp(-0.5, 0.5);
    let height = centre - 0.25 * (left - right) * offset;
    (offset, height)
}

/// Peak offset from a parabola fitted to log-magnitudes.
///
/// Log-magnitude interpolation is much closer to the true peak of a Hann
/// window's main lobe than the linear fit.
fn log_parabolic_offset(left: f32, centre: f32, right: f32) -> f32 {
    if left <= 0.0 || centre <= 0.0 || right <= 0.0 {
        return parabolic_peak(left, centre, right).0;
    }
    parabolic_peak(left.ln(), centre.ln(), right.ln()).0
}

/// Median of the values; the mean of the middle two for even counts.
pub fn median(mut values: Vec<f32>) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f32::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some(0.5 * (values[mid - 1] + values[mid]))
    } else {
        Some(values[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 44_100;

    fn sine(freq: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| 0.3 * (2.0 * std::f32::consts::PI * freq * i as f32 / SAMPLE_RATE as f32).sin())
            .collect()
    }

    fn tracker() -> PitchTracker {
        PitchTracker::new(2048, 512, SearchBand::default(), 0.1, 0.01)
    }

    #[test]
    fn median_handles_odd_and_even_counts() {
        assert_eq!(median(vec![3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(vec![4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(vec![]), None);
    }

    #[test]
    fn median_ignores_a_single_outlier() {
        assert_eq!(median(vec![440.0, 441.0, 880.0, 439.0, 440.5]), Some(440.5));
    }

    #[test]
    fn parabola_vertex_of_symmetric_points_is_centred() {
        assert_eq!(parabolic_peak(1.0, 2.0, 1.0), (0.0, 2.0));
        let (offset, _) = parabolic_peak(1.0, 2.0, 1.5);
        assert!(offset > 0.0);
    }

    #[test]
    fn tracker_follows_concert_a() {
        let estimate = tracker().estimate(&sine(440.0, 4096), SAMPLE_RATE).unwrap();
        assert!((estimate - 440.0).abs() < 0.5, "got {estimate}");
    }

    #[test]
    fn tracker_is_tight_on_low_strings() {
        for freq in [55.0, 82.41, 110.0] {
            let estimate = tracker().estimate(&sine(freq, 4096), SAMPLE_RATE).unwrap();
            assert!((estimate - freq).abs() < 0.5, "{freq}: got {estimate}");
        }
    }

    #[test]
    fn every_in_band_tone_is_found_up_to_the_band_edges() {
        let tracker = tracker();
        let spectral = SpectralPeakEstimator::new(4096, SearchBand::default(), 0.01);
        // Next to a band edge the nearest bin may lie outside the band, so the
        // spectral peak is only held to one bin there.
        let bin = SAMPLE_RATE as f32 / 4096.0;

        let mut missed = Vec::new();
        for step in 0..=3900 {
            let freq = 50.0 + 0.5 * step as f32;
            let buffer = sine(freq, 4096);
            match tracker.estimate(&buffer, SAMPLE_RATE) {
                Some(estimate) if (estimate - freq).abs() < 1.0 => {}
                other => missed.push(format!("tracking {freq}: {other:?}")),
            }
            match spectral.estimate(&buffer, SAMPLE_RATE) {
                Some(estimate) if (estimate - freq).abs() <= bin => {}
                other => missed.push(format!("spectral-peak {freq}: {other:?}")),
            }
        }
        assert!(missed.is_empty(), "{} misses: {:?}", missed.len(), &missed[..missed.len().min(10)]);
    }

    #[test]
    fn tracker_handles_buffer_shorter_than_frame() {
        let estimate = tracker().estimate(&sine(440.0, 1024), SAMPLE_RATE).unwrap();
        assert!((estimate - 440.0).abs() < 2.0, "got {estimate}");
    }

    #[test]
    fn tracker_rejects_silence_and_out_of_band_tones() {
        assert_eq!(tracker().estimate(&vec![0.0; 4096], SAMPLE_RATE), None);
        assert_eq!(tracker().estimate(&sine(5000.0, 4096), SAMPLE_RATE), None);
    }

    #[test]
    fn spectral_peak_is_within_half_a_bin() {
        let estimator = SpectralPeakEstimator::new(4096, SearchBand::default(), 0.01);
        let half_bin = SAMPLE_RATE as f32 / 4096.0 / 2.0;
        for freq in [82.41, 261.63, 440.0, 1318.5] {
            let estimate = estimator.estimate(&sine(freq, 4096), SAMPLE_RATE).unwrap();
            assert!((estimate - freq).abs() <= half_bin + 0.01, "{freq}: got {estimate}");
        }
    }

    #[test]
    fn spectral_peak_applies_energy_floor() {
        let estimator = SpectralPeakEstimator::new(4096, SearchBand::default(), 0.01);
        assert_eq!(estimator.estimate(&vec![0.0; 4096], SAMPLE_RATE), None);
    }

    #[test]
    fn spectral_peak_with_empty_band_finds_nothing() {
        let band = SearchBand {
            min_hz: 1.0,
            max_hz: 5.0,
        };
        let estimator = SpectralPeakEstimator::new(4096, band, 0.01);
        assert_eq!(estimator.estimate(&sine(440.0, 4096), SAMPLE_RATE), None);
    }

    #[test]
    fn strategy_follows_config() {
        let mut config = PitchConfig::default();
        assert_eq!(build_estimator(&config, 4096).name(), "tracking");
        config.strategy = PitchStrategy::SpectralPeak;
        assert_eq!(build_estimator(&config, 4096).name(), "spectral-peak");
    }
}
