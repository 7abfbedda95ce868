//! FFT Analyser Node
//!
//! The analysis stage of the graph: accumulates samples into a ring buffer
//! and exposes a normalized magnitude spectrum over the most recent window.
//! Modeled on the analyser contract used by visualizer engines - configurable
//! FFT size, exponential time smoothing, and a decibel floor/ceiling that maps
//! magnitudes onto 0-255 byte bins.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use crate::error::{DspError, DspResult};

/// FFT sizes the analyser accepts (powers of two)
pub const FFT_SIZES: [usize; 6] = [256, 512, 1024, 2048, 4096, 8192];

/// Parameters applied to the analyser, re-appliable without rebuilding it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyserParams {
    pub fft_size: usize,
    /// Exponential smoothing constant (0.0 = no smoothing, 1.0 = frozen)
    pub smoothing: f32,
    /// Decibel floor; magnitudes at or below map to bin value 0
    pub min_decibels: f32,
    /// Decibel ceiling; magnitudes at or above map to bin value 255
    pub max_decibels: f32,
}

impl Default for AnalyserParams {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing: 0.8,
            min_decibels: -90.0,
            max_decibels: -10.0,
        }
    }
}

impl AnalyserParams {
    fn validate(&self) -> DspResult<()> {
        if !FFT_SIZES.contains(&self.fft_size) {
            return Err(DspError::InvalidFftSize(self.fft_size));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(DspError::InvalidSmoothing(self.smoothing));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(DspError::InvalidDecibelRange {
                min: self.min_decibels,
                max: self.max_decibels,
            });
        }
        Ok(())
    }
}

fn hann(n: usize, size: usize) -> f32 {
    0.5 * (1.0 - (2.0 * std::f32::consts::PI * n as f32 / (size - 1) as f32).cos())
}

/// Analyser node: the graph stage lent to the render loop
pub struct AnalyserNode {
    params: AnalyserParams,
    /// Ring buffer of the most recent `fft_size` samples
    samples: Vec<f32>,
    write_pos: usize,
    /// Pre-computed Hann window, rebuilt when the FFT size changes
    window: Vec<f32>,
    /// Smoothed magnitude spectrum in dB, one entry per bin
    smoothed_db: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl AnalyserNode {
    pub fn new(params: AnalyserParams) -> DspResult<Self> {
        params.validate()?;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(params.fft_size);

        Ok(Self {
            samples: vec![0.0; params.fft_size],
            write_pos: 0,
            window: (0..params.fft_size).map(|n| hann(n, params.fft_size)).collect(),
            smoothed_db: vec![params.min_decibels; params.fft_size / 2],
            fft,
            scratch: vec![Complex::new(0.0, 0.0); params.fft_size],
            params,
        })
    }

    /// Re-apply parameters to the existing node without rebuilding the graph.
    /// A changed FFT size resets the sample window and smoothing state.
    pub fn apply_params(&mut self, params: AnalyserParams) -> DspResult<()> {
        params.validate()?;
        if params.fft_size != self.params.fft_size {
            let mut planner = FftPlanner::new();
            self.fft = planner.plan_fft_forward(params.fft_size);
            self.samples = vec![0.0; params.fft_size];
            self.write_pos = 0;
            self.window = (0..params.fft_size).map(|n| hann(n, params.fft_size)).collect();
            self.smoothed_db = vec![params.min_decibels; params.fft_size / 2];
            self.scratch = vec![Complex::new(0.0, 0.0); params.fft_size];
        }
        self.params = params;
        Ok(())
    }

    pub fn params(&self) -> AnalyserParams {
        self.params
    }

    pub fn fft_size(&self) -> usize {
        self.params.fft_size
    }

    /// Number of frequency bins exposed (half the FFT size)
    pub fn frequency_bin_count(&self) -> usize {
        self.params.fft_size / 2
    }

    /// Append processed samples to the analysis window
    pub fn push_samples(&mut self, block: &[f32]) {
        for &s in block {
            self.samples[self.write_pos] = s;
            self.write_pos = (self.write_pos + 1) % self.samples.len();
        }
    }

    /// Fill `out` with the normalized magnitude spectrum of the current
    /// window. 0 maps to `min_decibels`, 255 to `max_decibels`. `out` is
    /// truncated or zero-padded to `frequency_bin_count()` entries.
    pub fn byte_frequency_data(&mut self, out: &mut [u8]) {
        let size = self.params.fft_size;

        // Unroll the ring buffer into FFT input order, oldest sample first
        for i in 0..size {
            let idx = (self.write_pos + i) % size;
            self.scratch[i] = Complex::new(self.samples[idx] * self.window[i], 0.0);
        }
        self.fft.process(&mut self.scratch);

        let tau = self.params.smoothing;
        let min_db = self.params.min_decibels;
        let max_db = self.params.max_decibels;
        let norm = 1.0 / size as f32;

        for (bin, value) in self.smoothed_db.iter_mut().enumerate() {
            let magnitude = self.scratch[bin].norm() * norm;
            let db = if magnitude > 0.0 {
                20.0 * magnitude.log10()
            } else {
                min_db
            };
            // Exponential time smoothing against the previous spectrum
            *value = tau * *value + (1.0 - tau) * db.clamp(min_db, max_db);

            if bin < out.len() {
                let scaled = (*value - min_db) / (max_db - min_db);
                out[bin] = (scaled.clamp(0.0, 1.0) * 255.0) as u8;
            }
        }
        for slot in out.iter_mut().skip(self.smoothed_db.len()) {
            *slot = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_analyser(params: AnalyserParams, freq: f32, sample_rate: f32) -> AnalyserNode {
        let mut analyser = AnalyserNode::new(params).unwrap();
        let block: Vec<f32> = (0..params.fft_size)
            .map(|n| (2.0 * std::f32::consts::PI * freq * n as f32 / sample_rate).sin())
            .collect();
        analyser.push_samples(&block);
        analyser
    }

    #[test]
    fn test_rejects_bad_params() {
        let mut params = AnalyserParams::default();
        params.fft_size = 1000;
        assert!(matches!(
            AnalyserNode::new(params),
            Err(DspError::InvalidFftSize(1000))
        ));

        let mut params = AnalyserParams::default();
        params.min_decibels = -5.0;
        params.max_decibels = -10.0;
        assert!(AnalyserNode::new(params).is_err());
    }

    #[test]
    fn test_tone_peaks_in_expected_bin() {
        let params = AnalyserParams {
            smoothing: 0.0,
            ..Default::default()
        };
        // 440 Hz at 48 kHz with 2048-point FFT lands in bin ~18
        let mut analyser = filled_analyser(params, 440.0, 48_000.0);
        let mut bins = vec![0u8; analyser.frequency_bin_count()];
        analyser.byte_frequency_data(&mut bins);

        let peak = bins
            .iter()
            .enumerate()
            .max_by_key(|(_, v)| **v)
            .map(|(i, _)| i)
            .unwrap();
        let expected = (440.0_f32 * 2048.0 / 48_000.0).round() as usize;
        assert!(peak.abs_diff(expected) <= 1, "peak bin {peak} vs {expected}");
    }

    #[test]
    fn test_silence_is_floor() {
        let params = AnalyserParams {
            smoothing: 0.0,
            ..Default::default()
        };
        let mut analyser = AnalyserNode::new(params).unwrap();
        let mut bins = vec![0u8; analyser.frequency_bin_count()];
        analyser.byte_frequency_data(&mut bins);
        assert!(bins.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_fft_size_change_resets_window() {
        let mut analyser = AnalyserNode::new(AnalyserParams::default()).unwrap();
        analyser.push_samples(&[0.5; 2048]);

        let params = AnalyserParams {
            fft_size: 512,
            ..AnalyserParams::default()
        };
        analyser.apply_params(params).unwrap();
        assert_eq!(analyser.fft_size(), 512);
        assert_eq!(analyser.frequency_bin_count(), 256);

        let mut bins = vec![0u8; 256];
        analyser.byte_frequency_data(&mut bins);
        // Window was cleared, so the spectrum starts at the floor
        assert!(bins.iter().all(|&b| b <= 1));
    }

    #[test]
    fn test_smoothing_delays_response() {
        let heavy = AnalyserParams {
            smoothing: 0.95,
            ..Default::default()
        };
        let mut analyser = filled_analyser(heavy, 440.0, 48_000.0);
        let mut first = vec![0u8; analyser.frequency_bin_count()];
        analyser.byte_frequency_data(&mut first);

        let instant = AnalyserParams {
            smoothing: 0.0,
            ..Default::default()
        };
        let mut analyser = filled_analyser(instant, 440.0, 48_000.0);
        let mut second = vec![0u8; analyser.frequency_bin_count()];
        analyser.byte_frequency_data(&mut second);

        let max_heavy = *first.iter().max().unwrap();
        let max_instant = *second.iter().max().unwrap();
        assert!(max_instant > max_heavy);
    }
}
