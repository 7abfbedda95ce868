//! 10-Band Graphic Equalizer
//!
//! A cascade of BiQuad filters applied between the gain stage and the
//! analyser, so the configured band gains shape what the visualizer reacts
//! to. Based on the RBJ (Robert Bristow-Johnson) Audio EQ Cookbook.

use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type, Q_BUTTERWORTH_F32};

use crate::error::{DspError, DspResult};

/// Standard EQ band frequencies (Hz) - ISO standard octave centers
pub const EQ_BANDS: [f32; 10] = [
    31.0,    // Sub-bass
    62.0,    // Bass
    125.0,   // Low-mid
    250.0,   // Mid
    500.0,   // Mid
    1000.0,  // Upper-mid
    2000.0,  // Presence
    4000.0,  // Brilliance
    8000.0,  // High
    16000.0, // Air
];

fn band_coefficients(index: usize, gain_db: f32, sample_rate: f32) -> DspResult<Coefficients<f32>> {
    let frequency = EQ_BANDS[index];
    // Shelves at the outer bands, peaking filters in between. The filter
    // types take the gain in dB directly.
    let filter_type = match index {
        0 => Type::LowShelf(gain_db),
        9 => Type::HighShelf(gain_db),
        _ => Type::PeakingEQ(gain_db),
    };

    Coefficients::<f32>::from_params(
        filter_type,
        sample_rate.hz(),
        frequency.hz(),
        Q_BUTTERWORTH_F32,
    )
    .map_err(|_| DspError::InvalidCoefficients {
        frequency,
        sample_rate,
    })
}

/// Mono 10-band equalizer over the analysis stream
pub struct Equalizer {
    filters: [DirectForm2Transposed<f32>; 10],
    gains_db: [f32; 10],
    sample_rate: f32,
    enabled: bool,
}

impl Equalizer {
    /// Create a flat (0 dB everywhere) equalizer
    pub fn new(sample_rate: f32) -> Self {
        let filters = core::array::from_fn(|i| {
            let coeffs = band_coefficients(i, 0.0, sample_rate)
                .unwrap_or_else(|_| Coefficients {
                    a1: 0.0,
                    a2: 0.0,
                    b0: 1.0,
                    b1: 0.0,
                    b2: 0.0,
                });
            DirectForm2Transposed::<f32>::new(coeffs)
        });

        Self {
            filters,
            gains_db: [0.0; 10],
            sample_rate,
            enabled: false,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn gains_db(&self) -> [f32; 10] {
        self.gains_db
    }

    /// Apply a full set of band gains, recomputing filter coefficients
    pub fn set_gains(&mut self, gains_db: &[f32; 10]) -> DspResult<()> {
        for (i, &gain) in gains_db.iter().enumerate() {
            if (gain - self.gains_db[i]).abs() > f32::EPSILON {
                let coeffs = band_coefficients(i, gain, self.sample_rate)?;
                self.filters[i].update_coefficients(coeffs);
            }
        }
        self.gains_db = *gains_db;
        Ok(())
    }

    /// Update a single band, leaving the rest untouched
    pub fn set_band_gain(&mut self, index: usize, gain_db: f32) -> DspResult<()> {
        if index >= EQ_BANDS.len() {
            return Err(DspError::InvalidBandIndex(index));
        }
        let coeffs = band_coefficients(index, gain_db, self.sample_rate)?;
        self.filters[index].update_coefficients(coeffs);
        self.gains_db[index] = gain_db;
        Ok(())
    }

    /// Process a mono block in place. No-op while disabled.
    pub fn process(&mut self, block: &mut [f32]) {
        if !self.enabled {
            return;
        }
        for sample in block.iter_mut() {
            let mut s = *sample;
            for filter in self.filters.iter_mut() {
                s = filter.run(s);
            }
            *sample = s;
        }
    }

    /// Clear filter state (delay lines)
    pub fn reset(&mut self) {
        for filter in self.filters.iter_mut() {
            filter.reset_state();
        }
    }
}
