//! DSP Error Types

use thiserror::Error;

/// Errors that can occur in the analysis graph
#[derive(Error, Debug)]
pub enum DspError {
    #[error("Invalid FFT size: {0} (must be 256, 512, 1024, 2048, 4096, or 8192)")]
    InvalidFftSize(usize),

    #[error("Invalid smoothing constant: {0} (must be within 0.0-1.0)")]
    InvalidSmoothing(f32),

    #[error("Invalid decibel range: min {min} must be below max {max}")]
    InvalidDecibelRange { min: f32, max: f32 },

    #[error("Invalid band index: {0} (must be 0-9)")]
    InvalidBandIndex(usize),

    #[error("Invalid filter coefficients for frequency {frequency}Hz at sample rate {sample_rate}Hz")]
    InvalidCoefficients { frequency: f32, sample_rate: f32 },

    #[error("Sample rate must be positive, got {0}")]
    InvalidSampleRate(f32),

    #[error("Audio graph is closed")]
    GraphClosed,
}

/// Result type alias for DSP operations
pub type DspResult<T> = Result<T, DspError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DspError::InvalidFftSize(1000);
        assert!(err.to_string().contains("1000"));

        let err = DspError::InvalidDecibelRange {
            min: -10.0,
            max: -90.0,
        };
        assert!(err.to_string().contains("-90"));
    }
}
