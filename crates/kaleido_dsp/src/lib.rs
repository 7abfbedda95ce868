//! Kaleido DSP - Audio Analysis Graph
//!
//! This crate provides the audio processing graph that feeds the visualizer:
//! - Sample sources (synthetic tone fallback, host-supplied capture)
//! - Gain stage for capture volume
//! - Optional 10-band equalizer using BiQuad filters
//! - FFT analyser node exposing normalized frequency data
//!
//! # Architecture
//!
//! ```text
//! SampleSource ──▶ Gain ──▶ [Equalizer] ──▶ AnalyserNode ──▶ Renderer
//! ```
//!
//! The graph runs on the single logical control thread. Capture sources that
//! originate on a real audio thread hand samples over through a lock-free
//! ring buffer before they enter the graph.

mod analyser;
mod eq;
mod error;
mod graph;
mod source;

pub use analyser::{AnalyserNode, AnalyserParams, FFT_SIZES};
pub use eq::{Equalizer, EQ_BANDS};
pub use error::DspError;
pub use graph::{AnalyserHandle, AudioGraph};
pub use source::{SampleSource, SilenceSource, ToneSource};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_exports() {
        // Verify public types are accessible
        let _params = AnalyserParams::default();
        let _eq = Equalizer::new(48_000.0);
    }
}
