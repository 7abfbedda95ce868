//! Sample Sources
//!
//! A source is whatever feeds the analysis graph: host playback capture,
//! microphone capture, or the synthetic fallback tone. The graph pulls
//! blocks; sources that cannot deliver a full block leave the remainder
//! silent so the analyser never starves.

/// Producer side of the analysis graph
pub trait SampleSource {
    /// Short identifier for logging ("playback", "microphone", "tone", ...)
    fn name(&self) -> &'static str;

    /// Fill `block` with mono samples, returning how many were written.
    /// Unwritten tail samples are treated as silence by the graph.
    fn fill(&mut self, block: &mut [f32]) -> usize;
}

/// Fixed-frequency sine source - the last-resort tier that never fails,
/// so the analyser never sees a disconnected input.
pub struct ToneSource {
    phase: f32,
    step: f32,
    amplitude: f32,
}

impl ToneSource {
    pub fn new(frequency: f32, amplitude: f32, sample_rate: f32) -> Self {
        Self {
            phase: 0.0,
            step: 2.0 * std::f32::consts::PI * frequency / sample_rate,
            amplitude,
        }
    }
}

impl SampleSource for ToneSource {
    fn name(&self) -> &'static str {
        "tone"
    }

    fn fill(&mut self, block: &mut [f32]) -> usize {
        for sample in block.iter_mut() {
            *sample = self.phase.sin() * self.amplitude;
            self.phase += self.step;
            if self.phase > 2.0 * std::f32::consts::PI {
                self.phase -= 2.0 * std::f32::consts::PI;
            }
        }
        block.len()
    }
}

/// Always-silent source, useful as a placeholder in tests
pub struct SilenceSource;

impl SampleSource for SilenceSource {
    fn name(&self) -> &'static str {
        "silence"
    }

    fn fill(&mut self, block: &mut [f32]) -> usize {
        block.fill(0.0);
        block.len()
    }
}
