//! Audio Graph
//!
//! Owns the connected node chain: source → gain → equalizer → analyser.
//! The graph is exclusively owned by the audio graph service; the render
//! loop only ever receives an [`AnalyserHandle`], a lent read view over the
//! analyser node.

use std::cell::RefCell;
use std::rc::Rc;

use crate::analyser::{AnalyserNode, AnalyserParams};
use crate::eq::Equalizer;
use crate::error::{DspError, DspResult};
use crate::source::SampleSource;

/// The full analysis chain for one visualizer instance
pub struct AudioGraph {
    sample_rate: f32,
    gain: f32,
    equalizer: Equalizer,
    analyser: Rc<RefCell<AnalyserNode>>,
    source: Option<Box<dyn SampleSource>>,
    scratch: Vec<f32>,
    closed: bool,
}

impl AudioGraph {
    pub fn new(sample_rate: f32, params: AnalyserParams) -> DspResult<Self> {
        if sample_rate <= 0.0 {
            return Err(DspError::InvalidSampleRate(sample_rate));
        }
        Ok(Self {
            sample_rate,
            gain: 1.0,
            equalizer: Equalizer::new(sample_rate),
            analyser: Rc::new(RefCell::new(AnalyserNode::new(params)?)),
            source: None,
            scratch: Vec::new(),
            closed: false,
        })
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Linear gain applied before the equalizer
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain.max(0.0);
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn set_equalizer_enabled(&mut self, enabled: bool) {
        self.equalizer.set_enabled(enabled);
    }

    pub fn set_equalizer_gains(&mut self, gains_db: &[f32; 10]) -> DspResult<()> {
        self.equalizer.set_gains(gains_db)
    }

    /// Swap the input; the previous source is dropped
    pub fn set_source(&mut self, source: Box<dyn SampleSource>) -> DspResult<()> {
        if self.closed {
            return Err(DspError::GraphClosed);
        }
        self.source = Some(source);
        self.equalizer.reset();
        Ok(())
    }

    pub fn source_name(&self) -> Option<&'static str> {
        self.source.as_ref().map(|s| s.name())
    }

    /// Re-apply analyser parameters without rebuilding the graph
    pub fn apply_analyser_params(&mut self, params: AnalyserParams) -> DspResult<()> {
        if self.closed {
            return Err(DspError::GraphClosed);
        }
        self.analyser.borrow_mut().apply_params(params)
    }

    /// Pull `frames` samples from the source through gain and EQ into the
    /// analyser. Missing samples are silence.
    pub fn pump(&mut self, frames: usize) -> DspResult<()> {
        if self.closed {
            return Err(DspError::GraphClosed);
        }
        self.scratch.resize(frames, 0.0);
        self.scratch.fill(0.0);

        if let Some(source) = self.source.as_mut() {
            source.fill(&mut self.scratch);
        }
        for sample in self.scratch.iter_mut() {
            *sample *= self.gain;
        }
        self.equalizer.process(&mut self.scratch);
        self.analyser.borrow_mut().push_samples(&self.scratch);
        Ok(())
    }

    /// Lend the analyser to the renderer. The handle stays valid after the
    /// graph closes but only reads whatever was last analysed.
    pub fn analyser_handle(&self) -> AnalyserHandle {
        AnalyserHandle {
            inner: Rc::clone(&self.analyser),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Tear the graph down. Idempotent; no samples flow afterwards.
    pub fn close(&mut self) {
        self.closed = true;
        self.source = None;
    }
}

/// Read view over the analyser node, cheap to clone
#[derive(Clone)]
pub struct AnalyserHandle {
    inner: Rc<RefCell<AnalyserNode>>,
}

impl AnalyserHandle {
    pub fn fft_size(&self) -> usize {
        self.inner.borrow().fft_size()
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.inner.borrow().frequency_bin_count()
    }

    pub fn byte_frequency_data(&self, out: &mut [u8]) {
        self.inner.borrow_mut().byte_frequency_data(out);
    }
}

impl std::fmt::Debug for AnalyserHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalyserHandle")
            .field("fft_size", &self.fft_size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ToneSource;

    #[test]
    fn test_tone_through_graph_is_non_silent() {
        let mut graph = AudioGraph::new(48_000.0, AnalyserParams::default()).unwrap();
        graph
            .set_source(Box::new(ToneSource::new(440.0, 0.1, 48_000.0)))
            .unwrap();
        graph.pump(4096).unwrap();

        let handle = graph.analyser_handle();
        let mut bins = vec![0u8; handle.frequency_bin_count()];
        handle.byte_frequency_data(&mut bins);
        assert!(bins.iter().any(|&b| b > 0), "analyser saw only silence");
    }

    #[test]
    fn test_zero_gain_silences_input() {
        let params = AnalyserParams {
            smoothing: 0.0,
            ..Default::default()
        };
        let mut graph = AudioGraph::new(48_000.0, params).unwrap();
        graph
            .set_source(Box::new(ToneSource::new(440.0, 0.5, 48_000.0)))
            .unwrap();
        graph.set_gain(0.0);
        graph.pump(2048).unwrap();

        let handle = graph.analyser_handle();
        let mut bins = vec![0u8; handle.frequency_bin_count()];
        handle.byte_frequency_data(&mut bins);
        assert!(bins.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_close_is_idempotent_and_stops_flow() {
        let mut graph = AudioGraph::new(48_000.0, AnalyserParams::default()).unwrap();
        graph.close();
        graph.close();
        assert!(graph.is_closed());
        assert!(matches!(graph.pump(512), Err(DspError::GraphClosed)));
        assert!(matches!(
            graph.set_source(Box::new(ToneSource::new(440.0, 0.1, 48_000.0))),
            Err(DspError::GraphClosed)
        ));
    }

    #[test]
    fn test_handle_outlives_close() {
        let mut graph = AudioGraph::new(48_000.0, AnalyserParams::default()).unwrap();
        let handle = graph.analyser_handle();
        graph.close();
        assert_eq!(handle.fft_size(), 2048);
    }
}
