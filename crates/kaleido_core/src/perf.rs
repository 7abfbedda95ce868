//! Performance Monitoring
//!
//! Aggregates frame and render timings into one-second samples. The engine
//! calls [`PerformanceMonitor::frame_tick`] from its frame callback and
//! [`record_render_span`](PerformanceMonitor::record_render_span) around
//! each engine render, so the monitor itself never touches a clock and is
//! fully testable with synthetic timestamps.

use std::collections::VecDeque;

use serde::Serialize;

use crate::error::CoreResult;

/// Aggregation window length
pub const SAMPLE_WINDOW_MS: f64 = 1000.0;

/// Samples retained, one per window
pub const MAX_HISTORY: usize = 60;

/// One aggregated window of frame statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerfSample {
    /// Window end, in the caller's timebase
    pub timestamp_ms: f64,
    /// Frames per second, rounded to 0.1
    pub fps: f64,
    /// Average wall time per frame, rounded to 0.01
    pub frame_time_ms: f64,
    /// Average engine render span, rounded to 0.01
    pub render_time_ms: f64,
    pub memory_mb: Option<u32>,
}

/// Corrective actions suggested by [`PerformanceMonitor::recommendations`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PerfRecommendation {
    /// Latest fps under 30
    ReduceQuality,
    /// Latest frame time over 33 ms
    ReduceTargetFps,
    /// Memory above the configured ceiling
    ReduceMemoryUse,
    /// Recent average fps under 50
    EnableLowPowerMode,
    /// Engine render span over 10 ms
    ReduceTextureQuality,
}

impl std::fmt::Display for PerfRecommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ReduceQuality => write!(f, "frame rate is low, reduce rendering quality"),
            Self::ReduceTargetFps => write!(f, "frames exceed budget, lower the target FPS"),
            Self::ReduceMemoryUse => {
                write!(f, "memory above the configured limit, disable preset preloading")
            }
            Self::EnableLowPowerMode => {
                write!(f, "sustained frame rate is low, enable low power mode")
            }
            Self::ReduceTextureQuality => {
                write!(f, "render time is high, reduce texture quality")
            }
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

type MemoryProbeFn = Box<dyn Fn() -> Option<u32>>;
type SampleFn = Box<dyn FnMut(&PerfSample)>;

pub struct PerformanceMonitor {
    running: bool,
    window_start_ms: f64,
    frames_in_window: u32,
    render_total_ms: f64,
    render_spans: u32,
    history: VecDeque<PerfSample>,
    memory_probe: Option<MemoryProbeFn>,
    on_sample: Vec<SampleFn>,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self {
            running: false,
            window_start_ms: 0.0,
            frames_in_window: 0,
            render_total_ms: 0.0,
            render_spans: 0,
            history: VecDeque::new(),
            memory_probe: None,
            on_sample: Vec::new(),
        }
    }

    /// Provide a memory reading per sample; absent by default
    pub fn with_memory_probe(mut self, probe: MemoryProbeFn) -> Self {
        self.memory_probe = Some(probe);
        self
    }

    pub fn on_sample(&mut self, callback: SampleFn) {
        self.on_sample.push(callback);
    }

    pub fn start(&mut self, now_ms: f64) {
        self.running = true;
        self.window_start_ms = now_ms;
        self.frames_in_window = 0;
        self.render_total_ms = 0.0;
        self.render_spans = 0;
    }

    /// Stop aggregating and drop all observers; history is retained
    pub fn stop(&mut self) {
        self.running = false;
        self.on_sample.clear();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Record one rendered frame. Closes the current window and emits a
    /// sample once a full window has elapsed.
    pub fn frame_tick(&mut self, now_ms: f64) -> Option<PerfSample> {
        if !self.running {
            return None;
        }
        self.frames_in_window += 1;

        let elapsed = now_ms - self.window_start_ms;
        if elapsed < SAMPLE_WINDOW_MS {
            return None;
        }

        let frames = f64::from(self.frames_in_window);
        let render_time_ms = if self.render_spans > 0 {
            self.render_total_ms / f64::from(self.render_spans)
        } else {
            0.0
        };
        let sample = PerfSample {
            timestamp_ms: now_ms,
            fps: round1(frames * 1000.0 / elapsed),
            frame_time_ms: round2(elapsed / frames),
            render_time_ms: round2(render_time_ms),
            memory_mb: self.memory_probe.as_ref().and_then(|probe| probe()),
        };

        self.history.push_back(sample);
        while self.history.len() > MAX_HISTORY {
            self.history.pop_front();
        }

        self.window_start_ms = now_ms;
        self.frames_in_window = 0;
        self.render_total_ms = 0.0;
        self.render_spans = 0;

        for callback in &mut self.on_sample {
            callback(&sample);
        }
        Some(sample)
    }

    /// Add one engine render duration to the current window
    pub fn record_render_span(&mut self, span_ms: f64) {
        if self.running {
            self.render_total_ms += span_ms;
            self.render_spans += 1;
        }
    }

    pub fn latest(&self) -> Option<&PerfSample> {
        self.history.back()
    }

    pub fn history(&self) -> impl Iterator<Item = &PerfSample> {
        self.history.iter()
    }

    /// Mean of every metric over the most recent `count` samples, stamped
    /// with the latest sample's timestamp. Memory averages over the samples
    /// that carried a reading.
    pub fn average_over(&self, count: usize) -> Option<PerfSample> {
        let recent: Vec<&PerfSample> = self.history.iter().rev().take(count).collect();
        let latest = *recent.first()?;
        let n = recent.len() as f64;

        let memory: Vec<u32> = recent.iter().filter_map(|s| s.memory_mb).collect();
        let memory_mb = if memory.is_empty() {
            None
        } else {
            let sum: f64 = memory.iter().map(|&mb| f64::from(mb)).sum();
            Some((sum / memory.len() as f64).round() as u32)
        };

        Some(PerfSample {
            timestamp_ms: latest.timestamp_ms,
            fps: round1(recent.iter().map(|s| s.fps).sum::<f64>() / n),
            frame_time_ms: round2(recent.iter().map(|s| s.frame_time_ms).sum::<f64>() / n),
            render_time_ms: round2(recent.iter().map(|s| s.render_time_ms).sum::<f64>() / n),
            memory_mb,
        })
    }

    /// Corrective suggestions based on the latest sample and recent trend
    pub fn recommendations(&self, max_memory_mb: u32) -> Vec<PerfRecommendation> {
        let mut out = Vec::new();
        let Some(latest) = self.latest() else {
            return out;
        };

        if latest.fps < 30.0 {
            out.push(PerfRecommendation::ReduceQuality);
        }
        if latest.frame_time_ms > 33.0 {
            out.push(PerfRecommendation::ReduceTargetFps);
        }
        if latest.memory_mb.is_some_and(|mb| mb > max_memory_mb) {
            out.push(PerfRecommendation::ReduceMemoryUse);
        }
        if self.average_over(5).is_some_and(|avg| avg.fps < 50.0) {
            out.push(PerfRecommendation::EnableLowPowerMode);
        }
        if latest.render_time_ms > 10.0 {
            out.push(PerfRecommendation::ReduceTextureQuality);
        }
        out
    }

    /// Serialize the latest sample, the recent average, the full history,
    /// and the current suggestions as a pretty-printed document
    pub fn export_metrics(&self, max_memory_mb: u32) -> CoreResult<String> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct MetricsExport<'a> {
            current: Option<&'a PerfSample>,
            average: Option<PerfSample>,
            history: Vec<&'a PerfSample>,
            recommendations: Vec<String>,
        }

        let export = MetricsExport {
            current: self.latest(),
            average: self.average_over(5),
            history: self.history.iter().collect(),
            recommendations: self
                .recommendations(max_memory_mb)
                .iter()
                .map(PerfRecommendation::to_string)
                .collect(),
        };
        Ok(serde_json::to_string_pretty(&export)?)
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    fn drive_frames(monitor: &mut PerformanceMonitor, start_ms: f64, count: u32, step_ms: f64) {
        for i in 1..=count {
            monitor.frame_tick(start_ms + f64::from(i) * step_ms);
        }
    }

    #[test]
    fn test_sixty_frames_over_a_second_reads_sixty_fps() {
        let mut monitor = PerformanceMonitor::new();
        monitor.start(0.0);
        drive_frames(&mut monitor, 0.0, 60, 1000.0 / 60.0);

        let sample = monitor.latest().unwrap();
        assert_eq!(sample.fps, 60.0);
        assert_eq!(sample.frame_time_ms, 16.67);
        assert_eq!(sample.render_time_ms, 0.0);
    }

    #[test]
    fn test_render_spans_average_into_sample() {
        let mut monitor = PerformanceMonitor::new();
        monitor.start(0.0);
        monitor.record_render_span(4.0);
        monitor.record_render_span(8.0);
        monitor.frame_tick(500.0);
        let sample = monitor.frame_tick(1000.0).unwrap();
        assert_eq!(sample.render_time_ms, 6.0);
        // The next window starts clean
        let next = monitor.frame_tick(2000.0).unwrap();
        assert_eq!(next.render_time_ms, 0.0);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut monitor = PerformanceMonitor::new();
        monitor.start(0.0);
        for window in 1..=(MAX_HISTORY as u32 + 10) {
            monitor.frame_tick(f64::from(window) * SAMPLE_WINDOW_MS);
        }
        assert_eq!(monitor.history().count(), MAX_HISTORY);
        // Oldest samples were evicted first
        let first = monitor.history().next().unwrap();
        assert_eq!(first.timestamp_ms, 11.0 * SAMPLE_WINDOW_MS);
    }

    #[test]
    fn test_stopped_monitor_ignores_ticks() {
        let mut monitor = PerformanceMonitor::new();
        monitor.start(0.0);
        monitor.stop();
        assert!(monitor.frame_tick(2000.0).is_none());
        assert!(monitor.latest().is_none());
    }

    #[test]
    fn test_recommendations_trigger_on_thresholds() {
        let mut monitor = PerformanceMonitor::new().with_memory_probe(Box::new(|| Some(300)));
        monitor.start(0.0);
        // 20 frames in a second: low fps, high frame time
        drive_frames(&mut monitor, 0.0, 20, 50.0);
        monitor.record_render_span(15.0);
        drive_frames(&mut monitor, 1000.0, 20, 50.0);

        let recs = monitor.recommendations(256);
        assert!(recs.contains(&PerfRecommendation::ReduceQuality));
        assert!(recs.contains(&PerfRecommendation::ReduceTargetFps));
        assert!(recs.contains(&PerfRecommendation::ReduceMemoryUse));
        assert!(recs.contains(&PerfRecommendation::EnableLowPowerMode));
        assert!(recs.contains(&PerfRecommendation::ReduceTextureQuality));
    }

    #[test]
    fn test_healthy_samples_yield_no_recommendations() {
        let mut monitor = PerformanceMonitor::new();
        monitor.start(0.0);
        drive_frames(&mut monitor, 0.0, 60, 1000.0 / 60.0);
        assert!(monitor.recommendations(256).is_empty());
    }

    #[test]
    fn test_sample_callbacks_fire_per_window() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut monitor = PerformanceMonitor::new();
        let sink = Rc::clone(&seen);
        monitor.on_sample(Box::new(move |sample| sink.borrow_mut().push(sample.fps)));

        monitor.start(0.0);
        drive_frames(&mut monitor, 0.0, 120, 1000.0 / 60.0);
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_average_over_covers_every_metric() {
        let mut monitor = PerformanceMonitor::new().with_memory_probe(Box::new(|| Some(200)));
        monitor.start(0.0);
        // First window 50 fps with a 4 ms span, second 25 fps with 8 ms
        monitor.record_render_span(4.0);
        drive_frames(&mut monitor, 0.0, 50, 20.0);
        monitor.record_render_span(8.0);
        drive_frames(&mut monitor, 1000.0, 25, 40.0);

        let avg = monitor.average_over(5).unwrap();
        assert_eq!(avg.fps, 37.5);
        assert_eq!(avg.frame_time_ms, 30.0);
        assert_eq!(avg.render_time_ms, 6.0);
        assert_eq!(avg.memory_mb, Some(200));
        // Stamped with the latest window's end
        assert_eq!(avg.timestamp_ms, monitor.latest().unwrap().timestamp_ms);

        assert!(monitor.average_over(0).is_none());
    }

    #[test]
    fn test_stop_drops_observers() {
        let seen = Rc::new(RefCell::new(0u32));
        let mut monitor = PerformanceMonitor::new();
        let sink = Rc::clone(&seen);
        monitor.on_sample(Box::new(move |_| *sink.borrow_mut() += 1));

        monitor.start(0.0);
        monitor.frame_tick(1000.0);
        assert_eq!(*seen.borrow(), 1);

        monitor.stop();
        monitor.start(1000.0);
        monitor.frame_tick(2000.0);
        assert_eq!(*seen.borrow(), 1);
    }

    #[test]
    fn test_export_carries_current_average_history_and_advice() {
        let mut monitor = PerformanceMonitor::new();
        monitor.start(0.0);
        drive_frames(&mut monitor, 0.0, 20, 50.0);
        drive_frames(&mut monitor, 1000.0, 20, 50.0);

        let exported = monitor.export_metrics(256).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&exported).unwrap();
        assert_eq!(parsed["history"].as_array().unwrap().len(), 2);
        assert_eq!(parsed["current"]["fps"], 20.0);
        assert_eq!(parsed["average"]["fps"], 20.0);
        assert!(!parsed["recommendations"].as_array().unwrap().is_empty());
    }
}
