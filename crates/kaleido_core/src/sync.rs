//! Audio Graph Service
//!
//! Owns the analysis graph and its driving timers:
//!
//! - acquires an input source by tier (playback → microphone → tone),
//!   starting at the configured tier and falling through on failure
//! - pumps the graph on a fixed block cadence
//! - mirrors the host player once a second (volume, transport events)
//!
//! The service lives in an `Rc<RefCell<_>>`; scheduled tasks hold a `Weak`
//! so a disposed service is simply skipped when a stale timer fires.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crossbeam_channel::Receiver;
use tracing::{debug, info, warn};

use kaleido_dsp::{AnalyserHandle, AnalyserParams, AudioGraph, SampleSource, ToneSource};
use kaleido_host::{MediaProvider, PlaybackEvent, Scheduler, TaskId};

use crate::config::{AudioSettings, AudioSource};
use crate::error::{CoreError, CoreResult};

/// Graph sample rate; sources resample to this
pub const SAMPLE_RATE: f32 = 48_000.0;

/// Samples pulled per pump
pub const PUMP_FRAMES: usize = 1024;

/// Pump cadence derived from the block size
pub const PUMP_INTERVAL_MS: f64 = PUMP_FRAMES as f64 * 1000.0 / SAMPLE_RATE as f64;

/// Player polling cadence
pub const SYNC_INTERVAL_MS: f64 = 1000.0;

/// Frequency and level of the last-resort tone
const FALLBACK_TONE_HZ: f32 = 440.0;
const FALLBACK_TONE_LEVEL: f32 = 0.1;

fn analyser_params(audio: &AudioSettings) -> AnalyserParams {
    AnalyserParams {
        fft_size: audio.fft_size as usize,
        smoothing: audio.smoothing,
        min_decibels: audio.min_decibels,
        max_decibels: audio.max_decibels,
    }
}

pub struct AudioGraphService {
    media: Rc<dyn MediaProvider>,
    scheduler: Rc<dyn Scheduler>,
    graph: Option<AudioGraph>,
    events: Option<Receiver<PlaybackEvent>>,
    pump_task: Option<TaskId>,
    sync_task: Option<TaskId>,
    sensitivity: f32,
    /// Last known player volume, 0-100
    volume: f32,
    configured_source: AudioSource,
    disposed: bool,
}

impl AudioGraphService {
    pub fn new(media: Rc<dyn MediaProvider>, scheduler: Rc<dyn Scheduler>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            media,
            scheduler,
            graph: None,
            events: None,
            pump_task: None,
            sync_task: None,
            sensitivity: 1.0,
            volume: 100.0,
            configured_source: AudioSource::Playback,
            disposed: false,
        }))
    }

    /// Build the graph, acquire an input, and start the pump and sync
    /// timers. Re-activating replaces the previous graph.
    pub fn activate(rc: &Rc<RefCell<Self>>, audio: &AudioSettings) -> CoreResult<()> {
        {
            let mut svc = rc.borrow_mut();
            if svc.disposed {
                return Err(CoreError::Disposed);
            }
            svc.teardown_graph();

            let mut graph = AudioGraph::new(SAMPLE_RATE, analyser_params(audio))?;
            let source = svc.acquire_source(audio.source);
            info!(source = source.name(), "audio graph input acquired");
            graph.set_source(source)?;
            graph.set_equalizer_enabled(audio.enable_equalizer);
            graph.set_equalizer_gains(&audio.equalizer_bands)?;

            svc.sensitivity = audio.sensitivity;
            svc.configured_source = audio.source;
            if let Some(state) = svc.media.playback_state() {
                svc.volume = if state.muted { 0.0 } else { state.volume };
            }
            let gain = svc.volume / 100.0 * svc.sensitivity;
            graph.set_gain(gain);

            svc.events = svc.media.events();
            svc.graph = Some(graph);
        }

        Self::start_pump(rc);
        Self::start_sync(rc);
        Ok(())
    }

    /// Walk the capture tiers downward from the configured entry point.
    /// The tone generator always succeeds, so this never fails.
    fn acquire_source(&self, configured: AudioSource) -> Box<dyn SampleSource> {
        if matches!(configured, AudioSource::Playback | AudioSource::System) {
            match self.media.capture_playback() {
                Ok(source) => return source,
                Err(err) => warn!("playback capture unavailable, trying microphone: {err}"),
            }
        }
        if !matches!(configured, AudioSource::Demo) {
            match self.media.capture_microphone() {
                Ok(source) => return source,
                Err(err) => warn!("microphone capture unavailable, using tone: {err}"),
            }
        }
        Box::new(ToneSource::new(
            FALLBACK_TONE_HZ,
            FALLBACK_TONE_LEVEL,
            SAMPLE_RATE,
        ))
    }

    fn start_pump(rc: &Rc<RefCell<Self>>) {
        let weak = Rc::downgrade(rc);
        let id = rc.borrow().scheduler.schedule_repeating(
            PUMP_INTERVAL_MS,
            Box::new(move |_| Self::on_pump(&weak)),
        );
        rc.borrow_mut().pump_task = Some(id);
    }

    fn on_pump(weak: &Weak<RefCell<Self>>) {
        let Some(rc) = weak.upgrade() else { return };
        let mut svc = rc.borrow_mut();
        if let Some(graph) = svc.graph.as_mut() {
            if let Err(err) = graph.pump(PUMP_FRAMES) {
                warn!("audio pump failed: {err}");
            }
        }
    }

    fn start_sync(rc: &Rc<RefCell<Self>>) {
        let weak = Rc::downgrade(rc);
        let id = rc.borrow().scheduler.schedule_repeating(
            SYNC_INTERVAL_MS,
            Box::new(move |_| Self::on_sync(&weak)),
        );
        rc.borrow_mut().sync_task = Some(id);
    }

    /// Once-a-second mirror of the host player: track its volume and drain
    /// any pending transport events.
    fn on_sync(weak: &Weak<RefCell<Self>>) {
        let Some(rc) = weak.upgrade() else { return };
        let mut svc = rc.borrow_mut();

        if let Some(state) = svc.media.playback_state() {
            let volume = if state.muted { 0.0 } else { state.volume };
            svc.set_volume(volume);
        }

        let pending: Vec<PlaybackEvent> = svc
            .events
            .as_ref()
            .map(|rx| rx.try_iter().collect())
            .unwrap_or_default();
        for event in pending {
            debug!(?event, "playback event");
            if event == PlaybackEvent::PlayerChanged {
                // The old element is gone; the next activation rebinds
                info!("player changed, audio rebind pending");
            }
        }
    }

    /// Re-apply audio settings to the live graph. A changed source tier
    /// requires re-activation; everything else applies in place.
    pub fn apply_audio_config(rc: &Rc<RefCell<Self>>, audio: &AudioSettings) -> CoreResult<()> {
        let needs_reacquire = {
            let svc = rc.borrow();
            if svc.disposed {
                return Err(CoreError::Disposed);
            }
            svc.graph.is_some() && svc.configured_source != audio.source
        };
        if needs_reacquire {
            return Self::activate(rc, audio);
        }

        let mut svc = rc.borrow_mut();
        svc.sensitivity = audio.sensitivity;
        let gain = svc.volume / 100.0 * svc.sensitivity;
        if let Some(graph) = svc.graph.as_mut() {
            graph.apply_analyser_params(analyser_params(audio))?;
            graph.set_equalizer_enabled(audio.enable_equalizer);
            graph.set_equalizer_gains(&audio.equalizer_bands)?;
            graph.set_gain(gain);
        }
        Ok(())
    }

    /// Mirror the player volume (0-100) into the graph. The graph has a
    /// single gain node, so the linear `level / 100` scale and the
    /// configured sensitivity are folded into one multiplier.
    pub fn set_volume(&mut self, level: f32) {
        self.volume = level.clamp(0.0, 100.0);
        let gain = self.volume / 100.0 * self.sensitivity;
        if let Some(graph) = self.graph.as_mut() {
            graph.set_gain(gain);
        }
    }

    pub fn analyser_handle(&self) -> Option<AnalyserHandle> {
        self.graph.as_ref().map(AudioGraph::analyser_handle)
    }

    pub fn source_name(&self) -> Option<&'static str> {
        self.graph.as_ref().and_then(AudioGraph::source_name)
    }

    pub fn is_active(&self) -> bool {
        self.graph.is_some() && !self.disposed
    }

    fn teardown_graph(&mut self) {
        if let Some(id) = self.pump_task.take() {
            self.scheduler.cancel(id);
        }
        if let Some(id) = self.sync_task.take() {
            self.scheduler.cancel(id);
        }
        if let Some(mut graph) = self.graph.take() {
            graph.close();
        }
        self.events = None;
    }

    /// Stop the timers and close the graph. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.teardown_graph();
        self.disposed = true;
    }
}
