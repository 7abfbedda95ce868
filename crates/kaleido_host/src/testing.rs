//! Scripted Host Fakes
//!
//! Everything the core needs to run against a simulated environment:
//! a configurable probe, a media provider with deniable tiers, a recording
//! renderer, and a static preset catalog. Used by the core's tests and by
//! headless demos.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use kaleido_dsp::{SampleSource, ToneSource};

use crate::error::{HostError, HostResult};
use crate::traits::{
    AmbientApis, AudioApiInfo, DisplayInfo, EnvProbe, FrameParams, GraphicsInfo, HostSurface,
    MediaProvider, PlaybackEvent, PlaybackState, PresetBlob, PresetCatalog, RendererEngine,
    RendererFactory, StorageProvider, SurfaceSpec,
};

use kaleido_dsp::AnalyserHandle;

// ---------------------------------------------------------------------------
// Probe

/// Probe whose every answer is a public field. Defaults describe a healthy
/// desktop-class environment.
#[derive(Clone)]
pub struct FakeProbe {
    pub accelerated: bool,
    pub renderer: Option<String>,
    pub extensions: Vec<String>,
    pub audio_available: bool,
    pub worklet: bool,
    pub ambient: AmbientApis,
    pub shared_memory: bool,
    pub cores: Option<u32>,
    pub memory_gb: Option<f32>,
    pub display: DisplayInfo,
    pub cpu_ms: f64,
    pub memory_usage_mb: Option<u32>,
}

impl Default for FakeProbe {
    fn default() -> Self {
        Self {
            accelerated: true,
            renderer: Some("Fake Accelerated Renderer".into()),
            extensions: vec!["float-texture".into(), "standard-derivatives".into()],
            audio_available: true,
            worklet: true,
            ambient: AmbientApis {
                storage: true,
                frame_scheduling: true,
                high_res_timing: true,
                media_devices: true,
            },
            shared_memory: true,
            cores: Some(8),
            memory_gb: Some(16.0),
            display: DisplayInfo {
                width: 2560,
                height: 1440,
                pixel_ratio: 1.0,
            },
            cpu_ms: 2.0,
            memory_usage_mb: None,
        }
    }
}

impl EnvProbe for FakeProbe {
    fn graphics(&self) -> Option<GraphicsInfo> {
        self.accelerated.then(|| GraphicsInfo {
            renderer: self.renderer.clone(),
            extensions: self.extensions.clone(),
        })
    }

    fn audio_api(&self) -> AudioApiInfo {
        AudioApiInfo {
            available: self.audio_available,
            worklet: self.worklet,
        }
    }

    fn ambient(&self) -> AmbientApis {
        self.ambient
    }

    fn shared_memory(&self) -> bool {
        self.shared_memory
    }

    fn hardware_concurrency(&self) -> Option<u32> {
        self.cores
    }

    fn device_memory_gb(&self) -> Option<f32> {
        self.memory_gb
    }

    fn display(&self) -> DisplayInfo {
        self.display
    }

    fn cpu_probe_ms(&self) -> f64 {
        self.cpu_ms
    }

    fn memory_usage_mb(&self) -> Option<u32> {
        self.memory_usage_mb
    }
}

// ---------------------------------------------------------------------------
// Media

/// Tone source with an overridden tier name, so tests can tell which tier
/// a fake handed out
struct NamedTone {
    inner: ToneSource,
    name: &'static str,
}

impl SampleSource for NamedTone {
    fn name(&self) -> &'static str {
        self.name
    }

    fn fill(&mut self, block: &mut [f32]) -> usize {
        self.inner.fill(block)
    }
}

/// Playback capture handle. Holding it keeps the element bound; dropping
/// it releases the binding so a later capture can rebind.
struct PlaybackCapture {
    inner: ToneSource,
    bound: Rc<Cell<bool>>,
}

impl SampleSource for PlaybackCapture {
    fn name(&self) -> &'static str {
        "playback"
    }

    fn fill(&mut self, block: &mut [f32]) -> usize {
        self.inner.fill(block)
    }
}

impl Drop for PlaybackCapture {
    fn drop(&mut self) {
        self.bound.set(false);
    }
}

/// Media provider with scriptable playback and microphone tiers. Enforces
/// the one-capture-per-element invariant on the playback tier.
pub struct FakeMedia {
    pub playback_reachable: Cell<bool>,
    pub microphone_allowed: Cell<bool>,
    playback_bound: Rc<Cell<bool>>,
    state: RefCell<Option<PlaybackState>>,
    event_tx: Sender<PlaybackEvent>,
    event_rx: Receiver<PlaybackEvent>,
}

impl FakeMedia {
    pub fn new(playback_reachable: bool, microphone_allowed: bool) -> Self {
        let (event_tx, event_rx) = unbounded();
        Self {
            playback_reachable: Cell::new(playback_reachable),
            microphone_allowed: Cell::new(microphone_allowed),
            playback_bound: Rc::new(Cell::new(false)),
            state: RefCell::new(None),
            event_tx,
            event_rx,
        }
    }

    pub fn set_playback_state(&self, state: Option<PlaybackState>) {
        *self.state.borrow_mut() = state;
    }

    pub fn emit(&self, event: PlaybackEvent) {
        let _ = self.event_tx.send(event);
    }

    pub fn playback_is_bound(&self) -> bool {
        self.playback_bound.get()
    }
}

impl MediaProvider for FakeMedia {
    fn capture_playback(&self) -> HostResult<Box<dyn SampleSource>> {
        if !self.playback_reachable.get() {
            return Err(HostError::CaptureUnavailable(
                "no live playback element".into(),
            ));
        }
        if self.playback_bound.get() {
            return Err(HostError::AlreadyBound);
        }
        self.playback_bound.set(true);
        Ok(Box::new(PlaybackCapture {
            inner: ToneSource::new(220.0, 0.2, 48_000.0),
            bound: Rc::clone(&self.playback_bound),
        }))
    }

    fn capture_microphone(&self) -> HostResult<Box<dyn SampleSource>> {
        if !self.microphone_allowed.get() {
            return Err(HostError::PermissionDenied("microphone".into()));
        }
        Ok(Box::new(NamedTone {
            inner: ToneSource::new(330.0, 0.15, 48_000.0),
            name: "microphone",
        }))
    }

    fn playback_state(&self) -> Option<PlaybackState> {
        self.state.borrow().clone()
    }

    fn play_pause(&self) -> HostResult<()> {
        let mut state = self.state.borrow_mut();
        if let Some(s) = state.as_mut() {
            s.is_playing = !s.is_playing;
            Ok(())
        } else {
            Err(HostError::Unsupported("no playback state"))
        }
    }

    fn events(&self) -> Option<Receiver<PlaybackEvent>> {
        Some(self.event_rx.clone())
    }
}

// ---------------------------------------------------------------------------
// Renderer

/// Everything a recording renderer instance observed
#[derive(Default)]
pub struct RenderLog {
    pub frames: usize,
    /// Loaded presets as (blob-as-utf8, blend seconds)
    pub loaded: Vec<(String, f32)>,
    pub resizes: Vec<(u32, u32)>,
    pub audio_connected: bool,
    pub last_params: Option<FrameParams>,
}

struct RecordingRenderer {
    log: Rc<RefCell<RenderLog>>,
}

impl RendererEngine for RecordingRenderer {
    fn load_preset(&mut self, blob: &PresetBlob, blend_secs: f32) {
        self.log
            .borrow_mut()
            .loaded
            .push((String::from_utf8_lossy(blob.bytes()).into_owned(), blend_secs));
    }

    fn render(&mut self, params: &FrameParams) {
        let mut log = self.log.borrow_mut();
        log.frames += 1;
        log.last_params = Some(*params);
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.log.borrow_mut().resizes.push((width, height));
    }

    fn connect_audio(&mut self, _analyser: AnalyserHandle) {
        self.log.borrow_mut().audio_connected = true;
    }

    fn disconnect_audio(&mut self) {
        self.log.borrow_mut().audio_connected = false;
    }
}

/// Factory producing recording renderers; can be scripted to fail
#[derive(Default)]
pub struct RecordingFactory {
    pub fail: Cell<bool>,
    pub surfaces: RefCell<Vec<SurfaceSpec>>,
    pub logs: RefCell<Vec<Rc<RefCell<RenderLog>>>>,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log of the most recently created renderer
    pub fn last_log(&self) -> Option<Rc<RefCell<RenderLog>>> {
        self.logs.borrow().last().cloned()
    }
}

impl RendererFactory for RecordingFactory {
    fn create(&self, surface: &SurfaceSpec) -> HostResult<Box<dyn RendererEngine>> {
        if self.fail.get() {
            return Err(HostError::RendererInit("scripted failure".into()));
        }
        self.surfaces.borrow_mut().push(*surface);
        let log = Rc::new(RefCell::new(RenderLog::default()));
        self.logs.borrow_mut().push(Rc::clone(&log));
        Ok(Box::new(RecordingRenderer { log }))
    }
}

// ---------------------------------------------------------------------------
// Catalog and surface

/// Preset catalog over a fixed key list; each blob is its key's bytes
pub struct StaticCatalog {
    keys: Vec<String>,
}

impl StaticCatalog {
    pub fn new(keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn empty() -> Self {
        Self { keys: Vec::new() }
    }
}

impl PresetCatalog for StaticCatalog {
    fn keys(&self) -> Vec<String> {
        self.keys.clone()
    }

    fn get(&self, key: &str) -> Option<PresetBlob> {
        self.keys
            .iter()
            .any(|k| k == key)
            .then(|| PresetBlob::new(key.as_bytes().to_vec()))
    }
}

/// Host surface with a fixed viewport
pub struct FixedSurface {
    pub width: u32,
    pub height: u32,
    pub fullscreen: Cell<bool>,
}

impl FixedSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            fullscreen: Cell::new(false),
        }
    }
}

impl HostSurface for FixedSurface {
    fn viewport(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn request_fullscreen(&self) -> HostResult<()> {
        self.fullscreen.set(true);
        Ok(())
    }

    fn exit_fullscreen(&self) -> HostResult<()> {
        self.fullscreen.set(false);
        Ok(())
    }
}

/// Storage provider that fails every write, for persistence-error paths
pub struct BrokenStorage;

impl StorageProvider for BrokenStorage {
    fn read(&self, _key: &str) -> HostResult<Option<String>> {
        Ok(None)
    }

    fn write(&self, _key: &str, _value: &str) -> HostResult<()> {
        Err(HostError::StorageWrite("scripted failure".into()))
    }
}
