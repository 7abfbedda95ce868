//! Visualizer Engine
//!
//! Drives the rendering side of a session:
//!
//! ```text
//!             ┌────────────┐   frame timer    ┌──────────────┐
//!  config ──▶ │   engine   │ ───────────────▶ │ renderer     │
//!             │            │   rotation timer │ (host-owned) │
//!  analyser ─▶│            │ ───────────────▶ │              │
//!             └────────────┘                  └──────────────┘
//! ```
//!
//! The engine owns the renderer instance, the preset rotation, and the
//! performance monitor. All timer callbacks hold a `Weak` reference, so a
//! disposed engine is skipped rather than kept alive by its own timers.
//!
//! Lifecycle: `Uninitialized → mount → Active ⇄ suspend/resume ⇄ Suspended`,
//! with `dispose` terminal from any state.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use kaleido_host::{
    FrameParams, HostSurface, PresetCatalog, RendererEngine, RendererFactory, Scheduler,
    SurfaceSpec, TaskId,
};

use crate::config::{Quality, TextureQuality, VisualizerSettings, VizConfig};
use crate::error::{CoreError, CoreResult};
use crate::perf::{PerfRecommendation, PerfSample, PerformanceMonitor};
use crate::presets::PresetRotation;
use crate::sync::AudioGraphService;

/// Allowance for paint-timestamp jitter when gating vsync frames
const FRAME_GATE_SLACK_MS: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Active,
    Suspended,
    Disposed,
}

/// Surface dimensions for the fixed quality tiers; `Native` tracks the
/// viewport scaled by the pixel ratio.
fn surface_spec(config: &VizConfig, viewport: (u32, u32)) -> SurfaceSpec {
    let pixel_ratio = config.visualizer.pixel_ratio;
    let (width, height) = match config.visualizer.quality {
        Quality::Low => (256, 256),
        Quality::Medium => (512, 512),
        Quality::High => (1024, 1024),
        Quality::Ultra => (2048, 2048),
        Quality::Native => (
            (viewport.0 as f32 * pixel_ratio).round().max(1.0) as u32,
            (viewport.1 as f32 * pixel_ratio).round().max(1.0) as u32,
        ),
    };
    let texture_size = match config.performance.texture_quality {
        TextureQuality::Low => 512,
        TextureQuality::Medium => 1024,
        TextureQuality::High => 2048,
    };
    SurfaceSpec {
        width,
        height,
        pixel_ratio,
        texture_size,
    }
}

fn frame_params(visualizer: &VisualizerSettings) -> FrameParams {
    FrameParams {
        gamma: visualizer.gamma,
        brightness: visualizer.brightness,
        contrast: visualizer.contrast,
        saturation: visualizer.saturation,
        hue_shift_deg: visualizer.hue_shift,
        invert_colors: visualizer.invert_colors,
        blend_mode: visualizer.blend_mode,
        post_processing: visualizer.enable_post_processing,
    }
}

struct EngineInner {
    factory: Rc<dyn RendererFactory>,
    catalog: Rc<dyn PresetCatalog>,
    surface: Rc<dyn HostSurface>,
    scheduler: Rc<dyn Scheduler>,
    service: Rc<RefCell<AudioGraphService>>,
    monitor: PerformanceMonitor,
    config: VizConfig,
    state: EngineState,
    renderer: Option<Box<dyn RendererEngine>>,
    rotation: PresetRotation,
    current_preset: Option<String>,
    surface_spec: Option<SurfaceSpec>,
    frame_task: Option<TaskId>,
    rotation_task: Option<TaskId>,
    last_render_ms: f64,
    rng: StdRng,
}

impl EngineInner {
    fn cancel_timers(&mut self) {
        if let Some(id) = self.frame_task.take() {
            self.scheduler.cancel(id);
        }
        if let Some(id) = self.rotation_task.take() {
            self.scheduler.cancel(id);
        }
    }

    fn connect_audio(&mut self) {
        let handle = self.service.borrow().analyser_handle();
        if let (Some(renderer), Some(handle)) = (self.renderer.as_mut(), handle) {
            renderer.connect_audio(handle);
        }
    }

    /// Resolve a requested preset name and hand the blob to the renderer
    fn load_resolved(&mut self, requested: &str) {
        let Some(key) = self.rotation.resolve(requested, &mut self.rng) else {
            warn!("preset catalog is empty, nothing to load");
            return;
        };
        let Some(blob) = self.catalog.get(&key) else {
            warn!(preset = key.as_str(), "preset disappeared from catalog");
            return;
        };
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.load_preset(&blob, self.config.presets.transition_secs);
            info!(preset = key.as_str(), "preset loaded");
        }
        self.current_preset = Some(key);
    }

    fn on_frame(weak: &Weak<RefCell<Self>>, now_ms: f64) {
        let Some(rc) = weak.upgrade() else { return };
        let mut guard = rc.borrow_mut();
        let inner = &mut *guard;
        if inner.state != EngineState::Active {
            return;
        }

        // Paint callbacks arrive at the host's cadence; skip paints that
        // would exceed the configured frame rate.
        if inner.config.performance.enable_vsync {
            let interval = 1000.0 / f64::from(inner.config.performance.target_fps.max(1));
            if now_ms - inner.last_render_ms < interval - FRAME_GATE_SLACK_MS {
                return;
            }
        }
        inner.last_render_ms = now_ms;
        inner.monitor.frame_tick(now_ms);

        let params = frame_params(&inner.config.visualizer);
        let started = Instant::now();
        if let Some(renderer) = inner.renderer.as_mut() {
            renderer.render(&params);
        }
        inner
            .monitor
            .record_render_span(started.elapsed().as_secs_f64() * 1000.0);
    }

    fn on_rotate(weak: &Weak<RefCell<Self>>) {
        let Some(rc) = weak.upgrade() else { return };
        let mut guard = rc.borrow_mut();
        let inner = &mut *guard;
        if inner.state != EngineState::Active {
            return;
        }
        let current = inner.current_preset.clone().unwrap_or_default();
        let next = if inner.config.presets.shuffle_presets {
            inner.rotation.shuffle_pick(&current, &mut inner.rng)
        } else {
            inner.rotation.advance(&current)
        };
        if let Some(key) = next {
            debug!(from = current.as_str(), to = key.as_str(), "rotating preset");
            inner.load_resolved(&key);
        }
    }
}

/// Handle to one engine instance; clones share the same engine
#[derive(Clone)]
pub struct VisualizerEngine {
    inner: Rc<RefCell<EngineInner>>,
}

impl VisualizerEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        factory: Rc<dyn RendererFactory>,
        catalog: Rc<dyn PresetCatalog>,
        surface: Rc<dyn HostSurface>,
        scheduler: Rc<dyn Scheduler>,
        service: Rc<RefCell<AudioGraphService>>,
        monitor: PerformanceMonitor,
        config: VizConfig,
    ) -> Self {
        let rotation = PresetRotation::new(catalog.keys());
        Self {
            inner: Rc::new(RefCell::new(EngineInner {
                factory,
                catalog,
                surface,
                scheduler,
                service,
                monitor,
                config,
                state: EngineState::Uninitialized,
                renderer: None,
                rotation,
                current_preset: None,
                surface_spec: None,
                frame_task: None,
                rotation_task: None,
                last_render_ms: f64::NEG_INFINITY,
                rng: StdRng::from_entropy(),
            })),
        }
    }

    /// Make preset picks reproducible
    pub fn seed_rng(&self, seed: u64) {
        self.inner.borrow_mut().rng = StdRng::seed_from_u64(seed);
    }

    /// Create the renderer, load the initial preset, connect the analyser,
    /// and start the frame and rotation timers. A renderer that fails to
    /// initialize leaves the engine running degraded (audio and timers
    /// live, nothing drawn) until [`retry_init`](Self::retry_init).
    pub fn mount(&self) -> CoreResult<()> {
        {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            match inner.state {
                EngineState::Disposed => return Err(CoreError::Disposed),
                EngineState::Active | EngineState::Suspended => return Ok(()),
                EngineState::Uninitialized => {}
            }

            let spec = surface_spec(&inner.config, inner.surface.viewport());
            inner.surface_spec = Some(spec);
            match inner.factory.create(&spec) {
                Ok(renderer) => {
                    info!(
                        width = spec.width,
                        height = spec.height,
                        texture = spec.texture_size,
                        "renderer created"
                    );
                    inner.renderer = Some(renderer);
                }
                Err(err) => warn!("renderer init failed, running degraded: {err}"),
            }

            inner.connect_audio();
            let requested = inner.config.presets.current_preset.clone();
            inner.load_resolved(&requested);

            let now = inner.scheduler.now_ms();
            inner.monitor.start(now);
            inner.last_render_ms = f64::NEG_INFINITY;
            inner.state = EngineState::Active;
        }

        self.schedule_frames();
        self.schedule_rotation();
        Ok(())
    }

    /// Attempt renderer creation again after a degraded mount
    pub fn retry_init(&self) -> CoreResult<()> {
        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        if inner.state == EngineState::Disposed {
            return Err(CoreError::Disposed);
        }
        if inner.renderer.is_some() {
            return Ok(());
        }

        let spec = inner
            .surface_spec
            .unwrap_or_else(|| surface_spec(&inner.config, inner.surface.viewport()));
        match inner.factory.create(&spec) {
            Ok(renderer) => {
                inner.renderer = Some(renderer);
                inner.connect_audio();
                let requested = inner.config.presets.current_preset.clone();
                inner.load_resolved(&requested);
                info!("renderer recovered");
                Ok(())
            }
            Err(err) => Err(CoreError::RendererInit(err.to_string())),
        }
    }

    /// Stop the timers, monitoring, and audio feed without tearing the
    /// renderer down
    pub fn suspend(&self) {
        let mut guard = self.inner.borrow_mut();
        if guard.state != EngineState::Active {
            return;
        }
        guard.cancel_timers();
        guard.monitor.stop();
        if let Some(renderer) = guard.renderer.as_mut() {
            renderer.disconnect_audio();
        }
        guard.state = EngineState::Suspended;
        info!("engine suspended");
    }

    pub fn resume(&self) -> CoreResult<()> {
        {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            match inner.state {
                EngineState::Disposed => return Err(CoreError::Disposed),
                EngineState::Suspended => {}
                _ => return Ok(()),
            }
            inner.connect_audio();
            let now = inner.scheduler.now_ms();
            inner.monitor.start(now);
            inner.last_render_ms = f64::NEG_INFINITY;
            inner.state = EngineState::Active;
        }
        self.schedule_frames();
        self.schedule_rotation();
        Ok(())
    }

    /// Terminal teardown: timers cancelled, audio disconnected, renderer
    /// dropped. Idempotent; the engine cannot be mounted again.
    pub fn dispose(&self) {
        let mut guard = self.inner.borrow_mut();
        if guard.state == EngineState::Disposed {
            return;
        }
        guard.cancel_timers();
        guard.monitor.stop();
        if let Some(mut renderer) = guard.renderer.take() {
            renderer.disconnect_audio();
        }
        guard.state = EngineState::Disposed;
        info!("engine disposed");
    }

    /// Load a preset by name immediately; the rotation timer keeps running
    pub fn request_preset(&self, requested: &str) -> CoreResult<()> {
        let mut guard = self.inner.borrow_mut();
        if guard.state == EngineState::Disposed {
            return Err(CoreError::Disposed);
        }
        guard.load_resolved(requested);
        Ok(())
    }

    /// Skip to the next preset in catalog order
    pub fn next_preset(&self) -> CoreResult<()> {
        let mut guard = self.inner.borrow_mut();
        if guard.state == EngineState::Disposed {
            return Err(CoreError::Disposed);
        }
        let current = guard.current_preset.clone().unwrap_or_default();
        if let Some(key) = guard.rotation.advance(&current) {
            guard.load_resolved(&key);
        }
        Ok(())
    }

    /// React to a new configuration snapshot: resize the surface, reload
    /// the preset when the selection changed, and rebuild any timer whose
    /// parameters changed. Everything else is picked up on the next frame.
    pub fn on_config_changed(&self, config: &VizConfig) {
        let (active, frames_changed, rotation_changed) = {
            let mut guard = self.inner.borrow_mut();
            let inner = &mut *guard;
            if inner.state == EngineState::Disposed {
                return;
            }
            let old = std::mem::replace(&mut inner.config, config.clone());

            let new_spec = surface_spec(&inner.config, inner.surface.viewport());
            if inner.surface_spec != Some(new_spec) {
                inner.surface_spec = Some(new_spec);
                if let Some(renderer) = inner.renderer.as_mut() {
                    renderer.resize(new_spec.width, new_spec.height);
                }
            }

            if old.presets.current_preset != inner.config.presets.current_preset {
                let requested = inner.config.presets.current_preset.clone();
                inner.load_resolved(&requested);
            }

            (
                inner.state == EngineState::Active,
                old.performance.target_fps != config.performance.target_fps
                    || old.performance.enable_vsync != config.performance.enable_vsync,
                old.presets.auto_switch_presets != config.presets.auto_switch_presets
                    || old.presets.switch_interval_secs != config.presets.switch_interval_secs,
            )
        };

        if frames_changed {
            let (scheduler, id) = {
                let mut guard = self.inner.borrow_mut();
                (Rc::clone(&guard.scheduler), guard.frame_task.take())
            };
            if let Some(id) = id {
                scheduler.cancel(id);
            }
            if active {
                self.schedule_frames();
            }
        }
        if rotation_changed {
            let (scheduler, id) = {
                let mut guard = self.inner.borrow_mut();
                (Rc::clone(&guard.scheduler), guard.rotation_task.take())
            };
            if let Some(id) = id {
                scheduler.cancel(id);
            }
            if active {
                self.schedule_rotation();
            }
        }
    }

    fn schedule_frames(&self) {
        let weak = Rc::downgrade(&self.inner);
        let (scheduler, vsync, interval) = {
            let inner = self.inner.borrow();
            let fps = inner.config.performance.target_fps.max(1);
            (
                Rc::clone(&inner.scheduler),
                inner.config.performance.enable_vsync,
                1000.0 / f64::from(fps),
            )
        };
        let id = if vsync {
            scheduler.schedule_frame(Box::new(move |now| EngineInner::on_frame(&weak, now)))
        } else {
            scheduler
                .schedule_repeating(interval, Box::new(move |now| EngineInner::on_frame(&weak, now)))
        };
        self.inner.borrow_mut().frame_task = Some(id);
    }

    fn schedule_rotation(&self) {
        let weak = Rc::downgrade(&self.inner);
        let (scheduler, enabled, interval_ms) = {
            let inner = self.inner.borrow();
            (
                Rc::clone(&inner.scheduler),
                inner.config.presets.auto_switch_presets && inner.rotation.len() > 1,
                f64::from(inner.config.presets.switch_interval_secs.max(1)) * 1000.0,
            )
        };
        if !enabled {
            return;
        }
        let id =
            scheduler.schedule_repeating(interval_ms, Box::new(move |_| EngineInner::on_rotate(&weak)));
        self.inner.borrow_mut().rotation_task = Some(id);
    }

    // -- observers ----------------------------------------------------------

    pub fn state(&self) -> EngineState {
        self.inner.borrow().state
    }

    pub fn current_preset(&self) -> Option<String> {
        self.inner.borrow().current_preset.clone()
    }

    /// Whether the engine is running without a renderer
    pub fn is_degraded(&self) -> bool {
        let inner = self.inner.borrow();
        inner.state != EngineState::Uninitialized && inner.renderer.is_none()
    }

    pub fn latest_sample(&self) -> Option<PerfSample> {
        self.inner.borrow().monitor.latest().copied()
    }

    pub fn performance_recommendations(&self) -> Vec<PerfRecommendation> {
        let inner = self.inner.borrow();
        inner
            .monitor
            .recommendations(inner.config.performance.max_memory_mb)
    }

    pub fn export_metrics(&self) -> CoreResult<String> {
        let inner = self.inner.borrow();
        inner
            .monitor
            .export_metrics(inner.config.performance.max_memory_mb)
    }

    #[cfg(test)]
    fn current_surface(&self) -> Option<SurfaceSpec> {
        self.inner.borrow().surface_spec
    }
}
