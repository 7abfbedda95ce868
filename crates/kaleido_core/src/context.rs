//! Visualizer Context
//!
//! Top-level wiring for one visualizer session. Construction probes the
//! environment, loads the configuration, and connects the store to the
//! audio service and the engine; `mount` brings the session live.
//!
//! Recommended settings are applied over the store only when the store
//! came up on pure defaults (fresh install) or the environment check
//! failed outright. A persisted user configuration is otherwise left
//! alone.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info, warn};

use kaleido_host::{
    EnvProbe, HostSurface, MediaProvider, PresetCatalog, RendererFactory, Scheduler,
    StorageProvider,
};

use crate::compat::{self, CapabilityReport};
use crate::config::{ConfigPatch, VizConfig};
use crate::engine::{EngineState, VisualizerEngine};
use crate::error::{CoreError, CoreResult};
use crate::perf::{PerfRecommendation, PerformanceMonitor};
use crate::store::ConfigStore;
use crate::sync::AudioGraphService;

/// Everything the host hands over to run a session
pub struct HostBundle {
    pub probe: Rc<dyn EnvProbe>,
    pub storage: Box<dyn StorageProvider>,
    pub media: Rc<dyn MediaProvider>,
    pub renderer_factory: Rc<dyn RendererFactory>,
    pub catalog: Rc<dyn PresetCatalog>,
    pub scheduler: Rc<dyn Scheduler>,
    pub surface: Rc<dyn HostSurface>,
}

/// One wired visualizer session
pub struct VizContext {
    store: Rc<RefCell<ConfigStore>>,
    report: CapabilityReport,
    service: Rc<RefCell<AudioGraphService>>,
    engine: VisualizerEngine,
    surface: Rc<dyn HostSurface>,
    media: Rc<dyn MediaProvider>,
}

impl VizContext {
    pub fn new(bundle: HostBundle) -> Self {
        let report = compat::check_environment(&*bundle.probe);
        let mut store = ConfigStore::load(bundle.storage);

        if store.was_defaulted() || !report.compatible {
            let recommended = compat::derive_recommended_settings(&report);
            info!(
                fresh = store.was_defaulted(),
                compatible = report.compatible,
                "applying recommended settings"
            );
            if let Err(err) = store.update(&recommended) {
                warn!("could not apply recommended settings: {err}");
            }
        }

        let probe = Rc::clone(&bundle.probe);
        let monitor = PerformanceMonitor::new()
            .with_memory_probe(Box::new(move || probe.memory_usage_mb()));

        let service = AudioGraphService::new(Rc::clone(&bundle.media), Rc::clone(&bundle.scheduler));
        let engine = VisualizerEngine::new(
            bundle.renderer_factory,
            bundle.catalog,
            Rc::clone(&bundle.surface),
            bundle.scheduler,
            Rc::clone(&service),
            monitor,
            store.get().clone(),
        );

        // Every accepted update fans out to the audio graph and the engine
        let service_sub = Rc::clone(&service);
        let engine_sub = engine.clone();
        store.subscribe(Box::new(move |config: &VizConfig| {
            match AudioGraphService::apply_audio_config(&service_sub, &config.audio) {
                Ok(()) | Err(CoreError::Disposed) => {}
                Err(err) => warn!("audio settings not applied: {err}"),
            }
            engine_sub.on_config_changed(config);
            debug!("configuration change propagated");
        }));

        Self {
            store: Rc::new(RefCell::new(store)),
            report,
            service,
            engine,
            surface: bundle.surface,
            media: bundle.media,
        }
    }

    /// Activate the audio graph and mount the engine. Safe to call again;
    /// a live session is left as it is.
    pub fn mount(&self) -> CoreResult<()> {
        if self.engine.state() == EngineState::Disposed {
            return Err(CoreError::Disposed);
        }
        if !self.service.borrow().is_active() {
            let audio = self.store.borrow().get().audio.clone();
            AudioGraphService::activate(&self.service, &audio)?;
        }
        self.engine.mount()
    }

    /// Tear the whole session down. Idempotent.
    pub fn dispose(&self) {
        self.engine.dispose();
        self.service.borrow_mut().dispose();
    }

    // -- configuration surface ----------------------------------------------

    pub fn config(&self) -> VizConfig {
        self.store.borrow().get().clone()
    }

    pub fn update_config(&self, patch: &ConfigPatch) -> CoreResult<()> {
        self.store.borrow_mut().update(patch)
    }

    pub fn reset_config(&self) {
        self.store.borrow_mut().reset_to_defaults();
    }

    pub fn export_config(&self) -> CoreResult<String> {
        self.store.borrow().export_snapshot()
    }

    pub fn import_config(&self, raw: &str) -> CoreResult<()> {
        self.store.borrow_mut().import_snapshot(raw)
    }

    // -- session surface -----------------------------------------------------

    pub fn report(&self) -> &CapabilityReport {
        &self.report
    }

    pub fn engine(&self) -> &VisualizerEngine {
        &self.engine
    }

    pub fn audio_source(&self) -> Option<&'static str> {
        self.service.borrow().source_name()
    }

    pub fn request_preset(&self, name: &str) -> CoreResult<()> {
        self.engine.request_preset(name)
    }

    pub fn next_preset(&self) -> CoreResult<()> {
        self.engine.next_preset()
    }

    pub fn suspend(&self) {
        self.engine.suspend();
    }

    pub fn resume(&self) -> CoreResult<()> {
        self.engine.resume()
    }

    pub fn performance_recommendations(&self) -> Vec<PerfRecommendation> {
        self.engine.performance_recommendations()
    }

    pub fn play_pause(&self) -> CoreResult<()> {
        Ok(self.media.play_pause()?)
    }

    pub fn set_fullscreen(&self, fullscreen: bool) -> CoreResult<()> {
        if fullscreen {
            Ok(self.surface.request_fullscreen()?)
        } else {
            Ok(self.surface.exit_fullscreen()?)
        }
    }
}

#[cfg(test)]
mod tests {
    use kaleido_host::testing::{
        FakeMedia, FakeProbe, FixedSurface, RecordingFactory, StaticCatalog,
    };
    use kaleido_host::{ManualScheduler, MemoryStorage};

    use super::*;
    use crate::config::{AudioPatch, AudioSource, Quality, VisualizerPatch};
    use crate::store::STORAGE_KEY;

    struct Rig {
        context: VizContext,
        scheduler: Rc<ManualScheduler>,
        factory: Rc<RecordingFactory>,
        storage: MemoryStorage,
    }

    fn rig_with(probe: FakeProbe, storage: MemoryStorage) -> Rig {
        let scheduler = Rc::new(ManualScheduler::with_paint_interval(1000.0 / 60.0));
        let factory = Rc::new(RecordingFactory::new());
        let context = VizContext::new(HostBundle {
            probe: Rc::new(probe),
            storage: Box::new(storage.clone()),
            media: Rc::new(FakeMedia::new(true, true)),
            renderer_factory: Rc::clone(&factory) as Rc<dyn RendererFactory>,
            catalog: Rc::new(StaticCatalog::new(["alpha", "beta", "gamma"])),
            scheduler: Rc::clone(&scheduler) as Rc<dyn Scheduler>,
            surface: Rc::new(FixedSurface::new(1280, 720)),
        });
        Rig {
            context,
            scheduler,
            factory,
            storage,
        }
    }

    fn rig() -> Rig {
        rig_with(FakeProbe::default(), MemoryStorage::new())
    }

    #[test]
    fn test_fresh_store_gets_recommended_settings() {
        let weak_probe = FakeProbe {
            cores: Some(2),
            cpu_ms: 200.0,
            memory_gb: Some(2.0),
            ..Default::default()
        };
        let rig = rig_with(weak_probe, MemoryStorage::new());
        // Three warnings keep the tier high but still trim memory and CPU use
        let config = rig.context.config();
        assert!(config.performance.low_power_mode);
        assert!(!config.performance.preload_presets);
        assert_eq!(config.performance.max_memory_mb, 128);
        assert_eq!(config.visualizer.quality, Quality::High);
    }

    #[test]
    fn test_persisted_config_wins_over_recommendations() {
        let storage = MemoryStorage::with_entry(STORAGE_KEY, r#"{"performance": {"targetFps": 120}}"#);
        let weak_probe = FakeProbe {
            cores: Some(2),
            cpu_ms: 200.0,
            ..Default::default()
        };
        let rig = rig_with(weak_probe, storage);
        assert_eq!(rig.context.config().performance.target_fps, 120);
    }

    #[test]
    fn test_incompatible_environment_degrades_even_persisted_config() {
        let storage =
            MemoryStorage::with_entry(STORAGE_KEY, r#"{"visualizer": {"quality": "ultra"}}"#);
        let broken_probe = FakeProbe {
            audio_available: false,
            ..Default::default()
        };
        let rig = rig_with(broken_probe, storage);
        assert!(!rig.context.report().compatible);

        let config = rig.context.config();
        assert_eq!(config.visualizer.quality, Quality::Low);
        assert_eq!(config.audio.source, AudioSource::Demo);
    }

    #[test]
    fn test_mount_runs_audio_and_frames_together() {
        let rig = rig();
        rig.context.mount().unwrap();
        assert_eq!(rig.context.audio_source(), Some("playback"));

        rig.scheduler.advance(200.0);
        let log = rig.factory.last_log().unwrap();
        assert!(log.borrow().frames > 0);
        assert!(log.borrow().audio_connected);

        // Mounting again is a no-op
        rig.context.mount().unwrap();
        assert_eq!(rig.factory.surfaces.borrow().len(), 1);
    }

    #[test]
    fn test_config_update_propagates_to_engine_and_audio() {
        let rig = rig();
        rig.context.mount().unwrap();

        rig.context
            .update_config(&ConfigPatch {
                visualizer: Some(VisualizerPatch {
                    quality: Some(Quality::Low),
                    ..Default::default()
                }),
                audio: Some(AudioPatch {
                    source: Some(AudioSource::Demo),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .unwrap();

        let log = rig.factory.last_log().unwrap();
        assert_eq!(log.borrow().resizes, vec![(256, 256)]);
        assert_eq!(rig.context.audio_source(), Some("tone"));
    }

    #[test]
    fn test_rejected_update_changes_nothing() {
        let rig = rig();
        rig.context.mount().unwrap();
        let before = rig.context.config();

        let err = rig
            .context
            .update_config(&ConfigPatch {
                audio: Some(AudioPatch {
                    sensitivity: Some(9.0),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::ConfigValidation(_)));
        assert_eq!(rig.context.config(), before);
    }

    #[test]
    fn test_export_import_roundtrip_through_context() {
        let first = rig();
        first
            .context
            .update_config(&ConfigPatch {
                visualizer: Some(VisualizerPatch {
                    gamma: Some(1.8),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .unwrap();
        let exported = first.context.export_config().unwrap();

        let other = rig();
        other.context.import_config(&exported).unwrap();
        assert_eq!(other.context.config().visualizer.gamma, 1.8);
    }

    #[test]
    fn test_updates_persist_across_contexts() {
        let rig = rig();
        rig.context
            .update_config(&ConfigPatch {
                visualizer: Some(VisualizerPatch {
                    quality: Some(Quality::Ultra),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .unwrap();

        let reopened = rig_with(FakeProbe::default(), rig.storage.clone());
        assert_eq!(reopened.context.config().visualizer.quality, Quality::Ultra);
    }

    #[test]
    fn test_dispose_is_idempotent_and_updates_stay_safe() {
        let rig = rig();
        rig.context.mount().unwrap();
        rig.context.dispose();
        rig.context.dispose();

        assert!(matches!(rig.context.mount(), Err(CoreError::Disposed)));
        // Store updates still work; propagation is skipped silently
        rig.context
            .update_config(&ConfigPatch {
                visualizer: Some(VisualizerPatch {
                    gamma: Some(2.0),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(rig.context.config().visualizer.gamma, 2.0);
    }

    #[test]
    fn test_preset_controls_pass_through() {
        let rig = rig();
        rig.context.mount().unwrap();
        rig.context.request_preset("beta").unwrap();
        assert_eq!(rig.context.engine().current_preset().as_deref(), Some("beta"));
        rig.context.next_preset().unwrap();
        assert_eq!(rig.context.engine().current_preset().as_deref(), Some("gamma"));
    }
}
