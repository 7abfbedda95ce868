//! Kaleido Core - Visualizer Engine
//!
//! This crate provides the host-independent core of the Kaleido audio
//! visualizer:
//! - Configuration schema, validated patch merging, and persistence
//! - Environment capability probing and recommended settings
//! - The audio graph service (capture tiers, pump and player sync timers)
//! - The visualizer engine (renderer lifecycle, preset rotation, frame loop)
//! - Performance monitoring with corrective recommendations
//!
//! # Architecture
//!
//! ```text
//!                    ┌──────────────┐
//!  StorageProvider ─▶│ ConfigStore  │──subscribers──┐
//!                    └──────────────┘               ▼
//!  EnvProbe ──▶ check_environment ─┐      ┌──────────────────┐
//!                                  ├─────▶│    VizContext    │
//!  MediaProvider ─▶ AudioGraph ────┘      └──────────────────┘
//!                   Service                 │              │
//!                     │ analyser handle     ▼              ▼
//!                     └──────────▶ VisualizerEngine ──▶ RendererEngine
//!                                   (frame + rotation      (host-owned)
//!                                    timers, monitor)
//! ```
//!
//! Everything runs on one logical control thread; host capture threads hand
//! samples over through lock-free ring buffers inside the source types.

mod compat;
mod config;
mod context;
mod engine;
mod error;
mod perf;
mod presets;
mod store;
mod sync;

pub use compat::{
    check_environment, derive_recommended_settings, CapabilityReport, CapabilityTier,
    ProbeFailure, ProbeWarning, REQUIRED_EXTENSIONS, SLOW_CPU_THRESHOLD_MS,
};
pub use config::{
    validate_patch, AudioPatch, AudioSettings, AudioSource, CompatibilityPatch,
    CompatibilitySettings, ConfigPatch, ControlsPatch, ControlsPosition, ControlsSettings,
    ControlsSize, CustomPreset, GraphicsVersion, PerformancePatch, PerformanceSettings,
    PresetsPatch, PresetsSettings, Quality, TextureQuality, Theme, ValidationReport,
    VisualizerPatch, VisualizerSettings, VizConfig, CONFIG_VERSION, RANDOM_PRESET,
};
pub use context::{HostBundle, VizContext};
pub use engine::{EngineState, VisualizerEngine};
pub use error::{CoreError, CoreResult};
pub use perf::{
    PerfRecommendation, PerfSample, PerformanceMonitor, MAX_HISTORY, SAMPLE_WINDOW_MS,
};
pub use presets::PresetRotation;
pub use store::{ConfigStore, SubscriberId, STORAGE_KEY};
pub use sync::{AudioGraphService, PUMP_FRAMES, SAMPLE_RATE, SYNC_INTERVAL_MS};

// Re-export the host seams a shell needs to build a bundle
pub use kaleido_host::{BlendMode, FrameParams, PresetBlob, SurfaceSpec};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_exports() {
        // Verify public API is accessible
        let _config = VizConfig::default();
        let _monitor = PerformanceMonitor::new();
    }
}
