//! Capability Probing
//!
//! Turns the raw facts from an [`EnvProbe`] into a scored
//! [`CapabilityReport`] and a recommended configuration patch:
//!
//! ```text
//! EnvProbe ──▶ check_environment() ──▶ CapabilityReport ──▶ derive_recommended_settings()
//!                              │                        │
//!                         errors/warnings          ConfigPatch
//! ```
//!
//! Failures are conditions the visualizer cannot run under; warnings only
//! lower the score. Score starts at 100 and drops 5 per warning and 20 per
//! failure; the resulting tier picks the default quality/fps/texture trio.

use serde::Serialize;
use tracing::{info, warn};

use kaleido_host::EnvProbe;

use crate::config::{
    AudioPatch, AudioSource, CompatibilityPatch, ConfigPatch, PerformancePatch, Quality,
    TextureQuality, VisualizerPatch,
};

/// Extensions the renderer cannot draw correctly without
pub const REQUIRED_EXTENSIONS: [&str; 2] = ["float-texture", "standard-derivatives"];

/// CPU probe durations above this are treated as a slow host
pub const SLOW_CPU_THRESHOLD_MS: f64 = 50.0;

/// Conditions the visualizer cannot run under
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "detail")]
pub enum ProbeFailure {
    NoAcceleratedGraphics,
    NoAudioApi,
    MissingAmbientApi(&'static str),
}

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoAcceleratedGraphics => write!(f, "no accelerated graphics context"),
            Self::NoAudioApi => write!(f, "no audio processing API"),
            Self::MissingAmbientApi(name) => write!(f, "required host API missing: {name}"),
        }
    }
}

/// Degraded-but-workable conditions; each costs 5 score points
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "detail")]
pub enum ProbeWarning {
    SoftwareRenderer,
    MissingExtension(String),
    NoWorklet,
    NoSharedMemory,
    LowCpuCores,
    LowDeviceMemory,
    SlowCpu,
    LowResolution,
    HighDensityDisplay,
}

impl ProbeWarning {
    /// Human-readable corrective advice, surfaced in the report
    fn advice(&self) -> &'static str {
        match self {
            Self::SoftwareRenderer | Self::MissingExtension(_) => {
                "Force software rendering and lower the quality tier"
            }
            Self::NoWorklet => "Keep audio processing on the control thread",
            Self::NoSharedMemory | Self::LowCpuCores | Self::SlowCpu => {
                "Disable the processing worker and enable low power mode"
            }
            Self::LowDeviceMemory => "Lower the memory budget and disable preset preloading",
            Self::LowResolution => "Use a smaller render surface",
            Self::HighDensityDisplay => "Cap the pixel ratio",
        }
    }
}

impl std::fmt::Display for ProbeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SoftwareRenderer => write!(f, "software rasterizer in use"),
            Self::MissingExtension(name) => write!(f, "graphics extension missing: {name}"),
            Self::NoWorklet => write!(f, "audio worklet unavailable"),
            Self::NoSharedMemory => write!(f, "shared memory unavailable"),
            Self::LowCpuCores => write!(f, "fewer than 4 CPU cores"),
            Self::LowDeviceMemory => write!(f, "less than 4 GB device memory"),
            Self::SlowCpu => write!(f, "CPU probe exceeded threshold"),
            Self::LowResolution => write!(f, "display smaller than 1024x768"),
            Self::HighDensityDisplay => write!(f, "pixel ratio above 2"),
        }
    }
}

/// Output tier the score buckets into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityTier {
    Low,
    Medium,
    High,
}

/// Scored environment assessment
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityReport {
    pub compatible: bool,
    /// 0-100
    pub score: u32,
    pub tier: CapabilityTier,
    pub errors: Vec<ProbeFailure>,
    pub warnings: Vec<ProbeWarning>,
    /// Deduplicated corrective advice, in finding order
    pub recommendations: Vec<String>,
}

impl CapabilityReport {
    fn from_findings(errors: Vec<ProbeFailure>, warnings: Vec<ProbeWarning>) -> Self {
        let penalty = 5 * warnings.len() as i32 + 20 * errors.len() as i32;
        let score = (100 - penalty).max(0) as u32;
        let tier = if score >= 80 {
            CapabilityTier::High
        } else if score >= 50 {
            CapabilityTier::Medium
        } else {
            CapabilityTier::Low
        };

        let mut recommendations = Vec::new();
        if !errors.is_empty() {
            recommendations
                .push("Run the synthetic demo source at the lowest quality tier".to_string());
        }
        for warning in &warnings {
            let advice = warning.advice();
            if !recommendations.iter().any(|r| r == advice) {
                recommendations.push(advice.to_string());
            }
        }

        Self {
            compatible: errors.is_empty(),
            score,
            tier,
            errors,
            warnings,
            recommendations,
        }
    }

    pub fn has_warning(&self, warning: &ProbeWarning) -> bool {
        self.warnings.contains(warning)
    }
}

fn renderer_looks_software(renderer: &str) -> bool {
    let lower = renderer.to_ascii_lowercase();
    lower.contains("software") || lower.contains("swiftshader") || lower.contains("llvmpipe")
}

/// Inspect the environment once and score it
pub fn check_environment(probe: &dyn EnvProbe) -> CapabilityReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    match probe.graphics() {
        None => errors.push(ProbeFailure::NoAcceleratedGraphics),
        Some(graphics) => {
            if graphics
                .renderer
                .as_deref()
                .is_some_and(renderer_looks_software)
            {
                warnings.push(ProbeWarning::SoftwareRenderer);
            }
            for required in REQUIRED_EXTENSIONS {
                if !graphics.extensions.iter().any(|e| e == required) {
                    warnings.push(ProbeWarning::MissingExtension(required.into()));
                }
            }
        }
    }

    let audio = probe.audio_api();
    if !audio.available {
        errors.push(ProbeFailure::NoAudioApi);
    } else if !audio.worklet {
        warnings.push(ProbeWarning::NoWorklet);
    }

    let ambient = probe.ambient();
    if !ambient.storage {
        errors.push(ProbeFailure::MissingAmbientApi("storage"));
    }
    if !ambient.frame_scheduling {
        errors.push(ProbeFailure::MissingAmbientApi("frame scheduling"));
    }
    if !ambient.high_res_timing {
        errors.push(ProbeFailure::MissingAmbientApi("high resolution timing"));
    }
    if !ambient.media_devices {
        errors.push(ProbeFailure::MissingAmbientApi("media devices"));
    }

    if !probe.shared_memory() {
        warnings.push(ProbeWarning::NoSharedMemory);
    }
    if probe.hardware_concurrency().is_some_and(|cores| cores < 4) {
        warnings.push(ProbeWarning::LowCpuCores);
    }
    if probe.device_memory_gb().is_some_and(|gb| gb < 4.0) {
        warnings.push(ProbeWarning::LowDeviceMemory);
    }
    if probe.cpu_probe_ms() > SLOW_CPU_THRESHOLD_MS {
        warnings.push(ProbeWarning::SlowCpu);
    }

    let display = probe.display();
    if display.width < 1024 || display.height < 768 {
        warnings.push(ProbeWarning::LowResolution);
    }
    if display.pixel_ratio > 2.0 {
        warnings.push(ProbeWarning::HighDensityDisplay);
    }

    let report = CapabilityReport::from_findings(errors, warnings);
    if report.compatible {
        info!(
            score = report.score,
            warnings = report.warnings.len(),
            "environment check passed"
        );
    } else {
        warn!(
            score = report.score,
            errors = report.errors.len(),
            "environment check failed"
        );
    }
    report
}

/// Settings suited to the probed environment. Applied over defaults on a
/// fresh install. An incompatible report degrades to the lowest tier and
/// forces the demo source so the graph never touches capture APIs the
/// host lacks.
pub fn derive_recommended_settings(report: &CapabilityReport) -> ConfigPatch {
    let tier = if report.compatible {
        report.tier
    } else {
        CapabilityTier::Low
    };
    let (quality, target_fps, texture_quality) = match tier {
        CapabilityTier::Low => (Quality::Low, 30, TextureQuality::Low),
        CapabilityTier::Medium => (Quality::Medium, 60, TextureQuality::Medium),
        CapabilityTier::High => (Quality::High, 60, TextureQuality::High),
    };

    let mut performance = PerformancePatch {
        target_fps: Some(target_fps),
        texture_quality: Some(texture_quality),
        ..Default::default()
    };
    let mut compatibility = CompatibilityPatch::default();
    let mut audio = AudioPatch::default();

    if report.has_warning(&ProbeWarning::LowDeviceMemory) {
        performance.max_memory_mb = Some(128);
        performance.preload_presets = Some(false);
    }
    if report.has_warning(&ProbeWarning::SlowCpu) || report.has_warning(&ProbeWarning::LowCpuCores)
    {
        performance.enable_worker = Some(false);
        performance.low_power_mode = Some(true);
    }
    if report.has_warning(&ProbeWarning::SoftwareRenderer)
        || report
            .warnings
            .iter()
            .any(|w| matches!(w, ProbeWarning::MissingExtension(_)))
    {
        compatibility.force_software_rendering = Some(true);
    }
    if !report.compatible {
        audio.source = Some(AudioSource::Demo);
    }

    ConfigPatch {
        visualizer: Some(VisualizerPatch {
            quality: Some(quality),
            ..Default::default()
        }),
        performance: Some(performance),
        compatibility: if compatibility == CompatibilityPatch::default() {
            None
        } else {
            Some(compatibility)
        },
        audio: if audio == AudioPatch::default() {
            None
        } else {
            Some(audio)
        },
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use kaleido_host::testing::FakeProbe;

    use super::*;

    #[test]
    fn test_healthy_environment_scores_high() {
        let report = check_environment(&FakeProbe::default());
        assert!(report.compatible);
        assert_eq!(report.score, 100);
        assert_eq!(report.tier, CapabilityTier::High);
        assert!(report.errors.is_empty());
        assert!(report.warnings.is_empty());
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn test_missing_graphics_is_fatal() {
        let probe = FakeProbe {
            accelerated: false,
            ..Default::default()
        };
        let report = check_environment(&probe);
        assert!(!report.compatible);
        assert!(report.errors.contains(&ProbeFailure::NoAcceleratedGraphics));
        assert_eq!(report.score, 80);
    }

    #[test]
    fn test_warnings_stack_into_lower_tiers() {
        // software renderer + slow cpu + low memory + low cores + no worklet
        let probe = FakeProbe {
            renderer: Some("SwiftShader Software Renderer".into()),
            worklet: false,
            cores: Some(2),
            memory_gb: Some(2.0),
            cpu_ms: 120.0,
            ..Default::default()
        };
        let report = check_environment(&probe);
        assert!(report.compatible);
        assert_eq!(report.warnings.len(), 5);
        assert_eq!(report.score, 75);
        assert_eq!(report.tier, CapabilityTier::Medium);
        // Slow cpu and low cores collapse into one piece of advice
        assert_eq!(report.recommendations.len(), 4);
    }

    #[test]
    fn test_score_never_goes_negative() {
        let probe = FakeProbe {
            accelerated: false,
            audio_available: false,
            ambient: kaleido_host::AmbientApis {
                storage: false,
                frame_scheduling: false,
                high_res_timing: false,
                media_devices: false,
            },
            shared_memory: false,
            cores: Some(1),
            memory_gb: Some(1.0),
            cpu_ms: 500.0,
            display: kaleido_host::DisplayInfo {
                width: 640,
                height: 480,
                pixel_ratio: 3.0,
            },
            ..Default::default()
        };
        let report = check_environment(&probe);
        assert_eq!(report.score, 0);
        assert_eq!(report.tier, CapabilityTier::Low);
        assert!(!report.compatible);
    }

    #[test]
    fn test_missing_extensions_force_software_rendering() {
        let probe = FakeProbe {
            extensions: vec!["float-texture".into()],
            ..Default::default()
        };
        let report = check_environment(&probe);
        assert!(report
            .warnings
            .contains(&ProbeWarning::MissingExtension("standard-derivatives".into())));

        let patch = derive_recommended_settings(&report);
        assert_eq!(
            patch.compatibility.unwrap().force_software_rendering,
            Some(true)
        );
    }

    #[test]
    fn test_recommendations_by_tier() {
        let high = derive_recommended_settings(&check_environment(&FakeProbe::default()));
        assert_eq!(high.visualizer.as_ref().unwrap().quality, Some(Quality::High));
        assert_eq!(high.performance.as_ref().unwrap().target_fps, Some(60));
        assert!(high.audio.is_none());

        let probe = FakeProbe {
            cores: Some(2),
            memory_gb: Some(2.0),
            cpu_ms: 200.0,
            worklet: false,
            shared_memory: false,
            renderer: Some("llvmpipe".into()),
            display: kaleido_host::DisplayInfo {
                width: 800,
                height: 600,
                pixel_ratio: 1.0,
            },
            ..Default::default()
        };
        // Seven warnings score 65: warnings alone bottom out at Medium
        let report = check_environment(&probe);
        assert_eq!(report.warnings.len(), 7);
        assert_eq!(report.tier, CapabilityTier::Medium);
        let medium = derive_recommended_settings(&report);
        let performance = medium.performance.unwrap();
        assert_eq!(performance.target_fps, Some(60));
        assert_eq!(performance.texture_quality, Some(TextureQuality::Medium));
        // Warning-driven knobs apply regardless of tier
        assert_eq!(performance.max_memory_mb, Some(128));
        assert_eq!(performance.preload_presets, Some(false));
        assert_eq!(performance.low_power_mode, Some(true));
        assert_eq!(medium.visualizer.unwrap().quality, Some(Quality::Medium));
    }

    #[test]
    fn test_low_tier_needs_an_error_class_failure() {
        let probe = FakeProbe {
            audio_available: false,
            cores: Some(2),
            memory_gb: Some(2.0),
            cpu_ms: 200.0,
            shared_memory: false,
            renderer: Some("llvmpipe".into()),
            ..Default::default()
        };
        // One error and five warnings score 55, but incompatible reports
        // degrade to the lowest tier regardless of score
        let report = check_environment(&probe);
        assert!(!report.compatible);
        let low = derive_recommended_settings(&report);
        let performance = low.performance.unwrap();
        assert_eq!(performance.target_fps, Some(30));
        assert_eq!(performance.texture_quality, Some(TextureQuality::Low));
        assert_eq!(low.visualizer.unwrap().quality, Some(Quality::Low));
    }

    #[test]
    fn test_incompatible_report_recommends_demo_source() {
        let probe = FakeProbe {
            audio_available: false,
            ..Default::default()
        };
        let report = check_environment(&probe);
        let patch = derive_recommended_settings(&report);
        assert_eq!(patch.audio.unwrap().source, Some(AudioSource::Demo));
        // Degrades to the lowest tier regardless of score
        assert_eq!(patch.visualizer.unwrap().quality, Some(Quality::Low));
    }

    #[test]
    fn test_report_serializes_for_reporting() {
        let report = check_environment(&FakeProbe {
            accelerated: false,
            ..Default::default()
        });
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"compatible\":false"));
        assert!(json.contains("noAcceleratedGraphics"));
    }
}
