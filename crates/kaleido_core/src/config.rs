//! Configuration Schema
//!
//! The single configuration tree: six sections, always fully populated.
//! Partial input only exists as [`ConfigPatch`], which is merged
//! field-by-field over a full snapshot, so the store never holds a
//! partially-defined document. Section and field names serialize in
//! camelCase to mirror the persisted JSON document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use kaleido_host::BlendMode;

/// FFT sizes accepted by the audio section
pub const FFT_SIZES: [u32; 6] = [256, 512, 1024, 2048, 4096, 8192];

/// Target frame rates accepted by the performance section
pub const TARGET_FPS_VALUES: [u32; 3] = [30, 60, 120];

/// Schema version written into every persisted document
pub const CONFIG_VERSION: &str = "1.0.0";

// ---------------------------------------------------------------------------
// Sections

/// Where the analysis graph takes its input from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioSource {
    /// The host player's live media element
    Playback,
    Microphone,
    System,
    /// Synthetic tone, for demoing without any capture
    Demo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioSettings {
    pub source: AudioSource,
    /// Input scaling, 0-2
    pub sensitivity: f32,
    /// Analyser smoothing time constant, 0-1
    pub smoothing: f32,
    pub fft_size: u32,
    /// Decibel floor, -90 to -10
    pub min_decibels: f32,
    /// Decibel ceiling, -10 to 0
    pub max_decibels: f32,
    pub enable_equalizer: bool,
    pub equalizer_bands: [f32; 10],
}

/// Rendering-surface quality tier. The fixed tiers map to square surfaces;
/// `Native` scales with the viewport and pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    High,
    Ultra,
    Native,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualizerSettings {
    pub quality: Quality,
    pub pixel_ratio: f32,
    pub blend_mode: BlendMode,
    /// 0.5-3.0
    pub gamma: f32,
    /// 0-2
    pub brightness: f32,
    /// 0-2
    pub contrast: f32,
    /// 0-2
    pub saturation: f32,
    /// Degrees, 0-360
    pub hue_shift: f32,
    pub invert_colors: bool,
    pub enable_post_processing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlsPosition {
    Bottom,
    Top,
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlsSize {
    Small,
    Medium,
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    Light,
    Auto,
}

/// Overlay-control preferences. Consumed only by the host view layer, but
/// validated and persisted here with everything else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlsSettings {
    pub show_controls: bool,
    pub auto_hide_delay_ms: u32,
    pub position: ControlsPosition,
    /// 0-1
    pub opacity: f32,
    pub size: ControlsSize,
    pub theme: Theme,
    pub enable_keyboard_shortcuts: bool,
    pub enable_touch_gestures: bool,
}

/// User-authored preset entry; the payload stays opaque
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomPreset {
    pub id: String,
    pub name: String,
    pub description: String,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Sentinel preset name meaning "pick one at random"
pub const RANDOM_PRESET: &str = "random";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetsSettings {
    /// A catalog key, or [`RANDOM_PRESET`]
    pub current_preset: String,
    pub auto_switch_presets: bool,
    pub switch_interval_secs: u32,
    pub favorite_presets: Vec<String>,
    pub custom_presets: Vec<CustomPreset>,
    /// Cross-fade duration when a preset loads
    pub transition_secs: f32,
    pub shuffle_presets: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextureQuality {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSettings {
    pub target_fps: u32,
    pub enable_vsync: bool,
    pub low_power_mode: bool,
    pub max_memory_mb: u32,
    pub enable_worker: bool,
    pub preload_presets: bool,
    pub texture_quality: TextureQuality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphicsVersion {
    Auto,
    Gl1,
    Gl2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilitySettings {
    pub enable_fallbacks: bool,
    pub graphics_version: GraphicsVersion,
    pub audio_worklet: bool,
    pub shared_memory: bool,
    pub force_software_rendering: bool,
}

/// The full configuration tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VizConfig {
    pub version: String,
    pub audio: AudioSettings,
    pub visualizer: VisualizerSettings,
    pub controls: ControlsSettings,
    pub presets: PresetsSettings,
    pub performance: PerformanceSettings,
    pub compatibility: CompatibilitySettings,
}

impl Default for VizConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.into(),
            audio: AudioSettings {
                source: AudioSource::Playback,
                sensitivity: 1.0,
                smoothing: 0.8,
                fft_size: 2048,
                min_decibels: -90.0,
                max_decibels: -10.0,
                enable_equalizer: false,
                equalizer_bands: [0.0; 10],
            },
            visualizer: VisualizerSettings {
                quality: Quality::High,
                pixel_ratio: 1.0,
                blend_mode: BlendMode::Normal,
                gamma: 1.0,
                brightness: 1.0,
                contrast: 1.0,
                saturation: 1.0,
                hue_shift: 0.0,
                invert_colors: false,
                enable_post_processing: true,
            },
            controls: ControlsSettings {
                show_controls: true,
                auto_hide_delay_ms: 3000,
                position: ControlsPosition::Bottom,
                opacity: 0.9,
                size: ControlsSize::Medium,
                theme: Theme::Dark,
                enable_keyboard_shortcuts: true,
                enable_touch_gestures: true,
            },
            presets: PresetsSettings {
                current_preset: RANDOM_PRESET.into(),
                auto_switch_presets: false,
                switch_interval_secs: 30,
                favorite_presets: Vec::new(),
                custom_presets: Vec::new(),
                transition_secs: 2.0,
                shuffle_presets: false,
            },
            performance: PerformanceSettings {
                target_fps: 60,
                enable_vsync: true,
                low_power_mode: false,
                max_memory_mb: 256,
                enable_worker: false,
                preload_presets: true,
                texture_quality: TextureQuality::High,
            },
            compatibility: CompatibilitySettings {
                enable_fallbacks: true,
                graphics_version: GraphicsVersion::Auto,
                audio_worklet: false,
                shared_memory: false,
                force_software_rendering: false,
            },
        }
    }
}

impl VizConfig {
    /// A copy with `patch` merged over it
    pub fn merged_with(&self, patch: &ConfigPatch) -> Self {
        let mut next = self.clone();
        patch.apply_to(&mut next);
        next
    }
}

// ---------------------------------------------------------------------------
// Patches

fn set<T: Clone>(slot: &mut T, value: &Option<T>) {
    if let Some(v) = value {
        *slot = v.clone();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioPatch {
    pub source: Option<AudioSource>,
    pub sensitivity: Option<f32>,
    pub smoothing: Option<f32>,
    pub fft_size: Option<u32>,
    pub min_decibels: Option<f32>,
    pub max_decibels: Option<f32>,
    pub enable_equalizer: Option<bool>,
    pub equalizer_bands: Option<[f32; 10]>,
}

impl AudioPatch {
    fn apply_to(&self, target: &mut AudioSettings) {
        set(&mut target.source, &self.source);
        set(&mut target.sensitivity, &self.sensitivity);
        set(&mut target.smoothing, &self.smoothing);
        set(&mut target.fft_size, &self.fft_size);
        set(&mut target.min_decibels, &self.min_decibels);
        set(&mut target.max_decibels, &self.max_decibels);
        set(&mut target.enable_equalizer, &self.enable_equalizer);
        set(&mut target.equalizer_bands, &self.equalizer_bands);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisualizerPatch {
    pub quality: Option<Quality>,
    pub pixel_ratio: Option<f32>,
    pub blend_mode: Option<BlendMode>,
    pub gamma: Option<f32>,
    pub brightness: Option<f32>,
    pub contrast: Option<f32>,
    pub saturation: Option<f32>,
    pub hue_shift: Option<f32>,
    pub invert_colors: Option<bool>,
    pub enable_post_processing: Option<bool>,
}

impl VisualizerPatch {
    fn apply_to(&self, target: &mut VisualizerSettings) {
        set(&mut target.quality, &self.quality);
        set(&mut target.pixel_ratio, &self.pixel_ratio);
        set(&mut target.blend_mode, &self.blend_mode);
        set(&mut target.gamma, &self.gamma);
        set(&mut target.brightness, &self.brightness);
        set(&mut target.contrast, &self.contrast);
        set(&mut target.saturation, &self.saturation);
        set(&mut target.hue_shift, &self.hue_shift);
        set(&mut target.invert_colors, &self.invert_colors);
        set(&mut target.enable_post_processing, &self.enable_post_processing);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControlsPatch {
    pub show_controls: Option<bool>,
    pub auto_hide_delay_ms: Option<u32>,
    pub position: Option<ControlsPosition>,
    pub opacity: Option<f32>,
    pub size: Option<ControlsSize>,
    pub theme: Option<Theme>,
    pub enable_keyboard_shortcuts: Option<bool>,
    pub enable_touch_gestures: Option<bool>,
}

impl ControlsPatch {
    fn apply_to(&self, target: &mut ControlsSettings) {
        set(&mut target.show_controls, &self.show_controls);
        set(&mut target.auto_hide_delay_ms, &self.auto_hide_delay_ms);
        set(&mut target.position, &self.position);
        set(&mut target.opacity, &self.opacity);
        set(&mut target.size, &self.size);
        set(&mut target.theme, &self.theme);
        set(&mut target.enable_keyboard_shortcuts, &self.enable_keyboard_shortcuts);
        set(&mut target.enable_touch_gestures, &self.enable_touch_gestures);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PresetsPatch {
    pub current_preset: Option<String>,
    pub auto_switch_presets: Option<bool>,
    pub switch_interval_secs: Option<u32>,
    /// Arrays replace wholesale, they are never merged element-wise
    pub favorite_presets: Option<Vec<String>>,
    pub custom_presets: Option<Vec<CustomPreset>>,
    pub transition_secs: Option<f32>,
    pub shuffle_presets: Option<bool>,
}

impl PresetsPatch {
    fn apply_to(&self, target: &mut PresetsSettings) {
        set(&mut target.current_preset, &self.current_preset);
        set(&mut target.auto_switch_presets, &self.auto_switch_presets);
        set(&mut target.switch_interval_secs, &self.switch_interval_secs);
        set(&mut target.favorite_presets, &self.favorite_presets);
        set(&mut target.custom_presets, &self.custom_presets);
        set(&mut target.transition_secs, &self.transition_secs);
        set(&mut target.shuffle_presets, &self.shuffle_presets);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerformancePatch {
    pub target_fps: Option<u32>,
    pub enable_vsync: Option<bool>,
    pub low_power_mode: Option<bool>,
    pub max_memory_mb: Option<u32>,
    pub enable_worker: Option<bool>,
    pub preload_presets: Option<bool>,
    pub texture_quality: Option<TextureQuality>,
}

impl PerformancePatch {
    fn apply_to(&self, target: &mut PerformanceSettings) {
        set(&mut target.target_fps, &self.target_fps);
        set(&mut target.enable_vsync, &self.enable_vsync);
        set(&mut target.low_power_mode, &self.low_power_mode);
        set(&mut target.max_memory_mb, &self.max_memory_mb);
        set(&mut target.enable_worker, &self.enable_worker);
        set(&mut target.preload_presets, &self.preload_presets);
        set(&mut target.texture_quality, &self.texture_quality);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompatibilityPatch {
    pub enable_fallbacks: Option<bool>,
    pub graphics_version: Option<GraphicsVersion>,
    pub audio_worklet: Option<bool>,
    pub shared_memory: Option<bool>,
    pub force_software_rendering: Option<bool>,
}

impl CompatibilityPatch {
    fn apply_to(&self, target: &mut CompatibilitySettings) {
        set(&mut target.enable_fallbacks, &self.enable_fallbacks);
        set(&mut target.graphics_version, &self.graphics_version);
        set(&mut target.audio_worklet, &self.audio_worklet);
        set(&mut target.shared_memory, &self.shared_memory);
        set(&mut target.force_software_rendering, &self.force_software_rendering);
    }
}

/// A partial configuration: any subset of sections, any subset of fields.
/// Sections merge recursively, scalar and array fields replace wholesale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigPatch {
    pub version: Option<String>,
    pub audio: Option<AudioPatch>,
    pub visualizer: Option<VisualizerPatch>,
    pub controls: Option<ControlsPatch>,
    pub presets: Option<PresetsPatch>,
    pub performance: Option<PerformancePatch>,
    pub compatibility: Option<CompatibilityPatch>,
}

impl ConfigPatch {
    pub fn apply_to(&self, target: &mut VizConfig) {
        set(&mut target.version, &self.version);
        if let Some(p) = &self.audio {
            p.apply_to(&mut target.audio);
        }
        if let Some(p) = &self.visualizer {
            p.apply_to(&mut target.visualizer);
        }
        if let Some(p) = &self.controls {
            p.apply_to(&mut target.controls);
        }
        if let Some(p) = &self.presets {
            p.apply_to(&mut target.presets);
        }
        if let Some(p) = &self.performance {
            p.apply_to(&mut target.performance);
        }
        if let Some(p) = &self.compatibility {
            p.apply_to(&mut target.compatibility);
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// Lifts a single-section patch into a full patch, for section-scoped updates
macro_rules! section_patch {
    ($($ty:ty => $field:ident),* $(,)?) => {
        $(impl From<$ty> for ConfigPatch {
            fn from(section: $ty) -> Self {
                Self {
                    $field: Some(section),
                    ..Self::default()
                }
            }
        })*
    };
}

section_patch!(
    AudioPatch => audio,
    VisualizerPatch => visualizer,
    ControlsPatch => controls,
    PresetsPatch => presets,
    PerformancePatch => performance,
    CompatibilityPatch => compatibility,
);

// ---------------------------------------------------------------------------
// Validation

/// Outcome of validating a patch against the documented ranges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

fn check_range(errors: &mut Vec<String>, value: Option<f32>, lo: f32, hi: f32, message: &str) {
    if let Some(v) = value {
        if !(lo..=hi).contains(&v) {
            errors.push(message.to_string());
        }
    }
}

/// Check every present numeric field against its documented range and the
/// discrete fields against their allowed sets. Never mutates anything.
pub fn validate_patch(patch: &ConfigPatch) -> ValidationReport {
    let mut errors = Vec::new();

    if let Some(audio) = &patch.audio {
        check_range(
            &mut errors,
            audio.sensitivity,
            0.0,
            2.0,
            "Audio sensitivity must be between 0 and 2",
        );
        check_range(
            &mut errors,
            audio.smoothing,
            0.0,
            1.0,
            "Audio smoothing must be between 0 and 1",
        );
        if let Some(fft) = audio.fft_size {
            if !FFT_SIZES.contains(&fft) {
                errors.push("FFT size must be 256, 512, 1024, 2048, 4096, or 8192".into());
            }
        }
        check_range(
            &mut errors,
            audio.min_decibels,
            -90.0,
            -10.0,
            "Minimum decibels must be between -90 and -10",
        );
        check_range(
            &mut errors,
            audio.max_decibels,
            -10.0,
            0.0,
            "Maximum decibels must be between -10 and 0",
        );
    }

    if let Some(visualizer) = &patch.visualizer {
        check_range(
            &mut errors,
            visualizer.gamma,
            0.5,
            3.0,
            "Gamma must be between 0.5 and 3.0",
        );
        check_range(
            &mut errors,
            visualizer.brightness,
            0.0,
            2.0,
            "Brightness must be between 0 and 2",
        );
        check_range(
            &mut errors,
            visualizer.contrast,
            0.0,
            2.0,
            "Contrast must be between 0 and 2",
        );
        check_range(
            &mut errors,
            visualizer.saturation,
            0.0,
            2.0,
            "Saturation must be between 0 and 2",
        );
        check_range(
            &mut errors,
            visualizer.hue_shift,
            0.0,
            360.0,
            "Hue shift must be between 0 and 360",
        );
        check_range(
            &mut errors,
            visualizer.pixel_ratio,
            0.25,
            4.0,
            "Pixel ratio must be between 0.25 and 4",
        );
    }

    if let Some(controls) = &patch.controls {
        check_range(
            &mut errors,
            controls.opacity,
            0.0,
            1.0,
            "Controls opacity must be between 0 and 1",
        );
    }

    if let Some(performance) = &patch.performance {
        if let Some(fps) = performance.target_fps {
            if !TARGET_FPS_VALUES.contains(&fps) {
                errors.push("Target FPS must be 30, 60, or 120".into());
            }
        }
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
    }
}
