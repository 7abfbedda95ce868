//! Host Environment Traits
//!
//! Defines the interface the visualizer core consumes. Each trait is a
//! deliberately narrow seam: capability facts, durable key/value storage,
//! media playback/capture, the opaque rendering engine, and preset blobs.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use serde::{Deserialize, Serialize};

use kaleido_dsp::{AnalyserHandle, SampleSource};

use crate::error::HostResult;

// ---------------------------------------------------------------------------
// Storage

/// Durable key/value storage for the persisted configuration document
pub trait StorageProvider {
    /// Read the stored document for `key`, `None` when absent
    fn read(&self, key: &str) -> HostResult<Option<String>>;

    /// Write `value` under `key`, replacing any previous document
    fn write(&self, key: &str, value: &str) -> HostResult<()>;
}

// ---------------------------------------------------------------------------
// Environment probe

/// Raw graphics facts; `None` from [`EnvProbe::graphics`] means no
/// accelerated context could be created at all
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphicsInfo {
    /// Renderer identification string, when the host exposes one
    pub renderer: Option<String>,

    /// Extension names the accelerated context supports
    pub extensions: Vec<String>,
}

/// Audio processing API facts
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AudioApiInfo {
    pub available: bool,
    pub worklet: bool,
}

/// Presence of the ambient APIs the core cannot run without
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AmbientApis {
    pub storage: bool,
    pub frame_scheduling: bool,
    pub high_res_timing: bool,
    pub media_devices: bool,
}

/// Display facts used by the capability heuristics
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DisplayInfo {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
}

/// One-shot environment inspection seam. All methods report facts; scoring
/// and recommendations happen in the core's prober.
pub trait EnvProbe {
    fn graphics(&self) -> Option<GraphicsInfo>;

    fn audio_api(&self) -> AudioApiInfo;

    fn ambient(&self) -> AmbientApis;

    fn shared_memory(&self) -> bool;

    fn hardware_concurrency(&self) -> Option<u32>;

    /// Device memory hint in gigabytes, when the host exposes one
    fn device_memory_gb(&self) -> Option<f32>;

    fn display(&self) -> DisplayInfo;

    /// Wall-clock cost of the synthetic CPU probe in milliseconds.
    /// The default runs a fixed-iteration trigonometric loop; fakes
    /// override it to script slow hosts.
    fn cpu_probe_ms(&self) -> f64 {
        let start = std::time::Instant::now();
        let mut acc = 0.0f64;
        for i in 0..100_000u32 {
            acc += f64::from(i).sin();
        }
        // Keep the accumulator observable so the loop is not optimized away
        std::hint::black_box(acc);
        start.elapsed().as_secs_f64() * 1000.0
    }

    /// Current process memory usage in megabytes, when measurable
    fn memory_usage_mb(&self) -> Option<u32> {
        None
    }
}

// ---------------------------------------------------------------------------
// Media playback surface

/// Currently playing item as exposed by the host player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub title: String,
    pub artists: Vec<String>,
}

/// Snapshot of the host player's transport state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub position_secs: f64,
    pub duration_secs: f64,
    /// Player volume, 0-100
    pub volume: f32,
    pub muted: bool,
    pub item: Option<MediaItem>,
}

/// Named playback events fired by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    Started,
    Stopped,
    PlayerChanged,
}

/// The host's playback surface: live audio taps, transport state, and
/// playback events.
///
/// # Capture binding invariant
///
/// `capture_playback` creates at most one capture node per media element
/// for the element's lifetime. A second call while a binding is live must
/// return [`HostError::AlreadyBound`](crate::HostError::AlreadyBound)
/// rather than double-capture.
pub trait MediaProvider {
    /// Tap the host's live media element, when one is reachable
    fn capture_playback(&self) -> HostResult<Box<dyn SampleSource>>;

    /// Request microphone capture; may be denied by the user or absent
    fn capture_microphone(&self) -> HostResult<Box<dyn SampleSource>>;

    fn playback_state(&self) -> Option<PlaybackState>;

    fn current_item(&self) -> Option<MediaItem> {
        self.playback_state().and_then(|s| s.item)
    }

    fn play_pause(&self) -> HostResult<()>;

    /// Playback event feed, when the host provides one
    fn events(&self) -> Option<Receiver<PlaybackEvent>> {
        None
    }
}

// ---------------------------------------------------------------------------
// Renderer engine capability

/// Blend mode applied when compositing rendered frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    Normal,
    Additive,
    Multiply,
    Screen,
}

/// Rendering surface request passed to the engine factory
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceSpec {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
    pub texture_size: u32,
}

/// Per-frame color/quality adjustments. Applied at render time, never baked
/// into the engine instance, so configuration changes take effect on the
/// next frame without reinitializing the surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    pub gamma: f32,
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub hue_shift_deg: f32,
    pub invert_colors: bool,
    pub blend_mode: BlendMode,
    pub post_processing: bool,
}

/// Opaque preset payload. The core never interprets the contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetBlob(Arc<[u8]>);

impl PresetBlob {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self(bytes.into())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

/// The external rendering engine instance (consumed capability)
pub trait RendererEngine {
    fn load_preset(&mut self, blob: &PresetBlob, blend_secs: f32);

    fn render(&mut self, params: &FrameParams);

    fn resize(&mut self, width: u32, height: u32);

    fn connect_audio(&mut self, analyser: AnalyserHandle);

    fn disconnect_audio(&mut self);
}

/// Constructs rendering engine instances for a given surface
pub trait RendererFactory {
    fn create(&self, surface: &SurfaceSpec) -> HostResult<Box<dyn RendererEngine>>;
}

/// External keyed collection of opaque preset blobs
pub trait PresetCatalog {
    /// Catalog keys in stable order
    fn keys(&self) -> Vec<String>;

    fn get(&self, key: &str) -> Option<PresetBlob>;
}

// ---------------------------------------------------------------------------
// Host surface

/// The sizable rendering surface owned by the host view
pub trait HostSurface {
    /// Current viewport size in CSS-like pixels
    fn viewport(&self) -> (u32, u32);

    fn request_fullscreen(&self) -> HostResult<()>;

    fn exit_fullscreen(&self) -> HostResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_blob_is_opaque_bytes() {
        let blob = PresetBlob::new(&b"warp-grid"[..]);
        assert_eq!(blob.bytes(), b"warp-grid");
        assert_eq!(blob.clone(), blob);
    }

    #[test]
    fn test_playback_state_roundtrip() {
        let state = PlaybackState {
            is_playing: true,
            position_secs: 12.5,
            duration_secs: 240.0,
            volume: 80.0,
            muted: false,
            item: Some(MediaItem {
                title: "Track".into(),
                artists: vec!["Artist".into()],
            }),
        };
        let json = serde_json::to_string(&state).unwrap();
        let back: PlaybackState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, back);
    }

    #[test]
    fn test_default_cpu_probe_runs() {
        struct Bare;
        impl EnvProbe for Bare {
            fn graphics(&self) -> Option<GraphicsInfo> {
                None
            }
            fn audio_api(&self) -> AudioApiInfo {
                AudioApiInfo {
                    available: false,
                    worklet: false,
                }
            }
            fn ambient(&self) -> AmbientApis {
                AmbientApis {
                    storage: false,
                    frame_scheduling: false,
                    high_res_timing: false,
                    media_devices: false,
                }
            }
            fn shared_memory(&self) -> bool {
                false
            }
            fn hardware_concurrency(&self) -> Option<u32> {
                None
            }
            fn device_memory_gb(&self) -> Option<f32> {
                None
            }
            fn display(&self) -> DisplayInfo {
                DisplayInfo {
                    width: 0,
                    height: 0,
                    pixel_ratio: 1.0,
                }
            }
        }
        assert!(Bare.cpu_probe_ms() >= 0.0);
    }
}
