//! Native Host Pieces
//!
//! Best-effort implementations of the environment seam for running Kaleido
//! outside a real media-player host (the CLI, local development). The probe
//! reports what the process can actually detect and stays optimistic about
//! the rest; the media provider has no playback element and offers only the
//! microphone tier.

use cpal::traits::HostTrait;
use tracing::debug;

use kaleido_dsp::SampleSource;

use crate::error::{HostError, HostResult};
use crate::mic::MicrophoneSource;
use crate::traits::{
    AmbientApis, AudioApiInfo, DisplayInfo, EnvProbe, GraphicsInfo, MediaProvider, PlaybackState,
};

/// Probe for a native process. Graphics facts are unknowable without a
/// window system, so it assumes an accelerated context with the required
/// extensions; concurrency comes from the OS.
pub struct NativeProbe;

impl EnvProbe for NativeProbe {
    fn graphics(&self) -> Option<GraphicsInfo> {
        Some(GraphicsInfo {
            renderer: None,
            extensions: vec!["float-texture".into(), "standard-derivatives".into()],
        })
    }

    fn audio_api(&self) -> AudioApiInfo {
        AudioApiInfo {
            available: true,
            worklet: false,
        }
    }

    fn ambient(&self) -> AmbientApis {
        AmbientApis {
            storage: true,
            frame_scheduling: true,
            high_res_timing: true,
            media_devices: cpal::default_host().default_input_device().is_some(),
        }
    }

    fn shared_memory(&self) -> bool {
        true
    }

    fn hardware_concurrency(&self) -> Option<u32> {
        std::thread::available_parallelism()
            .ok()
            .map(|n| n.get() as u32)
    }

    fn device_memory_gb(&self) -> Option<f32> {
        None
    }

    fn display(&self) -> DisplayInfo {
        DisplayInfo {
            width: 1920,
            height: 1080,
            pixel_ratio: 1.0,
        }
    }
}

/// Media provider for a host without a playback surface: the playback tier
/// always falls through and transport operations are unsupported.
pub struct NativeMedia;

impl MediaProvider for NativeMedia {
    fn capture_playback(&self) -> HostResult<Box<dyn SampleSource>> {
        debug!("No live playback element on a native host");
        Err(HostError::CaptureUnavailable(
            "no live playback element".into(),
        ))
    }

    fn capture_microphone(&self) -> HostResult<Box<dyn SampleSource>> {
        MicrophoneSource::open().map(|s| Box::new(s) as Box<dyn SampleSource>)
    }

    fn playback_state(&self) -> Option<PlaybackState> {
        None
    }

    fn play_pause(&self) -> HostResult<()> {
        Err(HostError::Unsupported("play/pause without a host player"))
    }
}
