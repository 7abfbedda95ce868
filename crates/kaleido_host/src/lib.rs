//! Kaleido Host - Environment Seam
//!
//! The core never touches the host directly. Everything ambient - durable
//! storage, environment capability facts, media capture, the rendering
//! engine, preset catalogs, and timer/frame scheduling - goes through the
//! narrow traits defined here, so the core runs unchanged against a real
//! host or a fully fake one in tests.
//!
//! # Provided implementations
//!
//! - [`MemoryStorage`] / [`FileStorage`] - storage providers
//! - [`ManualScheduler`] - deterministic virtual-clock scheduler
//! - [`NativeProbe`] / [`NativeMedia`] - best-effort native environment
//! - [`MicrophoneSource`] - cpal input capture feeding the analysis graph
//! - [`testing`] - scripted fakes for core tests

mod error;
mod mic;
mod native;
mod scheduler;
mod storage;
mod traits;

pub mod testing;

pub use error::{HostError, HostResult};
pub use mic::MicrophoneSource;
pub use native::{NativeMedia, NativeProbe};
pub use scheduler::{ManualScheduler, Scheduler, TaskFn, TaskId};
pub use storage::{FileStorage, MemoryStorage};
pub use traits::{
    AmbientApis, AudioApiInfo, BlendMode, DisplayInfo, EnvProbe, FrameParams, GraphicsInfo,
    HostSurface, MediaItem, MediaProvider, PlaybackEvent, PlaybackState, PresetBlob,
    PresetCatalog, RendererEngine, RendererFactory, StorageProvider, SurfaceSpec,
};

// The analyser side of the renderer seam comes from the DSP crate
pub use kaleido_dsp::{AnalyserHandle, SampleSource};
