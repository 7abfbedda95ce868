//! Core Error Taxonomy
//!
//! Internal component errors are caught at the component boundary and
//! become either a logged warning (non-blocking) or one of these typed
//! rejections (blocking, surfaced to the immediate caller). Nothing is
//! allowed to escape a timer or frame callback.

use thiserror::Error;

/// Errors surfaced by the visualizer core
#[derive(Error, Debug)]
pub enum CoreError {
    /// Range or enum violation; the store is left unchanged
    #[error("Configuration validation failed: {}", .0.join(", "))]
    ConfigValidation(Vec<String>),

    /// Malformed JSON or a document the schema rejects; the store is
    /// left unchanged
    #[error("Invalid configuration document: {0}")]
    ImportParse(String),

    /// Renderer engine could not be constructed; the loop degrades to a
    /// static placeholder instead of crashing
    #[error("Renderer initialization failed: {0}")]
    RendererInit(String),

    #[error("Component already disposed")]
    Disposed,

    #[error(transparent)]
    Dsp(#[from] kaleido_dsp::DspError),

    #[error(transparent)]
    Host(#[from] kaleido_host::HostError),

    #[error("Serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;
