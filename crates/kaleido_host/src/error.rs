//! Host Error Types

use thiserror::Error;

/// Errors surfaced by host environment implementations
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Storage read failed: {0}")]
    StorageRead(String),

    #[error("Storage write failed: {0}")]
    StorageWrite(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("Capture permission denied: {0}")]
    PermissionDenied(String),

    #[error("Media element already bound to a capture node")]
    AlreadyBound,

    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to build audio stream: {0}")]
    StreamBuild(String),

    #[error("Renderer construction failed: {0}")]
    RendererInit(String),

    #[error("Operation not supported by this host: {0}")]
    Unsupported(&'static str),
}

/// Result type alias for host operations
pub type HostResult<T> = Result<T, HostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HostError::DeviceNotFound("USB Mic".into());
        assert!(err.to_string().contains("USB Mic"));

        let err = HostError::AlreadyBound;
        assert!(err.to_string().contains("already bound"));
    }
}
