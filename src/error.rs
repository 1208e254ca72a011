// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/ppe-monitor

//! Error taxonomy shared by the capture pipeline

/// Result type alias
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors raised inside the monitoring core.
///
/// Only [`MonitorError::ConfigInvalid`] and [`MonitorError::NotFound`] are meant to reach an
/// HTTP caller; everything else is contained by the camera worker that produced it.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Source unreachable. Retried with backoff, never fatal.
    #[error("camera {camera}: connect failed: {reason}")]
    ConnectFailed { camera: String, reason: String },

    /// Mid-stream read error. Triggers a reconnect.
    #[error("camera {camera}: read failed: {reason}")]
    ReadFailed { camera: String, reason: String },

    /// Classifier call failed or timed out. Treated as zero detections.
    #[error("classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    /// Violation artifact or record could not be persisted.
    #[error("storage write failed: {0}")]
    StorageWriteFailed(String),

    /// Malformed add/update camera request
    #[error("invalid camera config: {0}")]
    ConfigInvalid(String),

    /// Camera record file unreadable or unwritable
    #[error("config store error: {0}")]
    ConfigStore(String),

    /// Unknown camera id
    #[error("camera not found: {0}")]
    NotFound(String),

    /// JPEG encode/decode failure
    #[error("frame encoding failed: {0}")]
    Encoding(String),
}

impl MonitorError {
    pub fn connect(camera: &str, reason: impl ToString) -> Self {
        Self::ConnectFailed {
            camera: camera.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn read(camera: &str, reason: impl ToString) -> Self {
        Self::ReadFailed {
            camera: camera.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<image::ImageError> for MonitorError {
    fn from(err: image::ImageError) -> Self {
        Self::Encoding(err.to_string())
    }
}
