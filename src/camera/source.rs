// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/ppe-monitor

//! Frame acquisition traits

use async_trait::async_trait;

use super::{CameraConfig, Frame};
use crate::error::Result;

/// Opens connections to cameras.
///
/// Implementations do no retrying of their own; retry policy belongs to the
/// [`CameraWorker`](super::CameraWorker). `open` must be safe to call again after a failure.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Connect to the camera. Fails with `MonitorError::ConnectFailed`.
    async fn open(&self, config: &CameraConfig) -> Result<Box<dyn SourceHandle>>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// An open connection to a single camera
#[async_trait]
pub trait SourceHandle: Send {
    /// Next frame in capture order. Fails with `MonitorError::ReadFailed`; a failure does
    /// not mean the camera is gone for good.
    async fn read_frame(&mut self) -> Result<Frame>;

    /// Release the underlying device or connection. Idempotent.
    async fn release(&mut self);
}
