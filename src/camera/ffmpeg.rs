// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/ppe-monitor

//! ffmpeg-backed frame source for RTSP/HTTP cameras and local V4L2 devices

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::jpeg::JpegSplitter;
use super::{CameraConfig, Frame, FrameSource, SourceHandle};
use crate::error::{MonitorError, Result};

const READ_CHUNK: usize = 64 * 1024;

/// Spawns one ffmpeg process per open camera and reads JPEG images from its stdout
#[derive(Debug, Clone)]
pub struct FfmpegSource {
    ffmpeg_path: String,
    url_template: String,
    open_timeout: Duration,
    read_timeout: Duration,
}

impl FfmpegSource {
    pub fn new(
        ffmpeg_path: impl Into<String>,
        url_template: impl Into<String>,
        open_timeout: Duration,
        read_timeout: Duration,
    ) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            url_template: url_template.into(),
            open_timeout,
            read_timeout,
        }
    }

    fn command(&self, config: &CameraConfig) -> Command {
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.args(["-hide_banner", "-loglevel", "error", "-nostdin"]);

        if config.is_local_device() {
            cmd.args(["-f", "v4l2", "-i", &config.address]);
        } else {
            let url = config.stream_url(&self.url_template);
            if url.starts_with("rtsp://") {
                cmd.args(["-rtsp_transport", "tcp"]);
            }
            cmd.args(["-i", &url]);
        }

        cmd.args(["-f", "image2pipe", "-c:v", "mjpeg", "-q:v", "5", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl FrameSource for FfmpegSource {
    async fn open(&self, config: &CameraConfig) -> Result<Box<dyn SourceHandle>> {
        let mut child = self
            .command(config)
            .spawn()
            .map_err(|e| MonitorError::connect(&config.id, format!("failed to spawn ffmpeg: {e}")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MonitorError::connect(&config.id, "ffmpeg stdout not captured"))?;

        let mut handle = FfmpegHandle {
            camera: config.id.clone(),
            child: Some(child),
            stdout: Some(stdout),
            splitter: JpegSplitter::new(),
            chunk: vec![0u8; READ_CHUNK],
            read_timeout: self.read_timeout,
            sequence: 0,
            pending: None,
        };

        // The connection only counts as open once a first image arrives.
        match timeout(self.open_timeout, handle.next_frame()).await {
            Ok(Ok(frame)) => {
                debug!(camera_id = %config.id, width = frame.width(), height = frame.height(), "ffmpeg source open");
                handle.pending = Some(frame);
                Ok(Box::new(handle))
            }
            Ok(Err(e)) => {
                handle.release().await;
                Err(MonitorError::connect(&config.id, e))
            }
            Err(_) => {
                handle.release().await;
                Err(MonitorError::connect(
                    &config.id,
                    format!("no frame within {:?}", self.open_timeout),
                ))
            }
        }
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

struct FfmpegHandle {
    camera: String,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    splitter: JpegSplitter,
    chunk: Vec<u8>,
    read_timeout: Duration,
    sequence: u64,
    pending: Option<Frame>,
}

impl FfmpegHandle {
    async fn next_frame(&mut self) -> Result<Frame> {
        let stdout = self
            .stdout
            .as_mut()
            .ok_or_else(|| MonitorError::read(&self.camera, "source released"))?;

        loop {
            let n = stdout
                .read(&mut self.chunk)
                .await
                .map_err(|e| MonitorError::read(&self.camera, e))?;
            if n == 0 {
                return Err(MonitorError::read(&self.camera, "stream ended"));
            }

            let Some(image) = self.splitter.push(&self.chunk[..n]) else {
                continue;
            };
            self.sequence += 1;
            match Frame::from_jpeg(image, self.sequence) {
                Ok(frame) => return Ok(frame),
                Err(e) => debug!(camera_id = %self.camera, "skipping undecodable image: {}", e),
            }
        }
    }
}

#[async_trait]
impl SourceHandle for FfmpegHandle {
    async fn read_frame(&mut self) -> Result<Frame> {
        if let Some(frame) = self.pending.take() {
            return Ok(frame);
        }

        match timeout(self.read_timeout, self.next_frame()).await {
            Ok(result) => result,
            Err(_) => Err(MonitorError::read(
                &self.camera,
                format!("no frame within {:?}", self.read_timeout),
            )),
        }
    }

    async fn release(&mut self) {
        self.stdout = None;
        self.pending = None;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                warn!(camera_id = %self.camera, "failed to stop ffmpeg: {}", e);
            }
        }
    }
}
