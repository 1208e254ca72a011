//! Test doubles shared by the unit tests

use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use crate::camera::{
    BackoffPolicy, CameraConfig, Frame, FrameSource, SourceHandle, WorkerContext, WorkerSettings,
};
use crate::db::Database;
use crate::detection::{Classifier, ClassifyParams, Detection, ViolationRecorder};
use crate::error::{MonitorError, Result};
use crate::streaming::FrameBroadcaster;

/// Small RGB frame with a recognisable gradient
pub fn rgb_frame(sequence: u64) -> Frame {
    let (width, height) = (16u32, 12u32);
    let mut pixels = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.extend_from_slice(&[(x * 16) as u8, (y * 20) as u8, sequence as u8]);
        }
    }
    Frame::from_rgb8(width, height, pixels, sequence).unwrap()
}

/// Poll `condition` until it holds, for up to two seconds
pub async fn wait_until(condition: impl Fn() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Worker collaborators with fast timings, storing artifacts under `dir`
pub fn worker_context(
    dir: &Path,
    source: Arc<dyn FrameSource>,
    classifier: Arc<dyn Classifier>,
) -> WorkerContext {
    WorkerContext {
        source,
        classifier,
        recorder: Arc::new(ViolationRecorder::new(
            dir.join("violations"),
            "/violations",
            Database::open_in_memory().unwrap(),
            Duration::ZERO,
        )),
        broadcaster: Arc::new(FrameBroadcaster::new()),
        settings: WorkerSettings {
            backoff: BackoffPolicy::fixed(Duration::from_millis(20)),
            frame_interval: Duration::from_millis(5),
            classify: ClassifyParams::default(),
            classify_timeout: Duration::from_millis(200),
        },
    }
}

#[derive(Debug, Default)]
struct Script {
    attempts: u32,
    successes: u32,
    reopen_failures: u32,
}

/// Frame source whose failures are scripted up front
#[derive(Debug, Default)]
pub struct ScriptedSource {
    script: Mutex<Script>,
    releases: Arc<AtomicU32>,
    fail_first_opens: u32,
    fail_reopens: u32,
    fail_reads_after: Option<u64>,
    crash_after: Option<u64>,
    frame_limit: Option<u64>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first `n` opens fail
    pub fn fail_opens(mut self, n: u32) -> Self {
        self.fail_first_opens = n;
        self
    }

    /// After the first successful open, the next `n` opens fail
    pub fn fail_opens_after_first(mut self, n: u32) -> Self {
        self.fail_reopens = n;
        self
    }

    /// The first connection fails its read after `n` frames
    pub fn fail_reads_after(mut self, n: u64) -> Self {
        self.fail_reads_after = Some(n);
        self
    }

    /// The first connection panics on the read after `n` frames, killing the worker task
    pub fn crash_after(mut self, n: u64) -> Self {
        self.crash_after = Some(n);
        self
    }

    /// Each connection yields `n` frames and then stalls
    pub fn frame_limit(mut self, n: u64) -> Self {
        self.frame_limit = Some(n);
        self
    }

    pub fn open_attempts(&self) -> u32 {
        self.script.lock().attempts
    }

    pub fn releases(&self) -> u32 {
        self.releases.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn open(&self, config: &CameraConfig) -> Result<Box<dyn SourceHandle>> {
        let first_connection = {
            let mut script = self.script.lock();
            script.attempts += 1;
            if script.attempts <= self.fail_first_opens {
                return Err(MonitorError::connect(&config.id, "scripted refusal"));
            }
            if script.successes > 0 && script.reopen_failures < self.fail_reopens {
                script.reopen_failures += 1;
                return Err(MonitorError::connect(&config.id, "scripted refusal"));
            }
            script.successes += 1;
            script.successes == 1
        };

        Ok(Box::new(ScriptedHandle {
            camera: config.id.clone(),
            sequence: 0,
            fail_after: if first_connection {
                self.fail_reads_after
            } else {
                None
            },
            crash_after: if first_connection {
                self.crash_after
            } else {
                None
            },
            limit: self.frame_limit,
            releases: self.releases.clone(),
        }))
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

struct ScriptedHandle {
    camera: String,
    sequence: u64,
    fail_after: Option<u64>,
    crash_after: Option<u64>,
    limit: Option<u64>,
    releases: Arc<AtomicU32>,
}

#[async_trait]
impl SourceHandle for ScriptedHandle {
    async fn read_frame(&mut self) -> Result<Frame> {
        if self.fail_after.is_some_and(|n| self.sequence >= n) {
            return Err(MonitorError::read(&self.camera, "scripted read error"));
        }
        if self.crash_after.is_some_and(|n| self.sequence >= n) {
            panic!("scripted crash of {}", self.camera);
        }
        if self.limit.is_some_and(|n| self.sequence >= n) {
            std::future::pending::<()>().await;
        }
        self.sequence += 1;
        Ok(rgb_frame(self.sequence))
    }

    async fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Classifier that reports the same classes for every frame
#[derive(Debug, Default)]
pub struct FixedClassifier {
    classes: Vec<String>,
    fail: bool,
    delay: Duration,
    calls: AtomicUsize,
}

impl FixedClassifier {
    pub fn new(classes: &[&str]) -> Self {
        Self {
            classes: classes.iter().map(|c| c.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Every answer takes `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Classifier for FixedClassifier {
    async fn classify(&self, _jpeg: Bytes, _params: ClassifyParams) -> Result<Vec<Detection>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(MonitorError::ClassifierUnavailable("scripted outage".into()));
        }
        Ok(self
            .classes
            .iter()
            .map(|class| Detection::new(class, 0.9))
            .collect())
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}
