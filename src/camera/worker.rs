// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/ppe-monitor

//! Per-camera capture loop
//!
//! ```text
//!   Connecting ──open ok──▶ Streaming ──read failed──▶ Reconnecting
//!      │  ▲                    ▲                          │  ▲
//!      │  └──backoff───┘       └────────open ok───────────┘  └──backoff──┘
//!      └──────────────── stop (from any state) ───────────────▶ Stopped
//! ```

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::{BackoffPolicy, CameraConfig, Frame, FrameSource, SourceHandle};
use crate::detection::{Classifier, ClassifyParams, ViolationRecorder};
use crate::error::{MonitorError, Result};
use crate::streaming::FrameBroadcaster;

/// Lifecycle state of a camera worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Connecting,
    Streaming,
    Reconnecting,
    /// Terminal. Only reached through a stop signal.
    Stopped,
}

/// Loop tuning shared by every worker
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub backoff: BackoffPolicy,
    /// Minimum time between two reads
    pub frame_interval: Duration,
    pub classify: ClassifyParams,
    /// Upper bound on one classifier call
    pub classify_timeout: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            frame_interval: Duration::from_millis(33),
            classify: ClassifyParams::default(),
            classify_timeout: Duration::from_secs(10),
        }
    }
}

/// Collaborators a worker needs. Cheap to clone.
#[derive(Clone)]
pub struct WorkerContext {
    pub source: Arc<dyn FrameSource>,
    pub classifier: Arc<dyn Classifier>,
    pub recorder: Arc<ViolationRecorder>,
    pub broadcaster: Arc<FrameBroadcaster>,
    pub settings: WorkerSettings,
}

/// Counters updated by the worker loop
#[derive(Debug, Default)]
pub struct WorkerStats {
    frames_captured: AtomicU64,
    violations_recorded: AtomicU64,
    reconnects: AtomicU64,
    classifier_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerStatsSnapshot {
    pub frames_captured: u64,
    pub violations_recorded: u64,
    pub reconnects: u64,
    pub classifier_failures: u64,
}

impl WorkerStats {
    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            violations_recorded: self.violations_recorded.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
            classifier_failures: self.classifier_failures.load(Ordering::Relaxed),
        }
    }
}

/// Capture → classify → record loop for one camera
pub struct CameraWorker {
    config: CameraConfig,
    ctx: WorkerContext,
    stop_rx: watch::Receiver<bool>,
    state_tx: watch::Sender<WorkerState>,
    stats: Arc<WorkerStats>,
    handle: Option<Box<dyn SourceHandle>>,
    classifier_down: bool,
}

impl CameraWorker {
    /// Start a worker task. The camera's frame slot should already be registered with the
    /// broadcaster.
    pub fn spawn(config: CameraConfig, ctx: WorkerContext) -> WorkerHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(WorkerState::Connecting);
        let stats = Arc::new(WorkerStats::default());

        let worker = CameraWorker {
            config: config.clone(),
            ctx,
            stop_rx,
            state_tx,
            stats: stats.clone(),
            handle: None,
            classifier_down: false,
        };
        let task = tokio::spawn(worker.run());

        WorkerHandle {
            config,
            stop_tx,
            state_rx,
            task,
            stats,
        }
    }

    async fn run(mut self) {
        let camera_id = self.config.id.clone();
        info!(camera_id = %camera_id, source = self.ctx.source.name(), "camera worker started");

        let mut failures: u32 = 0;
        let mut ticker = interval(self.ctx.settings.frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            match self.handle.as_mut() {
                None => {
                    let opened = tokio::select! {
                        biased;
                        _ = wait_for_stop(&mut self.stop_rx) => break,
                        result = self.ctx.source.open(&self.config) => result,
                    };

                    match opened {
                        Ok(handle) => {
                            self.handle = Some(handle);
                            failures = 0;
                            ticker.reset();
                            self.set_state(WorkerState::Streaming);
                            info!(camera_id = %camera_id, "camera connected");
                        }
                        Err(e) => {
                            failures = failures.saturating_add(1);
                            let delay = self.ctx.settings.backoff.delay(failures);
                            warn!(
                                camera_id = %camera_id,
                                attempt = failures,
                                delay_ms = delay.as_millis() as u64,
                                "{}",
                                e
                            );
                            tokio::select! {
                                biased;
                                _ = wait_for_stop(&mut self.stop_rx) => break,
                                _ = sleep(delay) => {}
                            }
                        }
                    }
                }
                Some(handle) => {
                    tokio::select! {
                        biased;
                        _ = wait_for_stop(&mut self.stop_rx) => break,
                        _ = ticker.tick() => {}
                    }

                    let read = tokio::select! {
                        biased;
                        _ = wait_for_stop(&mut self.stop_rx) => break,
                        result = handle.read_frame() => result,
                    };

                    match read {
                        Ok(frame) => {
                            if !self.process(frame).await {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(camera_id = %camera_id, "{}; reconnecting", e);
                            self.release().await;
                            self.ctx.broadcaster.reset(&camera_id);
                            self.stats.reconnects.fetch_add(1, Ordering::Relaxed);
                            self.set_state(WorkerState::Reconnecting);
                        }
                    }
                }
            }
        }

        self.release().await;
        self.ctx.broadcaster.clear(&camera_id);
        self.set_state(WorkerState::Stopped);
        info!(camera_id = %camera_id, "camera worker stopped");
    }

    /// Publish, classify and record one frame. Returns false if a stop arrived meanwhile.
    async fn process(&mut self, frame: Frame) -> bool {
        let camera_id = self.config.id.as_str();
        self.stats.frames_captured.fetch_add(1, Ordering::Relaxed);
        self.ctx.broadcaster.publish(camera_id, frame.clone());

        let classified = tokio::select! {
            biased;
            _ = wait_for_stop(&mut self.stop_rx) => return false,
            result = classify(&self.ctx, &self.config, &frame) => result,
        };

        let classes = match classified {
            Ok(classes) => {
                if self.classifier_down {
                    info!(camera_id, "classifier available again");
                    self.classifier_down = false;
                }
                classes
            }
            Err(e) => {
                self.stats.classifier_failures.fetch_add(1, Ordering::Relaxed);
                if self.classifier_down {
                    debug!(camera_id, "{}", e);
                } else {
                    warn!(camera_id, "{}; treating frame as clean", e);
                    self.classifier_down = true;
                }
                return true;
            }
        };

        for class in classes {
            // a started write always completes before the loop exits
            let stopping = *self.stop_rx.borrow();
            if stopping {
                return false;
            }
            match self.ctx.recorder.record_if_due(&frame, camera_id, &class).await {
                Ok(Some(_)) => {
                    self.stats.violations_recorded.fetch_add(1, Ordering::Relaxed);
                }
                Ok(None) => {}
                Err(e) => error!(camera_id, class = %class, "violation dropped: {}", e),
            }
        }
        true
    }

    async fn release(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.release().await;
        }
    }

    fn set_state(&self, state: WorkerState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                info!(camera_id = %self.config.id, from = ?current, to = ?state, "worker state");
                *current = state;
                true
            }
        });
    }
}

/// Resolves once a stop has been requested, or the requester is gone
async fn wait_for_stop(stop: &mut watch::Receiver<bool>) {
    while !*stop.borrow_and_update() {
        if stop.changed().await.is_err() {
            return;
        }
    }
}

/// Distinct monitored classes present in the frame
async fn classify(
    ctx: &WorkerContext,
    config: &CameraConfig,
    frame: &Frame,
) -> Result<BTreeSet<String>> {
    let jpeg = frame
        .encode_jpeg()
        .await
        .map_err(|e| MonitorError::ClassifierUnavailable(e.to_string()))?;

    let settings = &ctx.settings;
    let detections = timeout(
        settings.classify_timeout,
        ctx.classifier.classify(jpeg, settings.classify),
    )
    .await
    .map_err(|_| {
        MonitorError::ClassifierUnavailable(format!(
            "no answer within {:?}",
            settings.classify_timeout
        ))
    })??;

    Ok(detections
        .into_iter()
        .map(|d| d.class)
        .filter(|class| config.monitors(class))
        .collect())
}

/// Owner's side of a running worker
pub struct WorkerHandle {
    config: CameraConfig,
    stop_tx: watch::Sender<bool>,
    state_rx: watch::Receiver<WorkerState>,
    task: JoinHandle<()>,
    stats: Arc<WorkerStats>,
}

impl WorkerHandle {
    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn state(&self) -> WorkerState {
        *self.state_rx.borrow()
    }

    pub fn stats(&self) -> WorkerStatsSnapshot {
        self.stats.snapshot()
    }

    /// False once the loop has exited, whether stopped or crashed
    pub fn is_running(&self) -> bool {
        !self.task.is_finished() && self.state() != WorkerState::Stopped
    }

    pub fn subscribe_state(&self) -> watch::Receiver<WorkerState> {
        self.state_rx.clone()
    }

    pub fn signal_stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Stop and wait up to `limit` for the loop to exit. Aborts the task and returns false
    /// on timeout.
    pub async fn stop(mut self, limit: Duration) -> bool {
        self.signal_stop();
        match timeout(limit, &mut self.task).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(camera_id = %self.config.id, "camera worker ended abnormally: {}", e);
                true
            }
            Err(_) => {
                self.task.abort();
                false
            }
        }
    }
}
