// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/ppe-monitor

//! Supervisor - keeps one worker running per active camera record

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::camera::{
    CameraConfig, CameraStatus, CameraUpdate, CameraWorker, WorkerContext, WorkerHandle,
    WorkerState, WorkerStatsSnapshot,
};
use crate::config::CameraStore;
use crate::detection::ViolationRecorder;
use crate::error::{MonitorError, Result};
use crate::streaming::FrameBroadcaster;

/// Answer to a camera status query
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraStatusReport {
    /// `Active` iff a worker is running and has published a frame
    pub status: CameraStatus,
    pub last_checked: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<WorkerState>,
}

/// A camera record together with its live worker state
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraSummary {
    pub id: String,
    #[serde(flatten)]
    pub config: CameraConfig,
    pub worker: Option<WorkerState>,
    pub live: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<WorkerStatsSnapshot>,
}

/// What one reconciliation pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub started: Vec<String>,
    pub stopped: Vec<String>,
}

impl ReconcileReport {
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.stopped.is_empty()
    }
}

/// Owns the table of running workers.
///
/// Lifecycle operations (add, update, remove, reconcile) run one at a time; the worker
/// table itself is only locked for short, non-async sections so status queries never wait
/// on a slow stop.
pub struct Supervisor {
    store: Arc<CameraStore>,
    ctx: WorkerContext,
    workers: Mutex<HashMap<String, WorkerHandle>>,
    lifecycle: tokio::sync::Mutex<()>,
    stop_timeout: Duration,
    reconcile_interval: Duration,
}

impl Supervisor {
    pub fn new(
        store: Arc<CameraStore>,
        ctx: WorkerContext,
        stop_timeout: Duration,
        reconcile_interval: Duration,
    ) -> Self {
        Self {
            store,
            ctx,
            workers: Mutex::new(HashMap::new()),
            lifecycle: tokio::sync::Mutex::new(()),
            stop_timeout,
            reconcile_interval,
        }
    }

    pub fn store(&self) -> &CameraStore {
        &self.store
    }

    pub fn broadcaster(&self) -> &Arc<FrameBroadcaster> {
        &self.ctx.broadcaster
    }

    pub fn recorder(&self) -> &Arc<ViolationRecorder> {
        &self.ctx.recorder
    }

    /// Make the running workers match `desired`. Inactive records are ignored.
    pub async fn reconcile(&self, desired: Vec<CameraConfig>) -> ReconcileReport {
        let _guard = self.lifecycle.lock().await;
        self.reconcile_locked(desired).await
    }

    /// Reconcile against the camera record file. The pass is skipped if the file cannot
    /// be read.
    pub async fn reconcile_from_store(&self) -> Result<ReconcileReport> {
        let _guard = self.lifecycle.lock().await;
        let desired = self.store.desired().await?;
        Ok(self.reconcile_locked(desired).await)
    }

    async fn reconcile_locked(&self, desired: Vec<CameraConfig>) -> ReconcileReport {
        let desired: HashMap<String, CameraConfig> = desired
            .into_iter()
            .filter(CameraConfig::is_active)
            .map(|config| (config.id.clone(), config))
            .collect();

        // Absent, changed, or exited unexpectedly
        let stale: Vec<WorkerHandle> = {
            let mut workers = self.workers.lock();
            let ids: Vec<String> = workers
                .iter()
                .filter(|(id, handle)| match desired.get(*id) {
                    Some(config) => config != handle.config() || !handle.is_running(),
                    None => true,
                })
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| workers.remove(id)).collect()
        };

        let mut report = ReconcileReport {
            stopped: stale.iter().map(|h| h.config().id.clone()).collect(),
            ..Default::default()
        };
        for handle in &stale {
            if !handle.is_running() && desired.contains_key(&handle.config().id) {
                warn!(camera_id = %handle.config().id, "camera worker exited unexpectedly; restarting");
            }
        }
        self.stop_workers(stale).await;

        let mut to_start: Vec<CameraConfig> = {
            let workers = self.workers.lock();
            desired
                .into_values()
                .filter(|config| !workers.contains_key(&config.id))
                .collect()
        };
        to_start.sort_by(|a, b| a.id.cmp(&b.id));
        for config in to_start {
            report.started.push(config.id.clone());
            self.start_worker(config);
        }

        if !report.is_empty() {
            info!(
                started = ?report.started,
                stopped = ?report.stopped,
                "reconciled cameras"
            );
        }
        report
    }

    /// Persist `config` and start monitoring it. Returns false if an identical worker was
    /// already running.
    pub async fn add_camera(&self, config: CameraConfig) -> Result<bool> {
        let _guard = self.lifecycle.lock().await;
        self.store.upsert(&config).await?;
        Ok(self.ensure_running(config).await)
    }

    /// Apply a partial update to a stored camera and restart its worker if needed
    pub async fn update_camera(&self, id: &str, update: CameraUpdate) -> Result<CameraConfig> {
        let _guard = self.lifecycle.lock().await;
        let current = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| MonitorError::NotFound(id.to_string()))?;
        let updated = update.apply(&current)?;
        if updated != current {
            self.store.upsert(&updated).await?;
        }
        self.ensure_running(updated.clone()).await;
        Ok(updated)
    }

    /// Stop monitoring `id` and delete its record. Returns whether anything was removed.
    pub async fn remove_camera(&self, id: &str) -> Result<bool> {
        let _guard = self.lifecycle.lock().await;
        let handle = self.workers.lock().remove(id);
        let was_running = handle.is_some();
        match handle {
            Some(handle) => self.stop_workers(vec![handle]).await,
            None => self.ctx.broadcaster.clear(id),
        }

        let existed = self.store.remove(id).await?;
        if existed || was_running {
            info!(camera_id = id, "camera removed");
        } else {
            debug!(camera_id = id, "remove of unknown camera");
        }
        Ok(existed || was_running)
    }

    pub fn camera_status(&self, id: &str) -> CameraStatusReport {
        let state = self
            .workers
            .lock()
            .get(id)
            .filter(|handle| handle.is_running())
            .map(|handle| handle.state());
        let active = state.is_some() && self.ctx.broadcaster.latest(id).is_some();

        CameraStatusReport {
            status: if active {
                CameraStatus::Active
            } else {
                CameraStatus::Inactive
            },
            last_checked: Utc::now(),
            state,
        }
    }

    pub async fn list_cameras(&self) -> Result<Vec<CameraSummary>> {
        let records = self.store.load().await?;
        let workers = self.workers.lock();

        Ok(records
            .into_iter()
            .map(|(id, config)| {
                let handle = workers.get(&id);
                CameraSummary {
                    live: self.ctx.broadcaster.latest(&id).is_some(),
                    worker: handle.map(|h| h.state()),
                    stats: handle.map(|h| h.stats()),
                    id,
                    config,
                }
            })
            .collect())
    }

    /// Ids with a worker, sorted
    pub fn running_cameras(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.workers.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Periodic reconciliation until `shutdown` fires, then stop every worker
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            interval_secs = self.reconcile_interval.as_secs_f64(),
            "Starting camera supervisor..."
        );

        let mut ticker = interval(self.reconcile_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.reconcile_from_store().await {
                        warn!("skipping reconciliation: {}", e);
                    }
                }
                _ = shutdown.recv() => {
                    info!("Camera supervisor shutting down...");
                    break;
                }
            }
        }

        self.shutdown().await;
    }

    /// Stop every worker. Records are left untouched.
    pub async fn shutdown(&self) {
        let _guard = self.lifecycle.lock().await;
        let handles: Vec<WorkerHandle> = self.workers.lock().drain().map(|(_, h)| h).collect();
        let count = handles.len();
        self.stop_workers(handles).await;
        info!("Stopped {} camera workers", count);
    }

    /// Start or restart the worker for `config` so that exactly one matching worker runs
    async fn ensure_running(&self, config: CameraConfig) -> bool {
        let existing = {
            let mut workers = self.workers.lock();
            match workers.get(&config.id) {
                Some(handle)
                    if config.is_active() && handle.config() == &config && handle.is_running() =>
                {
                    debug!(camera_id = %config.id, "camera already running");
                    return false;
                }
                Some(_) => workers.remove(&config.id),
                None => None,
            }
        };

        if let Some(handle) = existing {
            self.stop_workers(vec![handle]).await;
        }
        if !config.is_active() {
            self.ctx.broadcaster.clear(&config.id);
            return false;
        }

        self.start_worker(config);
        true
    }

    fn start_worker(&self, config: CameraConfig) {
        let id = config.id.clone();
        self.ctx.broadcaster.register(&id);
        let handle = CameraWorker::spawn(config, self.ctx.clone());
        self.workers.lock().insert(id.clone(), handle);
        info!(camera_id = %id, "camera worker scheduled");
    }

    async fn stop_workers(&self, handles: Vec<WorkerHandle>) {
        let limit = self.stop_timeout;
        let stops = handles.into_iter().map(|handle| async move {
            let id = handle.config().id.clone();
            let stopped = handle.stop(limit).await;
            (id, stopped)
        });

        for (id, stopped) in join_all(stops).await {
            if !stopped {
                warn!(
                    camera_id = %id,
                    timeout_ms = limit.as_millis() as u64,
                    "camera worker did not stop in time; abandoned"
                );
            }
            self.ctx.broadcaster.clear(&id);
            self.ctx.recorder.forget(&id);
        }
    }
}
