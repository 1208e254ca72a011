//! Main monitoring engine - builds and owns every component

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::camera::{FfmpegSource, FrameSource, SyntheticSource, WorkerContext};
use crate::config::{CameraStore, Config, API_KEY_ENV};
use crate::db::Database;
use crate::detection::{
    Classifier, DisabledClassifier, RoboflowClassifier, SimulatedClassifier, ViolationRecorder,
};
use crate::streaming::FrameBroadcaster;
use crate::supervisor::Supervisor;
use crate::web::{build_router, AppState};

/// Main PPE monitor engine
pub struct Engine {
    pub config: Arc<Config>,
    supervisor: Arc<Supervisor>,
    shutdown_tx: broadcast::Sender<()>,
    supervisor_task: Option<JoinHandle<()>>,
}

impl Engine {
    pub async fn new(config: Config) -> Result<Self> {
        let config = Arc::new(config);

        let db = Database::open(&config.database_path())?;
        let recorder = Arc::new(ViolationRecorder::new(
            config.violations_dir(),
            &config.storage.url_prefix,
            db,
            Duration::from_secs(config.storage.dedup_window_secs),
        ));

        let ctx = WorkerContext {
            source: build_source(&config),
            classifier: build_classifier(&config)?,
            recorder,
            broadcaster: Arc::new(FrameBroadcaster::new()),
            settings: config.worker_settings(),
        };
        info!(
            source = ctx.source.name(),
            classifier = ctx.classifier.name(),
            "Pipeline configured"
        );

        let store = Arc::new(CameraStore::new(config.camera_store_path()));
        let supervisor = Arc::new(Supervisor::new(
            store,
            ctx,
            Duration::from_secs(config.cameras.stop_timeout_secs),
            Duration::from_secs(config.cameras.reconcile_interval_secs),
        ));

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            supervisor,
            shutdown_tx,
            supervisor_task: None,
        })
    }

    /// Start monitoring every active camera record and keep reconciling in the background
    pub async fn start(&mut self) -> Result<()> {
        info!("Starting PPE monitor engine...");

        tokio::fs::create_dir_all(self.config.violations_dir())
            .await
            .with_context(|| format!("creating {:?}", self.config.violations_dir()))?;

        match self.supervisor.reconcile_from_store().await {
            Ok(report) => info!("Monitoring {} cameras", report.started.len()),
            Err(e) => warn!("Camera records unreadable, starting with none: {}", e),
        }

        let supervisor = self.supervisor.clone();
        let shutdown = self.shutdown_tx.subscribe();
        self.supervisor_task = Some(tokio::spawn(async move {
            supervisor.run(shutdown).await;
        }));

        info!("PPE monitor engine started");
        Ok(())
    }

    /// Stop every worker and the reconciliation loop
    pub async fn stop(&mut self) -> Result<()> {
        info!("Stopping PPE monitor engine...");

        match self.supervisor_task.take() {
            Some(task) => {
                let _ = self.shutdown_tx.send(());
                task.await.context("supervisor task failed")?;
            }
            None => self.supervisor.shutdown().await,
        }

        info!("PPE monitor engine stopped");
        Ok(())
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    /// HTTP interface bound to this engine
    pub fn router(&self) -> Router {
        let state = Arc::new(AppState::new(self.supervisor.clone()));
        build_router(
            state,
            &self.config.storage.url_prefix,
            self.config.server.cors_permissive,
        )
    }
}

fn build_source(config: &Config) -> Arc<dyn FrameSource> {
    if config.demo_mode {
        return Arc::new(SyntheticSource::default());
    }
    Arc::new(FfmpegSource::new(
        config.cameras.ffmpeg_path.clone(),
        config.cameras.url_template.clone(),
        Duration::from_secs(config.cameras.open_timeout_secs),
        Duration::from_secs(config.cameras.read_timeout_secs),
    ))
}

fn build_classifier(config: &Config) -> Result<Arc<dyn Classifier>> {
    if config.demo_mode {
        return Ok(Arc::new(SimulatedClassifier::default()));
    }

    let classifier = &config.classifier;
    match classifier.api_key.as_deref() {
        Some(key) if !key.is_empty() => {
            let client = RoboflowClassifier::new(
                &classifier.endpoint,
                &classifier.project,
                classifier.version,
                key,
                Duration::from_secs(classifier.timeout_secs),
            )?;
            Ok(Arc::new(client))
        }
        _ => {
            warn!("{} not set; violation detection is disabled", API_KEY_ENV);
            Ok(Arc::new(DisabledClassifier::default()))
        }
    }
}
