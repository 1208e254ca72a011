// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/ppe-monitor

//! Violation persistence - image artifact plus log record

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::camera::Frame;
use crate::db::Database;
use crate::error::{MonitorError, Result};

/// A persisted occurrence of a monitored class on a camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub id: String,
    pub camera_id: String,
    pub timestamp: DateTime<Utc>,
    pub image_url: String,
    #[serde(rename = "type")]
    pub violation_class: String,
}

/// Artifact name for a violation. Second resolution; the class is not part of the name.
pub fn artifact_name(camera_id: &str, at: DateTime<Utc>) -> String {
    format!("violation_{}_{}.jpg", camera_id, at.format("%Y%m%d_%H%M%S"))
}

/// Writes violation images and records.
///
/// The image is written before the record, so every record points at an artifact that
/// exists at the moment it is appended.
pub struct ViolationRecorder {
    images_dir: PathBuf,
    url_prefix: String,
    db: Database,
    dedup_window: Duration,
    last_recorded: Mutex<HashMap<(String, String), Instant>>,
}

impl ViolationRecorder {
    /// `dedup_window` of zero records every occurrence
    pub fn new(images_dir: PathBuf, url_prefix: &str, db: Database, dedup_window: Duration) -> Self {
        Self {
            images_dir,
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
            db,
            dedup_window,
            last_recorded: Mutex::new(HashMap::new()),
        }
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Persist one violation of `class` seen in `frame`
    pub async fn record(&self, frame: &Frame, camera_id: &str, class: &str) -> Result<Violation> {
        let jpeg = frame
            .encode_jpeg()
            .await
            .map_err(|e| MonitorError::StorageWriteFailed(format!("encode: {e}")))?;

        let timestamp = Utc::now();
        let filename = artifact_name(camera_id, timestamp);
        let path = self.images_dir.join(&filename);
        self.write_artifact(&path, &jpeg).await?;

        let violation = Violation {
            id: Uuid::new_v4().to_string(),
            camera_id: camera_id.to_string(),
            timestamp,
            image_url: format!("{}/{}", self.url_prefix, filename),
            violation_class: class.to_string(),
        };

        let db = self.db.clone();
        let record = violation.clone();
        tokio::task::spawn_blocking(move || db.append_violation(&record))
            .await
            .map_err(|e| MonitorError::StorageWriteFailed(format!("append task: {e}")))?
            .map_err(|e| MonitorError::StorageWriteFailed(format!("append: {e:#}")))?;

        info!(
            camera_id,
            class,
            id = %violation.id,
            "violation recorded: {}",
            violation.image_url
        );
        Ok(violation)
    }

    /// Like [`record`](Self::record), but skips a (camera, class) pair already recorded
    /// within the dedup window
    pub async fn record_if_due(
        &self,
        frame: &Frame,
        camera_id: &str,
        class: &str,
    ) -> Result<Option<Violation>> {
        if !self.dedup_window.is_zero() {
            let key = (camera_id.to_string(), class.to_string());
            let now = Instant::now();
            let mut last = self.last_recorded.lock();
            match last.get(&key) {
                Some(at) if now.duration_since(*at) < self.dedup_window => {
                    debug!(camera_id, class, "violation suppressed by dedup window");
                    return Ok(None);
                }
                _ => {
                    last.insert(key, now);
                }
            }
        }

        self.record(frame, camera_id, class).await.map(Some)
    }

    /// Forget dedup state for a camera that stopped being monitored
    pub fn forget(&self, camera_id: &str) {
        self.last_recorded
            .lock()
            .retain(|(camera, _), _| camera != camera_id);
    }

    async fn write_artifact(&self, path: &Path, jpeg: &[u8]) -> Result<()> {
        let storage = |e: std::io::Error| {
            MonitorError::StorageWriteFailed(format!("{}: {}", path.display(), e))
        };

        tokio::fs::create_dir_all(&self.images_dir)
            .await
            .map_err(storage)?;

        // Readers of the directory never see a partial image
        let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        if let Err(e) = tokio::fs::write(&tmp, jpeg).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(storage(e));
        }
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(storage(e));
        }
        Ok(())
    }
}
