// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/ppe-monitor

//! Camera record file (`camera_config.json`)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::camera::CameraConfig;
use crate::error::{MonitorError, Result};

#[derive(Debug, Default, Serialize, Deserialize)]
struct CameraFile {
    #[serde(default)]
    cameras: BTreeMap<String, CameraConfig>,
}

/// Persistent camera records, keyed by id.
///
/// Every mutation is a read-modify-write of the whole file under one async lock, and the
/// new contents replace the old file atomically.
#[derive(Debug)]
pub struct CameraStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl CameraStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records. A missing file is an empty store.
    pub async fn load(&self) -> Result<BTreeMap<String, CameraConfig>> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    pub async fn get(&self, id: &str) -> Result<Option<CameraConfig>> {
        Ok(self.load().await?.remove(id))
    }

    /// Records that should have a running worker
    pub async fn desired(&self) -> Result<Vec<CameraConfig>> {
        Ok(self
            .load()
            .await?
            .into_values()
            .filter(CameraConfig::is_active)
            .collect())
    }

    /// Insert or replace a record
    pub async fn upsert(&self, config: &CameraConfig) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut cameras = self.read().await?;
        cameras.insert(config.id.clone(), config.clone());
        self.write(cameras).await?;
        info!(camera_id = %config.id, "camera record saved");
        Ok(())
    }

    /// Delete a record. Returns whether it existed.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut cameras = self.read().await?;
        if cameras.remove(id).is_none() {
            return Ok(false);
        }
        self.write(cameras).await?;
        info!(camera_id = id, "camera record deleted");
        Ok(true)
    }

    async fn read(&self) -> Result<BTreeMap<String, CameraConfig>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?self.path, "no camera record file yet");
                return Ok(BTreeMap::new());
            }
            Err(e) => return Err(self.error("read", e)),
        };

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let file: CameraFile =
            serde_json::from_str(&content).map_err(|e| self.error("parse", e))?;

        // The id lives in the map key only
        Ok(file
            .cameras
            .into_iter()
            .map(|(id, mut config)| {
                config.id = id.clone();
                (id, config)
            })
            .collect())
    }

    async fn write(&self, cameras: BTreeMap<String, CameraConfig>) -> Result<()> {
        let content = serde_json::to_string_pretty(&CameraFile { cameras })
            .map_err(|e| self.error("encode", e))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.error("create directory", e))?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content)
            .await
            .map_err(|e| self.error("write", e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.error("replace", e))?;
        Ok(())
    }

    fn error(&self, action: &str, err: impl std::fmt::Display) -> MonitorError {
        MonitorError::ConfigStore(format!("{} {}: {}", action, self.path.display(), err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraStatus;

    fn camera(id: &str, status: CameraStatus) -> CameraConfig {
        CameraConfig {
            id: id.to_string(),
            address: "192.168.1.20".to_string(),
            port: 8554,
            monitored_classes: ["no_helmet".to_string()].into_iter().collect(),
            status,
        }
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = CameraStore::new(dir.path().join("camera_config.json"));
        assert!(store.load().await.unwrap().is_empty());
        assert!(!store.remove("cam1").await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_get_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = CameraStore::new(dir.path().join("data").join("camera_config.json"));

        store.upsert(&camera("cam1", CameraStatus::Active)).await.unwrap();
        store.upsert(&camera("cam2", CameraStatus::Inactive)).await.unwrap();

        assert_eq!(
            store.get("cam1").await.unwrap(),
            Some(camera("cam1", CameraStatus::Active))
        );
        let desired = store.desired().await.unwrap();
        assert_eq!(desired.len(), 1);
        assert_eq!(desired[0].id, "cam1");

        assert!(store.remove("cam1").await.unwrap());
        assert!(store.get("cam1").await.unwrap().is_none());
        assert_eq!(store.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camera_config.json");
        let store = CameraStore::new(&path);
        store.upsert(&camera("dock-2", CameraStatus::Active)).await.unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let record = &json["cameras"]["dock-2"];
        assert_eq!(record["ipAddress"], "192.168.1.20");
        assert_eq!(record["port"], 8554);
        assert_eq!(record["monitoredViolations"], serde_json::json!(["no_helmet"]));
        assert_eq!(record["status"], "active");
        assert!(record.get("id").is_none());
    }

    #[tokio::test]
    async fn test_reads_hand_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camera_config.json");
        std::fs::write(
            &path,
            r#"{"cameras": {"gate": {"ipAddress": "/dev/video0", "port": 0, "monitoredViolations": ["no_vest"]}}}"#,
        )
        .unwrap();

        let store = CameraStore::new(&path);
        let gate = store.get("gate").await.unwrap().unwrap();
        assert_eq!(gate.id, "gate");
        assert!(gate.is_local_device());
        assert!(gate.is_active());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camera_config.json");
        std::fs::write(&path, "{not json").unwrap();

        let store = CameraStore::new(&path);
        assert!(matches!(store.load().await, Err(MonitorError::ConfigStore(_))));
    }

    #[tokio::test]
    async fn test_concurrent_upserts_keep_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(CameraStore::new(dir.path().join("camera_config.json")));

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .upsert(&camera(&format!("cam{i}"), CameraStatus::Active))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(store.load().await.unwrap().len(), 8);
    }
}
