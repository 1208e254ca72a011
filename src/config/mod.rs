// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/ppe-monitor

//! Configuration module

pub mod store;

pub use store::CameraStore;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::camera::{BackoffPolicy, WorkerSettings};
use crate::detection::ClassifyParams;

/// Environment variable holding the classifier API key
pub const API_KEY_ENV: &str = "ROBOFLOW_API_KEY";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory; relative paths below are resolved against it
    pub data_dir: PathBuf,

    /// Log level
    pub log_level: String,

    /// Use synthetic cameras and a simulated classifier
    pub demo_mode: bool,

    /// HTTP server configuration
    pub server: ServerConfig,

    /// Camera supervision configuration
    pub cameras: CamerasConfig,

    /// Classification service configuration
    pub classifier: ClassifierConfig,

    /// Violation storage configuration
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            log_level: "info".to_string(),
            demo_mode: false,
            server: ServerConfig::default(),
            cameras: CamerasConfig::default(),
            classifier: ClassifierConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.apply_env();
        config.validate()?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            // Create parent directories
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;

            let mut config = config;
            config.apply_env();
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("ppe-monitor"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Pick up secrets from the environment. The key is never written back to disk by
    /// `load_or_create`.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.classifier.api_key = Some(key.trim().to_string());
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.cameras.frame_interval_ms == 0 {
            return Err(anyhow!("cameras.frame_interval_ms must be positive"));
        }
        if self.cameras.stop_timeout_secs == 0 {
            return Err(anyhow!("cameras.stop_timeout_secs must be positive"));
        }
        if self.cameras.reconcile_interval_secs == 0 {
            return Err(anyhow!("cameras.reconcile_interval_secs must be positive"));
        }
        if self.classifier.confidence > 100 || self.classifier.overlap > 100 {
            return Err(anyhow!("classifier confidence and overlap are percentages"));
        }
        if !self.cameras.url_template.contains("{address}") {
            return Err(anyhow!("cameras.url_template must contain {{address}}"));
        }
        Ok(())
    }

    /// Resolve a configured path against the data directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn camera_store_path(&self) -> PathBuf {
        self.resolve(&self.cameras.config_path)
    }

    pub fn violations_dir(&self) -> PathBuf {
        self.resolve(&self.storage.violations_dir)
    }

    pub fn database_path(&self) -> PathBuf {
        self.resolve(&self.storage.database_path)
    }

    /// Loop settings handed to every camera worker
    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            backoff: self.cameras.backoff,
            frame_interval: Duration::from_millis(self.cameras.frame_interval_ms),
            classify: ClassifyParams {
                confidence: self.classifier.confidence,
                overlap: self.classifier.overlap,
            },
            classify_timeout: Duration::from_secs(self.classifier.timeout_secs),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub bind_addr: String,

    /// Allow requests from any origin
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            cors_permissive: true,
        }
    }
}

/// Camera supervision configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CamerasConfig {
    /// Camera record file
    pub config_path: PathBuf,

    /// Seconds between reconciliation ticks
    pub reconcile_interval_secs: u64,

    /// How long to wait for a worker to stop before abandoning it
    pub stop_timeout_secs: u64,

    /// Minimum milliseconds between reads (33 ≈ 30 fps)
    pub frame_interval_ms: u64,

    /// Time allowed for a new connection to deliver its first frame
    pub open_timeout_secs: u64,

    /// Time allowed for a single read on an open connection
    pub read_timeout_secs: u64,

    /// ffmpeg executable
    pub ffmpeg_path: String,

    /// Network stream URL, with `{address}` and `{port}` placeholders
    pub url_template: String,

    /// Delay between connection attempts
    pub backoff: BackoffPolicy,
}

impl Default for CamerasConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from("camera_config.json"),
            reconcile_interval_secs: 5,
            stop_timeout_secs: 5,
            frame_interval_ms: 33,
            open_timeout_secs: 10,
            read_timeout_secs: 5,
            ffmpeg_path: "ffmpeg".to_string(),
            url_template: "rtsp://{address}:{port}/stream".to_string(),
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Classification service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Hosted inference base URL
    pub endpoint: String,

    /// Model project name
    pub project: String,

    /// Model version
    pub version: u32,

    /// API key. Usually supplied through `ROBOFLOW_API_KEY` instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Minimum confidence, percent
    pub confidence: u8,

    /// Maximum box overlap, percent
    pub overlap: u8,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://detect.roboflow.com".to_string(),
            project: "ppe-detection".to_string(),
            version: 1,
            api_key: None,
            confidence: 40,
            overlap: 30,
            timeout_secs: 10,
        }
    }
}

/// Violation storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for evidence images
    pub violations_dir: PathBuf,

    /// URL prefix the images are served under
    pub url_prefix: String,

    /// Violation log database
    pub database_path: PathBuf,

    /// Record a (camera, class) pair at most once per window; 0 records every frame
    pub dedup_window_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            violations_dir: PathBuf::from("public/violations"),
            url_prefix: "/violations".to_string(),
            database_path: PathBuf::from("violations.db"),
            dedup_window_secs: 0,
        }
    }
}
