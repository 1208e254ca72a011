// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/ppe-monitor

//! Camera definitions and request validation

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};

/// Whether a camera record should be monitored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraStatus {
    #[default]
    Active,
    Inactive,
}

/// A validated camera definition. Identity is `id`.
///
/// Serialized with the field names used by the camera record file and the dashboard
/// (`ipAddress`, `monitoredViolations`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraConfig {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(rename = "ipAddress")]
    pub address: String,
    pub port: u16,
    #[serde(rename = "monitoredViolations", default)]
    pub monitored_classes: BTreeSet<String>,
    #[serde(default)]
    pub status: CameraStatus,
}

impl CameraConfig {
    pub fn is_active(&self) -> bool {
        self.status == CameraStatus::Active
    }

    pub fn monitors(&self, class: &str) -> bool {
        self.monitored_classes.contains(class)
    }

    /// Local capture device (`/dev/video0`) rather than a network stream
    pub fn is_local_device(&self) -> bool {
        self.address.starts_with("/dev/")
    }

    /// Build the network stream URL from a template with `{address}` and `{port}` slots
    pub fn stream_url(&self, template: &str) -> String {
        template
            .replace("{address}", &self.address)
            .replace("{port}", &self.port.to_string())
    }
}

/// Raw add-camera payload as received from the HTTP layer
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraRequest {
    pub id: String,
    pub ip_address: String,
    pub port: u32,
    #[serde(default)]
    pub monitored_violations: Vec<String>,
}

impl CameraRequest {
    /// Validate once at the boundary. Nothing downstream re-checks these fields.
    pub fn validate(self) -> Result<CameraConfig> {
        let id = validate_id(&self.id)?;
        let address = validate_address(&self.ip_address)?;
        let port = validate_port(self.port)?;
        let monitored_classes = validate_classes(self.monitored_violations)?;

        Ok(CameraConfig {
            id,
            address,
            port,
            monitored_classes,
            status: CameraStatus::Active,
        })
    }
}

/// Partial update payload. Absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraUpdate {
    pub ip_address: Option<String>,
    pub port: Option<u32>,
    pub monitored_violations: Option<Vec<String>>,
    pub status: Option<CameraStatus>,
}

impl CameraUpdate {
    pub fn apply(self, current: &CameraConfig) -> Result<CameraConfig> {
        let mut next = current.clone();
        if let Some(address) = self.ip_address {
            next.address = validate_address(&address)?;
        }
        if let Some(port) = self.port {
            next.port = validate_port(port)?;
        }
        if let Some(classes) = self.monitored_violations {
            next.monitored_classes = validate_classes(classes)?;
        }
        if let Some(status) = self.status {
            next.status = status;
        }
        Ok(next)
    }
}

/// Camera ids end up in artifact filenames, so keep them to a safe alphabet.
pub fn validate_id(id: &str) -> Result<String> {
    let id = id.trim();
    if id.is_empty() {
        return Err(MonitorError::ConfigInvalid("id cannot be empty".into()));
    }
    if id.len() > 64 {
        return Err(MonitorError::ConfigInvalid(
            "id must be at most 64 characters".into(),
        ));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(MonitorError::ConfigInvalid(format!(
            "id {id:?} may only contain letters, digits, '-' and '_'"
        )));
    }
    Ok(id.to_string())
}

fn validate_address(address: &str) -> Result<String> {
    let address = address.trim();
    if address.is_empty() {
        return Err(MonitorError::ConfigInvalid("ipAddress cannot be empty".into()));
    }
    if address.chars().any(char::is_whitespace) {
        return Err(MonitorError::ConfigInvalid(format!(
            "ipAddress {address:?} contains whitespace"
        )));
    }
    Ok(address.to_string())
}

fn validate_port(port: u32) -> Result<u16> {
    match u16::try_from(port) {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(MonitorError::ConfigInvalid(format!(
            "port {port} is out of range 1-65535"
        ))),
    }
}

fn validate_classes(classes: Vec<String>) -> Result<BTreeSet<String>> {
    let mut set = BTreeSet::new();
    for class in classes {
        let class = class.trim();
        if class.is_empty() {
            return Err(MonitorError::ConfigInvalid(
                "monitoredViolations cannot contain empty names".into(),
            ));
        }
        set.insert(class.to_string());
    }
    Ok(set)
}
