// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/ppe-monitor

//! PPE Monitor - camera supervision and safety-violation detection
//!
//! Watches a dynamic set of cameras, forwards their frames to an object
//! classification service and keeps evidence of every monitored violation:
//! - One capture worker per camera with automatic reconnect and backoff
//! - Live MJPEG feed of every camera from a shared latest-frame slot
//! - Evidence images plus an append-only violation log (SQLite)
//! - Camera set reconciled from a JSON record file, editable over HTTP
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      PPE Monitor Engine                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   reconcile   ┌──────────────────────────┐  │
//! │  │ Camera     │──────────────▶│ Supervisor               │  │
//! │  │ Store      │               │  start / stop workers    │  │
//! │  └────────────┘               └──────────────────────────┘  │
//! │                                   ↓ one per camera          │
//! │  ┌────────────┐  frames  ┌──────────────┐  detections       │
//! │  │ Frame      │─────────▶│ Camera       │──────────┐        │
//! │  │ Source     │          │ Worker       │          ↓        │
//! │  └────────────┘          └──────────────┘   ┌────────────┐  │
//! │                                ↓ latest     │ Violation  │  │
//! │                          ┌──────────────┐   │ Recorder   │  │
//! │                          │ Frame        │   └────────────┘  │
//! │                          │ Broadcaster  │      ↓      ↓     │
//! │                          └──────────────┘   images  SQLite  │
//! │                                ↓ MJPEG                      │
//! │                          ┌──────────────┐                   │
//! │                          │  HTTP (axum) │                   │
//! │                          └──────────────┘                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod camera;
pub mod config;
pub mod core;
pub mod db;
pub mod detection;
pub mod error;
pub mod streaming;
pub mod supervisor;
pub mod web;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use camera::{CameraConfig, CameraWorker, Frame, FrameSource, WorkerState};
pub use config::{CameraStore, Config};
pub use crate::core::Engine;
pub use db::Database;
pub use detection::{Classifier, Violation, ViolationRecorder};
pub use error::{MonitorError, Result};
pub use streaming::FrameBroadcaster;
pub use supervisor::Supervisor;

/// PPE Monitor version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// PPE Monitor name
pub const NAME: &str = "PPE Monitor";
