// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/ppe-monitor

//! Database module - append-only violation log

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::detection::Violation;

/// Violation log. Rows are only ever inserted.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database {path:?}"))?;

        // WAL keeps readers of the log from blocking the writers
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
        "#,
        )?;

        let db = Self::from_connection(conn)?;
        info!("Database opened at {:?}", path);
        Ok(db)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.create_tables()?;
        Ok(db)
    }

    fn create_tables(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS violations (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                camera_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                image_url TEXT NOT NULL,
                violation_class TEXT NOT NULL,
                created_at TEXT DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_violations_camera ON violations(camera_id);
            CREATE INDEX IF NOT EXISTS idx_violations_timestamp ON violations(timestamp);
        "#,
        )?;

        Ok(())
    }

    /// Append a violation. Each insert is its own transaction.
    pub fn append_violation(&self, violation: &Violation) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "INSERT INTO violations (id, camera_id, timestamp, image_url, violation_class) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                violation.id,
                violation.camera_id,
                violation.timestamp.to_rfc3339(),
                violation.image_url,
                violation.violation_class,
            ],
        )?;

        Ok(())
    }

    /// Most recent first
    pub fn list_violations(&self, camera_id: Option<&str>, limit: usize) -> Result<Vec<Violation>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT id, camera_id, timestamp, image_url, violation_class FROM violations
             WHERE (?1 IS NULL OR camera_id = ?1)
             ORDER BY seq DESC LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![camera_id, limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (id, camera_id, timestamp, image_url, violation_class) = row?;
            let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                .with_context(|| format!("bad timestamp on violation {id}"))?
                .with_timezone(&Utc);
            results.push(Violation {
                id,
                camera_id,
                timestamp,
                image_url,
                violation_class,
            });
        }

        Ok(results)
    }

    pub fn count_violations(&self, camera_id: Option<&str>) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM violations WHERE (?1 IS NULL OR camera_id = ?1)",
            params![camera_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}
