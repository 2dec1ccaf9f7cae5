//! Time-entry persistence
//!
//! Stopped sessions become time entries. The store is append-only; billing
//! and editing live elsewhere.

use std::{
    fs::{self, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::PathBuf,
    sync::Mutex,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::state::CompletedSession;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("time entry store I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("time entry could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("corrupt time entry on line {line}: {source}")]
    Corrupt {
        line: usize,
        source: serde_json::Error,
    },
}

/// Fields of a time entry before the store assigns an id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTimeEntry {
    pub project_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Seconds
    pub pause_duration: u64,
    #[serde(default)]
    pub notes: String,
    pub is_billable: bool,
    pub is_billed: bool,
}

impl NewTimeEntry {
    /// Billable, unbilled entry ending when the session was stopped
    pub fn from_session(session: &CompletedSession) -> Self {
        Self {
            project_id: session.project_id.clone(),
            start_time: session.start_time,
            end_time: session.stopped_at,
            pause_duration: session.pause_duration,
            notes: String::new(),
            is_billable: true,
            is_billed: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeEntry {
    pub id: Uuid,
    #[serde(flatten)]
    pub fields: NewTimeEntry,
    pub created_at: DateTime<Utc>,
}

impl TimeEntry {
    /// Worked seconds: wall time minus pauses
    pub fn duration_seconds(&self) -> u64 {
        let wall = (self.fields.end_time - self.fields.start_time).num_seconds().max(0) as u64;
        wall.saturating_sub(self.fields.pause_duration)
    }
}

/// Where stopped sessions are recorded
pub trait TimeEntryStore: Send + Sync {
    fn create_time_entry(&self, input: NewTimeEntry) -> Result<TimeEntry, StoreError>;

    fn list_time_entries(&self) -> Result<Vec<TimeEntry>, StoreError>;
}

/// One JSON document per line, appended on create
#[derive(Debug)]
pub struct JsonlTimeEntryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlTimeEntryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }
}

impl TimeEntryStore for JsonlTimeEntryStore {
    fn create_time_entry(&self, input: NewTimeEntry) -> Result<TimeEntry, StoreError> {
        let entry = TimeEntry {
            id: Uuid::new_v4(),
            fields: input,
            created_at: Utc::now(),
        };
        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.sync_data()?;

        info!(
            "Saved time entry {} for project {} ({}s paused)",
            entry.id, entry.fields.project_id, entry.fields.pause_duration
        );
        Ok(entry)
    }

    fn list_time_entries(&self) -> Result<Vec<TimeEntry>, StoreError> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No time entries at {}", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str(&line).map_err(|source| StoreError::Corrupt {
                line: index + 1,
                source,
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }
}
