//! Append-only record stores
//!
//! The pipeline only ever appends; reading back is for the usage report.

use crate::core::error::{AgentError, Result};
use crate::usage::records::{RequestLog, UsageLog};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const REQUEST_LOG_FILE: &str = "request_logs.jsonl";
const USAGE_LOG_FILE: &str = "usage_logs.jsonl";

/// Where the pipeline reports outcomes
///
/// Calls may block; the pipeline makes them from tokio's blocking pool.
pub trait RecordSink: Send + Sync {
    fn append_request(&self, record: &RequestLog) -> Result<()>;
    fn append_usage(&self, record: &UsageLog) -> Result<()>;
}

/// Read side used by the usage report
pub trait UsageSource {
    fn usage_logs(&self) -> Result<Vec<UsageLog>>;
}

/// Sink that drops everything
pub struct NullSink;

impl RecordSink for NullSink {
    fn append_request(&self, _record: &RequestLog) -> Result<()> {
        Ok(())
    }

    fn append_usage(&self, _record: &UsageLog) -> Result<()> {
        Ok(())
    }
}

/// In-process store, mostly for tests and one-shot runs
#[derive(Default)]
pub struct MemoryStore {
    requests: Mutex<Vec<RequestLog>>,
    usage: Mutex<Vec<UsageLog>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<RequestLog> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn usage(&self) -> Vec<UsageLog> {
        self.usage.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

impl RecordSink for MemoryStore {
    fn append_request(&self, record: &RequestLog) -> Result<()> {
        self.requests
            .lock()
            .map_err(|_| AgentError::Storage("request log poisoned".into()))?
            .push(record.clone());
        Ok(())
    }

    fn append_usage(&self, record: &UsageLog) -> Result<()> {
        self.usage
            .lock()
            .map_err(|_| AgentError::Storage("usage log poisoned".into()))?
            .push(record.clone());
        Ok(())
    }
}

impl UsageSource for MemoryStore {
    fn usage_logs(&self) -> Result<Vec<UsageLog>> {
        Ok(self.usage())
    }
}

/// One JSON document per line, one file per record kind
pub struct JsonlStore {
    dir: PathBuf,
    // Serializes appends from concurrent requests
    write_lock: Mutex<()>,
}

impl JsonlStore {
    /// Open (creating if needed) a store rooted at `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn request_logs(&self) -> Result<Vec<RequestLog>> {
        read_lines(&self.dir.join(REQUEST_LOG_FILE))
    }

    fn append<T: Serialize>(&self, file: &str, record: &T) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| AgentError::Storage("store lock poisoned".into()))?;
        let mut handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(file))?;
        handle.write_all(line.as_bytes())?;
        Ok(())
    }
}

impl RecordSink for JsonlStore {
    fn append_request(&self, record: &RequestLog) -> Result<()> {
        self.append(REQUEST_LOG_FILE, record)
    }

    fn append_usage(&self, record: &UsageLog) -> Result<()> {
        self.append(USAGE_LOG_FILE, record)
    }
}

impl UsageSource for JsonlStore {
    fn usage_logs(&self) -> Result<Vec<UsageLog>> {
        read_lines(&self.dir.join(USAGE_LOG_FILE))
    }
}

/// Missing file reads as empty; a corrupt line is skipped with a warning
fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(fs::File::open(path)?);
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(
                path = %path.display(),
                line = idx + 1,
                error = %e,
                "skipping unreadable record"
            ),
        }
    }
    Ok(records)
}
