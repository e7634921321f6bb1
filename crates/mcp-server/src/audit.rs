use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One line of the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// RFC 3339, UTC.
    pub timestamp: String,
    pub tool: String,
    pub params: serde_json::Value,
    pub result_count: usize,
}

impl AuditEntry {
    pub fn new(tool: impl Into<String>, params: serde_json::Value, result_count: usize) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            tool: tool.into(),
            params,
            result_count,
        }
    }

    /// Entry for a failed call: `params.error` carries the message, count is zero.
    pub fn failure(tool: impl Into<String>, params: serde_json::Value, message: &str) -> Self {
        let params = match params {
            serde_json::Value::Object(mut map) => {
                map.insert("error".to_string(), message.into());
                serde_json::Value::Object(map)
            }
            serde_json::Value::Null => serde_json::json!({ "error": message }),
            other => serde_json::json!({ "args": other, "error": message }),
        };
        Self::new(tool, params, 0)
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAudit;

impl AuditSink for NoopAudit {
    fn record(&self, _entry: AuditEntry) {}
}

/// Keeps entries in memory; used by tests and embedders that ship entries elsewhere.
#[derive(Debug, Default)]
pub struct MemoryAudit {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAudit {
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for MemoryAudit {
    fn record(&self, entry: AuditEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry);
        }
    }
}

/// Appends one JSON object per line. Write failures are logged, never returned.
#[derive(Debug)]
pub struct JsonlAuditLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlAuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")
    }
}

impl AuditSink for JsonlAuditLog {
    fn record(&self, entry: AuditEntry) {
        let line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(err) => {
                log::error!("Failed to encode audit entry for {}: {err}", entry.tool);
                return;
            }
        };
        let _guard = self.write_lock.lock();
        if let Err(err) = self.append(&line) {
            log::error!("Failed to write audit log {}: {err}", self.path.display());
        }
    }
}
