//! JSONL file writer for session audit records.
//!
//! Each [`AuditRecord`] is serialized as a single JSON line with a
//! `timestamp` field added, appended to the file via a buffered writer. The
//! journal is append-only; [`JsonlAuditLog::load`] reads one session's
//! ordered history back for resume or reporting.

use reconfig_application::ports::audit_sink::AuditSink;
use reconfig_domain::{AuditRecord, SessionId};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// JSONL audit log that writes one record per line.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushes per record and on
/// `Drop`, so an interrupted process keeps every transition it reached.
pub struct JsonlAuditLog {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlAuditLog {
    /// Open the journal for appending, creating the file (and parent
    /// directories) if they don't exist. Returns `None` if the file cannot
    /// be opened.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!("Could not create audit log directory {}: {}", parent.display(), e);
            return None;
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not open audit log file {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    /// Get the path to the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read one session's ordered phase history back from a journal file.
    pub fn load(path: impl AsRef<Path>, session_id: &SessionId) -> std::io::Result<Vec<AuditRecord>> {
        let reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditRecord>(&line) {
                Ok(record) if record.session_id == *session_id => records.push(record),
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable audit line: {}", e),
            }
        }
        Ok(records)
    }
}

impl AuditSink for JsonlAuditLog {
    fn record(&self, record: &AuditRecord) {
        let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

        // Build the line: the record's fields plus a timestamp
        let mut value = match serde_json::to_value(record) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => return,
        };
        value.insert(
            "timestamp".to_string(),
            serde_json::Value::String(timestamp),
        );

        let Ok(line) = serde_json::to_string(&value) else {
            return;
        };

        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
            // Flush per record for crash safety; the journal is append-only
            let _ = writer.flush();
        }
    }
}

impl Drop for JsonlAuditLog {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}
