// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Append path for failed events.
//!
//! Every append takes an exclusive `flock` on the active log, so concurrent
//! writers in this process, other processes sharing the file and the rotator
//! never interleave partial lines.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use fd_lock::RwLock;
use parking_lot::Mutex;
use serde_json::Value;
use snafu::ResultExt;
use tracing::warn;

use crate::{
    RecordFormat, Result,
    error::{EncodeSnafu, LockFileSnafu, OpenFileSnafu, WriteFileSnafu},
    metrics::RECORDS_APPENDED,
};

/// Cloneable handle appending encoded records to the active log.
#[derive(Clone)]
pub struct FailoverWriter {
    inner: Arc<Inner>,
}

struct Inner {
    path:   PathBuf,
    format: RecordFormat,
    file:   Mutex<RwLock<File>>,
}

impl FailoverWriter {
    /// Opens the active log for appending, creating it and its parent
    /// directory if absent.
    pub fn open(path: impl Into<PathBuf>, format: RecordFormat) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context(OpenFileSnafu { path: parent })?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context(OpenFileSnafu { path: &path })?;

        Ok(FailoverWriter {
            inner: Arc::new(Inner {
                path,
                format,
                file: Mutex::new(RwLock::new(file)),
            }),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path { &self.inner.path }

    #[must_use]
    pub fn format(&self) -> RecordFormat { self.inner.format }

    /// Encodes `payload` and appends it as one line.
    ///
    /// A payload that cannot be encoded is logged and dropped; the error is
    /// returned so the caller knows the event was not stored.
    pub fn append(&self, payload: &Value) -> Result<()> {
        let format = self.inner.format;
        let mut line = format
            .encode(payload)
            .inspect_err(|e| warn!(%format, error = %e, "Dropping event that cannot be encoded"))
            .context(EncodeSnafu { format })?;
        line.push('\n');

        let path = &self.inner.path;
        let mut file = self.inner.file.lock();
        let mut guard = file.write().context(LockFileSnafu { path })?;
        guard
            .write_all(line.as_bytes())
            .context(WriteFileSnafu { path })?;
        drop(guard);

        RECORDS_APPENDED.inc();
        Ok(())
    }
}

impl std::fmt::Debug for FailoverWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverWriter")
            .field("path", &self.inner.path)
            .field("format", &self.inner.format)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_append_writes_one_line_per_event() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("spool").join("failover.log");
        let writer = FailoverWriter::open(&path, RecordFormat::Json).unwrap();

        writer.append(&json!({"n": 1})).unwrap();
        writer.append(&json!({"n": 2})).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(RecordFormat::Json.decode(lines[1]).unwrap(), json!({"n": 2}));
    }

    #[test]
    fn test_concurrent_appends_never_interleave() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("failover.log");
        let writer = FailoverWriter::open(&path, RecordFormat::Json).unwrap();
        // a second, independent open file description on the same path
        let other = FailoverWriter::open(&path, RecordFormat::Json).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let writer = if t % 2 == 0 { writer.clone() } else { other.clone() };
                std::thread::spawn(move || {
                    for i in 0..50 {
                        writer
                            .append(&json!({"thread": t, "i": i, "pad": "x".repeat(512)}))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 400);
        assert!(
            lines
                .iter()
                .all(|line| RecordFormat::Json.decode(line).is_ok())
        );
    }

    #[test]
    fn test_reopen_appends_to_existing_log() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("failover.log");
        FailoverWriter::open(&path, RecordFormat::Json)
            .unwrap()
            .append(&json!({"n": 1}))
            .unwrap();
        FailoverWriter::open(&path, RecordFormat::Json)
            .unwrap()
            .append(&json!({"n": 2}))
            .unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 2);
    }
}
