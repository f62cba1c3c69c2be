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

//! Seals the active log into immutable segments.
//!
//! Rotation copies the whole active log into `{base}.{unix_seconds}` and
//! truncates it, all while holding the same exclusive `flock` writers take,
//! so every appended line ends up in exactly one of the new segment or the
//! emptied active log.

use std::{
    fs::{File, OpenOptions},
    io::{self, ErrorKind, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use detour_common_worker::{WorkError, WorkResult, Worker, WorkerContext};
use fd_lock::RwLock;
use jiff::Timestamp;
use parking_lot::Mutex;
use snafu::ResultExt;
use tracing::{debug, error, info, warn};

use crate::{
    Result,
    error::{JoinSnafu, LockFileSnafu, OpenFileSnafu, ReadFileSnafu, WriteFileSnafu},
    metrics::{BYTES_ROTATED, SEGMENTS_ROTATED},
    path::{partial_path, segment_path},
};

/// Result of one rotation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationOutcome {
    /// The active log was sealed into `segment`.
    Rotated { segment: PathBuf, bytes: u64 },
    /// The active log was not larger than the threshold.
    Skipped { size: u64 },
    /// A segment for the current second already exists. The next tick will
    /// try again under a fresh name.
    NameTaken { segment: PathBuf },
}

/// Rotates one active log. Clones share the in-process rotation lock so the
/// size and idle triggers never rotate at the same time.
#[derive(Debug, Clone)]
pub struct Rotator {
    base:  PathBuf,
    guard: Arc<Mutex<()>>,
}

impl Rotator {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Rotator {
            base:  base.into(),
            guard: Arc::new(Mutex::new(())),
        }
    }

    #[must_use]
    pub fn base(&self) -> &Path { &self.base }

    /// Seals the active log if it holds more than `threshold` bytes.
    ///
    /// Blocking: run it off the async workers.
    pub fn rotate_if_larger(&self, threshold: u64) -> Result<RotationOutcome> {
        let _serial = self.guard.lock();
        let base = &self.base;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(base)
            .context(OpenFileSnafu { path: base })?;
        let mut lock = RwLock::new(file);
        let mut active = lock.write().context(LockFileSnafu { path: base })?;

        let size = active
            .metadata()
            .context(ReadFileSnafu { path: base })?
            .len();
        if size == 0 || size <= threshold {
            return Ok(RotationOutcome::Skipped { size });
        }

        let segment = segment_path(base, Timestamp::now().as_second());
        if segment
            .try_exists()
            .context(ReadFileSnafu { path: &segment })?
        {
            return Ok(RotationOutcome::NameTaken { segment });
        }

        // Copy under a name the watcher ignores, then publish atomically.
        let partial = partial_path(&segment);
        let bytes = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&partial)
            .and_then(|mut sealed| copy_all(&mut *active, &mut sealed))
            .and_then(|bytes| std::fs::rename(&partial, &segment).map(|()| bytes));
        let bytes = match bytes {
            Ok(bytes) => bytes,
            Err(e) => {
                if let Err(rm) = std::fs::remove_file(&partial)
                    && rm.kind() != ErrorKind::NotFound
                {
                    error!(path = %partial.display(), error = %rm, "Failed to remove partial segment");
                }
                return Err(e).context(WriteFileSnafu { path: segment });
            }
        };

        truncate_active(&active, base, &segment)?;
        drop(active);

        SEGMENTS_ROTATED.inc();
        BYTES_ROTATED.inc_by(bytes);
        Ok(RotationOutcome::Rotated { segment, bytes })
    }
}

/// Empties the active log once its lines are published as `segment`. On
/// failure the same lines stay in the active log and go out again with the
/// next rotation.
fn truncate_active(active: &File, base: &Path, segment: &Path) -> Result<()> {
    active
        .set_len(0)
        .inspect_err(|e| {
            error!(
                active_log = %base.display(),
                segment = %segment.display(),
                error = %e,
                "Truncating the published active log failed, its records will be replayed twice"
            );
        })
        .context(WriteFileSnafu { path: base })
}

fn copy_all(from: &mut File, to: &mut File) -> io::Result<u64> {
    from.seek(SeekFrom::Start(0))?;
    let bytes = io::copy(from, to)?;
    to.flush()?;
    to.sync_all()?;
    Ok(bytes)
}

/// When a [`RotationWorker`] rotates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPolicy {
    /// Rotate once the active log grows past this many bytes.
    Size(u64),
    /// Rotate whenever the active log holds anything.
    Idle,
}

impl RotationPolicy {
    const fn threshold(self) -> u64 {
        match self {
            RotationPolicy::Size(max) => max,
            RotationPolicy::Idle => 0,
        }
    }
}

/// Interval worker running one rotation trigger.
pub struct RotationWorker {
    rotator: Rotator,
    policy:  RotationPolicy,
}

impl RotationWorker {
    #[must_use]
    pub const fn new(rotator: Rotator, policy: RotationPolicy) -> Self {
        RotationWorker { rotator, policy }
    }
}

#[async_trait::async_trait]
impl Worker for RotationWorker {
    async fn work(&mut self, ctx: &WorkerContext) -> WorkResult {
        let rotator = self.rotator.clone();
        let threshold = self.policy.threshold();
        let outcome = detour_common_runtime::spawn_blocking_file_io(move || {
            rotator.rotate_if_larger(threshold)
        })
        .await
        .context(JoinSnafu)
        .and_then(|r| r)
        .map_err(|e| WorkError::transient_with_source("rotation failed", e))?;

        match outcome {
            RotationOutcome::Rotated { segment, bytes } => {
                info!(
                    worker = ctx.name(),
                    policy = ?self.policy,
                    segment = %segment.display(),
                    bytes,
                    "Rotated active log"
                );
            }
            RotationOutcome::NameTaken { segment } => {
                warn!(segment = %segment.display(), "Segment name taken, rotating on next tick");
            }
            RotationOutcome::Skipped { size } => {
                debug!(worker = ctx.name(), size, "Nothing to rotate");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Error, path::scan_segments};

    fn write_lines(path: &Path, lines: &[&str]) {
        let mut file = OpenOptions::new().create(true).append(true).open(path).unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
    }

    #[test]
    fn test_rotation_moves_every_line_into_segment() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let base = temp_dir.path().join("failover.log");
        write_lines(&base, &["a", "b", "c"]);

        let outcome = Rotator::new(&base).rotate_if_larger(0).unwrap();
        let RotationOutcome::Rotated { segment, bytes } = outcome else {
            panic!("expected a rotation, got {outcome:?}");
        };

        assert_eq!(bytes, 6);
        assert_eq!(std::fs::read_to_string(&segment).unwrap(), "a\nb\nc\n");
        assert_eq!(std::fs::metadata(&base).unwrap().len(), 0);
        assert!(!partial_path(&segment).exists());
        assert_eq!(scan_segments(&base).unwrap(), vec![segment]);
    }

    #[test]
    fn test_threshold_and_empty_log_skip() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let base = temp_dir.path().join("failover.log");
        std::fs::File::create(&base).unwrap();
        let rotator = Rotator::new(&base);

        assert_eq!(
            rotator.rotate_if_larger(0).unwrap(),
            RotationOutcome::Skipped { size: 0 }
        );

        write_lines(&base, &["abc"]);
        assert_eq!(
            rotator.rotate_if_larger(4).unwrap(),
            RotationOutcome::Skipped { size: 4 }
        );
        assert!(matches!(
            rotator.rotate_if_larger(3).unwrap(),
            RotationOutcome::Rotated { bytes: 4, .. }
        ));
    }

    #[test]
    fn test_existing_segment_name_is_never_overwritten() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let base = temp_dir.path().join("failover.log");
        let rotator = Rotator::new(&base);

        write_lines(&base, &["first"]);
        let RotationOutcome::Rotated { segment, .. } = rotator.rotate_if_larger(0).unwrap() else {
            panic!("first rotation must succeed");
        };

        write_lines(&base, &["second"]);
        match rotator.rotate_if_larger(0).unwrap() {
            RotationOutcome::NameTaken { segment: taken } => {
                // same second: the sealed segment stays intact
                assert_eq!(taken, segment);
                assert_eq!(std::fs::read_to_string(&base).unwrap(), "second\n");
            }
            RotationOutcome::Rotated { segment: next, .. } => assert_ne!(next, segment),
            RotationOutcome::Skipped { .. } => panic!("log was not empty"),
        }
        assert_eq!(std::fs::read_to_string(&segment).unwrap(), "first\n");
    }

    #[test]
    fn test_missing_active_log_is_an_error() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let rotator = Rotator::new(temp_dir.path().join("absent.log"));
        assert!(rotator.rotate_if_larger(0).is_err());
    }

    #[test]
    fn test_truncate_failure_is_reported() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let base = temp_dir.path().join("failover.log");
        write_lines(&base, &["a"]);
        let read_only = File::open(&base).unwrap();

        let err = truncate_active(&read_only, &base, &segment_path(&base, 1)).unwrap_err();
        assert!(matches!(err, Error::WriteFile { .. }), "{err}");
        assert_eq!(std::fs::read_to_string(&base).unwrap(), "a\n");
    }
}
