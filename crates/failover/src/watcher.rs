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

//! Discovery of sealed segments and retirement of replayed ones.

use std::{
    collections::HashSet,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use detour_common_worker::{WorkError, WorkResult, Worker, WorkerContext};
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, info};

use crate::{
    metrics::{SEGMENTS_IN_FLIGHT, SEGMENTS_RETIRED},
    path::{checkpoint_path, scan_segments},
};

/// Segments that are queued or being replayed. A path is in at most one job.
pub type InFlight = Arc<Mutex<HashSet<PathBuf>>>;

pub(crate) fn release(in_flight: &InFlight, segment: &Path) {
    let mut set = in_flight.lock();
    if set.remove(segment) {
        SEGMENTS_IN_FLIGHT.set(i64::try_from(set.len()).unwrap_or(i64::MAX));
    }
}

pub struct Watcher {
    base:        PathBuf,
    in_flight:   InFlight,
    jobs:        mpsc::Sender<PathBuf>,
    completions: mpsc::UnboundedReceiver<PathBuf>,
}

impl Watcher {
    #[must_use]
    pub fn new(
        base: PathBuf,
        in_flight: InFlight,
        jobs: mpsc::Sender<PathBuf>,
        completions: mpsc::UnboundedReceiver<PathBuf>,
    ) -> Self {
        Watcher {
            base,
            in_flight,
            jobs,
            completions,
        }
    }

    async fn retire_completed(&mut self) {
        while let Ok(segment) = self.completions.try_recv() {
            remove_if_exists(&segment).await;
            remove_if_exists(&checkpoint_path(&segment)).await;
            release(&self.in_flight, &segment);
            SEGMENTS_RETIRED.inc();
            info!(segment = %segment.display(), "Retired replayed segment");
        }
    }

    /// Queues every untracked segment. Returns how many were queued.
    fn schedule(&self) -> WorkResult<usize> {
        let segments = scan_segments(&self.base)
            .map_err(|e| WorkError::transient_with_source("segment scan failed", e))?;

        let mut set = self.in_flight.lock();
        let mut queued = 0;
        for segment in segments {
            if set.contains(&segment) {
                continue;
            }
            match self.jobs.try_send(segment.clone()) {
                Ok(()) => {
                    set.insert(segment);
                    queued += 1;
                }
                Err(TrySendError::Full(_)) => {
                    debug!(segment = %segment.display(), "Job queue full, deferring to next scan");
                    break;
                }
                Err(TrySendError::Closed(_)) => {
                    return Err(WorkError::fatal("job queue closed"));
                }
            }
        }
        SEGMENTS_IN_FLIGHT.set(i64::try_from(set.len()).unwrap_or(i64::MAX));
        Ok(queued)
    }
}

async fn remove_if_exists(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => error!(path = %path.display(), error = %e, "Failed to remove file"),
    }
}

#[async_trait::async_trait]
impl Worker for Watcher {
    async fn work(&mut self, ctx: &WorkerContext) -> WorkResult {
        self.retire_completed().await;
        let queued = self.schedule()?;
        if queued > 0 {
            debug!(worker = ctx.name(), queued, "Queued segments for replay");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::segment_path;

    fn watcher(base: &Path, capacity: usize) -> (Watcher, mpsc::Receiver<PathBuf>, mpsc::UnboundedSender<PathBuf>) {
        let (jobs_tx, jobs_rx) = mpsc::channel(capacity);
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let watcher = Watcher::new(base.to_path_buf(), InFlight::default(), jobs_tx, done_rx);
        (watcher, jobs_rx, done_tx)
    }

    #[tokio::test]
    async fn test_schedules_each_segment_once_in_order() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let base = temp_dir.path().join("failover.log");
        std::fs::write(&base, "").unwrap();
        for ts in [300, 100, 200] {
            std::fs::write(segment_path(&base, ts), "x\n").unwrap();
        }
        std::fs::write(checkpoint_path(&segment_path(&base, 100)), "").unwrap();

        let (watcher, mut jobs, _done) = watcher(&base, 10);
        assert_eq!(watcher.schedule().unwrap(), 3);
        assert_eq!(watcher.schedule().unwrap(), 0);

        for ts in [100, 200, 300] {
            assert_eq!(jobs.recv().await.unwrap(), segment_path(&base, ts));
        }
        assert!(jobs.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_queue_leaves_rest_untracked() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let base = temp_dir.path().join("failover.log");
        for ts in 1..=3 {
            std::fs::write(segment_path(&base, ts), "x\n").unwrap();
        }

        let (watcher, mut jobs, _done) = watcher(&base, 1);
        assert_eq!(watcher.schedule().unwrap(), 1);
        assert_eq!(watcher.in_flight.lock().len(), 1);

        assert_eq!(jobs.recv().await.unwrap(), segment_path(&base, 1));
        assert_eq!(watcher.schedule().unwrap(), 1);
        assert_eq!(jobs.recv().await.unwrap(), segment_path(&base, 2));
    }

    #[tokio::test]
    async fn test_completion_deletes_segment_and_checkpoint() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let base = temp_dir.path().join("failover.log");
        let segment = segment_path(&base, 42);
        std::fs::write(&segment, "x\n").unwrap();
        std::fs::write(checkpoint_path(&segment), "x\n").unwrap();

        let (mut watcher, mut jobs, done) = watcher(&base, 4);
        watcher.schedule().unwrap();
        assert_eq!(jobs.recv().await.unwrap(), segment);

        done.send(segment.clone()).unwrap();
        watcher.retire_completed().await;

        assert!(!segment.exists());
        assert!(!checkpoint_path(&segment).exists());
        assert!(watcher.in_flight.lock().is_empty());
    }

    #[tokio::test]
    async fn test_closed_queue_is_fatal() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let base = temp_dir.path().join("failover.log");
        std::fs::write(segment_path(&base, 1), "x\n").unwrap();

        let (watcher, jobs, _done) = watcher(&base, 4);
        drop(jobs);
        let err = watcher.schedule().unwrap_err();
        assert!(err.is_fatal());
    }
}
