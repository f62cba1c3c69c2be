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

//! Replay workers draining the shared job queue.

use std::{path::PathBuf, sync::Arc};

use detour_common_worker::{IntervalOrNotifyHandle, Notifiable, WorkResult, Worker, WorkerContext};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info};

use crate::{
    replayer::{ReplayOutcome, Replayer},
    watcher::{InFlight, release},
};

/// Receiving end of the job queue, shared by every replay worker.
pub type JobQueue = Arc<Mutex<mpsc::Receiver<PathBuf>>>;

/// One member of the pool. Replays segments one at a time until shutdown.
pub struct ReplayWorker {
    jobs:        JobQueue,
    replayer:    Replayer,
    completions: mpsc::UnboundedSender<PathBuf>,
    in_flight:   InFlight,
    watcher:     IntervalOrNotifyHandle,
}

impl ReplayWorker {
    #[must_use]
    pub fn new(
        jobs: JobQueue,
        replayer: Replayer,
        completions: mpsc::UnboundedSender<PathBuf>,
        in_flight: InFlight,
        watcher: IntervalOrNotifyHandle,
    ) -> Self {
        ReplayWorker {
            jobs,
            replayer,
            completions,
            in_flight,
            watcher,
        }
    }

    async fn next_job(&self, ctx: &WorkerContext) -> Option<PathBuf> {
        tokio::select! {
            () = ctx.cancelled() => None,
            job = async { self.jobs.lock().await.recv().await } => job,
        }
    }
}

#[async_trait::async_trait]
impl Worker for ReplayWorker {
    async fn work(&mut self, ctx: &WorkerContext) -> WorkResult {
        let cancel = ctx.cancellation_token();
        while let Some(segment) = self.next_job(ctx).await {
            debug!(worker = ctx.name(), id = %ctx.id(), segment = %segment.display(), "Replaying segment");
            match self.replayer.replay(&segment, &cancel).await {
                Ok(ReplayOutcome::Completed(_)) => {
                    if self.completions.send(segment).is_err() {
                        return Ok(());
                    }
                    self.watcher.notify();
                }
                Ok(ReplayOutcome::Interrupted(stats)) => {
                    info!(
                        segment = %segment.display(),
                        delivered = stats.delivered,
                        "Replay interrupted by shutdown"
                    );
                    return Ok(());
                }
                Err(e) => {
                    error!(segment = %segment.display(), error = %e, "Replay failed, releasing segment");
                    release(&self.in_flight, &segment);
                }
            }
        }
        Ok(())
    }
}
