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

use std::{
    fs::{File, OpenOptions},
    io::ErrorKind,
    sync::Arc,
};

use detour_common_worker::{Manager, ManagerConfig, ShutdownReport};
use serde_json::Value;
use snafu::{ResultExt, ensure};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tracing::info;

use crate::{
    FailoverConfig, FailoverWriter, Replayer, Result, Rotator,
    error::{AlreadyRunningSnafu, AlreadyStartedSnafu, LockFileSnafu, OpenFileSnafu},
    path::lock_path,
    pool::ReplayWorker,
    rotator::{RotationPolicy, RotationWorker},
    sender::Sender,
    watcher::{InFlight, Watcher},
};

struct Running {
    manager: Manager,
    // Held until stop; dropping it closes the fd and releases the flock.
    _lock:   fd_lock::RwLock<File>,
}

/// A failover queue: the active log plus, once started, the rotation,
/// discovery and replay workers behind it.
///
/// Producers may enqueue before [`Failover::start`] and after
/// [`Failover::stop`]; appended records wait on disk until a running instance
/// replays them.
pub struct Failover {
    config:  FailoverConfig,
    writer:  FailoverWriter,
    sender:  Arc<dyn Sender>,
    running: Option<Running>,
}

impl Failover {
    /// Opens or creates the active log.
    pub fn open(config: FailoverConfig, sender: Arc<dyn Sender>) -> Result<Self> {
        let writer = FailoverWriter::open(&config.active_log, config.record_format)?;
        Ok(Failover {
            config,
            writer,
            sender,
            running: None,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &FailoverConfig { &self.config }

    /// A cloneable handle for producers.
    #[must_use]
    pub const fn writer(&self) -> &FailoverWriter { &self.writer }

    #[must_use]
    pub const fn is_running(&self) -> bool { self.running.is_some() }

    /// Durably records an event that could not be forwarded.
    pub fn enqueue_failed_event(&self, payload: &Value) -> Result<()> { self.writer.append(payload) }

    /// Takes the replay lock and launches the background workers.
    ///
    /// Fails with [`Error::AlreadyRunning`](crate::Error::AlreadyRunning) when
    /// another instance replays the same active log.
    pub fn start(&mut self) -> Result<()> {
        ensure!(self.running.is_none(), AlreadyStartedSnafu);

        let lock = self.acquire_replay_lock()?;
        let config = &self.config;
        let base = config.active_log.clone();

        let mut manager = Manager::with_config(ManagerConfig {
            shutdown_timeout: config.shutdown_timeout,
            ..ManagerConfig::default()
        });

        let in_flight = InFlight::default();
        let (jobs_tx, jobs_rx) = mpsc::channel(config.job_queue_capacity.max(1));
        let (done_tx, done_rx) = mpsc::unbounded_channel();

        let watcher = manager
            .worker(Watcher::new(base.clone(), Arc::clone(&in_flight), jobs_tx, done_rx))
            .name("segment-watcher")
            .interval_or_notify(config.watch_interval)
            .spawn();

        let jobs = Arc::new(AsyncMutex::new(jobs_rx));
        let replayer = Replayer::new(
            Arc::clone(&self.sender),
            config.record_format,
            config.retry_delay,
        );
        for _ in 0..config.workers.max(1) {
            manager
                .worker(ReplayWorker::new(
                    Arc::clone(&jobs),
                    replayer.clone(),
                    done_tx.clone(),
                    Arc::clone(&in_flight),
                    watcher.clone(),
                ))
                .name("replay-worker")
                .once()
                .spawn();
        }

        let rotator = Rotator::new(base.clone());
        manager
            .worker(RotationWorker::new(
                rotator.clone(),
                RotationPolicy::Size(config.max_bytes.as_bytes()),
            ))
            .name("rotate-size")
            .interval(config.size_check_interval)
            .spawn();
        manager
            .worker(RotationWorker::new(rotator, RotationPolicy::Idle))
            .name("rotate-idle")
            .interval(config.idle_check_interval)
            .spawn();

        info!(
            active_log = %base.display(),
            workers = config.workers,
            max_bytes = %config.max_bytes,
            format = %config.record_format,
            "Failover started"
        );
        self.running = Some(Running {
            manager,
            _lock: lock,
        });
        Ok(())
    }

    fn acquire_replay_lock(&self) -> Result<fd_lock::RwLock<File>> {
        let path = lock_path(&self.config.active_log);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .context(OpenFileSnafu { path: &path })?;
        let mut lock = fd_lock::RwLock::new(file);
        match lock.try_write() {
            Ok(guard) => {
                // The flock lives as long as the descriptor inside `lock`.
                std::mem::forget(guard);
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                return AlreadyRunningSnafu { path }.fail();
            }
            Err(e) => return Err(e).context(LockFileSnafu { path }),
        }
        Ok(lock)
    }

    /// Signals shutdown and waits for the workers, bounded by the configured
    /// shutdown timeout. Returns `None` if the queue was not running.
    pub async fn stop(&mut self) -> Option<ShutdownReport> {
        let running = self.running.take()?;
        let report = running.manager.shutdown().await;
        info!(
            stopped = report.stopped,
            aborted = report.aborted,
            "Failover stopped"
        );
        Some(report)
    }
}
