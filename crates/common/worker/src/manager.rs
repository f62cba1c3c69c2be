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

use std::{sync::Arc, time::Duration};

use bon::Builder;
use detour_common_runtime::Runtime;
use smart_default::SmartDefault;
use tokio::{sync::Notify, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    builder::{TriggerNotSet, WorkerBuilder},
    context::WorkerContext,
    driver::TriggerDriver,
    err::ErrorSeverity,
    id::WorkerId,
    metrics::{
        WORKER_ACTIVE, WORKER_EXECUTION_DURATION_SECONDS, WORKER_EXECUTION_ERRORS,
        WORKER_HOOK_ERRORS, WORKER_STARTED, WORKER_STOPPED,
    },
    trigger::Trigger,
    worker::Worker,
};

/// Configuration for the worker [`Manager`].
#[derive(Debug, Clone, SmartDefault, Builder)]
pub struct ManagerConfig {
    /// Runtime to spawn workers on. When unset, workers go onto the runtime
    /// of the caller, or the shared background runtime outside of one.
    pub runtime:          Option<Arc<Runtime>>,
    /// How long `shutdown()` waits before aborting the remaining workers.
    #[default(Duration::from_secs(30))]
    #[builder(default = Duration::from_secs(30))]
    pub shutdown_timeout: Duration,
}

/// Outcome of [`Manager::shutdown`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Workers that returned on their own.
    pub stopped: usize,
    /// Workers aborted after the timeout.
    pub aborted: usize,
}

/// Manages the lifecycle of a set of background workers.
///
/// Every worker shares one cancellation token. [`Manager::shutdown`] cancels
/// it, waits up to the configured timeout, then aborts whatever is left.
pub struct Manager {
    cancel_token: CancellationToken,
    config:       ManagerConfig,
    joins:        JoinSet<()>,
}

impl Default for Manager {
    fn default() -> Self { Self::new() }
}

impl Manager {
    #[must_use]
    pub fn new() -> Self { Self::with_config(ManagerConfig::default()) }

    #[must_use]
    pub fn with_config(config: ManagerConfig) -> Self {
        Manager {
            cancel_token: CancellationToken::new(),
            config,
            joins: JoinSet::new(),
        }
    }

    /// Starts configuring a worker. See [`WorkerBuilder`].
    pub const fn worker<W: Worker>(&mut self, worker: W) -> WorkerBuilder<'_, W, TriggerNotSet> {
        WorkerBuilder::new(self, worker)
    }

    /// Token cancelled when the manager shuts down.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken { self.cancel_token.clone() }

    /// Number of spawned workers not yet reaped by `shutdown()`.
    #[must_use]
    pub fn len(&self) -> usize { self.joins.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.joins.is_empty() }

    pub(crate) fn spawn_worker<W: Worker>(
        &mut self,
        worker: W,
        name: &'static str,
        trigger: Trigger,
    ) -> (WorkerId, Arc<Notify>) {
        let id = WorkerId::new();
        let notify = Arc::new(Notify::new());
        let ctx = WorkerContext::new(id, name, self.cancel_token.clone(), Arc::clone(&notify));
        let task = run_worker(worker, ctx, trigger);

        match (&self.config.runtime, tokio::runtime::Handle::try_current()) {
            (Some(runtime), _) => {
                self.joins.spawn_on(task, runtime.handle());
            }
            (None, Ok(handle)) => {
                self.joins.spawn_on(task, &handle);
            }
            (None, Err(_)) => {
                let runtime = detour_common_runtime::background_runtime();
                self.joins.spawn_on(task, runtime.handle());
            }
        }
        (id, notify)
    }

    /// Cancels every worker and waits for them to finish.
    ///
    /// Workers still running when the shutdown timeout elapses are aborted.
    pub async fn shutdown(mut self) -> ShutdownReport {
        info!(workers = self.joins.len(), "Shutting down worker manager");
        self.cancel_token.cancel();

        let mut report = ShutdownReport::default();
        let deadline = tokio::time::sleep(self.config.shutdown_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                joined = self.joins.join_next() => match joined {
                    Some(Ok(())) => report.stopped += 1,
                    Some(Err(e)) if e.is_panic() => {
                        error!(error = %e, "Worker panicked");
                        report.stopped += 1;
                    }
                    Some(Err(_)) => report.aborted += 1,
                    None => break,
                },
                () = &mut deadline => {
                    warn!(
                        timeout = ?self.config.shutdown_timeout,
                        remaining = self.joins.len(),
                        "Shutdown timeout reached, aborting remaining workers"
                    );
                    self.joins.abort_all();
                    while let Some(joined) = self.joins.join_next().await {
                        match joined {
                            Ok(()) => report.stopped += 1,
                            Err(_) => report.aborted += 1,
                        }
                    }
                    break;
                }
            }
        }

        info!(
            stopped = report.stopped,
            aborted = report.aborted,
            "Worker manager shutdown complete"
        );
        report
    }
}

async fn run_worker<W: Worker>(mut worker: W, ctx: WorkerContext, trigger: Trigger) {
    let name = ctx.name();
    let id = ctx.id();
    info!(worker = name, %id, trigger = trigger.label(), "Worker starting");
    WORKER_STARTED.with_label_values(&[name]).inc();
    WORKER_ACTIVE.with_label_values(&[name]).inc();

    match worker.on_start(&ctx).await {
        Ok(()) => run_loop(&mut worker, &ctx, trigger).await,
        Err(e) => {
            error!(worker = name, %id, error = %e, "Worker failed during on_start");
            WORKER_HOOK_ERRORS.with_label_values(&[name, "on_start"]).inc();
        }
    }

    if let Err(e) = worker.on_shutdown(&ctx).await {
        error!(worker = name, %id, error = %e, "Worker failed during on_shutdown");
        WORKER_HOOK_ERRORS.with_label_values(&[name, "on_shutdown"]).inc();
    }

    info!(worker = name, %id, "Worker stopped");
    WORKER_STOPPED.with_label_values(&[name]).inc();
    WORKER_ACTIVE.with_label_values(&[name]).dec();
}

async fn run_loop<W: Worker>(worker: &mut W, ctx: &WorkerContext, trigger: Trigger) {
    let name = ctx.name();
    let mut driver = TriggerDriver::new(trigger);

    while driver.wait_next(ctx).await {
        let timer = WORKER_EXECUTION_DURATION_SECONDS
            .with_label_values(&[name])
            .start_timer();
        let result = worker.work(ctx).await;
        timer.observe_duration();

        if let Err(e) = result {
            match e.severity() {
                ErrorSeverity::Transient => {
                    warn!(worker = name, id = %ctx.id(), error = %e, "Worker execution failed");
                    WORKER_EXECUTION_ERRORS
                        .with_label_values(&[name, "transient"])
                        .inc();
                }
                ErrorSeverity::Fatal => {
                    error!(worker = name, id = %ctx.id(), error = %e, "Worker stopping on fatal error");
                    WORKER_EXECUTION_ERRORS
                        .with_label_values(&[name, "fatal"])
                        .inc();
                    return;
                }
            }
        }
    }
}
