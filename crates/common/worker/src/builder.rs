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

//! Type-state builder for spawning workers.
//!
//! A trigger has to be chosen before `spawn()` exists, and the trigger picks
//! the handle type:
//! `TriggerNotSet` -> `TriggerOnce/TriggerInterval/TriggerIntervalOrNotify`
//! -> `spawn()` -> handle.

use std::{marker::PhantomData, time::Duration};

use crate::{
    handle::{IntervalHandle, IntervalOrNotifyHandle, OnceHandle},
    manager::Manager,
    trigger::Trigger,
    worker::Worker,
};

/// Initial builder state.
pub struct TriggerNotSet;
/// Builder configured with [`Trigger::Once`].
pub struct TriggerOnce;
/// Builder configured with [`Trigger::Interval`].
pub struct TriggerInterval;
/// Builder configured with [`Trigger::IntervalOrNotify`].
pub struct TriggerIntervalOrNotify;

const UNNAMED: &str = "unnamed-worker";

/// Builder returned by [`Manager::worker`].
///
/// ```rust,no_run
/// # use detour_common_worker::{Manager, WorkResult, Worker, WorkerContext};
/// # use std::time::Duration;
/// # struct Scan;
/// # #[async_trait::async_trait]
/// # impl Worker for Scan {
/// #     async fn work(&mut self, _ctx: &WorkerContext) -> WorkResult { Ok(()) }
/// # }
/// # let mut manager = Manager::new();
/// let handle = manager
///     .worker(Scan)
///     .name("segment-watcher")
///     .interval_or_notify(Duration::from_secs(3))
///     .spawn();
/// ```
pub struct WorkerBuilder<'m, W, T> {
    manager:  &'m mut Manager,
    worker:   W,
    name:     &'static str,
    trigger:  Option<Trigger>,
    _phantom: PhantomData<T>,
}

impl<'m, W: Worker> WorkerBuilder<'m, W, TriggerNotSet> {
    pub(crate) const fn new(manager: &'m mut Manager, worker: W) -> Self {
        WorkerBuilder {
            manager,
            worker,
            name: UNNAMED,
            trigger: None,
            _phantom: PhantomData,
        }
    }

    /// Sets the name used in log lines and metric labels.
    #[must_use]
    pub const fn name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Runs `work()` once right after `on_start()`.
    pub fn once(self) -> WorkerBuilder<'m, W, TriggerOnce> { self.with_trigger(Trigger::Once) }

    /// Runs `work()` every `period`, starting immediately.
    pub fn interval(self, period: Duration) -> WorkerBuilder<'m, W, TriggerInterval> {
        self.with_trigger(Trigger::Interval(period))
    }

    /// Runs `work()` every `period` and whenever the returned handle is
    /// notified.
    pub fn interval_or_notify(
        self,
        period: Duration,
    ) -> WorkerBuilder<'m, W, TriggerIntervalOrNotify> {
        self.with_trigger(Trigger::IntervalOrNotify(period))
    }

    fn with_trigger<T>(self, trigger: Trigger) -> WorkerBuilder<'m, W, T> {
        WorkerBuilder {
            manager:  self.manager,
            worker:   self.worker,
            name:     self.name,
            trigger:  Some(trigger),
            _phantom: PhantomData,
        }
    }
}

impl<W: Worker> WorkerBuilder<'_, W, TriggerOnce> {
    pub fn spawn(self) -> OnceHandle {
        let (id, _) = self
            .manager
            .spawn_worker(self.worker, self.name, Trigger::Once);
        OnceHandle::new(id, self.name)
    }
}

impl<W: Worker> WorkerBuilder<'_, W, TriggerInterval> {
    pub fn spawn(self) -> IntervalHandle {
        let trigger = self.trigger.unwrap_or(Trigger::Once);
        let (id, _) = self.manager.spawn_worker(self.worker, self.name, trigger);
        IntervalHandle::new(id, self.name)
    }
}

impl<W: Worker> WorkerBuilder<'_, W, TriggerIntervalOrNotify> {
    pub fn spawn(self) -> IntervalOrNotifyHandle {
        let trigger = self.trigger.unwrap_or(Trigger::Once);
        let (id, notify) = self.manager.spawn_worker(self.worker, self.name, trigger);
        IntervalOrNotifyHandle::new(id, self.name, notify)
    }
}
