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

use std::time::Duration;

/// Defines when a worker's `work()` runs.
///
/// | Trigger | Handle |
/// |---------|--------|
/// | `Once` | [`OnceHandle`](crate::OnceHandle) |
/// | `Interval` | [`IntervalHandle`](crate::IntervalHandle) |
/// | `IntervalOrNotify` | [`IntervalOrNotifyHandle`](crate::IntervalOrNotifyHandle) |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Run `work()` a single time, then park until shutdown.
    ///
    /// Long-running loops (a replay worker draining a job channel) use this
    /// and watch the cancellation token themselves.
    Once,

    /// Run at fixed intervals. The first tick fires immediately and missed
    /// ticks are skipped.
    Interval(Duration),

    /// Run at intervals OR as soon as the handle is notified. A notification
    /// resets the timer.
    IntervalOrNotify(Duration),
}

impl Trigger {
    pub(crate) const fn label(&self) -> &'static str {
        match self {
            Trigger::Once => "once",
            Trigger::Interval(_) => "interval",
            Trigger::IntervalOrNotify(_) => "interval_or_notify",
        }
    }
}
