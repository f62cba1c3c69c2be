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

use std::sync::Arc;

use tokio::sync::Notify;

use crate::id::WorkerId;

/// Base trait for all worker handles.
pub trait Handle: Clone + Send + Sync {
    fn id(&self) -> WorkerId;

    /// The name the worker was spawned with.
    fn name(&self) -> &'static str;
}

/// Handle for workers that can be woken up before their next tick.
///
/// Notifications are coalesced: several `notify()` calls made while the
/// worker is busy result in a single extra run.
pub trait Notifiable: Handle {
    fn notify(&self);
}

/// Handle for workers with [`Trigger::Once`](crate::Trigger::Once).
#[derive(Clone, Debug)]
pub struct OnceHandle {
    id:   WorkerId,
    name: &'static str,
}

impl OnceHandle {
    pub(crate) const fn new(id: WorkerId, name: &'static str) -> Self { OnceHandle { id, name } }
}

impl Handle for OnceHandle {
    fn id(&self) -> WorkerId { self.id }

    fn name(&self) -> &'static str { self.name }
}

/// Handle for workers with [`Trigger::Interval`](crate::Trigger::Interval).
#[derive(Clone, Debug)]
pub struct IntervalHandle {
    id:   WorkerId,
    name: &'static str,
}

impl IntervalHandle {
    pub(crate) const fn new(id: WorkerId, name: &'static str) -> Self {
        IntervalHandle { id, name }
    }
}

impl Handle for IntervalHandle {
    fn id(&self) -> WorkerId { self.id }

    fn name(&self) -> &'static str { self.name }
}

/// Handle for workers with
/// [`Trigger::IntervalOrNotify`](crate::Trigger::IntervalOrNotify).
#[derive(Clone, Debug)]
pub struct IntervalOrNotifyHandle {
    id:     WorkerId,
    name:   &'static str,
    notify: Arc<Notify>,
}

impl IntervalOrNotifyHandle {
    pub(crate) const fn new(id: WorkerId, name: &'static str, notify: Arc<Notify>) -> Self {
        IntervalOrNotifyHandle { id, name, notify }
    }
}

impl Handle for IntervalOrNotifyHandle {
    fn id(&self) -> WorkerId { self.id }

    fn name(&self) -> &'static str { self.name }
}

impl Notifiable for IntervalOrNotifyHandle {
    fn notify(&self) { self.notify.notify_one(); }
}
