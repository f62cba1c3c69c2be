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

//! Worker abstraction for background task scheduling and execution.
//!
//! This crate provides the worker system the failover engine runs on:
//! - **Trigger types**: Once, Interval, and the IntervalOrNotify hybrid
//! - **Type-safe builder API**: a trigger must be chosen before spawning, and
//!   the handle type follows the trigger
//! - **Lifecycle hooks**: on_start, work, on_shutdown
//! - **Error severity**: transient errors are logged and the worker keeps
//!   going, fatal errors stop it
//! - **Graceful shutdown**: one cancellation token shared by every worker,
//!   with a timeout after which stragglers are aborted
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use detour_common_worker::{Manager, WorkResult, Worker, WorkerContext};
//!
//! struct Tick;
//!
//! #[async_trait::async_trait]
//! impl Worker for Tick {
//!     async fn work(&mut self, ctx: &WorkerContext) -> WorkResult {
//!         tracing::info!(worker = ctx.name(), "tick");
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut manager = Manager::new();
//!     let _handle = manager
//!         .worker(Tick)
//!         .name("tick")
//!         .interval(Duration::from_secs(5))
//!         .spawn();
//!
//!     manager.shutdown().await;
//! }
//! ```
//!
//! # Architecture
//!
//! - [`Worker`]: trait defining work logic with lifecycle hooks
//! - [`Manager`]: owns the cancellation token and the spawned tasks
//! - [`WorkerContext`]: per-worker execution context (cancellation, notify)
//! - [`Trigger`]: execution schedule
//! - Handle traits: [`Handle`] and [`Notifiable`] for runtime control

mod builder;
mod context;
mod driver;
mod err;
mod handle;
mod id;
mod manager;
mod metrics;
mod trigger;
mod worker;

pub use builder::WorkerBuilder;
pub use context::WorkerContext;
pub use err::{ErrorSeverity, WorkError, WorkResult};
pub use handle::{Handle, IntervalHandle, IntervalOrNotifyHandle, Notifiable, OnceHandle};
pub use id::WorkerId;
pub use manager::{Manager, ManagerConfig, ShutdownReport};
pub use trigger::Trigger;
pub use worker::Worker;
