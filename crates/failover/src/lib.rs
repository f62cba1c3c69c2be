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

//! Durable failover queue for outbound event delivery.
//!
//! Events that could not be delivered are appended to an active log on disk.
//! In the background:
//! - the [`rotator`] seals the active log into immutable, timestamped
//!   segments,
//! - the [`watcher`] discovers sealed segments and hands them to a pool of
//!   replay workers,
//! - each [`pool`] worker replays one segment through a [`Sender`], resuming
//!   from a line checkpoint, and the watcher deletes the segment once it has
//!   been fully replayed.
//!
//! Delivery is at-least-once: a record delivered but not yet checkpointed
//! when the process dies is delivered again on restart.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use detour_failover::{Failover, FailoverConfig, MockSender};
//!
//! # async fn run() -> detour_failover::Result<()> {
//! let config = FailoverConfig::builder().active_log("failover.log").build();
//! let mut failover = Failover::open(config, Arc::new(MockSender::default()))?;
//! failover.start()?;
//! failover.enqueue_failed_event(&serde_json::json!({"event": "login"}))?;
//! failover.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
pub mod codec;
pub mod config;
pub mod error;
mod failover;
mod metrics;
pub mod path;
pub mod pool;
pub mod replayer;
pub mod rotator;
pub mod sender;
pub mod watcher;
pub mod writer;

pub use codec::RecordFormat;
pub use config::FailoverConfig;
pub use error::{Error, Result};
pub use failover::Failover;
pub use replayer::{ReplayOutcome, ReplayStats, Replayer};
pub use rotator::{RotationOutcome, Rotator};
pub use sender::{DeliveryError, MockSender, Sender};
pub use writer::FailoverWriter;
