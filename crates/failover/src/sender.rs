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

//! Delivery capability consumed by the replayer.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use snafu::Snafu;
use tracing::info;

/// Why a delivery attempt failed.
///
/// Only [`DeliveryError::Rejected`] is permanent. Everything else is retried
/// until it succeeds.
#[derive(Debug, Snafu, Clone, PartialEq, Eq)]
#[snafu(visibility(pub))]
pub enum DeliveryError {
    #[snafu(display("receiver {endpoint} unavailable: {reason}"))]
    Unavailable { endpoint: String, reason: String },

    #[snafu(display("receiver rejected record: {reason}"))]
    Rejected { reason: String },

    #[snafu(display("no receivers configured"))]
    NoReceivers,
}

impl DeliveryError {
    /// `true` when retrying the same record can never succeed.
    #[must_use]
    pub const fn is_permanent(&self) -> bool { matches!(self, DeliveryError::Rejected { .. }) }
}

/// Forwards one decoded record to a receiver.
#[async_trait::async_trait]
pub trait Sender: Send + Sync + 'static {
    async fn deliver(&self, record: &Value) -> Result<(), DeliveryError>;
}

/// Acknowledges every record after logging it.
///
/// Used in debug mode to exercise rotation, replay and checkpointing without
/// a receiver.
#[derive(Debug, Default)]
pub struct MockSender {
    delivered: AtomicU64,
}

impl MockSender {
    #[must_use]
    pub fn delivered(&self) -> u64 { self.delivered.load(Ordering::Relaxed) }
}

#[async_trait::async_trait]
impl Sender for MockSender {
    async fn deliver(&self, record: &Value) -> Result<(), DeliveryError> {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        info!(%record, "Mock delivery");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn only_rejections_are_permanent() {
        assert!(
            DeliveryError::Rejected {
                reason: "schema".into(),
            }
            .is_permanent()
        );
        assert!(!DeliveryError::NoReceivers.is_permanent());
        assert!(
            !DeliveryError::Unavailable {
                endpoint: "localhost:15010".into(),
                reason:   "connection refused".into(),
            }
            .is_permanent()
        );
    }

    #[tokio::test]
    async fn mock_sender_acknowledges_everything() {
        let sender = MockSender::default();
        sender.deliver(&json!({"a": 1})).await.unwrap();
        sender.deliver(&json!(null)).await.unwrap();
        assert_eq!(sender.delivered(), 2);
    }
}
