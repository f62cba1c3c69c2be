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
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use detour_failover::DeliveryError;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    protocol::Reply,
    transport::{Connector, Transport},
};

/// One receiver endpoint and its (possibly absent) transport.
pub struct Connection {
    endpoint:           String,
    connector:          Arc<dyn Connector>,
    slot:               Mutex<Option<Box<dyn Transport>>>,
    reconnecting:       AtomicBool,
    reconnect_interval: Duration,
    cancel:             CancellationToken,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .field("reconnecting", &self.is_reconnecting())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Dials `endpoint` once. On failure the connection starts out
    /// disconnected with a reconnect loop running.
    pub async fn open(
        endpoint: String,
        connector: Arc<dyn Connector>,
        reconnect_interval: Duration,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        let transport = match connector.connect(&endpoint).await {
            Ok(transport) => {
                info!(%endpoint, "Connected to receiver");
                Some(transport)
            }
            Err(e) => {
                warn!(%endpoint, error = %e, "Failed to connect to receiver");
                None
            }
        };
        let connected = transport.is_some();
        let connection = Arc::new(Connection {
            endpoint,
            connector,
            slot: Mutex::new(transport),
            reconnecting: AtomicBool::new(false),
            reconnect_interval,
            cancel,
        });
        if !connected {
            connection.spawn_reconnect();
        }
        connection
    }

    #[must_use]
    pub fn endpoint(&self) -> &str { &self.endpoint }

    #[must_use]
    pub fn is_reconnecting(&self) -> bool { self.reconnecting.load(Ordering::Acquire) }

    /// Sends one record over the current transport.
    ///
    /// Never waits for a reconnect: without a live transport this fails
    /// immediately with [`DeliveryError::Unavailable`].
    pub async fn send(self: &Arc<Self>, record: &Value) -> Result<(), DeliveryError> {
        let mut slot = self.slot.lock().await;
        let Some(transport) = slot.as_mut() else {
            return Err(self.unavailable("not connected"));
        };

        match transport.send_event(record).await {
            Ok(Reply::Ok) => Ok(()),
            Ok(Reply::Rejected { reason }) => Err(DeliveryError::Rejected { reason }),
            Ok(Reply::Error { reason }) => Err(self.unavailable(reason)),
            Err(e) => {
                *slot = None;
                drop(slot);
                warn!(endpoint = %self.endpoint, error = %e, "Connection lost");
                self.spawn_reconnect();
                Err(self.unavailable(e.to_string()))
            }
        }
    }

    fn unavailable(&self, reason: impl Into<String>) -> DeliveryError {
        DeliveryError::Unavailable {
            endpoint: self.endpoint.clone(),
            reason:   reason.into(),
        }
    }

    /// Starts the reconnect loop unless one is already running.
    fn spawn_reconnect(self: &Arc<Self>) {
        if self.reconnecting.swap(true, Ordering::AcqRel) {
            return;
        }
        let connection = Arc::clone(self);
        tokio::spawn(async move {
            connection.reconnect_loop().await;
            connection.reconnecting.store(false, Ordering::Release);
        });
    }

    async fn reconnect_loop(&self) {
        let endpoint = &self.endpoint;
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!(%endpoint, "Reconnect loop stopped");
                    return;
                }
                () = tokio::time::sleep(self.reconnect_interval) => {}
            }
            match self.connector.connect(endpoint).await {
                Ok(transport) => {
                    *self.slot.lock().await = Some(transport);
                    info!(%endpoint, "Reconnected to receiver");
                    return;
                }
                Err(e) => debug!(%endpoint, error = %e, "Reconnect attempt failed"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use serde_json::json;

    use super::*;
    use crate::error::{ClosedSnafu, ConnectTimeoutSnafu};

    /// Connector whose first `refuse` dials fail; transports break after
    /// `breaks_after` sends.
    struct FlakyConnector {
        refuse:       usize,
        breaks_after: usize,
        dials:        AtomicUsize,
    }

    struct CountingTransport {
        left: usize,
    }

    #[async_trait::async_trait]
    impl Transport for CountingTransport {
        async fn send_event(&mut self, record: &Value) -> crate::Result<Reply> {
            if self.left == 0 {
                return ClosedSnafu { endpoint: "test" }.fail();
            }
            self.left -= 1;
            if record == &json!("poison") {
                return Ok(Reply::Rejected {
                    reason: "poison".into(),
                });
            }
            Ok(Reply::Ok)
        }
    }

    #[async_trait::async_trait]
    impl Connector for FlakyConnector {
        async fn connect(&self, endpoint: &str) -> crate::Result<Box<dyn Transport>> {
            if self.dials.fetch_add(1, Ordering::SeqCst) < self.refuse {
                return ConnectTimeoutSnafu { endpoint }.fail();
            }
            Ok(Box::new(CountingTransport {
                left: self.breaks_after,
            }))
        }
    }

    fn connector(refuse: usize, breaks_after: usize) -> Arc<FlakyConnector> {
        Arc::new(FlakyConnector {
            refuse,
            breaks_after,
            dials: AtomicUsize::new(0),
        })
    }

    async fn eventually(mut condition: impl FnMut() -> bool) {
        for _ in 0..500 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition never held");
    }

    #[tokio::test]
    async fn test_send_maps_replies() {
        let conn = Connection::open(
            "a:1".into(),
            connector(0, 10),
            Duration::from_millis(10),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(conn.send(&json!(1)).await, Ok(()));
        assert!(matches!(
            conn.send(&json!("poison")).await,
            Err(DeliveryError::Rejected { .. })
        ));
    }

    #[tokio::test]
    async fn test_broken_transport_fails_fast_then_reconnects() {
        let dialer = connector(0, 1);
        let conn = Connection::open(
            "a:1".into(),
            dialer.clone(),
            Duration::from_millis(10),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(conn.send(&json!(1)).await, Ok(()));
        let err = conn.send(&json!(2)).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Unavailable { .. }));

        eventually(|| dialer.dials.load(Ordering::SeqCst) == 2 && !conn.is_reconnecting()).await;
        assert_eq!(conn.send(&json!(3)).await, Ok(()));
    }

    #[tokio::test]
    async fn test_initial_failure_starts_reconnect_loop() {
        let dialer = connector(3, 10);
        let conn = Connection::open(
            "a:1".into(),
            dialer.clone(),
            Duration::from_millis(10),
            CancellationToken::new(),
        )
        .await;

        assert!(conn.is_reconnecting());
        assert!(matches!(
            conn.send(&json!(1)).await,
            Err(DeliveryError::Unavailable { .. })
        ));
        eventually(|| !conn.is_reconnecting()).await;
        assert_eq!(dialer.dials.load(Ordering::SeqCst), 4);
        assert_eq!(conn.send(&json!(1)).await, Ok(()));
    }

    #[tokio::test]
    async fn test_cancel_stops_reconnect_loop() {
        let dialer = connector(usize::MAX, 10);
        let cancel = CancellationToken::new();
        let conn = Connection::open(
            "a:1".into(),
            dialer.clone(),
            Duration::from_millis(10),
            cancel.clone(),
        )
        .await;

        assert!(conn.is_reconnecting());
        cancel.cancel();
        eventually(|| !conn.is_reconnecting()).await;
        let dials = dialer.dials.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(dialer.dials.load(Ordering::SeqCst), dials);
    }
}
