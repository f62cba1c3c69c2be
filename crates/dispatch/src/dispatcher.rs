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

use detour_failover::{DeliveryError, Sender};
use rand::Rng;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::{connection::Connection, transport::Connector};

/// Spreads deliveries over a fixed set of receivers.
#[derive(Debug)]
pub struct Dispatcher {
    connections: Vec<Arc<Connection>>,
    cancel:      CancellationToken,
}

impl Dispatcher {
    /// Dials every endpoint once. Endpoints that are down start
    /// reconnecting in the background.
    pub async fn connect<I, S>(
        endpoints: I,
        connector: Arc<dyn Connector>,
        reconnect_interval: Duration,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cancel = CancellationToken::new();
        let mut connections = Vec::new();
        for endpoint in endpoints {
            connections.push(
                Connection::open(
                    endpoint.into(),
                    Arc::clone(&connector),
                    reconnect_interval,
                    cancel.child_token(),
                )
                .await,
            );
        }
        Dispatcher {
            connections,
            cancel,
        }
    }

    #[must_use]
    pub fn connections(&self) -> &[Arc<Connection>] { &self.connections }

    /// Picks the connection for the next send, uniformly at random.
    pub fn select_connection(&self) -> Result<&Arc<Connection>, DeliveryError> {
        match self.connections.as_slice() {
            [] => Err(DeliveryError::NoReceivers),
            [only] => Ok(only),
            all => Ok(&all[rand::thread_rng().gen_range(0..all.len())]),
        }
    }

    /// Stops every reconnect loop.
    pub fn shutdown(&self) { self.cancel.cancel(); }
}

impl Drop for Dispatcher {
    fn drop(&mut self) { self.cancel.cancel(); }
}

#[async_trait::async_trait]
impl Sender for Dispatcher {
    async fn deliver(&self, record: &Value) -> Result<(), DeliveryError> {
        let connection = self.select_connection()?;
        connection.send(record).await
    }
}
