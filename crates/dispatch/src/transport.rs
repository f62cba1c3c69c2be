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

use serde_json::Value;

use crate::{Result, protocol::Reply};

/// A live link to one receiver.
#[async_trait::async_trait]
pub trait Transport: Send + 'static {
    /// Sends one event and waits for the receiver's reply.
    ///
    /// An `Err` means the link is broken and must be replaced.
    async fn send_event(&mut self, record: &Value) -> Result<Reply>;
}

/// Opens transports to receiver endpoints.
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn Transport>>;
}
