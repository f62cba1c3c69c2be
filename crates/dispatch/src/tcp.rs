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

use serde_json::Value;
use smart_default::SmartDefault;
use snafu::{OptionExt, ResultExt};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpStream,
};

use crate::{
    Result,
    error::{
        ClosedSnafu, ConnectSnafu, ConnectTimeoutSnafu, IoSnafu, ProtocolSnafu, TimeoutSnafu,
    },
    protocol::{OutgoingRequest, Reply, SEND_EVENT},
    transport::{Connector, Transport},
};

#[derive(Debug, Clone, SmartDefault)]
pub struct TcpConnector {
    #[default(Duration::from_secs(5))]
    pub connect_timeout: Duration,
    /// Upper bound on one request/reply round trip.
    #[default(Duration::from_secs(5))]
    pub request_timeout: Duration,
}

#[async_trait::async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn Transport>> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(endpoint))
            .await
            .ok()
            .context(ConnectTimeoutSnafu { endpoint })?
            .context(ConnectSnafu { endpoint })?;
        stream.set_nodelay(true).context(ConnectSnafu { endpoint })?;
        Ok(Box::new(TcpTransport {
            endpoint: endpoint.to_string(),
            stream:   BufReader::new(stream),
            line:     String::new(),
            timeout:  self.request_timeout,
        }))
    }
}

pub struct TcpTransport {
    endpoint: String,
    stream:   BufReader<TcpStream>,
    line:     String,
    timeout:  Duration,
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn send_event(&mut self, record: &Value) -> Result<Reply> {
        let timeout = self.timeout;
        match tokio::time::timeout(timeout, self.round_trip(record)).await {
            Ok(reply) => reply,
            Err(_) => TimeoutSnafu {
                endpoint: self.endpoint.as_str(),
                timeout,
            }
            .fail(),
        }
    }
}

impl TcpTransport {
    async fn round_trip(&mut self, record: &Value) -> Result<Reply> {
        let endpoint = self.endpoint.as_str();
        let mut request = serde_json::to_vec(&OutgoingRequest {
            method: SEND_EVENT,
            params: record,
        })
        .context(ProtocolSnafu { endpoint })?;
        request.push(b'\n');

        let stream = self.stream.get_mut();
        stream
            .write_all(&request)
            .await
            .context(IoSnafu { endpoint })?;
        stream.flush().await.context(IoSnafu { endpoint })?;

        self.line.clear();
        let n = self
            .stream
            .read_line(&mut self.line)
            .await
            .context(IoSnafu { endpoint })?;
        snafu::ensure!(n > 0, ClosedSnafu { endpoint });
        serde_json::from_str(self.line.trim_end()).context(ProtocolSnafu { endpoint })
    }
}
