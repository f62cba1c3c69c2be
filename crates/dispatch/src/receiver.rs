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

//! A minimal receiver for the line protocol.

use std::{io::ErrorKind, net::SocketAddr, sync::Arc};

use serde_json::Value;
use snafu::ResultExt;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    Result,
    error::{BindSnafu, IoSnafu},
    protocol::{IncomingRequest, Reply, SEND_EVENT},
};

/// Binds `addr` for [`serve`].
pub async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr).await.context(BindSnafu { addr })
}

/// Accepts connections until `cancel` fires, answering each `send_event`
/// with whatever `handler` returns.
pub async fn serve<H>(listener: TcpListener, handler: H, cancel: CancellationToken)
where
    H: Fn(&Value) -> Reply + Send + Sync + 'static,
{
    let handler = Arc::new(handler);
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Receiver listening");
    }
    loop {
        let accepted = tokio::select! {
            () = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, peer)) => {
                debug!(%peer, "Accepted connection");
                let handler = Arc::clone(&handler);
                let cancel = cancel.child_token();
                tokio::spawn(async move {
                    tokio::select! {
                        () = cancel.cancelled() => {}
                        result = handle_connection(stream, peer, handler.as_ref()) => {
                            if let Err(e) = result {
                                log_connection_error(peer, &e);
                            }
                        }
                    }
                });
            }
            Err(e) => error!(error = %e, "Failed to accept connection"),
        }
    }
    info!("Receiver stopped");
}

async fn handle_connection<H>(stream: TcpStream, peer: SocketAddr, handler: &H) -> Result<()>
where
    H: Fn(&Value) -> Reply,
{
    let endpoint = peer.to_string();
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .context(IoSnafu { endpoint: &endpoint })?
    {
        let reply = match serde_json::from_str::<IncomingRequest>(&line) {
            Ok(request) if request.method == SEND_EVENT => handler(&request.params),
            Ok(request) => Reply::Error {
                reason: format!("unknown method {}", request.method),
            },
            Err(e) => Reply::Error {
                reason: format!("malformed request: {e}"),
            },
        };
        let mut out = serde_json::to_vec(&reply)
            .unwrap_or_else(|_| br#"{"status":"error","reason":"encode"}"#.to_vec());
        out.push(b'\n');
        write
            .write_all(&out)
            .await
            .context(IoSnafu { endpoint: &endpoint })?;
    }
    debug!(%peer, "Connection closed");
    Ok(())
}

fn log_connection_error(peer: SocketAddr, err: &crate::Error) {
    if let crate::Error::Io { source, .. } = err {
        match source.kind() {
            ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset => {
                info!(%peer, kind = %source.kind(), "Connection dropped");
                return;
            }
            _ => {}
        }
    }
    warn!(%peer, error = %err, "Connection failed");
}

/// Handler that logs every event and acknowledges it.
pub fn log_and_ack(event: &Value) -> Reply {
    info!(%event, "Received event");
    Reply::Ok
}
