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

use std::{path::Path, sync::Arc, time::Duration};

use bon::Builder;
use detour_common_telemetry::{self as telemetry, LoggingOptions};
use detour_dispatch::{Dispatcher, TcpConnector};
use detour_failover::{Failover, FailoverConfig, MockSender, Sender};
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use snafu::{ResultExt, Whatever};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub const APP_NAME: &str = "detour";

/// Receiver used when none is configured.
pub const DEFAULT_RECEIVER: &str = "localhost:15010";

/// Everything the `detour run` process needs.
///
/// Loaded from an optional TOML file and `DETOUR__*` environment variables
/// (`DETOUR__FAILOVER__WORKERS=8`, `DETOUR__RECEIVERS=a:1,b:2`), then
/// overridden by command-line flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault, Builder)]
#[serde(default)]
pub struct AppConfig {
    #[builder(default)]
    pub failover: FailoverConfig,

    /// Receiver endpoints as `host:port`.
    #[default(vec![DEFAULT_RECEIVER.to_string()])]
    #[builder(default = vec![DEFAULT_RECEIVER.to_string()])]
    pub receivers: Vec<String>,

    /// Delay between reconnect attempts to a lost receiver.
    #[default(Duration::from_secs(1))]
    #[builder(default = Duration::from_secs(1))]
    #[serde(with = "humantime_serde")]
    pub reconnect_interval: Duration,

    /// Log and acknowledge records instead of sending them.
    #[builder(default)]
    pub debug: bool,

    #[builder(default)]
    pub logging: LoggingOptions,
}

impl AppConfig {
    /// Layers `path` (if any) and the environment over the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, Whatever> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder
            .add_source(
                config::Environment::with_prefix("DETOUR")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("receivers"),
            )
            .build()
            .whatever_context("Failed to read configuration")?
            .try_deserialize()
            .whatever_context("Invalid configuration")
    }

    #[must_use]
    pub fn open(self) -> App {
        App {
            config:             self,
            cancellation_token: CancellationToken::new(),
        }
    }
}

pub struct App {
    config:             AppConfig,
    cancellation_token: CancellationToken,
}

/// A started failover queue and the dispatcher feeding it, if any.
struct Running {
    failover:   Failover,
    dispatcher: Option<Arc<Dispatcher>>,
}

impl Running {
    async fn shutdown(mut self) {
        self.failover.stop().await;
        if let Some(dispatcher) = self.dispatcher {
            dispatcher.shutdown();
        }
    }
}

impl App {
    #[must_use]
    pub const fn config(&self) -> &AppConfig { &self.config }

    /// Cancelling this token stops [`App::run`] as a signal would.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken { self.cancellation_token.clone() }

    async fn start(&self) -> Result<Running, Whatever> {
        let config = &self.config;
        let (sender, dispatcher): (Arc<dyn Sender>, _) = if config.debug {
            info!("Debug mode, records are logged instead of sent");
            (Arc::new(MockSender::default()) as Arc<dyn Sender>, None)
        } else {
            let dispatcher = Arc::new(
                Dispatcher::connect(
                    config.receivers.iter().cloned(),
                    Arc::new(TcpConnector::default()),
                    config.reconnect_interval,
                )
                .await,
            );
            (Arc::clone(&dispatcher) as Arc<dyn Sender>, Some(dispatcher))
        };

        let mut failover = Failover::open(config.failover.clone(), sender)
            .whatever_context("Failed to open failover log")?;
        failover
            .start()
            .whatever_context("Failed to start failover")?;

        info!(
            receivers = ?config.receivers,
            debug = config.debug,
            "Application started"
        );
        Ok(Running {
            failover,
            dispatcher,
        })
    }

    /// Runs until Ctrl+C, SIGTERM or the cancellation token.
    pub async fn run(self) -> Result<(), Whatever> {
        let _guards = telemetry::init_global_logging(APP_NAME, &self.config.logging);
        telemetry::set_panic_hook();
        info!(version = env!("CARGO_PKG_VERSION"), "Starting detour");

        let running = self.start().await?;
        shutdown_signal(self.cancellation_token.clone()).await;
        running.shutdown().await;

        info!("Application shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("Received Ctrl+C signal"); },
        () = terminate => { info!("Received terminate signal"); },
        () = token.cancelled() => { info!("Received shutdown signal"); },
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use detour_failover::RecordFormat;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.receivers, vec![DEFAULT_RECEIVER.to_string()]);
        assert_eq!(config.reconnect_interval, Duration::from_secs(1));
        assert!(!config.debug);
        assert_eq!(config.failover.workers, 4);
        assert_eq!(AppConfig::builder().build(), config);
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
receivers = ["10.0.0.1:15010", "10.0.0.2:15010"]
reconnect_interval = "500ms"
debug = true

[failover]
active_log = "/var/spool/detour/failover.log"
max_bytes = "8MiB"
record_format = "msgpack"
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.receivers.len(), 2);
        assert_eq!(config.reconnect_interval, Duration::from_millis(500));
        assert!(config.debug);
        assert_eq!(config.failover.max_bytes.as_bytes(), 8 * 1024 * 1024);
        assert_eq!(config.failover.record_format, RecordFormat::MsgPack);
        assert_eq!(config.failover.watch_interval, Duration::from_secs(3));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(AppConfig::load(Some(Path::new("/nonexistent/detour.toml"))).is_err());
    }

    #[tokio::test]
    async fn test_debug_mode_starts_and_stops() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config = AppConfig::builder()
            .debug(true)
            .failover(
                FailoverConfig::builder()
                    .active_log(temp_dir.path().join("failover.log"))
                    .build(),
            )
            .build();
        let app = config.open();

        let running = app.start().await.unwrap();
        assert!(running.dispatcher.is_none());
        running
            .failover
            .enqueue_failed_event(&json!({"event": "login"}))
            .unwrap();
        assert!(temp_dir.path().join("failover.log.lock").exists());
        running.shutdown().await;
    }

    #[tokio::test]
    async fn test_run_returns_when_cancelled() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let app = AppConfig::builder()
            .debug(true)
            .failover(
                FailoverConfig::builder()
                    .active_log(temp_dir.path().join("failover.log"))
                    .build(),
            )
            .logging(LoggingOptions {
                append_stdout: false,
                ..LoggingOptions::default()
            })
            .build()
            .open();

        let token = app.cancellation_token();
        let lock = temp_dir.path().join("failover.log.lock");
        let cancel_when_started = async {
            for _ in 0..200 {
                if lock.exists() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            token.cancel();
        };
        let (result, ()) = tokio::time::timeout(
            Duration::from_secs(10),
            async { tokio::join!(app.run(), cancel_when_started) },
        )
        .await
        .unwrap();
        result.unwrap();

        // The replay lock is released on shutdown, so a second instance can start.
        let again = AppConfig::builder()
            .debug(true)
            .failover(
                FailoverConfig::builder()
                    .active_log(temp_dir.path().join("failover.log"))
                    .build(),
            )
            .build()
            .open();
        again.start().await.unwrap().shutdown().await;
    }
}
