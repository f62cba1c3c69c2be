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
    io::{self, BufRead},
    path::PathBuf,
    time::Duration,
};

use clap::{Args, Parser, Subcommand};
use detour_app::{APP_NAME, AppConfig};
use detour_base::readable_size::ReadableSize;
use detour_common_runtime::{GlobalRuntimeOptions, RuntimeOptions, init_global_runtimes};
use detour_common_telemetry::{self as telemetry, LogFormat, LoggingOptions};
use detour_dispatch::receiver;
use detour_failover::{FailoverWriter, RecordFormat};
use snafu::{ResultExt, Whatever, whatever};
use tokio_util::sync::CancellationToken;

mod build_info;

#[derive(Debug, Parser)]
#[clap(
    name = "detour",
    about = "Durable failover queue for outbound events",
    author = build_info::AUTHOR,
    version = build_info::FULL_VERSION
)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Run(RunArgs),
    Enqueue(EnqueueArgs),
    Receive(ReceiveArgs),
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Replays failed events from the failover log until interrupted.
Examples:

detour run --errlog /var/spool/detour/failover.log --receiver 10.0.0.1:15010
detour run --debug

")]
struct RunArgs {
    /// TOML config file. Flags override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path of the failover log.
    #[arg(long)]
    errlog: Option<PathBuf>,

    /// Rotate the failover log once it is larger than this, e.g. `1MiB`.
    #[arg(long)]
    max_bytes: Option<ReadableSize>,

    /// Segments replayed concurrently.
    #[arg(long, alias = "maxprocessing")]
    workers: Option<usize>,

    /// Receiver endpoint `host:port`. Repeat for several receivers.
    #[arg(long = "receiver")]
    receivers: Vec<String>,

    /// Log and acknowledge records instead of sending them.
    #[arg(long)]
    debug: bool,

    #[arg(long)]
    log_dir: Option<String>,

    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl RunArgs {
    fn into_config(self) -> Result<AppConfig, Whatever> {
        let mut config = AppConfig::load(self.config.as_deref())?;
        if let Some(errlog) = self.errlog {
            config.failover.active_log = errlog;
        }
        if let Some(max_bytes) = self.max_bytes {
            config.failover.max_bytes = max_bytes;
        }
        if let Some(workers) = self.workers {
            config.failover.workers = workers;
        }
        if !self.receivers.is_empty() {
            config.receivers = self.receivers;
        }
        config.debug |= self.debug;
        if let Some(dir) = self.log_dir {
            config.logging.dir = dir;
        }
        if let Some(format) = self.log_format {
            config.logging.log_format = format;
        }
        Ok(config)
    }

    async fn run(self) -> Result<(), Whatever> { self.into_config()?.open().run().await }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r#"

Appends JSON events to a failover log. Reads one event per line from stdin
when no event is given.
Examples:

detour enqueue '{"event":"login","user":42}'
cat events.jsonl | detour enqueue --errlog /var/spool/detour/failover.log

"#)]
struct EnqueueArgs {
    #[arg(long, default_value = "failover.log")]
    errlog: PathBuf,

    #[arg(long, default_value = "json")]
    format: RecordFormat,

    /// Events as JSON documents.
    events: Vec<String>,
}

impl EnqueueArgs {
    fn run(self) -> Result<(), Whatever> {
        let writer = FailoverWriter::open(&self.errlog, self.format)
            .with_whatever_context(|_| format!("Failed to open {}", self.errlog.display()))?;

        let mut count = 0usize;
        let mut append = |raw: &str| -> Result<(), Whatever> {
            let raw = raw.trim();
            if raw.is_empty() {
                return Ok(());
            }
            let event: serde_json::Value = serde_json::from_str(raw)
                .with_whatever_context(|_| format!("Not a JSON document: {raw}"))?;
            writer
                .append(&event)
                .whatever_context("Failed to append event")?;
            count += 1;
            Ok(())
        };

        if self.events.is_empty() {
            for line in io::stdin().lock().lines() {
                append(&line.whatever_context("Failed to read stdin")?)?;
            }
        } else {
            for event in &self.events {
                append(event)?;
            }
        }
        println!("enqueued {count} event(s) to {}", self.errlog.display());
        Ok(())
    }
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Runs a receiver that logs and acknowledges every event.
Examples:

detour receive --listen 127.0.0.1:15010

")]
struct ReceiveArgs {
    #[arg(long, default_value = detour_app::DEFAULT_RECEIVER)]
    listen: String,
}

impl ReceiveArgs {
    async fn run(self) -> Result<(), Whatever> {
        let _guards = telemetry::init_global_logging(
            &format!("{APP_NAME}-receiver"),
            &LoggingOptions::default(),
        );
        let listener = receiver::bind(&self.listen)
            .await
            .whatever_context("Failed to start receiver")?;

        let cancel = CancellationToken::new();
        let server = tokio::spawn(receiver::serve(
            listener,
            receiver::log_and_ack,
            cancel.clone(),
        ));
        if let Err(e) = tokio::signal::ctrl_c().await {
            whatever!("Failed to listen for Ctrl+C: {e}");
        }
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .whatever_context("Receiver did not stop in time")?
            .whatever_context("Receiver task failed")?;
        Ok(())
    }
}

fn main() -> Result<(), Whatever> {
    let cli = Cli::parse();
    init_global_runtimes(&GlobalRuntimeOptions::default())
        .whatever_context("Failed to initialize runtimes")?;

    let runtime = RuntimeOptions::builder()
        .thread_name("detour-main".to_string())
        .build()
        .create()
        .whatever_context("Failed to build main runtime")?;

    match cli.commands {
        Commands::Run(args) => runtime.block_on(args.run()),
        Commands::Enqueue(args) => args.run(),
        Commands::Receive(args) => runtime.block_on(args.run()),
    }
}
