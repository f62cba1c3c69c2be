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

//! Process-wide runtimes shared by the failover engine.
//!
//! `file-io` runs the blocking copy and truncate of a rotation so that it
//! never stalls the async workers. `background` hosts workers spawned from
//! outside of any runtime.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use snafu::ensure;
use tokio::{runtime::Runtime, task::JoinHandle};

use crate::{
    error::{AlreadyInitializedSnafu, Result},
    options::{GlobalRuntimeOptions, RuntimeOptions},
};

#[derive(Debug)]
struct GlobalRuntimes {
    file_io:    Arc<Runtime>,
    background: Arc<Runtime>,
}

static GLOBAL_RUNTIMES: OnceCell<GlobalRuntimes> = OnceCell::new();

fn build_global_runtimes(options: &GlobalRuntimeOptions) -> Result<GlobalRuntimes> {
    let file_io = RuntimeOptions::builder()
        .thread_name("rt-file-io".to_string())
        .worker_threads(options.file_io_threads)
        .build()
        .create()?;
    let background = RuntimeOptions::builder()
        .thread_name("rt-bg".to_string())
        .worker_threads(options.background_threads)
        .build()
        .create()?;

    Ok(GlobalRuntimes {
        file_io:    Arc::new(file_io),
        background: Arc::new(background),
    })
}

fn global_runtimes() -> &'static GlobalRuntimes {
    GLOBAL_RUNTIMES.get_or_init(|| {
        build_global_runtimes(&GlobalRuntimeOptions::default())
            .unwrap_or_else(|e| panic!("Failed to create global runtimes: {e}"))
    })
}

/// Initializes the global runtimes with custom options.
///
/// Must run before anything touches the runtimes, otherwise the defaults
/// are already in place and this returns an error.
pub fn init_global_runtimes(options: &GlobalRuntimeOptions) -> Result<()> {
    ensure!(GLOBAL_RUNTIMES.get().is_none(), AlreadyInitializedSnafu);
    let runtimes = build_global_runtimes(options)?;
    ensure!(GLOBAL_RUNTIMES.set(runtimes).is_ok(), AlreadyInitializedSnafu);
    Ok(())
}

#[must_use]
pub fn background_runtime() -> Arc<Runtime> { Arc::clone(&global_runtimes().background) }

/// Runs a blocking file job on the `file-io` runtime's blocking pool.
pub fn spawn_blocking_file_io<F, R>(job: F) -> JoinHandle<R>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    global_runtimes().file_io.handle().spawn_blocking(job)
}
