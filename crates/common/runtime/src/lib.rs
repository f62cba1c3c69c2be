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

mod error;
mod factory;
mod global;
mod options;

pub use error::{Error, Result};
pub use global::{background_runtime, init_global_runtimes, spawn_blocking_file_io};
pub use options::{GlobalRuntimeOptions, RuntimeOptions};
pub use tokio::{runtime::Runtime, task::JoinHandle};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_multi_thread_runtime_with_names() {
        let runtime = RuntimeOptions::builder()
            .thread_name("test-rt".to_string())
            .worker_threads(2)
            .build()
            .create()
            .unwrap();
        let handle = runtime.spawn(async move { std::thread::current().name().map(str::to_owned) });
        let handle_name = runtime.block_on(handle).unwrap().unwrap();
        assert!(handle_name.starts_with("test-rt-"));
    }

    #[test]
    fn blocking_file_jobs_run_off_the_caller_thread() {
        let runtime = RuntimeOptions::builder()
            .thread_name("caller".to_string())
            .worker_threads(1)
            .build()
            .create()
            .unwrap();
        let caller = std::thread::current().id();
        let job_thread = runtime
            .block_on(spawn_blocking_file_io(|| std::thread::current().id()))
            .unwrap();
        assert_ne!(caller, job_thread);

        // defaults were installed by the call above
        assert!(init_global_runtimes(&GlobalRuntimeOptions::default()).is_err());
    }
}
