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

use crate::{context::WorkerContext, err::WorkResult};

/// Core worker trait for background tasks.
///
/// Implementors only define single-shot execution logic in `work()`. The
/// framework handles looping, triggering, and lifecycle management.
///
/// Returning a transient [`WorkError`](crate::WorkError) from `work()` logs
/// the failure and waits for the next trigger. A fatal error stops the
/// worker after `on_shutdown()` has run.
#[async_trait::async_trait]
pub trait Worker: Send + 'static {
    /// Called once when the worker starts, before the first `work()`.
    async fn on_start(&mut self, _ctx: &WorkerContext) -> WorkResult { Ok(()) }

    /// Single execution unit, called each time the trigger fires.
    async fn work(&mut self, ctx: &WorkerContext) -> WorkResult;

    /// Called once when the worker is shutting down, after the last
    /// `work()`. Runs even if `work()` failed fatally.
    async fn on_shutdown(&mut self, _ctx: &WorkerContext) -> WorkResult { Ok(()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ExampleWorker {
        counter: i64,
    }

    #[async_trait::async_trait]
    impl Worker for ExampleWorker {
        async fn work(&mut self, _ctx: &WorkerContext) -> WorkResult {
            self.counter += 1;
            tracing::info!("Worker executed, counter = {}", self.counter);
            Ok(())
        }
    }

    #[test]
    fn test_worker_is_boxable() {
        fn assert_send<T: Send>(_: &T) {}
        let worker: Box<dyn Worker> = Box::new(ExampleWorker { counter: 0 });
        assert_send(&worker);
    }
}
