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
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use detour_common_worker::{
    Handle, Manager, ManagerConfig, Notifiable, WorkError, WorkResult, Worker, WorkerContext,
};

struct TestWorker {
    counter: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Worker for TestWorker {
    async fn work(&mut self, _ctx: &WorkerContext) -> WorkResult {
        self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_once_trigger() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut manager = Manager::new();

    let handle = manager
        .worker(TestWorker {
            counter: counter.clone(),
        })
        .name("test-once")
        .once()
        .spawn();
    assert_eq!(handle.name(), "test-once");

    tokio::time::sleep(Duration::from_millis(100)).await;
    let report = manager.shutdown().await;

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(report.stopped, 1);
    assert_eq!(report.aborted, 0);
}

#[tokio::test]
async fn test_interval_trigger() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut manager = Manager::new();

    let _handle = manager
        .worker(TestWorker {
            counter: counter.clone(),
        })
        .name("test-interval")
        .interval(Duration::from_millis(20))
        .spawn();

    tokio::time::sleep(Duration::from_millis(150)).await;
    manager.shutdown().await;

    assert!(counter.load(Ordering::SeqCst) >= 3);
}

#[tokio::test]
async fn test_interval_or_notify_runs_on_notify() {
    let counter = Arc::new(AtomicUsize::new(0));
    let mut manager = Manager::new();

    let handle = manager
        .worker(TestWorker {
            counter: counter.clone(),
        })
        .name("test-hybrid")
        .interval_or_notify(Duration::from_secs(3600))
        .spawn();

    // first tick fires immediately
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    handle.notify();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 2);

    manager.shutdown().await;
}

struct FlakyWorker {
    calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Worker for FlakyWorker {
    async fn work(&mut self, _ctx: &WorkerContext) -> WorkResult {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            return Err(WorkError::transient("first call fails"));
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_transient_error_keeps_worker_running() {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut manager = Manager::new();

    manager
        .worker(FlakyWorker {
            calls: calls.clone(),
        })
        .name("test-flaky")
        .interval(Duration::from_millis(10))
        .spawn();

    tokio::time::sleep(Duration::from_millis(100)).await;
    manager.shutdown().await;

    assert!(calls.load(Ordering::SeqCst) > 1);
}

struct FatalWorker {
    calls:    Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl Worker for FatalWorker {
    async fn work(&mut self, _ctx: &WorkerContext) -> WorkResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(WorkError::fatal("cannot continue"))
    }

    async fn on_shutdown(&mut self, _ctx: &WorkerContext) -> WorkResult {
        self.shutdown.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_fatal_error_stops_worker() {
    let calls = Arc::new(AtomicUsize::new(0));
    let shutdown = Arc::new(AtomicBool::new(false));
    let mut manager = Manager::new();

    manager
        .worker(FatalWorker {
            calls:    calls.clone(),
            shutdown: shutdown.clone(),
        })
        .name("test-fatal")
        .interval(Duration::from_millis(10))
        .spawn();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(shutdown.load(Ordering::SeqCst));

    manager.shutdown().await;
}

struct LoopWorker;

#[async_trait::async_trait]
impl Worker for LoopWorker {
    async fn work(&mut self, ctx: &WorkerContext) -> WorkResult {
        ctx.cancelled().await;
        Ok(())
    }
}

#[tokio::test]
async fn test_shutdown_cancels_long_running_once_worker() {
    let mut manager = Manager::new();
    manager.worker(LoopWorker).name("test-loop").once().spawn();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let report = manager.shutdown().await;

    assert_eq!(report.stopped, 1);
    assert_eq!(report.aborted, 0);
}

struct StubbornWorker;

#[async_trait::async_trait]
impl Worker for StubbornWorker {
    async fn work(&mut self, _ctx: &WorkerContext) -> WorkResult {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }
}

#[tokio::test]
async fn test_shutdown_timeout_aborts_stuck_workers() {
    let config = ManagerConfig::builder()
        .shutdown_timeout(Duration::from_millis(50))
        .build();
    let mut manager = Manager::with_config(config);
    manager
        .worker(StubbornWorker)
        .name("test-stubborn")
        .once()
        .spawn();

    tokio::time::sleep(Duration::from_millis(20)).await;
    let report = manager.shutdown().await;

    assert_eq!(report.stopped, 0);
    assert_eq!(report.aborted, 1);
}

#[tokio::test]
async fn test_cancellation_token_is_shared() {
    let mut manager = Manager::new();
    let token = manager.cancellation_token();
    manager.worker(LoopWorker).name("test-token").once().spawn();

    assert!(!token.is_cancelled());
    manager.shutdown().await;
    assert!(token.is_cancelled());
}
