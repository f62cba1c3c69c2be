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

//! Checkpointed replay of one sealed segment.

use std::{path::Path, sync::Arc, time::Duration};

use snafu::ResultExt;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    RecordFormat, Result,
    checkpoint::Checkpoint,
    error::{OpenFileSnafu, ReadFileSnafu},
    metrics::{DELIVERY_RETRIES, RECORDS_DELIVERED, RECORDS_MALFORMED, RECORDS_REJECTED},
    sender::{DeliveryError, Sender},
};

/// Counters for one replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Lines skipped because the checkpoint already held them.
    pub resumed_at: u64,
    pub delivered:  u64,
    /// Lines that could not be decoded.
    pub malformed:  u64,
    /// Records the receiver refused permanently.
    pub rejected:   u64,
    /// Transient delivery failures that were waited out.
    pub retries:    u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// Every line of the segment is checkpointed.
    Completed(ReplayStats),
    /// Shutdown was requested. The checkpoint marks where the next run
    /// resumes.
    Interrupted(ReplayStats),
}

/// Replays segments through a [`Sender`].
#[derive(Clone)]
pub struct Replayer {
    sender:      Arc<dyn Sender>,
    format:      RecordFormat,
    retry_delay: Duration,
}

impl Replayer {
    #[must_use]
    pub fn new(sender: Arc<dyn Sender>, format: RecordFormat, retry_delay: Duration) -> Self {
        Replayer {
            sender,
            format,
            retry_delay,
        }
    }

    /// Replays `segment` from its checkpoint to the end of file.
    ///
    /// Undecodable lines and permanently rejected records are logged and
    /// skipped. Transient failures are retried every `retry_delay` without
    /// limit. Each attempted line is appended to the checkpoint before the
    /// next one is read. Cancellation is honored before each record and
    /// while waiting to retry; a delivery already in progress completes.
    pub async fn replay(
        &self,
        segment: &Path,
        cancel: &CancellationToken,
    ) -> Result<ReplayOutcome> {
        let mut checkpoint = Checkpoint::open(segment).await?;
        let mut stats = ReplayStats {
            resumed_at: checkpoint.offset(),
            ..ReplayStats::default()
        };

        let file = File::open(segment)
            .await
            .context(OpenFileSnafu { path: segment })?;
        let mut reader = BufReader::new(file);
        let mut buf = Vec::new();
        let mut line_no = 0u64;

        loop {
            buf.clear();
            let n = reader
                .read_until(b'\n', &mut buf)
                .await
                .context(ReadFileSnafu { path: segment })?;
            if n == 0 {
                break;
            }
            line_no += 1;
            if line_no <= stats.resumed_at {
                continue;
            }
            if cancel.is_cancelled() {
                return Ok(ReplayOutcome::Interrupted(stats));
            }

            let raw = buf.strip_suffix(b"\n").unwrap_or(&buf);
            let text = String::from_utf8_lossy(raw);
            match self.format.decode(&text) {
                Err(e) => {
                    warn!(segment = %segment.display(), line = line_no, error = %e, "Skipping malformed record");
                    RECORDS_MALFORMED.inc();
                    stats.malformed += 1;
                }
                Ok(record) => {
                    if !self
                        .deliver_with_retry(&record, segment, line_no, cancel, &mut stats)
                        .await
                    {
                        return Ok(ReplayOutcome::Interrupted(stats));
                    }
                }
            }

            checkpoint.record(raw).await?;
        }

        info!(
            segment = %segment.display(),
            resumed_at = stats.resumed_at,
            delivered = stats.delivered,
            malformed = stats.malformed,
            rejected = stats.rejected,
            retries = stats.retries,
            "Segment replayed"
        );
        Ok(ReplayOutcome::Completed(stats))
    }

    /// Returns `false` when cancelled while waiting to retry.
    async fn deliver_with_retry(
        &self,
        record: &serde_json::Value,
        segment: &Path,
        line_no: u64,
        cancel: &CancellationToken,
        stats: &mut ReplayStats,
    ) -> bool {
        loop {
            match self.sender.deliver(record).await {
                Ok(()) => {
                    RECORDS_DELIVERED.inc();
                    stats.delivered += 1;
                    return true;
                }
                Err(e) if e.is_permanent() => {
                    warn!(segment = %segment.display(), line = line_no, error = %e, "Receiver rejected record, skipping");
                    RECORDS_REJECTED.inc();
                    stats.rejected += 1;
                    return true;
                }
                Err(e) => {
                    DELIVERY_RETRIES.inc();
                    stats.retries += 1;
                    if matches!(e, DeliveryError::NoReceivers) {
                        warn!(segment = %segment.display(), line = line_no, "No receivers configured, waiting");
                    } else {
                        debug!(segment = %segment.display(), line = line_no, error = %e, "Delivery failed, retrying");
                    }
                    tokio::select! {
                        () = cancel.cancelled() => return false,
                        () = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;
    use serde_json::{Value, json};

    use super::*;
    use crate::{checkpoint::count_lines, path::checkpoint_path};

    /// Records deliveries and fails the first `fail_first` attempts.
    #[derive(Default)]
    struct ScriptedSender {
        fail_first: usize,
        reject:     Option<Value>,
        attempts:   AtomicUsize,
        delivered:  Mutex<Vec<Value>>,
    }

    #[async_trait::async_trait]
    impl Sender for ScriptedSender {
        async fn deliver(&self, record: &Value) -> Result<(), DeliveryError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.fail_first {
                return Err(DeliveryError::Unavailable {
                    endpoint: "test".into(),
                    reason:   "down".into(),
                });
            }
            if self.reject.as_ref() == Some(record) {
                return Err(DeliveryError::Rejected {
                    reason: "bad event".into(),
                });
            }
            self.delivered.lock().push(record.clone());
            Ok(())
        }
    }

    fn write_segment(path: &Path, records: &[Option<Value>]) {
        let mut content = String::new();
        for record in records {
            match record {
                Some(value) => content.push_str(&RecordFormat::Json.encode(value).unwrap()),
                None => content.push_str("%%garbage%%"),
            }
            content.push('\n');
        }
        std::fs::write(path, content).unwrap();
    }

    fn replayer(sender: Arc<ScriptedSender>) -> Replayer {
        Replayer::new(sender, RecordFormat::Json, Duration::from_millis(10))
    }

    #[tokio::test]
    async fn test_malformed_line_is_skipped_and_checkpointed() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let segment = temp_dir.path().join("failover.log.1");
        write_segment(&segment, &[Some(json!(1)), None, Some(json!(3))]);
        let sender = Arc::new(ScriptedSender::default());

        let outcome = replayer(sender.clone())
            .replay(&segment, &CancellationToken::new())
            .await
            .unwrap();

        let ReplayOutcome::Completed(stats) = outcome else {
            panic!("replay should complete: {outcome:?}");
        };
        assert_eq!(stats.delivered, 2);
        assert_eq!(stats.malformed, 1);
        assert_eq!(*sender.delivered.lock(), vec![json!(1), json!(3)]);
        assert_eq!(count_lines(&checkpoint_path(&segment)).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_transient_failures_retry_same_record() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let segment = temp_dir.path().join("failover.log.1");
        write_segment(&segment, &[Some(json!("a")), Some(json!("b"))]);
        let sender = Arc::new(ScriptedSender {
            fail_first: 5,
            ..ScriptedSender::default()
        });

        let outcome = replayer(sender.clone())
            .replay(&segment, &CancellationToken::new())
            .await
            .unwrap();

        let ReplayOutcome::Completed(stats) = outcome else {
            panic!("replay should complete: {outcome:?}");
        };
        assert_eq!(stats.retries, 5);
        assert_eq!(stats.delivered, 2);
        assert_eq!(*sender.delivered.lock(), vec![json!("a"), json!("b")]);
        assert_eq!(count_lines(&checkpoint_path(&segment)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_rejected_record_is_not_retried() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let segment = temp_dir.path().join("failover.log.1");
        write_segment(&segment, &[Some(json!("ok")), Some(json!("nope"))]);
        let sender = Arc::new(ScriptedSender {
            reject: Some(json!("nope")),
            ..ScriptedSender::default()
        });

        let outcome = replayer(sender.clone())
            .replay(&segment, &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ReplayOutcome::Completed(ReplayStats {
                delivered: 1,
                rejected: 1,
                retries: 0,
                ..
            })
        ));
        assert_eq!(sender.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_resume_starts_after_checkpointed_lines() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let segment = temp_dir.path().join("failover.log.1");
        let records: Vec<_> = (1..=5).map(|i| Some(json!(i))).collect();
        write_segment(&segment, &records);
        let content = std::fs::read_to_string(&segment).unwrap();
        let first_two: String = content.lines().take(2).map(|l| format!("{l}\n")).collect();
        std::fs::write(checkpoint_path(&segment), first_two).unwrap();

        let sender = Arc::new(ScriptedSender::default());
        let outcome = replayer(sender.clone())
            .replay(&segment, &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ReplayOutcome::Completed(ReplayStats {
                resumed_at: 2,
                delivered: 3,
                ..
            })
        ));
        assert_eq!(*sender.delivered.lock(), vec![json!(3), json!(4), json!(5)]);
        assert_eq!(count_lines(&checkpoint_path(&segment)).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_torn_last_line_is_treated_as_a_record() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let segment = temp_dir.path().join("failover.log.1");
        let mut content = RecordFormat::Json.encode(&json!("whole")).unwrap();
        content.push('\n');
        content.push_str("eyJ0b3Ju");
        std::fs::write(&segment, content).unwrap();

        let sender = Arc::new(ScriptedSender::default());
        let outcome = replayer(sender)
            .replay(&segment, &CancellationToken::new())
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ReplayOutcome::Completed(ReplayStats {
                delivered: 1,
                malformed: 1,
                ..
            })
        ));
        let checkpoint = std::fs::read_to_string(checkpoint_path(&segment)).unwrap();
        assert!(checkpoint.ends_with("eyJ0b3Ju\n"));
    }

    #[tokio::test]
    async fn test_cancel_during_retry_wait_leaves_checkpoint_untouched() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let segment = temp_dir.path().join("failover.log.1");
        write_segment(&segment, &[Some(json!(1)), Some(json!(2))]);
        let sender = Arc::new(ScriptedSender {
            fail_first: usize::MAX,
            ..ScriptedSender::default()
        });
        let cancel = CancellationToken::new();

        let replayer = Replayer::new(sender, RecordFormat::Json, Duration::from_secs(3600));
        let task = {
            let cancel = cancel.clone();
            let segment = segment.clone();
            tokio::spawn(async move { replayer.replay(&segment, &cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let outcome = task.await.unwrap().unwrap();
        assert!(matches!(outcome, ReplayOutcome::Interrupted(_)));
        assert_eq!(count_lines(&checkpoint_path(&segment)).await.unwrap(), 0);
    }
}
