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

use std::{path::PathBuf, time::Duration};

use bon::Builder;
use detour_base::readable_size::ReadableSize;
use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;

use crate::RecordFormat;

/// Tunables of one failover queue.
///
/// Every field has a default, so a config file only names what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, SmartDefault, Builder)]
#[serde(default)]
pub struct FailoverConfig {
    /// Active log path. Segments, checkpoints and the replay lock live next
    /// to it.
    #[default(PathBuf::from("failover.log"))]
    #[builder(into, default = PathBuf::from("failover.log"))]
    pub active_log: PathBuf,

    /// The size trigger seals the active log once it is larger than this.
    #[default(ReadableSize::mb(1))]
    #[builder(default = ReadableSize::mb(1))]
    pub max_bytes: ReadableSize,

    #[default(Duration::from_secs(2))]
    #[builder(default = Duration::from_secs(2))]
    #[serde(with = "humantime_serde")]
    pub size_check_interval: Duration,

    /// The idle trigger seals whatever the active log holds at this period.
    #[default(Duration::from_secs(30))]
    #[builder(default = Duration::from_secs(30))]
    #[serde(with = "humantime_serde")]
    pub idle_check_interval: Duration,

    #[default(Duration::from_secs(3))]
    #[builder(default = Duration::from_secs(3))]
    #[serde(with = "humantime_serde")]
    pub watch_interval: Duration,

    /// Concurrent segment replays.
    #[default = 4]
    #[builder(default = 4)]
    pub workers: usize,

    /// Segments waiting for a free worker before discovery backs off.
    #[default = 100]
    #[builder(default = 100)]
    pub job_queue_capacity: usize,

    /// Pause between delivery attempts of the same record.
    #[default(Duration::from_secs(1))]
    #[builder(default = Duration::from_secs(1))]
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,

    #[builder(default)]
    pub record_format: RecordFormat,

    #[default(Duration::from_secs(30))]
    #[builder(default = Duration::from_secs(30))]
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_matches_default() {
        assert_eq!(FailoverConfig::builder().build(), FailoverConfig::default());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: FailoverConfig = serde_json::from_str(
            r#"{"active_log": "/var/spool/detour/events.log", "max_bytes": "4MiB", "retry_delay": "250ms", "record_format": "msgpack"}"#,
        )
        .unwrap();

        assert_eq!(config.active_log, PathBuf::from("/var/spool/detour/events.log"));
        assert_eq!(config.max_bytes, ReadableSize::mb(4));
        assert_eq!(config.retry_delay, Duration::from_millis(250));
        assert_eq!(config.record_format, RecordFormat::MsgPack);
        assert_eq!(config.workers, 4);
        assert_eq!(config.watch_interval, Duration::from_secs(3));
    }
}
