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

use std::sync::LazyLock;

use prometheus::{IntCounter, IntGauge, register_int_counter, register_int_gauge};

pub static RECORDS_APPENDED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "detour_failover_records_appended_total",
        "Records appended to the active log"
    )
    .unwrap()
});

pub static SEGMENTS_ROTATED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "detour_failover_segments_rotated_total",
        "Segments sealed from the active log"
    )
    .unwrap()
});

pub static BYTES_ROTATED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "detour_failover_bytes_rotated_total",
        "Bytes copied from the active log into sealed segments"
    )
    .unwrap()
});

pub static RECORDS_DELIVERED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "detour_failover_records_delivered_total",
        "Records acknowledged by a receiver during replay"
    )
    .unwrap()
});

pub static RECORDS_MALFORMED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "detour_failover_records_malformed_total",
        "Segment lines skipped because they could not be decoded"
    )
    .unwrap()
});

pub static RECORDS_REJECTED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "detour_failover_records_rejected_total",
        "Records skipped after a permanent receiver rejection"
    )
    .unwrap()
});

pub static DELIVERY_RETRIES: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "detour_failover_delivery_retries_total",
        "Transient delivery failures waited out during replay"
    )
    .unwrap()
});

pub static SEGMENTS_RETIRED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "detour_failover_segments_retired_total",
        "Fully replayed segments deleted with their checkpoints"
    )
    .unwrap()
});

pub static SEGMENTS_IN_FLIGHT: LazyLock<IntGauge> = LazyLock::new(|| {
    register_int_gauge!(
        "detour_failover_segments_in_flight",
        "Segments queued or being replayed"
    )
    .unwrap()
});
