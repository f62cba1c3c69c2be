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

//! On-disk naming.
//!
//! For an active log at `{base}`:
//! - sealed segments are `{base}.{unix_seconds}`,
//! - a segment's checkpoint is `{segment}.tmp`,
//! - the replay instance lock is `{base}.lock`.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use snafu::ResultExt;

use crate::{Result, error::ReadDirSnafu};

pub const CHECKPOINT_SUFFIX: &str = "tmp";
pub const LOCK_SUFFIX: &str = "lock";
pub const PARTIAL_SUFFIX: &str = "part";

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Returns `{base}.{unix_seconds}`.
#[must_use]
pub fn segment_path(base: &Path, unix_seconds: i64) -> PathBuf {
    with_suffix(base, &unix_seconds.to_string())
}

/// Returns `{segment}.tmp`.
#[must_use]
pub fn checkpoint_path(segment: &Path) -> PathBuf { with_suffix(segment, CHECKPOINT_SUFFIX) }

/// Returns `{segment}.part`, where a rotation copies before the segment
/// becomes visible under its final name.
#[must_use]
pub fn partial_path(segment: &Path) -> PathBuf { with_suffix(segment, PARTIAL_SUFFIX) }

/// Returns `{base}.lock`.
#[must_use]
pub fn lock_path(base: &Path) -> PathBuf { with_suffix(base, LOCK_SUFFIX) }

/// Parses the timestamp of a segment file name belonging to `base_name`.
///
/// Only `{base_name}.{digits}` matches; checkpoints, the lock file and any
/// other sibling return `None`.
#[must_use]
pub fn segment_timestamp(base_name: &str, file_name: &str) -> Option<i64> {
    let digits = file_name.strip_prefix(base_name)?.strip_prefix('.')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Lists the sealed segments of `base`, oldest first.
pub fn scan_segments(base: &Path) -> Result<Vec<PathBuf>> {
    let Some(base_name) = base.file_name().and_then(|n| n.to_str()) else {
        return Ok(Vec::new());
    };
    let parent = base.parent().unwrap_or_else(|| Path::new(""));
    let dir = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };

    let mut segments = Vec::new();
    for entry in std::fs::read_dir(dir).context(ReadDirSnafu { path: dir })? {
        let entry = entry.context(ReadDirSnafu { path: dir })?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if let Some(ts) = segment_timestamp(base_name, name) {
            segments.push((ts, parent.join(name)));
        }
    }

    segments.sort();
    Ok(segments.into_iter().map(|(_, path)| path).collect())
}
