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

//! Per-segment replay progress.
//!
//! The checkpoint of a segment holds every segment line that has already
//! been attempted, in order. Its line count is the resume offset.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use snafu::ResultExt;
use tokio::{
    fs::{File, OpenOptions},
    io::{AsyncReadExt, AsyncWriteExt},
};

use crate::{
    Result,
    error::{OpenFileSnafu, ReadFileSnafu, WriteFileSnafu},
    path::checkpoint_path,
};

/// Counts the lines of `path`.
///
/// A missing or empty file has zero lines. A trailing line without a newline
/// still counts.
pub async fn count_lines(path: &Path) -> Result<u64> {
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e).context(OpenFileSnafu { path }),
    };

    let mut buf = vec![0u8; 64 * 1024];
    let mut lines = 0u64;
    let mut last = None;
    loop {
        let n = file.read(&mut buf).await.context(ReadFileSnafu { path })?;
        if n == 0 {
            break;
        }
        lines += buf[..n].iter().filter(|&&b| b == b'\n').count() as u64;
        last = Some(buf[n - 1]);
    }

    match last {
        Some(b) if b != b'\n' => Ok(lines + 1),
        _ => Ok(lines),
    }
}

/// Append handle on `{segment}.tmp`.
#[derive(Debug)]
pub struct Checkpoint {
    path:   PathBuf,
    file:   File,
    offset: u64,
}

impl Checkpoint {
    /// Opens (creating if needed) the checkpoint of `segment` and reads its
    /// resume offset.
    pub async fn open(segment: &Path) -> Result<Self> {
        let path = checkpoint_path(segment);
        let offset = count_lines(&path).await?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .context(OpenFileSnafu { path: &path })?;

        // A torn last line would glue itself to the next record.
        if offset > 0 && !ends_with_newline(&path).await? {
            file.write_all(b"\n")
                .await
                .context(WriteFileSnafu { path: &path })?;
        }

        Ok(Checkpoint { path, file, offset })
    }

    /// Number of segment lines already attempted.
    #[must_use]
    pub const fn offset(&self) -> u64 { self.offset }

    #[must_use]
    pub fn path(&self) -> &Path { &self.path }

    /// Records one attempted segment line. `line` must not contain the
    /// trailing newline.
    pub async fn record(&mut self, line: &[u8]) -> Result<()> {
        let mut buf = Vec::with_capacity(line.len() + 1);
        buf.extend_from_slice(line);
        buf.push(b'\n');
        self.file
            .write_all(&buf)
            .await
            .context(WriteFileSnafu { path: &self.path })?;
        self.file
            .flush()
            .await
            .context(WriteFileSnafu { path: &self.path })?;
        self.offset += 1;
        Ok(())
    }
}

async fn ends_with_newline(path: &Path) -> Result<bool> {
    use tokio::io::AsyncSeekExt;

    let mut file = File::open(path).await.context(OpenFileSnafu { path })?;
    let len = file
        .metadata()
        .await
        .context(ReadFileSnafu { path })?
        .len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(std::io::SeekFrom::Start(len - 1))
        .await
        .context(ReadFileSnafu { path })?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)
        .await
        .context(ReadFileSnafu { path })?;
    Ok(last[0] == b'\n')
}
