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

use std::path::PathBuf;

use snafu::{Location, Snafu};

use crate::codec::{CodecError, RecordFormat};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Failed to open {}", path.display()))]
    OpenFile {
        path:   PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    Location,
    },

    #[snafu(display("Failed to lock {}", path.display()))]
    LockFile {
        path:   PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    Location,
    },

    #[snafu(display("Failed to read {}", path.display()))]
    ReadFile {
        path:   PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    Location,
    },

    #[snafu(display("Failed to write {}", path.display()))]
    WriteFile {
        path:   PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    Location,
    },

    #[snafu(display("Failed to list segments in {}", path.display()))]
    ReadDir {
        path:   PathBuf,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    Location,
    },

    #[snafu(display("Failed to encode record as {format}"))]
    Encode {
        format: RecordFormat,
        source: CodecError,
        #[snafu(implicit)]
        loc:    Location,
    },

    #[snafu(display("Another process is already replaying segments of {}", path.display()))]
    AlreadyRunning {
        path: PathBuf,
        #[snafu(implicit)]
        loc:  Location,
    },

    #[snafu(display("Failover is already started"))]
    AlreadyStarted {
        #[snafu(implicit)]
        loc: Location,
    },

    #[snafu(display("Blocking rotation task failed"))]
    Join {
        source: tokio::task::JoinError,
        #[snafu(implicit)]
        loc:    Location,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
