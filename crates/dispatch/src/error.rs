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

use snafu::{Location, Snafu};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Failed to connect to {endpoint}"))]
    Connect {
        endpoint: String,
        source:   std::io::Error,
        #[snafu(implicit)]
        loc:      Location,
    },

    #[snafu(display("Timed out connecting to {endpoint}"))]
    ConnectTimeout {
        endpoint: String,
        #[snafu(implicit)]
        loc:      Location,
    },

    #[snafu(display("I/O error talking to {endpoint}"))]
    Io {
        endpoint: String,
        source:   std::io::Error,
        #[snafu(implicit)]
        loc:      Location,
    },

    #[snafu(display("{endpoint} did not reply within {timeout:?}"))]
    Timeout {
        endpoint: String,
        timeout:  std::time::Duration,
        #[snafu(implicit)]
        loc:      Location,
    },

    #[snafu(display("{endpoint} closed the connection"))]
    Closed {
        endpoint: String,
        #[snafu(implicit)]
        loc:      Location,
    },

    #[snafu(display("Malformed message from {endpoint}"))]
    Protocol {
        endpoint: String,
        source:   serde_json::Error,
        #[snafu(implicit)]
        loc:      Location,
    },

    #[snafu(display("Failed to bind receiver on {addr}"))]
    Bind {
        addr:   String,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    Location,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
