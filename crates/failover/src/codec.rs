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

//! One event per line: the payload is serialized with a [`RecordFormat`],
//! then base64 encoded so the line never contains a newline.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::{ResultExt, Snafu};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CodecError {
    #[snafu(display("record is not valid base64"))]
    Base64 { source: base64::DecodeError },

    #[snafu(display("invalid json payload"))]
    Json { source: serde_json::Error },

    #[snafu(display("invalid msgpack payload"))]
    MsgPackDecode { source: rmp_serde::decode::Error },

    #[snafu(display("payload cannot be written as msgpack"))]
    MsgPackEncode { source: rmp_serde::encode::Error },
}

/// Serialization of a payload inside the base64 framing.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RecordFormat {
    #[default]
    Json,
    #[serde(alias = "messagepack")]
    #[strum(to_string = "msgpack", serialize = "messagepack")]
    MsgPack,
}

impl RecordFormat {
    /// Encodes `payload` as a single line, without the trailing newline.
    pub fn encode(self, payload: &Value) -> Result<String, CodecError> {
        let bytes = match self {
            RecordFormat::Json => serde_json::to_vec(payload).context(JsonSnafu)?,
            RecordFormat::MsgPack => rmp_serde::to_vec_named(payload).context(MsgPackEncodeSnafu)?,
        };
        Ok(STANDARD.encode(bytes))
    }

    /// Decodes one line. Surrounding whitespace, including a trailing
    /// `\r\n`, is ignored.
    pub fn decode(self, line: &str) -> Result<Value, CodecError> {
        let bytes = STANDARD.decode(line.trim()).context(Base64Snafu)?;
        match self {
            RecordFormat::Json => serde_json::from_slice(&bytes).context(JsonSnafu),
            RecordFormat::MsgPack => rmp_serde::from_slice(&bytes).context(MsgPackDecodeSnafu),
        }
    }
}
