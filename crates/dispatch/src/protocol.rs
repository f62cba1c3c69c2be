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

//! Line-delimited JSON framing shared by the TCP transport and receiver.
//!
//! ```text
//! -> {"method":"send_event","params":{...}}
//! <- {"status":"ok"}
//! <- {"status":"rejected","reason":"..."}
//! <- {"status":"error","reason":"..."}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const SEND_EVENT: &str = "send_event";

#[derive(Debug, Serialize)]
pub struct OutgoingRequest<'a> {
    pub method: &'a str,
    pub params: &'a Value,
}

#[derive(Debug, Deserialize)]
pub struct IncomingRequest {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// A receiver's answer to one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Reply {
    Ok,
    /// The event will never be accepted. The sender must not retry it.
    Rejected { reason: String },
    /// The receiver failed to process the event. Retrying may succeed.
    Error { reason: String },
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    #[test_case(Reply::Ok, r#"{"status":"ok"}"#; "ok")]
    #[test_case(Reply::Rejected { reason: "schema".into() }, r#"{"status":"rejected","reason":"schema"}"#; "rejected")]
    #[test_case(Reply::Error { reason: "busy".into() }, r#"{"status":"error","reason":"busy"}"#; "error")]
    fn test_reply_wire_form(reply: Reply, wire: &str) {
        assert_eq!(serde_json::to_string(&reply).unwrap(), wire);
        assert_eq!(serde_json::from_str::<Reply>(wire).unwrap(), reply);
    }

    #[test]
    fn test_request_wire_form() {
        let params = json!({"user": "u1"});
        let line = serde_json::to_string(&OutgoingRequest {
            method: SEND_EVENT,
            params: &params,
        })
        .unwrap();
        assert_eq!(line, r#"{"method":"send_event","params":{"user":"u1"}}"#);

        let parsed: IncomingRequest = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.method, SEND_EVENT);
        assert_eq!(parsed.params, params);
    }
}
