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

//! Delivery of replayed records to a pool of receivers.
//!
//! A [`Dispatcher`] owns one [`Connection`] per receiver endpoint and picks
//! one at random for every record. A connection whose transport fails is
//! marked disconnected and reconnects in the background at a fixed interval;
//! sends against it fail fast in the meantime so the replayer can retry,
//! most likely against another receiver.
//!
//! The wire protocol is one JSON object per line in each direction, see
//! [`protocol`]. [`receiver::serve`] is a minimal receiver speaking it.

mod connection;
mod dispatcher;
pub mod error;
pub mod protocol;
pub mod receiver;
pub mod tcp;
mod transport;

pub use connection::Connection;
pub use dispatcher::Dispatcher;
pub use error::{Error, Result};
pub use protocol::Reply;
pub use tcp::TcpConnector;
pub use transport::{Connector, Transport};
