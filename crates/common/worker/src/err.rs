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

use std::fmt;

/// Result type for worker operations.
pub type WorkResult<T = ()> = std::result::Result<T, WorkError>;

/// Error severity level for worker operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// The worker logs the error and waits for the next trigger.
    Transient,
    /// The worker stops after running `on_shutdown()`.
    Fatal,
}

/// Errors returned from `on_start()`, `work()` and `on_shutdown()`.
///
/// ```rust
/// use detour_common_worker::{WorkError, WorkResult};
///
/// fn scan(dir_missing: bool) -> WorkResult {
///     if dir_missing {
///         return Err(WorkError::transient("directory not there yet"));
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct WorkError {
    severity: ErrorSeverity,
    message:  String,
    source:   Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl WorkError {
    pub fn transient(message: impl Into<String>) -> Self {
        WorkError {
            severity: ErrorSeverity::Transient,
            message:  message.into(),
            source:   None,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        WorkError {
            severity: ErrorSeverity::Fatal,
            message:  message.into(),
            source:   None,
        }
    }

    /// Wraps `source` as a transient failure.
    pub fn transient_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        WorkError {
            severity: ErrorSeverity::Transient,
            message:  message.into(),
            source:   Some(Box::new(source)),
        }
    }

    /// Wraps `source` as a fatal failure.
    pub fn fatal_with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        WorkError {
            severity: ErrorSeverity::Fatal,
            message:  message.into(),
            source:   Some(Box::new(source)),
        }
    }

    #[must_use]
    pub const fn severity(&self) -> ErrorSeverity { self.severity }

    #[must_use]
    pub fn is_fatal(&self) -> bool { self.severity == ErrorSeverity::Fatal }

    #[must_use]
    pub fn message(&self) -> &str { &self.message }
}

impl fmt::Display for WorkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            ErrorSeverity::Transient => "transient",
            ErrorSeverity::Fatal => "fatal",
        };
        match &self.source {
            Some(source) => write!(f, "[{severity}] {}: {source}", self.message),
            None => write!(f, "[{severity}] {}", self.message),
        }
    }
}

impl std::error::Error for WorkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}
