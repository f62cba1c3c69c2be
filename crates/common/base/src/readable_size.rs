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

//! Human readable byte sizes for configuration values.

use std::{fmt, str::FromStr};

use derive_more::{Add, From, Into};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use snafu::{OptionExt, ResultExt, Snafu};

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;
const GIB: u64 = MIB * 1024;

#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum ParseSizeError {
    #[snafu(display("size string is empty"))]
    Empty,
    #[snafu(display("invalid number in size {input:?}"))]
    InvalidNumber {
        input:  String,
        source: std::num::ParseIntError,
    },
    #[snafu(display("unknown size unit {unit:?}"))]
    UnknownUnit { unit: String },
    #[snafu(display("size {input:?} overflows u64"))]
    Overflow { input: String },
}

/// A byte count that reads and writes as `"512KiB"`, `"1MiB"` or a plain
/// integer.
///
/// `KB`/`MB`/`GB` are accepted as binary aliases.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, From, Into, Add)]
pub struct ReadableSize(pub u64);

impl ReadableSize {
    #[must_use]
    pub const fn kb(count: u64) -> Self { ReadableSize(count * KIB) }

    #[must_use]
    pub const fn mb(count: u64) -> Self { ReadableSize(count * MIB) }

    #[must_use]
    pub const fn gb(count: u64) -> Self { ReadableSize(count * GIB) }

    #[must_use]
    pub const fn as_bytes(self) -> u64 { self.0 }
}

impl fmt::Display for ReadableSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.0;
        if n == 0 {
            write!(f, "0B")
        } else if n % GIB == 0 {
            write!(f, "{}GiB", n / GIB)
        } else if n % MIB == 0 {
            write!(f, "{}MiB", n / MIB)
        } else if n % KIB == 0 {
            write!(f, "{}KiB", n / KIB)
        } else {
            write!(f, "{n}B")
        }
    }
}

impl FromStr for ReadableSize {
    type Err = ParseSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        snafu::ensure!(!s.is_empty(), EmptySnafu);

        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (digits, unit) = s.split_at(split);
        let count: u64 = digits.parse().context(InvalidNumberSnafu { input: s })?;
        let multiplier = match unit.trim().to_ascii_uppercase().as_str() {
            "" | "B" => 1,
            "K" | "KB" | "KIB" => KIB,
            "M" | "MB" | "MIB" => MIB,
            "G" | "GB" | "GIB" => GIB,
            other => return UnknownUnitSnafu { unit: other }.fail(),
        };
        count
            .checked_mul(multiplier)
            .map(ReadableSize)
            .context(OverflowSnafu { input: s })
    }
}

impl Serialize for ReadableSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ReadableSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SizeVisitor;

        impl de::Visitor<'_> for SizeVisitor {
            type Value = ReadableSize;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a byte count or a size string like \"1MiB\"")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(ReadableSize(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                u64::try_from(v)
                    .map(ReadableSize)
                    .map_err(|_| E::custom("size must not be negative"))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(SizeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_units() {
        assert_eq!("1048576".parse::<ReadableSize>(), Ok(ReadableSize::mb(1)));
        assert_eq!("1MiB".parse::<ReadableSize>(), Ok(ReadableSize::mb(1)));
        assert_eq!("512kb".parse::<ReadableSize>(), Ok(ReadableSize::kb(512)));
        assert_eq!("2 GB".parse::<ReadableSize>(), Ok(ReadableSize::gb(2)));
        assert!(matches!(
            "3XB".parse::<ReadableSize>(),
            Err(ParseSizeError::UnknownUnit { .. })
        ));
        assert_eq!("".parse::<ReadableSize>(), Err(ParseSizeError::Empty));
    }

    #[test]
    fn displays_largest_exact_unit() {
        assert_eq!(ReadableSize::mb(1).to_string(), "1MiB");
        assert_eq!(ReadableSize(1500).to_string(), "1500B");
        assert_eq!(ReadableSize::kb(3).to_string(), "3KiB");
    }

    #[test]
    fn deserializes_numbers_and_strings() {
        let from_str: ReadableSize = serde_json::from_str("\"4KiB\"").unwrap();
        let from_int: ReadableSize = serde_json::from_str("4096").unwrap();
        assert_eq!(from_str, from_int);
    }
}
