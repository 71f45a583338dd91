//! Duration units and conversions between them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A time unit that durations are normalized to.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum DurationUnit {
    /// Nanoseconds (`ns`).
    #[serde(rename = "ns")]
    Nanoseconds,
    /// Microseconds (`us`).
    #[serde(rename = "us")]
    Microseconds,
    /// Milliseconds (`ms`), the default.
    #[default]
    #[serde(rename = "ms")]
    Milliseconds,
    /// Seconds (`s`).
    #[serde(rename = "s")]
    Seconds,
}

impl DurationUnit {
    /// Number of nanoseconds in one of this unit.
    pub fn nanos(self) -> f64 {
        match self {
            DurationUnit::Nanoseconds => 1.0,
            DurationUnit::Microseconds => 1_000.0,
            DurationUnit::Milliseconds => 1_000_000.0,
            DurationUnit::Seconds => 1_000_000_000.0,
        }
    }

    /// Converts `value`, given in `from`, into this unit.
    pub fn convert(self, value: f64, from: DurationUnit) -> f64 {
        if self == from {
            return value;
        }
        value * from.nanos() / self.nanos()
    }

    /// The short name accepted on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            DurationUnit::Nanoseconds => "ns",
            DurationUnit::Microseconds => "us",
            DurationUnit::Milliseconds => "ms",
            DurationUnit::Seconds => "s",
        }
    }

    /// The label used in reports and axis titles.
    pub fn label(self) -> &'static str {
        match self {
            DurationUnit::Microseconds => "µs",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for DurationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned for unit names outside of `ns`, `us`, `ms` and `s`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported unit `{0}`, expected one of ns, us, ms, s")]
pub struct ParseUnitError(String);

impl FromStr for DurationUnit {
    type Err = ParseUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ns" => Ok(DurationUnit::Nanoseconds),
            "us" | "µs" => Ok(DurationUnit::Microseconds),
            "ms" => Ok(DurationUnit::Milliseconds),
            "s" => Ok(DurationUnit::Seconds),
            other => Err(ParseUnitError(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_nanos() {
        assert_eq!(
            DurationUnit::Milliseconds.convert(1_000_000.0, DurationUnit::Nanoseconds),
            1.0
        );
        assert_eq!(
            DurationUnit::Seconds.convert(1_000_000.0, DurationUnit::Nanoseconds),
            0.001
        );
        assert_eq!(
            DurationUnit::Microseconds.convert(1_000_000.0, DurationUnit::Nanoseconds),
            1_000.0
        );
    }

    #[test]
    fn converts_millis() {
        assert_eq!(
            DurationUnit::Nanoseconds.convert(12.0, DurationUnit::Milliseconds),
            12_000_000.0
        );
        assert_eq!(
            DurationUnit::Milliseconds.convert(12.5, DurationUnit::Milliseconds),
            12.5
        );
    }

    #[test]
    fn parses_cli_names() {
        assert_eq!("us".parse(), Ok(DurationUnit::Microseconds));
        assert_eq!("s".parse(), Ok(DurationUnit::Seconds));
        assert_eq!("µs".parse(), Ok(DurationUnit::Microseconds));
        assert_eq!(DurationUnit::default(), DurationUnit::Milliseconds);
    }

    #[test]
    fn rejects_unknown_names() {
        let error = "min".parse::<DurationUnit>().unwrap_err();
        assert_eq!(
            error.to_string(),
            "unsupported unit `min`, expected one of ns, us, ms, s"
        );
    }
}
