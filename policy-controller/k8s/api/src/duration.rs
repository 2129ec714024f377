//! A `time.Duration`-compatible span for CRD fields.
//!
//! Declarations written for Go controllers carry durations as strings like `"5m"` or
//! `"1h30m"`. `K8sDuration` accepts the same grammar as Go's `time.ParseDuration` and
//! renders values the way `time.Duration.String()` does, so an object read and written
//! back by this controller keeps a form Go tooling understands.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr, time::Duration};

#[derive(Copy, Clone, Default, PartialEq, Eq)]
pub struct K8sDuration {
    duration: Duration,
    is_negative: bool,
}

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("empty duration")]
    Empty,

    #[error("invalid unit {0:?}: {EXPECTED_UNITS}")]
    InvalidUnit(String),

    #[error("missing a unit: {EXPECTED_UNITS}")]
    NoUnit,

    #[error("invalid number: {0}")]
    NotANumber(#[from] std::num::ParseFloatError),

    #[error("duration out of range")]
    Overflow,
}

const EXPECTED_UNITS: &str = "expected one of 'ns', 'us', '\u{00b5}s', 'ms', 's', 'm', or 'h'";

const NANOS_PER_MICRO: u128 = 1_000;
const NANOS_PER_MILLI: u128 = 1_000_000;
const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Go durations are an `int64` count of nanoseconds.
const MAX_NANOS: u128 = i64::MAX as u128;

// === impl K8sDuration ===

impl K8sDuration {
    pub const ZERO: Self = Self {
        duration: Duration::ZERO,
        is_negative: false,
    };

    #[inline]
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.is_negative && !self.duration.is_zero()
    }

    #[inline]
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.duration.is_zero()
    }

    /// The magnitude of the span; the sign is dropped.
    #[inline]
    #[must_use]
    pub fn as_duration(&self) -> Duration {
        self.duration
    }

    fn unit(name: &str) -> Result<Duration, ParseError> {
        let base = match name {
            "ns" => Duration::from_nanos(1),
            // U+00B5 is the micro sign, U+03BC is the Greek letter mu.
            "us" | "\u{00b5}s" | "\u{03bc}s" => Duration::from_micros(1),
            "ms" => Duration::from_millis(1),
            "s" => Duration::from_secs(1),
            "m" => Duration::from_secs(60),
            "h" => Duration::from_secs(60 * 60),
            other => return Err(ParseError::InvalidUnit(other.to_string())),
        };
        Ok(base)
    }
}

impl From<Duration> for K8sDuration {
    fn from(duration: Duration) -> Self {
        Self {
            duration,
            is_negative: false,
        }
    }
}

impl From<K8sDuration> for Duration {
    fn from(d: K8sDuration) -> Self {
        d.duration
    }
}

impl FromStr for K8sDuration {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (is_negative, mut rest) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            Some(_) => (false, s),
            None => return Err(ParseError::Empty),
        };

        if rest == "0" {
            return Ok(Self {
                duration: Duration::ZERO,
                is_negative,
            });
        }
        if rest.is_empty() {
            return Err(ParseError::Empty);
        }

        let mut total = Duration::ZERO;
        while !rest.is_empty() {
            let unit_at = rest
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .ok_or(ParseError::NoUnit)?;
            let (number, tail) = rest.split_at(unit_at);
            if number.is_empty() {
                return Err(ParseError::NoUnit);
            }
            let number = number.parse::<f64>()?;

            let unit_len = tail
                .find(|c: char| c.is_ascii_digit() || c == '.')
                .unwrap_or(tail.len());
            let (unit, tail) = tail.split_at(unit_len);

            let span = Duration::try_from_secs_f64(Self::unit(unit)?.as_secs_f64() * number)
                .map_err(|_| ParseError::Overflow)?;
            total = total
                .checked_add(span)
                .filter(|d| d.as_nanos() <= MAX_NANOS)
                .ok_or(ParseError::Overflow)?;
            rest = tail;
        }

        Ok(Self {
            duration: total,
            is_negative,
        })
    }
}

/// Writes `value / 10^precision` with trailing fractional zeros removed.
fn write_scaled(f: &mut fmt::Formatter<'_>, value: u128, precision: u32) -> fmt::Result {
    let scale = 10u128.pow(precision);
    let whole = value / scale;
    let frac = value % scale;
    write!(f, "{whole}")?;
    if frac != 0 {
        let digits = format!("{frac:0width$}", width = precision as usize);
        write!(f, ".{}", digits.trim_end_matches('0'))?;
    }
    Ok(())
}

impl fmt::Display for K8sDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nanos = self.duration.as_nanos();
        if nanos == 0 {
            return f.write_str("0s");
        }
        if self.is_negative {
            f.write_str("-")?;
        }

        if nanos < NANOS_PER_MICRO {
            return write!(f, "{nanos}ns");
        }
        if nanos < NANOS_PER_MILLI {
            write_scaled(f, nanos, 3)?;
            return f.write_str("\u{00b5}s");
        }
        if nanos < NANOS_PER_SEC {
            write_scaled(f, nanos, 6)?;
            return f.write_str("ms");
        }

        let secs = self.duration.as_secs();
        let (hours, minutes) = (secs / 3600, (secs / 60) % 60);
        if hours > 0 {
            write!(f, "{hours}h")?;
        }
        if hours > 0 || minutes > 0 {
            write!(f, "{minutes}m")?;
        }
        let subsec = u128::from(secs % 60) * NANOS_PER_SEC + u128::from(self.duration.subsec_nanos());
        write_scaled(f, subsec, 9)?;
        f.write_str("s")
    }
}

impl fmt::Debug for K8sDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "K8sDuration({self})")
    }
}

impl Serialize for K8sDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for K8sDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct Visitor;
        impl de::Visitor<'_> for Visitor {
            type Value = K8sDuration;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a string in Go `time.Duration` format")
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
                value.parse().map_err(de::Error::custom)
            }
        }
        deserializer.deserialize_str(Visitor)
    }
}

impl schemars::JsonSchema for K8sDuration {
    fn schema_name() -> String {
        "K8sDuration".to_owned()
    }

    fn is_referenceable() -> bool {
        false
    }

    fn json_schema(_: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        // Not `format: duration`, which would mean ISO 8601.
        schemars::schema::SchemaObject {
            instance_type: Some(schemars::schema::InstanceType::String.into()),
            ..Default::default()
        }
        .into()
    }
}
