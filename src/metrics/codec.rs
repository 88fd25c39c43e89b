//! StatsD line format.
//!
//! ```text
//! <key>:<value>|<tag>[|@<rate>]
//! ```
//!
//! `tag` is `c` for counters and `ms` for timings. The rate suffix only
//! appears below 1.0 and always carries six fractional digits.

use std::fmt;

use super::{MetricKind, MetricSample};
use crate::error::DecodeError;

impl MetricKind {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Counter => "c",
            Self::Timing => "ms",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "c" => Some(Self::Counter),
            "ms" => Some(Self::Timing),
            _ => None,
        }
    }
}

impl fmt::Display for MetricSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}|{}", self.key, self.value, self.kind.tag())?;
        if self.sample_rate < 1.0 {
            write!(f, "|@{:.6}", self.sample_rate)?;
        }
        Ok(())
    }
}

impl MetricSample {
    /// Wire form of this sample.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Parse one line. Lines without a rate suffix get a rate of 1.0.
    pub fn parse(line: &str) -> Result<Self, DecodeError> {
        let (key, rest) = line
            .rsplit_once(':')
            .ok_or_else(|| DecodeError::MissingValue(line.to_owned()))?;

        let mut parts = rest.split('|');
        let value = parts.next().unwrap_or_default();
        let tag = parts
            .next()
            .ok_or_else(|| DecodeError::MissingType(line.to_owned()))?;

        let value = value
            .parse::<u64>()
            .map_err(|_| DecodeError::BadValue(line.to_owned()))?;
        let kind =
            MetricKind::from_tag(tag).ok_or_else(|| DecodeError::UnknownType(tag.to_owned()))?;

        let sample_rate = match (parts.next(), parts.next()) {
            (None, _) => 1.0,
            (Some(suffix), None) => suffix
                .strip_prefix('@')
                .and_then(|r| r.parse::<f64>().ok())
                .filter(|r| (0.0..=1.0).contains(r))
                .ok_or_else(|| DecodeError::BadRate(line.to_owned()))?,
            (Some(_), Some(_)) => return Err(DecodeError::BadRate(line.to_owned())),
        };

        Ok(Self {
            kind,
            key: key.to_owned(),
            value,
            sample_rate,
        })
    }
}

/// Split a datagram payload into its lines, skipping blanks.
pub fn split_datagram(payload: &str) -> impl Iterator<Item = &str> {
    payload.split('\n').filter(|l| !l.is_empty())
}
