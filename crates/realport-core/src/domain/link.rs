//! Link-speed configuration for the RealPort driver.
//!
//! The operator may describe the network link to the remote unit with one to
//! five comma-separated numbers:
//!
//! ```text
//! fast_rate[,fast_delay[,slow_rate[,slow_delay[,header_size]]]]
//! ```
//!
//! | # | Field         | Unit  | Valid range                   | Default              |
//! |---|---------------|-------|-------------------------------|----------------------|
//! | 1 | `fast_rate`   | bps   | `2400 ..= 9_999_999`          | required             |
//! | 2 | `fast_delay`  | ms    | `0 ..= 2399`                  | 60                   |
//! | 3 | `slow_rate`   | bps   | `600 ..= fast_rate`           | 2400                 |
//! | 4 | `slow_delay`  | ms    | `fast_delay ..= 10000`        | `max(360, fast_delay)` |
//! | 5 | `header_size` | bytes | `2 ..= 128`                   | 46                   |
//!
//! The driver uses these numbers to pace output so that a slow WAN link is
//! not flooded.  The decoded [`LinkConfig`] is pushed to the device once at
//! startup, before the first connection attempt, and never changes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest accepted fast link rate (inclusive).
pub const FAST_RATE_MIN: u32 = 2400;
/// Highest accepted fast link rate (exclusive).
pub const FAST_RATE_LIMIT: u32 = 10_000_000;
/// Highest accepted fast delay (exclusive).
pub const FAST_DELAY_LIMIT: u32 = 2400;
/// Lowest accepted slow link rate (inclusive).
pub const SLOW_RATE_MIN: u32 = 600;
/// Highest accepted slow delay (inclusive).
pub const SLOW_DELAY_MAX: u32 = 10_000;
/// Smallest accepted per-packet header size (inclusive).
pub const HEADER_SIZE_MIN: u32 = 2;
/// Largest accepted per-packet header size (inclusive).
pub const HEADER_SIZE_MAX: u32 = 128;

pub const DEFAULT_FAST_DELAY: u32 = 60;
pub const DEFAULT_SLOW_RATE: u32 = 2400;
pub const DEFAULT_SLOW_DELAY: u32 = 360;
pub const DEFAULT_HEADER_SIZE: u32 = 46;

const FIELD_NAMES: [&str; 5] = [
    "fast_rate",
    "fast_delay",
    "slow_rate",
    "slow_delay",
    "header_size",
];

/// Errors produced while decoding a link configuration.
///
/// Every variant that concerns a single field carries the 1-based `index`
/// of that field so the operator can tell which number was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkConfigError {
    /// Fewer than one or more than five fields were supplied.
    #[error("link configuration takes 1 to 5 comma-separated fields, got {0}")]
    FieldCount(usize),

    /// A field is not an unsigned integer.
    #[error("link field {index} ({name}) is not a number: {text:?}")]
    NotANumber {
        index: usize,
        name: &'static str,
        text: String,
    },

    /// A field is outside its accepted range.
    #[error("link field {index} ({name}) = {value} is outside {min}..={max}")]
    OutOfRange {
        index: usize,
        name: &'static str,
        value: u32,
        min: u32,
        max: u32,
    },
}

impl LinkConfigError {
    /// Returns the 1-based index of the offending field, if the error is
    /// about a single field.
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::FieldCount(_) => None,
            Self::NotANumber { index, .. } | Self::OutOfRange { index, .. } => Some(*index),
        }
    }
}

/// Validated link-speed parameters for the RealPort driver.
///
/// Construct with [`LinkConfig::new`], [`LinkConfig::from_fields`] or by
/// parsing a comma-separated string.  All constructors validate; an invalid
/// value never produces a `LinkConfig`.
///
/// # Example
///
/// ```rust
/// use realport_core::LinkConfig;
///
/// let link: LinkConfig = "9600".parse().unwrap();
/// assert_eq!(link.slow_rate(), 2400);
/// assert_eq!(link.header_size(), 46);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LinkConfig {
    fast_rate: u32,
    fast_delay: u32,
    slow_rate: u32,
    slow_delay: u32,
    header_size: u32,
}

impl LinkConfig {
    /// Builds a configuration from all five fields, validating each.
    ///
    /// # Errors
    ///
    /// Returns [`LinkConfigError::OutOfRange`] for the first field (in field
    /// order) that is outside its range.
    pub fn new(
        fast_rate: u32,
        fast_delay: u32,
        slow_rate: u32,
        slow_delay: u32,
        header_size: u32,
    ) -> Result<Self, LinkConfigError> {
        check(1, fast_rate, FAST_RATE_MIN, FAST_RATE_LIMIT - 1)?;
        check(2, fast_delay, 0, FAST_DELAY_LIMIT - 1)?;
        check(3, slow_rate, SLOW_RATE_MIN, fast_rate)?;
        check(4, slow_delay, fast_delay, SLOW_DELAY_MAX)?;
        check(5, header_size, HEADER_SIZE_MIN, HEADER_SIZE_MAX)?;

        Ok(Self {
            fast_rate,
            fast_delay,
            slow_rate,
            slow_delay,
            header_size,
        })
    }

    /// Builds a configuration from one to five leading fields, filling the
    /// missing trailing fields with their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`LinkConfigError::FieldCount`] when `fields` is empty or has
    /// more than five entries, otherwise the same errors as [`LinkConfig::new`].
    pub fn from_fields(fields: &[u32]) -> Result<Self, LinkConfigError> {
        if fields.is_empty() || fields.len() > FIELD_NAMES.len() {
            return Err(LinkConfigError::FieldCount(fields.len()));
        }

        let fast_rate = fields[0];
        let fast_delay = fields.get(1).copied().unwrap_or(DEFAULT_FAST_DELAY);
        let slow_rate = fields.get(2).copied().unwrap_or(DEFAULT_SLOW_RATE);
        // The default slow delay may never undercut an explicit fast delay.
        let slow_delay = fields
            .get(3)
            .copied()
            .unwrap_or_else(|| DEFAULT_SLOW_DELAY.max(fast_delay));
        let header_size = fields.get(4).copied().unwrap_or(DEFAULT_HEADER_SIZE);

        Self::new(fast_rate, fast_delay, slow_rate, slow_delay, header_size)
    }

    /// Fast link rate in bits per second.
    pub fn fast_rate(&self) -> u32 {
        self.fast_rate
    }

    /// Fast link delay in milliseconds.
    pub fn fast_delay(&self) -> u32 {
        self.fast_delay
    }

    /// Slow link rate in bits per second.
    pub fn slow_rate(&self) -> u32 {
        self.slow_rate
    }

    /// Slow link delay in milliseconds.
    pub fn slow_delay(&self) -> u32 {
        self.slow_delay
    }

    /// Per-packet protocol header size in bytes.
    pub fn header_size(&self) -> u32 {
        self.header_size
    }

    /// Returns the five fields in wire order.
    pub fn fields(&self) -> [u32; 5] {
        [
            self.fast_rate,
            self.fast_delay,
            self.slow_rate,
            self.slow_delay,
            self.header_size,
        ]
    }
}

fn check(index: usize, value: u32, min: u32, max: u32) -> Result<(), LinkConfigError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(LinkConfigError::OutOfRange {
            index,
            name: FIELD_NAMES[index - 1],
            value,
            min,
            max,
        })
    }
}

impl FromStr for LinkConfig {
    type Err = LinkConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(LinkConfigError::FieldCount(0));
        }

        let parts: Vec<&str> = trimmed.split(',').map(str::trim).collect();
        if parts.len() > FIELD_NAMES.len() {
            return Err(LinkConfigError::FieldCount(parts.len()));
        }

        let mut fields = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let value = part.parse::<u32>().map_err(|_| LinkConfigError::NotANumber {
                index: i + 1,
                name: FIELD_NAMES[i],
                text: (*part).to_string(),
            })?;
            fields.push(value);
        }

        Self::from_fields(&fields)
    }
}

impl fmt::Display for LinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{}",
            self.fast_rate, self.fast_delay, self.slow_rate, self.slow_delay, self.header_size
        )
    }
}

impl TryFrom<String> for LinkConfig {
    type Error = LinkConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LinkConfig> for String {
    fn from(value: LinkConfig) -> Self {
        value.to_string()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
