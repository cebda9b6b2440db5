//! Memory-quantity parsing for resource limits.
//!
//! Accepts the suffix forms users pass on the command line:
//! `"100m"`/`"100M"` (megabytes), `"1g"`, `"512k"`, `"128Mi"`, `"1Gi"`,
//! or a plain byte count.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{SkiffError, SkiffResult};

/// A memory quantity in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceQuantity(u64);

impl ResourceQuantity {
    /// Create a quantity from a raw byte count.
    #[must_use]
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Get the quantity in bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> u64 {
        self.0
    }

    /// Parse a memory quantity string.
    ///
    /// Decimal suffixes (`k`, `m`, `g`) and binary suffixes (`Ki`, `Mi`,
    /// `Gi`) are accepted, case-insensitively for the single-letter forms.
    ///
    /// # Errors
    ///
    /// Returns [`SkiffError::InvalidResourceQuantity`] for empty strings,
    /// unknown suffixes, or non-numeric values.
    pub fn parse(s: &str) -> SkiffResult<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(SkiffError::InvalidResourceQuantity {
                value: s.to_string(),
            });
        }

        let (digits, multiplier) = if let Some(d) = strip_suffix_ci(s, "ki") {
            (d, 1024)
        } else if let Some(d) = strip_suffix_ci(s, "mi") {
            (d, 1024 * 1024)
        } else if let Some(d) = strip_suffix_ci(s, "gi") {
            (d, 1024 * 1024 * 1024)
        } else if let Some(d) = strip_suffix_ci(s, "k") {
            (d, 1000)
        } else if let Some(d) = strip_suffix_ci(s, "m") {
            (d, 1000 * 1000)
        } else if let Some(d) = strip_suffix_ci(s, "g") {
            (d, 1000 * 1000 * 1000)
        } else {
            (s, 1)
        };

        let value: u64 = digits
            .parse()
            .map_err(|_| SkiffError::InvalidResourceQuantity {
                value: s.to_string(),
            })?;

        Ok(Self(value * multiplier))
    }
}

fn strip_suffix_ci<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    if s.len() < suffix.len() {
        return None;
    }
    let (head, tail) = s.split_at(s.len() - suffix.len());
    tail.eq_ignore_ascii_case(suffix).then_some(head)
}

impl FromStr for ResourceQuantity {
    type Err = SkiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ResourceQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_decimal_suffixes() {
        assert_eq!(ResourceQuantity::parse("100m").unwrap().as_bytes(), 100_000_000);
        assert_eq!(ResourceQuantity::parse("1g").unwrap().as_bytes(), 1_000_000_000);
        assert_eq!(ResourceQuantity::parse("512K").unwrap().as_bytes(), 512_000);
    }

    #[test]
    fn parse_binary_suffixes() {
        assert_eq!(ResourceQuantity::parse("128Mi").unwrap().as_bytes(), 128 * 1024 * 1024);
        assert_eq!(ResourceQuantity::parse("1Gi").unwrap().as_bytes(), 1024 * 1024 * 1024);
    }

    #[test]
    fn parse_plain_bytes() {
        assert_eq!(ResourceQuantity::parse("4096").unwrap().as_bytes(), 4096);
    }

    #[test]
    fn parse_invalid() {
        assert!(ResourceQuantity::parse("").is_err());
        assert!(ResourceQuantity::parse("abc").is_err());
        assert!(ResourceQuantity::parse("12q").is_err());
    }
}
