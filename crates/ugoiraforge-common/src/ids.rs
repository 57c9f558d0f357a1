//! Typed identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Numeric identifier of a pixiv artwork.
///
/// Parsing accepts decimal digits only and normalizes leading zeros away, so
/// `"00123"` and `"123"` name the same artwork and share cache entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtworkId(u64);

impl ArtworkId {
    /// Wrap a raw numeric id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for ArtworkId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl FromStr for ArtworkId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::invalid_input(format!("not a numeric artwork id: {s:?}")));
        }
        s.parse::<u64>()
            .map(Self)
            .map_err(|e| Error::invalid_input(format!("artwork id {s:?} out of range: {e}")))
    }
}

impl fmt::Display for ArtworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_strips_leading_zeros() {
        let id: ArtworkId = "000123".parse().unwrap();
        assert_eq!(id, ArtworkId::new(123));
        assert_eq!(id.to_string(), "123");
    }

    #[test]
    fn parse_rejects_non_digits() {
        assert!("".parse::<ArtworkId>().is_err());
        assert!("12a".parse::<ArtworkId>().is_err());
        assert!("-5".parse::<ArtworkId>().is_err());
        assert!("1.5".parse::<ArtworkId>().is_err());
        assert!(" 12".parse::<ArtworkId>().is_err());
    }

    #[test]
    fn parse_rejects_overflow() {
        assert!("99999999999999999999999".parse::<ArtworkId>().is_err());
    }

    #[test]
    fn serde_transparent() {
        let json = serde_json::to_string(&ArtworkId::new(42)).unwrap();
        assert_eq!(json, "42");
        let back: ArtworkId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get(), 42);
    }
}
