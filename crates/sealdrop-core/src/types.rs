use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

/// 1-based sequential identifier of a piece within a split payload.
///
/// Ordering is numeric, so piece 10 sorts after piece 9. On the wire a
/// piece id is a decimal string (`"1"`, `"2"`, ...); parsing is strict and
/// rejects `"0"`, signs, whitespace, and leading zeros.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PieceId(NonZeroU32);

impl PieceId {
    /// Returns `None` for 0.
    pub fn new(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(Self)
    }

    pub fn first() -> Self {
        Self(NonZeroU32::MIN)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// The id that follows this one, or `None` on overflow.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for PieceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePieceIdError(String);

impl fmt::Display for ParsePieceIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid piece id {:?}", self.0)
    }
}

impl std::error::Error for ParsePieceIdError {}

impl FromStr for PieceId {
    type Err = ParsePieceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsePieceIdError(s.to_string());
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) || s.starts_with('0') {
            return Err(err());
        }
        s.parse::<u32>()
            .ok()
            .and_then(PieceId::new)
            .ok_or_else(err)
    }
}

impl Serialize for PieceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PieceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PieceIdVisitor;

        impl de::Visitor<'_> for PieceIdVisitor {
            type Value = PieceId;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a positive decimal piece id string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<PieceId, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(PieceIdVisitor)
    }
}
