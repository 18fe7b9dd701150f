//! Strongly-typed value identities.

use std::fmt;

/// A 64-bit keyed identity of a value.
///
/// Produced either from a value's address (fast, per-object) or from its
/// contents (structural). Both forms are keyed with the owning world's
/// secret, so identities are not comparable across worlds or processes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u64);

impl ValueId {
    /// The identity as little-endian bytes, for folding into other hashes.
    pub fn to_le_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl From<u64> for ValueId {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl From<ValueId> for u64 {
    fn from(v: ValueId) -> Self {
        v.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_zero_padded_hex() {
        assert_eq!(ValueId(0xab).to_string(), "00000000000000ab");
    }

    #[test]
    fn converts_both_ways() {
        let id = ValueId::from(42u64);
        assert_eq!(u64::from(id), 42);
    }
}
