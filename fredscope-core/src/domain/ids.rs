use serde::{Deserialize, Serialize};
use std::fmt;

/// Node identifier in the remote category tree.
///
/// Only equality and hashing matter; ids carry no ordering semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub u32);

impl CategoryId {
    /// Well-known root of the category tree.
    pub const ROOT: CategoryId = CategoryId(0);

    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl From<u32> for CategoryId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content hash of a fetched series payload (BLAKE3 hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataHash(pub String);

impl DataHash {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }
}

impl fmt::Display for DataHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_zero() {
        assert_eq!(CategoryId::ROOT, CategoryId(0));
        assert!(CategoryId::ROOT.is_root());
        assert!(!CategoryId(32991).is_root());
    }

    #[test]
    fn category_id_serializes_as_plain_integer() {
        let json = serde_json::to_string(&CategoryId(125)).unwrap();
        assert_eq!(json, "125");
        let back: CategoryId = serde_json::from_str("125").unwrap();
        assert_eq!(back, CategoryId(125));
    }

    #[test]
    fn data_hash_is_deterministic() {
        let a = DataHash::of_bytes(b"UNRATE");
        let b = DataHash::of_bytes(b"UNRATE");
        let c = DataHash::of_bytes(b"FEDFUNDS");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.0.len(), 64);
    }
}
