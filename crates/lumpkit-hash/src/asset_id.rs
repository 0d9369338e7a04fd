//! Content-derived asset identifiers

use binrw::{BinRead, BinWrite};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::HashError;

/// Content address of a serialized asset
///
/// The id is the XXH3-64 hash of the asset's serialized bytes, stored
/// little-endian on disk. The value `0` is reserved as [`AssetId::NULL`]
/// and denotes "no asset".
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[brw(little)]
pub struct AssetId(u64);

impl AssetId {
    /// Null reference sentinel
    pub const NULL: Self = Self(0);

    /// Size of an encoded id in bytes
    pub const SIZE: usize = 8;

    /// Create an asset id from its raw value
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Create an asset id by hashing serialized asset bytes
    pub fn from_data(data: &[u8]) -> Self {
        Self(xxhash_rust::xxh3::xxh3_64(data))
    }

    /// Parse an asset id from a 16 character hex string
    pub fn from_hex(hex: &str) -> Result<Self, HashError> {
        let mut bytes = [0u8; 8];
        hex::decode_to_slice(hex.trim(), &mut bytes)?;
        Ok(Self(u64::from_be_bytes(bytes)))
    }

    /// Get the raw value
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Whether this is the null sentinel
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Convert to a 16 character lowercase hex string
    pub fn to_hex(self) -> String {
        hex::encode(self.0.to_be_bytes())
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for AssetId {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s.strip_prefix("0x").unwrap_or(s);
        if digits.len() != 16 {
            return Err(HashError::InvalidAssetId(format!(
                "expected 16 hex digits, got {:?}",
                s
            )));
        }
        Self::from_hex(digits)
    }
}

impl From<u64> for AssetId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<AssetId> for u64 {
    fn from(id: AssetId) -> Self {
        id.0
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use binrw::io::Cursor;
    use binrw::{BinReaderExt, BinWriterExt};
    use proptest::prelude::*;

    #[test]
    fn test_same_bytes_same_id() {
        let a = AssetId::from_data(b"prefab: root");
        let b = AssetId::from_data(b"prefab: root");
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_bytes_different_id() {
        let a = AssetId::from_data(b"texture A");
        let b = AssetId::from_data(b"texture B");
        assert_ne!(a, b);
    }

    #[test]
    fn test_null_sentinel() {
        assert!(AssetId::NULL.is_null());
        assert!(AssetId::default().is_null());
        assert!(!AssetId::from_raw(1).is_null());
    }

    #[test]
    fn test_hex_round_trip() {
        let id = AssetId::from_raw(0xDEAD_BEEF_0123_4567);
        assert_eq!(id.to_hex(), "deadbeef01234567");
        assert_eq!(id.to_string(), "deadbeef01234567");
        assert_eq!(AssetId::from_hex("deadbeef01234567").unwrap(), id);
        assert_eq!("0xdeadbeef01234567".parse::<AssetId>().unwrap(), id);
    }

    #[test]
    fn test_parse_rejects_short_strings() {
        assert!("abc".parse::<AssetId>().is_err());
        assert!("zzzzzzzzzzzzzzzz".parse::<AssetId>().is_err());
    }

    #[test]
    fn test_little_endian_on_disk() {
        let id = AssetId::from_raw(0x0102_0304_0506_0708);
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_le(&id).unwrap();
        let bytes = cursor.into_inner();
        assert_eq!(bytes, [0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);

        let parsed: AssetId = Cursor::new(bytes).read_le().unwrap();
        assert_eq!(parsed, id);
    }

    proptest! {
        #[test]
        fn prop_hashing_is_deterministic(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            prop_assert_eq!(AssetId::from_data(&data), AssetId::from_data(&data));
        }

        #[test]
        fn prop_single_byte_flip_changes_id(
            data in proptest::collection::vec(any::<u8>(), 1..512),
            index in any::<proptest::sample::Index>(),
        ) {
            let mut flipped = data.clone();
            let i = index.index(flipped.len());
            flipped[i] ^= 0x01;
            prop_assert_ne!(AssetId::from_data(&data), AssetId::from_data(&flipped));
        }
    }
}
