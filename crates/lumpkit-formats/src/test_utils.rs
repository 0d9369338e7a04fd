//! Test utilities shared by the format and lump test modules

use crate::LumpFormat;
use std::fmt::Debug;

/// Test round-trip serialization for a format instance
///
/// Verifies that a format can be serialized and deserialized back
/// to an equivalent value, and that rebuilding the parsed value is
/// byte-identical.
pub fn test_round_trip<T>(original: &T) -> Result<(), Box<dyn std::error::Error>>
where
    T: LumpFormat + PartialEq + Debug,
{
    let data = original.build()?;
    let parsed = T::parse(&data)?;

    if original != &parsed {
        return Err(format!(
            "Round-trip verification failed:\nOriginal: {:?}\nParsed: {:?}",
            original, parsed
        )
        .into());
    }

    T::verify_round_trip(&data)
}

/// Deterministic, moderately compressible asset payload
///
/// `seed` makes payloads of the same length distinct.
pub fn asset_payload(seed: u8, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| {
            let word = (i / 16) as u8;
            word.wrapping_mul(31).wrapping_add(seed) ^ (i % 7) as u8
        })
        .collect()
}
