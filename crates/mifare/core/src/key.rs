//! Authentication keys
//!
//! A MIFARE Classic sector trailer holds two independent 6-byte keys. The
//! workflow uses a single [`MifareKey`] for both slots, defaulting to the
//! factory value `FF FF FF FF FF FF`.

use std::fmt;
use std::str::FromStr;

use derive_more::Display;
use zeroize::Zeroize;

use crate::{Error, Result};

/// Size of a MIFARE Classic key in bytes
pub const KEY_SIZE: usize = 6;

/// Factory default key at chip delivery
pub const DEFAULT_KEY: [u8; KEY_SIZE] = [0xFF; KEY_SIZE];

/// 6-byte Crypto1 key, wiped from memory on drop
#[derive(Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct MifareKey([u8; KEY_SIZE]);

impl MifareKey {
    /// Create a key from raw bytes
    pub const fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw key bytes
    pub const fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Uppercase hex rendering, as shown in the "Using key" banner
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    /// Whether this is the factory default key
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_KEY
    }
}

impl Default for MifareKey {
    fn default() -> Self {
        Self(DEFAULT_KEY)
    }
}

impl fmt::Debug for MifareKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MifareKey(..)")
    }
}

impl FromStr for MifareKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let mut bytes = [0u8; KEY_SIZE];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| match e {
            hex::FromHexError::InvalidHexCharacter { .. } => Error::InvalidKey("not a hex string"),
            _ => Error::InvalidKey("expected 12 hex digits"),
        })?;
        Ok(Self(bytes))
    }
}

/// Key slot used for authentication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum KeyType {
    /// Key A
    #[display("A")]
    A,
    /// Key B
    #[display("B")]
    B,
}

impl KeyType {
    /// MIFARE authentication command byte for this slot
    pub const fn command(self) -> u8 {
        match self {
            Self::A => 0x60,
            Self::B => 0x61,
        }
    }

    /// Byte range of this key inside a sector trailer
    pub const fn trailer_range(self) -> core::ops::Range<usize> {
        match self {
            Self::A => 0..KEY_SIZE,
            Self::B => 10..10 + KEY_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_key_is_factory_value() {
        let key = MifareKey::default();
        assert_eq!(key.as_bytes(), &[0xFF; 6]);
        assert!(key.is_default());
        assert_eq!(key.to_hex(), "FFFFFFFFFFFF");
    }

    #[test]
    fn test_parse_key() {
        let key: MifareKey = "a0a1a2a3a4a5".parse().unwrap();
        assert_eq!(key.as_bytes(), &[0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5]);
        assert!(!key.is_default());

        let key: MifareKey = "0xD3F7D3F7D3F7".parse().unwrap();
        assert_eq!(key.as_bytes(), &[0xD3, 0xF7, 0xD3, 0xF7, 0xD3, 0xF7]);
    }

    #[test]
    fn test_parse_key_rejects_bad_input() {
        assert_eq!(
            "FFFF".parse::<MifareKey>(),
            Err(Error::InvalidKey("expected 12 hex digits"))
        );
        assert_eq!(
            "GGGGGGGGGGGG".parse::<MifareKey>(),
            Err(Error::InvalidKey("not a hex string"))
        );
    }

    #[test]
    fn test_debug_hides_key_material() {
        assert_eq!(format!("{:?}", MifareKey::default()), "MifareKey(..)");
    }

    #[test]
    fn test_key_type_commands() {
        assert_eq!(KeyType::A.command(), 0x60);
        assert_eq!(KeyType::B.command(), 0x61);
        assert_eq!(KeyType::B.trailer_range(), 10..16);
        assert_eq!(KeyType::A.to_string(), "A");
    }
}
