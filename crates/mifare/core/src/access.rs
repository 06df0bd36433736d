//! Access conditions stored in sector trailers
//!
//! Bytes 6 to 8 of a trailer hold the C1/C2/C3 bits of the four block groups
//! together with their inverted copies.

use std::fmt;

use crate::block::DataBlock;
use crate::key::KeyType;

/// Access bits shipped on blank cards (`FF 07 80`, general purpose byte `69`)
pub const TRANSPORT_ACCESS_BITS: [u8; 4] = [0xFF, 0x07, 0x80, 0x69];

/// C1/C2/C3 bits of a single block group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessBits {
    /// Condition bit C1
    pub c1: bool,
    /// Condition bit C2
    pub c2: bool,
    /// Condition bit C3
    pub c3: bool,
}

impl AccessBits {
    /// Create from the three condition bits
    pub const fn new(c1: bool, c2: bool, c3: bool) -> Self {
        Self { c1, c2, c3 }
    }

    /// Bits packed as `C1 C2 C3` (0 to 7)
    pub const fn value(self) -> u8 {
        ((self.c1 as u8) << 2) | ((self.c2 as u8) << 1) | (self.c3 as u8)
    }

    /// Whether a data block with these bits is configured as a value block
    pub const fn is_value_block(self) -> bool {
        matches!(self.value(), 0b001 | 0b110)
    }

    /// Whether `key` may read a data block with these bits
    pub const fn data_readable_with(self, key: KeyType) -> bool {
        match self.value() {
            0b000 | 0b010 | 0b100 | 0b110 | 0b001 => true,
            0b011 | 0b101 => matches!(key, KeyType::B),
            _ => false,
        }
    }

    /// Whether `key` may write a data block with these bits
    pub const fn data_writable_with(self, key: KeyType) -> bool {
        match self.value() {
            0b000 => true,
            0b100 | 0b110 | 0b011 => matches!(key, KeyType::B),
            _ => false,
        }
    }

    /// Whether key B can be read back from a trailer with these bits
    ///
    /// When it can, the card returns it in clear on trailer reads.
    pub const fn trailer_key_b_readable(self) -> bool {
        matches!(self.value(), 0b000 | 0b010 | 0b001)
    }

    /// Whether `key` may rewrite a trailer with these bits
    pub const fn trailer_writable_with(self, key: KeyType) -> bool {
        match self.value() {
            0b001 => matches!(key, KeyType::A),
            0b011 => matches!(key, KeyType::B),
            _ => false,
        }
    }
}

impl fmt::Display for AccessBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[ {} {} {} ]",
            self.c1 as u8, self.c2 as u8, self.c3 as u8
        )
    }
}

/// Access conditions of all four groups of a sector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessConditions {
    groups: [AccessBits; 4],
    consistent: bool,
}

impl AccessConditions {
    /// Decode the three access bytes of a trailer (bytes 6, 7 and 8)
    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        let [b6, b7, b8] = bytes;
        let bit = |byte: u8, shift: u8| (byte >> shift) & 1 == 1;

        let mut groups = [AccessBits::new(false, false, false); 4];
        let mut consistent = true;
        for (g, group) in groups.iter_mut().enumerate() {
            let g = g as u8;
            *group = AccessBits::new(bit(b7, 4 + g), bit(b8, g), bit(b8, 4 + g));

            let inverted = AccessBits::new(!bit(b6, g), !bit(b6, 4 + g), !bit(b7, g));
            consistent &= inverted == *group;
        }

        Self { groups, consistent }
    }

    /// Decode the access bits held by a trailer block
    pub fn from_trailer(trailer: &DataBlock) -> Self {
        let b = trailer.as_bytes();
        Self::from_bytes([b[6], b[7], b[8]])
    }

    /// Encode four groups into trailer bytes 6 to 8
    pub fn encode(groups: [AccessBits; 4]) -> [u8; 3] {
        let mut b6 = 0u8;
        let mut b7 = 0u8;
        let mut b8 = 0u8;
        for (g, bits) in groups.iter().enumerate() {
            let (c1, c2, c3) = (bits.c1 as u8, bits.c2 as u8, bits.c3 as u8);
            b6 |= ((c1 ^ 1) << g) | ((c2 ^ 1) << (4 + g));
            b7 |= ((c3 ^ 1) << g) | (c1 << (4 + g));
            b8 |= (c2 << g) | (c3 << (4 + g));
        }
        [b6, b7, b8]
    }

    /// Bits of `group` (0 to 3, 3 being the trailer)
    pub const fn group(&self, group: u8) -> AccessBits {
        self.groups[(group & 0x03) as usize]
    }

    /// Whether the inverted copies match the plain bits
    ///
    /// A card with inconsistent access bits blocks the whole sector.
    pub const fn is_consistent(&self) -> bool {
        self.consistent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_configuration() {
        let access = AccessConditions::from_bytes([0xFF, 0x07, 0x80]);
        assert!(access.is_consistent());
        for group in 0..3 {
            assert_eq!(access.group(group).value(), 0b000);
        }
        assert_eq!(access.group(3).value(), 0b001);
        assert_eq!(access.group(3).to_string(), "[ 0 0 1 ]");
    }

    #[test]
    fn test_encode_decode() {
        let groups = [
            AccessBits::new(false, false, false),
            AccessBits::new(true, true, false),
            AccessBits::new(false, true, true),
            AccessBits::new(false, true, true),
        ];
        let bytes = AccessConditions::encode(groups);
        let access = AccessConditions::from_bytes(bytes);
        assert!(access.is_consistent());
        for (g, bits) in groups.iter().enumerate() {
            assert_eq!(access.group(g as u8), *bits);
        }
        assert_eq!(
            AccessConditions::encode([
                AccessBits::new(false, false, false),
                AccessBits::new(false, false, false),
                AccessBits::new(false, false, false),
                AccessBits::new(false, false, true),
            ]),
            [0xFF, 0x07, 0x80]
        );
    }

    #[test]
    fn test_inconsistent_bits() {
        let access = AccessConditions::from_bytes([0xFF, 0xFF, 0xFF]);
        assert!(!access.is_consistent());
    }

    #[test]
    fn test_value_block_configurations() {
        assert!(AccessBits::new(true, true, false).is_value_block());
        assert!(AccessBits::new(false, false, true).is_value_block());
        assert!(!AccessBits::new(false, false, false).is_value_block());
    }

    #[test]
    fn test_data_permissions() {
        let open = AccessBits::new(false, false, false);
        assert!(open.data_readable_with(KeyType::A));
        assert!(open.data_writable_with(KeyType::A));

        let key_b_only = AccessBits::new(false, true, true);
        assert!(!key_b_only.data_readable_with(KeyType::A));
        assert!(key_b_only.data_writable_with(KeyType::B));

        let locked = AccessBits::new(true, true, true);
        assert!(!locked.data_readable_with(KeyType::B));
        assert!(!locked.data_writable_with(KeyType::B));
    }
}
