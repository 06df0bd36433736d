//! Fixed-size block buffers
//!
//! A data block is exactly 16 bytes. Reads hand back an 18-byte buffer: the
//! block followed by its CRC_A, together with the number of usable bytes.

use std::fmt;

/// Size of a data block
pub const BLOCK_SIZE: usize = 16;

/// Size of the CRC_A trailer appended to card frames
pub const CRC_SIZE: usize = 2;

/// Capacity required for a block read
pub const READ_BUFFER_SIZE: usize = BLOCK_SIZE + CRC_SIZE;

/// Compute the ISO/IEC 14443-3 CRC_A of `data`, low byte first
pub fn crc_a(data: &[u8]) -> [u8; CRC_SIZE] {
    let mut crc: u16 = 0x6363;
    for &byte in data {
        let mut ch = byte ^ (crc as u8);
        ch ^= ch << 4;
        let ch = u16::from(ch);
        crc = (crc >> 8) ^ (ch << 8) ^ (ch << 3) ^ (ch >> 4);
    }
    crc.to_le_bytes()
}

/// Exactly 16 bytes of block payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DataBlock([u8; BLOCK_SIZE]);

impl DataBlock {
    /// Create a block from its bytes
    pub const fn new(bytes: [u8; BLOCK_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create a block from a slice, `None` unless it is exactly 16 bytes
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        bytes.try_into().ok().map(Self)
    }

    /// Get the block bytes
    pub const fn as_bytes(&self) -> &[u8; BLOCK_SIZE] {
        &self.0
    }

    /// Number of positions where `self` and `other` hold the same byte
    pub fn matching_bytes(&self, other: &Self) -> u8 {
        self.0
            .iter()
            .zip(other.0.iter())
            .filter(|(a, b)| a == b)
            .count() as u8
    }
}

impl From<[u8; BLOCK_SIZE]> for DataBlock {
    fn from(bytes: [u8; BLOCK_SIZE]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for DataBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

/// Buffer for a block read: payload plus CRC_A trailer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadBuffer {
    bytes: [u8; READ_BUFFER_SIZE],
    usable_len: usize,
}

impl ReadBuffer {
    /// Create an empty buffer
    pub const fn new() -> Self {
        Self {
            bytes: [0; READ_BUFFER_SIZE],
            usable_len: 0,
        }
    }

    /// Fill the buffer with `block` and its computed CRC_A
    ///
    /// Used by readers that strip the CRC before handing the frame over.
    pub fn fill(&mut self, block: &DataBlock) {
        self.bytes[..BLOCK_SIZE].copy_from_slice(block.as_bytes());
        self.bytes[BLOCK_SIZE..].copy_from_slice(&crc_a(block.as_bytes()));
        self.usable_len = BLOCK_SIZE;
    }

    /// Copy a raw frame (payload and CRC) received from the card
    ///
    /// The usable length excludes the CRC. Frames longer than the buffer are
    /// truncated and the usable length reports only what fits.
    pub fn fill_frame(&mut self, frame: &[u8]) {
        let len = frame.len().min(READ_BUFFER_SIZE);
        self.bytes[..len].copy_from_slice(&frame[..len]);
        self.usable_len = len.saturating_sub(CRC_SIZE);
    }

    /// Total capacity, trailer included
    pub const fn capacity(&self) -> usize {
        READ_BUFFER_SIZE
    }

    /// Number of payload bytes the reader reported
    pub const fn usable_len(&self) -> usize {
        self.usable_len
    }

    /// Usable payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.bytes[..self.usable_len]
    }

    /// CRC_A trailer as received
    pub fn trailer(&self) -> [u8; CRC_SIZE] {
        [self.bytes[BLOCK_SIZE], self.bytes[BLOCK_SIZE + 1]]
    }

    /// Whether the trailer matches the payload
    pub fn crc_valid(&self) -> bool {
        self.usable_len == BLOCK_SIZE && crc_a(&self.bytes[..BLOCK_SIZE]) == self.trailer()
    }

    /// The payload as a block, when a full block was read
    pub fn data_block(&self) -> Option<DataBlock> {
        DataBlock::from_slice(self.payload())
    }

    /// Raw access to all 18 bytes
    pub const fn as_bytes(&self) -> &[u8; READ_BUFFER_SIZE] {
        &self.bytes
    }
}

impl Default for ReadBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Decoded MIFARE value block
///
/// The value is stored three times (plain, inverted, plain) followed by a
/// one-byte address stored four times (plain, inverted, plain, inverted).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueBlock {
    /// Signed 32-bit value
    pub value: i32,
    /// Address byte used by backup management
    pub address: u8,
}

impl ValueBlock {
    /// Decode a value block, `None` if the redundancy checks fail
    pub fn decode(block: &DataBlock) -> Option<Self> {
        let b = block.as_bytes();
        let value = [b[0], b[1], b[2], b[3]];
        let inverted = [b[4], b[5], b[6], b[7]];
        let copy = [b[8], b[9], b[10], b[11]];

        let value_ok = value == copy && value.iter().zip(inverted).all(|(v, i)| *v == !i);
        let address_ok = b[12] == b[14] && b[13] == b[15] && b[12] == !b[13];

        (value_ok && address_ok).then(|| Self {
            value: i32::from_le_bytes(value),
            address: b[12],
        })
    }

    /// Encode into the value block layout
    pub fn encode(self) -> DataBlock {
        let v = self.value.to_le_bytes();
        let n = (!self.value).to_le_bytes();
        let a = self.address;
        DataBlock::new([
            v[0], v[1], v[2], v[3], n[0], n[1], n[2], n[3], v[0], v[1], v[2], v[3], a, !a, a, !a,
        ])
    }
}
