//! MIFARE Classic memory geometry
//!
//! Sectors 0 to 31 hold 4 blocks each. On 4K cards sectors 32 to 39 hold
//! 16 blocks each, starting at block 128. The last block of every sector is
//! its trailer (keys and access bits).

use std::fmt;
use std::ops::RangeInclusive;

/// Address of a 16-byte block on the card
pub type BlockAddress = u8;

/// Number of sectors on the largest supported card (4K)
pub const MAX_SECTORS: u8 = 40;

const SMALL_SECTORS: u8 = 32;
const SMALL_SECTOR_BLOCKS: u8 = 4;
const LARGE_SECTOR_BLOCKS: u8 = 16;
const LARGE_SECTOR_START: BlockAddress = 128;

/// Sector index on a MIFARE Classic card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Sector(u8);

impl Sector {
    /// Create a sector index, `None` when beyond the 4K layout
    pub const fn new(index: u8) -> Option<Self> {
        if index < MAX_SECTORS {
            Some(Self(index))
        } else {
            None
        }
    }

    /// Sector holding `block`
    pub const fn containing(block: BlockAddress) -> Self {
        if block < LARGE_SECTOR_START {
            Self(block / SMALL_SECTOR_BLOCKS)
        } else {
            Self(SMALL_SECTORS + (block - LARGE_SECTOR_START) / LARGE_SECTOR_BLOCKS)
        }
    }

    /// Get the sector index
    pub const fn index(self) -> u8 {
        self.0
    }

    /// Number of blocks in the sector, trailer included
    pub const fn block_count(self) -> u8 {
        if self.0 < SMALL_SECTORS {
            SMALL_SECTOR_BLOCKS
        } else {
            LARGE_SECTOR_BLOCKS
        }
    }

    /// First block of the sector
    pub const fn first_block(self) -> BlockAddress {
        if self.0 < SMALL_SECTORS {
            self.0 * SMALL_SECTOR_BLOCKS
        } else {
            LARGE_SECTOR_START + (self.0 - SMALL_SECTORS) * LARGE_SECTOR_BLOCKS
        }
    }

    /// Trailer block of the sector
    pub const fn trailer_block(self) -> BlockAddress {
        self.first_block() + (self.block_count() - 1)
    }

    /// Data block at `offset` from the start of the sector
    ///
    /// Returns `None` when the offset would land on the trailer or past it.
    pub const fn data_block(self, offset: u8) -> Option<BlockAddress> {
        if offset < self.block_count() - 1 {
            Some(self.first_block() + offset)
        } else {
            None
        }
    }

    /// Whether `block` lies inside this sector
    pub const fn contains(self, block: BlockAddress) -> bool {
        block >= self.first_block() && block <= self.trailer_block()
    }

    /// All block addresses of the sector
    pub const fn blocks(self) -> RangeInclusive<BlockAddress> {
        self.first_block()..=self.trailer_block()
    }

    /// Access-bit group (0 to 3) governing `block`
    ///
    /// In 16-block sectors each of the groups 0 to 2 covers five blocks.
    pub const fn access_group(self, block: BlockAddress) -> Option<u8> {
        if !self.contains(block) {
            return None;
        }
        if block == self.trailer_block() {
            return Some(3);
        }
        let offset = block - self.first_block();
        if self.block_count() == SMALL_SECTOR_BLOCKS {
            Some(offset)
        } else {
            Some(offset / 5)
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sector #{}", self.0)
    }
}
