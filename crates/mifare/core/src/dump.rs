//! Read-only sweep over all blocks of a sector
//!
//! The dump authenticates with key A, then reads the sector from its trailer
//! down to its first block so that the access bits are known before the data
//! blocks they govern are rendered. Blocks are produced lazily; the first
//! failing read ends the sweep.

use std::fmt;
use std::iter::FusedIterator;

use tracing::debug;

use crate::access::{AccessBits, AccessConditions};
use crate::auth::authenticate;
use crate::block::{DataBlock, ValueBlock};
use crate::io::read_block;
use crate::key::{KeyType, MifareKey};
use crate::pcd::Pcd;
use crate::picc::CardIdentity;
use crate::sector::{BlockAddress, Sector};
use crate::status::StatusCode;

/// One block produced by a sector dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpedBlock {
    /// Block address
    pub address: BlockAddress,
    /// Block contents
    pub data: DataBlock,
    /// Access bits of the block's group, once the trailer has been read
    pub access: Option<AccessBits>,
    /// Decoded value when the block is configured and formatted as a value block
    pub value: Option<ValueBlock>,
}

impl fmt::Display for DumpedBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>4}  {}", self.address, self.data)?;
        if let Some(access) = self.access {
            write!(f, "  {access}")?;
        }
        if let Some(value) = self.value {
            write!(f, " Value=0x{:X} Adr=0x{:X}", value.value, value.address)?;
        }
        Ok(())
    }
}

/// Lazy sector dump
///
/// Non-restartable: it borrows the reader for its whole life and yields each
/// block at most once.
#[derive(Debug)]
pub struct SectorDump<'a, P: Pcd + ?Sized> {
    pcd: &'a mut P,
    sector: Sector,
    next: Option<BlockAddress>,
    access: Option<AccessConditions>,
    status: StatusCode,
    read: Vec<BlockAddress>,
}

impl<P: Pcd + ?Sized> SectorDump<'_, P> {
    /// Sector being dumped
    pub const fn sector(&self) -> Sector {
        self.sector
    }

    /// Status that ended the sweep, [`StatusCode::Ok`] while none failed
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Addresses read successfully so far
    pub fn blocks_read(&self) -> &[BlockAddress] {
        &self.read
    }

    /// Drain the remaining blocks into a report
    pub fn into_report(mut self) -> SectorDumpReport {
        let blocks: Vec<_> = self.by_ref().collect();
        SectorDumpReport {
            sector: self.sector,
            blocks,
            status: self.status,
            access_consistent: self.access.map(|a| a.is_consistent()),
        }
    }
}

impl<P: Pcd + ?Sized> Iterator for SectorDump<'_, P> {
    type Item = DumpedBlock;

    fn next(&mut self) -> Option<Self::Item> {
        let address = self.next?;

        let read = read_block(&mut *self.pcd, address);
        let Some(data) = read.data() else {
            debug!(block = address, status = %read.status(), "Sector dump stopped");
            self.status = read.status();
            self.next = None;
            return None;
        };

        let trailer = address == self.sector.trailer_block();
        if trailer {
            self.access = Some(AccessConditions::from_trailer(&data));
        }

        let access = match (self.access, self.sector.access_group(address)) {
            (Some(conditions), Some(group)) => Some(conditions.group(group)),
            _ => None,
        };
        let value = access
            .filter(|bits| !trailer && bits.is_value_block())
            .and_then(|_| ValueBlock::decode(&data));

        self.read.push(address);
        self.next = (address != self.sector.first_block()).then(|| address - 1);

        Some(DumpedBlock {
            address,
            data,
            access,
            value,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.next {
            Some(next) => (0, Some(usize::from(next - self.sector.first_block()) + 1)),
            None => (0, Some(0)),
        }
    }
}

impl<P: Pcd + ?Sized> FusedIterator for SectorDump<'_, P> {}

/// Collected outcome of a sector dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectorDumpReport {
    /// Sector dumped
    pub sector: Sector,
    /// Blocks read, trailer first
    pub blocks: Vec<DumpedBlock>,
    /// [`StatusCode::Ok`] when every block was read, otherwise the failing status
    pub status: StatusCode,
    /// Whether the trailer's inverted access bits matched, if it was read
    pub access_consistent: Option<bool>,
}

impl SectorDumpReport {
    /// Whether every block of the sector was read
    pub const fn is_complete(&self) -> bool {
        self.status.is_ok()
    }
}

/// Authenticate with key A and start a lazy dump of `sector`
///
/// When the authentication fails the dump yields no blocks and reports the
/// authentication status.
pub fn dump_sector<'a, P: Pcd + ?Sized>(
    pcd: &'a mut P,
    identity: &CardIdentity,
    key: &MifareKey,
    sector: Sector,
) -> SectorDump<'a, P> {
    let status = authenticate(&mut *pcd, KeyType::A, sector.trailer_block(), key, identity);
    let next = status.is_ok().then(|| sector.trailer_block());
    SectorDump {
        pcd,
        sector,
        next,
        access: None,
        status,
        read: Vec::new(),
    }
}
