//! Block reads and writes
//!
//! Both operations require a prior successful authentication covering the
//! block's sector. Addresses are not checked locally: a block outside the
//! authenticated sector fails with whatever status the card returns.

use tracing::instrument;

use crate::block::{BLOCK_SIZE, DataBlock, ReadBuffer};
use crate::pcd::Pcd;
use crate::sector::BlockAddress;
use crate::status::StatusCode;

/// Result of a block read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRead {
    status: StatusCode,
    buffer: ReadBuffer,
}

impl BlockRead {
    /// Status of the read
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Whether the read succeeded
    pub const fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    /// Number of usable payload bytes reported by the reader
    pub const fn usable_len(&self) -> usize {
        self.buffer.usable_len()
    }

    /// Block contents, only when the read succeeded
    pub fn data(&self) -> Option<DataBlock> {
        if self.is_ok() {
            self.buffer.data_block()
        } else {
            None
        }
    }

    /// The raw 18-byte buffer, whatever the status
    ///
    /// Contents are undefined unless [`BlockRead::is_ok`] holds.
    pub const fn buffer(&self) -> &ReadBuffer {
        &self.buffer
    }
}

/// Read one block and check the frame
///
/// A reader reporting fewer than 16 usable bytes yields
/// [`StatusCode::Error`]; a trailer that does not match the payload yields
/// [`StatusCode::CrcWrong`].
#[instrument(level = "debug", skip(pcd))]
pub fn read_block<P: Pcd + ?Sized>(pcd: &mut P, block: BlockAddress) -> BlockRead {
    let (mut status, buffer) = pcd.read_block(block);
    if status.is_ok() {
        if buffer.usable_len() != BLOCK_SIZE {
            status = StatusCode::Error;
        } else if !buffer.crc_valid() {
            status = StatusCode::CrcWrong;
        }
    }
    status.trace("read_block");
    BlockRead { status, buffer }
}

/// Write exactly 16 bytes to one block
///
/// The previous contents are fully replaced. After a failure the stored
/// contents are undefined until read back.
#[instrument(level = "debug", skip(pcd, data))]
pub fn write_block<P: Pcd + ?Sized>(
    pcd: &mut P,
    block: BlockAddress,
    data: &DataBlock,
) -> StatusCode {
    let status = pcd.write_block(block, data);
    status.trace("write_block");
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::crc_a;
    use crate::key::MifareKey;
    use crate::picc::CardIdentity;
    use crate::pcd::MockPcd;

    #[derive(Debug)]
    struct FrameReader(Vec<u8>);

    impl Pcd for FrameReader {
        fn do_init(&mut self) -> crate::Result<()> {
            Ok(())
        }
        fn do_poll_for_card(&mut self) -> bool {
            true
        }
        fn do_select_card(&mut self) -> Option<CardIdentity> {
            None
        }
        fn do_authenticate(
            &mut self,
            _: crate::KeyType,
            _: BlockAddress,
            _: &MifareKey,
            _: &CardIdentity,
        ) -> StatusCode {
            StatusCode::Ok
        }
        fn do_read_block(&mut self, _: BlockAddress, buffer: &mut ReadBuffer) -> StatusCode {
            buffer.fill_frame(&self.0);
            StatusCode::Ok
        }
        fn do_write_block(&mut self, _: BlockAddress, _: &DataBlock) -> StatusCode {
            StatusCode::Ok
        }
        fn do_halt(&mut self) -> StatusCode {
            StatusCode::Ok
        }
        fn do_stop_crypto(&mut self) {}
    }

    #[test]
    fn test_round_trip() {
        let mut pcd = MockPcd::with_card();
        let data = DataBlock::new([0x5A; 16]);
        assert_eq!(write_block(&mut pcd, 4, &data), StatusCode::Ok);

        let read = read_block(&mut pcd, 4);
        assert!(read.is_ok());
        assert_eq!(read.usable_len(), 16);
        assert_eq!(read.data(), Some(data));
    }

    #[test]
    fn test_failed_read_hides_data() {
        let mut pcd = MockPcd::with_card();
        pcd.read_results.push_back(StatusCode::MifareNack);
        let read = read_block(&mut pcd, 4);
        assert_eq!(read.status(), StatusCode::MifareNack);
        assert_eq!(read.data(), None);
    }

    #[test]
    fn test_crc_mismatch() {
        let payload = [0x42u8; 16];
        let mut frame = payload.to_vec();
        let crc = crc_a(&payload);
        frame.extend_from_slice(&[crc[0] ^ 0x01, crc[1]]);

        let read = read_block(&mut FrameReader(frame), 4);
        assert_eq!(read.status(), StatusCode::CrcWrong);
        assert_eq!(read.data(), None);
    }

    #[test]
    fn test_short_frame() {
        let read = read_block(&mut FrameReader(vec![0x00; 6]), 4);
        assert_eq!(read.status(), StatusCode::Error);
    }

    #[test]
    fn test_valid_frame() {
        let payload = [0x24u8; 16];
        let mut frame = payload.to_vec();
        frame.extend_from_slice(&crc_a(&payload));

        let read = read_block(&mut FrameReader(frame), 4);
        assert_eq!(read.status(), StatusCode::Ok);
        assert_eq!(read.data(), Some(DataBlock::new(payload)));
    }
}
