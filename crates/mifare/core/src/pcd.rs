//! Reader (PCD) trait consumed by the workflow
//!
//! A PCD backend is responsible for getting frames to and from the card:
//! polling, anticollision, the Crypto1 handshake and the MIFARE read/write
//! commands. It has no knowledge of the workflow that sequences them.

use std::fmt;

use tracing::{debug, trace};

use crate::Result;
use crate::block::{DataBlock, ReadBuffer};
use crate::key::{KeyType, MifareKey};
use crate::picc::CardIdentity;
use crate::sector::BlockAddress;
use crate::status::StatusCode;

/// Trait for proximity coupling devices
///
/// Every operation is a provided method that traces the call and delegates
/// to the matching `do_*` method, which is what backends implement.
pub trait Pcd: fmt::Debug {
    /// One-time reader bring-up
    ///
    /// Failure is fatal: nothing can run without a working reader.
    fn init(&mut self) -> Result<()> {
        debug!("Initialising PCD");
        let result = self.do_init();
        if let Err(e) = &result {
            debug!(error = ?e, "PCD initialisation failed");
        }
        result
    }

    /// Internal implementation of [`Pcd::init`]
    fn do_init(&mut self) -> Result<()>;

    /// Non-blocking check for a new card in the field
    ///
    /// `false` is the idle case, not an error.
    fn poll_for_card(&mut self) -> bool {
        let present = self.do_poll_for_card();
        trace!(present, "Polled for card");
        present
    }

    /// Internal implementation of [`Pcd::poll_for_card`]
    fn do_poll_for_card(&mut self) -> bool;

    /// Run anticollision and select the card
    ///
    /// `None` when the card left the field mid-sequence.
    fn select_card(&mut self) -> Option<CardIdentity> {
        let identity = self.do_select_card();
        match &identity {
            Some(identity) => {
                debug!(uid = %identity.uid(), sak = identity.sak(), "Selected card");
            }
            None => debug!("Card selection failed"),
        }
        identity
    }

    /// Internal implementation of [`Pcd::select_card`]
    fn do_select_card(&mut self) -> Option<CardIdentity>;

    /// Three-pass authentication of the sector holding `block`
    fn authenticate(
        &mut self,
        key_type: KeyType,
        block: BlockAddress,
        key: &MifareKey,
        identity: &CardIdentity,
    ) -> StatusCode {
        trace!(%key_type, block, "Authenticating");
        let status = self.do_authenticate(key_type, block, key, identity);
        trace!(%status, "Authentication finished");
        status
    }

    /// Internal implementation of [`Pcd::authenticate`]
    fn do_authenticate(
        &mut self,
        key_type: KeyType,
        block: BlockAddress,
        key: &MifareKey,
        identity: &CardIdentity,
    ) -> StatusCode;

    /// Read one block into a fresh 18-byte buffer
    fn read_block(&mut self, block: BlockAddress) -> (StatusCode, ReadBuffer) {
        let mut buffer = ReadBuffer::new();
        let status = self.do_read_block(block, &mut buffer);
        trace!(block, %status, usable_len = buffer.usable_len(), "Read block");
        (status, buffer)
    }

    /// Internal implementation of [`Pcd::read_block`]
    fn do_read_block(&mut self, block: BlockAddress, buffer: &mut ReadBuffer) -> StatusCode;

    /// Write exactly 16 bytes to one block
    fn write_block(&mut self, block: BlockAddress, data: &DataBlock) -> StatusCode {
        trace!(block, data = %data, "Writing block");
        let status = self.do_write_block(block, data);
        trace!(block, %status, "Wrote block");
        status
    }

    /// Internal implementation of [`Pcd::write_block`]
    fn do_write_block(&mut self, block: BlockAddress, data: &DataBlock) -> StatusCode;

    /// Put the selected card into the HALT state
    fn halt(&mut self) -> StatusCode {
        let status = self.do_halt();
        trace!(%status, "Halted card");
        status
    }

    /// Internal implementation of [`Pcd::halt`]
    fn do_halt(&mut self) -> StatusCode;

    /// Leave the Crypto1 session on the reader side
    fn stop_crypto(&mut self) {
        self.do_stop_crypto();
        trace!("Stopped crypto session");
    }

    /// Internal implementation of [`Pcd::stop_crypto`]
    fn do_stop_crypto(&mut self);
}

#[cfg(test)]
pub(crate) use mock::{MockPcd, PcdCall};


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provided_methods_delegate() {
        let mut pcd = MockPcd::with_card();
        pcd.init().unwrap();
        assert!(pcd.poll_for_card());

        let identity = pcd.select_card().unwrap();
        assert_eq!(identity.sak(), 0x08);

        let key = MifareKey::default();
        assert_eq!(pcd.authenticate(KeyType::A, 7, &key, &identity), StatusCode::Ok);

        let data = DataBlock::new([7; 16]);
        assert_eq!(pcd.write_block(4, &data), StatusCode::Ok);
        let (status, buffer) = pcd.read_block(4);
        assert_eq!(status, StatusCode::Ok);
        assert_eq!(buffer.data_block(), Some(data));

        assert_eq!(pcd.halt(), StatusCode::Ok);
        pcd.stop_crypto();

        assert_eq!(
            pcd.calls,
            vec![
                PcdCall::Init,
                PcdCall::Poll,
                PcdCall::Select,
                PcdCall::Authenticate(KeyType::A, 7),
                PcdCall::Write(4),
                PcdCall::Read(4),
                PcdCall::Halt,
                PcdCall::StopCrypto,
            ]
        );
    }

    #[test]
    fn test_failed_read_leaves_buffer_empty() {
        let mut pcd = MockPcd::with_card();
        pcd.read_results.push_back(StatusCode::Timeout);
        let (status, buffer) = pcd.read_block(4);
        assert_eq!(status, StatusCode::Timeout);
        assert_eq!(buffer.usable_len(), 0);
    }
}
