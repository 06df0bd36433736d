//! [`Pcd`] implementation over a PC/SC reader

use std::ffi::CString;
use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use nexum_mifare_core::{
    BlockAddress, CardIdentity, DataBlock, Error, KeyType, MifareKey, Pcd, ReadBuffer, Result,
    StatusCode, Uid,
};
use pcsc::{Attribute, Card, Context, Disposition, ReaderState, State};
use tracing::{debug, trace, warn};

use crate::atr::sak_from_atr;
use crate::commands;
use crate::config::PcscConfig;
use crate::error::PcscError;
use crate::reader::card_present;

/// Largest response a storage card command can produce
const RESPONSE_BUFFER_SIZE: usize = 258;

/// A contactless PC/SC reader driving MIFARE Classic cards
pub struct PcscPcd {
    /// PC/SC context
    context: Context,
    /// Reader name
    reader_name: CString,
    /// Configuration
    config: PcscConfig,
    /// Card connection, if established
    card: Option<Card>,
    /// Card was halted and has not left the field since
    halted: bool,
}

impl fmt::Debug for PcscPcd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscPcd")
            .field("reader_name", &self.reader_name)
            .field("has_card", &self.card.is_some())
            .field("config", &self.config)
            .field("halted", &self.halted)
            .finish()
    }
}

impl PcscPcd {
    /// Create a backend for the named reader
    pub(crate) fn new(
        context: Context,
        reader_name: &str,
        config: PcscConfig,
    ) -> core::result::Result<Self, PcscError> {
        let reader_name = CString::new(reader_name)
            .map_err(|_| PcscError::ReaderNotFound(reader_name.to_string()))?;
        Ok(Self {
            context,
            reader_name,
            config,
            card: None,
            halted: false,
        })
    }

    /// Get the reader name
    pub fn reader_name(&self) -> String {
        self.reader_name.to_string_lossy().into_owned()
    }

    /// Check if a card connection is open
    pub const fn has_card(&self) -> bool {
        self.card.is_some()
    }

    /// Get the ATR of the connected card
    pub fn atr(&self) -> core::result::Result<Vec<u8>, PcscError> {
        let card = self
            .card
            .as_ref()
            .ok_or_else(|| PcscError::NoCard(self.reader_name()))?;
        Ok(card.get_attribute_owned(Attribute::AtrString)?)
    }

    fn reader_state(&self) -> core::result::Result<State, PcscError> {
        let mut states = [ReaderState::new(self.reader_name.as_c_str(), State::UNAWARE)];
        self.context
            .get_status_change(Some(Duration::ZERO), &mut states)?;
        Ok(states[0].event_state())
    }

    fn disconnect(&mut self) {
        if let Some(card) = self.card.take() {
            if let Err((_, e)) = card.disconnect(Disposition::LeaveCard) {
                debug!(error = %e, "Disconnect failed");
            }
        }
    }

    /// Send one command and return the full response including the status word
    fn transmit(&mut self, command: &[u8]) -> core::result::Result<Bytes, PcscError> {
        let card = self
            .card
            .as_mut()
            .ok_or_else(|| PcscError::NoCard(self.reader_name.to_string_lossy().into_owned()))?;

        let mut response_buffer = [0u8; RESPONSE_BUFFER_SIZE];
        match card.transmit(command, &mut response_buffer) {
            Ok(response) => {
                trace!(response = %hex::encode_upper(response), "Reader response");
                Ok(Bytes::copy_from_slice(response))
            }
            Err(e) => {
                if matches!(e, pcsc::Error::ResetCard | pcsc::Error::RemovedCard) {
                    self.card = None;
                }
                Err(e.into())
            }
        }
    }

    /// Send one command and map the outcome to a status code
    fn exchange(&mut self, command: &[u8]) -> (StatusCode, Bytes) {
        match self.transmit(command) {
            Ok(response) => match commands::split_response(&response) {
                Some((payload, (sw1, sw2))) => {
                    let status = commands::status_from_sw(sw1, sw2);
                    (status, response.slice(..payload.len()))
                }
                None => (StatusCode::Error, Bytes::new()),
            },
            Err(e) => (status_from_error(&e), Bytes::new()),
        }
    }
}

/// Map a transport failure to the status the card would have produced
fn status_from_error(error: &PcscError) -> StatusCode {
    match error {
        PcscError::Pcsc(
            pcsc::Error::Timeout
            | pcsc::Error::UnresponsiveCard
            | pcsc::Error::RemovedCard
            | pcsc::Error::NoSmartcard,
        )
        | PcscError::NoCard(_) => StatusCode::Timeout,
        _ => StatusCode::Error,
    }
}

impl Pcd for PcscPcd {
    fn do_init(&mut self) -> Result<()> {
        let readers = self
            .context
            .list_readers_owned()
            .map_err(|e| Error::from(PcscError::from(e)))?;
        if !readers.contains(&self.reader_name) {
            return Err(PcscError::ReaderNotFound(self.reader_name()).into());
        }
        debug!(reader = %self.reader_name(), "Reader ready");
        Ok(())
    }

    fn do_poll_for_card(&mut self) -> bool {
        let state = match self.reader_state() {
            Ok(state) => state,
            Err(e) => {
                trace!(error = %e, "Reader state unavailable");
                return false;
            }
        };

        if !card_present(state) {
            if self.halted {
                debug!("Halted card left the field");
            }
            self.halted = false;
            return false;
        }
        !self.halted && self.card.is_none()
    }

    fn do_select_card(&mut self) -> Option<CardIdentity> {
        if self.card.is_none() {
            match self.context.connect(
                &self.reader_name,
                self.config.share_mode.into(),
                self.config.protocols,
            ) {
                Ok(card) => self.card = Some(card),
                Err(e) => {
                    debug!(error = %e, "Connect failed");
                    return None;
                }
            }
        }

        let (status, payload) = self.exchange(&commands::get_uid());
        let uid = match (status, Uid::from_slice(&payload)) {
            (StatusCode::Ok, Some(uid)) => uid,
            (status, _) => {
                debug!(%status, len = payload.len(), "GET UID failed");
                self.disconnect();
                return None;
            }
        };

        let sak = match self.atr() {
            Ok(atr) => sak_from_atr(&atr),
            Err(e) => {
                debug!(error = %e, "ATR unavailable");
                self.disconnect();
                return None;
            }
        };
        Some(CardIdentity::new(uid, sak))
    }

    fn do_authenticate(
        &mut self,
        key_type: KeyType,
        block: BlockAddress,
        key: &MifareKey,
        _identity: &CardIdentity,
    ) -> StatusCode {
        let slot = self.config.key_slot;

        let (status, _) = self.exchange(&commands::load_key(slot, key)[..]);
        if !status.is_ok() {
            warn!(%status, "Reader refused the key");
            return status;
        }

        self.exchange(&commands::authenticate(block, key_type, slot)).0
    }

    fn do_read_block(&mut self, block: BlockAddress, buffer: &mut ReadBuffer) -> StatusCode {
        let (status, payload) = self.exchange(&commands::read_binary(block));
        if !status.is_ok() {
            return status;
        }
        match DataBlock::from_slice(&payload) {
            Some(data) => {
                buffer.fill(&data);
                StatusCode::Ok
            }
            None => {
                debug!(block, len = payload.len(), "Unexpected block length");
                StatusCode::Error
            }
        }
    }

    fn do_write_block(&mut self, block: BlockAddress, data: &DataBlock) -> StatusCode {
        self.exchange(&commands::update_binary(block, data)).0
    }

    fn do_halt(&mut self) -> StatusCode {
        if self.card.is_none() {
            return StatusCode::Timeout;
        }
        self.disconnect();
        self.halted = true;
        StatusCode::Ok
    }

    // The reader drops the crypto session on the next authentication or disconnect
    fn do_stop_crypto(&mut self) {}
}

impl Drop for PcscPcd {
    fn drop(&mut self) {
        self.disconnect();
    }
}
