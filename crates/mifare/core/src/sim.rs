//! Software MIFARE Classic card and reader
//!
//! [`VirtualCard`] models the memory of a Mini, 1K or 4K card: sector layout,
//! trailers with keys and access bits, and the manufacturer block.
//! [`SimulatedPcd`] drives it the way a reader chip would, including the
//! card's IDLE/ACTIVE/HALT states and per-sector authentication.
//!
//! The cipher itself is not modelled: authentication compares keys directly.

use tracing::{debug, trace};

use crate::Result;
use crate::access::{AccessConditions, TRANSPORT_ACCESS_BITS};
use crate::block::{BLOCK_SIZE, DataBlock, ReadBuffer, crc_a};
use crate::key::{DEFAULT_KEY, KEY_SIZE, KeyType, MifareKey};
use crate::pcd::Pcd;
use crate::picc::{CardIdentity, PiccType, Uid};
use crate::sector::{BlockAddress, Sector};
use crate::status::StatusCode;

/// ATQA answered by MIFARE Classic cards with a 4-byte UID
const ATQA_1K: [u8; 2] = [0x04, 0x00];
const ATQA_4K: [u8; 2] = [0x02, 0x00];

/// In-memory MIFARE Classic card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualCard {
    uid: Uid,
    sak: u8,
    blocks: Vec<DataBlock>,
}

impl VirtualCard {
    /// Create a card answering with `sak`
    ///
    /// Classic types get a blank memory in transport configuration; any
    /// other type gets no memory at all.
    pub fn with_sak(uid: Uid, sak: u8) -> Self {
        let picc_type = PiccType::from_sak(sak);
        let sectors = picc_type.sector_count().unwrap_or(0);

        let mut card = Self {
            uid,
            sak,
            blocks: Vec::new(),
        };
        for index in 0..sectors {
            let Some(sector) = Sector::new(index) else {
                break;
            };
            let data_blocks = usize::from(sector.block_count()) - 1;
            card.blocks
                .extend(std::iter::repeat_n(DataBlock::default(), data_blocks));
            card.blocks.push(transport_trailer());
        }
        if !card.blocks.is_empty() {
            card.blocks[0] = card.manufacturer_block(picc_type);
        }
        card
    }

    /// Blank MIFARE Mini
    pub fn mifare_mini(uid: Uid) -> Self {
        Self::with_sak(uid, 0x09)
    }

    /// Blank MIFARE Classic 1K
    pub fn mifare_1k(uid: Uid) -> Self {
        Self::with_sak(uid, 0x08)
    }

    /// Blank MIFARE Classic 4K
    pub fn mifare_4k(uid: Uid) -> Self {
        Self::with_sak(uid, 0x18)
    }

    fn manufacturer_block(&self, picc_type: PiccType) -> DataBlock {
        let uid = self.uid.as_bytes();
        let atqa = match picc_type {
            PiccType::Mifare4K => ATQA_4K,
            _ => ATQA_1K,
        };
        let mut bytes = [0u8; BLOCK_SIZE];
        bytes[..uid.len()].copy_from_slice(uid);
        let mut at = uid.len();
        bytes[at] = uid.iter().fold(0, |bcc, b| bcc ^ b);
        bytes[at + 1] = self.sak;
        at += 2;
        bytes[at..at + 2].copy_from_slice(&atqa);
        DataBlock::new(bytes)
    }

    /// Card UID
    pub const fn uid(&self) -> &Uid {
        &self.uid
    }

    /// SAK answered on selection
    pub const fn sak(&self) -> u8 {
        self.sak
    }

    /// Number of blocks in memory
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Raw contents of `block`, bypassing access control
    pub fn block(&self, block: BlockAddress) -> Option<&DataBlock> {
        self.blocks.get(usize::from(block))
    }

    /// Overwrite `block`, bypassing access control
    pub fn set_block(&mut self, block: BlockAddress, data: DataBlock) -> bool {
        match self.blocks.get_mut(usize::from(block)) {
            Some(slot) => {
                *slot = data;
                true
            }
            None => false,
        }
    }

    /// Overwrite the trailer of `sector`
    pub fn set_trailer(
        &mut self,
        sector: Sector,
        key_a: &MifareKey,
        access: [u8; 4],
        key_b: &MifareKey,
    ) -> bool {
        let mut bytes = [0u8; BLOCK_SIZE];
        bytes[KeyType::A.trailer_range()].copy_from_slice(key_a.as_bytes());
        bytes[6..10].copy_from_slice(&access);
        bytes[KeyType::B.trailer_range()].copy_from_slice(key_b.as_bytes());
        self.set_block(sector.trailer_block(), DataBlock::new(bytes))
    }

    fn contains(&self, block: BlockAddress) -> bool {
        usize::from(block) < self.blocks.len()
    }

    fn trailer(&self, sector: Sector) -> Option<&DataBlock> {
        self.block(sector.trailer_block())
    }

    fn key_matches(&self, sector: Sector, key_type: KeyType, key: &MifareKey) -> bool {
        self.trailer(sector)
            .is_some_and(|t| &t.as_bytes()[key_type.trailer_range()] == key.as_bytes())
    }

    fn access(&self, sector: Sector) -> Option<AccessConditions> {
        self.trailer(sector)
            .map(AccessConditions::from_trailer)
            .filter(AccessConditions::is_consistent)
    }
}

fn transport_trailer() -> DataBlock {
    let mut bytes = [0u8; BLOCK_SIZE];
    bytes[..KEY_SIZE].copy_from_slice(&DEFAULT_KEY);
    bytes[6..10].copy_from_slice(&TRANSPORT_ACCESS_BITS);
    bytes[10..].copy_from_slice(&DEFAULT_KEY);
    DataBlock::new(bytes)
}

/// ISO/IEC 14443-3 card states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum CardState {
    #[default]
    Idle,
    Ready,
    Active,
    Halted,
}

/// Reader driving a [`VirtualCard`]
#[derive(Debug, Default)]
pub struct SimulatedPcd {
    card: Option<VirtualCard>,
    state: CardState,
    auth: Option<(Sector, KeyType)>,
    auto_wake: bool,
    corrupt_next_read: bool,
    initialised: bool,
}

impl SimulatedPcd {
    /// Create a reader with an empty field
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a reader with `card` in the field
    pub fn with_card(card: VirtualCard) -> Self {
        let mut pcd = Self::new();
        pcd.insert(card);
        pcd
    }

    /// Wake halted cards on the next poll, as if they were tapped again
    pub const fn with_auto_wake(mut self, enabled: bool) -> Self {
        self.auto_wake = enabled;
        self
    }

    /// Place `card` in the field, replacing any previous card
    pub fn insert(&mut self, card: VirtualCard) {
        debug!(uid = %card.uid(), "Card entered the field");
        self.card = Some(card);
        self.state = CardState::Idle;
        self.auth = None;
    }

    /// Take the card out of the field
    pub fn remove(&mut self) -> Option<VirtualCard> {
        self.state = CardState::Idle;
        self.auth = None;
        self.card.take()
    }

    /// Card currently in the field
    pub const fn card(&self) -> Option<&VirtualCard> {
        self.card.as_ref()
    }

    /// Mutable access to the card in the field
    pub const fn card_mut(&mut self) -> Option<&mut VirtualCard> {
        self.card.as_mut()
    }

    /// Send WUPA: bring a halted card back to the idle state
    pub fn wake(&mut self) {
        if self.state == CardState::Halted {
            self.state = CardState::Idle;
        }
    }

    /// Garble the CRC of the next successful read
    pub const fn corrupt_next_read(&mut self) {
        self.corrupt_next_read = true;
    }

    /// Whether [`Pcd::init`] has been called
    pub const fn is_initialised(&self) -> bool {
        self.initialised
    }

    /// Whether a crypto session is established
    pub const fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    /// Whether the card in the field is halted
    pub fn is_halted(&self) -> bool {
        self.state == CardState::Halted
    }

    fn active_card(&self) -> Option<&VirtualCard> {
        match self.state {
            CardState::Active => self.card.as_ref(),
            _ => None,
        }
    }

    /// Key slot authenticated for the sector of `block`, dropping the session otherwise
    fn session_for(&mut self, block: BlockAddress) -> Option<KeyType> {
        match self.auth {
            Some((sector, key_type)) if sector.contains(block) => Some(key_type),
            _ => {
                trace!(block, "Block outside the authenticated sector");
                self.nack();
                None
            }
        }
    }

    /// A NACK drops the crypto session and sends the card back to idle
    fn nack(&mut self) {
        self.auth = None;
        if self.state == CardState::Active {
            self.state = CardState::Idle;
        }
    }
}

impl Pcd for SimulatedPcd {
    fn do_init(&mut self) -> Result<()> {
        self.initialised = true;
        Ok(())
    }

    fn do_poll_for_card(&mut self) -> bool {
        if self.auto_wake {
            self.wake();
        }
        match (&self.card, self.state) {
            (Some(_), CardState::Idle) => {
                self.state = CardState::Ready;
                true
            }
            _ => false,
        }
    }

    fn do_select_card(&mut self) -> Option<CardIdentity> {
        if self.state != CardState::Ready {
            return None;
        }
        let card = self.card.as_ref()?;
        self.state = CardState::Active;
        Some(CardIdentity::new(card.uid().clone(), card.sak()))
    }

    fn do_authenticate(
        &mut self,
        key_type: KeyType,
        block: BlockAddress,
        key: &MifareKey,
        identity: &CardIdentity,
    ) -> StatusCode {
        self.auth = None;
        let Some(card) = self.active_card() else {
            return StatusCode::Timeout;
        };
        if card.uid() != identity.uid() || !card.contains(block) {
            self.nack();
            return StatusCode::Timeout;
        }

        let sector = Sector::containing(block);
        if !card.key_matches(sector, key_type, key) {
            // the card stays silent after a failed handshake
            self.nack();
            return StatusCode::Timeout;
        }
        self.auth = Some((sector, key_type));
        StatusCode::Ok
    }

    fn do_read_block(&mut self, block: BlockAddress, buffer: &mut ReadBuffer) -> StatusCode {
        if self.active_card().is_none() {
            return StatusCode::Timeout;
        }
        let Some(key_type) = self.session_for(block) else {
            return StatusCode::MifareNack;
        };
        let sector = Sector::containing(block);
        let Some(card) = self.card.as_ref() else {
            return StatusCode::Timeout;
        };
        let Some(access) = card.access(sector) else {
            self.nack();
            return StatusCode::MifareNack;
        };
        let Some(stored) = card.block(block) else {
            self.nack();
            return StatusCode::MifareNack;
        };

        let data = if block == sector.trailer_block() {
            let mut bytes = *stored.as_bytes();
            bytes[KeyType::A.trailer_range()].fill(0);
            if !access.group(3).trailer_key_b_readable() {
                bytes[KeyType::B.trailer_range()].fill(0);
            }
            DataBlock::new(bytes)
        } else {
            let group = sector.access_group(block).unwrap_or(0);
            if !access.group(group).data_readable_with(key_type) {
                self.nack();
                return StatusCode::MifareNack;
            }
            *stored
        };

        if std::mem::take(&mut self.corrupt_next_read) {
            let mut frame = data.as_bytes().to_vec();
            let crc = crc_a(data.as_bytes());
            frame.extend_from_slice(&[!crc[0], crc[1]]);
            buffer.fill_frame(&frame);
        } else {
            buffer.fill(&data);
        }
        StatusCode::Ok
    }

    fn do_write_block(&mut self, block: BlockAddress, data: &DataBlock) -> StatusCode {
        if self.active_card().is_none() {
            return StatusCode::Timeout;
        }
        let Some(key_type) = self.session_for(block) else {
            return StatusCode::MifareNack;
        };
        let sector = Sector::containing(block);
        let allowed = self.card.as_ref().and_then(|card| card.access(sector)).is_some_and(
            |access| {
                if block == 0 {
                    false
                } else if block == sector.trailer_block() {
                    access.group(3).trailer_writable_with(key_type)
                } else {
                    let group = sector.access_group(block).unwrap_or(0);
                    access.group(group).data_writable_with(key_type)
                }
            },
        );
        if !allowed {
            self.nack();
            return StatusCode::MifareNack;
        }

        if self
            .card
            .as_mut()
            .is_some_and(|card| card.set_block(block, *data))
        {
            StatusCode::Ok
        } else {
            StatusCode::MifareNack
        }
    }

    fn do_halt(&mut self) -> StatusCode {
        match (&self.card, self.state) {
            (Some(_), CardState::Ready | CardState::Active) => {
                self.state = CardState::Halted;
                self.auth = None;
                StatusCode::Ok
            }
            _ => StatusCode::Timeout,
        }
    }

    fn do_stop_crypto(&mut self) {
        self.auth = None;
    }
}
