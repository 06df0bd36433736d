//! PC/SC part 3 storage card commands
//!
//! Contactless readers expose MIFARE Classic operations as pseudo-APDUs with
//! class byte `FF`. The reader handles the Crypto1 handshake and the CRC_A
//! itself, so responses only carry the payload and a status word.

use nexum_mifare_core::{BLOCK_SIZE, BlockAddress, DataBlock, KEY_SIZE, KeyType, MifareKey, StatusCode};
use zeroize::Zeroizing;

/// Class byte of the pseudo-APDUs
pub const CLA: u8 = 0xFF;

/// INS of GET DATA
pub const INS_GET_DATA: u8 = 0xCA;
/// INS of LOAD KEYS
pub const INS_LOAD_KEYS: u8 = 0x82;
/// INS of GENERAL AUTHENTICATE
pub const INS_GENERAL_AUTHENTICATE: u8 = 0x86;
/// INS of READ BINARY
pub const INS_READ_BINARY: u8 = 0xB0;
/// INS of UPDATE BINARY
pub const INS_UPDATE_BINARY: u8 = 0xD6;

/// GET DATA for the card UID
pub const fn get_uid() -> [u8; 5] {
    [CLA, INS_GET_DATA, 0x00, 0x00, 0x00]
}

/// LOAD KEYS into the reader's volatile `slot`
///
/// The command carries the key in clear and is wiped on drop.
pub fn load_key(slot: u8, key: &MifareKey) -> Zeroizing<[u8; 5 + KEY_SIZE]> {
    let mut apdu = Zeroizing::new([0u8; 5 + KEY_SIZE]);
    apdu[..5].copy_from_slice(&[CLA, INS_LOAD_KEYS, 0x00, slot, KEY_SIZE as u8]);
    apdu[5..].copy_from_slice(key.as_bytes());
    apdu
}

/// GENERAL AUTHENTICATE `block` with the key previously loaded into `slot`
pub const fn authenticate(block: BlockAddress, key_type: KeyType, slot: u8) -> [u8; 10] {
    [
        CLA,
        INS_GENERAL_AUTHENTICATE,
        0x00,
        0x00,
        0x05,
        0x01,
        0x00,
        block,
        key_type.command(),
        slot,
    ]
}

/// READ BINARY of one block
pub const fn read_binary(block: BlockAddress) -> [u8; 5] {
    [CLA, INS_READ_BINARY, 0x00, block, BLOCK_SIZE as u8]
}

/// UPDATE BINARY of one block
pub fn update_binary(block: BlockAddress, data: &DataBlock) -> [u8; 5 + BLOCK_SIZE] {
    let mut apdu = [0u8; 5 + BLOCK_SIZE];
    apdu[..5].copy_from_slice(&[CLA, INS_UPDATE_BINARY, 0x00, block, BLOCK_SIZE as u8]);
    apdu[5..].copy_from_slice(data.as_bytes());
    apdu
}

/// Split a response into payload and status word
pub fn split_response(response: &[u8]) -> Option<(&[u8], (u8, u8))> {
    match response {
        [payload @ .., sw1, sw2] => Some((payload, (*sw1, *sw2))),
        _ => None,
    }
}

/// Map a reader status word to a status code
pub const fn status_from_sw(sw1: u8, sw2: u8) -> StatusCode {
    match (sw1, sw2) {
        (0x90, 0x00) => StatusCode::Ok,
        (0x63, 0x00) | (0x69, 0x82) | (0x69, 0x88) => StatusCode::MifareNack,
        (0x6A, 0x81) | (0x6A, 0x82) | (0x6A, 0x86) | (0x6B, 0x00) => StatusCode::Invalid,
        (0x67, 0x00) | (0x6C, _) => StatusCode::NoRoom,
        _ => StatusCode::Error,
    }
}
