//! SAK recovery from PC/SC part 3 ATRs
//!
//! Readers do not expose the SAK directly. For storage cards they build an
//! ATR holding the PC/SC registered application provider identifier followed
//! by a standard byte and a two-byte card name:
//!
//! ```text
//! 3B 8F 80 01 80 4F 0C | A0 00 00 03 06 | SS | NN NN | 00 00 00 00 | TCK
//! ```
//!
//! Cards without that identifier are ISO/IEC 14443-4 cards.

/// Registered application provider identifier of PC/SC storage cards
pub const PCSC_RID: [u8; 5] = [0xA0, 0x00, 0x00, 0x03, 0x06];

/// SAK reported for cards that did not match any known card name
pub const UNKNOWN_SAK: u8 = 0x7F;

/// SAK answered by ISO/IEC 14443-4 compliant cards
pub const ISO14443_4_SAK: u8 = 0x20;

/// Card name bytes following the RID and standard byte
pub fn card_name(atr: &[u8]) -> Option<[u8; 2]> {
    let start = atr
        .windows(PCSC_RID.len())
        .position(|w| w == PCSC_RID)?
        + PCSC_RID.len();
    match atr.get(start + 1..start + 3)? {
        [hi, lo] => Some([*hi, *lo]),
        _ => None,
    }
}

/// Derive the SAK a card would have answered from its ATR
pub fn sak_from_atr(atr: &[u8]) -> u8 {
    match card_name(atr) {
        None => ISO14443_4_SAK,
        Some([0x00, 0x01]) => 0x08,
        Some([0x00, 0x02]) => 0x18,
        Some([0x00, 0x26]) => 0x09,
        Some([0x00, 0x03] | [0x00, 0x3A]) => 0x00,
        Some(_) => UNKNOWN_SAK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexum_mifare_core::PiccType;

    fn atr(name: [u8; 2]) -> Vec<u8> {
        let mut atr = hex::decode("3B8F8001804F0CA000000306").unwrap();
        atr.push(0x03);
        atr.extend_from_slice(&name);
        atr.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x6A]);
        atr
    }

    #[test]
    fn test_classic_cards() {
        assert_eq!(sak_from_atr(&atr([0x00, 0x01])), 0x08);
        assert_eq!(sak_from_atr(&atr([0x00, 0x02])), 0x18);
        assert_eq!(sak_from_atr(&atr([0x00, 0x26])), 0x09);
        assert_eq!(
            PiccType::from_sak(sak_from_atr(&atr([0x00, 0x02]))),
            PiccType::Mifare4K
        );
    }

    #[test]
    fn test_other_cards() {
        assert_eq!(sak_from_atr(&atr([0x00, 0x03])), 0x00);
        assert_eq!(
            PiccType::from_sak(sak_from_atr(&atr([0xF0, 0x04]))),
            PiccType::Unknown
        );

        let desfire = hex::decode("3B8180018080").unwrap();
        assert_eq!(card_name(&desfire), None);
        assert_eq!(sak_from_atr(&desfire), ISO14443_4_SAK);
    }

    #[test]
    fn test_truncated_atr() {
        let truncated = hex::decode("3B8F8001804F0CA00000030603").unwrap();
        assert_eq!(card_name(&truncated), None);
    }
}
