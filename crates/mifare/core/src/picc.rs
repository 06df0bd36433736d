//! Card identity and classification
//!
//! A successful select yields a [`CardIdentity`]: the UID reported during
//! anticollision and the SAK byte. The SAK maps to a [`PiccType`], and only
//! the MIFARE Classic family (Mini, 1K, 4K) is supported by the workflow.

use std::fmt;

use derive_more::Display;

/// Longest UID defined by ISO/IEC 14443-3 (triple size)
pub const MAX_UID_LEN: usize = 10;

/// Card UID of 4, 7 or 10 bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Uid(heapless::Vec<u8, MAX_UID_LEN>);

impl Uid {
    /// Create a UID from its bytes
    ///
    /// Returns `None` unless the length is a valid single, double or triple size UID.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if !matches!(bytes.len(), 4 | 7 | 10) {
            return None;
        }
        heapless::Vec::from_slice(bytes).ok().map(Self)
    }

    /// Get the UID bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of UID bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false for a constructed UID
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The four UID bytes fed into the Crypto1 handshake
    ///
    /// Double and triple size UIDs use their last four bytes (NXP AN10927).
    pub fn auth_bytes(&self) -> [u8; 4] {
        let tail = &self.0[self.0.len() - 4..];
        [tail[0], tail[1], tail[2], tail[3]]
    }
}

macro_rules! uid_from_array {
    ($($len:literal),+) => {$(
        impl From<[u8; $len]> for Uid {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes.into_iter().collect())
            }
        }
    )+};
}

uid_from_array!(4, 7, 10);

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(&self.0))
    }
}

/// Identity of the card selected in the current detection cycle
///
/// Only valid until the card is halted. It is deliberately not `Clone`: the
/// session drops it when the cycle ends.
#[derive(Debug, PartialEq, Eq)]
pub struct CardIdentity {
    uid: Uid,
    sak: u8,
}

impl CardIdentity {
    /// Create an identity from a UID and SAK
    pub const fn new(uid: Uid, sak: u8) -> Self {
        Self { uid, sak }
    }

    /// Get the UID
    pub const fn uid(&self) -> &Uid {
        &self.uid
    }

    /// Get the SAK byte
    pub const fn sak(&self) -> u8 {
        self.sak
    }

    /// Classify the card from its SAK
    pub const fn picc_type(&self) -> PiccType {
        PiccType::from_sak(self.sak)
    }
}

/// PICC types distinguishable from the SAK byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum PiccType {
    /// SAK not recognised
    #[display("Unknown type")]
    Unknown,
    /// PICC compliant with ISO/IEC 14443-4
    #[display("PICC compliant with ISO/IEC 14443-4")]
    Iso14443_4,
    /// PICC compliant with ISO/IEC 18092 (NFC)
    #[display("PICC compliant with ISO/IEC 18092 (NFC)")]
    Iso18092,
    /// MIFARE Classic Mini, 320 bytes
    #[display("MIFARE Mini, 320 bytes")]
    MifareMini,
    /// MIFARE Classic 1KB
    #[display("MIFARE 1KB")]
    Mifare1K,
    /// MIFARE Classic 4KB
    #[display("MIFARE 4KB")]
    Mifare4K,
    /// MIFARE Ultralight or Ultralight C
    #[display("MIFARE Ultralight or Ultralight C")]
    MifareUl,
    /// MIFARE Plus
    #[display("MIFARE Plus")]
    MifarePlus,
    /// MIFARE TNP3XXX
    #[display("MIFARE TNP3XXX")]
    Tnp3xxx,
    /// SAK indicates the UID is not complete
    #[display("SAK indicates UID is not complete.")]
    NotComplete,
}

impl PiccType {
    /// Classify a card from its SAK byte
    ///
    /// Bit 8 of the SAK is reserved for future use and ignored.
    pub const fn from_sak(sak: u8) -> Self {
        match sak & 0x7F {
            0x04 => Self::NotComplete,
            0x09 => Self::MifareMini,
            0x08 => Self::Mifare1K,
            0x18 => Self::Mifare4K,
            0x00 => Self::MifareUl,
            0x10 | 0x11 => Self::MifarePlus,
            0x01 => Self::Tnp3xxx,
            0x20 => Self::Iso14443_4,
            0x40 => Self::Iso18092,
            _ => Self::Unknown,
        }
    }

    /// Whether the read/write workflow can run against this card
    pub const fn is_supported(self) -> bool {
        matches!(self, Self::MifareMini | Self::Mifare1K | Self::Mifare4K)
    }

    /// Number of sectors on a supported card
    pub const fn sector_count(self) -> Option<u8> {
        match self {
            Self::MifareMini => Some(5),
            Self::Mifare1K => Some(16),
            Self::Mifare4K => Some(40),
            _ => None,
        }
    }

    /// Human readable name of the type
    pub fn type_name(self) -> String {
        self.to_string()
    }
}

/// Classify a card from its SAK byte
pub const fn classify(sak: u8) -> PiccType {
    PiccType::from_sak(sak)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classic_family_is_supported() {
        assert_eq!(classify(0x08), PiccType::Mifare1K);
        assert_eq!(classify(0x18), PiccType::Mifare4K);
        assert_eq!(classify(0x09), PiccType::MifareMini);
        assert!(PiccType::Mifare1K.is_supported());
        assert!(PiccType::Mifare4K.is_supported());
        assert!(PiccType::MifareMini.is_supported());
    }

    #[test]
    fn test_other_types_are_not_supported() {
        for sak in [0x00, 0x01, 0x04, 0x10, 0x11, 0x20, 0x40, 0x28, 0x7F] {
            assert!(!classify(sak).is_supported(), "sak {sak:#04x}");
        }
        assert_eq!(classify(0x00), PiccType::MifareUl);
        assert_eq!(classify(0x20), PiccType::Iso14443_4);
        assert_eq!(classify(0x28), PiccType::Unknown);
    }

    #[test]
    fn test_reserved_sak_bit_is_ignored() {
        assert_eq!(classify(0x88), PiccType::Mifare1K);
        assert_eq!(classify(0x98), PiccType::Mifare4K);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(PiccType::Mifare1K.type_name(), "MIFARE 1KB");
        assert_eq!(PiccType::MifareMini.type_name(), "MIFARE Mini, 320 bytes");
        assert_eq!(PiccType::Unknown.type_name(), "Unknown type");
    }

    #[test]
    fn test_sector_counts() {
        assert_eq!(PiccType::MifareMini.sector_count(), Some(5));
        assert_eq!(PiccType::Mifare1K.sector_count(), Some(16));
        assert_eq!(PiccType::Mifare4K.sector_count(), Some(40));
        assert_eq!(PiccType::MifareUl.sector_count(), None);
    }

    #[test]
    fn test_uid_lengths() {
        assert!(Uid::from_slice(&[1, 2, 3, 4]).is_some());
        assert!(Uid::from_slice(&[1, 2, 3, 4, 5, 6, 7]).is_some());
        assert!(Uid::from_slice(&[0; 10]).is_some());
        assert!(Uid::from_slice(&[1, 2, 3]).is_none());
        assert!(Uid::from_slice(&[0; 11]).is_none());
        assert_eq!(Uid::from([0xAB; 7]), Uid::from_slice(&[0xAB; 7]).unwrap());
    }

    #[test]
    fn test_uid_auth_bytes_use_tail() {
        let single = Uid::from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
        assert_eq!(single.auth_bytes(), [0xDE, 0xAD, 0xBE, 0xEF]);

        let double = Uid::from_slice(&[0x04, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66]).unwrap();
        assert_eq!(double.auth_bytes(), [0x33, 0x44, 0x55, 0x66]);
        assert_eq!(double.to_string(), "04112233445566");
    }

    #[test]
    fn test_identity_classifies_itself() {
        let identity = CardIdentity::new(Uid::from_slice(&[1, 2, 3, 4]).unwrap(), 0x08);
        assert_eq!(identity.picc_type(), PiccType::Mifare1K);
        assert_eq!(identity.uid().len(), 4);
    }
}
