//! Utility functions and types for the MIFARE CLI

pub mod display;
pub mod reader;

use clap::ValueEnum;
use nexum_mifare_core::Uid;
use nexum_mifare_core::sim::{SimulatedPcd, VirtualCard};

/// Card placed on the simulated reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SimulatedCard {
    /// MIFARE Mini (5 sectors)
    Mini,
    /// MIFARE Classic 1K
    #[value(name = "1k")]
    Classic1K,
    /// MIFARE Classic 4K
    #[value(name = "4k")]
    Classic4K,
    /// MIFARE Ultralight, rejected by the workflow
    Ultralight,
}

impl SimulatedCard {
    /// Build a simulated reader holding a blank card of this type
    ///
    /// Halted cards are woken on the next poll so that several cycles can
    /// run without a physical tap.
    pub fn pcd(self) -> SimulatedPcd {
        let card = match self {
            Self::Mini => VirtualCard::mifare_mini(short_uid()),
            Self::Classic1K => VirtualCard::mifare_1k(short_uid()),
            Self::Classic4K => VirtualCard::mifare_4k(short_uid()),
            Self::Ultralight => VirtualCard::with_sak(long_uid(), 0x00),
        };
        SimulatedPcd::with_card(card).with_auto_wake(true)
    }
}

fn short_uid() -> Uid {
    Uid::from([0xDE, 0xAD, 0xBE, 0xEF])
}

fn long_uid() -> Uid {
    Uid::from([0x04, 0x52, 0x8C, 0x1A, 0x33, 0x61, 0x80])
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexum_mifare_core::{Pcd, PiccType};

    #[test]
    fn test_simulated_cards() {
        let cases = [
            (SimulatedCard::Mini, PiccType::MifareMini),
            (SimulatedCard::Classic1K, PiccType::Mifare1K),
            (SimulatedCard::Classic4K, PiccType::Mifare4K),
            (SimulatedCard::Ultralight, PiccType::MifareUl),
        ];
        for (card, expected) in cases {
            let mut pcd = card.pcd();
            assert!(pcd.poll_for_card());
            let identity = pcd.select_card().unwrap();
            assert_eq!(identity.picc_type(), expected);
        }
    }

    #[test]
    fn test_value_names() {
        assert_eq!(
            SimulatedCard::from_str("4k", true),
            Ok(SimulatedCard::Classic4K)
        );
        assert_eq!(
            SimulatedCard::from_str("mini", true),
            Ok(SimulatedCard::Mini)
        );
    }
}
