//! Command implementations for the MIFARE CLI

use std::num::NonZeroUsize;
use std::time::Duration;

use nexum_mifare_core::{
    KeyType, MifareKey, Pcd, Sector, Session, SessionConfig, dump_sector,
};
use tracing::{debug, info};

use crate::utils::display::{ConsoleEvents, section_title, sector_table, warning};

/// Run the read/write workflow on `pcd`
///
/// Runs until `cycles` cards have been processed, or forever.
pub fn run_command<P: Pcd>(
    pcd: P,
    key: MifareKey,
    config: SessionConfig,
    cycles: Option<NonZeroUsize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::with_handler(pcd, key, config, ConsoleEvents)?;
    session.init()?;

    let processed = session.run(cycles);
    info!(processed, "Session finished");
    Ok(())
}

/// Wait for a card and dump one sector without writing anything
pub fn dump_command<P: Pcd>(
    pcd: &mut P,
    key: MifareKey,
    sector: Sector,
    poll_interval: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    pcd.init()?;
    println!("{}", section_title("Sector dump"));
    println!("Waiting for a card...");

    let identity = loop {
        if pcd.poll_for_card() {
            if let Some(identity) = pcd.select_card() {
                break identity;
            }
        }
        std::thread::sleep(poll_interval);
    };
    println!("UID {} ({})", identity.uid(), identity.picc_type());

    if !identity.picc_type().is_supported() {
        println!("{}", warning("Not a MIFARE Classic card"));
    } else if identity
        .picc_type()
        .sector_count()
        .is_some_and(|count| sector.index() >= count)
    {
        println!(
            "{}",
            warning(&format!("{} does not exist on this card", sector))
        );
    } else {
        debug!(%sector, key_type = %KeyType::A, "Dumping");
        let report = dump_sector(&mut *pcd, &identity, &key, sector).into_report();
        println!("{}", sector_table(&report));
    }

    pcd.halt().trace("halt");
    pcd.stop_crypto();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::SimulatedCard;

    #[test]
    fn test_dump_leaves_card_halted() {
        let mut pcd = SimulatedCard::Classic1K.pcd();
        dump_command(
            &mut pcd,
            MifareKey::default(),
            Sector::new(1).unwrap(),
            Duration::from_millis(1),
        )
        .unwrap();
        assert!(pcd.is_halted());
        assert!(!pcd.is_authenticated());
    }

    #[test]
    fn test_dump_of_missing_sector_still_halts() {
        let mut pcd = SimulatedCard::Mini.pcd();
        dump_command(
            &mut pcd,
            MifareKey::default(),
            Sector::new(39).unwrap(),
            Duration::from_millis(1),
        )
        .unwrap();
        assert!(pcd.is_halted());
    }
}
