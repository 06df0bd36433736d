//! End-to-end workflow runs against the software card

use std::num::NonZeroUsize;
use std::time::Duration;

use nexum_mifare_core::prelude::*;
use nexum_mifare_core::sim::{SimulatedPcd, VirtualCard};
use nexum_mifare_core::{
    CycleOutcome, DEMO_PAYLOAD, SessionState, Verdict, dump_sector, read_block,
};

fn uid() -> Uid {
    Uid::from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]).unwrap()
}

#[test]
fn test_first_read_returns_preexisting_block() {
    let mut card = VirtualCard::mifare_1k(uid());
    let existing = DataBlock::new([0x11; 16]);
    card.set_block(4, existing);

    let mut seen = Vec::new();
    let mut session = Session::with_handler(
        SimulatedPcd::with_card(card),
        MifareKey::default(),
        SessionConfig::default(),
        |event: &WorkflowEvent| seen.push(event.clone()),
    )
    .unwrap();
    session.run_cycle();
    drop(session);

    let reads: Vec<_> = seen
        .iter()
        .filter_map(|e| match e {
            WorkflowEvent::BlockRead { block, status, data } => Some((*block, *status, *data)),
            _ => None,
        })
        .collect();
    assert_eq!(reads.len(), 2);
    assert_eq!(reads[0], (4, StatusCode::Ok, Some(existing)));
    assert_eq!(reads[1], (4, StatusCode::Ok, Some(DataBlock::new(DEMO_PAYLOAD))));

    let dump = seen.iter().find_map(|e| match e {
        WorkflowEvent::SectorDumped(report) => Some(report.clone()),
        _ => None,
    });
    let dump = dump.unwrap();
    assert!(dump.is_complete());
    assert_eq!(dump.blocks.len(), 4);
    assert_eq!(dump.blocks[3].data, existing);
}

#[test]
fn test_write_is_verified_and_card_halted() {
    let mut session = Session::new(
        SimulatedPcd::with_card(VirtualCard::mifare_1k(uid())),
        MifareKey::default(),
        SessionConfig::default(),
    )
    .unwrap();
    session.init().unwrap();

    let report = session.run_cycle();
    let CycleOutcome::Completed(verification) = report.outcome else {
        panic!("unexpected outcome {:?}", report.outcome);
    };
    assert_eq!(verification.matched, 16);
    assert_eq!(verification.verdict, Verdict::Pass);
    assert_eq!(report.path.last(), Some(&SessionState::Idle));

    let pcd = session.pcd();
    assert!(pcd.is_halted());
    assert!(!pcd.is_authenticated());
    assert_eq!(
        pcd.card().and_then(|c| c.block(4)),
        Some(&DataBlock::new(DEMO_PAYLOAD))
    );

    // a halted card does not answer the next poll
    let idle = session.run_cycle();
    assert_eq!(idle.outcome, CycleOutcome::NoCard);
}

#[test]
fn test_wrong_key_aborts_before_io() {
    let mut card = VirtualCard::mifare_1k(uid());
    let secret = MifareKey::new([0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5]);
    card.set_trailer(
        Sector::new(1).unwrap(),
        &secret,
        nexum_mifare_core::TRANSPORT_ACCESS_BITS,
        &secret,
    );

    let mut session = Session::new(
        SimulatedPcd::with_card(card),
        MifareKey::default(),
        SessionConfig::default(),
    )
    .unwrap();
    let report = session.run_cycle();
    assert_eq!(
        report.outcome,
        CycleOutcome::AuthenticationFailed {
            key_type: KeyType::A,
            status: StatusCode::Timeout,
        }
    );
    assert!(report.halted());
    assert!(!report.visited(SessionState::Written));
    assert_eq!(
        session.pcd().card().and_then(|c| c.block(4)),
        Some(&DataBlock::default())
    );
}

#[test]
fn test_unsupported_card_is_left_untouched() {
    let ultralight = Uid::from_slice(&[0x04, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06]).unwrap();
    let mut session = Session::new(
        SimulatedPcd::with_card(VirtualCard::with_sak(ultralight, 0x00)),
        MifareKey::default(),
        SessionConfig::default(),
    )
    .unwrap();
    let report = session.run_cycle();
    assert_eq!(report.outcome, CycleOutcome::Unsupported(PiccType::MifareUl));
    assert!(report.halted());
}

#[test]
fn test_large_sector_on_4k() {
    let sector = Sector::new(32).unwrap();
    let config = SessionConfig::default()
        .with_sector(sector)
        .with_data_offset(14)
        .with_payload(DataBlock::new([0x5C; 16]));
    assert_eq!(config.data_block().unwrap(), 142);

    let mut session = Session::new(
        SimulatedPcd::with_card(VirtualCard::mifare_4k(uid())),
        MifareKey::default(),
        config,
    )
    .unwrap();
    let report = session.run_cycle();
    assert!(matches!(report.outcome, CycleOutcome::Completed(v) if v.passed()));
    assert_eq!(
        session.pcd().card().and_then(|c| c.block(142)),
        Some(&DataBlock::new([0x5C; 16]))
    );
}

#[test]
fn test_last_sector_on_4k() {
    let sector = Sector::new(39).unwrap();
    assert_eq!(sector.trailer_block(), 255);
    let config = SessionConfig::default()
        .with_sector(sector)
        .with_data_offset(14)
        .with_payload(DataBlock::new([0x39; 16]));
    assert_eq!(config.trailer_block(), 255);
    assert_eq!(config.data_block().unwrap(), 254);

    let mut session = Session::new(
        SimulatedPcd::with_card(VirtualCard::mifare_4k(uid())),
        MifareKey::default(),
        config,
    )
    .unwrap();
    let report = session.run_cycle();
    assert!(matches!(report.outcome, CycleOutcome::Completed(v) if v.passed()));
    assert_eq!(
        session.pcd().card().and_then(|c| c.block(254)),
        Some(&DataBlock::new([0x39; 16]))
    );
}

#[test]
fn test_dump_of_last_sector() {
    let mut pcd = SimulatedPcd::with_card(VirtualCard::mifare_4k(uid()));
    assert!(pcd.poll_for_card());
    let identity = pcd.select_card().unwrap();

    let report = dump_sector(&mut pcd, &identity, &MifareKey::default(), Sector::new(39).unwrap())
        .into_report();
    assert!(report.is_complete());
    assert_eq!(report.blocks.len(), 16);
    assert_eq!(report.blocks.first().map(|b| b.address), Some(255));
    assert_eq!(report.blocks.last().map(|b| b.address), Some(240));
}

#[test]
fn test_run_processes_requested_cycles() {
    let pcd = SimulatedPcd::with_card(VirtualCard::mifare_mini(uid())).with_auto_wake(true);
    let config = SessionConfig::default().with_poll_interval(Duration::from_millis(1));
    let mut session = Session::new(pcd, MifareKey::default(), config).unwrap();

    let processed = session.run(NonZeroUsize::new(3));
    assert_eq!(processed, 3);
}

#[test]
fn test_dump_of_fresh_sector() {
    let mut pcd = SimulatedPcd::with_card(VirtualCard::mifare_1k(uid()));
    assert!(pcd.poll_for_card());
    let identity = pcd.select_card().unwrap();

    let report = dump_sector(&mut pcd, &identity, &MifareKey::default(), Sector::new(0).unwrap())
        .into_report();
    assert!(report.is_complete());
    assert_eq!(report.access_consistent, Some(true));
    let block0 = report.blocks.last().unwrap();
    assert_eq!(block0.address, 0);
    assert_eq!(&block0.data.as_bytes()[..4], uid().as_bytes());

    // still authenticated for sector 0 after the sweep
    assert!(read_block(&mut pcd, 1).is_ok());
}
