//! Read/write session workflow
//!
//! A [`Session`] owns the reader and the key and runs detection cycles as an
//! explicit state machine:
//!
//! ```text
//! Idle → Detected → Selected → Classified ─┬→ Unsupported ───────────────────────┐
//!                                          └→ AuthenticatedA → Dumped → Read1     │
//!                                             → AuthenticatedB → Written → Read2  │
//!                                             → Verified ──────────────→ Halted ←─┘
//!                                                                          ↓
//!                                                                         Idle
//! ```
//!
//! A failed authentication jumps straight to `Halted`. Every cycle that
//! reached `Selected` passes through `Halted`, which halts the card and stops
//! the crypto session before the next poll.

use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;

use derive_more::Display;
use tracing::{debug, info, instrument, warn};

use crate::auth::authenticate;
use crate::block::DataBlock;
use crate::dump::{SectorDumpReport, dump_sector};
use crate::io::{BlockRead, read_block, write_block};
use crate::key::{KeyType, MifareKey};
use crate::pcd::Pcd;
use crate::picc::{CardIdentity, PiccType, Uid};
use crate::sector::{BlockAddress, Sector};
use crate::status::StatusCode;
use crate::{Error, Result};

/// Payload written by the demonstration workflow
pub const DEMO_PAYLOAD: [u8; 16] = [
    0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x08, 0x09, 0xFF, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F,
];

/// States of a detection cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum SessionState {
    /// Waiting for a card
    Idle,
    /// A card answered the poll
    Detected,
    /// Anticollision and select completed
    Selected,
    /// SAK mapped to a PICC type
    Classified,
    /// Card family not handled by the workflow
    Unsupported,
    /// Key A authentication succeeded
    AuthenticatedA,
    /// Sector dump done
    Dumped,
    /// First read of the data block done
    Read1,
    /// Key B authentication succeeded
    AuthenticatedB,
    /// Payload written
    Written,
    /// Read-back done
    Read2,
    /// Read-back compared against the payload
    Verified,
    /// Card halted and crypto session stopped
    Halted,
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Sector the workflow operates on
    pub sector: Sector,
    /// Offset of the data block from the first block of the sector
    pub data_offset: u8,
    /// Bytes written and verified
    pub payload: DataBlock,
    /// Wait between polls while no card is present
    pub poll_interval: Duration,
    /// Dump the sector again once verification is done
    pub final_dump: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sector: Sector::containing(4),
            data_offset: 0,
            payload: DataBlock::new(DEMO_PAYLOAD),
            poll_interval: Duration::from_millis(50),
            final_dump: true,
        }
    }
}

impl SessionConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sector
    pub const fn with_sector(mut self, sector: Sector) -> Self {
        self.sector = sector;
        self
    }

    /// Set the data block offset within the sector
    pub const fn with_data_offset(mut self, offset: u8) -> Self {
        self.data_offset = offset;
        self
    }

    /// Set the payload to write
    pub const fn with_payload(mut self, payload: DataBlock) -> Self {
        self.payload = payload;
        self
    }

    /// Set the idle poll interval
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Enable or disable the post-verification dump
    pub const fn with_final_dump(mut self, enabled: bool) -> Self {
        self.final_dump = enabled;
        self
    }

    /// Trailer block of the configured sector
    pub const fn trailer_block(&self) -> BlockAddress {
        self.sector.trailer_block()
    }

    /// Data block targeted by the workflow
    pub fn data_block(&self) -> Result<BlockAddress> {
        self.sector
            .data_block(self.data_offset)
            .ok_or(Error::InvalidConfig("data block offset lands on the sector trailer"))
    }
}

/// Pass/fail classification of a verification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Verdict {
    /// All 16 bytes matched
    Pass,
    /// At least one byte differed, or nothing could be read back
    Fail,
}

/// Byte-for-byte comparison of the written payload against the read-back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    /// Number of matching bytes (0 to 16)
    pub matched: u8,
    /// [`Verdict::Pass`] iff all 16 bytes matched
    pub verdict: Verdict,
}

impl Verification {
    /// Compare `written` against what was read back
    ///
    /// A failed read-back counts as no matching bytes.
    pub fn compare(written: &DataBlock, read_back: Option<&DataBlock>) -> Self {
        let matched = read_back.map_or(0, |read| written.matching_bytes(read));
        let verdict = if usize::from(matched) == crate::block::BLOCK_SIZE {
            Verdict::Pass
        } else {
            Verdict::Fail
        };
        Self { matched, verdict }
    }

    /// Whether the verification passed
    pub const fn passed(&self) -> bool {
        matches!(self.verdict, Verdict::Pass)
    }
}

/// How a detection cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No card answered the poll
    NoCard,
    /// The card left before selection completed
    SelectionFailed,
    /// The card is not a MIFARE Classic
    Unsupported(PiccType),
    /// An authentication step failed
    AuthenticationFailed {
        /// Slot that failed
        key_type: KeyType,
        /// Status returned
        status: StatusCode,
    },
    /// The whole workflow ran
    Completed(Verification),
}

/// Trace of one detection cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// States visited, starting and ending with [`SessionState::Idle`]
    pub path: Vec<SessionState>,
    /// How the cycle ended
    pub outcome: CycleOutcome,
}

impl CycleReport {
    /// Whether the cycle visited `state`
    pub fn visited(&self, state: SessionState) -> bool {
        self.path.contains(&state)
    }

    /// Whether a card was selected in this cycle
    pub fn selected(&self) -> bool {
        self.visited(SessionState::Selected)
    }

    /// Whether the card was halted in this cycle
    pub fn halted(&self) -> bool {
        self.visited(SessionState::Halted)
    }
}

/// Progress events emitted by a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    /// The session loop started
    Started {
        /// Key in hex, used for both slots
        key: String,
        /// Sector that will be written
        sector: Sector,
    },
    /// A card was selected and classified
    CardDetected {
        /// Card UID
        uid: Uid,
        /// Type derived from the SAK
        picc_type: PiccType,
    },
    /// The card is not a MIFARE Classic
    UnsupportedCard {
        /// Type derived from the SAK
        picc_type: PiccType,
    },
    /// An authentication is about to run
    Authenticating {
        /// Slot used
        key_type: KeyType,
    },
    /// An authentication failed
    AuthenticationFailed {
        /// Slot used
        key_type: KeyType,
        /// Status returned
        status: StatusCode,
    },
    /// A sector dump finished
    SectorDumped(SectorDumpReport),
    /// A block read finished
    BlockRead {
        /// Block address
        block: BlockAddress,
        /// Status of the read
        status: StatusCode,
        /// Block contents when the read succeeded
        data: Option<DataBlock>,
    },
    /// A write is about to run
    Writing {
        /// Block address
        block: BlockAddress,
        /// Bytes to write
        data: DataBlock,
    },
    /// A write finished
    BlockWritten {
        /// Block address
        block: BlockAddress,
        /// Status of the write
        status: StatusCode,
    },
    /// The read-back was compared against the payload
    Verified(Verification),
    /// The card was halted and the crypto session stopped
    Halted,
}

/// Trait for handling workflow events
pub trait EventHandler {
    /// Handle a workflow event
    fn handle_event(&mut self, event: &WorkflowEvent);
}

impl<F> EventHandler for F
where
    F: FnMut(&WorkflowEvent),
{
    fn handle_event(&mut self, event: &WorkflowEvent) {
        self(event)
    }
}

/// Event handler that logs every event through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEvents;

impl EventHandler for TracingEvents {
    fn handle_event(&mut self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::Started { key, sector } => {
                info!(key = %key, %sector, "Scan a MIFARE Classic PICC to demonstrate read and write");
            }
            WorkflowEvent::CardDetected { uid, picc_type } => {
                info!(uid = %uid, picc_type = %picc_type, "Card detected");
            }
            WorkflowEvent::UnsupportedCard { picc_type } => {
                warn!(picc_type = %picc_type, "This sample only works with MIFARE Classic cards");
            }
            WorkflowEvent::Authenticating { key_type } => {
                info!(%key_type, "Authenticating");
            }
            WorkflowEvent::AuthenticationFailed { key_type, status } => {
                warn!(%key_type, %status, "Authentication failed");
            }
            WorkflowEvent::SectorDumped(report) => {
                info!(sector = %report.sector, status = %report.status, "Current data in sector");
                for block in &report.blocks {
                    info!("{block}");
                }
            }
            WorkflowEvent::BlockRead {
                block,
                status,
                data,
            } => match data {
                Some(data) => info!(block, %data, "Data in block"),
                None => warn!(block, %status, "Reading block failed"),
            },
            WorkflowEvent::Writing { block, data } => {
                info!(block, %data, "Writing data into block");
            }
            WorkflowEvent::BlockWritten { block, status } => {
                if status.is_ok() {
                    debug!(block, "Block written");
                } else {
                    warn!(block, %status, "Writing block failed");
                }
            }
            WorkflowEvent::Verified(verification) => {
                if verification.passed() {
                    info!(matched = verification.matched, "Success");
                } else {
                    warn!(
                        matched = verification.matched,
                        "Failure, no match, perhaps the write didn't work properly"
                    );
                }
            }
            WorkflowEvent::Halted => debug!("Card halted"),
        }
    }
}

/// Per-cycle data, dropped when the cycle returns to idle
#[derive(Debug)]
struct Cycle {
    path: Vec<SessionState>,
    identity: Option<CardIdentity>,
    picc_type: PiccType,
    read_back: Option<BlockRead>,
    outcome: CycleOutcome,
}

impl Cycle {
    fn new() -> Self {
        Self {
            path: vec![SessionState::Idle],
            identity: None,
            picc_type: PiccType::Unknown,
            read_back: None,
            outcome: CycleOutcome::NoCard,
        }
    }
}

/// Session owning a reader, a key and the workflow configuration
pub struct Session<P: Pcd, H: EventHandler = TracingEvents> {
    pcd: P,
    key: MifareKey,
    config: SessionConfig,
    data_block: BlockAddress,
    handler: H,
}

impl<P: Pcd, H: EventHandler> fmt::Debug for Session<P, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("pcd", &self.pcd)
            .field("key", &self.key)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<P: Pcd> Session<P> {
    /// Create a session that logs its progress through `tracing`
    pub fn new(pcd: P, key: MifareKey, config: SessionConfig) -> Result<Self> {
        Self::with_handler(pcd, key, config, TracingEvents)
    }
}

impl<P: Pcd, H: EventHandler> Session<P, H> {
    /// Create a session delivering progress events to `handler`
    pub fn with_handler(pcd: P, key: MifareKey, config: SessionConfig, handler: H) -> Result<Self> {
        let data_block = config.data_block()?;
        Ok(Self {
            pcd,
            key,
            config,
            data_block,
            handler,
        })
    }

    /// Get a reference to the reader
    pub const fn pcd(&self) -> &P {
        &self.pcd
    }

    /// Get a mutable reference to the reader
    pub const fn pcd_mut(&mut self) -> &mut P {
        &mut self.pcd
    }

    /// Take ownership of the reader
    pub fn into_pcd(self) -> P {
        self.pcd
    }

    /// Get the configuration
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Get the event handler
    pub const fn handler(&self) -> &H {
        &self.handler
    }

    /// Bring up the reader and announce the session
    pub fn init(&mut self) -> Result<()> {
        self.pcd.init()?;
        self.handler.handle_event(&WorkflowEvent::Started {
            key: self.key.to_hex(),
            sector: self.config.sector,
        });
        Ok(())
    }

    /// Poll until `limit` cards have been processed, or forever without a limit
    ///
    /// Idle polls do not count towards the limit. Returns the number of
    /// cycles that got past the poll.
    pub fn run(&mut self, limit: Option<NonZeroUsize>) -> usize {
        let mut processed = 0;
        loop {
            let report = self.run_cycle();
            match report.outcome {
                CycleOutcome::NoCard | CycleOutcome::SelectionFailed => {
                    std::thread::sleep(self.config.poll_interval);
                    continue;
                }
                _ => processed += 1,
            }
            if limit.is_some_and(|limit| processed >= limit.get()) {
                return processed;
            }
        }
    }

    /// Run one detection cycle, from `Idle` back to `Idle`
    #[instrument(level = "debug", skip(self), fields(sector = %self.config.sector))]
    pub fn run_cycle(&mut self) -> CycleReport {
        let mut cycle = Cycle::new();
        let mut state = SessionState::Idle;
        loop {
            let next = self.step(state, &mut cycle);
            debug!(from = %state, to = %next, "Session transition");
            cycle.path.push(next);
            if next == SessionState::Idle {
                break;
            }
            state = next;
        }
        CycleReport {
            path: cycle.path,
            outcome: cycle.outcome,
        }
    }

    fn step(&mut self, state: SessionState, cycle: &mut Cycle) -> SessionState {
        use SessionState::*;

        match state {
            Idle => {
                if self.pcd.poll_for_card() {
                    Detected
                } else {
                    cycle.outcome = CycleOutcome::NoCard;
                    Idle
                }
            }
            Detected => match self.pcd.select_card() {
                Some(identity) => {
                    cycle.identity = Some(identity);
                    Selected
                }
                None => {
                    cycle.outcome = CycleOutcome::SelectionFailed;
                    Idle
                }
            },
            Selected => {
                let Some(identity) = cycle.identity.as_ref() else {
                    return Halted;
                };
                cycle.picc_type = identity.picc_type();
                self.handler.handle_event(&WorkflowEvent::CardDetected {
                    uid: identity.uid().clone(),
                    picc_type: cycle.picc_type,
                });
                Classified
            }
            Classified => {
                if !cycle.picc_type.is_supported() {
                    return Unsupported;
                }
                if self.authenticate(KeyType::A, cycle) {
                    AuthenticatedA
                } else {
                    Halted
                }
            }
            Unsupported => {
                cycle.outcome = CycleOutcome::Unsupported(cycle.picc_type);
                self.handler.handle_event(&WorkflowEvent::UnsupportedCard {
                    picc_type: cycle.picc_type,
                });
                Halted
            }
            AuthenticatedA => match self.dump(cycle) {
                None => Dumped,
                // the sweep's own key A handshake failed; no crypto session is left for Read1
                Some(status) => {
                    self.authentication_failed(KeyType::A, status, cycle);
                    Halted
                }
            },
            Dumped => {
                self.read();
                Read1
            }
            Read1 => {
                if self.authenticate(KeyType::B, cycle) {
                    AuthenticatedB
                } else {
                    Halted
                }
            }
            AuthenticatedB => {
                let data = self.config.payload;
                self.handler.handle_event(&WorkflowEvent::Writing {
                    block: self.data_block,
                    data,
                });
                let status = write_block(&mut self.pcd, self.data_block, &data);
                self.handler.handle_event(&WorkflowEvent::BlockWritten {
                    block: self.data_block,
                    status,
                });
                Written
            }
            Written => {
                cycle.read_back = Some(self.read());
                Read2
            }
            Read2 => {
                let read_back = cycle.read_back.as_ref().and_then(BlockRead::data);
                let verification = Verification::compare(&self.config.payload, read_back.as_ref());
                self.handler
                    .handle_event(&WorkflowEvent::Verified(verification));
                cycle.outcome = CycleOutcome::Completed(verification);
                Verified
            }
            Verified => {
                if self.config.final_dump {
                    self.dump(cycle);
                }
                Halted
            }
            Halted => {
                self.pcd.halt().trace("halt");
                self.pcd.stop_crypto();
                cycle.identity = None;
                self.handler.handle_event(&WorkflowEvent::Halted);
                Idle
            }
        }
    }

    /// Authenticate against the configured trailer, recording a failure in the cycle
    fn authenticate(&mut self, key_type: KeyType, cycle: &mut Cycle) -> bool {
        let Some(identity) = cycle.identity.as_ref() else {
            return false;
        };
        self.handler
            .handle_event(&WorkflowEvent::Authenticating { key_type });
        let status = authenticate(
            &mut self.pcd,
            key_type,
            self.config.trailer_block(),
            &self.key,
            identity,
        );
        if status.is_ok() {
            return true;
        }
        self.authentication_failed(key_type, status, cycle);
        false
    }

    fn authentication_failed(
        &mut self,
        key_type: KeyType,
        status: StatusCode,
        cycle: &mut Cycle,
    ) {
        self.handler
            .handle_event(&WorkflowEvent::AuthenticationFailed { key_type, status });
        cycle.outcome = CycleOutcome::AuthenticationFailed { key_type, status };
    }

    /// Dump the configured sector
    ///
    /// Returns the status of the dump's key A authentication when it failed.
    fn dump(&mut self, cycle: &Cycle) -> Option<StatusCode> {
        let identity = cycle.identity.as_ref()?;
        let report =
            dump_sector(&mut self.pcd, identity, &self.key, self.config.sector).into_report();
        let auth_failure =
            (report.blocks.is_empty() && !report.status.is_ok()).then_some(report.status);
        self.handler
            .handle_event(&WorkflowEvent::SectorDumped(report));
        auth_failure
    }

    fn read(&mut self) -> BlockRead {
        let read = read_block(&mut self.pcd, self.data_block);
        self.handler.handle_event(&WorkflowEvent::BlockRead {
            block: self.data_block,
            status: read.status(),
            data: read.data(),
        });
        read
    }
}
