//! Core MIFARE Classic card workflow
//!
//! This crate provides the card model and the read/write workflow that runs on
//! top of any proximity coupling device (PCD) implementing [`Pcd`]:
//!
//! - card identities and type classification from the SAK byte
//! - sector geometry for Mini, 1K and 4K cards
//! - keys, access conditions, data and value blocks
//! - authentication, block I/O and sector dumps
//! - the [`Session`] state machine that detects a card, authenticates,
//!   reads, writes and verifies a block
//!
//! A software card ([`sim::SimulatedPcd`]) is included for tests and demos.
//! Physical readers are provided by transport crates.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod access;
pub mod auth;
pub mod block;
pub mod dump;
mod error;
pub mod io;
pub mod key;
pub mod pcd;
pub mod picc;
pub mod sector;
pub mod sim;
pub mod status;
pub mod workflow;

pub use access::{AccessBits, AccessConditions, TRANSPORT_ACCESS_BITS};
pub use auth::{authenticate, authenticate_sector};
pub use block::{BLOCK_SIZE, DataBlock, READ_BUFFER_SIZE, ReadBuffer, ValueBlock, crc_a};
pub use dump::{DumpedBlock, SectorDump, SectorDumpReport, dump_sector};
pub use error::{Error, Result, ResultExt};
pub use io::{BlockRead, read_block, write_block};
pub use key::{DEFAULT_KEY, KEY_SIZE, KeyType, MifareKey};
pub use pcd::Pcd;
pub use picc::{CardIdentity, PiccType, Uid, classify};
pub use sector::{BlockAddress, MAX_SECTORS, Sector};
pub use status::{StatusCode, status_name};
pub use workflow::{
    CycleOutcome, CycleReport, DEMO_PAYLOAD, EventHandler, Session, SessionConfig, SessionState,
    TracingEvents, Verdict, Verification, WorkflowEvent,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        CardIdentity, DataBlock, Error, EventHandler, KeyType, MifareKey, Pcd, PiccType,
        Result, ResultExt, Sector, Session, SessionConfig, StatusCode, Uid, WorkflowEvent,
    };
}
