//! PC/SC reader backend for the MIFARE Classic workflow
//!
//! This crate implements the [`Pcd`](nexum_mifare_core::Pcd) trait from
//! `nexum-mifare-core` on top of contactless PC/SC readers, using the
//! PC/SC part 3 storage card commands (GET DATA, LOAD KEYS, GENERAL
//! AUTHENTICATE, READ BINARY and UPDATE BINARY).
//!
//! # Examples
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use nexum_mifare_core::{MifareKey, Session, SessionConfig};
//! use nexum_mifare_transport_pcsc::PcscDeviceManager;
//!
//! let manager = PcscDeviceManager::new()?;
//! let readers = manager.list_readers()?;
//! let reader = &readers[0];
//! println!("Using reader: {}", reader.name());
//!
//! let pcd = manager.open_reader(reader.name())?;
//! let mut session = Session::new(pcd, MifareKey::default(), SessionConfig::default())?;
//! session.init()?;
//! let report = session.run_cycle();
//! println!("{:?}", report.outcome);
//! # Ok(())
//! # }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![warn(missing_docs)]

pub mod atr;
pub mod commands;
mod config;
mod error;
mod manager;
mod pcd;
mod reader;

pub use config::{ConnectStrategy, PcscConfig, ShareMode};
pub use error::PcscError;
pub use manager::PcscDeviceManager;
pub use pcd::PcscPcd;
pub use reader::PcscReader;

// Re-export some pcsc types for convenience
pub use pcsc::Protocols;
