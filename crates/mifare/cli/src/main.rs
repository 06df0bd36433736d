use std::num::NonZeroUsize;

use clap::{Parser, Subcommand};
use nexum_mifare_core::{MifareKey, Sector, SessionConfig};
use nexum_mifare_transport_pcsc::PcscDeviceManager;
use tracing::info;

mod commands;
mod utils;

use commands::*;
use utils::{SimulatedCard, reader};

#[derive(Parser)]
#[command(version, about = "Read and write MIFARE Classic cards")]
struct Cli {
    /// Optional reader name to use (first reader if not specified)
    #[arg(short, long)]
    reader: Option<String>,

    /// Trace level output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available readers
    List,

    /// Authenticate, dump, write and verify one block of every card presented
    Run {
        /// Sector to operate on
        #[arg(short, long, default_value_t = 1)]
        sector: u8,

        /// Data block offset within the sector
        #[arg(short, long, default_value_t = 0)]
        offset: u8,

        /// Stop after this many cards (runs forever if not specified)
        #[arg(short, long)]
        cycles: Option<NonZeroUsize>,

        /// Key used for both slots, as 12 hex digits
        #[arg(short, long, default_value = "FFFFFFFFFFFF")]
        key: String,

        /// Use a simulated card instead of a PC/SC reader
        #[arg(long, value_enum)]
        simulate: Option<SimulatedCard>,

        /// Skip the sector dump after verification
        #[arg(long)]
        no_final_dump: bool,
    },

    /// Dump one sector of the next card presented
    Dump {
        /// Sector to dump
        #[arg(short, long, default_value_t = 1)]
        sector: u8,

        /// Key A, as 12 hex digits
        #[arg(short, long, default_value = "FFFFFFFFFFFF")]
        key: String,

        /// Use a simulated card instead of a PC/SC reader
        #[arg(long, value_enum)]
        simulate: Option<SimulatedCard>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    match &cli.command {
        Commands::List => {
            let manager = PcscDeviceManager::new()?;
            reader::list_readers(&manager)?;
        }
        Commands::Run {
            sector,
            offset,
            cycles,
            key,
            simulate,
            no_final_dump,
        } => {
            let key: MifareKey = key.parse()?;
            let config = SessionConfig::default()
                .with_sector(parse_sector(*sector)?)
                .with_data_offset(*offset)
                .with_final_dump(!no_final_dump);

            match simulate {
                Some(card) => run_command(card.pcd(), key, config, *cycles)?,
                None => {
                    let manager = PcscDeviceManager::new()?;
                    let pcd = reader::open_reader(&manager, cli.reader.as_deref())?;
                    info!("Using reader: {}", pcd.reader_name());
                    run_command(pcd, key, config, *cycles)?
                }
            }
        }
        Commands::Dump {
            sector,
            key,
            simulate,
        } => {
            let key: MifareKey = key.parse()?;
            let sector = parse_sector(*sector)?;
            let poll_interval = SessionConfig::default().poll_interval;

            match simulate {
                Some(card) => dump_command(&mut card.pcd(), key, sector, poll_interval)?,
                None => {
                    let manager = PcscDeviceManager::new()?;
                    let mut pcd = reader::open_reader(&manager, cli.reader.as_deref())?;
                    info!("Using reader: {}", pcd.reader_name());
                    dump_command(&mut pcd, key, sector, poll_interval)?
                }
            }
        }
    }

    Ok(())
}

fn parse_sector(index: u8) -> Result<Sector, String> {
    Sector::new(index).ok_or_else(|| format!("Sector {index} does not exist on any MIFARE Classic card"))
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_ansi(true)
        .init();
}
