//! Display utilities for the MIFARE CLI

use colored::Colorize;
use nexum_mifare_core::{EventHandler, SectorDumpReport, StatusCode, WorkflowEvent};
use std::fmt::Display;

/// A formatted section title
pub struct SectionTitle(pub &'static str);

impl Display for SectionTitle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\n{}", self.0.bold().underline())
    }
}

/// Format a section header
pub const fn section_title(title: &'static str) -> SectionTitle {
    SectionTitle(title)
}

/// Format a success message
pub fn success(message: &str) -> String {
    format!("✅ {}", message.green().bold())
}

/// Format a warning message
pub fn warning(message: &str) -> String {
    format!("⚠️  {}", message.yellow().bold())
}

/// Format an info message
pub fn info(message: &str) -> String {
    format!("ℹ️  {}", message.blue())
}

/// Format a key-value section for important outputs
pub fn key_value_box(title: &str, items: Vec<(&str, String)>) -> String {
    let mut result = format!("{}", title.bold().underline());

    for (key, value) in items {
        result.push_str(&format!("\n  {}: {}", key.bold(), value));
    }

    result
}

/// Format a failed status with its name and description
pub fn status_failure(step: &str, status: StatusCode) -> String {
    warning(&format!(
        "{step} failed: {} ({})",
        status.name(),
        status.description()
    ))
}

/// Format a sector dump as a table, trailer first
pub fn sector_table(report: &SectorDumpReport) -> String {
    let mut result = format!(
        "{}\n{}",
        format!("Current data in {}:", report.sector).bold(),
        "Block   0  1  2  3  4  5  6  7  8  9 10 11 12 13 14 15  AccessBits".dimmed()
    );
    for block in &report.blocks {
        result.push_str(&format!("\n{block}"));
    }
    if report.access_consistent == Some(false) {
        result.push_str(&format!("\n{}", warning("Inverted access bits did not match")));
    }
    if !report.is_complete() {
        result.push_str(&format!("\n{}", status_failure("Sector dump", report.status)));
    }
    result
}

/// Event handler printing workflow progress to the terminal
#[derive(Debug, Default)]
pub struct ConsoleEvents;

impl EventHandler for ConsoleEvents {
    fn handle_event(&mut self, event: &WorkflowEvent) {
        match event {
            WorkflowEvent::Started { key, sector } => {
                println!("{}", section_title("MIFARE Classic read/write"));
                println!(
                    "{}",
                    key_value_box(
                        "Session",
                        vec![
                            ("Key (A and B)", key.clone()),
                            ("Sector", sector.index().to_string()),
                        ],
                    )
                );
                println!(
                    "{}",
                    info("Scan a MIFARE Classic PICC to demonstrate read and write")
                );
                println!("{}", "BEWARE: data will be written to the PICC".yellow());
            }
            WorkflowEvent::CardDetected { uid, picc_type } => {
                println!("{}", section_title("Card detected"));
                println!(
                    "{}",
                    key_value_box(
                        "PICC",
                        vec![("UID", uid.to_string()), ("Type", picc_type.to_string())],
                    )
                );
            }
            WorkflowEvent::UnsupportedCard { picc_type } => {
                println!(
                    "{}",
                    warning(&format!(
                        "{picc_type}: this sample only works with MIFARE Classic cards"
                    ))
                );
            }
            WorkflowEvent::Authenticating { key_type } => {
                println!("{}", info(&format!("Authenticating using key {key_type}...")));
            }
            WorkflowEvent::AuthenticationFailed { status, .. } => {
                println!("{}", status_failure("Authentication", *status));
            }
            WorkflowEvent::SectorDumped(report) => println!("{}", sector_table(report)),
            WorkflowEvent::BlockRead {
                block,
                status,
                data,
            } => match data {
                Some(data) => println!("Data in block {block}:\n  {data}"),
                None => println!("{}", status_failure(&format!("Reading block {block}"), *status)),
            },
            WorkflowEvent::Writing { block, data } => {
                println!("Writing data into block {block}:\n  {data}");
            }
            WorkflowEvent::BlockWritten { block, status } => {
                if !status.is_ok() {
                    println!("{}", status_failure(&format!("Writing block {block}"), *status));
                }
            }
            WorkflowEvent::Verified(verification) => {
                println!("Checking result...");
                println!("Number of bytes that match = {}", verification.matched);
                if verification.passed() {
                    println!("{}", success("Success :-)"));
                } else {
                    println!(
                        "{}",
                        warning("Failure, no match :-(\n  perhaps the write didn't work properly...")
                    );
                }
            }
            WorkflowEvent::Halted => println!("{}", "Card halted".dimmed()),
        }
    }
}
