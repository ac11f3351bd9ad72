//! Output formatting for `synchro` commands.
//!
//! Supports two modes: human-readable tables (default) and JSON (--json).

use serde::Serialize;
use tabled::{Table, Tabled};

use crate::domain::{Attestation, Instrument, TradeDirection};

/// Output mode for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Table
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct InstrumentRow {
    pub symbol: String,
    pub name: String,
    pub sector: String,
    pub address: String,
    pub price: String,
    pub fee: String,
    pub open: String,
}

impl From<&Instrument> for InstrumentRow {
    fn from(i: &Instrument) -> Self {
        Self {
            symbol: i.display_symbol(),
            name: i.name.clone(),
            sector: i.sector.to_string(),
            address: i.address.to_checksum(None),
            price: i.price.clone(),
            fee: format!("{}%", (i.fee * rust_decimal::Decimal::ONE_HUNDRED).normalize()),
            open: if i.open { "yes" } else { "no" }.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct AttestationRow {
    pub origin: usize,
    pub price: String,
    pub block: u64,
    pub timestamp: u64,
    pub req_id: String,
}

impl AttestationRow {
    pub fn new(attestation: &Attestation, direction: TradeDirection) -> Self {
        let proof = attestation.proof(direction);
        Self {
            origin: attestation.origin_index,
            price: attestation.price.normalize().to_string(),
            block: attestation.block_no,
            timestamp: proof.timestamp,
            req_id: proof.req_id.to_string(),
        }
    }
}

/// Print a vec of Tabled + Serialize items in the chosen mode.
pub fn print_items<T: Tabled + Serialize>(items: &[T], mode: OutputMode) -> anyhow::Result<()> {
    match mode {
        OutputMode::Table => {
            if items.is_empty() {
                println!("(no results)");
            } else {
                let table = Table::new(items).to_string();
                println!("{table}");
            }
        }
        OutputMode::Json => {
            let json = serde_json::to_string_pretty(items)?;
            println!("{json}");
        }
    }
    Ok(())
}

/// Print a single Serialize item as JSON.
pub fn print_item<T: Serialize>(item: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(item)?);
    Ok(())
}

pub fn print_kv(key: &str, value: &str) {
    println!("{key}: {value}");
}

pub fn print_success(msg: &str) {
    println!("\x1b[32m{msg}\x1b[0m");
}

pub fn print_warn(msg: &str) {
    println!("\x1b[33m{msg}\x1b[0m");
}

pub fn print_error(msg: &str) {
    eprintln!("\x1b[31m{msg}\x1b[0m");
}

/// Prompt user for confirmation. Returns true if confirmed.
pub fn confirm(prompt: &str) -> bool {
    use std::io::{self, Write};
    print!("{prompt} [y/N] ");
    io::stdout().flush().ok();
    let mut input = String::new();
    io::stdin().read_line(&mut input).ok();
    matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
