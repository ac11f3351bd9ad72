//! Synchro CLI - synthetic asset settlement from the terminal
//!
//! Commands:
//! - `synchro instruments` - List tradable instruments for a chain
//! - `synchro signatures` - Inspect the attestation quorum for one instrument
//! - `synchro amounts` - Offline trade amount calculation
//! - `synchro trade` - Run a full settlement attempt
//! - `synchro approve` - Approve the synchronizer to spend a token
//! - `synchro watch` - Keep quotes refreshed and report changes

pub mod output;

use alloy::primitives::Address;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use crate::domain::{Direction, TradeDirection, TypedField};

/// Synthetic asset settlement CLI
#[derive(Parser, Debug)]
#[command(name = "synchro")]
#[command(author, version, about = "Oracle-attested synthetic asset trading")]
pub struct Cli {
    /// Configuration directory
    #[arg(long, global = true, default_value = "config", env = "SYNCHRO_CONFIG_DIR")]
    pub config: String,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Refresh quotes and signature availability once and list instruments
    Instruments {
        #[arg(long)]
        chain: u64,
    },

    /// Fetch attestations and show the quorum selected for an instrument
    Signatures {
        #[arg(long)]
        chain: u64,
        /// Directional contract address
        #[arg(long)]
        instrument: Address,
        #[arg(long, default_value = "open")]
        direction: TradeDirection,
    },

    /// Compute trade amounts without touching the network
    Amounts {
        #[arg(long)]
        direction: TradeDirection,
        #[arg(long, default_value = "input")]
        field: TypedField,
        #[arg(long)]
        amount: String,
        /// Collateral per one synthetic unit
        #[arg(long)]
        price: String,
        /// Fee rate as a fraction (0.001 = 0.1%)
        #[arg(long, default_value = "0")]
        fee: Decimal,
        #[arg(long, default_value = "18")]
        collateral_decimals: u32,
        #[arg(long, default_value = "18")]
        synthetic_decimals: u32,
    },

    /// Open or close a synthetic position
    Trade {
        #[arg(long)]
        chain: u64,
        /// Registrar id, e.g. TSLA
        #[arg(long)]
        symbol: String,
        #[arg(long, default_value = "long")]
        side: Direction,
        #[arg(long)]
        direction: TradeDirection,
        #[arg(long, default_value = "input")]
        field: TypedField,
        #[arg(long)]
        amount: String,
        /// Stop before gas estimation and print what would be sent
        #[arg(long)]
        dry_run: bool,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Approve the synchronizer to spend collateral or a synthetic
    Approve {
        #[arg(long)]
        chain: u64,
        /// "collateral" or a synthetic contract address
        #[arg(long, default_value = "collateral")]
        token: String,
        /// Human amount, or "max"
        #[arg(long, default_value = "max")]
        amount: String,
    },

    /// Run the quote refresh loop until Ctrl-C
    Watch {
        #[arg(long)]
        chain: u64,
    },
}
