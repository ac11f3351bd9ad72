pub mod adapters;
pub mod cli;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod services;
pub mod signing;

pub use config::AppConfig;
pub use coordination::{CancelHandle, CancelToken};
pub use error::{Result, SynchroError};
pub use services::{
    QuoteStore, SignatureAggregator, TradeAmountCalculator, TradePipeline, TransactionSubmitter,
};
pub use signing::Wallet;
