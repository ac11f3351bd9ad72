pub mod aggregator;
pub mod calculator;
pub mod pipeline;
pub mod quote_store;
pub mod submitter;

pub use aggregator::{select_quorum, SignatureAggregator};
pub use calculator::{classify, parse_amount, TradeAmountCalculator};
pub use pipeline::{TradeFailure, TradePipeline, TradePreview, TradeReceipt};
pub use quote_store::{QuoteStore, RefreshReport};
pub use submitter::{
    build_call, encode_price, trade_summary, CallData, PreparedTransaction, TransactionSubmitter,
    ISynchronizer, PRICE_DECIMALS,
};
