pub mod oracle_gateway;
pub mod quote_feed;
pub mod rpc;
pub mod tx_log;

pub use oracle_gateway::OracleGatewayClient;
pub use quote_feed::{
    ConductedEntry, DirectionalQuotes, InstrumentDetail, PriceQuote, QuoteFeedClient, QuoteSource,
};
pub use rpc::{AlloyRpc, ChainRpc, RpcFailure, TokenReader, TxRequest, IERC20};
pub use tx_log::{
    ApprovalInfo, InMemoryTransactionLog, TransactionEntry, TransactionLog, TransactionRecord,
};
