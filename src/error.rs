use alloy::primitives::Address;
use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the settlement pipeline
#[derive(Error, Debug)]
pub enum SynchroError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Unsupported chain: {0}")]
    UnsupportedChain(u64),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error: {0}")]
    Rpc(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Component errors
    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error(transparent)]
    Amount(#[from] AmountError),

    #[error(transparent)]
    Trade(#[from] TradeError),

    // Market data errors
    #[error("Instrument not found: {0}")]
    InstrumentNotFound(String),

    #[error("Quote feed unavailable: {0}")]
    QuoteFeedUnavailable(String),

    // State machine errors
    #[error("Invalid state transition: from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Address parsing error: {0}")]
    AddressParsing(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for SynchroError
pub type Result<T> = std::result::Result<T, SynchroError>;

/// Errors raised while collecting and selecting oracle attestations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Chain {chain_id} has no oracle network configured")]
    UnsupportedChain { chain_id: u64 },

    #[error("Oracle fetch did not complete: {0}")]
    TransportFailure(String),

    #[error("Insufficient quorum for {instrument}: found {found}, need {required}")]
    InsufficientQuorum {
        instrument: Address,
        found: usize,
        required: usize,
    },
}

/// Errors raised while turning typed input into exact token amounts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid fee rate: {0}")]
    InvalidFee(Decimal),

    #[error("Amount overflow while computing {0}")]
    Overflow(&'static str),
}

/// Outcome of the read-only simulation issued after a failed gas estimate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationOutcome {
    /// Simulation succeeded, so the estimator itself misbehaved
    Succeeded,
    /// Simulation reverted with the given reason
    Reverted(String),
}

/// Errors raised while validating, building and submitting a trade transaction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TradeError {
    #[error("No connected account or chain")]
    NoAccount,

    #[error("Instrument {0} is closed for trading")]
    InstrumentClosed(Address),

    #[error("Enter an amount")]
    InvalidAmount,

    #[error("Insufficient {symbol} balance: need {required}, have {available}")]
    InsufficientBalance {
        symbol: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("{message}")]
    GasEstimation {
        message: String,
        simulation: SimulationOutcome,
    },

    #[error("Transaction rejected by user")]
    UserRejected,

    #[error("Transaction failed: {0}")]
    Submission(String),

    #[error("Call encoding failed: {0}")]
    Encoding(String),
}

impl TradeError {
    /// Build the surfaced error for a failed gas estimate from the simulation result
    pub fn gas_estimation(simulation: SimulationOutcome) -> Self {
        let message = match &simulation {
            SimulationOutcome::Succeeded => {
                "Unexpected issue with estimating the gas. Please try again.".to_string()
            }
            SimulationOutcome::Reverted(reason) => format!("Call threw error: {}", reason),
        };
        TradeError::GasEstimation {
            message,
            simulation,
        }
    }
}

impl SynchroError {
    /// Whether this error came from the user cancelling in their wallet
    pub fn is_user_rejection(&self) -> bool {
        matches!(self, SynchroError::Trade(TradeError::UserRejected))
    }
}
