use alloy::primitives::{Address, U256};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::AmountError;

/// Trade direction: acquire a synthetic with collateral, or liquidate it back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeDirection {
    Open,
    Close,
}

impl TradeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeDirection::Open => "OPEN",
            TradeDirection::Close => "CLOSE",
        }
    }

    /// Attestation action whose proof is submitted for this direction
    pub fn action(&self) -> &'static str {
        match self {
            TradeDirection::Open => "buy",
            TradeDirection::Close => "sell",
        }
    }

    /// Synchronizer method invoked for this direction
    pub fn method(&self) -> &'static str {
        match self {
            TradeDirection::Open => "buyFor",
            TradeDirection::Close => "sellFor",
        }
    }
}

impl std::fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TradeDirection {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "open" | "buy" => Ok(TradeDirection::Open),
            "close" | "sell" => Ok(TradeDirection::Close),
            _ => Err("invalid trade direction; expected open|close"),
        }
    }
}

/// Which leg of the trade the user typed into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypedField {
    /// The leg being spent (collateral on open, synthetic on close)
    Input,
    /// The leg being received (synthetic on open, collateral on close)
    Output,
}

impl FromStr for TypedField {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "input" | "in" => Ok(TypedField::Input),
            "output" | "out" => Ok(TypedField::Output),
            _ => Err("invalid field; expected input|output"),
        }
    }
}

/// Exact amounts for both legs; one side is what the user typed, the other is derived
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComputedAmounts {
    pub direction: TradeDirection,
    pub typed_field: TypedField,
    pub amount_in: Decimal,
    pub amount_out: Decimal,
    /// Fee charged, in collateral units
    pub fee_amount: Decimal,
    pub in_decimals: u32,
    pub out_decimals: u32,
}

impl ComputedAmounts {
    pub fn amount_in_raw(&self) -> std::result::Result<U256, AmountError> {
        to_raw_units(self.amount_in, self.in_decimals)
    }

    pub fn amount_out_raw(&self) -> std::result::Result<U256, AmountError> {
        to_raw_units(self.amount_out, self.out_decimals)
    }
}

/// First failing condition that blocks a trade, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrimaryError {
    /// No connected wallet or chain
    Account,
    /// Computed input amount is zero
    Amount,
    /// Computed input exceeds spendable balance
    Balance,
    Valid,
}

/// Caller-owned account state consumed by the pipeline
#[derive(Debug, Clone, Default)]
pub struct AccountContext {
    pub account: Option<Address>,
    pub chain_id: Option<u64>,
    /// Spendable balance of the input token
    pub balance: Decimal,
}

/// A user's request to trade one instrument
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRequest {
    pub chain_id: u64,
    pub instrument: Address,
    pub direction: TradeDirection,
    pub field: TypedField,
    /// Amount exactly as typed
    pub amount: String,
}

/// Truncate toward zero to `decimals` places
pub fn truncate(amount: Decimal, decimals: u32) -> Decimal {
    amount.round_dp_with_strategy(decimals, RoundingStrategy::ToZero)
}

/// Convert a human amount into integer token units, truncating extra precision
pub fn to_raw_units(amount: Decimal, decimals: u32) -> std::result::Result<U256, AmountError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(AmountError::InvalidAmount(amount.to_string()));
    }

    let mut scaled = truncate(amount, decimals);
    scaled.rescale(decimals);
    if scaled.scale() != decimals {
        return Err(AmountError::Overflow("raw token units"));
    }

    let mantissa = u128::try_from(scaled.mantissa())
        .map_err(|_| AmountError::InvalidAmount(amount.to_string()))?;
    Ok(U256::from(mantissa))
}

/// Convert integer token units back into a human amount
pub fn from_raw_units(raw: U256, decimals: u32) -> std::result::Result<Decimal, AmountError> {
    let value = u128::try_from(raw)
        .ok()
        .and_then(|v| i128::try_from(v).ok())
        .ok_or(AmountError::Overflow("token units"))?;
    Decimal::try_from_i128_with_scale(value, decimals)
        .map(|d| d.normalize())
        .map_err(|_| AmountError::Overflow("token units"))
}
