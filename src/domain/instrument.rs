use alloy::primitives::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// Market sector of the underlying asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sector {
    Equity,
    Crypto,
    Forex,
}

impl Sector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::Equity => "equity",
            Sector::Crypto => "crypto",
            Sector::Forex => "forex",
        }
    }
}

impl FromStr for Sector {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "stock" | "stocks" | "equity" => Ok(Sector::Equity),
            "crypto" => Ok(Sector::Crypto),
            "forex" | "fx" => Ok(Sector::Forex),
            other => Err(format!("unknown sector {other:?}")),
        }
    }
}

impl<'de> Deserialize<'de> for Sector {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for Sector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Position direction of a synthetic contract (selects which sibling is targeted)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// Get the sibling direction
    pub fn opposite(&self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
        }
    }

    /// Suffix used in display symbols, e.g. `TSLA-L`
    pub fn suffix(&self) -> char {
        match self {
            Direction::Long => 'L',
            Direction::Short => 'S',
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Direction {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "long" | "l" => Ok(Direction::Long),
            "short" | "s" => Ok(Direction::Short),
            _ => Err("invalid direction; expected long|short"),
        }
    }
}

/// A tradable synthetic: one directional contract merged from metadata, quote and availability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    /// Registrar identifier shared by both directions (e.g. "TSLA")
    pub id: String,
    pub name: String,
    pub symbol: String,
    pub chain_id: u64,
    pub sector: Sector,
    pub direction: Direction,
    /// Directional contract address
    pub address: Address,
    /// Opposite-direction contract for the same underlying
    pub sibling: Address,
    /// Collateral per one synthetic unit, as published by the quote feed
    pub price: String,
    /// Fee rate as a fraction (0.001 = 0.1%)
    pub fee: Decimal,
    /// Open for trading: quote not closed and enough attestations published
    pub open: bool,
}

impl Instrument {
    /// Symbol with a direction suffix, e.g. `TSLA-L`
    pub fn display_symbol(&self) -> String {
        format!("{}-{}", self.symbol, self.direction.suffix())
    }
}
