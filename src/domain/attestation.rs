use alloy::primitives::{Bytes, B256};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use super::TradeDirection;

/// Proof that one gateway attested a price for one trade action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionProof {
    #[serde(deserialize_with = "deserialize_u64_lenient")]
    pub timestamp: u64,
    pub req_id: B256,
    pub signature: Bytes,
}

/// Signed price quote from one oracle gateway for one instrument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attestation {
    pub price: Decimal,
    #[serde(default)]
    pub fee: Decimal,
    pub buy: ActionProof,
    pub sell: ActionProof,
    #[serde(default, deserialize_with = "deserialize_u64_lenient")]
    pub block_no: u64,
    /// Position of the producing gateway in the configured list
    #[serde(skip)]
    pub origin_index: usize,
}

impl Attestation {
    /// Proof matching the contract action for this direction
    pub fn proof(&self, direction: TradeDirection) -> &ActionProof {
        match direction {
            TradeDirection::Open => &self.buy,
            TradeDirection::Close => &self.sell,
        }
    }

    pub fn with_origin(mut self, origin_index: usize) -> Self {
        self.origin_index = origin_index;
        self
    }
}

/// One gateway's payload keyed by checksummed instrument address.
/// `entries` is `None` when the gateway could not be reached or decoded.
#[derive(Debug, Clone, Default)]
pub struct GatewayResponse {
    pub origin_index: usize,
    pub gateway: String,
    pub entries: Option<HashMap<String, Attestation>>,
}

impl GatewayResponse {
    pub fn is_available(&self) -> bool {
        self.entries.is_some()
    }
}

/// Attestations chosen for submission, ordered by ascending origin index
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuorumSelection {
    /// Execution price for opens; `None` on close since the contract derives it
    pub price: Option<String>,
    pub data: Vec<Attestation>,
}

fn deserialize_u64_lenient<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom(format!("expected unsigned integer, got {n}"))),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|e| serde::de::Error::custom(format!("invalid integer {s:?}: {e}"))),
        other => Err(serde::de::Error::custom(format!(
            "expected integer, got {other}"
        ))),
    }
}
