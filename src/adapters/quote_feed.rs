//! Read-only client for the instrument quote feed
//!
//! Three tables per network, refreshed independently:
//! - `conducted.json`: registrar ids with their long/short contract addresses
//! - `price.json`: per-direction price, fee rate and closed flag
//! - `registrar-detail.json`: human-readable names, symbols and sectors

use std::collections::HashMap;
use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use tracing::{debug, instrument, warn};

use crate::domain::{Direction, Sector};
use crate::error::{Result, SynchroError};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConductedEntry {
    pub id: String,
    pub long: Address,
    pub short: Address,
}

impl ConductedEntry {
    pub fn address(&self, direction: Direction) -> Address {
        match direction {
            Direction::Long => self.long,
            Direction::Short => self.short,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConductedTable {
    conducted: Vec<ConductedEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PriceQuote {
    #[serde(deserialize_with = "deserialize_price")]
    pub price: String,
    #[serde(default)]
    pub fee: Decimal,
    #[serde(default)]
    pub is_close: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DirectionalQuotes {
    #[serde(rename = "Long", alias = "long", alias = "LONG", default)]
    pub long: Option<PriceQuote>,
    #[serde(rename = "Short", alias = "short", alias = "SHORT", default)]
    pub short: Option<PriceQuote>,
}

impl DirectionalQuotes {
    pub fn get(&self, direction: Direction) -> Option<&PriceQuote> {
        match direction {
            Direction::Long => self.long.as_ref(),
            Direction::Short => self.short.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstrumentDetail {
    pub name: String,
    #[serde(default)]
    pub symbol: Option<String>,
    pub sector: Sector,
}

/// Source of the three quote tables, keyed by network path segment
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn conducted(&self, network: &str) -> Result<Vec<ConductedEntry>>;

    async fn prices(&self, network: &str) -> Result<HashMap<String, DirectionalQuotes>>;

    async fn details(&self, network: &str) -> Result<HashMap<String, InstrumentDetail>>;
}

/// HTTP implementation of [`QuoteSource`]
#[derive(Debug, Clone)]
pub struct QuoteFeedClient {
    http: reqwest::Client,
    base_url: String,
}

impl QuoteFeedClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, network: &str, file: &str) -> Result<T> {
        let url = format!("{}/{}/{}", self.base_url, network, file);
        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(SynchroError::QuoteFeedUnavailable(format!(
                "{} returned HTTP {}",
                url,
                response.status()
            )));
        }

        let body = response.json::<T>().await?;
        debug!("Fetched {}", url);
        Ok(body)
    }
}

#[async_trait]
impl QuoteSource for QuoteFeedClient {
    #[instrument(skip(self))]
    async fn conducted(&self, network: &str) -> Result<Vec<ConductedEntry>> {
        let table: ConductedTable = self.get_json(network, "conducted.json").await?;
        Ok(table.conducted)
    }

    #[instrument(skip(self))]
    async fn prices(&self, network: &str) -> Result<HashMap<String, DirectionalQuotes>> {
        self.get_json(network, "price.json").await
    }

    #[instrument(skip(self))]
    async fn details(&self, network: &str) -> Result<HashMap<String, InstrumentDetail>> {
        let raw: HashMap<String, serde_json::Value> =
            self.get_json(network, "registrar-detail.json").await?;
        Ok(decode_details(raw))
    }
}

/// Decode detail rows one by one; a bad row is dropped, not the whole table
pub fn decode_details(raw: HashMap<String, serde_json::Value>) -> HashMap<String, InstrumentDetail> {
    let total = raw.len();
    let details: HashMap<String, InstrumentDetail> = raw
        .into_iter()
        .filter_map(|(id, value)| match serde_json::from_value(value) {
            Ok(detail) => Some((id, detail)),
            Err(e) => {
                warn!("Dropping undecodable registrar detail for {}: {}", id, e);
                None
            }
        })
        .collect();

    debug!("Decoded {}/{} registrar details", details.len(), total);
    details
}

fn deserialize_price<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected price string or number, got {other}"
        ))),
    }
}
