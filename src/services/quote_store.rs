//! Quote store: latest instrument snapshot per chain
//!
//! Keeps the three feed tables plus signature availability per chain and re-merges
//! them into an immutable `Arc<Vec<Instrument>>` whenever any table changes.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::adapters::{ConductedEntry, DirectionalQuotes, InstrumentDetail, QuoteSource};
use crate::coordination::CancelToken;
use crate::domain::{Direction, Instrument};
use crate::error::{Result, SynchroError};

#[derive(Debug, Default, Clone)]
struct ChainTables {
    conducted: Option<Vec<ConductedEntry>>,
    prices: Option<HashMap<String, DirectionalQuotes>>,
    details: Option<HashMap<String, InstrumentDetail>>,
    available: Option<HashSet<Address>>,
    merged: Arc<Vec<Instrument>>,
}

/// Which tables a refresh managed to update
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub conducted: bool,
    pub prices: bool,
    pub details: bool,
}

impl RefreshReport {
    pub fn all_ok(&self) -> bool {
        self.conducted && self.prices && self.details
    }
}

pub struct QuoteStore {
    source: Arc<dyn QuoteSource>,
    /// chain id -> network path segment
    networks: HashMap<u64, String>,
    tables: RwLock<HashMap<u64, ChainTables>>,
}

impl QuoteStore {
    pub fn new(source: Arc<dyn QuoteSource>, networks: HashMap<u64, String>) -> Self {
        Self {
            source,
            networks,
            tables: RwLock::new(HashMap::new()),
        }
    }

    fn network(&self, chain_id: u64) -> Result<&str> {
        self.networks
            .get(&chain_id)
            .map(String::as_str)
            .ok_or(SynchroError::UnsupportedChain(chain_id))
    }

    /// Refresh all three feed tables for a chain. A failed table keeps its last good copy.
    pub async fn refresh_chain(&self, chain_id: u64) -> Result<RefreshReport> {
        let network = self.network(chain_id)?;

        let (conducted, prices, details) = tokio::join!(
            self.source.conducted(network),
            self.source.prices(network),
            self.source.details(network),
        );

        let mut report = RefreshReport::default();
        let mut tables = self.tables.write().await;
        let entry = tables.entry(chain_id).or_default();

        match conducted {
            Ok(v) => {
                entry.conducted = Some(v);
                report.conducted = true;
            }
            Err(e) => warn!("conducted.json refresh failed for {}: {}", network, e),
        }
        match prices {
            Ok(v) => {
                entry.prices = Some(v);
                report.prices = true;
            }
            Err(e) => warn!("price.json refresh failed for {}: {}", network, e),
        }
        match details {
            Ok(v) => {
                entry.details = Some(v);
                report.details = true;
            }
            Err(e) => warn!("registrar-detail.json refresh failed for {}: {}", network, e),
        }

        entry.merged = Arc::new(merge(chain_id, entry));
        debug!(
            "Chain {} snapshot rebuilt: {} instruments",
            chain_id,
            entry.merged.len()
        );
        Ok(report)
    }

    /// Replace the signature-availability table for a chain
    pub async fn update_availability(&self, chain_id: u64, available: HashSet<Address>) {
        let mut tables = self.tables.write().await;
        let entry = tables.entry(chain_id).or_default();
        entry.available = Some(available);
        entry.merged = Arc::new(merge(chain_id, entry));
    }

    /// Current immutable snapshot for a chain
    pub async fn instruments(&self, chain_id: u64) -> Arc<Vec<Instrument>> {
        self.tables
            .read()
            .await
            .get(&chain_id)
            .map(|t| t.merged.clone())
            .unwrap_or_default()
    }

    pub async fn instrument_by_address(&self, chain_id: u64, address: Address) -> Option<Instrument> {
        self.instruments(chain_id)
            .await
            .iter()
            .find(|i| i.address == address)
            .cloned()
    }

    pub async fn instrument(
        &self,
        chain_id: u64,
        id: &str,
        direction: Direction,
    ) -> Option<Instrument> {
        self.instruments(chain_id)
            .await
            .iter()
            .find(|i| i.direction == direction && i.id.eq_ignore_ascii_case(id))
            .cloned()
    }

    pub async fn sibling_of(&self, chain_id: u64, address: Address) -> Option<Instrument> {
        let sibling = self.instrument_by_address(chain_id, address).await?.sibling;
        self.instrument_by_address(chain_id, sibling).await
    }

    /// Refresh every configured chain on an interval until cancelled
    pub async fn run(&self, interval: Duration, mut cancel: CancelToken) {
        let mut ticker = tokio::time::interval(interval);
        let mut chains: Vec<u64> = self.networks.keys().copied().collect();
        chains.sort_unstable();
        info!("Quote refresh loop started for chains {:?}", chains);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    for chain_id in &chains {
                        if let Err(e) = self.refresh_chain(*chain_id).await {
                            warn!("Quote refresh failed for chain {}: {}", chain_id, e);
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    info!("Quote refresh loop stopped");
                    break;
                }
            }
        }
    }
}

fn merge(chain_id: u64, tables: &ChainTables) -> Vec<Instrument> {
    let (Some(conducted), Some(prices), Some(details)) =
        (&tables.conducted, &tables.prices, &tables.details)
    else {
        return Vec::new();
    };

    let mut instruments = Vec::with_capacity(conducted.len() * 2);
    for entry in conducted {
        let Some(detail) = details.get(&entry.id) else {
            debug!("No registrar detail for {}, skipping", entry.id);
            continue;
        };
        let Some(quotes) = prices.get(&entry.id) else {
            debug!("No quote for {}, skipping", entry.id);
            continue;
        };

        for direction in [Direction::Long, Direction::Short] {
            let Some(quote) = quotes.get(direction) else {
                continue;
            };
            let address = entry.address(direction);
            let available = tables
                .available
                .as_ref()
                .map(|set| set.contains(&address))
                .unwrap_or(false);

            instruments.push(Instrument {
                id: entry.id.clone(),
                name: detail.name.clone(),
                symbol: detail.symbol.clone().unwrap_or_else(|| entry.id.clone()),
                chain_id,
                sector: detail.sector,
                direction,
                address,
                sibling: entry.address(direction.opposite()),
                price: quote.price.clone(),
                fee: quote.fee,
                open: !quote.is_close && available,
            });
        }
    }
    instruments
}
