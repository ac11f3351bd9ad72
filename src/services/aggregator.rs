//! Oracle signature aggregation
//!
//! Fans out one request per gateway, tolerates individual gateway failures, and selects
//! the attestation subset submitted with a trade:
//! - OPEN keeps the highest-priced attestations and executes at the top price.
//! - CLOSE keeps the lowest-priced attestations and leaves pricing to the contract.
//!
//! Whatever the criterion, the submitted subset is ordered by gateway origin index.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use alloy::primitives::Address;
use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use crate::adapters::OracleGatewayClient;
use crate::config::AppConfig;
use crate::domain::{Attestation, GatewayResponse, QuorumSelection, TradeDirection};
use crate::error::{Result, SignatureError, SynchroError};

pub struct SignatureAggregator {
    client: OracleGatewayClient,
    gateways: Vec<String>,
    /// chain id -> network path segment
    networks: HashMap<u64, String>,
    min_quorum: usize,
    expected_signatures: usize,
}

impl SignatureAggregator {
    pub fn new(
        client: OracleGatewayClient,
        gateways: Vec<String>,
        networks: HashMap<u64, String>,
        min_quorum: usize,
        expected_signatures: usize,
    ) -> Result<Self> {
        if min_quorum == 0 || min_quorum > expected_signatures {
            return Err(SynchroError::Validation(format!(
                "quorum of {} cannot be met by {} expected signatures",
                min_quorum, expected_signatures
            )));
        }

        Ok(Self {
            client,
            gateways,
            networks,
            min_quorum,
            expected_signatures,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client =
            OracleGatewayClient::new(Duration::from_millis(config.oracle.request_timeout_ms))?;
        let networks = config
            .chains
            .iter()
            .map(|c| (c.chain_id, c.name.clone()))
            .collect();

        Self::new(
            client,
            config.oracle.gateways.clone(),
            networks,
            config.oracle.min_quorum,
            config.oracle.expected_signatures(),
        )
    }

    pub fn min_quorum(&self) -> usize {
        self.min_quorum
    }

    pub fn expected_signatures(&self) -> usize {
        self.expected_signatures
    }

    /// Fetch every gateway concurrently. Result position is the origin index.
    #[instrument(skip(self))]
    pub async fn fetch_signatures(
        &self,
        chain_id: u64,
    ) -> std::result::Result<Vec<GatewayResponse>, SignatureError> {
        let network = self
            .networks
            .get(&chain_id)
            .ok_or(SignatureError::UnsupportedChain { chain_id })?;

        // Build every URL before the first request goes out
        let urls = self
            .gateways
            .iter()
            .map(|gateway| OracleGatewayClient::signatures_url(gateway, network))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let tasks: Vec<_> = urls
            .into_iter()
            .map(|url| {
                let client = self.client.clone();
                tokio::spawn(async move { client.fetch(url).await })
            })
            .collect();

        let mut responses = Vec::with_capacity(tasks.len());
        for (origin_index, joined) in join_all(tasks).await.into_iter().enumerate() {
            let entries = joined.map_err(|e| {
                SignatureError::TransportFailure(format!(
                    "gateway task {} did not complete: {}",
                    origin_index, e
                ))
            })?;
            responses.push(GatewayResponse {
                origin_index,
                gateway: self.gateways[origin_index].clone(),
                entries,
            });
        }

        let reachable = responses.iter().filter(|r| r.is_available()).count();
        info!(
            "Fetched signatures from {}/{} gateways for {}",
            reachable,
            responses.len(),
            network
        );
        Ok(responses)
    }

    /// Select the attestation subset for one instrument and direction
    pub fn select_signatures(
        &self,
        responses: &[GatewayResponse],
        instrument: Address,
        direction: TradeDirection,
    ) -> std::result::Result<QuorumSelection, SignatureError> {
        select_quorum(
            responses,
            instrument,
            direction,
            self.min_quorum,
            self.expected_signatures,
        )
    }

    /// Instruments for which at least `min_quorum` gateways publish an attestation
    pub fn available_instruments(&self, responses: &[GatewayResponse]) -> HashSet<Address> {
        let mut counts: HashMap<Address, usize> = HashMap::new();
        for entries in responses.iter().filter_map(|r| r.entries.as_ref()) {
            for key in entries.keys() {
                match key.parse::<Address>() {
                    Ok(address) => *counts.entry(address).or_default() += 1,
                    Err(_) => debug!("Ignoring non-address key {}", key),
                }
            }
        }

        counts
            .into_iter()
            .filter(|(_, count)| *count >= self.min_quorum)
            .map(|(address, _)| address)
            .collect()
    }
}

/// Quorum selection over already-fetched gateway responses
pub fn select_quorum(
    responses: &[GatewayResponse],
    instrument: Address,
    direction: TradeDirection,
    min_quorum: usize,
    expected_signatures: usize,
) -> std::result::Result<QuorumSelection, SignatureError> {
    let key = instrument.to_checksum(None);

    let mut candidates: Vec<Attestation> = responses
        .iter()
        .filter_map(|response| {
            response
                .entries
                .as_ref()?
                .get(&key)
                .map(|a| a.clone().with_origin(response.origin_index))
        })
        .collect();

    if candidates.len() < min_quorum {
        warn!(
            "Insufficient quorum for {}: {} of {} required",
            key,
            candidates.len(),
            min_quorum
        );
        return Err(SignatureError::InsufficientQuorum {
            instrument,
            found: candidates.len(),
            required: min_quorum,
        });
    }

    // Stable: equal prices keep discovery order
    candidates.sort_by(|a, b| b.price.cmp(&a.price));

    let price = match direction {
        TradeDirection::Open => candidates.first().map(|top| top.price.to_string()),
        TradeDirection::Close => {
            candidates.reverse();
            None
        }
    };

    candidates.truncate(expected_signatures);
    candidates.sort_by_key(|a| a.origin_index);

    debug!(
        "Selected {} attestations for {} {} (origins {:?})",
        candidates.len(),
        direction,
        key,
        candidates.iter().map(|a| a.origin_index).collect::<Vec<_>>()
    );

    Ok(QuorumSelection {
        price,
        data: candidates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ActionProof;
    use alloy::primitives::{Bytes, B256};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn instrument() -> Address {
        Address::repeat_byte(0xab)
    }

    fn attestation(price: &str) -> Attestation {
        let proof = ActionProof {
            timestamp: 1,
            req_id: B256::repeat_byte(1),
            signature: Bytes::from(vec![1]),
        };
        Attestation {
            price: Decimal::from_str(price).unwrap(),
            fee: Decimal::ZERO,
            buy: proof.clone(),
            sell: proof,
            block_no: 1,
            origin_index: 0,
        }
    }

    fn responses(prices: &[Option<&str>]) -> Vec<GatewayResponse> {
        let key = instrument().to_checksum(None);
        prices
            .iter()
            .enumerate()
            .map(|(i, price)| GatewayResponse {
                origin_index: i,
                gateway: format!("https://oracle{}.example", i),
                entries: price.map(|p| {
                    let mut map = HashMap::new();
                    map.insert(key.clone(), attestation(p));
                    map
                }),
            })
            .collect()
    }

    fn prices_of(selection: &QuorumSelection) -> Vec<String> {
        selection.data.iter().map(|a| a.price.to_string()).collect()
    }

    fn origins_of(selection: &QuorumSelection) -> Vec<usize> {
        selection.data.iter().map(|a| a.origin_index).collect()
    }

    #[test]
    fn open_takes_highest_prices_ordered_by_origin() {
        let responses = responses(&[Some("10"), Some("12"), Some("8")]);
        let selection =
            select_quorum(&responses, instrument(), TradeDirection::Open, 1, 2).unwrap();

        assert_eq!(selection.price.as_deref(), Some("12"));
        assert_eq!(origins_of(&selection), vec![0, 1]);
        assert_eq!(prices_of(&selection), vec!["10", "12"]);
    }

    #[test]
    fn close_takes_lowest_prices_without_price() {
        let responses = responses(&[Some("10"), Some("12"), Some("8")]);
        let selection =
            select_quorum(&responses, instrument(), TradeDirection::Close, 1, 2).unwrap();

        assert_eq!(selection.price, None);
        assert_eq!(origins_of(&selection), vec![0, 2]);
        assert_eq!(prices_of(&selection), vec!["10", "8"]);
    }

    #[test]
    fn missing_gateways_are_skipped_but_keep_their_origin_slot() {
        let responses = responses(&[None, Some("11"), Some("9")]);
        let selection =
            select_quorum(&responses, instrument(), TradeDirection::Open, 2, 3).unwrap();

        assert_eq!(origins_of(&selection), vec![1, 2]);
        assert_eq!(selection.price.as_deref(), Some("11"));
    }

    #[test]
    fn below_quorum_fails() {
        let responses = responses(&[None, Some("11"), None]);
        let err =
            select_quorum(&responses, instrument(), TradeDirection::Open, 2, 3).unwrap_err();

        assert_eq!(
            err,
            SignatureError::InsufficientQuorum {
                instrument: instrument(),
                found: 1,
                required: 2,
            }
        );
    }

    #[test]
    fn lookup_uses_checksummed_address() {
        let mut responses = responses(&[Some("10")]);
        let lowered: HashMap<String, Attestation> = responses[0]
            .entries
            .take()
            .unwrap()
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        responses[0].entries = Some(lowered);

        assert!(select_quorum(&responses, instrument(), TradeDirection::Open, 1, 1).is_err());
    }

    #[test]
    fn selection_size_stays_within_bounds() {
        let cases: Vec<Vec<Option<&str>>> = vec![
            vec![Some("1")],
            vec![Some("1"), Some("2")],
            vec![Some("3"), None, Some("2"), Some("5")],
            vec![Some("4"), Some("4"), Some("4"), Some("4"), Some("4")],
        ];

        for prices in cases {
            let responses = responses(&prices);
            for direction in [TradeDirection::Open, TradeDirection::Close] {
                for expected in 1..=prices.len() {
                    for min_quorum in 1..=expected {
                        match select_quorum(&responses, instrument(), direction, min_quorum, expected)
                        {
                            Ok(selection) => {
                                assert!(selection.data.len() >= min_quorum);
                                assert!(selection.data.len() <= expected);
                                let origins = origins_of(&selection);
                                assert!(origins.windows(2).all(|w| w[0] < w[1]));
                            }
                            Err(SignatureError::InsufficientQuorum { found, required, .. }) => {
                                assert!(found < required);
                            }
                            Err(other) => panic!("unexpected error {other:?}"),
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn equal_prices_preserve_discovery_order_on_open() {
        let responses = responses(&[Some("5"), Some("5"), Some("5")]);
        let selection =
            select_quorum(&responses, instrument(), TradeDirection::Open, 1, 2).unwrap();
        assert_eq!(origins_of(&selection), vec![0, 1]);

        let selection =
            select_quorum(&responses, instrument(), TradeDirection::Close, 1, 2).unwrap();
        assert_eq!(origins_of(&selection), vec![1, 2]);
    }

    #[test]
    fn availability_counts_gateways_per_instrument() {
        let client = OracleGatewayClient::new(Duration::from_secs(1)).unwrap();
        let aggregator =
            SignatureAggregator::new(client, vec![], HashMap::new(), 2, 3).unwrap();

        let responses = responses(&[Some("10"), None, Some("9")]);
        let available = aggregator.available_instruments(&responses);
        assert!(available.contains(&instrument()));

        let responses = self::responses(&[Some("10"), None, None]);
        assert!(aggregator.available_instruments(&responses).is_empty());
    }

    #[test]
    fn rejects_unreachable_quorum_configuration() {
        let client = OracleGatewayClient::new(Duration::from_secs(1)).unwrap();
        assert!(SignatureAggregator::new(client.clone(), vec![], HashMap::new(), 0, 3).is_err());
        assert!(SignatureAggregator::new(client, vec![], HashMap::new(), 4, 3).is_err());
    }

    #[tokio::test]
    async fn unsupported_chain_fails_before_any_request() {
        let client = OracleGatewayClient::new(Duration::from_secs(1)).unwrap();
        let aggregator = SignatureAggregator::new(
            client,
            vec!["http://127.0.0.1:9".to_string()],
            HashMap::new(),
            1,
            1,
        )
        .unwrap();

        assert_eq!(
            aggregator.fetch_signatures(250).await.unwrap_err(),
            SignatureError::UnsupportedChain { chain_id: 250 }
        );
    }

    fn fantom() -> HashMap<u64, String> {
        let mut networks = HashMap::new();
        networks.insert(250, "fantom".to_string());
        networks
    }

    #[tokio::test]
    async fn malformed_gateway_url_aborts_before_any_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/fantom/signatures.json")
            .with_status(200)
            .with_body("{}")
            .expect(0)
            .create_async()
            .await;

        let client = OracleGatewayClient::new(Duration::from_secs(2)).unwrap();
        let aggregator = SignatureAggregator::new(
            client,
            vec![server.url(), "not a gateway url".to_string()],
            fantom(),
            1,
            2,
        )
        .unwrap();

        let err = aggregator.fetch_signatures(250).await.unwrap_err();
        assert!(matches!(err, SignatureError::TransportFailure(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unreachable_gateway_keeps_its_origin_slot() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/fantom/signatures.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("{}")
            .create_async()
            .await;

        let client = OracleGatewayClient::new(Duration::from_secs(2)).unwrap();
        let aggregator = SignatureAggregator::new(
            client,
            vec![server.url(), "http://127.0.0.1:9".to_string()],
            fantom(),
            1,
            2,
        )
        .unwrap();

        let responses = aggregator.fetch_signatures(250).await.unwrap();
        assert_eq!(responses.len(), 2);
        assert!(responses[0].entries.is_some());
        assert_eq!(responses[1].origin_index, 1);
        assert!(responses[1].entries.is_none());
    }
}
