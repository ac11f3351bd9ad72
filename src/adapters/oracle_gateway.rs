//! HTTP client for oracle signer gateways
//!
//! Each gateway publishes `GET /{network}/signatures.json`, a map from checksummed
//! instrument address to the gateway's latest attestation for that instrument.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, instrument, warn};
use url::Url;

use crate::domain::Attestation;
use crate::error::{Result, SignatureError};

/// Shared HTTP client for all configured gateways
#[derive(Debug, Clone)]
pub struct OracleGatewayClient {
    http: reqwest::Client,
}

impl OracleGatewayClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// Build `{gateway}/{network}/signatures.json`
    pub fn signatures_url(
        gateway: &str,
        network: &str,
    ) -> std::result::Result<Url, SignatureError> {
        let base = if gateway.ends_with('/') {
            gateway.to_string()
        } else {
            format!("{}/", gateway)
        };
        Url::parse(&base)
            .and_then(|u| u.join(&format!("{}/signatures.json", network)))
            .map_err(|e| {
                SignatureError::TransportFailure(format!("invalid gateway url {gateway}: {e}"))
            })
    }

    /// Fetch one gateway payload. Transport and decoding failures degrade to `None`.
    #[instrument(skip(self, url), fields(url = %url))]
    pub async fn fetch(&self, url: Url) -> Option<HashMap<String, Attestation>> {
        let response = match self.http.get(url.clone()).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!("Gateway request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("Gateway returned HTTP {}", response.status());
            return None;
        }

        let raw: HashMap<String, serde_json::Value> = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Gateway payload is not a JSON object: {}", e);
                return None;
            }
        };

        Some(decode_entries(raw))
    }
}

/// Decode each entry independently so one malformed attestation does not drop the gateway
pub fn decode_entries(raw: HashMap<String, serde_json::Value>) -> HashMap<String, Attestation> {
    let total = raw.len();
    let entries: HashMap<String, Attestation> = raw
        .into_iter()
        .filter_map(|(address, value)| match serde_json::from_value(value) {
            Ok(attestation) => Some((address, attestation)),
            Err(e) => {
                warn!("Dropping undecodable attestation for {}: {}", address, e);
                None
            }
        })
        .collect();

    debug!("Decoded {}/{} attestations", entries.len(), total);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(price: &str) -> serde_json::Value {
        serde_json::json!({
            "price": price,
            "fee": "0.001",
            "blockNo": 100,
            "buy": {
                "timestamp": 1,
                "reqId": format!("0x{}", "11".repeat(32)),
                "signature": "0x01"
            },
            "sell": {
                "timestamp": 2,
                "reqId": format!("0x{}", "22".repeat(32)),
                "signature": "0x02"
            }
        })
    }

    #[test]
    fn signatures_url_handles_trailing_slash() {
        let a = OracleGatewayClient::signatures_url("https://oracle1.example", "fantom").unwrap();
        let b = OracleGatewayClient::signatures_url("https://oracle1.example/", "fantom").unwrap();
        assert_eq!(a.as_str(), "https://oracle1.example/fantom/signatures.json");
        assert_eq!(a, b);
    }

    #[test]
    fn signatures_url_rejects_garbage() {
        assert!(matches!(
            OracleGatewayClient::signatures_url("not a url", "fantom"),
            Err(SignatureError::TransportFailure(_))
        ));
    }

    #[test]
    fn decode_drops_only_bad_entries() {
        let mut raw = HashMap::new();
        raw.insert("0xGood".to_string(), entry("10"));
        raw.insert("0xBad".to_string(), serde_json::json!({ "price": "12" }));

        let decoded = decode_entries(raw);
        assert_eq!(decoded.len(), 1);
        assert!(decoded.contains_key("0xGood"));
    }

    #[tokio::test]
    async fn fetch_degrades_to_none_on_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/fantom/signatures.json")
            .with_status(502)
            .create_async()
            .await;

        let client = OracleGatewayClient::new(Duration::from_secs(2)).unwrap();
        let url = OracleGatewayClient::signatures_url(&server.url(), "fantom").unwrap();
        assert!(client.fetch(url).await.is_none());
    }

    #[tokio::test]
    async fn fetch_decodes_payload() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({ "0xAbC": entry("42.5") }).to_string();
        let _m = server
            .mock("GET", "/fantom/signatures.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let client = OracleGatewayClient::new(Duration::from_secs(2)).unwrap();
        let url = OracleGatewayClient::signatures_url(&server.url(), "fantom").unwrap();
        let entries = client.fetch(url).await.unwrap();
        assert_eq!(entries["0xAbC"].price.to_string(), "42.5");
    }
}
