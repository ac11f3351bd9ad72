use alloy::primitives::Address;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::error::{Result, SynchroError};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub oracle: OracleConfig,
    pub quote_feed: QuoteFeedConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Supported chains; `name` is the path segment used by gateways and the quote feed
    #[serde(default)]
    pub chains: Vec<ChainConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    /// Gateway base URLs. Position in this list is the attestation origin index.
    pub gateways: Vec<String>,
    /// Minimum number of attestations required before a trade may be submitted
    #[serde(default = "default_min_quorum")]
    pub min_quorum: usize,
    /// Number of attestations submitted on-chain (defaults to the number of gateways)
    #[serde(default)]
    pub expected_signatures: Option<usize>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl OracleConfig {
    pub fn expected_signatures(&self) -> usize {
        self.expected_signatures.unwrap_or(self.gateways.len())
    }
}

fn default_min_quorum() -> usize {
    1
}

fn default_request_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteFeedConfig {
    pub base_url: String,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_refresh_interval() -> u64 {
    15
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Fee attribution tag passed as the first call argument
    #[serde(default)]
    pub partner_id: Address,
    /// Safety margin added on top of the gas estimate, in basis points
    #[serde(default = "default_gas_margin_bps")]
    pub gas_margin_bps: u64,
    #[serde(default = "default_synthetic_decimals")]
    pub synthetic_decimals: u32,
    /// Wallet error code meaning the user cancelled the request (EIP-1193)
    #[serde(default = "default_user_rejected_code")]
    pub user_rejected_code: i64,
}

fn default_gas_margin_bps() -> u64 {
    2000
}

fn default_synthetic_decimals() -> u32 {
    18
}

fn default_user_rejected_code() -> i64 {
    4001
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            partner_id: Address::ZERO,
            gas_margin_bps: default_gas_margin_bps(),
            synthetic_decimals: default_synthetic_decimals(),
            user_rejected_code: default_user_rejected_code(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    /// Network path segment, e.g. "fantom" in `/fantom/signatures.json`
    pub name: String,
    pub rpc_url: String,
    /// Synchronizer contract receiving buyFor/sellFor
    pub synchronizer: Address,
    /// Collateral token spent on open and received on close
    pub collateral: Address,
    #[serde(default = "default_collateral_decimals")]
    pub collateral_decimals: u32,
    #[serde(default = "default_collateral_symbol")]
    pub collateral_symbol: String,
}

fn default_collateral_decimals() -> u32 {
    18
}

fn default_collateral_symbol() -> String {
    "DEI".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> std::result::Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("oracle.min_quorum", 1)?
            .set_default("quote_feed.refresh_interval_secs", 15)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Environment-specific overrides (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("SYNCHRO_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // SYNCHRO_ORACLE__MIN_QUORUM, SYNCHRO_EXECUTION__GAS_MARGIN_BPS, ...
            .add_source(
                Environment::with_prefix("SYNCHRO")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Look up a chain, failing with a configuration error if it is not supported
    pub fn chain(&self, chain_id: u64) -> Result<&ChainConfig> {
        self.chains
            .iter()
            .find(|c| c.chain_id == chain_id)
            .ok_or(SynchroError::UnsupportedChain(chain_id))
    }

    /// Validate configuration values
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let gateways = self.oracle.gateways.len();
        let expected = self.oracle.expected_signatures();

        if gateways == 0 {
            errors.push("oracle.gateways must list at least one gateway".to_string());
        }

        if self.oracle.min_quorum == 0 {
            errors.push("oracle.min_quorum must be at least 1".to_string());
        }

        if self.oracle.min_quorum > expected {
            errors.push(format!(
                "oracle.min_quorum ({}) exceeds expected_signatures ({})",
                self.oracle.min_quorum, expected
            ));
        }

        if expected > gateways {
            errors.push(format!(
                "oracle.expected_signatures ({}) exceeds number of gateways ({})",
                expected, gateways
            ));
        }

        if self.execution.gas_margin_bps > 10_000 {
            errors.push("execution.gas_margin_bps must be at most 10000".to_string());
        }

        let mut seen = HashSet::new();
        for chain in &self.chains {
            if !seen.insert(chain.chain_id) {
                errors.push(format!("chain {} is configured twice", chain.chain_id));
            }
            if chain.name.trim().is_empty() {
                errors.push(format!("chain {} has an empty network name", chain.chain_id));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AppConfig {
        AppConfig {
            oracle: OracleConfig {
                gateways: vec![
                    "https://oracle1.example".to_string(),
                    "https://oracle2.example".to_string(),
                    "https://oracle3.example".to_string(),
                ],
                min_quorum: 2,
                expected_signatures: None,
                request_timeout_ms: 5000,
            },
            quote_feed: QuoteFeedConfig {
                base_url: "https://feed.example".to_string(),
                refresh_interval_secs: 15,
                request_timeout_ms: 5000,
            },
            execution: ExecutionConfig::default(),
            chains: vec![ChainConfig {
                chain_id: 250,
                name: "fantom".to_string(),
                rpc_url: "https://rpc.example".to_string(),
                synchronizer: Address::repeat_byte(0x11),
                collateral: Address::repeat_byte(0x22),
                collateral_decimals: 18,
                collateral_symbol: "DEI".to_string(),
            }],
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn expected_signatures_defaults_to_gateway_count() {
        let config = sample();
        assert_eq!(config.oracle.expected_signatures(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_quorum_above_expected() {
        let mut config = sample();
        config.oracle.expected_signatures = Some(1);
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("min_quorum")));
    }

    #[test]
    fn validate_rejects_duplicate_chains() {
        let mut config = sample();
        let dup = config.chains[0].clone();
        config.chains.push(dup);
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("configured twice")));
    }

    #[test]
    fn unknown_chain_is_unsupported() {
        let config = sample();
        assert!(config.chain(250).is_ok());
        assert!(matches!(
            config.chain(1),
            Err(SynchroError::UnsupportedChain(1))
        ));
    }
}
