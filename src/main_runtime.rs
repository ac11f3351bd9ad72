use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use synchro::adapters::{AlloyRpc, InMemoryTransactionLog, QuoteFeedClient, TransactionLog};
use synchro::config::{AppConfig, ChainConfig};
use synchro::error::Result;
use synchro::services::{QuoteStore, SignatureAggregator, TradePipeline, TransactionSubmitter};
use synchro::signing::Wallet;
use tracing_subscriber::EnvFilter;

/// Long-lived clients shared by every command
pub struct Runtime {
    pub config: AppConfig,
    pub quotes: Arc<QuoteStore>,
    pub aggregator: Arc<SignatureAggregator>,
    pub tx_log: Arc<InMemoryTransactionLog>,
}

impl Runtime {
    pub fn build(config: AppConfig) -> Result<Self> {
        let networks: HashMap<u64, String> = config
            .chains
            .iter()
            .map(|c| (c.chain_id, c.name.clone()))
            .collect();

        let feed = QuoteFeedClient::new(
            &config.quote_feed.base_url,
            Duration::from_millis(config.quote_feed.request_timeout_ms),
        )?;
        let quotes = Arc::new(QuoteStore::new(Arc::new(feed), networks));
        let aggregator = Arc::new(SignatureAggregator::from_config(&config)?);

        Ok(Self {
            config,
            quotes,
            aggregator,
            tx_log: Arc::new(InMemoryTransactionLog::new()),
        })
    }

    pub fn chain(&self, chain_id: u64) -> Result<ChainConfig> {
        self.config.chain(chain_id).cloned()
    }

    /// Refresh quotes and signature availability for one chain
    pub async fn refresh(&self, chain_id: u64) -> Result<()> {
        self.quotes.refresh_chain(chain_id).await?;
        let responses = self.aggregator.fetch_signatures(chain_id).await?;
        self.quotes
            .update_availability(chain_id, self.aggregator.available_instruments(&responses))
            .await;
        Ok(())
    }

    pub fn submitter(&self, rpc: Arc<AlloyRpc>) -> Arc<TransactionSubmitter> {
        let log: Arc<dyn TransactionLog> = self.tx_log.clone();
        Arc::new(TransactionSubmitter::from_config(rpc, log, &self.config))
    }

    pub fn pipeline(&self, chain: ChainConfig, submitter: Arc<TransactionSubmitter>) -> TradePipeline {
        TradePipeline::new(
            chain,
            self.config.execution.partner_id,
            self.config.execution.synthetic_decimals,
            self.quotes.clone(),
            self.aggregator.clone(),
            submitter,
        )
    }
}

/// Signing connection for a chain, key taken from the environment
pub fn connect_wallet(chain: &ChainConfig) -> Result<(Wallet, Arc<AlloyRpc>)> {
    let wallet = Wallet::from_env(chain.chain_id)?;
    let rpc = AlloyRpc::connect_with_wallet(&chain.rpc_url, &wallet)?;
    Ok((wallet, Arc::new(rpc)))
}

pub fn init_logging(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},synchro=debug", config.logging.level))
    });

    let log_dir = std::env::var("SYNCHRO_LOG_DIR").ok();

    // `tracing_appender::rolling::daily` panics if it can't create the initial file,
    // so writability is checked first.
    let file_layer = log_dir.as_ref().and_then(|log_dir| {
        if std::fs::create_dir_all(log_dir).is_err() {
            eprintln!(
                "Warning: Could not create log directory {}, file logging disabled",
                log_dir
            );
            return None;
        }

        let test_path = std::path::Path::new(log_dir).join(".synchro_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&test_path)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&test_path);

                let file_appender = tracing_appender::rolling::daily(log_dir, "synchro.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                // The process exits right after the command finishes
                Box::leak(Box::new(guard));

                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {} ({}), file logging disabled",
                    log_dir, e
                );
                None
            }
        }
    });

    let (console_plain, console_json) = if config.logging.json {
        (None, Some(tracing_subscriber::fmt::layer().json().with_target(true)))
    } else {
        (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            ),
            None,
        )
    };

    let file_logging_enabled = file_layer.is_some();
    tracing_subscriber::registry()
        .with(filter)
        .with(console_plain)
        .with(console_json)
        .with(file_layer)
        .init();

    if let (true, Some(dir)) = (file_logging_enabled, log_dir) {
        eprintln!("Logging to: {}/synchro.log", dir);
    }
}

pub fn init_logging_simple() {
    // Minimal logging for one-shot commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}
