//! Trade pipeline: one settlement attempt from fresh attestations to a submitted hash
//!
//! Walks `TradeState` strictly in order. Cancellation is checked before every stage up to
//! SUBMITTING; once the wallet has the transaction there is nothing left to cancel.

use std::sync::Arc;

use alloy::primitives::{Address, TxHash};
use thiserror::Error;
use tracing::{info, info_span, warn, Instrument as _};
use uuid::Uuid;

use crate::config::ChainConfig;
use crate::coordination::CancelToken;
use crate::domain::{
    AccountContext, ComputedAmounts, Instrument, PrimaryError, TradeAttempt, TradeDirection, TradeRequest,
    TradeState,
};
use crate::error::{Result, SynchroError, TradeError};
use crate::services::{
    build_call, classify, trade_summary, QuoteStore, SignatureAggregator, TradeAmountCalculator,
    TransactionSubmitter,
};

/// Outcome of a confirmed attempt
#[derive(Debug, Clone)]
pub struct TradeReceipt {
    pub attempt_id: Uuid,
    pub state: TradeState,
    pub history: Vec<TradeState>,
    pub tx_hash: Option<TxHash>,
    pub summary: Option<String>,
    pub amounts: Option<ComputedAmounts>,
}

/// An attempt that ended REJECTED or FAILED
#[derive(Debug, Error)]
#[error("trade attempt {attempt_id} ended {state}: {source}")]
pub struct TradeFailure {
    pub attempt_id: Uuid,
    pub state: TradeState,
    pub history: Vec<TradeState>,
    pub source: SynchroError,
}

impl TradeFailure {
    pub fn is_user_rejection(&self) -> bool {
        self.source.is_user_rejection()
    }
}

/// What the dry run stops with: everything except gas and the wallet
#[derive(Debug, Clone)]
pub struct TradePreview {
    pub instrument_symbol: String,
    pub amounts: ComputedAmounts,
    pub summary: String,
    pub price: Option<String>,
    pub signatures: usize,
}

struct Settled {
    hash: TxHash,
    summary: String,
    amounts: ComputedAmounts,
}

pub struct TradePipeline {
    chain: ChainConfig,
    partner_id: Address,
    quotes: Arc<QuoteStore>,
    aggregator: Arc<SignatureAggregator>,
    calculator: TradeAmountCalculator,
    submitter: Arc<TransactionSubmitter>,
}

impl TradePipeline {
    pub fn new(
        chain: ChainConfig,
        partner_id: Address,
        synthetic_decimals: u32,
        quotes: Arc<QuoteStore>,
        aggregator: Arc<SignatureAggregator>,
        submitter: Arc<TransactionSubmitter>,
    ) -> Self {
        let calculator = TradeAmountCalculator::new(chain.collateral_decimals, synthetic_decimals);
        Self {
            chain,
            partner_id,
            quotes,
            aggregator,
            calculator,
            submitter,
        }
    }

    pub fn chain(&self) -> &ChainConfig {
        &self.chain
    }

    /// Run one attempt to a terminal state
    pub async fn execute(
        &self,
        request: &TradeRequest,
        ctx: &AccountContext,
        cancel: &CancelToken,
    ) -> std::result::Result<TradeReceipt, TradeFailure> {
        let mut attempt = TradeAttempt::new();
        let span = info_span!(
            "trade",
            attempt = %attempt.id,
            chain = request.chain_id,
            instrument = %request.instrument,
            direction = %request.direction,
        );

        let outcome = self
            .settle(&mut attempt, request, ctx, cancel)
            .instrument(span.clone())
            .await;
        let _entered = span.enter();

        match outcome {
            Ok(settled) => {
                info!(tx = %settled.hash, "{}", settled.summary);
                Ok(TradeReceipt {
                    attempt_id: attempt.id,
                    state: attempt.state(),
                    history: attempt.history().to_vec(),
                    tx_hash: Some(settled.hash),
                    summary: Some(settled.summary),
                    amounts: Some(settled.amounts),
                })
            }
            Err(source) => {
                let target = if source.is_user_rejection() {
                    TradeState::Rejected
                } else {
                    TradeState::Failed
                };
                if let Err(e) = attempt.advance(target) {
                    warn!("Could not close attempt: {}", e);
                }
                if target == TradeState::Failed {
                    warn!(stage = %last_active(&attempt), "Trade attempt failed: {}", source);
                }
                Err(TradeFailure {
                    attempt_id: attempt.id,
                    state: attempt.state(),
                    history: attempt.history().to_vec(),
                    source,
                })
            }
        }
    }

    async fn settle(
        &self,
        attempt: &mut TradeAttempt,
        request: &TradeRequest,
        ctx: &AccountContext,
        cancel: &CancelToken,
    ) -> Result<Settled> {
        let chain_id = self.chain.chain_id;
        if request.chain_id != chain_id {
            return Err(SynchroError::UnsupportedChain(request.chain_id));
        }

        ensure_live(cancel)?;
        attempt.advance(TradeState::FetchingSignatures)?;
        let responses = self.aggregator.fetch_signatures(chain_id).await?;

        ensure_live(cancel)?;
        attempt.advance(TradeState::Selecting)?;
        self.quotes
            .update_availability(chain_id, self.aggregator.available_instruments(&responses))
            .await;
        let instrument = self
            .quotes
            .instrument_by_address(chain_id, request.instrument)
            .await
            .ok_or_else(|| SynchroError::InstrumentNotFound(request.instrument.to_string()))?;
        let selection =
            self.aggregator
                .select_signatures(&responses, instrument.address, request.direction)?;
        ensure_open(&instrument)?;

        ensure_live(cancel)?;
        attempt.advance(TradeState::ComputingAmounts)?;
        let amounts = self.calculator.compute(
            request.direction,
            request.field,
            &request.amount,
            &instrument.price,
            instrument.fee,
        )?;
        let symbol = instrument.display_symbol();
        let account = self.validate(ctx, &amounts, &symbol)?;

        let call = build_call(
            request.direction,
            instrument.address,
            self.partner_id,
            account,
            amounts.amount_in_raw()?,
            &selection,
        )?;
        let summary = trade_summary(&amounts, &symbol, &self.chain.collateral_symbol);
        let prepared =
            self.submitter
                .prepare_trade(chain_id, self.chain.synchronizer, account, call, summary);

        ensure_live(cancel)?;
        attempt.advance(TradeState::EstimatingGas)?;
        let gas_limit = self.submitter.estimate(&prepared.request).await?;

        ensure_live(cancel)?;
        attempt.advance(TradeState::Submitting)?;
        let hash = self.submitter.send(&prepared, gas_limit).await?;

        attempt.advance(TradeState::Confirmed)?;
        Ok(Settled {
            hash,
            summary: prepared.summary,
            amounts,
        })
    }

    /// Everything up to gas estimation, without touching the wallet
    pub async fn preview(&self, request: &TradeRequest) -> Result<TradePreview> {
        let chain_id = self.chain.chain_id;
        let responses = self.aggregator.fetch_signatures(chain_id).await?;
        self.quotes
            .update_availability(chain_id, self.aggregator.available_instruments(&responses))
            .await;

        let instrument = self
            .quotes
            .instrument_by_address(chain_id, request.instrument)
            .await
            .ok_or_else(|| SynchroError::InstrumentNotFound(request.instrument.to_string()))?;
        let selection =
            self.aggregator
                .select_signatures(&responses, instrument.address, request.direction)?;
        ensure_open(&instrument)?;
        let amounts = self.calculator.compute(
            request.direction,
            request.field,
            &request.amount,
            &instrument.price,
            instrument.fee,
        )?;

        let instrument_symbol = instrument.display_symbol();
        Ok(TradePreview {
            summary: trade_summary(&amounts, &instrument_symbol, &self.chain.collateral_symbol),
            instrument_symbol,
            amounts,
            price: selection.price,
            signatures: selection.data.len(),
        })
    }

    fn validate(
        &self,
        ctx: &AccountContext,
        amounts: &ComputedAmounts,
        synthetic_symbol: &str,
    ) -> std::result::Result<Address, TradeError> {
        if ctx.chain_id.is_some_and(|id| id != self.chain.chain_id) {
            return Err(TradeError::NoAccount);
        }

        match classify(ctx, amounts) {
            PrimaryError::Account => Err(TradeError::NoAccount),
            PrimaryError::Amount => Err(TradeError::InvalidAmount),
            PrimaryError::Balance => Err(TradeError::InsufficientBalance {
                symbol: match amounts.direction {
                    TradeDirection::Open => self.chain.collateral_symbol.clone(),
                    TradeDirection::Close => synthetic_symbol.to_string(),
                },
                required: amounts.amount_in,
                available: ctx.balance,
            }),
            PrimaryError::Valid => ctx.account.ok_or(TradeError::NoAccount),
        }
    }
}

fn ensure_live(cancel: &CancelToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(SynchroError::Cancelled);
    }
    Ok(())
}

/// Quorum shortfalls surface from selection first; this catches quotes marked closed
fn ensure_open(instrument: &Instrument) -> Result<()> {
    if !instrument.open {
        return Err(TradeError::InstrumentClosed(instrument.address).into());
    }
    Ok(())
}

/// Last non-terminal state the attempt reached
fn last_active(attempt: &TradeAttempt) -> TradeState {
    attempt
        .history()
        .iter()
        .rev()
        .copied()
        .find(|s| !s.is_terminal())
        .unwrap_or(TradeState::Idle)
}
