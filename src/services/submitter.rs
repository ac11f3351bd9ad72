//! Transaction construction and submission
//!
//! Every submission goes estimate -> send. A failed estimate is re-issued as a read-only
//! simulation so the surfaced error says whether the call would actually revert. The
//! wallet is never invoked once estimation has failed.

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, TxHash, B256, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{error, info, instrument, warn};

use crate::adapters::{ApprovalInfo, ChainRpc, TransactionEntry, TransactionLog, TxRequest, IERC20};
use crate::config::AppConfig;
use crate::domain::{to_raw_units, ComputedAmounts, QuorumSelection, TradeDirection};
use crate::error::{SimulationOutcome, TradeError};

sol! {
    #[allow(missing_docs)]
    interface ISynchronizer {
        function buyFor(
            address partnerId,
            address recipient,
            address registrar,
            uint256 amountIn,
            uint256 price,
            uint256[] timestamps,
            bytes32[] reqIds,
            bytes[] sigs
        ) external;

        function sellFor(
            address partnerId,
            address recipient,
            address registrar,
            uint256 amountIn,
            uint256[] timestamps,
            bytes32[] reqIds,
            bytes[] sigs
        ) external;
    }
}

/// Decimals the synchronizer expects the execution price in
pub const PRICE_DECIMALS: u32 = 18;

/// Encoded synchronizer call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallData {
    pub method: &'static str,
    pub input: Bytes,
}

/// A transaction ready for estimate and send, with what gets written to the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTransaction {
    pub request: TxRequest,
    pub summary: String,
    pub approval: Option<ApprovalInfo>,
}

impl PreparedTransaction {
    fn entry(&self) -> TransactionEntry {
        TransactionEntry {
            summary: self.summary.clone(),
            approval: self.approval.clone(),
        }
    }
}

/// Encode `buyFor`/`sellFor` from the selected attestations
pub fn build_call(
    direction: TradeDirection,
    registrar: Address,
    partner_id: Address,
    account: Address,
    amount_in: U256,
    selection: &QuorumSelection,
) -> Result<CallData, TradeError> {
    if selection.data.is_empty() {
        return Err(TradeError::Encoding("no attestations selected".into()));
    }

    let mut timestamps = Vec::with_capacity(selection.data.len());
    let mut req_ids: Vec<B256> = Vec::with_capacity(selection.data.len());
    let mut sigs = Vec::with_capacity(selection.data.len());
    for attestation in &selection.data {
        let proof = attestation.proof(direction);
        timestamps.push(U256::from(proof.timestamp));
        req_ids.push(proof.req_id);
        sigs.push(proof.signature.clone());
    }

    let input = match direction {
        TradeDirection::Open => {
            let price = selection
                .price
                .as_deref()
                .ok_or_else(|| TradeError::Encoding("open selection carries no price".into()))?;
            ISynchronizer::buyForCall {
                partnerId: partner_id,
                recipient: account,
                registrar,
                amountIn: amount_in,
                price: encode_price(price)?,
                timestamps,
                reqIds: req_ids,
                sigs,
            }
            .abi_encode()
        }
        TradeDirection::Close => ISynchronizer::sellForCall {
            partnerId: partner_id,
            recipient: account,
            registrar,
            amountIn: amount_in,
            timestamps,
            reqIds: req_ids,
            sigs,
        }
        .abi_encode(),
    };

    Ok(CallData {
        method: direction.method(),
        input: Bytes::from(input),
    })
}

/// Price string as an 18-decimal integer
pub fn encode_price(price: &str) -> Result<U256, TradeError> {
    let value = Decimal::from_str(price.trim())
        .map_err(|_| TradeError::Encoding(format!("invalid price {}", price)))?;
    to_raw_units(value, PRICE_DECIMALS).map_err(|e| TradeError::Encoding(e.to_string()))
}

/// "Buy 1.98 TSLA-L for 100 DEI" / "Sell 2 TSLA-S for 98 DEI"
pub fn trade_summary(amounts: &ComputedAmounts, synthetic: &str, collateral: &str) -> String {
    let amount_in = amounts.amount_in.normalize();
    let amount_out = amounts.amount_out.normalize();
    match amounts.direction {
        TradeDirection::Open => format!("Buy {} {} for {} {}", amount_out, synthetic, amount_in, collateral),
        TradeDirection::Close => format!("Sell {} {} for {} {}", amount_in, synthetic, amount_out, collateral),
    }
}

pub struct TransactionSubmitter {
    rpc: Arc<dyn ChainRpc>,
    log: Arc<dyn TransactionLog>,
    gas_margin_bps: u64,
    user_rejected_code: i64,
}

impl TransactionSubmitter {
    pub fn new(
        rpc: Arc<dyn ChainRpc>,
        log: Arc<dyn TransactionLog>,
        gas_margin_bps: u64,
        user_rejected_code: i64,
    ) -> Self {
        Self {
            rpc,
            log,
            gas_margin_bps,
            user_rejected_code,
        }
    }

    pub fn from_config(
        rpc: Arc<dyn ChainRpc>,
        log: Arc<dyn TransactionLog>,
        config: &AppConfig,
    ) -> Self {
        Self::new(
            rpc,
            log,
            config.execution.gas_margin_bps,
            config.execution.user_rejected_code,
        )
    }

    /// Wrap an encoded synchronizer call into a transaction from `account`
    pub fn prepare_trade(
        &self,
        chain_id: u64,
        synchronizer: Address,
        account: Address,
        call: CallData,
        summary: String,
    ) -> PreparedTransaction {
        PreparedTransaction {
            request: TxRequest {
                chain_id,
                from: account,
                to: synchronizer,
                input: call.input,
                value: U256::ZERO,
                gas_limit: None,
            },
            summary,
            approval: None,
        }
    }

    /// ERC-20 approval of `spender` for `amount` raw units of `token`
    pub fn prepare_approval(
        &self,
        chain_id: u64,
        account: Address,
        token: Address,
        token_symbol: &str,
        spender: Address,
        amount: U256,
    ) -> PreparedTransaction {
        let input = IERC20::approveCall { spender, amount }.abi_encode();
        PreparedTransaction {
            request: TxRequest {
                chain_id,
                from: account,
                to: token,
                input: Bytes::from(input),
                value: U256::ZERO,
                gas_limit: None,
            },
            summary: format!("Approve {}", token_symbol),
            approval: Some(ApprovalInfo { token, spender }),
        }
    }

    /// Gas limit to submit with: the estimate plus the safety margin
    pub fn with_margin(&self, estimate: u64) -> u64 {
        let inflated = (estimate as u128) * (10_000 + self.gas_margin_bps as u128) / 10_000;
        u64::try_from(inflated).unwrap_or(u64::MAX)
    }

    /// Estimate gas; on failure, simulate the same call to explain why
    #[instrument(skip(self, tx), fields(to = %tx.to))]
    pub async fn estimate(&self, tx: &TxRequest) -> Result<u64, TradeError> {
        match self.rpc.estimate_gas(tx).await {
            Ok(gas) => Ok(self.with_margin(gas)),
            Err(estimate_err) => {
                warn!("Gas estimation failed: {}, simulating call", estimate_err);
                let simulation = match self.rpc.call(tx).await {
                    Ok(_) => SimulationOutcome::Succeeded,
                    Err(failure) => SimulationOutcome::Reverted(failure.reason().to_string()),
                };
                Err(TradeError::gas_estimation(simulation))
            }
        }
    }

    /// Hand the transaction to the wallet and record it once accepted
    #[instrument(skip(self, prepared), fields(summary = %prepared.summary))]
    pub async fn send(
        &self,
        prepared: &PreparedTransaction,
        gas_limit: u64,
    ) -> Result<TxHash, TradeError> {
        let tx = prepared.request.with_gas_limit(gas_limit);
        match self.rpc.send_transaction(&tx).await {
            Ok(hash) => {
                self.log.record(hash, prepared.entry()).await;
                Ok(hash)
            }
            Err(failure) if failure.code == Some(self.user_rejected_code) => {
                info!("Transaction rejected in wallet");
                Err(TradeError::UserRejected)
            }
            Err(failure) => {
                error!("Transaction submission failed: {}", failure);
                Err(TradeError::Submission(failure.reason().to_string()))
            }
        }
    }

    pub async fn submit(&self, prepared: &PreparedTransaction) -> Result<TxHash, TradeError> {
        let gas_limit = self.estimate(&prepared.request).await?;
        self.send(prepared, gas_limit).await
    }

    /// Approve `spender` to move `amount` of `token` on behalf of `account`
    pub async fn approve(
        &self,
        chain_id: u64,
        account: Address,
        token: Address,
        token_symbol: &str,
        spender: Address,
        amount: U256,
    ) -> Result<TxHash, TradeError> {
        let prepared =
            self.prepare_approval(chain_id, account, token, token_symbol, spender, amount);
        self.submit(&prepared).await
    }
}
