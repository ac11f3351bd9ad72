//! Chain RPC boundary: gas estimation, read-only simulation, submission and token reads

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::sol;
use alloy::sol_types::{decode_revert_reason, SolCall};
use alloy::transports::TransportError;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::error::{Result, SynchroError};
use crate::signing::Wallet;

sol! {
    #[allow(missing_docs)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

/// Transaction fields shared by estimate, simulation and submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub chain_id: u64,
    pub from: Address,
    pub to: Address,
    pub input: Bytes,
    pub value: U256,
    pub gas_limit: Option<u64>,
}

impl TxRequest {
    pub fn with_gas_limit(&self, gas_limit: u64) -> Self {
        Self {
            gas_limit: Some(gas_limit),
            ..self.clone()
        }
    }

    fn to_alloy(&self) -> TransactionRequest {
        let request = TransactionRequest::default()
            .with_from(self.from)
            .with_to(self.to)
            .with_input(self.input.clone())
            .with_value(self.value)
            .with_chain_id(self.chain_id);

        match self.gas_limit {
            Some(gas) => request.with_gas_limit(gas),
            None => request,
        }
    }
}

/// JSON-RPC level failure, keeping the error code so wallet rejections can be told apart
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct RpcFailure {
    pub code: Option<i64>,
    pub message: String,
    /// Decoded `Error(string)` revert reason, when the node returned revert data
    pub revert_reason: Option<String>,
}

impl RpcFailure {
    pub fn new(code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            revert_reason: None,
        }
    }

    /// Best human-readable explanation available
    pub fn reason(&self) -> &str {
        self.revert_reason.as_deref().unwrap_or(&self.message)
    }
}

impl From<TransportError> for RpcFailure {
    fn from(err: TransportError) -> Self {
        match err.as_error_resp() {
            Some(payload) => Self {
                code: Some(payload.code),
                message: payload.message.to_string(),
                revert_reason: payload
                    .as_revert_data()
                    .and_then(|data| decode_revert_reason(&data)),
            },
            None => Self::new(None, err.to_string()),
        }
    }
}

/// Calls the submitter makes against the connected chain
#[async_trait]
pub trait ChainRpc: Send + Sync {
    async fn estimate_gas(&self, tx: &TxRequest) -> std::result::Result<u64, RpcFailure>;

    /// Read-only simulation of `tx` at the latest block
    async fn call(&self, tx: &TxRequest) -> std::result::Result<Bytes, RpcFailure>;

    async fn send_transaction(&self, tx: &TxRequest) -> std::result::Result<TxHash, RpcFailure>;
}

/// ERC-20 reads used to populate the caller's account context
#[async_trait]
pub trait TokenReader: Send + Sync {
    async fn balance_of(&self, token: Address, owner: Address)
        -> std::result::Result<U256, RpcFailure>;

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> std::result::Result<U256, RpcFailure>;
}

/// alloy HTTP provider, optionally carrying a signing wallet
#[derive(Clone)]
pub struct AlloyRpc {
    provider: DynProvider,
    chain_id: u64,
}

impl AlloyRpc {
    /// Read-only connection (estimates, simulations and token reads)
    pub fn connect(rpc_url: &str, chain_id: u64) -> Result<Self> {
        let url = rpc_url
            .parse()
            .map_err(|e| SynchroError::AddressParsing(format!("Invalid RPC URL: {}", e)))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self { provider, chain_id })
    }

    /// Connection that signs and broadcasts with `wallet`
    pub fn connect_with_wallet(rpc_url: &str, wallet: &Wallet) -> Result<Self> {
        let url = rpc_url
            .parse()
            .map_err(|e| SynchroError::AddressParsing(format!("Invalid RPC URL: {}", e)))?;
        let provider = ProviderBuilder::new()
            .wallet(wallet.ethereum_wallet())
            .connect_http(url)
            .erased();
        Ok(Self {
            provider,
            chain_id: wallet.chain_id(),
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn read_u256(&self, token: Address, input: Vec<u8>) -> std::result::Result<U256, RpcFailure> {
        let request = TransactionRequest::default()
            .with_to(token)
            .with_input(Bytes::from(input));
        let output = self.provider.call(request).await?;
        if output.len() < 32 {
            return Err(RpcFailure::new(
                None,
                format!("short return data from {}: {} bytes", token, output.len()),
            ));
        }
        Ok(U256::from_be_slice(&output[..32]))
    }
}

#[async_trait]
impl ChainRpc for AlloyRpc {
    #[instrument(skip(self, tx), fields(to = %tx.to))]
    async fn estimate_gas(&self, tx: &TxRequest) -> std::result::Result<u64, RpcFailure> {
        let gas = self.provider.estimate_gas(tx.to_alloy()).await?;
        debug!("Estimated gas: {}", gas);
        Ok(gas)
    }

    #[instrument(skip(self, tx), fields(to = %tx.to))]
    async fn call(&self, tx: &TxRequest) -> std::result::Result<Bytes, RpcFailure> {
        Ok(self.provider.call(tx.to_alloy()).await?)
    }

    #[instrument(skip(self, tx), fields(to = %tx.to))]
    async fn send_transaction(&self, tx: &TxRequest) -> std::result::Result<TxHash, RpcFailure> {
        let pending = self.provider.send_transaction(tx.to_alloy()).await?;
        Ok(*pending.tx_hash())
    }
}

#[async_trait]
impl TokenReader for AlloyRpc {
    async fn balance_of(
        &self,
        token: Address,
        owner: Address,
    ) -> std::result::Result<U256, RpcFailure> {
        let input = IERC20::balanceOfCall { account: owner }.abi_encode();
        self.read_u256(token, input).await
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> std::result::Result<U256, RpcFailure> {
        let input = IERC20::allowanceCall { owner, spender }.abi_encode();
        self.read_u256(token, input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tx_request_carries_gas_limit() {
        let tx = TxRequest {
            chain_id: 250,
            from: Address::repeat_byte(1),
            to: Address::repeat_byte(2),
            input: Bytes::from(vec![1, 2, 3]),
            value: U256::ZERO,
            gas_limit: None,
        };
        let limited = tx.with_gas_limit(120_000);
        assert_eq!(limited.gas_limit, Some(120_000));
        assert_eq!(limited.input, tx.input);
    }

    #[test]
    fn failure_reason_prefers_revert_reason() {
        let mut failure = RpcFailure::new(Some(3), "execution reverted");
        assert_eq!(failure.reason(), "execution reverted");
        failure.revert_reason = Some("SYNCHRONIZER: EXPIRED".to_string());
        assert_eq!(failure.reason(), "SYNCHRONIZER: EXPIRED");
    }

    #[test]
    fn erc20_selectors_match_standard() {
        let input = IERC20::balanceOfCall {
            account: Address::ZERO,
        }
        .abi_encode();
        assert_eq!(&input[..4], &[0x70, 0xa0, 0x82, 0x31]);

        let input = IERC20::approveCall {
            spender: Address::ZERO,
            amount: U256::ZERO,
        }
        .abi_encode();
        assert_eq!(&input[..4], &[0x09, 0x5e, 0xa7, 0xb3]);
    }
}
