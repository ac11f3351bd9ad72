use crate::error::{Result, SynchroError};
use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use tracing::info;
use zeroize::Zeroize;

/// Local key wallet that signs submitted trade and approval transactions
///
/// # Security
/// The private key is parsed once and zeroized; only the signer is retained.
#[derive(Clone)]
pub struct Wallet {
    signer: PrivateKeySigner,
    chain_id: u64,
}

impl Wallet {
    /// Create a wallet from a private key hex string
    pub fn from_private_key(private_key: &str, chain_id: u64) -> Result<Self> {
        let mut secure_key = private_key.trim().trim_start_matches("0x").to_string();

        let parsed = secure_key.parse::<PrivateKeySigner>();
        secure_key.zeroize();

        let signer = parsed
            .map_err(|e| SynchroError::Wallet(format!("Invalid private key: {}", e)))?
            .with_chain_id(Some(chain_id));

        info!("Wallet initialized: {} (private key zeroized from memory)", signer.address());

        Ok(Self { signer, chain_id })
    }

    /// Create a wallet from `SYNCHRO_PRIVATE_KEY` (or `PRIVATE_KEY`)
    pub fn from_env(chain_id: u64) -> Result<Self> {
        let mut private_key = std::env::var("SYNCHRO_PRIVATE_KEY")
            .or_else(|_| std::env::var("PRIVATE_KEY"))
            .map_err(|_| {
                SynchroError::Wallet(
                    "SYNCHRO_PRIVATE_KEY or PRIVATE_KEY environment variable not set".to_string(),
                )
            })?;

        let result = Self::from_private_key(&private_key, chain_id);
        private_key.zeroize();

        result
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Network wallet used by the provider to fill and sign transactions
    pub fn ethereum_wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .field("chain_id", &self.chain_id)
            .finish()
    }
}
