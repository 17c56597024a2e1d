//! Multisig wallet service backed by Safe v1.3.0.
//!
//! A wallet is a Safe proxy created through the proxy factory. Its address is derived with CREATE2 before the
//! creation transaction is sent, so it is fixed from submission onward. Changes to a wallet (e.g. enabling a
//! module) only happen through `execTransaction`, signed by its owners.

use std::sync::Arc;

use alloy::{
    primitives::{Address, Bytes, U256},
    signers::local::PrivateKeySigner,
    sol_types::SolCall,
};
use govboot_macros::log_context;

use crate::{
    chain::{self, wait_for_confirmations, ChainClient, ChainError, PendingTransaction},
    contracts::safe::{self, ISafe, ISafeProxyFactory, SafeDeployment},
    info,
    primitives::config::WaitOptions,
};

mod transaction;

pub use transaction::{domain_separator, SafeOperation, SafeTransaction, SafeTransactionData};

/// Errors raised by the multisig wallet service.
#[crate::error::govboot_error]
pub enum WalletError {
    /// The chain rejected or failed a call.
    #[error(transparent)]
    Chain(#[from] ChainError),
    /// The requested owners/threshold combination is not valid.
    #[error("invalid wallet configuration: {0}")]
    InvalidConfig(String),
    /// The proxy factory has no code at the configured address.
    #[error("no Safe proxy factory deployed at {0}")]
    FactoryNotDeployed(Address),
    /// The creation transaction was mined but no proxy exists at the expected address.
    #[error("Safe proxy was not created at {0}")]
    ProxyNotCreated(Address),
    /// The local signer is not an owner of the wallet.
    #[error("{signer} is not an owner of Safe {wallet}")]
    NotOwner {
        /// The local signer.
        signer: Address,
        /// The wallet.
        wallet: Address,
    },
    /// The wallet needs more signatures than this service can provide.
    #[error("Safe {wallet} requires {threshold} signatures, only one signer is available")]
    InsufficientSigners {
        /// The wallet.
        wallet: Address,
        /// Its threshold.
        threshold: u64,
    },
    /// Producing a signature failed.
    #[error("failed to sign Safe transaction: {0}")]
    Signing(String),
}

/// Owners and threshold of a wallet to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletConfig {
    /// Owner accounts.
    pub owners: Vec<Address>,
    /// Signatures required to execute a transaction.
    pub threshold: u64,
}

impl WalletConfig {
    /// A wallet controlled by a single key.
    #[must_use]
    pub fn single_owner(owner: Address) -> Self {
        Self {
            owners: vec![owner],
            threshold: 1,
        }
    }

    fn validate(&self) -> Result<(), WalletError> {
        if self.owners.is_empty() {
            return Err(WalletError::InvalidConfig("no owners".to_string()));
        }
        let owners = u64::try_from(self.owners.len()).unwrap_or(u64::MAX);
        if self.threshold == 0 || self.threshold > owners {
            return Err(WalletError::InvalidConfig(format!(
                "threshold {} with {} owners",
                self.threshold,
                self.owners.len()
            )));
        }
        Ok(())
    }
}

/// A deployed wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletHandle {
    address: Address,
    owners: Vec<Address>,
    threshold: u64,
}

impl WalletHandle {
    /// Describes an existing wallet.
    #[must_use]
    pub const fn new(address: Address, owners: Vec<Address>, threshold: u64) -> Self {
        Self {
            address,
            owners,
            threshold,
        }
    }

    /// The wallet's address.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// The wallet's owners.
    #[must_use]
    pub fn owners(&self) -> &[Address] {
        &self.owners
    }

    /// Signatures required per transaction.
    #[must_use]
    pub const fn threshold(&self) -> u64 {
        self.threshold
    }
}

/// Creates multisig wallets and runs signed transactions through them.
#[async_trait::async_trait]
pub trait MultisigWalletService: Send + Sync {
    /// Deploys a new wallet and returns once it exists on chain.
    async fn create_wallet(&self, config: WalletConfig) -> Result<WalletHandle, WalletError>;

    /// Loads an existing wallet's owners and threshold.
    async fn load_wallet(&self, address: Address) -> Result<WalletHandle, WalletError>;

    /// Binds `data` to the wallet's current nonce.
    async fn create_transaction(
        &self,
        wallet: &WalletHandle,
        data: SafeTransactionData,
    ) -> Result<SafeTransaction, WalletError>;

    /// Signs and submits a transaction. The caller waits for confirmations.
    async fn execute_transaction(
        &self,
        wallet: &WalletHandle,
        transaction: SafeTransaction,
    ) -> Result<PendingTransaction, WalletError>;

    /// Whether `module` is enabled on the wallet.
    async fn is_module_enabled(
        &self,
        wallet: &WalletHandle,
        module: Address,
    ) -> Result<bool, WalletError>;
}

/// [`MultisigWalletService`] over the Safe contracts, signing with one owner key.
pub struct SafeWalletService {
    chain: Arc<dyn ChainClient>,
    signer: PrivateKeySigner,
    deployment: SafeDeployment,
    confirmations: u64,
    wait: WaitOptions,
    salt_nonce: Option<U256>,
}

#[log_context]
impl SafeWalletService {
    /// Creates a service. `signer` must be the same key the chain client sends with.
    #[must_use]
    pub fn new(
        chain: Arc<dyn ChainClient>,
        signer: PrivateKeySigner,
        deployment: SafeDeployment,
    ) -> Self {
        Self {
            chain,
            signer,
            deployment,
            confirmations: 1,
            wait: WaitOptions::default(),
            salt_nonce: None,
        }
    }

    /// Confirmations to wait for after creating a wallet.
    #[must_use]
    pub fn with_confirmations(mut self, confirmations: u64, wait: WaitOptions) -> Self {
        self.confirmations = confirmations;
        self.wait = wait;
        self
    }

    /// Fixes the CREATE2 salt nonce instead of drawing a random one.
    #[must_use]
    pub const fn with_salt_nonce(mut self, salt_nonce: U256) -> Self {
        self.salt_nonce = Some(salt_nonce);
        self
    }

    /// The Safe contracts wallets are created from.
    #[must_use]
    pub const fn deployment(&self) -> &SafeDeployment {
        &self.deployment
    }

    async fn predict_address(
        &self,
        initializer: &[u8],
        salt_nonce: U256,
    ) -> Result<Address, WalletError> {
        let creation_code = chain::read(
            self.chain.as_ref(),
            self.deployment.proxy_factory,
            ISafeProxyFactory::proxyCreationCodeCall {},
        )
        .await?;
        Ok(safe::predict_proxy_address(
            &self.deployment,
            &creation_code,
            initializer,
            salt_nonce,
        ))
    }
}

#[async_trait::async_trait]
impl MultisigWalletService for SafeWalletService {
    async fn create_wallet(&self, config: WalletConfig) -> Result<WalletHandle, WalletError> {
        config.validate()?;

        let factory = self.deployment.proxy_factory;
        if self.chain.code_at(factory).await?.is_empty() {
            return Err(WalletError::FactoryNotDeployed(factory));
        }

        let initializer = safe::setup_calldata(
            &config.owners,
            config.threshold,
            self.deployment.fallback_handler,
        );
        let salt_nonce = self
            .salt_nonce
            .unwrap_or_else(|| U256::from(rand::random::<u64>()));
        let address = self.predict_address(&initializer, salt_nonce).await?;

        let call = ISafeProxyFactory::createProxyWithNonceCall {
            _singleton: self.deployment.singleton,
            initializer,
            saltNonce: salt_nonce,
        };
        let pending = self
            .chain
            .send_transaction(factory, call.abi_encode().into())
            .await?;
        info!("Creating Safe {address} (tx {})", pending.hash);
        wait_for_confirmations(self.chain.as_ref(), &pending, self.confirmations, self.wait)
            .await?;

        if self.chain.code_at(address).await?.is_empty() {
            return Err(WalletError::ProxyNotCreated(address));
        }
        Ok(WalletHandle::new(address, config.owners, config.threshold))
    }

    async fn load_wallet(&self, address: Address) -> Result<WalletHandle, WalletError> {
        let chain = self.chain.as_ref();
        let owners = chain::read(chain, address, ISafe::getOwnersCall {}).await?;
        let threshold = chain::read(chain, address, ISafe::getThresholdCall {}).await?;
        let threshold = u64::try_from(threshold)
            .map_err(|e| WalletError::InvalidConfig(format!("threshold: {e}")))?;
        Ok(WalletHandle::new(address, owners, threshold))
    }

    async fn create_transaction(
        &self,
        wallet: &WalletHandle,
        data: SafeTransactionData,
    ) -> Result<SafeTransaction, WalletError> {
        let nonce = chain::read(self.chain.as_ref(), wallet.address(), ISafe::nonceCall {}).await?;
        Ok(SafeTransaction::new(data, nonce))
    }

    async fn execute_transaction(
        &self,
        wallet: &WalletHandle,
        transaction: SafeTransaction,
    ) -> Result<PendingTransaction, WalletError> {
        let signer = self.signer.address();
        if !wallet.owners().contains(&signer) {
            return Err(WalletError::NotOwner {
                signer,
                wallet: wallet.address(),
            });
        }
        if wallet.threshold() > 1 {
            return Err(WalletError::InsufficientSigners {
                wallet: wallet.address(),
                threshold: wallet.threshold(),
            });
        }

        let chain_id = self.chain.chain_id().await?;
        let signatures: Bytes = transaction.sign(&self.signer, chain_id, wallet.address())?;
        let pending = self
            .chain
            .send_transaction(wallet.address(), transaction.exec_calldata(signatures))
            .await?;
        info!(
            "Executing Safe transaction {} on {} (tx {})",
            transaction.nonce,
            wallet.address(),
            pending.hash
        );
        Ok(pending)
    }

    async fn is_module_enabled(
        &self,
        wallet: &WalletHandle,
        module: Address,
    ) -> Result<bool, WalletError> {
        Ok(chain::read(
            self.chain.as_ref(),
            wallet.address(),
            ISafe::isModuleEnabledCall { module },
        )
        .await?)
    }
}
