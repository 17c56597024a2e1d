//! The governance bootstrap sequence.
//!
//! [`Deployer::run`] deploys the voting token, a Safe and the governance module, initializes the module,
//! points its avatar and target at the Safe and finally enables it on the Safe through a signed Safe
//! transaction. Steps run strictly one after another and the first failure aborts the run. Explorer
//! verification is the exception: it is best effort and only logged.

use std::{path::PathBuf, sync::Arc};

use alloy::primitives::{Address, Bytes, U256};
use govboot_macros::log_context;

use crate::{
    artifacts::{ArtifactError, ArtifactStore, ContractArtifact},
    chain::{self, wait_for_confirmations, ChainClient, ChainError, PendingTransaction},
    contracts::{
        governance_module::{set_avatar_calldata, set_target_calldata, IGovernanceModule},
        safe::enable_module_calldata,
    },
    info,
    primitives::{
        config::{ConfigError, Network, WaitOptions},
        Percentage,
    },
    safe::{MultisigWalletService, SafeTransactionData, WalletConfig, WalletError, WalletHandle},
    verification::{VerificationReceipt, VerificationRequest, Verifier},
    warn,
};

/// The on-disk deployment record.
pub mod record;

pub use crate::contracts::governance_module::ModuleConfig;
use record::{DeploymentRecord, RecordError};

const STEP_CONNECT: &str = "connect";
const STEP_TOKEN: &str = "deploy token";
const STEP_WALLET: &str = "deploy wallet";
const STEP_MODULE: &str = "deploy module";
const STEP_INITIALIZE: &str = "initialize module";
const STEP_BIND: &str = "bind module";
const STEP_ENABLE: &str = "enable module";

/// Errors that abort a deployment.
#[crate::error::govboot_error]
pub enum DeployError {
    /// A contract artifact could not be loaded.
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    /// A chain call failed.
    #[error("{step} failed: {source}")]
    Chain {
        /// The step that failed.
        step: &'static str,
        /// The underlying error.
        #[source]
        source: ChainError,
    },
    /// A wallet operation failed.
    #[error("{step} failed: {source}")]
    Wallet {
        /// The step that failed.
        step: &'static str,
        /// The underlying error.
        #[source]
        source: WalletError,
    },
    /// The module was initialized by someone else, or for another wallet.
    #[error("module {module} is already initialized with another owner")]
    AlreadyInitialized {
        /// The module.
        module: Address,
    },
    /// `initialize` was mined but the module still reports itself uninitialized.
    #[error("module {module} is still not initialized")]
    NotInitialized {
        /// The module.
        module: Address,
    },
    /// Avatar or target do not point at the wallet after binding.
    #[error("module is bound to avatar {avatar} and target {target}, expected {expected}")]
    Binding {
        /// The wallet.
        expected: Address,
        /// `avatar()` after binding.
        avatar: Address,
        /// `target()` after binding.
        target: Address,
    },
    /// The wallet does not report the module as enabled.
    #[error("module {module} is not enabled on Safe {wallet}")]
    ModuleNotEnabled {
        /// The module.
        module: Address,
        /// The wallet.
        wallet: Address,
    },
    /// A transaction did not reach the confirmation depth in time.
    #[error("{step} timed out after {seconds} seconds waiting for confirmations")]
    Timeout {
        /// The step that timed out.
        step: &'static str,
        /// The configured bound.
        seconds: u64,
    },
    /// A required setting is missing.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The deployment record could not be used.
    #[error(transparent)]
    Record(#[from] RecordError),
}

fn chain_error(step: &'static str, source: ChainError) -> DeployError {
    match source {
        ChainError::Timeout { seconds, .. } => DeployError::Timeout { step, seconds },
        source => DeployError::Chain { step, source },
    }
}

fn wallet_error(step: &'static str, source: WalletError) -> DeployError {
    match source {
        WalletError::Chain(source) => chain_error(step, source),
        source => DeployError::Wallet { step, source },
    }
}

/// Parameters of one bootstrap run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentIntent {
    /// Target network.
    pub network: Network,
    /// Artifact name of the voting token.
    pub token_artifact: String,
    /// Artifact name of the governance module.
    pub module_artifact: String,
    /// Quorum, as a share of the token supply.
    pub quorum: Percentage,
    /// Minimum participation, as a share of the token supply.
    pub min_participation: Percentage,
    /// Voting period, in seconds.
    pub vote_length: u64,
    /// Passed verbatim to `initialize`.
    pub version_tag: u64,
    /// Safe owners. Empty means the deployer alone.
    pub owners: Vec<Address>,
    /// Safe threshold.
    pub threshold: u64,
    /// Blocks a transaction must be buried under before the next step starts.
    pub confirmations: u64,
    /// Polling and timeout for confirmation waits.
    pub wait: WaitOptions,
}

/// Default voting period: two minutes.
pub const DEFAULT_VOTE_LENGTH: u64 = 120;

/// Default `versionTag` passed to `initialize`.
pub const DEFAULT_VERSION_TAG: u64 = 5;

/// Default confirmation depth.
pub const DEFAULT_CONFIRMATIONS: u64 = 3;

impl DeploymentIntent {
    /// The standard bootstrap for `network`: 50% quorum, 5% minimum participation, two minute votes and a
    /// single-owner Safe.
    #[must_use]
    pub fn new(network: Network) -> Self {
        Self {
            network,
            token_artifact: "VotingToken".to_string(),
            module_artifact: "MetaVotingModule".to_string(),
            quorum: Percentage::HALF,
            min_participation: Percentage::FIVE,
            vote_length: DEFAULT_VOTE_LENGTH,
            version_tag: DEFAULT_VERSION_TAG,
            owners: Vec::new(),
            threshold: 1,
            confirmations: DEFAULT_CONFIRMATIONS,
            wait: WaitOptions::default(),
        }
    }

    fn module_config(&self, wallet: Address, token: Address) -> ModuleConfig {
        ModuleConfig {
            avatar: wallet,
            token,
            quorum_numerator: self.quorum.to_fixed_point(),
            min_participation: self.min_participation.to_fixed_point(),
            vote_length: U256::from(self.vote_length),
            version_tag: U256::from(self.version_tag),
        }
    }
}

/// Addresses produced by a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploymentReport {
    /// Voting token.
    pub token: Address,
    /// Safe.
    pub wallet: Address,
    /// Governance module.
    pub module: Address,
    /// Whether the Safe reports the module as enabled. Always true on success.
    pub module_enabled: bool,
}

/// What the chain currently says about a recorded deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentStatus {
    /// The record the status was read for.
    pub record: DeploymentRecord,
    /// Whether code exists at the token address.
    pub token_deployed: bool,
    /// Whether code exists at the wallet address.
    pub wallet_deployed: bool,
    /// Whether code exists at the module address.
    pub module_deployed: bool,
    /// `initialized()`, if the module exists.
    pub module_initialized: Option<bool>,
    /// `(avatar(), target())`, if the module exists.
    pub binding: Option<(Address, Address)>,
    /// `isModuleEnabled(module)`, if both wallet and module exist.
    pub module_enabled: Option<bool>,
}

/// Runs the bootstrap sequence against injected collaborators.
pub struct Deployer {
    chain: Arc<dyn ChainClient>,
    wallets: Arc<dyn MultisigWalletService>,
    artifacts: Arc<dyn ArtifactStore>,
    verifier: Arc<dyn Verifier>,
    intent: DeploymentIntent,
    record_path: Option<PathBuf>,
}

#[log_context]
impl Deployer {
    /// Creates a deployer.
    #[must_use]
    pub fn new(
        chain: Arc<dyn ChainClient>,
        wallets: Arc<dyn MultisigWalletService>,
        artifacts: Arc<dyn ArtifactStore>,
        verifier: Arc<dyn Verifier>,
        intent: DeploymentIntent,
    ) -> Self {
        Self {
            chain,
            wallets,
            artifacts,
            verifier,
            intent,
            record_path: None,
        }
    }

    /// Persists progress to `path` and resumes from it if it already exists.
    #[must_use]
    pub fn with_record(mut self, path: impl Into<PathBuf>) -> Self {
        self.record_path = Some(path.into());
        self
    }

    /// The parameters of this run.
    #[must_use]
    pub const fn intent(&self) -> &DeploymentIntent {
        &self.intent
    }

    /// Runs the full bootstrap sequence.
    ///
    /// # Errors
    /// Returns the first fatal error; later steps do not run. Verification failures are not fatal.
    pub async fn run(&self) -> Result<DeploymentReport, DeployError> {
        let chain_id = chain::ensure_network(self.chain.as_ref(), self.intent.network)
            .await
            .map_err(|e| chain_error(STEP_CONNECT, e))?;
        let mut record = self.load_record(chain_id)?;
        info!(
            "Bootstrapping governance on {} (chain {chain_id}) from {}",
            self.intent.network,
            self.chain.signer_address()
        );

        // 1. token
        let (token, token_artifact, token_is_new) = self
            .deploy_contract(STEP_TOKEN, &self.intent.token_artifact, record.token)
            .await?;
        record.token = Some(token);
        self.save_record(&record)?;

        // 2. token verification
        if token_is_new {
            self.verify(token, token_artifact).await;
        }

        // 3. wallet
        let wallet = self.deploy_wallet(&mut record).await?;
        self.save_record(&record)?;

        // 4. module
        let (module, module_artifact, module_is_new) = self
            .deploy_contract(STEP_MODULE, &self.intent.module_artifact, record.module)
            .await?;
        if module_is_new {
            record.reset_module(module);
        }
        self.save_record(&record)?;

        // 5. module verification
        if module_is_new {
            self.verify(module, module_artifact).await;
        }

        // 6. initialize
        self.initialize_module(module, wallet.address(), token, &mut record)
            .await?;
        self.save_record(&record)?;

        // 7. bind
        self.bind_module(module, wallet.address(), module_is_new)
            .await?;
        record.module_bound = true;
        self.save_record(&record)?;

        // 8. enable
        self.enable_module(module, &wallet).await?;

        // 9. confirm enablement
        let module_enabled = self
            .wallets
            .is_module_enabled(&wallet, module)
            .await
            .map_err(|e| wallet_error(STEP_ENABLE, e))?;
        if !module_enabled {
            return Err(DeployError::ModuleNotEnabled {
                module,
                wallet: wallet.address(),
            });
        }
        record.module_enabled = true;
        self.save_record(&record)?;

        info!(
            "Governance ready: token {token}, Safe {}, module {module}",
            wallet.address()
        );
        Ok(DeploymentReport {
            token,
            wallet: wallet.address(),
            module,
            module_enabled,
        })
    }

    /// Deploys only the governance module and waits for its confirmations.
    ///
    /// # Errors
    /// - `DeployError::Artifact` if the module artifact cannot be loaded.
    /// - `DeployError::Chain` if the node serves another chain than the intent's network.
    /// - `DeployError::Chain` or `DeployError::Timeout` if the deployment fails.
    pub async fn deploy_module_only(&self) -> Result<Address, DeployError> {
        chain::ensure_network(self.chain.as_ref(), self.intent.network)
            .await
            .map_err(|e| chain_error(STEP_CONNECT, e))?;
        let (module, _, _) = self
            .deploy_contract(STEP_MODULE, &self.intent.module_artifact, None)
            .await?;
        info!("{} deployed to: {module}", self.intent.module_artifact);
        Ok(module)
    }

    /// Reads the on-chain state of a recorded deployment.
    ///
    /// # Errors
    /// - `DeployError::Chain` if the node cannot be queried.
    pub async fn status(&self, record: DeploymentRecord) -> Result<DeploymentStatus, DeployError> {
        let step = "status";
        let chain = self.chain.as_ref();
        let has_code = move |address: Option<Address>| async move {
            match address {
                Some(address) => chain
                    .code_at(address)
                    .await
                    .map(|code| !code.is_empty())
                    .map_err(|e| chain_error(step, e)),
                None => Ok(false),
            }
        };
        let token_deployed = has_code(record.token).await?;
        let wallet_deployed = has_code(record.wallet).await?;
        let module_deployed = has_code(record.module).await?;

        let (mut module_initialized, mut binding, mut module_enabled) = (None, None, None);
        if let Some(module) = record.module.filter(|_| module_deployed) {
            let read = |e| chain_error(step, e);
            module_initialized = Some(
                chain::read(chain, module, IGovernanceModule::initializedCall {})
                    .await
                    .map_err(read)?,
            );
            let avatar = chain::read(chain, module, IGovernanceModule::avatarCall {})
                .await
                .map_err(read)?;
            let target = chain::read(chain, module, IGovernanceModule::targetCall {})
                .await
                .map_err(read)?;
            binding = Some((avatar, target));

            if let Some(wallet) = record.wallet.filter(|_| wallet_deployed) {
                let handle = WalletHandle::new(wallet, Vec::new(), 0);
                module_enabled = Some(
                    self.wallets
                        .is_module_enabled(&handle, module)
                        .await
                        .map_err(|e| wallet_error(step, e))?,
                );
            }
        }

        Ok(DeploymentStatus {
            record,
            token_deployed,
            wallet_deployed,
            module_deployed,
            module_initialized,
            binding,
            module_enabled,
        })
    }

    fn load_record(&self, chain_id: u64) -> Result<DeploymentRecord, DeployError> {
        let fresh = || DeploymentRecord::new(self.intent.network.as_str(), chain_id);
        let Some(path) = &self.record_path else {
            return Ok(fresh());
        };
        match DeploymentRecord::load(path)? {
            Some(record) => {
                record.ensure_chain(chain_id)?;
                info!("Resuming from deployment record {}", path.display());
                Ok(record)
            }
            None => Ok(fresh()),
        }
    }

    fn save_record(&self, record: &DeploymentRecord) -> Result<(), DeployError> {
        if let Some(path) = &self.record_path {
            record.save(path)?;
        }
        Ok(())
    }

    async fn wait(&self, step: &'static str, pending: &PendingTransaction) -> Result<(), DeployError> {
        wait_for_confirmations(
            self.chain.as_ref(),
            pending,
            self.intent.confirmations,
            self.intent.wait,
        )
        .await
        .map_err(|e| chain_error(step, e))?;
        Ok(())
    }

    async fn send(&self, step: &'static str, to: Address, data: Bytes) -> Result<(), DeployError> {
        let pending = self
            .chain
            .send_transaction(to, data)
            .await
            .map_err(|e| chain_error(step, e))?;
        self.wait(step, &pending).await
    }

    async fn has_code(&self, step: &'static str, address: Address) -> Result<bool, DeployError> {
        let code = self
            .chain
            .code_at(address)
            .await
            .map_err(|e| chain_error(step, e))?;
        Ok(!code.is_empty())
    }

    /// Deploys `artifact_name`, or reuses `existing` if code is already there.
    async fn deploy_contract(
        &self,
        step: &'static str,
        artifact_name: &str,
        existing: Option<Address>,
    ) -> Result<(Address, ContractArtifact, bool), DeployError> {
        let artifact = self.artifacts.load(artifact_name)?;

        if let Some(address) = existing {
            if self.has_code(step, address).await? {
                info!("Reusing {artifact_name} at {address}");
                return Ok((address, artifact, false));
            }
            warn!("Recorded {artifact_name} at {address} has no code, deploying again");
        }

        let pending = self
            .chain
            .deploy(artifact.bytecode.clone(), Bytes::new())
            .await
            .map_err(|e| chain_error(step, e))?;
        let address = pending.contract_address.ok_or_else(|| DeployError::Generic {
            message: format!("{step}: deployment {} has no contract address", pending.hash),
        })?;
        info!("{artifact_name} deploying to {address} (tx {})", pending.hash);
        self.wait(step, &pending).await?;
        info!("{artifact_name} deployed to: {address}");
        Ok((address, artifact, true))
    }

    async fn deploy_wallet(&self, record: &mut DeploymentRecord) -> Result<WalletHandle, DeployError> {
        if let Some(address) = record.wallet {
            if self.has_code(STEP_WALLET, address).await? {
                let wallet = self
                    .wallets
                    .load_wallet(address)
                    .await
                    .map_err(|e| wallet_error(STEP_WALLET, e))?;
                info!("Reusing Safe at {address}");
                return Ok(wallet);
            }
            warn!("Recorded Safe at {address} has no code, deploying again");
        }

        let owners = if self.intent.owners.is_empty() {
            vec![self.chain.signer_address()]
        } else {
            self.intent.owners.clone()
        };
        let wallet = self
            .wallets
            .create_wallet(WalletConfig {
                owners,
                threshold: self.intent.threshold,
            })
            .await
            .map_err(|e| wallet_error(STEP_WALLET, e))?;
        info!("Safe deployed to: {}", wallet.address());
        record.reset_wallet(wallet.address());
        Ok(wallet)
    }

    async fn verify(&self, address: Address, artifact: ContractArtifact) {
        let name = artifact.contract_name.clone();
        let request = VerificationRequest {
            address,
            artifact,
            constructor_args: Bytes::new(),
        };
        match self.verifier.verify(request).await {
            Ok(VerificationReceipt::Skipped) => {}
            Ok(receipt) => info!("{name} verification: {receipt:?}"),
            Err(e) => warn!("Failed to verify {name} at {address}: {e}"),
        }
    }

    async fn initialize_module(
        &self,
        module: Address,
        wallet: Address,
        token: Address,
        record: &mut DeploymentRecord,
    ) -> Result<(), DeployError> {
        let chain = self.chain.as_ref();
        let is_initialized = move || async move {
            chain::read(chain, module, IGovernanceModule::initializedCall {})
                .await
                .map_err(|e| chain_error(STEP_INITIALIZE, e))
        };

        if is_initialized().await? {
            if record.module_initialized {
                info!("Module {module} already initialized by this deployment");
                return Ok(());
            }
            // An interrupted run may have mined `initialize` without saving the record.
            let owner = chain::read(chain, module, IGovernanceModule::ownerCall {})
                .await
                .map_err(|e| chain_error(STEP_INITIALIZE, e))?;
            if owner == wallet {
                info!("Module {module} is already initialized for {wallet}, adopting it");
                record.module_initialized = true;
                return Ok(());
            }
            return Err(DeployError::AlreadyInitialized { module });
        }

        let config = self.intent.module_config(wallet, token);
        info!(
            "Initializing module {module}: quorum {}, min participation {}, vote length {}s, version tag {}",
            self.intent.quorum,
            self.intent.min_participation,
            self.intent.vote_length,
            self.intent.version_tag
        );
        self.send(STEP_INITIALIZE, module, config.initialize_calldata())
            .await?;

        if !is_initialized().await? {
            return Err(DeployError::NotInitialized { module });
        }
        record.module_initialized = true;
        Ok(())
    }

    /// Points avatar and target at `wallet`. A reused module skips the calls that are already in place.
    async fn bind_module(
        &self,
        module: Address,
        wallet: Address,
        module_is_new: bool,
    ) -> Result<(), DeployError> {
        let chain = self.chain.as_ref();
        let binding = move || async move {
            let read = |e| chain_error(STEP_BIND, e);
            let avatar = chain::read(chain, module, IGovernanceModule::avatarCall {})
                .await
                .map_err(read)?;
            let target = chain::read(chain, module, IGovernanceModule::targetCall {})
                .await
                .map_err(read)?;
            Ok::<_, DeployError>((avatar, target))
        };

        let (avatar, target) = binding().await?;
        if module_is_new || avatar != wallet {
            self.send(STEP_BIND, module, set_avatar_calldata(wallet))
                .await?;
        }
        if module_is_new || target != wallet {
            self.send(STEP_BIND, module, set_target_calldata(wallet))
                .await?;
        }

        let (avatar, target) = binding().await?;
        if avatar != wallet || target != wallet {
            return Err(DeployError::Binding {
                expected: wallet,
                avatar,
                target,
            });
        }
        info!("Module {module} avatar and target set to {wallet}");
        Ok(())
    }

    async fn enable_module(&self, module: Address, wallet: &WalletHandle) -> Result<(), DeployError> {
        let enabled = self
            .wallets
            .is_module_enabled(wallet, module)
            .await
            .map_err(|e| wallet_error(STEP_ENABLE, e))?;
        if enabled {
            info!("Module {module} already enabled on {}", wallet.address());
            return Ok(());
        }

        let transaction = self
            .wallets
            .create_transaction(
                wallet,
                SafeTransactionData {
                    to: wallet.address(),
                    value: U256::ZERO,
                    data: enable_module_calldata(module),
                },
            )
            .await
            .map_err(|e| wallet_error(STEP_ENABLE, e))?;
        let pending = self
            .wallets
            .execute_transaction(wallet, transaction)
            .await
            .map_err(|e| wallet_error(STEP_ENABLE, e))?;
        self.wait(STEP_ENABLE, &pending).await
    }
}
