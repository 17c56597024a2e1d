//! In-memory doubles for the deployer's collaborators.
//!
//! [`MockChain`] auto-mines every transaction into its own block and understands just enough of the Safe proxy
//! factory, the Safe and the governance module to run the whole bootstrap sequence without a node.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use alloy::{
    primitives::{keccak256, Address, Bytes, Signature, TxHash, U256},
    signers::local::PrivateKeySigner,
    sol_types::{abi::TokenSeq, SolCall, SolType, SolValue},
};
use serde_json::json;

use crate::{
    artifacts::{ArtifactError, ArtifactStore, BuildInfo, ContractArtifact},
    chain::{signer_from_key, ChainClient, ChainError, PendingTransaction, TransactionStatus},
    contracts::{
        governance_module::IGovernanceModule,
        safe::{predict_proxy_address, ISafe, ISafeProxyFactory, SafeDeployment},
    },
    primitives::{
        config::ANVIL_DEFAULT_PRIVATE_KEY,
        http_client::{HttpClient, HttpError, HttpHeader, HttpMethod},
    },
    safe::SafeTransaction,
    verification::{VerificationError, VerificationReceipt, VerificationRequest, Verifier},
};

/// Code the mock factory reports from `proxyCreationCode()`.
pub const MOCK_PROXY_CREATION_CODE: &[u8] = &[0x60, 0x80, 0x60, 0x40, 0x52, 0x34, 0x80, 0x15];

/// The Anvil development key the mocks sign with.
pub fn test_signer() -> PrivateKeySigner {
    signer_from_key(ANVIL_DEFAULT_PRIVATE_KEY).unwrap()
}

#[derive(Debug, Default, Clone)]
struct ModuleState {
    initialized: bool,
    avatar: Address,
    target: Address,
    initialize: Option<IGovernanceModule::initializeCall>,
}

#[derive(Debug, Clone)]
struct SafeState {
    owners: Vec<Address>,
    threshold: U256,
    nonce: U256,
    modules: HashSet<Address>,
}

#[derive(Default)]
struct ChainState {
    head: u64,
    nonce: u64,
    tx_count: u64,
    code: HashMap<Address, Bytes>,
    modules: HashMap<Address, ModuleState>,
    safes: HashMap<Address, SafeState>,
    receipts: HashMap<TxHash, TransactionStatus>,
    deployments: Vec<Address>,
    sent: Vec<(Address, Bytes)>,
    fail_deploys_after: Option<usize>,
    reverted_selectors: HashSet<[u8; 4]>,
    ignored_selectors: HashSet<[u8; 4]>,
    producing_blocks: bool,
    stalled: bool,
    deploy_initialized: bool,
    bind_on_initialize: bool,
}

/// A single-account chain that mines instantly.
#[derive(Clone)]
pub struct MockChain {
    chain_id: u64,
    signer: Address,
    state: Arc<Mutex<ChainState>>,
}

impl MockChain {
    /// A chain with a Safe proxy factory at its canonical address.
    ///
    /// Every head poll produces a new block, so any confirmation depth is eventually reached.
    pub fn new(chain_id: u64) -> Self {
        let chain = Self {
            chain_id,
            signer: test_signer().address(),
            state: Arc::default(),
        };
        chain.state().producing_blocks = true;
        chain.install_code(
            crate::contracts::safe::PROXY_FACTORY_V1_3_0,
            Bytes::from_static(&[0x60, 0x80]),
        );
        chain
    }

    fn state(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap()
    }

    /// Puts code at `address`.
    pub fn install_code(&self, address: Address, code: Bytes) {
        self.state().code.insert(address, code);
    }

    /// Removes the code at `address`.
    pub fn remove_code(&self, address: Address) {
        self.state().code.remove(&address);
    }

    /// Lets `successful` more deployments through, then fails every later one.
    pub fn fail_deploys_after(&self, successful: usize) {
        self.state().fail_deploys_after = Some(successful);
    }

    /// Every transaction whose calldata starts with `selector` reverts.
    pub fn revert_calls_to(&self, selector: [u8; 4]) {
        self.state().reverted_selectors.insert(selector);
    }

    /// Transactions whose calldata starts with `selector` succeed without any effect.
    pub fn ignore_calls_to(&self, selector: [u8; 4]) {
        self.state().ignored_selectors.insert(selector);
    }

    /// Lets deployments succeed again after [`MockChain::fail_deploys_after`].
    pub fn allow_deploys(&self) {
        self.state().fail_deploys_after = None;
    }

    /// Stops producing blocks on head polls; only transactions and
    /// [`MockChain::mine_in_background`] move the head.
    pub fn freeze_head(&self) {
        self.state().producing_blocks = false;
    }

    /// Marks an already mined transaction as reverted.
    pub fn revert(&self, hash: TxHash) {
        if let Some(status) = self.state().receipts.get_mut(&hash) {
            status.success = false;
        }
    }

    /// Stops mining; later transactions stay pending forever.
    pub fn stall(&self) {
        self.state().stalled = true;
    }

    /// New deployments come up already initialized, as if someone front-ran `initialize`.
    pub fn deploy_initialized(&self) {
        self.state().deploy_initialized = true;
    }

    /// `initialize` also points avatar and target at the new owner, as some module implementations do.
    pub fn bind_on_initialize(&self) {
        self.state().bind_on_initialize = true;
    }

    /// Adds `blocks` empty blocks, one per `interval`, from a background task.
    pub fn mine_in_background(&self, blocks: u64, interval: Duration) {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            for _ in 0..blocks {
                tokio::time::sleep(interval).await;
                state.lock().unwrap().head += 1;
            }
        });
    }

    /// Current block number.
    pub fn head(&self) -> u64 {
        self.state().head
    }

    /// Contracts created through [`ChainClient::deploy`], in order.
    pub fn deployments(&self) -> Vec<Address> {
        self.state().deployments.clone()
    }

    /// Every non-deployment transaction sent, in order.
    pub fn sent(&self) -> Vec<(Address, Bytes)> {
        self.state().sent.clone()
    }

    /// The arguments the module at `module` was initialized with.
    pub fn initialize_args(&self, module: Address) -> Option<IGovernanceModule::initializeCall> {
        self.state()
            .modules
            .get(&module)
            .and_then(|m| m.initialize.clone())
    }

    fn record(&self, state: &mut ChainState, success: bool) -> TxHash {
        state.tx_count += 1;
        let hash = keccak256(state.tx_count.to_be_bytes());
        if !state.stalled {
            state.head += 1;
            state.receipts.insert(
                hash,
                TransactionStatus {
                    block_number: state.head,
                    success,
                },
            );
        }
        hash
    }

    fn execute(&self, state: &mut ChainState, to: Address, data: &[u8]) -> bool {
        let selector: [u8; 4] = match data.get(..4).and_then(|s| s.try_into().ok()) {
            Some(selector) => selector,
            None => return true,
        };
        if state.reverted_selectors.contains(&selector) {
            return false;
        }
        if state.ignored_selectors.contains(&selector) {
            return true;
        }

        if selector == ISafeProxyFactory::createProxyWithNonceCall::SELECTOR {
            return Self::create_proxy(state, to, data);
        }
        if selector == ISafe::execTransactionCall::SELECTOR && state.safes.contains_key(&to) {
            return self.exec_safe_transaction(state, to, data);
        }
        let bind_on_initialize = state.bind_on_initialize;
        if let Some(module) = state.modules.get_mut(&to) {
            return apply_module_call(module, selector, data, bind_on_initialize);
        }
        true
    }

    fn create_proxy(state: &mut ChainState, factory: Address, data: &[u8]) -> bool {
        let Ok(call) = ISafeProxyFactory::createProxyWithNonceCall::abi_decode(data) else {
            return false;
        };
        let Ok(setup) = ISafe::setupCall::abi_decode(&call.initializer) else {
            return false;
        };
        let deployment = SafeDeployment {
            proxy_factory: factory,
            singleton: call._singleton,
            fallback_handler: setup.fallbackHandler,
        };
        let proxy = predict_proxy_address(
            &deployment,
            MOCK_PROXY_CREATION_CODE,
            &call.initializer,
            call.saltNonce,
        );
        if state.code.contains_key(&proxy) {
            return false;
        }
        state.code.insert(proxy, Bytes::from_static(&[0x60, 0x80, 0x60, 0x40]));
        state.safes.insert(
            proxy,
            SafeState {
                owners: setup._owners,
                threshold: setup._threshold,
                nonce: U256::ZERO,
                modules: HashSet::new(),
            },
        );
        true
    }

    fn exec_safe_transaction(&self, state: &mut ChainState, safe: Address, data: &[u8]) -> bool {
        let Ok(call) = ISafe::execTransactionCall::abi_decode(data) else {
            return false;
        };
        let Some(wallet) = state.safes.get_mut(&safe) else {
            return false;
        };

        let signatures = call.signatures.clone();
        let transaction = SafeTransaction {
            nonce: wallet.nonce,
            ..SafeTransaction::from(call)
        };
        let hash = transaction.signing_hash(self.chain_id, safe);
        let signer = Signature::from_raw(&signatures)
            .ok()
            .and_then(|signature| signature.recover_address_from_prehash(&hash).ok());
        if !signer.is_some_and(|signer| wallet.owners.contains(&signer)) {
            return false;
        }

        // Only self-calls that enable a module are understood.
        if transaction.to != safe {
            return false;
        }
        let Ok(enable) = ISafe::enableModuleCall::abi_decode(&transaction.data) else {
            return false;
        };
        if enable.module == Address::ZERO || !wallet.modules.insert(enable.module) {
            return false;
        }
        wallet.nonce += U256::from(1);
        true
    }

    fn view(&self, state: &ChainState, to: Address, data: &[u8]) -> Bytes {
        let Some(selector) = data.get(..4) else {
            return Bytes::new();
        };

        if selector == ISafeProxyFactory::proxyCreationCodeCall::SELECTOR
            && state.code.contains_key(&to)
        {
            return encode((Bytes::from_static(MOCK_PROXY_CREATION_CODE),));
        }
        if let Some(wallet) = state.safes.get(&to) {
            if selector == ISafe::isModuleEnabledCall::SELECTOR {
                return match ISafe::isModuleEnabledCall::abi_decode(data) {
                    Ok(call) => encode((wallet.modules.contains(&call.module),)),
                    Err(_) => Bytes::new(),
                };
            }
            if selector == ISafe::nonceCall::SELECTOR {
                return encode((wallet.nonce,));
            }
            if selector == ISafe::getOwnersCall::SELECTOR {
                return encode((wallet.owners.clone(),));
            }
            if selector == ISafe::getThresholdCall::SELECTOR {
                return encode((wallet.threshold,));
            }
        }
        if let Some(module) = state.modules.get(&to) {
            if selector == IGovernanceModule::initializedCall::SELECTOR {
                return encode((module.initialized,));
            }
            if selector == IGovernanceModule::avatarCall::SELECTOR {
                return encode((module.avatar,));
            }
            if selector == IGovernanceModule::targetCall::SELECTOR {
                return encode((module.target,));
            }
            if selector == IGovernanceModule::ownerCall::SELECTOR {
                let owner = module
                    .initialize
                    .as_ref()
                    .map_or(Address::ZERO, |call| call.owner);
                return encode((owner,));
            }
        }
        Bytes::new()
    }
}

fn encode<T: SolValue>(values: T) -> Bytes
where
    for<'a> <T::SolType as SolType>::Token<'a>: TokenSeq<'a>,
{
    values.abi_encode_params().into()
}

fn apply_module_call(
    module: &mut ModuleState,
    selector: [u8; 4],
    data: &[u8],
    bind_on_initialize: bool,
) -> bool {
    if selector == IGovernanceModule::initializeCall::SELECTOR {
        if module.initialized {
            return false;
        }
        let Ok(call) = IGovernanceModule::initializeCall::abi_decode(data) else {
            return false;
        };
        module.initialized = true;
        if bind_on_initialize {
            module.avatar = call.owner;
            module.target = call.owner;
        }
        module.initialize = Some(call);
        return true;
    }
    if selector == IGovernanceModule::setAvatarCall::SELECTOR {
        return IGovernanceModule::setAvatarCall::abi_decode(data)
            .map(|call| module.avatar = call.avatar)
            .is_ok();
    }
    if selector == IGovernanceModule::setTargetCall::SELECTOR {
        return IGovernanceModule::setTargetCall::abi_decode(data)
            .map(|call| module.target = call.target)
            .is_ok();
    }
    true
}

#[async_trait::async_trait]
impl ChainClient for MockChain {
    fn signer_address(&self) -> Address {
        self.signer
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        Ok(self.chain_id)
    }

    async fn deploy(
        &self,
        bytecode: Bytes,
        constructor_args: Bytes,
    ) -> Result<PendingTransaction, ChainError> {
        let mut state = self.state();
        if let Some(remaining) = state.fail_deploys_after {
            if remaining == 0 {
                return Err(ChainError::Rpc {
                    message: "insufficient funds for gas * price + value".to_string(),
                });
            }
            state.fail_deploys_after = Some(remaining - 1);
        }

        let address = self.signer.create(state.nonce);
        state.nonce += 1;
        let mut code = bytecode.to_vec();
        code.extend_from_slice(&constructor_args);
        state.code.insert(address, code.into());
        let initialized = state.deploy_initialized;
        state.modules.insert(
            address,
            ModuleState {
                initialized,
                ..ModuleState::default()
            },
        );
        state.deployments.push(address);

        let hash = self.record(&mut state, true);
        Ok(PendingTransaction {
            hash,
            contract_address: Some(address),
        })
    }

    async fn send_transaction(
        &self,
        to: Address,
        data: Bytes,
    ) -> Result<PendingTransaction, ChainError> {
        let mut state = self.state();
        state.nonce += 1;
        state.sent.push((to, data.clone()));
        let success = if state.stalled {
            true
        } else {
            self.execute(&mut state, to, &data)
        };
        let hash = self.record(&mut state, success);
        Ok(PendingTransaction {
            hash,
            contract_address: None,
        })
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        let state = self.state();
        Ok(self.view(&state, to, &data))
    }

    async fn transaction_status(
        &self,
        hash: TxHash,
    ) -> Result<Option<TransactionStatus>, ChainError> {
        Ok(self.state().receipts.get(&hash).copied())
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        let mut state = self.state();
        if state.producing_blocks {
            state.head += 1;
        }
        Ok(state.head)
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, ChainError> {
        Ok(self.state().code.get(&address).cloned().unwrap_or_default())
    }
}

/// Artifact store over a fixed set of contracts.
#[derive(Default)]
pub struct InMemoryArtifacts {
    artifacts: HashMap<String, ContractArtifact>,
}

impl InMemoryArtifacts {
    /// One artifact per name, each with distinct bytecode and build info.
    pub fn with_contracts(names: &[&str]) -> Self {
        let artifacts = names
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let seed = u8::try_from(index).unwrap();
                (
                    (*name).to_string(),
                    ContractArtifact {
                        contract_name: (*name).to_string(),
                        source_name: format!("src/{name}.sol"),
                        abi: json!([]),
                        bytecode: Bytes::from(vec![0x60, 0x80, 0x60, 0x40, seed]),
                        build_info: Some(BuildInfo {
                            solc_long_version: "0.8.15+commit.e14f2714".to_string(),
                            input: json!({
                                "language": "Solidity",
                                "sources": { format!("src/{name}.sol"): { "content": "" } },
                            }),
                        }),
                    },
                )
            })
            .collect();
        Self { artifacts }
    }
}

impl ArtifactStore for InMemoryArtifacts {
    fn load(&self, name: &str) -> Result<ContractArtifact, ArtifactError> {
        self.artifacts
            .get(name)
            .cloned()
            .ok_or_else(|| ArtifactError::NotFound {
                name: name.to_string(),
                root: "<memory>".to_string(),
            })
    }
}

/// Verifier that records requests and answers with a fixed outcome.
#[derive(Clone, Default)]
pub struct MockVerifier {
    fail: bool,
    requests: Arc<Mutex<Vec<Address>>>,
}

impl MockVerifier {
    /// A verifier that accepts everything.
    pub fn accepting() -> Self {
        Self::default()
    }

    /// A verifier that rejects everything.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Addresses verification was requested for.
    pub fn requests(&self) -> Vec<Address> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Verifier for MockVerifier {
    async fn verify(
        &self,
        request: VerificationRequest,
    ) -> Result<VerificationReceipt, VerificationError> {
        self.requests.lock().unwrap().push(request.address);
        if self.fail {
            return Err(VerificationError::Rejected {
                message: "Invalid API Key".to_string(),
            });
        }
        Ok(VerificationReceipt::Verified {
            guid: format!("guid-{}", request.address),
        })
    }
}

/// A request captured by [`RecordingHttpClient`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Target URL.
    pub url: String,
    /// Method.
    pub method: HttpMethod,
    /// Headers.
    pub headers: Vec<HttpHeader>,
    /// Body, if any.
    pub body: Option<Vec<u8>>,
}

/// HTTP client that returns canned bodies in order and records every request.
#[derive(Clone, Default)]
pub struct RecordingHttpClient {
    responses: Arc<Mutex<Vec<Result<Vec<u8>, HttpError>>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl RecordingHttpClient {
    /// Queues a JSON response.
    pub fn respond_json(self, body: &serde_json::Value) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push(Ok(serde_json::to_vec(body).unwrap()));
        self
    }

    /// Queues a transport failure.
    pub fn respond_error(self, error: HttpError) -> Self {
        self.responses.lock().unwrap().push(Err(error));
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl HttpClient for RecordingHttpClient {
    async fn fetch(
        &self,
        url: String,
        method: HttpMethod,
        headers: Vec<HttpHeader>,
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, HttpError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            url,
            method,
            headers,
            body,
        });
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(HttpError::Generic {
                message: "no canned response left".to_string(),
            });
        }
        responses.remove(0)
    }
}
