use std::str::FromStr;

use alloy::{
    primitives::{Address, Bytes, TxHash},
    signers::local::PrivateKeySigner,
    sol_types::SolCall,
};

use crate::primitives::config::Network;

/// Confirmation tracking and bounded waiting.
pub mod confirmations;

/// The JSON-RPC backed client.
pub mod rpc;

pub use confirmations::{wait_for_confirmations, ConfirmationTracker};
pub use rpc::RpcChainClient;

/// Errors raised while talking to the chain.
#[crate::error::govboot_error]
pub enum ChainError {
    /// The node returned an error or could not be reached.
    #[error("RPC request failed: {message}")]
    Rpc {
        /// Error reported by the transport.
        message: String,
    },
    /// The configured secret key is not a valid secp256k1 key.
    #[error("invalid signer key: {0}")]
    InvalidKey(String),
    /// The RPC URL cannot be parsed.
    #[error("invalid RPC URL {url}: {message}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parse failure.
        message: String,
    },
    /// The node serves a different chain than the selected network.
    #[error("connected to chain {actual}, but {network} expects chain {expected}")]
    WrongChain {
        /// Selected network.
        network: Network,
        /// Chain id of the selected network.
        expected: u64,
        /// Chain id reported by the node.
        actual: u64,
    },
    /// The transaction was mined but reverted.
    #[error("transaction {hash} reverted in block {block_number}")]
    Reverted {
        /// Transaction hash.
        hash: TxHash,
        /// Block the transaction was included in.
        block_number: u64,
    },
    /// The transaction did not reach the requested depth in time.
    #[error("transaction {hash} not confirmed after {seconds} seconds")]
    Timeout {
        /// Transaction hash.
        hash: TxHash,
        /// The configured bound.
        seconds: u64,
    },
    /// A view call returned data that does not match the expected ABI.
    #[error("failed to decode result of {function}: {message}")]
    Decode {
        /// Solidity signature of the call.
        function: &'static str,
        /// Decoder failure.
        message: String,
    },
}

/// A submitted transaction.
///
/// For contract creations the address is known at submission time and never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTransaction {
    /// Transaction hash.
    pub hash: TxHash,
    /// Address of the created contract, for deployments.
    pub contract_address: Option<Address>,
}

/// Inclusion status of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionStatus {
    /// Block the transaction was included in.
    pub block_number: u64,
    /// Whether execution succeeded.
    pub success: bool,
}

/// Everything govboot needs from an Ethereum node, signing included.
///
/// All mutating calls are signed by the single account behind [`ChainClient::signer_address`].
#[async_trait::async_trait]
pub trait ChainClient: Send + Sync {
    /// The account that signs and pays for transactions.
    fn signer_address(&self) -> Address;

    /// The chain id reported by the node.
    async fn chain_id(&self) -> Result<u64, ChainError>;

    /// Submits a contract creation. The returned transaction always carries `contract_address`.
    async fn deploy(
        &self,
        bytecode: Bytes,
        constructor_args: Bytes,
    ) -> Result<PendingTransaction, ChainError>;

    /// Submits a call transaction with no value.
    async fn send_transaction(
        &self,
        to: Address,
        data: Bytes,
    ) -> Result<PendingTransaction, ChainError>;

    /// Executes a read-only call against the latest block.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError>;

    /// `None` while the transaction is not yet mined.
    async fn transaction_status(
        &self,
        hash: TxHash,
    ) -> Result<Option<TransactionStatus>, ChainError>;

    /// The latest block number.
    async fn block_number(&self) -> Result<u64, ChainError>;

    /// Runtime code at `address`; empty when nothing is deployed there.
    async fn code_at(&self, address: Address) -> Result<Bytes, ChainError>;
}

/// Executes a typed view call and decodes its return value.
///
/// # Errors
/// - `ChainError::Rpc` if the call fails.
/// - `ChainError::Decode` if the returned data does not match `C`'s return type.
pub async fn read<C: SolCall + Send>(
    client: &dyn ChainClient,
    to: Address,
    call: C,
) -> Result<C::Return, ChainError> {
    let output = client.call(to, call.abi_encode().into()).await?;
    C::abi_decode_returns(&output).map_err(|e| ChainError::Decode {
        function: C::SIGNATURE,
        message: e.to_string(),
    })
}

/// Parses a hex-encoded secret key, with or without `0x`.
///
/// # Errors
/// - `ChainError::InvalidKey` if the key is malformed.
pub fn signer_from_key(key: &str) -> Result<PrivateKeySigner, ChainError> {
    PrivateKeySigner::from_str(key.trim()).map_err(|e| ChainError::InvalidKey(e.to_string()))
}

/// Checks that the node serves the chain the network expects. Local networks accept any chain.
///
/// # Errors
/// - `ChainError::WrongChain` on mismatch.
/// - `ChainError::Rpc` if the chain id cannot be fetched.
pub async fn ensure_network(client: &dyn ChainClient, network: Network) -> Result<u64, ChainError> {
    let actual = client.chain_id().await?;
    match network.expected_chain_id() {
        Some(expected) if expected != actual => Err(ChainError::WrongChain {
            network,
            expected,
            actual,
        }),
        _ => Ok(actual),
    }
}
