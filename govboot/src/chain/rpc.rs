use alloy::{
    network::{EthereumWallet, ReceiptResponse, TransactionBuilder},
    primitives::{Address, Bytes, TxHash},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
};
use govboot_macros::log_context;

use super::{ChainClient, ChainError, PendingTransaction, TransactionStatus};
use crate::debug;

/// [`ChainClient`] over JSON-RPC, signing locally with a secret key.
///
/// Gas, fees and chain id are filled by the provider. Nonces are fetched explicitly for contract
/// creations so the CREATE address is known before the transaction is broadcast.
pub struct RpcChainClient {
    provider: DynProvider,
    signer: Address,
}

#[log_context]
impl RpcChainClient {
    /// Connects to `rpc_url`, signing with `signer`.
    ///
    /// No request is made until the first call.
    ///
    /// # Errors
    /// - `ChainError::InvalidUrl` if `rpc_url` cannot be parsed.
    pub fn connect(rpc_url: &str, signer: PrivateKeySigner) -> Result<Self, ChainError> {
        let url = rpc_url
            .parse::<url::Url>()
            .map_err(|e| ChainError::InvalidUrl {
                url: rpc_url.to_string(),
                message: e.to_string(),
            })?;
        let address = signer.address();
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();
        debug!("Connected to {rpc_url} as {address}");
        Ok(Self {
            provider,
            signer: address,
        })
    }

    async fn submit(
        &self,
        tx: TransactionRequest,
        contract_address: Option<Address>,
    ) -> Result<PendingTransaction, ChainError> {
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(rpc_error)?;
        Ok(PendingTransaction {
            hash: *pending.tx_hash(),
            contract_address,
        })
    }
}

fn rpc_error(err: impl std::fmt::Display) -> ChainError {
    ChainError::Rpc {
        message: err.to_string(),
    }
}

#[async_trait::async_trait]
impl ChainClient for RpcChainClient {
    fn signer_address(&self) -> Address {
        self.signer
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        self.provider.get_chain_id().await.map_err(rpc_error)
    }

    async fn deploy(
        &self,
        bytecode: Bytes,
        constructor_args: Bytes,
    ) -> Result<PendingTransaction, ChainError> {
        let nonce = self
            .provider
            .get_transaction_count(self.signer)
            .pending()
            .await
            .map_err(rpc_error)?;
        let mut code = bytecode.to_vec();
        code.extend_from_slice(&constructor_args);

        let tx = TransactionRequest::default()
            .with_from(self.signer)
            .with_nonce(nonce)
            .with_deploy_code(Bytes::from(code));
        self.submit(tx, Some(self.signer.create(nonce))).await
    }

    async fn send_transaction(
        &self,
        to: Address,
        data: Bytes,
    ) -> Result<PendingTransaction, ChainError> {
        let tx = TransactionRequest::default()
            .with_from(self.signer)
            .with_to(to)
            .with_input(data);
        self.submit(tx, None).await
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        let tx = TransactionRequest::default()
            .with_from(self.signer)
            .with_to(to)
            .with_input(data);
        self.provider.call(tx).await.map_err(rpc_error)
    }

    async fn transaction_status(
        &self,
        hash: TxHash,
    ) -> Result<Option<TransactionStatus>, ChainError> {
        let receipt = self
            .provider
            .get_transaction_receipt(hash)
            .await
            .map_err(rpc_error)?;
        Ok(receipt.and_then(|receipt| {
            receipt.block_number().map(|block_number| TransactionStatus {
                block_number,
                success: receipt.status(),
            })
        }))
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        self.provider.get_block_number().await.map_err(rpc_error)
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, ChainError> {
        self.provider.get_code_at(address).await.map_err(rpc_error)
    }
}
