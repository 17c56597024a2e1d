use alloy::{
    dyn_abi::DynSolValue,
    primitives::{fixed_bytes, keccak256, Address, Bytes, FixedBytes, U256},
    signers::{local::PrivateKeySigner, SignerSync},
    sol,
    sol_types::{SolCall, SolValue},
};

use super::WalletError;
use crate::contracts::safe::ISafe;

/// Reference: <https://github.com/safe-global/safe-smart-account/blob/v1.3.0/contracts/GnosisSafe.sol#L37>
static DOMAIN_SEPARATOR_TYPEHASH: FixedBytes<32> =
    fixed_bytes!("0x47e79534a245952e8b16893a336b85a3d9ea9fa8c573f3d803afb92a79469218");

/// Reference: <https://github.com/safe-global/safe-smart-account/blob/v1.3.0/contracts/GnosisSafe.sol#L41>
static SAFE_TX_TYPEHASH: FixedBytes<32> =
    fixed_bytes!("0xbb8310d486368db6bd6f849402fdd73ad53d316b5a4b2644ad6efe0f941286d8");

sol! {
    /// `encodeTransactionData` struct layout, with `data` already hashed.
    #[sol(rename_all = "camelcase")]
    struct SafeTxHash {
        bytes32 safe_tx_typehash;
        address to;
        uint256 value;
        bytes32 data;
        uint8 operation;
        uint256 safe_tx_gas;
        uint256 base_gas;
        uint256 gas_price;
        address gas_token;
        address refund_receiver;
        uint256 nonce;
    }
}

/// How the Safe executes the inner call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SafeOperation {
    /// Regular `CALL`.
    #[default]
    Call = 0,
    /// `DELEGATECALL`, running the target's code in the Safe's context.
    DelegateCall = 1,
}

/// What the Safe should do, before nonce and gas parameters are attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeTransactionData {
    /// Call target.
    pub to: Address,
    /// Wei sent along.
    pub value: U256,
    /// Calldata.
    pub data: Bytes,
}

/// A fully specified Safe transaction, ready to hash and sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeTransaction {
    /// Call target.
    pub to: Address,
    /// Wei sent along.
    pub value: U256,
    /// Calldata.
    pub data: Bytes,
    /// Call or delegate call.
    pub operation: SafeOperation,
    /// Gas forwarded to the inner call; zero forwards all and makes inner failures revert.
    pub safe_tx_gas: U256,
    /// Gas charged for data and signature checks when refunding.
    pub base_gas: U256,
    /// Refund gas price; zero disables refunds.
    pub gas_price: U256,
    /// Refund token; zero is the native token.
    pub gas_token: Address,
    /// Refund receiver; zero is `tx.origin`.
    pub refund_receiver: Address,
    /// The Safe nonce this transaction consumes.
    pub nonce: U256,
}

impl SafeTransaction {
    /// A plain call with no refund, bound to `nonce`.
    #[must_use]
    pub fn new(data: SafeTransactionData, nonce: U256) -> Self {
        Self {
            to: data.to,
            value: data.value,
            data: data.data,
            operation: SafeOperation::Call,
            safe_tx_gas: U256::ZERO,
            base_gas: U256::ZERO,
            gas_price: U256::ZERO,
            gas_token: Address::ZERO,
            refund_receiver: Address::ZERO,
            nonce,
        }
    }

    /// The EIP-712 struct hash (`keccak256(encodeTransactionData)` without the domain).
    #[must_use]
    pub fn struct_hash(&self) -> FixedBytes<32> {
        let encoded = SafeTxHash {
            safe_tx_typehash: SAFE_TX_TYPEHASH,
            to: self.to,
            value: self.value,
            data: keccak256(&self.data),
            operation: self.operation as u8,
            safe_tx_gas: self.safe_tx_gas,
            base_gas: self.base_gas,
            gas_price: self.gas_price,
            gas_token: self.gas_token,
            refund_receiver: self.refund_receiver,
            nonce: self.nonce,
        };
        keccak256(encoded.abi_encode())
    }

    /// The digest owners sign; equal to the contract's `getTransactionHash`.
    #[must_use]
    pub fn signing_hash(&self, chain_id: u64, safe: Address) -> FixedBytes<32> {
        let mut buf = [0u8; 66];
        buf[0] = 0x19;
        buf[1] = 0x01;
        buf[2..34].copy_from_slice(domain_separator(chain_id, safe).as_slice());
        buf[34..66].copy_from_slice(self.struct_hash().as_slice());
        keccak256(buf)
    }

    /// Signs the transaction with an owner key, returning the 65-byte `r ++ s ++ v` signature
    /// (`v` is 27 or 28, the ECDSA signature type for `checkSignatures`).
    ///
    /// # Errors
    /// - `WalletError::Signing` if the signer fails.
    pub fn sign(
        &self,
        signer: &PrivateKeySigner,
        chain_id: u64,
        safe: Address,
    ) -> Result<Bytes, WalletError> {
        let hash = self.signing_hash(chain_id, safe);
        let signature = signer
            .sign_hash_sync(&hash)
            .map_err(|e| WalletError::Signing(e.to_string()))?;
        Ok(Bytes::from(signature.as_bytes().to_vec()))
    }

    /// `execTransaction(...)` calldata carrying the given packed signatures.
    #[must_use]
    pub fn exec_calldata(&self, signatures: Bytes) -> Bytes {
        ISafe::execTransactionCall {
            to: self.to,
            value: self.value,
            data: self.data.clone(),
            operation: self.operation as u8,
            safeTxGas: self.safe_tx_gas,
            baseGas: self.base_gas,
            gasPrice: self.gas_price,
            gasToken: self.gas_token,
            refundReceiver: self.refund_receiver,
            signatures,
        }
        .abi_encode()
        .into()
    }
}

impl From<ISafe::execTransactionCall> for SafeTransaction {
    fn from(call: ISafe::execTransactionCall) -> Self {
        Self {
            to: call.to,
            value: call.value,
            data: call.data,
            operation: if call.operation == 1 {
                SafeOperation::DelegateCall
            } else {
                SafeOperation::Call
            },
            safe_tx_gas: call.safeTxGas,
            base_gas: call.baseGas,
            gas_price: call.gasPrice,
            gas_token: call.gasToken,
            refund_receiver: call.refundReceiver,
            // not part of the calldata; the Safe supplies its current nonce
            nonce: U256::ZERO,
        }
    }
}

/// The Safe's EIP-712 domain separator (`domainSeparator()`).
///
/// Reference: <https://github.com/safe-global/safe-smart-account/blob/v1.3.0/contracts/GnosisSafe.sol#L339>
#[must_use]
pub fn domain_separator(chain_id: u64, safe: Address) -> FixedBytes<32> {
    let domain = DynSolValue::Tuple(vec![
        DynSolValue::FixedBytes(DOMAIN_SEPARATOR_TYPEHASH, 32),
        DynSolValue::Uint(U256::from(chain_id), 256),
        DynSolValue::Address(safe),
    ]);
    keccak256(domain.abi_encode())
}
