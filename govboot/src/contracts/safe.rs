//! Safe v1.3.0 interfaces and canonical deployments.
//!
//! Reference: <https://github.com/safe-global/safe-smart-account/blob/v1.3.0/contracts/GnosisSafe.sol>

use alloy::{
    primitives::{address, keccak256, Address, Bytes, U256},
    sol,
    sol_types::{SolCall, SolValue},
};

use crate::primitives::config::Network;

sol! {
    /// The subset of the Safe interface used to set up a wallet and manage its modules.
    ///
    /// Reference: <https://github.com/safe-global/safe-smart-account/blob/v1.3.0/contracts/GnosisSafe.sol>
    #[allow(clippy::too_many_arguments)]
    #[derive(Debug, PartialEq, Eq)]
    interface ISafe {
        function setup(
            address[] calldata _owners,
            uint256 _threshold,
            address to,
            bytes calldata data,
            address fallbackHandler,
            address paymentToken,
            uint256 payment,
            address payable paymentReceiver
        ) external;

        function enableModule(address module) external;

        function isModuleEnabled(address module) external view returns (bool);

        function nonce() external view returns (uint256);

        function getOwners() external view returns (address[] memory);

        function getThreshold() external view returns (uint256);

        function execTransaction(
            address to,
            uint256 value,
            bytes calldata data,
            uint8 operation,
            uint256 safeTxGas,
            uint256 baseGas,
            uint256 gasPrice,
            address gasToken,
            address payable refundReceiver,
            bytes memory signatures
        ) external payable returns (bool success);
    }

    /// Safe proxy factory.
    ///
    /// Reference: <https://github.com/safe-global/safe-smart-account/blob/v1.3.0/contracts/proxies/GnosisSafeProxyFactory.sol>
    #[derive(Debug, PartialEq, Eq)]
    interface ISafeProxyFactory {
        function createProxyWithNonce(
            address _singleton,
            bytes memory initializer,
            uint256 saltNonce
        ) external returns (address proxy);

        function proxyCreationCode() external pure returns (bytes memory);
    }
}

/// Addresses of the Safe contracts a wallet is created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SafeDeployment {
    /// `GnosisSafeProxyFactory`.
    pub proxy_factory: Address,
    /// Singleton (master copy) the proxy delegates to.
    pub singleton: Address,
    /// `CompatibilityFallbackHandler`.
    pub fallback_handler: Address,
}

/// Canonical v1.3.0 `GnosisSafeProxyFactory`.
pub const PROXY_FACTORY_V1_3_0: Address = address!("0xa6B71E26C5e0845f74c812102Ca7114b6a896AB2");
/// Canonical v1.3.0 `GnosisSafe` singleton.
pub const SAFE_SINGLETON_V1_3_0: Address =
    address!("0xd9Db270c1B5E3Bd161E8c8503c55cEABeE709552");
/// Canonical v1.3.0 `GnosisSafeL2` singleton (emits events for indexers on L2s and sidechains).
pub const SAFE_L2_SINGLETON_V1_3_0: Address =
    address!("0x3E5c63644E683549055b9Be8653de26E0B4CD36E");
/// Canonical v1.3.0 `CompatibilityFallbackHandler`.
pub const FALLBACK_HANDLER_V1_3_0: Address =
    address!("0xf48f2B2d2a534e402487b3ee7C18c33Aec0Fe5e4");

impl SafeDeployment {
    /// The canonical v1.3.0 deployment for a network. Polygon uses the L2 singleton.
    #[must_use]
    pub const fn canonical_v1_3_0(network: Network) -> Self {
        let singleton = match network {
            Network::Polygon => SAFE_L2_SINGLETON_V1_3_0,
            Network::Local | Network::Goerli => SAFE_SINGLETON_V1_3_0,
        };
        Self {
            proxy_factory: PROXY_FACTORY_V1_3_0,
            singleton,
            fallback_handler: FALLBACK_HANDLER_V1_3_0,
        }
    }
}

/// `setup(...)` calldata for a wallet with the given owners and threshold, no modules and no payment.
#[must_use]
pub fn setup_calldata(owners: &[Address], threshold: u64, fallback_handler: Address) -> Bytes {
    ISafe::setupCall {
        _owners: owners.to_vec(),
        _threshold: U256::from(threshold),
        to: Address::ZERO,
        data: Bytes::new(),
        fallbackHandler: fallback_handler,
        paymentToken: Address::ZERO,
        payment: U256::ZERO,
        paymentReceiver: Address::ZERO,
    }
    .abi_encode()
    .into()
}

/// `enableModule(module)` calldata. Only the Safe itself may call this, i.e. through `execTransaction`.
#[must_use]
pub fn enable_module_calldata(module: Address) -> Bytes {
    ISafe::enableModuleCall { module }.abi_encode().into()
}

/// Computes the address `createProxyWithNonce` will deploy the proxy to.
///
/// Mirrors `GnosisSafeProxyFactory.deployProxyWithNonce`:
/// `salt = keccak256(keccak256(initializer) ++ saltNonce)` and
/// `init_code = proxyCreationCode ++ uint256(singleton)`.
#[must_use]
pub fn predict_proxy_address(
    deployment: &SafeDeployment,
    proxy_creation_code: &[u8],
    initializer: &[u8],
    salt_nonce: U256,
) -> Address {
    let salt = keccak256((keccak256(initializer), salt_nonce).abi_encode_packed());
    let mut init_code = proxy_creation_code.to_vec();
    init_code.extend_from_slice(&deployment.singleton.into_word().0);
    deployment
        .proxy_factory
        .create2(salt, keccak256(&init_code))
}
