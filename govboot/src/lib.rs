#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    dead_code
)]

//! `govboot` bootstraps on-chain governance on an EVM chain.
//!
//! One run deploys a voting token, a [Safe](https://safe.global/) and a governance module, initializes the
//! module with the token and voting parameters, points the module's avatar and target at the Safe and
//! enables the module on the Safe through a signed Safe transaction.

/// Compiled contract artifacts (Hardhat and Foundry layouts).
pub mod artifacts;

/// Chain access: the [`chain::ChainClient`] seam, its JSON-RPC implementation and confirmation waits.
pub mod chain;

/// Command line surface of the `govboot` binary.
pub mod cli;

/// Contract interfaces and calldata helpers.
pub mod contracts;

/// The bootstrap sequence and its persisted progress.
pub mod deploy;

/// Error handling conventions shared by every module.
pub mod error;

/// Low level primitives: configuration, HTTP transport, logging and value types.
pub mod primitives;

/// Solidity import remapping.
pub mod remappings;

/// Multisig wallets backed by Safe v1.3.0.
///
/// Reference: <https://github.com/safe-global/safe-smart-account/tree/v1.3.0>
pub mod safe;

/// Source verification on block explorers.
pub mod verification;

#[cfg(test)]
#[allow(dead_code)]
mod test_utils;
