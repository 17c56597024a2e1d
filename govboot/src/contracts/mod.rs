//! Contract interfaces the deployer talks to.
//!
//! Only the functions the bootstrap sequence calls are declared. Bytecode comes from compiled
//! artifacts (see [`crate::artifacts`]), never from these interfaces.

/// The governance module (avatar/target wiring and one-shot initialization).
pub mod governance_module;

/// Safe v1.3.0 wallet and proxy factory.
pub mod safe;
