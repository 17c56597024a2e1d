use std::{path::PathBuf, sync::Arc};

use alloy::node_bindings::{Anvil, AnvilInstance};
use govboot::{
    artifacts::HardhatArtifacts,
    chain::{signer_from_key, ChainClient, RpcChainClient},
    contracts::safe::SafeDeployment,
    deploy::{Deployer, DeploymentIntent},
    primitives::config::{Network, ANVIL_DEFAULT_PRIVATE_KEY},
    safe::SafeWalletService,
    verification::SkipVerification,
};

/// Environment variable holding an RPC endpoint of a chain with the canonical Safe v1.3.0 contracts.
pub const FORK_URL_VAR: &str = "GOVBOOT_FORK_URL";

/// Environment variable pointing at compiled `VotingToken` and `MetaVotingModule` artifacts.
pub const ARTIFACTS_VAR: &str = "GOVBOOT_ARTIFACTS";

/// Spawns Anvil forking `GOVBOOT_FORK_URL`.
pub fn setup_anvil() -> AnvilInstance {
    dotenvy::dotenv().ok();
    let fork_url = std::env::var(FORK_URL_VAR)
        .unwrap_or_else(|_| panic!("{FORK_URL_VAR} must point at a chain with Safe v1.3.0"));
    Anvil::new().fork(fork_url).spawn()
}

/// A deployer wired against `anvil` exactly as the binary wires it for the local network.
pub fn local_deployer(anvil: &AnvilInstance) -> (Deployer, Arc<dyn ChainClient>) {
    let signer = signer_from_key(ANVIL_DEFAULT_PRIVATE_KEY).unwrap();
    let chain: Arc<dyn ChainClient> =
        Arc::new(RpcChainClient::connect(&anvil.endpoint(), signer.clone()).unwrap());
    let intent = DeploymentIntent {
        confirmations: 1,
        ..DeploymentIntent::new(Network::Local)
    };
    let wallets = SafeWalletService::new(
        Arc::clone(&chain),
        signer,
        SafeDeployment::canonical_v1_3_0(Network::Local),
    )
    .with_confirmations(intent.confirmations, intent.wait);
    let artifacts = PathBuf::from(
        std::env::var(ARTIFACTS_VAR).unwrap_or_else(|_| "./artifacts".to_string()),
    );

    let deployer = Deployer::new(
        Arc::clone(&chain),
        Arc::new(wallets),
        Arc::new(HardhatArtifacts::new(artifacts)),
        Arc::new(SkipVerification),
        intent,
    );
    (deployer, chain)
}
