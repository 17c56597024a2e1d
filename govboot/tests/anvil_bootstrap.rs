//! Full bootstrap against a forked Anvil node.
//!
//! Needs `anvil` on the `PATH`, `GOVBOOT_FORK_URL` and compiled artifacts in `GOVBOOT_ARTIFACTS`.

use alloy::sol_types::SolCall;
use govboot::{
    chain,
    contracts::{governance_module::IGovernanceModule, safe::ISafe},
};

mod common;

#[tokio::test]
#[ignore = "requires anvil, a fork URL and compiled contracts"]
async fn test_bootstrap_on_fork() {
    let anvil = common::setup_anvil();
    let (deployer, client) = common::local_deployer(&anvil);

    let report = deployer.run().await.unwrap();
    assert!(report.module_enabled);

    let client = client.as_ref();
    let module = report.module;
    assert!(
        chain::read(client, module, IGovernanceModule::initializedCall {})
            .await
            .unwrap()
    );
    assert_eq!(
        chain::read(client, module, IGovernanceModule::avatarCall {})
            .await
            .unwrap(),
        report.wallet
    );
    assert_eq!(
        chain::read(client, module, IGovernanceModule::targetCall {})
            .await
            .unwrap(),
        report.wallet
    );
    assert!(
        chain::read(client, report.wallet, ISafe::isModuleEnabledCall { module })
            .await
            .unwrap()
    );

    // a second initialize must revert on chain
    let again = IGovernanceModule::initializeCall {
        owner: report.wallet,
        token: report.token,
        quorumNumerator: Default::default(),
        minParticipation: Default::default(),
        voteLength: Default::default(),
        versionTag: Default::default(),
    };
    let pending = client
        .send_transaction(module, again.abi_encode().into())
        .await;
    if let Ok(pending) = pending {
        let status = chain::wait_for_confirmations(
            client,
            &pending,
            1,
            deployer.intent().wait,
        )
        .await;
        assert!(status.is_err());
    }
}

#[tokio::test]
#[ignore = "requires anvil, a fork URL and compiled contracts"]
async fn test_deploy_module_only_on_fork() {
    let anvil = common::setup_anvil();
    let (deployer, client) = common::local_deployer(&anvil);

    let module = deployer.deploy_module_only().await.unwrap();

    assert!(!client.code_at(module).await.unwrap().is_empty());
    assert!(
        !chain::read(client.as_ref(), module, IGovernanceModule::initializedCall {})
            .await
            .unwrap()
    );
}
