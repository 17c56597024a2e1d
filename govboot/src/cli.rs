//! Command line surface of the `govboot` binary.

use std::{path::PathBuf, sync::Arc, time::Duration};

use alloy::primitives::Address;
use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use crate::{
    artifacts::HardhatArtifacts,
    chain::{
        confirmations::fast_wait_options, signer_from_key, ChainClient, RpcChainClient,
    },
    contracts::safe::SafeDeployment,
    deploy::{
        record::DeploymentRecord, Deployer, DeploymentIntent, DeploymentStatus,
        DEFAULT_CONFIRMATIONS, DEFAULT_VERSION_TAG, DEFAULT_VOTE_LENGTH,
    },
    info,
    primitives::{
        config::{BuildConfig, DeployConfig, Network, WaitOptions},
        http_client::ReqwestHttpClient,
        logger::LogLevel,
        ParseFromInput, Percentage, PrimitiveError,
    },
    remappings::Remappings,
    safe::SafeWalletService,
    verification::{EtherscanVerifier, SkipVerification, Verifier},
};

const EXPLORER_TIMEOUT: Duration = Duration::from_secs(30);

/// Bootstraps on-chain governance: a voting token, a Safe and a governance module enabled on it.
#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// The network to run against.
    #[arg(long, global = true, value_enum, default_value_t = Network::Local)]
    pub network: Network,

    /// Overrides the network's RPC endpoint.
    #[arg(long, global = true, value_name = "URL")]
    pub rpc_url: Option<String>,

    /// Minimum level of log lines written to stderr.
    #[arg(long, global = true, default_value = "info")]
    pub log_level: LogLevel,
}

/// Subcommands.
#[derive(Clone, Debug, Subcommand)]
pub enum Command {
    /// Deploy the token, the Safe and the module, then wire them together.
    Deploy(DeployArgs),
    /// Deploy the governance module alone and print its address.
    DeployModule(DeployArgs),
    /// Rewrite import paths of Solidity sources through the remappings table.
    Preprocess(PreprocessArgs),
    /// Show what the chain says about a recorded deployment.
    Status(StatusArgs),
}

/// Options shared by the deploying subcommands.
#[derive(Clone, Debug, Args)]
pub struct DeployArgs {
    /// Compiled artifacts directory (Hardhat `artifacts/` or Foundry `out/`). Defaults to `./artifacts`.
    #[arg(long, value_name = "DIR")]
    pub artifacts: Option<PathBuf>,

    /// Artifact name of the voting token.
    #[arg(long, default_value = "VotingToken")]
    pub token: String,

    /// Artifact name of the governance module.
    #[arg(long, default_value = "MetaVotingModule")]
    pub module: String,

    /// Quorum, in whole percent of the token supply.
    #[arg(long, default_value_t = Percentage::HALF)]
    pub quorum: Percentage,

    /// Minimum participation, in whole percent of the token supply.
    #[arg(long, default_value_t = Percentage::FIVE)]
    pub min_participation: Percentage,

    /// Voting period in seconds.
    #[arg(long, default_value_t = DEFAULT_VOTE_LENGTH)]
    pub vote_length: u64,

    /// Version tag passed to `initialize`.
    #[arg(long, default_value_t = DEFAULT_VERSION_TAG)]
    pub version_tag: u64,

    /// Safe owner; repeat for several. Defaults to the deployer alone.
    #[arg(long = "owner", value_name = "ADDRESS", value_parser = parse_owner)]
    pub owners: Vec<Address>,

    /// Signatures the Safe requires.
    #[arg(long, default_value_t = 1)]
    pub threshold: u64,

    /// Confirmations to wait for after each transaction. Defaults to 1 locally and 3 elsewhere.
    #[arg(long)]
    pub confirmations: Option<u64>,

    /// Seconds to wait for confirmations before giving up on a step.
    #[arg(long, value_name = "SECONDS", default_value_t = 300)]
    pub timeout: u64,

    /// Deployment record to resume from and update. Defaults to `deployments/<network>.json`.
    #[arg(long, value_name = "FILE")]
    pub record: Option<PathBuf>,

    /// Do not verify sources on the block explorer.
    #[arg(long)]
    pub skip_verify: bool,
}

/// Options of `preprocess`.
#[derive(Clone, Debug, Args)]
pub struct PreprocessArgs {
    /// Solidity sources to rewrite. Defaults to `./src`.
    #[arg(long, value_name = "DIR")]
    pub sources: Option<PathBuf>,

    /// Where rewritten sources are written.
    #[arg(long, value_name = "DIR", default_value = "./cache/preprocessed")]
    pub out: PathBuf,

    /// `find=replace` remappings table. Defaults to `remappings.txt`.
    #[arg(long, value_name = "FILE")]
    pub remappings: Option<PathBuf>,
}

/// Options of `status`.
#[derive(Clone, Debug, Args)]
pub struct StatusArgs {
    /// Deployment record to inspect. Defaults to `deployments/<network>.json`.
    #[arg(long, value_name = "FILE")]
    pub record: Option<PathBuf>,
}

fn parse_owner(s: &str) -> Result<Address, PrimitiveError> {
    Address::parse_from_input(s, "owner")
}

fn default_record(network: Network) -> PathBuf {
    PathBuf::from("deployments").join(format!("{}.json", network.as_str()))
}

impl DeployArgs {
    /// The deployment parameters these options describe.
    #[must_use]
    pub fn intent(&self, network: Network) -> DeploymentIntent {
        let confirmations = self.confirmations.unwrap_or(match network {
            // Anvil only mines on demand.
            Network::Local => 1,
            Network::Goerli | Network::Polygon => DEFAULT_CONFIRMATIONS,
        });
        let timeout = Duration::from_secs(self.timeout);
        let wait = match network {
            Network::Local => fast_wait_options(timeout),
            Network::Goerli | Network::Polygon => WaitOptions {
                timeout,
                ..WaitOptions::default()
            },
        };
        DeploymentIntent {
            token_artifact: self.token.clone(),
            module_artifact: self.module.clone(),
            quorum: self.quorum,
            min_participation: self.min_participation,
            vote_length: self.vote_length,
            version_tag: self.version_tag,
            owners: self.owners.clone(),
            threshold: self.threshold,
            confirmations,
            wait,
            ..DeploymentIntent::new(network)
        }
    }
}

impl Cli {
    /// Runs the selected subcommand.
    ///
    /// # Errors
    /// Any failure of the subcommand, with context.
    pub async fn run(self) -> anyhow::Result<()> {
        match &self.command {
            Command::Deploy(args) => {
                let deployer = self.deployer(args)?;
                let report = deployer.run().await?;
                println!("token:  {}", report.token);
                println!("safe:   {}", report.wallet);
                println!("module: {}", report.module);
            }
            Command::DeployModule(args) => {
                let module = self.deployer(args)?.deploy_module_only().await?;
                println!("{module}");
            }
            Command::Preprocess(args) => preprocess(args)?,
            Command::Status(args) => {
                let path = args
                    .record
                    .clone()
                    .unwrap_or_else(|| default_record(self.network));
                let record = DeploymentRecord::load(&path)?
                    .with_context(|| format!("no deployment record at {}", path.display()))?;
                let deployer = self.deployer(&Self::status_args())?;
                print_status(&deployer.status(record).await?);
            }
        }
        Ok(())
    }

    fn config(&self) -> DeployConfig {
        let config = DeployConfig::from_env(self.network);
        match &self.rpc_url {
            Some(url) => config.with_rpc_url(url.clone()),
            None => config,
        }
    }

    fn status_args() -> DeployArgs {
        DeployArgs {
            artifacts: None,
            token: String::new(),
            module: String::new(),
            quorum: Percentage::HALF,
            min_participation: Percentage::FIVE,
            vote_length: DEFAULT_VOTE_LENGTH,
            version_tag: DEFAULT_VERSION_TAG,
            owners: Vec::new(),
            threshold: 1,
            confirmations: None,
            timeout: WaitOptions::default().timeout.as_secs(),
            record: None,
            skip_verify: true,
        }
    }

    /// Wires the production collaborators for `network`.
    fn deployer(&self, args: &DeployArgs) -> anyhow::Result<Deployer> {
        let config = self.config();
        let intent = args.intent(self.network);

        let signer = signer_from_key(config.private_key()?)?;
        let client = RpcChainClient::connect(config.rpc_url()?, signer.clone())?;
        let chain: Arc<dyn ChainClient> = Arc::new(client);

        let wallets = SafeWalletService::new(
            Arc::clone(&chain),
            signer,
            SafeDeployment::canonical_v1_3_0(self.network),
        )
        .with_confirmations(intent.confirmations, intent.wait);

        let verifier: Arc<dyn Verifier> = if args.skip_verify || self.network == Network::Local {
            Arc::new(SkipVerification)
        } else {
            Arc::new(EtherscanVerifier::new(
                ReqwestHttpClient::new(EXPLORER_TIMEOUT)?,
                config.explorer_api_url()?,
                config.etherscan_key().ok().map(str::to_string),
            ))
        };

        let record = args
            .record
            .clone()
            .unwrap_or_else(|| default_record(self.network));
        let artifacts = args
            .artifacts
            .clone()
            .unwrap_or_else(|| BuildConfig::default().artifacts);

        Ok(Deployer::new(
            chain,
            Arc::new(wallets),
            Arc::new(HardhatArtifacts::new(artifacts)),
            verifier,
            intent,
        )
        .with_record(record))
    }
}

impl PreprocessArgs {
    /// Sources directory and remappings table, falling back to the project defaults.
    fn paths(&self) -> (PathBuf, PathBuf) {
        let defaults = BuildConfig::default();
        (
            self.sources.clone().unwrap_or(defaults.sources),
            self.remappings.clone().unwrap_or(defaults.remappings),
        )
    }
}

fn preprocess(args: &PreprocessArgs) -> anyhow::Result<()> {
    let (sources, remappings) = args.paths();
    let remappings = Remappings::load(&remappings)?;
    let written = remappings.preprocess_dir(&sources, &args.out)?;
    info!(
        "Rewrote {} sources into {} using {} remappings",
        written.len(),
        args.out.display(),
        remappings.len()
    );
    Ok(())
}

fn print_status(status: &DeploymentStatus) {
    let show = |name: &str, address: Option<Address>, deployed: bool| {
        match address {
            Some(address) if deployed => println!("{name:<8} {address}"),
            Some(address) => println!("{name:<8} {address} (no code)"),
            None => println!("{name:<8} -"),
        }
    };
    println!("network  {} (chain {})", status.record.network, status.record.chain_id);
    show("token", status.record.token, status.token_deployed);
    show("safe", status.record.wallet, status.wallet_deployed);
    show("module", status.record.module, status.module_deployed);
    if let Some(initialized) = status.module_initialized {
        println!("initialized  {initialized}");
    }
    if let Some((avatar, target)) = status.binding {
        println!("avatar   {avatar}");
        println!("target   {target}");
    }
    if let Some(enabled) = status.module_enabled {
        println!("enabled  {enabled}");
    }
}
