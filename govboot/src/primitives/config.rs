use std::{collections::HashMap, path::PathBuf, time::Duration};

use crate::info;

/// Anvil's first development account. Only ever used for [`Network::Local`].
pub const ANVIL_DEFAULT_PRIVATE_KEY: &str =
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Environment variable holding the deployer's hex-encoded secret key.
pub const PRIVATE_KEY_VAR: &str = "PRIVATE_KEY";

/// Environment variable holding the block explorer API key.
pub const ETHERSCAN_KEY_VAR: &str = "ETHERSCAN_KEY";

/// The networks govboot knows how to deploy to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Network {
    /// A local development node (Anvil or Hardhat) on `127.0.0.1:8545`.
    Local,
    /// The Goerli testnet.
    Goerli,
    /// Polygon PoS mainnet.
    Polygon,
}

impl Network {
    /// Returns the string representation of the network
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Goerli => "goerli",
            Self::Polygon => "polygon",
        }
    }

    /// The environment variable holding this network's RPC endpoint, if it is not fixed.
    #[must_use]
    pub const fn rpc_url_var(&self) -> Option<&'static str> {
        match self {
            Self::Local => None,
            Self::Goerli => Some("GOERLI_RPC_URL"),
            Self::Polygon => Some("POLYGON_RPC_URL"),
        }
    }

    /// The chain id a node for this network is expected to report. `None` for local nodes.
    #[must_use]
    pub const fn expected_chain_id(&self) -> Option<u64> {
        match self {
            Self::Local => None,
            Self::Goerli => Some(5),
            Self::Polygon => Some(137),
        }
    }

    /// Base URL of the Etherscan-compatible explorer API. `None` if the network has no explorer.
    #[must_use]
    pub const fn explorer_api_url(&self) -> Option<&'static str> {
        match self {
            Self::Local => None,
            Self::Goerli => Some("https://api-goerli.etherscan.io/api"),
            Self::Polygon => Some("https://api.polygonscan.com/api"),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors raised when a configuration value is needed but unavailable.
#[crate::error::govboot_error]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("environment variable {name} is not set (required for {purpose})")]
    MissingVariable {
        /// Name of the variable.
        name: &'static str,
        /// What the value is needed for.
        purpose: &'static str,
    },
    /// The network has no block explorer to verify against.
    #[error("network {0} has no block explorer")]
    NoExplorer(Network),
}

/// Endpoint, signer and explorer settings for one run.
///
/// Values are captured once at startup. Missing values are only reported when the step that needs them asks,
/// so a run that never verifies never needs `ETHERSCAN_KEY`.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    network: Network,
    rpc_url: Option<String>,
    private_key: Option<String>,
    etherscan_key: Option<String>,
}

impl DeployConfig {
    /// Loads `.env` (if present) and captures the variables relevant to `network`.
    #[must_use]
    pub fn from_env(network: Network) -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            info!("Loaded environment from {}", path.display());
        }
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(network, &vars)
    }

    /// Builds a config from an explicit variable map.
    #[must_use]
    pub fn from_vars(network: Network, vars: &HashMap<String, String>) -> Self {
        let non_empty = |name: &str| vars.get(name).filter(|v| !v.trim().is_empty()).cloned();

        let rpc_url = match network.rpc_url_var() {
            Some(var) => non_empty(var),
            None => Some("http://127.0.0.1:8545".to_string()),
        };

        Self {
            network,
            rpc_url,
            private_key: non_empty(PRIVATE_KEY_VAR),
            etherscan_key: non_empty(ETHERSCAN_KEY_VAR),
        }
    }

    /// Overrides the RPC endpoint.
    #[must_use]
    pub fn with_rpc_url(mut self, rpc_url: impl Into<String>) -> Self {
        self.rpc_url = Some(rpc_url.into());
        self
    }

    /// The RPC endpoint.
    ///
    /// # Errors
    /// - `ConfigError::MissingVariable` if the network's RPC variable is not set.
    pub fn rpc_url(&self) -> Result<&str, ConfigError> {
        self.rpc_url.as_deref().ok_or(ConfigError::MissingVariable {
            name: self.network.rpc_url_var().unwrap_or("RPC_URL"),
            purpose: "connecting to the chain",
        })
    }

    /// The deployer's hex-encoded secret key (with or without `0x`).
    ///
    /// Local networks fall back to Anvil's first development key.
    ///
    /// # Errors
    /// - `ConfigError::MissingVariable` if `PRIVATE_KEY` is not set on a public network.
    pub fn private_key(&self) -> Result<&str, ConfigError> {
        match (&self.private_key, self.network) {
            (Some(key), _) => Ok(key.trim_start_matches("0x")),
            (None, Network::Local) => Ok(ANVIL_DEFAULT_PRIVATE_KEY),
            (None, _) => Err(ConfigError::MissingVariable {
                name: PRIVATE_KEY_VAR,
                purpose: "signing transactions",
            }),
        }
    }

    /// The explorer API key.
    ///
    /// # Errors
    /// - `ConfigError::MissingVariable` if `ETHERSCAN_KEY` is not set.
    pub fn etherscan_key(&self) -> Result<&str, ConfigError> {
        self.etherscan_key
            .as_deref()
            .ok_or(ConfigError::MissingVariable {
                name: ETHERSCAN_KEY_VAR,
                purpose: "explorer verification",
            })
    }

    /// The explorer API base URL.
    ///
    /// # Errors
    /// - `ConfigError::NoExplorer` for local networks.
    pub fn explorer_api_url(&self) -> Result<&'static str, ConfigError> {
        self.network
            .explorer_api_url()
            .ok_or(ConfigError::NoExplorer(self.network))
    }
}

/// Project paths shared by the artifact loader and the preprocessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    /// Directory holding contract sources.
    pub sources: PathBuf,
    /// Directory holding compiled artifacts (Hardhat `artifacts/` or Foundry `out/`).
    pub artifacts: PathBuf,
    /// Import remappings table.
    pub remappings: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            sources: PathBuf::from("./src"),
            artifacts: PathBuf::from("./artifacts"),
            remappings: PathBuf::from("remappings.txt"),
        }
    }
}

/// How long and how often to poll while waiting for confirmations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Delay between two chain polls.
    pub poll_interval: Duration,
    /// Upper bound for a single wait. Exceeding it fails the step with a timeout error.
    pub timeout: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            timeout: Duration::from_secs(300),
        }
    }
}
