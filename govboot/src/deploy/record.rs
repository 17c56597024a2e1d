//! Persisted progress of a bootstrap run, so an interrupted run can resume.

use std::{fs, io::ErrorKind, path::Path};

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::debug;

/// Errors raised while reading or writing a deployment record.
#[crate::error::govboot_error]
pub enum RecordError {
    /// Filesystem failure.
    #[error("failed to access deployment record {path}: {source}")]
    Io {
        /// Record path.
        path: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not a deployment record.
    #[error("malformed deployment record {path}: {message}")]
    Malformed {
        /// Record path.
        path: String,
        /// Parse failure.
        message: String,
    },
    /// The record belongs to another chain.
    #[error("deployment record is for chain {recorded}, but the node serves chain {actual}")]
    ChainMismatch {
        /// Chain id stored in the record.
        recorded: u64,
        /// Chain id of the connected node.
        actual: u64,
    },
}

/// Progress of one bootstrap run, persisted after every completed step.
///
/// A restarted run reads it back and skips what is already done on chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// Network name, for humans.
    pub network: String,
    /// Chain the addresses live on.
    pub chain_id: u64,
    /// Voting token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Address>,
    /// Safe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet: Option<Address>,
    /// Governance module.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<Address>,
    /// Whether this bootstrap initialized the module.
    #[serde(default)]
    pub module_initialized: bool,
    /// Whether the module's avatar and target point at the wallet.
    #[serde(default)]
    pub module_bound: bool,
    /// Whether the module is enabled on the wallet.
    #[serde(default)]
    pub module_enabled: bool,
}

impl DeploymentRecord {
    /// An empty record for a chain.
    #[must_use]
    pub fn new(network: impl Into<String>, chain_id: u64) -> Self {
        Self {
            network: network.into(),
            chain_id,
            ..Self::default()
        }
    }

    /// Reads a record. A missing file is `None`.
    ///
    /// # Errors
    /// - `RecordError::Io` if the file exists but cannot be read.
    /// - `RecordError::Malformed` if it is not valid JSON.
    pub fn load(path: &Path) -> Result<Option<Self>, RecordError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(RecordError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| RecordError::Malformed {
                path: path.display().to_string(),
                message: e.to_string(),
            })
    }

    /// Writes the record as pretty-printed JSON, creating parent directories.
    ///
    /// # Errors
    /// - `RecordError::Io` on any filesystem failure.
    pub fn save(&self, path: &Path) -> Result<(), RecordError> {
        let io_error = |source| RecordError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| RecordError::Malformed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        fs::write(path, json + "\n").map_err(io_error)?;
        debug!("Saved deployment record to {}", path.display());
        Ok(())
    }

    /// Fails if the record was written for another chain.
    ///
    /// # Errors
    /// - `RecordError::ChainMismatch` on mismatch.
    pub fn ensure_chain(&self, chain_id: u64) -> Result<(), RecordError> {
        if self.chain_id != chain_id {
            return Err(RecordError::ChainMismatch {
                recorded: self.chain_id,
                actual: chain_id,
            });
        }
        Ok(())
    }

    /// Forgets everything that depends on the module, after a new module was deployed.
    pub fn reset_module(&mut self, module: Address) {
        self.module = Some(module);
        self.module_initialized = false;
        self.module_bound = false;
        self.module_enabled = false;
    }

    /// Forgets everything that depends on the wallet, after a new wallet was created.
    ///
    /// The module was initialized with the old wallet as owner, so its initialization no longer counts.
    pub fn reset_wallet(&mut self, wallet: Address) {
        self.wallet = Some(wallet);
        self.module_initialized = false;
        self.module_bound = false;
        self.module_enabled = false;
    }
}
