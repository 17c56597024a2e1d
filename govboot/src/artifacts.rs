//! Compiled contract artifacts.
//!
//! Deployment only needs creation bytecode, while explorer verification also needs the compiler
//! version and the standard-JSON input the contract was compiled from. Both Hardhat
//! (`artifacts/<source>/<Name>.json` + `.dbg.json` + `build-info/`) and Foundry
//! (`out/<File>.sol/<Name>.json`) layouts are understood.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use alloy::primitives::Bytes;
use serde::Deserialize;
use serde_json::Value;

use crate::debug;

/// Errors raised while resolving or parsing an artifact.
#[crate::error::govboot_error]
pub enum ArtifactError {
    /// No artifact matches the requested contract name.
    #[error("no artifact found for contract {name} under {root}")]
    NotFound {
        /// The contract name that was requested.
        name: String,
        /// The directory that was searched.
        root: String,
    },
    /// More than one source defines a contract with this name.
    #[error("contract name {name} is ambiguous, use a fully qualified name: {candidates:?}")]
    Ambiguous {
        /// The contract name that was requested.
        name: String,
        /// The fully qualified candidates.
        candidates: Vec<String>,
    },
    /// The artifact file is not valid JSON or misses required fields.
    #[error("malformed artifact {path}: {message}")]
    Malformed {
        /// Path of the offending file.
        path: String,
        /// Parse failure.
        message: String,
    },
    /// The bytecode references libraries that were never linked.
    #[error("contract {0} has unlinked library references")]
    UnlinkedLibraries(String),
    /// The artifact has no creation bytecode (interface or abstract contract).
    #[error("contract {0} has no creation bytecode")]
    NotDeployable(String),
    /// Filesystem failure.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// The compiler input and version an artifact was built from.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildInfo {
    /// Long compiler version, e.g. `0.8.15+commit.e14f2714`.
    pub solc_long_version: String,
    /// The standard-JSON compiler input.
    pub input: Value,
}

/// A compiled contract, i.e. the "contract factory" for one contract name.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractArtifact {
    /// Contract name, e.g. `MetaVotingModule`.
    pub contract_name: String,
    /// Source path relative to the project root, e.g. `src/MetaVotingModule.sol`.
    pub source_name: String,
    /// The JSON ABI.
    pub abi: Value,
    /// Creation bytecode.
    pub bytecode: Bytes,
    /// Compiler input, when the build produced it.
    pub build_info: Option<BuildInfo>,
}

impl ContractArtifact {
    /// `source:Name`, the form explorers and compilers use to identify a contract.
    #[must_use]
    pub fn fully_qualified_name(&self) -> String {
        format!("{}:{}", self.source_name, self.contract_name)
    }
}

/// Resolves contract names to compiled artifacts.
pub trait ArtifactStore: Send + Sync {
    /// Loads the artifact for `name` (`Name` or `path/File.sol:Name`).
    ///
    /// # Errors
    /// - `ArtifactError` if the artifact cannot be found or parsed.
    fn load(&self, name: &str) -> Result<ContractArtifact, ArtifactError>;
}

/// Reads artifacts produced by `hardhat compile` or `forge build`.
#[derive(Debug, Clone)]
pub struct HardhatArtifacts {
    root: PathBuf,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatArtifact {
    contract_name: String,
    source_name: String,
    abi: Value,
    bytecode: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatDebugFile {
    build_info: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatBuildInfo {
    solc_long_version: String,
    input: Value,
}

#[derive(Deserialize)]
struct FoundryArtifact {
    abi: Value,
    bytecode: FoundryBytecode,
    #[serde(default)]
    metadata: Option<FoundryMetadata>,
}

#[derive(Deserialize)]
struct FoundryBytecode {
    object: String,
}

#[derive(Deserialize)]
struct FoundryMetadata {
    settings: FoundrySettings,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FoundrySettings {
    compilation_target: HashMap<String, String>,
}

impl HardhatArtifacts {
    /// Creates a store rooted at an `artifacts/` (Hardhat) or `out/` (Foundry) directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn candidates(&self, contract_name: &str) -> Result<Vec<PathBuf>, ArtifactError> {
        let mut found = Vec::new();
        let mut pending = vec![self.root.clone()];
        let file_name = format!("{contract_name}.json");

        while let Some(dir) = pending.pop() {
            let entries = fs::read_dir(&dir).map_err(|source| ArtifactError::Io {
                path: dir.display().to_string(),
                source,
            })?;
            for entry in entries {
                let entry = entry.map_err(|source| ArtifactError::Io {
                    path: dir.display().to_string(),
                    source,
                })?;
                let path = entry.path();
                if path.is_dir() {
                    if path.file_name().is_some_and(|n| n == "build-info") {
                        continue;
                    }
                    pending.push(path);
                } else if path.file_name().is_some_and(|n| *n == *file_name) {
                    found.push(path);
                }
            }
        }
        found.sort();
        Ok(found)
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, ArtifactError> {
        if let Some((source, contract)) = name.rsplit_once(':') {
            let path = self.root.join(source).join(format!("{contract}.json"));
            if path.is_file() {
                return Ok(path);
            }
            // Foundry keys directories by file name only.
            let file_name = Path::new(source).file_name().unwrap_or_default();
            let path = self.root.join(file_name).join(format!("{contract}.json"));
            if path.is_file() {
                return Ok(path);
            }
            return Err(ArtifactError::NotFound {
                name: name.to_string(),
                root: self.root.display().to_string(),
            });
        }

        let mut candidates = self.candidates(name)?;
        match candidates.len() {
            0 => Err(ArtifactError::NotFound {
                name: name.to_string(),
                root: self.root.display().to_string(),
            }),
            1 => Ok(candidates.remove(0)),
            _ => Err(ArtifactError::Ambiguous {
                name: name.to_string(),
                candidates: candidates
                    .iter()
                    .map(|p| {
                        p.strip_prefix(&self.root)
                            .unwrap_or(p)
                            .display()
                            .to_string()
                    })
                    .collect(),
            }),
        }
    }

    fn parse(&self, path: &Path) -> Result<ContractArtifact, ArtifactError> {
        let raw = read_json(path)?;

        if raw.get("contractName").is_some() {
            let artifact: HardhatArtifact = from_value(path, raw)?;
            let bytecode = decode_bytecode(&artifact.contract_name, &artifact.bytecode)?;
            let build_info = self.hardhat_build_info(path)?;
            return Ok(ContractArtifact {
                contract_name: artifact.contract_name,
                source_name: artifact.source_name,
                abi: artifact.abi,
                bytecode,
                build_info,
            });
        }

        let artifact: FoundryArtifact = from_value(path, raw)?;
        let contract_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let bytecode = decode_bytecode(&contract_name, &artifact.bytecode.object)?;
        let source_name = artifact
            .metadata
            .as_ref()
            .and_then(|m| {
                m.settings
                    .compilation_target
                    .iter()
                    .find(|(_, name)| **name == contract_name)
                    .map(|(source, _)| source.clone())
            })
            .or_else(|| {
                path.parent()
                    .and_then(Path::file_name)
                    .map(|s| s.to_string_lossy().to_string())
            })
            .unwrap_or_default();

        Ok(ContractArtifact {
            contract_name,
            source_name,
            abi: artifact.abi,
            bytecode,
            // Foundry artifacts do not carry the standard-JSON input.
            build_info: None,
        })
    }

    fn hardhat_build_info(&self, artifact_path: &Path) -> Result<Option<BuildInfo>, ArtifactError> {
        let debug_path = artifact_path.with_extension("dbg.json");
        if !debug_path.is_file() {
            debug!("No debug file next to {}", artifact_path.display());
            return Ok(None);
        }
        let debug_file: HardhatDebugFile = from_value(&debug_path, read_json(&debug_path)?)?;
        let build_info_path = debug_path
            .parent()
            .unwrap_or(&self.root)
            .join(&debug_file.build_info);
        if !build_info_path.is_file() {
            debug!("Build info {} is missing", build_info_path.display());
            return Ok(None);
        }
        let build_info: HardhatBuildInfo =
            from_value(&build_info_path, read_json(&build_info_path)?)?;
        Ok(Some(BuildInfo {
            solc_long_version: build_info.solc_long_version,
            input: build_info.input,
        }))
    }
}

impl ArtifactStore for HardhatArtifacts {
    fn load(&self, name: &str) -> Result<ContractArtifact, ArtifactError> {
        let path = self.resolve(name)?;
        debug!("Loading artifact {} from {}", name, path.display());
        self.parse(&path)
    }
}

fn read_json(path: &Path) -> Result<Value, ArtifactError> {
    let contents = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|e| ArtifactError::Malformed {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn from_value<T: serde::de::DeserializeOwned>(path: &Path, value: Value) -> Result<T, ArtifactError> {
    serde_json::from_value(value).map_err(|e| ArtifactError::Malformed {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn decode_bytecode(contract_name: &str, bytecode: &str) -> Result<Bytes, ArtifactError> {
    let bytecode = bytecode.trim_start_matches("0x");
    if bytecode.contains("__") {
        return Err(ArtifactError::UnlinkedLibraries(contract_name.to_string()));
    }
    if bytecode.is_empty() {
        return Err(ArtifactError::NotDeployable(contract_name.to_string()));
    }
    let bytes = hex::decode(bytecode).map_err(|e| ArtifactError::Malformed {
        path: contract_name.to_string(),
        message: format!("bytecode is not hex: {e}"),
    })?;
    Ok(bytes.into())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn write(path: &Path, value: &Value) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    }

    fn hardhat_artifact(name: &str, source: &str, bytecode: &str) -> Value {
        json!({
            "_format": "hh-sol-artifact-1",
            "contractName": name,
            "sourceName": source,
            "abi": [],
            "bytecode": bytecode,
            "deployedBytecode": "0x",
            "linkReferences": {},
            "deployedLinkReferences": {}
        })
    }

    #[test]
    fn test_load_hardhat_artifact_with_build_info() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            &root.join("src/MetaVotingModule.sol/MetaVotingModule.json"),
            &hardhat_artifact("MetaVotingModule", "src/MetaVotingModule.sol", "0x6080604052"),
        );
        write(
            &root.join("src/MetaVotingModule.sol/MetaVotingModule.dbg.json"),
            &json!({"_format": "hh-sol-dbg-1", "buildInfo": "../../build-info/abc.json"}),
        );
        write(
            &root.join("build-info/abc.json"),
            &json!({
                "_format": "hh-sol-build-info-1",
                "solcVersion": "0.8.15",
                "solcLongVersion": "0.8.15+commit.e14f2714",
                "input": {"language": "Solidity", "sources": {}}
            }),
        );

        let artifact = HardhatArtifacts::new(root).load("MetaVotingModule").unwrap();

        assert_eq!(artifact.contract_name, "MetaVotingModule");
        assert_eq!(
            artifact.fully_qualified_name(),
            "src/MetaVotingModule.sol:MetaVotingModule"
        );
        assert_eq!(artifact.bytecode.as_ref(), &[0x60, 0x80, 0x60, 0x40, 0x52]);
        let build_info = artifact.build_info.unwrap();
        assert_eq!(build_info.solc_long_version, "0.8.15+commit.e14f2714");
        assert_eq!(build_info.input["language"], "Solidity");
    }

    #[test]
    fn test_load_foundry_artifact() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("VotingToken.sol/VotingToken.json"),
            &json!({
                "abi": [],
                "bytecode": {"object": "0x60806040", "linkReferences": {}},
                "metadata": {
                    "compiler": {"version": "0.8.15+commit.e14f2714"},
                    "settings": {"compilationTarget": {"src/VotingToken.sol": "VotingToken"}}
                }
            }),
        );

        let store = HardhatArtifacts::new(dir.path());
        let artifact = store.load("VotingToken").unwrap();
        assert_eq!(artifact.source_name, "src/VotingToken.sol");
        assert!(artifact.build_info.is_none());

        let qualified = store.load("src/VotingToken.sol:VotingToken").unwrap();
        assert_eq!(qualified, artifact);
    }

    #[test]
    fn test_missing_and_ambiguous_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            &root.join("src/a/Token.sol/Token.json"),
            &hardhat_artifact("Token", "src/a/Token.sol", "0x00"),
        );
        write(
            &root.join("src/b/Token.sol/Token.json"),
            &hardhat_artifact("Token", "src/b/Token.sol", "0x00"),
        );

        let store = HardhatArtifacts::new(root);
        assert!(matches!(
            store.load("Missing"),
            Err(ArtifactError::NotFound { .. })
        ));
        match store.load("Token") {
            Err(ArtifactError::Ambiguous { candidates, .. }) => assert_eq!(candidates.len(), 2),
            other => panic!("expected ambiguity, got {other:?}"),
        }
        assert!(store.load("src/a/Token.sol:Token").is_ok());
    }

    #[test]
    fn test_rejects_unlinked_and_empty_bytecode() {
        assert!(matches!(
            decode_bytecode("Lib", "0x6080__$abc$__"),
            Err(ArtifactError::UnlinkedLibraries(_))
        ));
        assert!(matches!(
            decode_bytecode("IToken", "0x"),
            Err(ArtifactError::NotDeployable(_))
        ));
    }
}
