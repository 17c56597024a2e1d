//! Source verification on Etherscan-compatible block explorers.
//!
//! Verification is best effort: callers log failures and carry on.

use alloy::primitives::{Address, Bytes};
use govboot_macros::log_context;
use serde::Deserialize;

use crate::{
    artifacts::ContractArtifact,
    debug, info,
    primitives::{
        config::WaitOptions,
        http_client::{HttpClient, HttpError, HttpHeader, HttpMethod},
    },
};

/// Errors raised while verifying a contract.
#[crate::error::govboot_error]
pub enum VerificationError {
    /// No explorer API key is configured.
    #[error("no explorer API key configured")]
    MissingApiKey,
    /// The artifact carries no compiler input to submit.
    #[error("artifact {0} has no build info")]
    MissingBuildInfo(String),
    /// The explorer could not be reached.
    #[error("explorer request failed: {0}")]
    Http(#[from] HttpError),
    /// The explorer refused the submission or the verification failed.
    #[error("verification rejected: {message}")]
    Rejected {
        /// Explorer message.
        message: String,
    },
    /// The explorer answered with something that is not a known API response.
    #[error("unexpected explorer response: {0}")]
    UnexpectedResponse(String),
    /// The explorer kept the submission pending for longer than allowed.
    #[error("verification {guid} still pending after {seconds} seconds")]
    Timeout {
        /// Submission id.
        guid: String,
        /// The configured bound.
        seconds: u64,
    },
}

/// A contract to verify.
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    /// Where the contract is deployed.
    pub address: Address,
    /// The artifact it was deployed from.
    pub artifact: ContractArtifact,
    /// ABI-encoded constructor arguments, empty if none.
    pub constructor_args: Bytes,
}

/// Outcome of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationReceipt {
    /// The source was submitted and accepted.
    Verified {
        /// Explorer submission id.
        guid: String,
    },
    /// The explorer already had the source.
    AlreadyVerified,
    /// Verification is disabled for this run.
    Skipped,
}

/// Publishes contract sources.
#[async_trait::async_trait]
pub trait Verifier: Send + Sync {
    /// Verifies one deployed contract.
    async fn verify(
        &self,
        request: VerificationRequest,
    ) -> Result<VerificationReceipt, VerificationError>;
}

/// A [`Verifier`] that does nothing, for local networks and `--skip-verify`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipVerification;

#[async_trait::async_trait]
impl Verifier for SkipVerification {
    async fn verify(
        &self,
        request: VerificationRequest,
    ) -> Result<VerificationReceipt, VerificationError> {
        debug!("Skipping verification of {}", request.address);
        Ok(VerificationReceipt::Skipped)
    }
}

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    result: String,
}

impl ExplorerResponse {
    fn is_ok(&self) -> bool {
        self.status == "1"
    }
}

fn is_already_verified(text: &str) -> bool {
    text.to_ascii_lowercase().contains("already verified")
}

/// Verifies through the Etherscan `verifysourcecode` API, submitting the standard-JSON compiler input.
///
/// Reference: <https://docs.etherscan.io/api-endpoints/contracts#verify-source-code>
pub struct EtherscanVerifier<H: HttpClient> {
    http: H,
    api_url: String,
    api_key: Option<String>,
    poll: WaitOptions,
}

#[log_context]
impl<H: HttpClient> EtherscanVerifier<H> {
    /// Creates a verifier for the explorer API at `api_url`.
    ///
    /// A missing key is only reported when a verification is attempted.
    pub fn new(http: H, api_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            api_url: api_url.into(),
            api_key,
            poll: WaitOptions {
                poll_interval: std::time::Duration::from_secs(5),
                timeout: std::time::Duration::from_secs(120),
            },
        }
    }

    /// How often and how long to poll the verification status.
    #[must_use]
    pub fn with_polling(mut self, poll: WaitOptions) -> Self {
        self.poll = poll;
        self
    }

    async fn request(
        &self,
        method: HttpMethod,
        params: &[(&str, &str)],
    ) -> Result<ExplorerResponse, VerificationError> {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        let (url, headers, body) = match method {
            HttpMethod::Get => (format!("{}?{encoded}", self.api_url), Vec::new(), None),
            HttpMethod::Post => (
                self.api_url.clone(),
                vec![HttpHeader::new(
                    "Content-Type",
                    "application/x-www-form-urlencoded",
                )],
                Some(encoded.into_bytes()),
            ),
        };
        let body = self.http.fetch(url, method, headers, body).await?;
        serde_json::from_slice(&body).map_err(|_| {
            VerificationError::UnexpectedResponse(String::from_utf8_lossy(&body).into_owned())
        })
    }

    async fn submit(
        &self,
        api_key: &str,
        request: &VerificationRequest,
    ) -> Result<Option<String>, VerificationError> {
        let build_info = request.artifact.build_info.as_ref().ok_or_else(|| {
            VerificationError::MissingBuildInfo(request.artifact.fully_qualified_name())
        })?;

        let source = build_info.input.to_string();
        let address = request.address.to_string();
        let contract_name = request.artifact.fully_qualified_name();
        let compiler = format!("v{}", build_info.solc_long_version);
        let constructor_args = hex::encode(&request.constructor_args);

        let response = self
            .request(
                HttpMethod::Post,
                &[
                    ("apikey", api_key),
                    ("module", "contract"),
                    ("action", "verifysourcecode"),
                    ("contractaddress", address.as_str()),
                    ("sourceCode", source.as_str()),
                    ("codeformat", "solidity-standard-json-input"),
                    ("contractname", contract_name.as_str()),
                    ("compilerversion", compiler.as_str()),
                    // sic, the API misspells it
                    ("constructorArguements", constructor_args.as_str()),
                ],
            )
            .await?;

        if response.is_ok() {
            return Ok(Some(response.result));
        }
        if is_already_verified(&response.result) || is_already_verified(&response.message) {
            return Ok(None);
        }
        Err(VerificationError::Rejected {
            message: response.result,
        })
    }

    async fn await_result(&self, api_key: &str, guid: &str) -> Result<(), VerificationError> {
        let poll = async {
            loop {
                tokio::time::sleep(self.poll.poll_interval).await;
                let response = self
                    .request(
                        HttpMethod::Get,
                        &[
                            ("apikey", api_key),
                            ("module", "contract"),
                            ("action", "checkverifystatus"),
                            ("guid", guid),
                        ],
                    )
                    .await?;
                if response.is_ok() || is_already_verified(&response.result) {
                    return Ok(());
                }
                if !response.result.to_ascii_lowercase().contains("pending") {
                    return Err(VerificationError::Rejected {
                        message: response.result,
                    });
                }
                debug!("Verification {guid}: {}", response.result);
            }
        };
        tokio::time::timeout(self.poll.timeout, poll)
            .await
            .map_err(|_| VerificationError::Timeout {
                guid: guid.to_string(),
                seconds: self.poll.timeout.as_secs(),
            })?
    }
}

#[async_trait::async_trait]
impl<H: HttpClient> Verifier for EtherscanVerifier<H> {
    async fn verify(
        &self,
        request: VerificationRequest,
    ) -> Result<VerificationReceipt, VerificationError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(VerificationError::MissingApiKey)?;

        let Some(guid) = self.submit(api_key, &request).await? else {
            info!("{} is already verified", request.address);
            return Ok(VerificationReceipt::AlreadyVerified);
        };
        debug!("Submitted {} for verification ({guid})", request.address);

        self.await_result(api_key, &guid).await?;
        info!(
            "Verified {} at {}",
            request.artifact.contract_name, request.address
        );
        Ok(VerificationReceipt::Verified { guid })
    }
}
