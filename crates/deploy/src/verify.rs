// deploy/src/verify.rs

//! Source verification against an Etherscan-compatible explorer API
//!
//! Explorer answers are classified instead of string-matched at call
//! sites. Only the status poll of an accepted submission is repeated;
//! the submission itself is sent once.

use crate::{deployments::DeploymentRecord, runtime::Runtime, DeployError, DeployResult};
use chain_core::{Address, Bytes};
use serde::Deserialize;
use serde_json::Value;
use smart_contracts::ContractArtifact;
use std::fmt;
use std::time::Duration;

/// Why a verification did not succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyClass {
    /// The explorer already has the source; counts as success
    AlreadyVerified,
    /// Queued on the explorer side; poll again
    Pending,
    /// Too many requests; poll again after the interval
    RateLimited,
    InvalidApiKey,
    /// The artifact carries no source metadata to submit
    MissingSource,
    /// The explorer could not match the source to the deployed code
    Rejected,
    /// The explorer could not be reached or answered garbage
    Transport,
}

impl VerifyClass {
    /// Classify an explorer message
    pub fn classify(message: &str) -> Self {
        let message = message.to_lowercase();
        if message.contains("already verified") {
            VerifyClass::AlreadyVerified
        } else if message.contains("pending in queue") {
            VerifyClass::Pending
        } else if message.contains("rate limit") {
            VerifyClass::RateLimited
        } else if message.contains("invalid api key") {
            VerifyClass::InvalidApiKey
        } else {
            VerifyClass::Rejected
        }
    }

    /// Worth another status poll
    pub fn is_retryable(self) -> bool {
        matches!(self, VerifyClass::Pending | VerifyClass::RateLimited)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{class:?}: {message}")]
pub struct VerifyError {
    pub class: VerifyClass,
    pub message: String,
}

impl VerifyError {
    fn new(class: VerifyClass, message: impl Into<String>) -> Self {
        Self {
            class,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    AlreadyVerified,
    /// Development network or no API key
    Skipped,
    /// Logged and swallowed
    Failed(VerifyError),
}

impl VerifyOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerifyOutcome::Verified | VerifyOutcome::AlreadyVerified)
    }
}

#[derive(Debug, Deserialize)]
struct ExplorerResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: Value,
}

impl ExplorerResponse {
    fn ok(&self) -> bool {
        self.status == "1"
    }

    fn text(&self) -> String {
        match &self.result {
            Value::String(s) => s.clone(),
            Value::Null => self.message.clone(),
            other => other.to_string(),
        }
    }
}

/// Client for one explorer API
pub struct EtherscanVerifier {
    api_key: String,
    api_url: String,
    client: reqwest::Client,
    poll_interval: Duration,
    max_polls: u32,
}

impl EtherscanVerifier {
    pub fn new(api_key: impl Into<String>, network: &str) -> DeployResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| DeployError::Http(e.to_string()))?;
        Ok(Self {
            api_key: api_key.into(),
            api_url: explorer_api_url(network),
            client,
            poll_interval: Duration::from_secs(5),
            max_polls: 10,
        })
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Submit the source of the contract at `address` and wait for the
    /// explorer's verdict
    pub async fn verify(
        &self,
        address: Address,
        artifact: &ContractArtifact,
        constructor_args: &Bytes,
    ) -> Result<VerifyOutcome, VerifyError> {
        let guid = match self.submit(address, artifact, constructor_args).await {
            Ok(guid) => guid,
            Err(e) if e.class == VerifyClass::AlreadyVerified => return Ok(VerifyOutcome::AlreadyVerified),
            Err(e) => return Err(e),
        };
        tracing::debug!(guid = %guid, "Verification submitted");
        self.await_status(&guid).await
    }

    async fn submit(
        &self,
        address: Address,
        artifact: &ContractArtifact,
        constructor_args: &Bytes,
    ) -> Result<String, VerifyError> {
        let metadata = artifact.verification.as_ref().ok_or_else(|| {
            VerifyError::new(
                VerifyClass::MissingSource,
                format!("{} has no verification metadata", artifact.contract_name),
            )
        })?;
        let source = serde_json::to_string(&metadata.standard_json_input)
            .map_err(|e| VerifyError::new(VerifyClass::MissingSource, e.to_string()))?;
        let address = format!("{address:?}");
        let args = hex::encode(constructor_args);

        let form = [
            ("apikey", self.api_key.as_str()),
            ("module", "contract"),
            ("action", "verifysourcecode"),
            ("contractaddress", address.as_str()),
            ("sourceCode", source.as_str()),
            ("codeformat", "solidity-standard-json-input"),
            ("contractname", metadata.contract_path.as_str()),
            ("compilerversion", metadata.compiler_version.as_str()),
            // sic: the explorer's parameter name
            ("constructorArguements", args.as_str()),
        ];
        let response = self.client.post(&self.api_url).form(&form).send().await;
        let response = self.parse(response).await?;
        if response.ok() {
            Ok(response.text())
        } else {
            let text = response.text();
            Err(VerifyError::new(VerifyClass::classify(&text), text))
        }
    }

    async fn await_status(&self, guid: &str) -> Result<VerifyOutcome, VerifyError> {
        let mut last = VerifyError::new(VerifyClass::Pending, "no status polled");
        for _ in 0..self.max_polls {
            tokio::time::sleep(self.poll_interval).await;
            let response = self
                .client
                .get(&self.api_url)
                .query(&[
                    ("apikey", self.api_key.as_str()),
                    ("module", "contract"),
                    ("action", "checkverifystatus"),
                    ("guid", guid),
                ])
                .send()
                .await;
            let response = self.parse(response).await?;
            let text = response.text();
            if response.ok() {
                return Ok(VerifyOutcome::Verified);
            }
            match VerifyClass::classify(&text) {
                VerifyClass::AlreadyVerified => return Ok(VerifyOutcome::AlreadyVerified),
                class if class.is_retryable() => {
                    tracing::debug!(guid, "Verification status: {}", text);
                    last = VerifyError::new(class, text);
                }
                class => return Err(VerifyError::new(class, text)),
            }
        }
        Err(last)
    }

    async fn parse(
        &self,
        response: Result<reqwest::Response, reqwest::Error>,
    ) -> Result<ExplorerResponse, VerifyError> {
        let transport = |e: reqwest::Error| VerifyError::new(VerifyClass::Transport, e.to_string());
        let response = response.map_err(transport)?;
        if !response.status().is_success() {
            return Err(VerifyError::new(
                VerifyClass::Transport,
                format!("explorer answered {}", response.status()),
            ));
        }
        response.json().await.map_err(transport)
    }
}

impl fmt::Debug for EtherscanVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EtherscanVerifier")
            .field("api_url", &self.api_url)
            .field("poll_interval", &self.poll_interval)
            .field("max_polls", &self.max_polls)
            .finish()
    }
}

/// Explorer API endpoint for a network name
pub fn explorer_api_url(network: &str) -> String {
    match network {
        "mainnet" => "https://api.etherscan.io/api".to_string(),
        "sepolia" => "https://api-sepolia.etherscan.io/api".to_string(),
        "polygon" => "https://api.polygonscan.com/api".to_string(),
        _ => format!("https://api-{network}.etherscan.io/api"),
    }
}

/// Verifier for the runtime's network, or `None` when verification does
/// not apply (development network, no API key)
pub fn verifier_for(runtime: &Runtime) -> DeployResult<Option<EtherscanVerifier>> {
    if runtime.is_development() {
        return Ok(None);
    }
    let Some(api_key) = runtime.environment().etherscan_api_key() else {
        return Ok(None);
    };
    let settings = &runtime.config().etherscan;
    let mut verifier = EtherscanVerifier::new(api_key, &runtime.network().name)?.with_polling(
        Duration::from_secs(settings.status_poll_interval_secs),
        settings.max_status_polls,
    );
    if let Some(url) = &settings.api_url {
        verifier = verifier.with_api_url(url.clone());
    }
    Ok(Some(verifier))
}

/// Verify a deployment. Failures are logged, never returned.
pub async fn verify(runtime: &Runtime, record: &DeploymentRecord) -> VerifyOutcome {
    let verifier = match verifier_for(runtime) {
        Ok(Some(verifier)) => verifier,
        Ok(None) => return VerifyOutcome::Skipped,
        Err(e) => {
            tracing::error!("{}", e);
            return VerifyOutcome::Failed(VerifyError::new(VerifyClass::Transport, e.to_string()));
        }
    };
    let artifact = match runtime.artifact(&record.contract_name) {
        Ok(artifact) => artifact,
        Err(e) => {
            tracing::error!("{}", e);
            return VerifyOutcome::Failed(VerifyError::new(VerifyClass::MissingSource, e.to_string()));
        }
    };

    tracing::info!("Verifying Contract...");
    match verifier
        .verify(record.address, &artifact, &record.encoded_args)
        .await
    {
        Ok(VerifyOutcome::AlreadyVerified) => {
            tracing::info!("Already Verified!");
            VerifyOutcome::AlreadyVerified
        }
        Ok(outcome) => {
            tracing::info!("Verified {} at {:?}", record.contract_name, record.address);
            outcome
        }
        Err(e) => {
            tracing::error!("{}", e);
            VerifyOutcome::Failed(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{deployer, DeployOptions};
    use smart_contracts::contracts::simple_storage;

    #[test]
    fn test_classify() {
        assert_eq!(
            VerifyClass::classify("Contract source code already verified"),
            VerifyClass::AlreadyVerified
        );
        assert_eq!(VerifyClass::classify("Already Verified"), VerifyClass::AlreadyVerified);
        assert_eq!(VerifyClass::classify("Pending in queue"), VerifyClass::Pending);
        assert_eq!(
            VerifyClass::classify("Max rate limit reached, please use API Key for higher rate limit"),
            VerifyClass::RateLimited
        );
        assert_eq!(VerifyClass::classify("Invalid API Key"), VerifyClass::InvalidApiKey);
        assert_eq!(
            VerifyClass::classify("Fail - Unable to verify"),
            VerifyClass::Rejected
        );
        assert!(VerifyClass::Pending.is_retryable());
        assert!(VerifyClass::RateLimited.is_retryable());
        assert!(!VerifyClass::Rejected.is_retryable());
        assert!(!VerifyClass::AlreadyVerified.is_retryable());
    }

    #[test]
    fn test_explorer_api_url() {
        assert_eq!(explorer_api_url("mainnet"), "https://api.etherscan.io/api");
        assert_eq!(explorer_api_url("sepolia"), "https://api-sepolia.etherscan.io/api");
        assert_eq!(explorer_api_url("rinkeby"), "https://api-rinkeby.etherscan.io/api");
        assert_eq!(explorer_api_url("polygon"), "https://api.polygonscan.com/api");
    }

    #[tokio::test]
    async fn test_skipped_on_development_network() {
        let runtime = Runtime::hardhat().await.unwrap();
        assert!(verifier_for(&runtime).unwrap().is_none());
        let record = deployer::deploy(&runtime, simple_storage::NAME, DeployOptions::new())
            .await
            .unwrap();
        assert_eq!(verify(&runtime, &record).await, VerifyOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_native_artifact_has_no_source() {
        let verifier = EtherscanVerifier::new("key", "sepolia")
            .unwrap()
            .with_api_url("http://127.0.0.1:1/api");
        let registry = smart_contracts::ArtifactRegistry::builtin().unwrap();
        let artifact = registry.native(simple_storage::NAME).unwrap().artifact().clone();
        let err = verifier
            .verify(Address::zero(), &artifact, &Bytes::default())
            .await
            .unwrap_err();
        assert_eq!(err.class, VerifyClass::MissingSource);
    }
}
