// deploy/src/lib.rs

//! Deployment workflow
//!
//! Everything between a bare chain and a working dapp:
//! - Per-network constants and the development chain set
//! - Project configuration and environment secrets
//! - Deployment records, the `deploy()` helper and tagged deploy scripts
//! - Block explorer source verification
//! - Interaction scripts, utility tasks and the gas reporter
//! - An event-await harness for asserting on contract events

pub mod config;
pub mod deployer;
pub mod deployments;
pub mod gas_reporter;
pub mod harness;
pub mod interact;
pub mod network;
pub mod runtime;
pub mod scripts;
pub mod tasks;
pub mod verify;

pub use config::{AccountSource, Environment, NamedAccounts, NetworkSettings, ProjectConfig};
pub use deployer::DeployOptions;
pub use deployments::{DeploymentRecord, DeploymentStore};
pub use gas_reporter::{GasReport, GasReporter};
pub use harness::{ArmedListener, EventListener, HarnessError, HarnessState};
pub use network::{network_by_name, network_config, NetworkDescriptor, DEVELOPMENT_CHAINS};
pub use runtime::Runtime;
pub use verify::{EtherscanVerifier, VerifyClass, VerifyError, VerifyOutcome};

use chain_core::ChainError;

/// Result type for deployment operations
pub type DeployResult<T> = Result<T, DeployError>;

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Network {network} has no {key} configured")]
    MissingNetworkValue { network: String, key: &'static str },

    #[error("Missing environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown named account: {0}")]
    UnknownAccount(String),

    #[error("No artifact for {contract} usable on {network}")]
    MissingArtifact { contract: String, network: String },

    #[error("No deployment of {contract} on {network}")]
    DeploymentNotFound { contract: String, network: String },

    #[error("Deployment of {0} produced no contract address")]
    NoContractAddress(String),

    #[error("Transaction {0:?} reverted")]
    Reverted(chain_core::H256),

    #[error("Deployment store error: {0}")]
    Store(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Contract error: {0}")]
    Contract(#[from] smart_contracts::ContractError),

    #[error("Wallet error: {0}")]
    Wallet(#[from] wallet::WalletError),

    #[error("Development chain error: {0}")]
    Devnet(#[from] devnet::DevnetError),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl DeployError {
    /// Revert reason when the failure is an on-chain revert
    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            DeployError::Chain(err) => err.revert_reason(),
            DeployError::Wallet(wallet::WalletError::Chain(err)) => err.revert_reason(),
            _ => None,
        }
    }
}
