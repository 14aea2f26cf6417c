// smart-contracts/src/lib.rs

//! Native Contract Execution
//!
//! This crate runs contracts as native Rust code behind an EVM-shaped
//! boundary, enabling:
//! - ABI-encoded calls dispatched by 4-byte selector
//! - Contract deployment with CREATE addresses and constructor arguments
//! - Gas metering
//! - Event emission and revert data
//! - The tutorial contracts and the Chainlink mocks they depend on

pub mod abi;
pub mod artifact;
pub mod contracts;
pub mod gas;
pub mod state;
pub mod vm;

pub use abi::{Dispatch, Revert};
pub use artifact::{ArtifactRegistry, ContractArtifact, SourceMetadata};
pub use gas::{GasMeter, GasSchedule};
pub use state::{Account, NativeContract, WorldState};
pub use vm::{BlockEnv, CallContext, ExecutionResult, Executor, LogEntry, Message};

use chain_core::{Address, U256};

/// Result type for smart contract operations
pub type ContractResult<T> = Result<T, ContractError>;

/// Errors that can occur during contract execution
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContractError {
    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Out of gas")]
    OutOfGas,

    #[error("Invalid bytecode: {0}")]
    InvalidBytecode(String),

    #[error("Deployment failed: {0}")]
    DeploymentFailed(String),

    #[error("Revert: {}", .0.reason)]
    Revert(Revert),

    #[error("Insufficient balance: need {needed} wei, have {available} wei")]
    InsufficientBalance { needed: U256, available: U256 },

    #[error("Reentrant call into {0:?}")]
    ReentrantCall(Address),

    #[error("Call depth exceeded")]
    CallDepthExceeded,

    #[error("ABI error: {0}")]
    Abi(String),

    #[error("Artifact error: {0}")]
    Artifact(String),
}

impl From<Revert> for ContractError {
    fn from(revert: Revert) -> Self {
        ContractError::Revert(revert)
    }
}

impl From<ethers_core::abi::Error> for ContractError {
    fn from(err: ethers_core::abi::Error) -> Self {
        ContractError::Abi(err.to_string())
    }
}

impl From<ContractError> for chain_core::ChainError {
    fn from(err: ContractError) -> Self {
        match err {
            ContractError::Revert(revert) => chain_core::ChainError::Revert {
                reason: revert.reason,
                data: revert.data,
            },
            ContractError::InsufficientBalance { needed, available } => {
                chain_core::ChainError::InsufficientFunds { needed, available }
            }
            other => chain_core::ChainError::Execution(other.to_string()),
        }
    }
}
