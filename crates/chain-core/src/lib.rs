// chain-core/src/lib.rs

//! Chain-facing building blocks shared by every other crate
//!
//! This crate provides:
//! - Ethereum primitive types and ether unit helpers
//! - Transaction requests, receipts, blocks and logs
//! - The `Provider` abstraction over a chain (in-process or JSON-RPC)
//! - Provider-bound contract handles and confirmation waiting

pub mod block;
pub mod contract;
pub mod log;
pub mod pending;
pub mod provider;
pub mod transaction;
pub mod types;
pub mod units;

pub use block::Block;
pub use contract::{ContractHandle, DecodedEvent};
pub use log::{Log, LogFilter, LogSubscription};
pub use pending::PendingTransaction;
pub use provider::Provider;
pub use transaction::{TransactionReceipt, TransactionRequest};
pub use types::*;

/// Result type for chain operations
pub type ChainResult<T> = Result<T, ChainError>;

/// Errors surfaced by providers and contract handles
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChainError {
    /// The call or transaction reverted. `reason` is the decoded revert
    /// string or custom error, `data` the raw revert payload.
    #[error("execution reverted: {reason}")]
    Revert { reason: String, data: Bytes },

    #[error("insufficient funds: need {needed} wei, have {available} wei")]
    InsufficientFunds { needed: U256, available: U256 },

    #[error("unknown account: {0:?}")]
    UnknownAccount(Address),

    #[error("transaction not found: {0:?}")]
    TransactionNotFound(H256),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("ABI error: {0}")]
    Abi(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("signer error: {0}")]
    Signer(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("log subscription closed")]
    SubscriptionClosed,

    #[error("execution error: {0}")]
    Execution(String),
}

impl ChainError {
    /// Decoded revert reason, if this error is a revert
    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            ChainError::Revert { reason, .. } => Some(reason.as_str()),
            _ => None,
        }
    }

    pub fn is_revert(&self) -> bool {
        matches!(self, ChainError::Revert { .. })
    }
}

impl From<ethers_core::abi::Error> for ChainError {
    fn from(err: ethers_core::abi::Error) -> Self {
        ChainError::Abi(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revert_reason() {
        let err = ChainError::Revert {
            reason: "FundMe__NotOwner()".into(),
            data: Bytes::default(),
        };
        assert!(err.is_revert());
        assert_eq!(err.revert_reason(), Some("FundMe__NotOwner()"));
        assert_eq!(err.to_string(), "execution reverted: FundMe__NotOwner()");

        let err = ChainError::Timeout("receipt".into());
        assert!(!err.is_revert());
        assert_eq!(err.revert_reason(), None);
    }
}
