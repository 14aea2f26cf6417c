// rpc/src/lib.rs
pub mod client;
pub mod methods;
pub mod server;
pub mod types;

pub use client::RpcClient;
pub use methods::RpcMethods;
pub use server::{RpcConfig, RpcServer};
pub use types::*;

use chain_core::{Bytes, ChainError};

/// JSON-RPC code for a reverted call or transaction
pub const EXECUTION_REVERTED: i64 = 3;

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Parse error")]
    ParseError,
    #[error("Invalid request")]
    InvalidRequest,
    #[error("Method not found: {0}")]
    MethodNotFound(String),
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("Internal error: {0}")]
    InternalError(String),
    #[error("Server error: {0}")]
    ServerError(String),
    #[error("execution reverted: {reason}")]
    ExecutionReverted { reason: String, data: Bytes },
    #[error("{0}")]
    TransactionRejected(String),
}

impl RpcError {
    pub fn code(&self) -> i64 {
        match self {
            RpcError::ParseError => -32700,
            RpcError::InvalidRequest => -32600,
            RpcError::MethodNotFound(_) => -32601,
            RpcError::InvalidParams(_) => -32602,
            RpcError::InternalError(_) => -32603,
            RpcError::ServerError(_) => -32000,
            RpcError::ExecutionReverted { .. } => EXECUTION_REVERTED,
            RpcError::TransactionRejected(_) => -32003,
        }
    }

    /// Extra error payload (raw revert data for reverts)
    pub fn data(&self) -> Option<serde_json::Value> {
        match self {
            RpcError::ExecutionReverted { data, .. } => Some(serde_json::json!(data)),
            _ => None,
        }
    }
}

impl From<ChainError> for RpcError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::Revert { reason, data } => RpcError::ExecutionReverted { reason, data },
            ChainError::InvalidParams(message) => RpcError::InvalidParams(message),
            ChainError::InsufficientFunds { .. } | ChainError::UnknownAccount(_) => {
                RpcError::TransactionRejected(err.to_string())
            }
            other => RpcError::InternalError(other.to_string()),
        }
    }
}

pub type RpcResult<T> = Result<T, RpcError>;
