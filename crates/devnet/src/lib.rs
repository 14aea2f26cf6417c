// devnet/src/lib.rs

//! In-process development chain
//!
//! A single-node chain that mines one block per transaction, with:
//! - Pre-funded accounts derived from a seed phrase
//! - Native contract execution through `smart-contracts`
//! - Receipts, logs and log subscriptions
//! - Clock manipulation, balance overrides and state snapshots

pub mod accounts;
pub mod chain;
pub mod config;
pub mod devnet;

pub use accounts::{DevAccount, DevAccounts};
pub use chain::ChainState;
pub use config::DevnetConfig;
pub use devnet::Devnet;

/// Result type for devnet setup
pub type DevnetResult<T> = Result<T, DevnetError>;

/// Errors raised while building a development chain
#[derive(Debug, thiserror::Error)]
pub enum DevnetError {
    #[error("Account derivation failed at index {index}: {reason}")]
    AccountDerivation { index: u32, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Contract registry error: {0}")]
    Registry(#[from] smart_contracts::ContractError),
}
