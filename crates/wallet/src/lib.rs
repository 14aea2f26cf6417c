// wallet/src/lib.rs

//! Keys and the wallet-facing client
//!
//! - Encrypted keystores (Web3 Secret Storage) for deployer keys
//! - Signer loading from a raw private key or a keystore
//! - A wallet client driving FundMe through an injected provider

pub mod injected;
pub mod keystore;
pub mod signer;

pub use injected::{Button, ConnectionStatus, InjectedProvider, NodeWallet, WalletClient};
pub use keystore::{decrypt_key, encrypt_key, EncryptedKey, ENCRYPTED_KEY_FILE};
pub use signer::{parse_private_key, signer_from_keystore, signer_from_private_key};

use chain_core::ChainError;

/// Result type for wallet operations
pub type WalletResult<T> = Result<T, WalletError>;

#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Keystore error: {0}")]
    Keystore(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No injected wallet provider")]
    NotInstalled,

    #[error("Wallet is not connected")]
    NotConnected,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Contract error: {0}")]
    Contract(#[from] smart_contracts::ContractError),

    #[error(transparent)]
    Chain(#[from] ChainError),
}
