// wallet/src/keystore.rs
use crate::{signer::parse_private_key, WalletError, WalletResult};
use chain_core::Address;
use ethers_signers::{LocalWallet, Signer};
use std::path::{Path, PathBuf};

/// File the key-encryption command writes
pub const ENCRYPTED_KEY_FILE: &str = ".encryptedKey.json";

/// A freshly written keystore
#[derive(Debug, Clone)]
pub struct EncryptedKey {
    pub address: Address,
    pub path: PathBuf,
    /// Keystore JSON as written to `path`
    pub json: String,
}

/// Encrypt `private_key` with `password` into `<dir>/.encryptedKey.json`
pub fn encrypt_key(private_key: &str, password: &str, dir: impl AsRef<Path>) -> WalletResult<EncryptedKey> {
    if password.is_empty() {
        return Err(WalletError::Keystore("password must not be empty".into()));
    }
    let dir = dir.as_ref();
    let key = parse_private_key(private_key)?;
    let mut rng = rand::thread_rng();

    let (wallet, _) = LocalWallet::encrypt_keystore(dir, &mut rng, key, password, Some(ENCRYPTED_KEY_FILE))
        .map_err(|e| WalletError::Keystore(e.to_string()))?;

    let path = dir.join(ENCRYPTED_KEY_FILE);
    let json = std::fs::read_to_string(&path)?;
    tracing::info!(address = ?wallet.address(), path = %path.display(), "Encrypted key written");

    Ok(EncryptedKey {
        address: wallet.address(),
        path,
        json,
    })
}

/// Load a wallet from a keystore file
pub fn decrypt_key(path: impl AsRef<Path>, password: &str) -> WalletResult<LocalWallet> {
    let path = path.as_ref();
    LocalWallet::decrypt_keystore(path, password)
        .map_err(|e| WalletError::Keystore(format!("{}: {}", path.display(), e)))
}
