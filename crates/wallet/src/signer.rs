// wallet/src/signer.rs
use crate::{keystore, WalletError, WalletResult};
use chain_core::ChainId;
use ethers_signers::{LocalWallet, Signer};
use std::path::Path;

/// Decode a hex private key, with or without `0x`
pub fn parse_private_key(raw: &str) -> WalletResult<[u8; 32]> {
    let trimmed = raw.trim();
    let hex_key = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(hex_key).map_err(|e| WalletError::InvalidPrivateKey(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| WalletError::InvalidPrivateKey(format!("expected 32 bytes, got {}", bytes.len())))
}

pub fn signer_from_private_key(raw: &str, chain_id: ChainId) -> WalletResult<LocalWallet> {
    let key = parse_private_key(raw)?;
    let wallet =
        LocalWallet::from_bytes(&key).map_err(|e| WalletError::InvalidPrivateKey(e.to_string()))?;
    Ok(wallet.with_chain_id(chain_id))
}

pub fn signer_from_keystore(
    path: impl AsRef<Path>,
    password: &str,
    chain_id: ChainId,
) -> WalletResult<LocalWallet> {
    Ok(keystore::decrypt_key(path, password)?.with_chain_id(chain_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_parse_private_key() {
        let with_prefix = parse_private_key(KEY).unwrap();
        let without = parse_private_key(&KEY[2..]).unwrap();
        assert_eq!(with_prefix, without);
        assert!(parse_private_key("0x1234").is_err());
        assert!(parse_private_key("not hex").is_err());
    }

    #[test]
    fn test_signer_from_private_key() {
        let wallet = signer_from_private_key(KEY, 4).unwrap();
        assert_eq!(wallet.chain_id(), 4);
        assert_eq!(
            format!("{:?}", wallet.address()),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }
}
