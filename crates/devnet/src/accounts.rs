// devnet/src/accounts.rs
use crate::{DevnetError, DevnetResult};
use chain_core::{Address, ChainId, H256};
use ethers_core::utils::keccak256;
use ethers_signers::{LocalWallet, Signer};

/// A pre-funded development account
#[derive(Debug, Clone)]
pub struct DevAccount {
    pub index: u32,
    pub address: Address,
    /// Raw secp256k1 secret key
    pub private_key: H256,
}

impl DevAccount {
    /// Derive account `index` as `keccak256("<seed>/<index>")`
    pub fn derive(seed: &str, index: u32) -> DevnetResult<Self> {
        let secret = keccak256(format!("{seed}/{index}").as_bytes());
        let wallet = LocalWallet::from_bytes(&secret).map_err(|e| DevnetError::AccountDerivation {
            index,
            reason: e.to_string(),
        })?;
        Ok(Self {
            index,
            address: wallet.address(),
            private_key: H256::from(secret),
        })
    }

    /// Signing wallet bound to `chain_id`
    pub fn wallet(&self, chain_id: ChainId) -> DevnetResult<LocalWallet> {
        LocalWallet::from_bytes(self.private_key.as_bytes())
            .map(|wallet| wallet.with_chain_id(chain_id))
            .map_err(|e| DevnetError::AccountDerivation {
                index: self.index,
                reason: e.to_string(),
            })
    }

    pub fn private_key_hex(&self) -> String {
        format!("0x{}", hex::encode(self.private_key.as_bytes()))
    }
}

/// The ordered set of unlocked accounts
#[derive(Debug, Clone)]
pub struct DevAccounts {
    accounts: Vec<DevAccount>,
}

impl DevAccounts {
    pub fn derive(seed: &str, count: u32) -> DevnetResult<Self> {
        let accounts = (0..count)
            .map(|index| DevAccount::derive(seed, index))
            .collect::<DevnetResult<Vec<_>>>()?;
        Ok(Self { accounts })
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.accounts.iter().map(|a| a.address).collect()
    }

    pub fn get(&self, index: usize) -> Option<&DevAccount> {
        self.accounts.get(index)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.accounts.iter().any(|a| a.address == *address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DevAccount> {
        self.accounts.iter()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SEED;

    #[test]
    fn test_derivation_is_deterministic() {
        let a = DevAccounts::derive(DEFAULT_SEED, 3).unwrap();
        let b = DevAccounts::derive(DEFAULT_SEED, 3).unwrap();
        assert_eq!(a.addresses(), b.addresses());
        assert_eq!(a.len(), 3);

        let addresses = a.addresses();
        assert_ne!(addresses[0], addresses[1]);
        assert_ne!(addresses[1], addresses[2]);
    }

    #[test]
    fn test_wallet_matches_address() {
        let account = DevAccount::derive(DEFAULT_SEED, 0).unwrap();
        let wallet = account.wallet(31337).unwrap();
        assert_eq!(wallet.address(), account.address);
        assert_eq!(wallet.chain_id(), 31337);
        assert_eq!(account.private_key_hex().len(), 66);
    }

    #[test]
    fn test_different_seed_different_accounts() {
        let a = DevAccount::derive(DEFAULT_SEED, 0).unwrap();
        let b = DevAccount::derive("another seed", 0).unwrap();
        assert_ne!(a.address, b.address);
    }
}
