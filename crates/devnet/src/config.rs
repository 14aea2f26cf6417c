// devnet/src/config.rs
use chain_core::{units, ChainId, Gas, U256};
use serde::{Deserialize, Serialize};

/// Chain id used by the local development network
pub const DEV_CHAIN_ID: ChainId = 31337;

/// Seed phrase the development accounts are derived from
pub const DEFAULT_SEED: &str = "test test test test test test test test test test test junk";

/// Development chain parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DevnetConfig {
    pub chain_id: ChainId,
    /// Number of pre-funded accounts
    pub accounts: u32,
    /// Initial balance of each account, in ether
    pub initial_balance_ether: u64,
    /// Gas price used when a transaction leaves it unset
    pub gas_price: U256,
    pub block_gas_limit: Gas,
    pub seed: String,
    /// Genesis timestamp; wall clock when unset
    pub genesis_timestamp: Option<u64>,
}

impl Default for DevnetConfig {
    fn default() -> Self {
        Self {
            chain_id: DEV_CHAIN_ID,
            accounts: 10,
            initial_balance_ether: 10_000,
            gas_price: units::gwei(1),
            block_gas_limit: 30_000_000,
            seed: DEFAULT_SEED.to_string(),
            genesis_timestamp: None,
        }
    }
}

impl DevnetConfig {
    pub fn initial_balance(&self) -> U256 {
        units::ether(self.initial_balance_ether)
    }

    pub fn validate(&self) -> crate::DevnetResult<()> {
        if self.accounts == 0 {
            return Err(crate::DevnetError::InvalidConfig(
                "at least one account is required".into(),
            ));
        }
        if self.block_gas_limit < 21_000 {
            return Err(crate::DevnetError::InvalidConfig(format!(
                "block gas limit {} is below the intrinsic transaction cost",
                self.block_gas_limit
            )));
        }
        Ok(())
    }
}
