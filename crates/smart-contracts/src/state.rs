// smart-contracts/src/state.rs

use crate::{vm::CallContext, ContractError, ContractResult};
use chain_core::{Address, Bytes, U256};
use std::collections::HashMap;
use std::fmt;

/// A contract implemented natively. Calls arrive as raw calldata and
/// return ABI-encoded output or a revert.
pub trait NativeContract: Send + Sync {
    /// Artifact name the contract was deployed from
    fn name(&self) -> &'static str;

    /// Handle one call
    fn execute(&mut self, ctx: &mut CallContext<'_>, input: &[u8]) -> ContractResult<Bytes>;

    fn box_clone(&self) -> Box<dyn NativeContract>;
}

impl Clone for Box<dyn NativeContract> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

/// Externally owned or contract account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub balance: U256,
    pub nonce: u64,
}

/// Balances, nonces, code and live contract instances
#[derive(Clone, Default)]
pub struct WorldState {
    /// Account balances and nonces
    accounts: HashMap<Address, Account>,
    /// Deployed code by address
    code: HashMap<Address, Bytes>,
    /// Contract instances; an entry is absent while that contract is executing
    contracts: HashMap<Address, Box<dyn NativeContract>>,
}

impl WorldState {
    /// Create new world state
    pub fn new() -> Self {
        Self::default()
    }

    pub fn account(&self, address: &Address) -> Account {
        self.accounts.get(address).cloned().unwrap_or_default()
    }

    pub fn exists(&self, address: &Address) -> bool {
        self.accounts.contains_key(address) || self.code.contains_key(address)
    }

    /// Get account balance
    pub fn balance(&self, address: &Address) -> U256 {
        self.accounts.get(address).map(|a| a.balance).unwrap_or_default()
    }

    pub fn set_balance(&mut self, address: Address, balance: U256) {
        self.accounts.entry(address).or_default().balance = balance;
    }

    /// Get account nonce
    pub fn nonce(&self, address: &Address) -> u64 {
        self.accounts.get(address).map(|a| a.nonce).unwrap_or(0)
    }

    pub fn increment_nonce(&mut self, address: &Address) {
        self.accounts.entry(*address).or_default().nonce += 1;
    }

    /// Add to balance
    pub fn credit(&mut self, address: Address, amount: U256) {
        let account = self.accounts.entry(address).or_default();
        account.balance = account.balance.saturating_add(amount);
    }

    /// Subtract from balance
    pub fn debit(&mut self, address: Address, amount: U256) -> ContractResult<()> {
        let available = self.balance(&address);
        if available < amount {
            return Err(ContractError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        self.accounts.entry(address).or_default().balance = available - amount;
        Ok(())
    }

    /// Transfer value between accounts
    pub fn transfer(&mut self, from: Address, to: Address, amount: U256) -> ContractResult<()> {
        if amount.is_zero() {
            return Ok(());
        }
        self.debit(from, amount)?;
        self.credit(to, amount);
        Ok(())
    }

    /// Get contract code (empty for externally owned accounts)
    pub fn code(&self, address: &Address) -> Bytes {
        self.code.get(address).cloned().unwrap_or_default()
    }

    pub fn is_contract(&self, address: &Address) -> bool {
        self.code.contains_key(address)
    }

    /// Install a freshly constructed contract
    pub fn install(
        &mut self,
        address: Address,
        code: Bytes,
        contract: Box<dyn NativeContract>,
    ) -> ContractResult<()> {
        if self.code.contains_key(&address) {
            return Err(ContractError::DeploymentFailed(format!(
                "contract already exists at {:?}",
                address
            )));
        }
        self.accounts.entry(address).or_default().nonce = 1;
        self.code.insert(address, code);
        self.contracts.insert(address, contract);
        Ok(())
    }

    /// Take a contract out for execution
    pub(crate) fn take_contract(&mut self, address: &Address) -> Option<Box<dyn NativeContract>> {
        self.contracts.remove(address)
    }

    pub(crate) fn restore_contract(&mut self, address: Address, contract: Box<dyn NativeContract>) {
        self.contracts.insert(address, contract);
    }

    /// Name of the contract deployed at `address`
    pub fn contract_name(&self, address: &Address) -> Option<&'static str> {
        self.contracts.get(address).map(|c| c.name())
    }

    pub fn contract_count(&self) -> usize {
        self.code.len()
    }
}

impl fmt::Debug for WorldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldState")
            .field("accounts", &self.accounts.len())
            .field("contracts", &self.code.len())
            .finish()
    }
}
