// smart-contracts/src/gas.rs

//! Ethereum-like gas schedule for native contracts. Only the operations
//! native contracts actually perform are priced.

use crate::{ContractError, ContractResult};
use chain_core::{Gas, U256};
use serde::{Deserialize, Serialize};

/// Post-Berlin mainnet prices, cold access everywhere
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasSchedule {
    pub transaction: Gas,
    pub creation: Gas,
    pub calldata_zero_byte: Gas,
    pub calldata_byte: Gas,
    /// Per byte of code stored by a deployment
    pub code_deposit_byte: Gas,
    pub sload: Gas,
    /// Zero slot to non-zero
    pub sstore_set: Gas,
    /// Non-zero slot to another value
    pub sstore_reset: Gas,
    /// Refunded when a non-zero slot is cleared
    pub sstore_clear_refund: Gas,
    pub call: Gas,
    pub call_value: Gas,
    /// Value sent to an account that does not exist yet
    pub call_new_account: Gas,
    pub log: Gas,
    pub log_topic: Gas,
    pub log_data_byte: Gas,
}

impl Default for GasSchedule {
    fn default() -> Self {
        Self {
            transaction: 21_000,
            creation: 32_000,
            calldata_zero_byte: 4,
            calldata_byte: 16,
            code_deposit_byte: 200,
            sload: 2_100,
            sstore_set: 20_000,
            sstore_reset: 2_900,
            sstore_clear_refund: 4_800,
            call: 2_600,
            call_value: 9_000,
            call_new_account: 25_000,
            log: 375,
            log_topic: 375,
            log_data_byte: 8,
        }
    }
}

impl GasSchedule {
    /// Charged before execution starts
    pub fn intrinsic(&self, is_deployment: bool, data: &[u8]) -> Gas {
        let calldata: Gas = data
            .iter()
            .map(|byte| match byte {
                0 => self.calldata_zero_byte,
                _ => self.calldata_byte,
            })
            .sum();
        let creation = if is_deployment { self.creation } else { 0 };
        self.transaction + creation + calldata
    }

    pub fn code_deposit(&self, code_len: usize) -> Gas {
        code_len as Gas * self.code_deposit_byte
    }

    /// `(cost, refund)` of writing `new` over `current`
    pub fn sstore(&self, current: U256, new: U256) -> (Gas, Gas) {
        if current == new {
            return (self.sload, 0);
        }
        match (current.is_zero(), new.is_zero()) {
            (true, _) => (self.sstore_set, 0),
            (false, true) => (self.sstore_reset, self.sstore_clear_refund),
            (false, false) => (self.sstore_reset, 0),
        }
    }

    pub fn call(&self, value: U256, target_exists: bool) -> Gas {
        match (value.is_zero(), target_exists) {
            (true, _) => self.call,
            (false, true) => self.call + self.call_value,
            (false, false) => self.call + self.call_value + self.call_new_account,
        }
    }

    pub fn log(&self, topics: usize, data_len: usize) -> Gas {
        self.log + topics as Gas * self.log_topic + data_len as Gas * self.log_data_byte
    }
}

/// Gas bookkeeping for one transaction
#[derive(Debug, Clone)]
pub struct GasMeter {
    limit: Gas,
    used: Gas,
    refund: Gas,
}

impl GasMeter {
    pub fn new(limit: Gas) -> Self {
        Self {
            limit,
            used: 0,
            refund: 0,
        }
    }

    /// Running past the limit burns everything
    pub fn charge(&mut self, amount: Gas) -> ContractResult<()> {
        match self.used.checked_add(amount) {
            Some(used) if used <= self.limit => {
                self.used = used;
                Ok(())
            }
            _ => {
                self.used = self.limit;
                Err(ContractError::OutOfGas)
            }
        }
    }

    pub fn add_refund(&mut self, amount: Gas) {
        self.refund += amount;
    }

    pub fn used(&self) -> Gas {
        self.used
    }

    pub fn remaining(&self) -> Gas {
        self.limit - self.used
    }

    /// Gas billed to the sender; refunds are capped at a fifth of the gas used
    pub fn billed(&self) -> Gas {
        self.used - self.refund.min(self.used / 5)
    }
}
