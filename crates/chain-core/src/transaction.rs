// chain-core/src/transaction.rs
use crate::{log::Log, types::quantity, Address, Bytes, Gas, H256, U256};
use serde::{Deserialize, Serialize};

/// Transaction or call parameters, in the `eth_sendTransaction` shape
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    /// Sender (an unlocked or locally signed account)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Recipient (None for contract creation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    /// Gas limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<U256>,
    /// Gas price in wei
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<U256>,
    /// Value in wei
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    /// Calldata or init code
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "input")]
    pub data: Option<Bytes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<U256>,
}

impl TransactionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn to(mut self, to: Address) -> Self {
        self.to = Some(to);
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    pub fn data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn gas(mut self, gas: Gas) -> Self {
        self.gas = Some(U256::from(gas));
        self
    }

    pub fn gas_price(mut self, gas_price: U256) -> Self {
        self.gas_price = Some(gas_price);
        self
    }

    /// Check if this is a contract deployment
    pub fn is_deployment(&self) -> bool {
        self.to.is_none()
    }

    pub fn value_or_zero(&self) -> U256 {
        self.value.unwrap_or_default()
    }

    pub fn data_or_empty(&self) -> Bytes {
        self.data.clone().unwrap_or_default()
    }
}

/// Receipt of a mined transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: H256,
    #[serde(with = "quantity")]
    pub transaction_index: u64,
    pub block_hash: H256,
    #[serde(with = "quantity")]
    pub block_number: u64,
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    /// Address of the created contract (deployments only)
    #[serde(default)]
    pub contract_address: Option<Address>,
    #[serde(with = "quantity")]
    pub gas_used: Gas,
    #[serde(default)]
    pub effective_gas_price: U256,
    /// 1 for success, 0 for failure
    #[serde(with = "quantity")]
    pub status: u64,
    #[serde(default)]
    pub logs: Vec<Log>,
}

impl TransactionReceipt {
    /// Total fee paid by the sender (`gas_used * effective_gas_price`)
    pub fn gas_cost(&self) -> U256 {
        U256::from(self.gas_used) * self.effective_gas_price
    }

    pub fn succeeded(&self) -> bool {
        self.status == 1
    }
}
