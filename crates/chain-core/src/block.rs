// chain-core/src/block.rs
use crate::{types::quantity, BlockNumber, Gas, Timestamp, H256};
use ethers_core::utils::keccak256;
use serde::{Deserialize, Serialize};

/// A mined block, in the `eth_getBlockByNumber(_, false)` shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Block number/height
    #[serde(with = "quantity")]
    pub number: BlockNumber,
    pub hash: H256,
    /// Hash of previous block
    pub parent_hash: H256,
    /// Block timestamp
    #[serde(with = "quantity")]
    pub timestamp: Timestamp,
    /// Gas used by all transactions
    #[serde(with = "quantity")]
    pub gas_used: Gas,
    /// Hashes of included transactions
    #[serde(default)]
    pub transactions: Vec<H256>,
}

impl Block {
    /// Seal a block, deriving its hash from the header fields
    pub fn new(
        number: BlockNumber,
        parent_hash: H256,
        timestamp: Timestamp,
        transactions: Vec<H256>,
        gas_used: Gas,
    ) -> Self {
        let mut preimage = Vec::with_capacity(48 + transactions.len() * 32);
        preimage.extend_from_slice(&number.to_be_bytes());
        preimage.extend_from_slice(parent_hash.as_bytes());
        preimage.extend_from_slice(&timestamp.to_be_bytes());
        preimage.extend_from_slice(&gas_used.to_be_bytes());
        for tx in &transactions {
            preimage.extend_from_slice(tx.as_bytes());
        }

        Self {
            number,
            hash: H256::from(keccak256(&preimage)),
            parent_hash,
            timestamp,
            gas_used,
            transactions,
        }
    }

    /// Create genesis block
    pub fn genesis(timestamp: Timestamp) -> Self {
        Self::new(0, H256::zero(), timestamp, Vec::new(), 0)
    }

    pub fn is_genesis(&self) -> bool {
        self.number == 0
    }
}
