// devnet/src/chain.rs
use crate::{accounts::DevAccounts, config::DevnetConfig};
use chain_core::{
    Address, Block, BlockNumber, ChainError, ChainId, ChainResult, Gas, Log, LogFilter, Timestamp,
    TransactionReceipt, H256, U256,
};
use smart_contracts::{BlockEnv, LogEntry, WorldState};
use std::collections::HashMap;

/// Outcome of one transaction, ready to be sealed into a block
#[derive(Debug, Clone)]
pub struct TxOutcome {
    pub hash: H256,
    pub from: Address,
    pub to: Option<Address>,
    pub contract_address: Option<Address>,
    pub gas_used: Gas,
    pub gas_price: U256,
    /// 1 for success, 0 for failure
    pub status: u64,
    pub logs: Vec<LogEntry>,
}

/// Blocks, receipts, logs and world state of the development chain
#[derive(Clone)]
pub struct ChainState {
    /// Blocks indexed by number
    blocks: Vec<Block>,
    /// Transaction receipts by hash
    receipts: HashMap<H256, TransactionReceipt>,
    /// Every log in mining order
    logs: Vec<Log>,
    /// Balances, nonces and contracts
    pub world: WorldState,
    /// Total seconds added with `increase_time`
    time_offset: u64,
    /// Lower bound for the next block timestamp after a clock jump
    next_timestamp_floor: Option<Timestamp>,
}

impl ChainState {
    /// Genesis state with every development account funded
    pub fn genesis(config: &DevnetConfig, accounts: &DevAccounts) -> Self {
        let timestamp = config.genesis_timestamp.unwrap_or_else(wall_clock);
        let mut world = WorldState::new();
        for account in accounts.iter() {
            world.set_balance(account.address, config.initial_balance());
        }

        Self {
            blocks: vec![Block::genesis(timestamp)],
            receipts: HashMap::new(),
            logs: Vec::new(),
            world,
            time_offset: 0,
            next_timestamp_floor: None,
        }
    }

    /// Current chain head
    pub fn latest(&self) -> &Block {
        // genesis is inserted at construction and blocks are never removed
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn height(&self) -> BlockNumber {
        self.latest().number
    }

    pub fn block(&self, number: BlockNumber) -> Option<&Block> {
        self.blocks.get(number as usize)
    }

    pub fn receipt(&self, hash: &H256) -> Option<&TransactionReceipt> {
        self.receipts.get(hash)
    }

    /// Timestamp the next block will carry
    pub fn next_timestamp(&self) -> Timestamp {
        let now = wall_clock().saturating_add(self.time_offset);
        let floor = self.next_timestamp_floor.unwrap_or(0);
        now.max(self.latest().timestamp.saturating_add(1)).max(floor)
    }

    /// Execution environment of the next block
    pub fn next_env(&self, chain_id: ChainId) -> BlockEnv {
        BlockEnv {
            number: self.height() + 1,
            timestamp: self.next_timestamp(),
            chain_id,
        }
    }

    /// Jump the clock forward; returns the total offset. The clock must
    /// leave room for later blocks to keep increasing.
    pub fn increase_time(&mut self, seconds: u64) -> ChainResult<u64> {
        let base = self
            .next_timestamp_floor
            .unwrap_or_else(|| self.latest().timestamp);
        let out_of_range =
            || ChainError::InvalidParams(format!("cannot advance the clock by {seconds} seconds"));
        let offset = self.time_offset.checked_add(seconds).ok_or_else(out_of_range)?;
        let floor = base.checked_add(seconds).ok_or_else(out_of_range)?;
        let headroom = MAX_TIMESTAMP - wall_clock().min(MAX_TIMESTAMP);
        if offset > headroom || floor > MAX_TIMESTAMP {
            return Err(out_of_range());
        }
        self.time_offset = offset;
        self.next_timestamp_floor = Some(floor);
        Ok(offset)
    }

    /// Seal a block holding at most one transaction. Returns the logs
    /// the block produced.
    pub fn mine_block(&mut self, env: &BlockEnv, outcome: Option<TxOutcome>) -> Vec<Log> {
        let parent = self.latest().hash;
        let Some(outcome) = outcome else {
            self.blocks
                .push(Block::new(env.number, parent, env.timestamp, Vec::new(), 0));
            self.next_timestamp_floor = None;
            return Vec::new();
        };

        let block = Block::new(
            env.number,
            parent,
            env.timestamp,
            vec![outcome.hash],
            outcome.gas_used,
        );
        let logs: Vec<Log> = outcome
            .logs
            .into_iter()
            .enumerate()
            .map(|(index, entry)| Log {
                address: entry.address,
                topics: entry.topics,
                data: entry.data,
                block_number: env.number,
                transaction_hash: outcome.hash,
                log_index: index as u64,
            })
            .collect();

        let receipt = TransactionReceipt {
            transaction_hash: outcome.hash,
            transaction_index: 0,
            block_hash: block.hash,
            block_number: env.number,
            from: outcome.from,
            to: outcome.to,
            contract_address: outcome.contract_address,
            gas_used: outcome.gas_used,
            effective_gas_price: outcome.gas_price,
            status: outcome.status,
            logs: logs.clone(),
        };

        self.receipts.insert(outcome.hash, receipt);
        self.logs.extend(logs.iter().cloned());
        self.blocks.push(block);
        self.next_timestamp_floor = None;
        logs
    }

    /// Logs matching `filter`, in mining order
    pub fn logs(&self, filter: &LogFilter) -> Vec<Log> {
        self.logs
            .iter()
            .filter(|log| filter.matches(log))
            .cloned()
            .collect()
    }
}

/// Latest timestamp the clock may be moved to
const MAX_TIMESTAMP: Timestamp = u64::MAX / 2;

fn wall_clock() -> Timestamp {
    chrono::Utc::now().timestamp().max(0) as Timestamp
}
