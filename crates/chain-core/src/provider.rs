// chain-core/src/provider.rs
use crate::{
    Address, Block, BlockNumber, Bytes, ChainResult, ChainId, Log, LogFilter, LogSubscription,
    TransactionReceipt, TransactionRequest, H256, U256,
};
use async_trait::async_trait;
use std::time::Duration;

/// Access to a chain, either the in-process development chain or a
/// node reached over JSON-RPC
#[async_trait]
pub trait Provider: Send + Sync {
    async fn chain_id(&self) -> ChainResult<ChainId>;

    async fn block_number(&self) -> ChainResult<BlockNumber>;

    async fn get_block(&self, number: BlockNumber) -> ChainResult<Option<Block>>;

    /// Accounts the provider can send from
    async fn accounts(&self) -> ChainResult<Vec<Address>>;

    async fn get_balance(&self, address: Address) -> ChainResult<U256>;

    async fn get_code(&self, address: Address) -> ChainResult<Bytes>;

    /// Submit a transaction and return its hash
    async fn send_transaction(&self, tx: TransactionRequest) -> ChainResult<H256>;

    /// Execute a read-only call against the pending state
    async fn call(&self, tx: &TransactionRequest) -> ChainResult<Bytes>;

    async fn get_transaction_receipt(&self, hash: H256) -> ChainResult<Option<TransactionReceipt>>;

    async fn get_logs(&self, filter: &LogFilter) -> ChainResult<Vec<Log>>;

    /// Register a listener for logs matching `filter`. Only logs mined
    /// after registration are delivered.
    async fn subscribe_logs(&self, filter: LogFilter) -> ChainResult<LogSubscription>;

    /// Advance the clock used for the next block timestamp
    async fn increase_time(&self, seconds: u64) -> ChainResult<u64>;

    /// Mine an empty block
    async fn mine(&self) -> ChainResult<BlockNumber>;

    /// Interval between receipt/log polls
    fn polling_interval(&self) -> Duration {
        Duration::from_millis(4000)
    }
}
