// chain-core/src/pending.rs
use crate::{ChainError, ChainResult, Provider, TransactionReceipt, H256};
use std::sync::Arc;
use std::time::Duration;

/// A submitted transaction awaiting inclusion
pub struct PendingTransaction {
    hash: H256,
    provider: Arc<dyn Provider>,
}

impl PendingTransaction {
    pub fn new(hash: H256, provider: Arc<dyn Provider>) -> Self {
        Self { hash, provider }
    }

    pub fn hash(&self) -> H256 {
        self.hash
    }

    /// Wait until the transaction is mined and buried under
    /// `confirmations - 1` further blocks
    pub async fn wait(self, confirmations: u64, timeout: Duration) -> ChainResult<TransactionReceipt> {
        let confirmations = confirmations.max(1);
        let interval = self.provider.polling_interval();
        let hash = self.hash;

        let poll = async {
            loop {
                if let Some(receipt) = self.provider.get_transaction_receipt(hash).await? {
                    let head = self.provider.block_number().await?;
                    let depth = head.saturating_sub(receipt.block_number) + 1;
                    if depth >= confirmations {
                        return Ok::<_, ChainError>(receipt);
                    }
                    tracing::debug!(?hash, depth, confirmations, "Waiting for confirmations");
                }
                tokio::time::sleep(interval).await;
            }
        };

        tokio::time::timeout(timeout, poll).await.map_err(|_| {
            ChainError::Timeout(format!(
                "transaction {hash:?} not confirmed {confirmations} time(s) within {timeout:?}"
            ))
        })?
    }
}

impl std::fmt::Debug for PendingTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingTransaction").field("hash", &self.hash).finish()
    }
}
