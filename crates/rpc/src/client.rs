// rpc/src/client.rs
use crate::{RpcErrorResponse, RpcRequest, RpcResponse, EXECUTION_REVERTED};
use async_trait::async_trait;
use chain_core::{
    types::quantity, Address, Block, BlockNumber, Bytes, ChainError, ChainId, ChainResult, Log,
    LogFilter, LogSubscription, Provider, TransactionReceipt, TransactionRequest, H256, U256,
};
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_signers::{LocalWallet, Signer};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_millis(4000);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON-RPC provider. Transactions from the configured signer are signed
/// locally and sent raw; anything else goes through `eth_sendTransaction`.
#[derive(Clone)]
pub struct RpcClient {
    url: String,
    http: reqwest::Client,
    signer: Option<LocalWallet>,
    next_id: Arc<AtomicU64>,
    polling_interval: Duration,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> ChainResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            http,
            signer: None,
            next_id: Arc::new(AtomicU64::new(1)),
            polling_interval: DEFAULT_POLLING_INTERVAL,
        })
    }

    pub fn with_signer(mut self, signer: LocalWallet) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn signer_address(&self) -> Option<Address> {
        self.signer.as_ref().map(|s| s.address())
    }

    /// Send one JSON-RPC request and decode its result
    pub async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> ChainResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(method, id, "RPC call");

        let response: RpcResponse = self
            .http
            .post(&self.url)
            .json(&RpcRequest::new(method, params, id))
            .send()
            .await
            .map_err(|e| ChainError::Transport(format!("{method}: {e}")))?
            .json()
            .await
            .map_err(|e| ChainError::Transport(format!("{method}: {e}")))?;

        if let Some(error) = response.error {
            return Err(chain_error(error));
        }
        serde_json::from_value(response.result.unwrap_or(Value::Null))
            .map_err(|e| ChainError::Transport(format!("invalid {method} response: {e}")))
    }

    async fn request_quantity(&self, method: &str, params: Value) -> ChainResult<u64> {
        let raw: String = self.request(method, params).await?;
        quantity::parse(&raw).map_err(ChainError::Transport)
    }

    async fn send_signed(&self, signer: &LocalWallet, tx: TransactionRequest) -> ChainResult<H256> {
        let from = signer.address();
        let chain_id = self.chain_id().await?;
        let nonce = match tx.nonce {
            Some(nonce) => nonce,
            None => U256::from(
                self.request_quantity("eth_getTransactionCount", json!([from, "pending"]))
                    .await?,
            ),
        };
        let gas_price = match tx.gas_price {
            Some(price) => price,
            None => self.request("eth_gasPrice", json!([])).await?,
        };
        let gas = match tx.gas {
            Some(gas) => gas,
            None => U256::from(
                self.request_quantity("eth_estimateGas", json!([tx.clone().from(from)]))
                    .await?,
            ),
        };

        let mut legacy = ethers_core::types::TransactionRequest::new()
            .from(from)
            .nonce(nonce)
            .gas(gas)
            .gas_price(gas_price)
            .value(tx.value_or_zero())
            .data(tx.data_or_empty())
            .chain_id(chain_id);
        if let Some(to) = tx.to {
            legacy = legacy.to(to);
        }
        let typed = TypedTransaction::Legacy(legacy);
        let signature = signer
            .sign_transaction(&typed)
            .await
            .map_err(|e| ChainError::Signer(e.to_string()))?;
        let raw = typed.rlp_signed(&signature);

        tracing::debug!(?from, %nonce, "Sending signed transaction");
        self.request("eth_sendRawTransaction", json!([raw])).await
    }
}

/// Map a JSON-RPC error object onto `ChainError`
fn chain_error(error: RpcErrorResponse) -> ChainError {
    let reverted = error.code == EXECUTION_REVERTED || error.message.starts_with("execution reverted");
    if !reverted {
        return ChainError::Rpc {
            code: error.code,
            message: error.message,
        };
    }

    let reason = error
        .message
        .strip_prefix("execution reverted")
        .map(|rest| rest.trim_start_matches(':').trim())
        .unwrap_or(&error.message)
        .to_string();
    let data = match &error.data {
        Some(Value::String(raw)) => raw.parse::<Bytes>().unwrap_or_default(),
        Some(Value::Object(object)) => object
            .get("data")
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse::<Bytes>().ok())
            .unwrap_or_default(),
        _ => Bytes::default(),
    };
    ChainError::Revert { reason, data }
}

#[async_trait]
impl Provider for RpcClient {
    async fn chain_id(&self) -> ChainResult<ChainId> {
        self.request_quantity("eth_chainId", json!([])).await
    }

    async fn block_number(&self) -> ChainResult<BlockNumber> {
        self.request_quantity("eth_blockNumber", json!([])).await
    }

    async fn get_block(&self, number: BlockNumber) -> ChainResult<Option<Block>> {
        self.request("eth_getBlockByNumber", json!([quantity::format(number), false]))
            .await
    }

    async fn accounts(&self) -> ChainResult<Vec<Address>> {
        match self.signer_address() {
            Some(address) => Ok(vec![address]),
            None => self.request("eth_accounts", json!([])).await,
        }
    }

    async fn get_balance(&self, address: Address) -> ChainResult<U256> {
        self.request("eth_getBalance", json!([address, "latest"])).await
    }

    async fn get_code(&self, address: Address) -> ChainResult<Bytes> {
        self.request("eth_getCode", json!([address, "latest"])).await
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> ChainResult<H256> {
        match &self.signer {
            Some(signer) if tx.from.map_or(true, |from| from == signer.address()) => {
                self.send_signed(signer, tx).await
            }
            _ => self.request("eth_sendTransaction", json!([tx])).await,
        }
    }

    async fn call(&self, tx: &TransactionRequest) -> ChainResult<Bytes> {
        self.request("eth_call", json!([tx, "latest"])).await
    }

    async fn get_transaction_receipt(&self, hash: H256) -> ChainResult<Option<TransactionReceipt>> {
        self.request("eth_getTransactionReceipt", json!([hash])).await
    }

    async fn get_logs(&self, filter: &LogFilter) -> ChainResult<Vec<Log>> {
        self.request("eth_getLogs", json!([filter.to_json()])).await
    }

    async fn subscribe_logs(&self, filter: LogFilter) -> ChainResult<LogSubscription> {
        let (sender, subscription) = LogSubscription::channel();
        let client = self.clone();
        let mut next = self.block_number().await? + 1;

        tokio::spawn(async move {
            loop {
                tokio::time::sleep(client.polling_interval).await;
                if sender.is_closed() {
                    break;
                }
                let head = match client.block_number().await {
                    Ok(head) => head,
                    Err(e) => {
                        tracing::warn!("Log polling failed: {}", e);
                        continue;
                    }
                };
                if head < next {
                    continue;
                }
                let range = filter.clone().from_block(next).to_block(head);
                match client.get_logs(&range).await {
                    Ok(logs) => {
                        for log in logs {
                            if sender.send(log).is_err() {
                                return;
                            }
                        }
                        next = head + 1;
                    }
                    Err(e) => tracing::warn!("Log polling failed: {}", e),
                }
            }
        });
        Ok(subscription)
    }

    async fn increase_time(&self, seconds: u64) -> ChainResult<u64> {
        let offset: Value = self.request("evm_increaseTime", json!([seconds])).await?;
        match offset {
            Value::Number(n) => n
                .as_u64()
                .ok_or_else(|| ChainError::Transport(format!("invalid time offset {n}"))),
            Value::String(raw) => quantity::parse(&raw).map_err(ChainError::Transport),
            other => Err(ChainError::Transport(format!("invalid time offset {other}"))),
        }
    }

    async fn mine(&self) -> ChainResult<BlockNumber> {
        let _: Value = self.request("evm_mine", json!([])).await?;
        self.block_number().await
    }

    fn polling_interval(&self) -> Duration {
        self.polling_interval
    }
}
