// rpc/src/methods.rs
use crate::{BlockTag, RpcError, RpcResult};
use chain_core::{types::quantity, Address, Bytes, LogFilter, Provider, TransactionRequest, H256, U256};
use devnet::Devnet;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;

/// Client version reported by `web3_clientVersion`
pub const CLIENT_VERSION: &str = concat!("dapp-lab/", env!("CARGO_PKG_VERSION"));

pub struct RpcMethods {
    devnet: Arc<Devnet>,
}

impl RpcMethods {
    pub fn new(devnet: Arc<Devnet>) -> Self {
        Self { devnet }
    }

    pub async fn handle(&self, method: &str, params: Value) -> RpcResult<Value> {
        match method {
            // Chain metadata
            "eth_chainId" => self.eth_chain_id().await,
            "net_version" => self.net_version().await,
            "web3_clientVersion" => Ok(json!(CLIENT_VERSION)),
            "eth_gasPrice" => Ok(json!(self.devnet.gas_price())),

            // Blocks and accounts
            "eth_blockNumber" => self.eth_block_number().await,
            "eth_getBlockByNumber" => self.eth_get_block_by_number(params).await,
            "eth_getBlockByHash" => self.eth_get_block_by_hash(params).await,
            "eth_accounts" => to_json(self.devnet.accounts().await?),
            "eth_getBalance" => self.eth_get_balance(params).await,
            "eth_getCode" => self.eth_get_code(params).await,
            "eth_getTransactionCount" => self.eth_get_transaction_count(params).await,

            // Transactions
            "eth_sendTransaction" => self.eth_send_transaction(params).await,
            "eth_sendRawTransaction" => self.eth_send_raw_transaction(params).await,
            "eth_call" => self.eth_call(params).await,
            "eth_estimateGas" => self.eth_estimate_gas(params).await,
            "eth_getTransactionReceipt" => self.eth_get_transaction_receipt(params).await,
            "eth_getLogs" => self.eth_get_logs(params).await,

            // Development helpers
            "evm_increaseTime" => self.evm_increase_time(params).await,
            "evm_mine" => self.evm_mine().await,
            "evm_snapshot" => Ok(json!(quantity::format(self.devnet.snapshot().await))),
            "evm_revert" => self.evm_revert(params).await,
            "hardhat_setBalance" => self.hardhat_set_balance(params).await,

            _ => Err(RpcError::MethodNotFound(method.to_string())),
        }
    }

    // ==================== CHAIN METADATA ====================

    async fn eth_chain_id(&self) -> RpcResult<Value> {
        let chain_id = self.devnet.chain_id().await?;
        Ok(json!(quantity::format(chain_id)))
    }

    async fn net_version(&self) -> RpcResult<Value> {
        let chain_id = self.devnet.chain_id().await?;
        Ok(json!(chain_id.to_string()))
    }

    // ==================== BLOCKS AND ACCOUNTS ====================

    async fn eth_block_number(&self) -> RpcResult<Value> {
        let number = self.devnet.block_number().await?;
        Ok(json!(quantity::format(number)))
    }

    async fn eth_get_block_by_number(&self, params: Value) -> RpcResult<Value> {
        let params = positional(params)?;
        let tag: String = param(&params, 0, "block number")?;
        let tag = BlockTag::parse(&tag).map_err(RpcError::InvalidParams)?;
        let latest = self.devnet.block_number().await?;
        let block = self.devnet.get_block(tag.resolve(latest)).await?;
        to_json(block)
    }

    async fn eth_get_block_by_hash(&self, params: Value) -> RpcResult<Value> {
        let params = positional(params)?;
        let hash: H256 = param(&params, 0, "block hash")?;
        to_json(self.devnet.get_block_by_hash(hash).await)
    }

    async fn eth_get_balance(&self, params: Value) -> RpcResult<Value> {
        let params = positional(params)?;
        let address: Address = param(&params, 0, "address")?;
        to_json(self.devnet.get_balance(address).await?)
    }

    async fn eth_get_code(&self, params: Value) -> RpcResult<Value> {
        let params = positional(params)?;
        let address: Address = param(&params, 0, "address")?;
        to_json(self.devnet.get_code(address).await?)
    }

    async fn eth_get_transaction_count(&self, params: Value) -> RpcResult<Value> {
        let params = positional(params)?;
        let address: Address = param(&params, 0, "address")?;
        let count = self.devnet.transaction_count(address).await;
        Ok(json!(quantity::format(count)))
    }

    // ==================== TRANSACTIONS ====================

    async fn eth_send_transaction(&self, params: Value) -> RpcResult<Value> {
        let params = positional(params)?;
        let tx: TransactionRequest = param(&params, 0, "transaction")?;
        to_json(self.devnet.send_transaction(tx).await?)
    }

    async fn eth_send_raw_transaction(&self, params: Value) -> RpcResult<Value> {
        let params = positional(params)?;
        let raw: Bytes = param(&params, 0, "raw transaction")?;
        to_json(self.devnet.send_raw_transaction(&raw).await?)
    }

    async fn eth_call(&self, params: Value) -> RpcResult<Value> {
        let params = positional(params)?;
        let tx: TransactionRequest = param(&params, 0, "call")?;
        to_json(self.devnet.call(&tx).await?)
    }

    async fn eth_estimate_gas(&self, params: Value) -> RpcResult<Value> {
        let params = positional(params)?;
        let tx: TransactionRequest = param(&params, 0, "transaction")?;
        let gas = self.devnet.estimate_gas(&tx).await?;
        Ok(json!(quantity::format(gas)))
    }

    async fn eth_get_transaction_receipt(&self, params: Value) -> RpcResult<Value> {
        let params = positional(params)?;
        let hash: H256 = param(&params, 0, "transaction hash")?;
        to_json(self.devnet.get_transaction_receipt(hash).await?)
    }

    async fn eth_get_logs(&self, params: Value) -> RpcResult<Value> {
        let params = positional(params)?;
        let raw = params
            .first()
            .ok_or_else(|| RpcError::InvalidParams("Expected filter object".into()))?;
        let latest = self.devnet.block_number().await?;
        let filter = LogFilter::from_json(raw, latest)?;
        to_json(self.devnet.get_logs(&filter).await?)
    }

    // ==================== DEVELOPMENT HELPERS ====================

    async fn evm_increase_time(&self, params: Value) -> RpcResult<Value> {
        let params = positional(params)?;
        let seconds = match params.first() {
            Some(Value::Number(n)) => n
                .as_u64()
                .ok_or_else(|| RpcError::InvalidParams("Expected non-negative seconds".into()))?,
            Some(Value::String(raw)) => quantity::parse(raw).map_err(RpcError::InvalidParams)?,
            _ => return Err(RpcError::InvalidParams("Expected seconds".into())),
        };
        let offset = self.devnet.increase_time(seconds).await?;
        Ok(json!(offset))
    }

    async fn evm_mine(&self) -> RpcResult<Value> {
        self.devnet.mine().await?;
        Ok(json!("0x0"))
    }

    async fn evm_revert(&self, params: Value) -> RpcResult<Value> {
        let params = positional(params)?;
        let id: String = param(&params, 0, "snapshot id")?;
        let id = quantity::parse(&id).map_err(RpcError::InvalidParams)?;
        Ok(json!(self.devnet.revert(id).await))
    }

    async fn hardhat_set_balance(&self, params: Value) -> RpcResult<Value> {
        let params = positional(params)?;
        let address: Address = param(&params, 0, "address")?;
        let balance: U256 = param(&params, 1, "balance")?;
        self.devnet.set_balance(address, balance).await;
        Ok(json!(true))
    }
}

/// Params as a positional array; a missing `params` reads as empty
fn positional(params: Value) -> RpcResult<Vec<Value>> {
    match params {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items),
        _ => Err(RpcError::InvalidParams("Expected array".into())),
    }
}

fn param<T: DeserializeOwned>(params: &[Value], index: usize, what: &str) -> RpcResult<T> {
    let raw = params
        .get(index)
        .ok_or_else(|| RpcError::InvalidParams(format!("Expected {what}")))?;
    serde_json::from_value(raw.clone())
        .map_err(|e| RpcError::InvalidParams(format!("Invalid {what}: {e}")))
}

fn to_json<T: serde::Serialize>(value: T) -> RpcResult<Value> {
    serde_json::to_value(value).map_err(|e| RpcError::InternalError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn methods() -> RpcMethods {
        RpcMethods::new(Arc::new(Devnet::builtin().unwrap()))
    }

    #[tokio::test]
    async fn test_chain_metadata() {
        let methods = methods();
        assert_eq!(methods.handle("eth_chainId", Value::Null).await.unwrap(), json!("0x7a69"));
        assert_eq!(methods.handle("net_version", json!([])).await.unwrap(), json!("31337"));
        assert_eq!(methods.handle("eth_blockNumber", json!([])).await.unwrap(), json!("0x0"));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let err = methods().handle("eth_mining", json!([])).await.unwrap_err();
        assert!(matches!(err, RpcError::MethodNotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_params() {
        let methods = methods();
        let err = methods.handle("eth_getBalance", json!({})).await.unwrap_err();
        assert_eq!(err.code(), -32602);
        let err = methods.handle("eth_getBalance", json!(["nope"])).await.unwrap_err();
        assert_eq!(err.code(), -32602);
    }

    #[tokio::test]
    async fn test_increase_time_and_mine() {
        let methods = methods();
        assert_eq!(methods.handle("evm_increaseTime", json!([60])).await.unwrap(), json!(60));
        assert_eq!(methods.handle("evm_increaseTime", json!(["0x3c"])).await.unwrap(), json!(120));
        methods.handle("evm_mine", json!([])).await.unwrap();
        assert_eq!(methods.handle("eth_blockNumber", json!([])).await.unwrap(), json!("0x1"));
    }

    #[tokio::test]
    async fn test_increase_time_out_of_range() {
        let methods = methods();
        let err = methods
            .handle("evm_increaseTime", json!([u64::MAX]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), -32602);

        // the chain keeps working afterwards
        methods.handle("evm_mine", json!([])).await.unwrap();
        assert_eq!(methods.handle("eth_blockNumber", json!([])).await.unwrap(), json!("0x1"));
    }

    #[tokio::test]
    async fn test_send_transaction_and_receipt() {
        let methods = methods();
        let accounts = methods.handle("eth_accounts", json!([])).await.unwrap();
        let hash = methods
            .handle(
                "eth_sendTransaction",
                json!([{ "from": accounts[0], "to": accounts[1], "value": "0xde0b6b3a7640000" }]),
            )
            .await
            .unwrap();
        let receipt = methods
            .handle("eth_getTransactionReceipt", json!([hash]))
            .await
            .unwrap();
        assert_eq!(receipt["status"], "0x1");
        assert_eq!(receipt["gasUsed"], "0x5208");
    }
}
