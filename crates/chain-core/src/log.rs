// chain-core/src/log.rs
use crate::{types::quantity, Address, BlockNumber, Bytes, ChainError, ChainResult, H256};
use ethers_core::utils::keccak256;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Event log emitted by a contract and included in a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    /// Contract address that emitted the log
    pub address: Address,
    /// Topics (event signature followed by indexed parameters)
    pub topics: Vec<H256>,
    /// Data (non-indexed parameters)
    pub data: Bytes,
    #[serde(with = "quantity")]
    pub block_number: BlockNumber,
    pub transaction_hash: H256,
    #[serde(with = "quantity")]
    pub log_index: u64,
}

/// Selection criteria for logs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    pub address: Option<Address>,
    /// Positional topic constraints; `None` matches anything
    pub topics: Vec<Option<H256>>,
    pub from_block: Option<BlockNumber>,
    pub to_block: Option<BlockNumber>,
}

impl LogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Constrain topic 0 to the hash of an event signature such as
    /// `WinnerPicked(address)`
    pub fn event(self, signature: &str) -> Self {
        self.topic(0, H256::from(keccak256(signature.as_bytes())))
    }

    pub fn topic(mut self, position: usize, topic: H256) -> Self {
        if self.topics.len() <= position {
            self.topics.resize(position + 1, None);
        }
        self.topics[position] = Some(topic);
        self
    }

    pub fn from_block(mut self, block: BlockNumber) -> Self {
        self.from_block = Some(block);
        self
    }

    pub fn to_block(mut self, block: BlockNumber) -> Self {
        self.to_block = Some(block);
        self
    }

    pub fn matches(&self, log: &Log) -> bool {
        if let Some(address) = self.address {
            if log.address != address {
                return false;
            }
        }
        if let Some(from) = self.from_block {
            if log.block_number < from {
                return false;
            }
        }
        if let Some(to) = self.to_block {
            if log.block_number > to {
                return false;
            }
        }
        self.topics.iter().enumerate().all(|(i, wanted)| match wanted {
            Some(topic) => log.topics.get(i) == Some(topic),
            None => true,
        })
    }

    /// Encode as an `eth_getLogs` filter object
    pub fn to_json(&self) -> Value {
        let mut object = serde_json::Map::new();
        if let Some(address) = self.address {
            object.insert("address".into(), json!(address));
        }
        object.insert(
            "fromBlock".into(),
            json!(self.from_block.map(quantity::format).unwrap_or_else(|| "earliest".into())),
        );
        object.insert(
            "toBlock".into(),
            json!(self.to_block.map(quantity::format).unwrap_or_else(|| "latest".into())),
        );
        if !self.topics.is_empty() {
            object.insert("topics".into(), json!(self.topics));
        }
        Value::Object(object)
    }

    /// Decode an `eth_getLogs` filter object; block tags resolve against `latest`
    pub fn from_json(value: &Value, latest: BlockNumber) -> ChainResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| ChainError::InvalidParams("filter must be an object".into()))?;

        let address = match object.get("address") {
            None | Some(Value::Null) => None,
            Some(Value::String(raw)) => Some(
                raw.parse::<Address>()
                    .map_err(|e| ChainError::InvalidParams(format!("invalid address {raw}: {e}")))?,
            ),
            Some(other) => {
                return Err(ChainError::InvalidParams(format!("unsupported address filter {other}")))
            }
        };

        let block = |key: &str| -> ChainResult<Option<BlockNumber>> {
            match object.get(key).and_then(Value::as_str) {
                None | Some("earliest") if key == "fromBlock" => Ok(None),
                None | Some("latest") | Some("pending") if key == "toBlock" => Ok(None),
                Some("latest") | Some("pending") => Ok(Some(latest)),
                Some("earliest") => Ok(Some(0)),
                None => Ok(None),
                Some(raw) => quantity::parse(raw).map(Some).map_err(ChainError::InvalidParams),
            }
        };

        let topics = match object.get("topics") {
            None | Some(Value::Null) => Vec::new(),
            Some(raw) => serde_json::from_value::<Vec<Option<H256>>>(raw.clone())
                .map_err(|e| ChainError::InvalidParams(format!("invalid topics: {e}")))?,
        };

        Ok(Self {
            address,
            topics,
            from_block: block("fromBlock")?,
            to_block: block("toBlock")?,
        })
    }
}

/// Stream of logs matching a filter, in emission order
#[derive(Debug)]
pub struct LogSubscription {
    receiver: mpsc::UnboundedReceiver<Log>,
}

impl LogSubscription {
    /// Create a connected sender/subscription pair
    pub fn channel() -> (mpsc::UnboundedSender<Log>, Self) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (sender, Self { receiver })
    }

    /// Next matching log; `None` once the source is gone
    pub async fn next(&mut self) -> Option<Log> {
        self.receiver.recv().await
    }
}

impl futures::Stream for LogSubscription {
    type Item = Log;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Log>> {
        self.receiver.poll_recv(cx)
    }
}
