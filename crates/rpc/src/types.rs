// rpc/src/types.rs
use chain_core::{types::quantity, BlockNumber};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    pub id: serde_json::Value,
}

impl RpcRequest {
    pub fn new(method: &str, params: serde_json::Value, id: u64) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
            id: serde_json::json!(id),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorResponse>,
    pub id: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorResponse {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Block selector accepted by `eth_getBlockByNumber` and friends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Earliest,
    Latest,
    Pending,
    Number(BlockNumber),
}

impl BlockTag {
    pub fn parse(raw: &str) -> Result<Self, String> {
        match raw {
            "earliest" => Ok(BlockTag::Earliest),
            "latest" | "safe" | "finalized" => Ok(BlockTag::Latest),
            "pending" => Ok(BlockTag::Pending),
            other => quantity::parse(other).map(BlockTag::Number),
        }
    }

    /// Resolve against the current head
    pub fn resolve(self, latest: BlockNumber) -> BlockNumber {
        match self {
            BlockTag::Earliest => 0,
            BlockTag::Latest | BlockTag::Pending => latest,
            BlockTag::Number(number) => number,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_tag() {
        assert_eq!(BlockTag::parse("latest").unwrap().resolve(9), 9);
        assert_eq!(BlockTag::parse("earliest").unwrap().resolve(9), 0);
        assert_eq!(BlockTag::parse("0x4").unwrap().resolve(9), 4);
        assert!(BlockTag::parse("0xzz").is_err());
    }

    #[test]
    fn test_request_shape() {
        let request = RpcRequest::new("eth_blockNumber", serde_json::json!([]), 7);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 7);
    }
}
