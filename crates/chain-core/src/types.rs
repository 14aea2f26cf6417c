// chain-core/src/types.rs

pub use ethers_core::abi::{Abi, Token};
pub use ethers_core::types::{Address, Bytes, H256, U256};

/// Block number/height
pub type BlockNumber = u64;

/// Gas limit/used
pub type Gas = u64;

/// Timestamp in Unix epoch seconds
pub type Timestamp = u64;

/// Chain identifier (EIP-155)
pub type ChainId = u64;

/// Serde adapter for JSON-RPC hex quantities stored as `u64`
pub mod quantity {
    use ethers_core::types::U64;
    use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        U64::from(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(de::Error::custom)
    }

    /// Parse a `0x`-prefixed hex quantity (or a plain decimal string)
    pub fn parse(raw: &str) -> Result<u64, String> {
        let invalid = |e: &dyn std::fmt::Display| format!("invalid quantity {raw}: {e}");
        if raw.starts_with("0x") {
            serde_json::from_value::<U64>(serde_json::Value::String(raw.to_string()))
                .map(|value| value.as_u64())
                .map_err(|e| invalid(&e))
        } else {
            raw.parse().map_err(|e| invalid(&e))
        }
    }

    pub fn format(value: u64) -> String {
        format!("{:#x}", value)
    }
}
