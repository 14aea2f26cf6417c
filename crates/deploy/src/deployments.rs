// deploy/src/deployments.rs
use crate::{DeployError, DeployResult};
use chain_core::{Abi, Address, BlockNumber, Bytes, Token, H256};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// A published contract instance, looked up by name by later scripts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub contract_name: String,
    pub address: Address,
    /// Constructor arguments, human readable
    pub args: Vec<Value>,
    /// ABI-encoded constructor arguments
    pub encoded_args: Bytes,
    pub transaction_hash: H256,
    pub block_number: BlockNumber,
    pub deployer: Address,
    pub gas_used: u64,
    pub abi: Abi,
    /// RFC 3339
    pub deployed_at: String,
}

/// JSON form of a constructor argument
pub fn token_to_json(token: &Token) -> Value {
    match token {
        Token::Address(address) => json!(address),
        Token::FixedBytes(bytes) | Token::Bytes(bytes) => json!(format!("0x{}", hex::encode(bytes))),
        Token::Int(value) | Token::Uint(value) => json!(value.to_string()),
        Token::Bool(value) => json!(value),
        Token::String(value) => json!(value),
        Token::FixedArray(items) | Token::Array(items) | Token::Tuple(items) => {
            Value::Array(items.iter().map(token_to_json).collect())
        }
    }
}

/// Deployment records for one network, one per contract name. Persisted
/// as `<root>/<network>/<Name>.json` when backed by a directory.
#[derive(Debug)]
pub struct DeploymentStore {
    network: String,
    dir: Option<PathBuf>,
    records: RwLock<BTreeMap<String, DeploymentRecord>>,
}

impl DeploymentStore {
    /// Store that lives as long as the process (ephemeral chains)
    pub fn in_memory(network: &str) -> Self {
        Self {
            network: network.to_string(),
            dir: None,
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Open the directory store for `network`, loading existing records
    pub fn open(root: impl AsRef<Path>, network: &str) -> DeployResult<Self> {
        let dir = root.as_ref().join(network);
        let mut records = BTreeMap::new();

        if dir.is_dir() {
            for entry in std::fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.extension().map_or(true, |ext| ext != "json") {
                    continue;
                }
                let raw = std::fs::read_to_string(&path)?;
                let record: DeploymentRecord = serde_json::from_str(&raw)
                    .map_err(|e| DeployError::Store(format!("{}: {}", path.display(), e)))?;
                records.insert(record.contract_name.clone(), record);
            }
        }
        tracing::debug!(network, dir = %dir.display(), records = records.len(), "Opened deployment store");

        Ok(Self {
            network: network.to_string(),
            dir: Some(dir),
            records: RwLock::new(records),
        })
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    /// Record a deployment, replacing any earlier one of the same contract
    pub async fn save(&self, record: DeploymentRecord) -> DeployResult<()> {
        if let Some(dir) = &self.dir {
            std::fs::create_dir_all(dir)?;
            let path = dir.join(format!("{}.json", record.contract_name));
            let json = serde_json::to_string_pretty(&record)
                .map_err(|e| DeployError::Store(e.to_string()))?;
            std::fs::write(&path, json)?;
        }
        self.records
            .write()
            .await
            .insert(record.contract_name.clone(), record);
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Option<DeploymentRecord> {
        self.records.read().await.get(name).cloned()
    }

    /// Like `get`, failing with `DeploymentNotFound`
    pub async fn require(&self, name: &str) -> DeployResult<DeploymentRecord> {
        self.get(name).await.ok_or_else(|| DeployError::DeploymentNotFound {
            contract: name.to_string(),
            network: self.network.clone(),
        })
    }

    pub async fn all(&self) -> Vec<DeploymentRecord> {
        self.records.read().await.values().cloned().collect()
    }

    /// Forget every record, on disk too
    pub async fn clear(&self) -> DeployResult<()> {
        let mut records = self.records.write().await;
        if let Some(dir) = &self.dir {
            for name in records.keys() {
                let path = dir.join(format!("{name}.json"));
                if path.exists() {
                    std::fs::remove_file(path)?;
                }
            }
        }
        records.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_core::U256;

    fn record(name: &str, address: u64) -> DeploymentRecord {
        DeploymentRecord {
            contract_name: name.to_string(),
            address: Address::from_low_u64_be(address),
            args: vec![json!("8")],
            encoded_args: Bytes::from(vec![0u8; 32]),
            transaction_hash: H256::repeat_byte(1),
            block_number: 3,
            deployer: Address::from_low_u64_be(1),
            gas_used: 120_000,
            abi: Abi::default(),
            deployed_at: "2024-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn test_token_to_json() {
        assert_eq!(token_to_json(&Token::Uint(U256::from(8))), json!("8"));
        assert_eq!(token_to_json(&Token::Bool(true)), json!(true));
        assert_eq!(
            token_to_json(&Token::FixedBytes(vec![0xab, 0xcd])),
            json!("0xabcd")
        );
        assert_eq!(
            token_to_json(&Token::Array(vec![Token::String("a".into())])),
            json!(["a"])
        );
        assert_eq!(
            token_to_json(&Token::Address(Address::from_low_u64_be(1))),
            json!("0x0000000000000000000000000000000000000001")
        );
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = DeploymentStore::in_memory("hardhat");
        assert!(store.get("FundMe").await.is_none());
        assert!(matches!(
            store.require("FundMe").await,
            Err(DeployError::DeploymentNotFound { .. })
        ));

        store.save(record("FundMe", 10)).await.unwrap();
        store.save(record("FundMe", 11)).await.unwrap();
        assert_eq!(store.all().await.len(), 1);
        assert_eq!(store.require("FundMe").await.unwrap().address, Address::from_low_u64_be(11));

        store.clear().await.unwrap();
        assert!(store.all().await.is_empty());
    }

    #[tokio::test]
    async fn test_directory_store_persists() {
        let root = tempfile::tempdir().unwrap();
        let store = DeploymentStore::open(root.path(), "localhost").unwrap();
        store.save(record("MockV3Aggregator", 5)).await.unwrap();
        store.save(record("FundMe", 6)).await.unwrap();
        assert!(root.path().join("localhost").join("FundMe.json").exists());

        let reopened = DeploymentStore::open(root.path(), "localhost").unwrap();
        assert_eq!(reopened.all().await.len(), 2);
        assert_eq!(reopened.require("FundMe").await.unwrap(), record("FundMe", 6));

        let other = DeploymentStore::open(root.path(), "sepolia").unwrap();
        assert!(other.all().await.is_empty());

        reopened.clear().await.unwrap();
        assert!(!root.path().join("localhost").join("FundMe.json").exists());
    }
}
