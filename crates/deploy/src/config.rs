// deploy/src/config.rs
use crate::{DeployError, DeployResult};
use chain_core::ChainId;
use devnet::{config::DEV_CHAIN_ID, DevnetConfig};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

/// Project configuration file looked up in the working directory
pub const CONFIG_FILE: &str = "dapp-lab.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub default_network: String,
    /// Deployment records live under `<deployments_dir>/<network>/`
    pub deployments_dir: PathBuf,
    /// Compiler artifacts for live networks
    pub artifacts_dir: PathBuf,
    pub networks: BTreeMap<String, NetworkSettings>,
    pub named_accounts: NamedAccounts,
    pub etherscan: EtherscanSettings,
    pub gas_reporter: GasReporterSettings,
    /// In-process chain used by the `hardhat` network
    pub devnet: DevnetConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSettings {
    pub chain_id: ChainId,
    /// Node URL; falls back to `<NETWORK>_RPC_URL`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_confirmations: Option<u64>,
    #[serde(default)]
    pub accounts: AccountSource,
    /// Keystore read when `accounts = "keystore"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keystore: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polling_interval_ms: Option<u64>,
}

/// Where the signing account comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccountSource {
    /// Accounts unlocked on the node
    #[default]
    Node,
    /// `PRIVATE_KEY`
    PrivateKey,
    /// Encrypted keystore opened with `PRIVATE_KEY_PASSWORD`
    Keystore,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamedAccounts {
    pub deployer: usize,
    pub player: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtherscanSettings {
    /// Overrides the per-network explorer API
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    pub status_poll_interval_secs: u64,
    pub max_status_polls: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasReporterSettings {
    pub enabled: bool,
    /// Fiat currency for the price column
    pub currency: String,
    /// Symbol of the native token being priced
    pub token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            default_network: "hardhat".into(),
            deployments_dir: "deployments".into(),
            artifacts_dir: "artifacts".into(),
            networks: default_networks(),
            named_accounts: NamedAccounts::default(),
            etherscan: EtherscanSettings::default(),
            gas_reporter: GasReporterSettings::default(),
            devnet: DevnetConfig::default(),
        }
    }
}

impl Default for NamedAccounts {
    fn default() -> Self {
        Self {
            deployer: 0,
            player: 1,
        }
    }
}

impl Default for EtherscanSettings {
    fn default() -> Self {
        Self {
            api_url: None,
            status_poll_interval_secs: 5,
            max_status_polls: 10,
        }
    }
}

impl Default for GasReporterSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            currency: "USD".into(),
            token: "ETH".into(),
            output_file: None,
        }
    }
}

fn default_networks() -> BTreeMap<String, NetworkSettings> {
    let live = |chain_id| NetworkSettings {
        chain_id,
        url: None,
        block_confirmations: Some(6),
        accounts: AccountSource::PrivateKey,
        keystore: None,
        polling_interval_ms: None,
    };

    let mut networks = BTreeMap::new();
    networks.insert(
        "hardhat".into(),
        NetworkSettings {
            chain_id: DEV_CHAIN_ID,
            url: None,
            block_confirmations: Some(1),
            accounts: AccountSource::Node,
            keystore: None,
            polling_interval_ms: None,
        },
    );
    networks.insert(
        "localhost".into(),
        NetworkSettings {
            chain_id: DEV_CHAIN_ID,
            url: Some("http://127.0.0.1:8545".into()),
            block_confirmations: Some(1),
            accounts: AccountSource::Node,
            keystore: None,
            polling_interval_ms: Some(100),
        },
    );
    networks.insert("rinkeby".into(), live(4));
    networks.insert("sepolia".into(), live(11_155_111));
    networks.insert("polygon".into(), live(137));
    networks
}

impl ProjectConfig {
    /// Read `path`, or `dapp-lab.toml` when present, or fall back to defaults
    pub fn load(path: Option<&Path>) -> DeployResult<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(CONFIG_FILE).exists() => Self::from_file(CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> DeployResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "Loaded project configuration");
        Self::from_toml(&contents)
    }

    /// Parse TOML. Built-in networks missing from the file are kept.
    pub fn from_toml(contents: &str) -> DeployResult<Self> {
        let mut config: Self =
            toml::from_str(contents).map_err(|e| DeployError::InvalidConfig(e.to_string()))?;
        for (name, settings) in default_networks() {
            config.networks.entry(name).or_insert(settings);
        }
        Ok(config)
    }

    pub fn to_file(&self, path: impl AsRef<Path>) -> DeployResult<()> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| DeployError::InvalidConfig(e.to_string()))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn network(&self, name: &str) -> DeployResult<&NetworkSettings> {
        self.networks
            .get(name)
            .ok_or_else(|| DeployError::UnknownNetwork(name.to_string()))
    }
}

impl NamedAccounts {
    /// Account index behind a name
    pub fn index(&self, name: &str) -> DeployResult<usize> {
        match name {
            "deployer" => Ok(self.deployer),
            "player" => Ok(self.player),
            _ => Err(DeployError::UnknownAccount(name.to_string())),
        }
    }
}

/// Secrets and endpoints read from the process environment (and `.env`)
/// once at start-up
#[derive(Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    pub const PRIVATE_KEY: &'static str = "PRIVATE_KEY";
    pub const PRIVATE_KEY_PASSWORD: &'static str = "PRIVATE_KEY_PASSWORD";
    pub const ETHERSCAN_API_KEY: &'static str = "ETHERSCAN_API_KEY";
    pub const COINMARKETCAP_API_KEY: &'static str = "COINMARKETCAP_API_KEY";

    /// Load `.env` if present, then snapshot the process environment
    pub fn load() -> Self {
        if let Err(e) = dotenv::dotenv() {
            tracing::debug!("No .env file loaded: {}", e);
        }
        Self::from_vars(std::env::vars())
    }

    /// Empty values count as unset
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            vars: vars
                .into_iter()
                .filter(|(_, value)| !value.trim().is_empty())
                .collect(),
        }
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    fn required(&self, key: &str) -> DeployResult<&str> {
        self.get(key).ok_or_else(|| DeployError::MissingEnv(key.to_string()))
    }

    /// `<NETWORK>_RPC_URL`
    pub fn rpc_url(&self, network: &str) -> DeployResult<&str> {
        self.required(&format!("{}_RPC_URL", network.to_uppercase()))
    }

    pub fn private_key(&self) -> DeployResult<&str> {
        self.required(Self::PRIVATE_KEY)
    }

    pub fn private_key_password(&self) -> DeployResult<&str> {
        self.required(Self::PRIVATE_KEY_PASSWORD)
    }

    /// Verification is disabled without it
    pub fn etherscan_api_key(&self) -> Option<&str> {
        self.get(Self::ETHERSCAN_API_KEY)
    }

    /// Fiat pricing in the gas report is disabled without it
    pub fn coinmarketcap_api_key(&self) -> Option<&str> {
        self.get(Self::COINMARKETCAP_API_KEY)
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.vars.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("Environment").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ProjectConfig::default();
        assert_eq!(config.default_network, "hardhat");
        assert_eq!(config.network("rinkeby").unwrap().chain_id, 4);
        assert_eq!(config.network("localhost").unwrap().accounts, AccountSource::Node);
        assert!(matches!(config.network("goerli"), Err(DeployError::UnknownNetwork(_))));
        assert_eq!(config.named_accounts.index("deployer").unwrap(), 0);
        assert_eq!(config.named_accounts.index("player").unwrap(), 1);
        assert!(config.named_accounts.index("keeper").is_err());
    }

    #[test]
    fn test_toml_merges_builtin_networks() {
        let config = ProjectConfig::from_toml(
            r#"
            default_network = "goerli"

            [networks.goerli]
            chain_id = 5
            block_confirmations = 3
            accounts = "keystore"
            keystore = ".encryptedKey.json"

            [gas_reporter]
            enabled = true
            "#,
        )
        .unwrap();

        let goerli = config.network("goerli").unwrap();
        assert_eq!(goerli.chain_id, 5);
        assert_eq!(goerli.accounts, AccountSource::Keystore);
        assert_eq!(goerli.keystore.as_deref(), Some(Path::new(".encryptedKey.json")));
        assert!(config.network("hardhat").is_ok());
        assert!(config.gas_reporter.enabled);
        assert_eq!(config.gas_reporter.currency, "USD");
        assert_eq!(config.etherscan.max_status_polls, 10);
    }

    #[test]
    fn test_invalid_toml() {
        let err = ProjectConfig::from_toml("networks = 3").unwrap_err();
        assert!(matches!(err, DeployError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        let mut config = ProjectConfig::default();
        config.named_accounts.player = 4;
        config.to_file(&path).unwrap();

        let loaded = ProjectConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.named_accounts.player, 4);
        assert_eq!(loaded.networks, config.networks);
        assert!(ProjectConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_environment() {
        let env = Environment::from_vars(vec![
            ("RINKEBY_RPC_URL".to_string(), "https://rinkeby.example".to_string()),
            ("PRIVATE_KEY".to_string(), "0xabc".to_string()),
            ("ETHERSCAN_API_KEY".to_string(), "  ".to_string()),
        ]);
        assert_eq!(env.rpc_url("rinkeby").unwrap(), "https://rinkeby.example");
        assert_eq!(env.private_key().unwrap(), "0xabc");
        assert!(env.etherscan_api_key().is_none());
        assert!(env.coinmarketcap_api_key().is_none());

        match env.rpc_url("sepolia") {
            Err(DeployError::MissingEnv(key)) => assert_eq!(key, "SEPOLIA_RPC_URL"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(env.private_key_password(), Err(DeployError::MissingEnv(_))));

        let env = env.with_var("ETHERSCAN_API_KEY", "key");
        assert_eq!(env.etherscan_api_key(), Some("key"));
        assert!(!format!("{env:?}").contains("0xabc"));
    }
}
