// deploy/src/runtime.rs
use crate::{
    config::{AccountSource, Environment, NetworkSettings, ProjectConfig},
    deployments::DeploymentStore,
    gas_reporter::GasReporter,
    harness::EventListener,
    network::{network_config, NetworkDescriptor},
    scripts, DeployError, DeployResult,
};
use chain_core::{
    Address, ContractHandle, Provider, Token, TransactionReceipt, U256,
};
use devnet::Devnet;
use rpc::RpcClient;
use smart_contracts::{ArtifactRegistry, ContractArtifact};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Time allowed per required confirmation
const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(60);

/// Everything a script needs for one network: the chain, its constants,
/// the deployment records, secrets and the gas reporter
pub struct Runtime {
    config: ProjectConfig,
    environment: Environment,
    network: NetworkDescriptor,
    settings: NetworkSettings,
    provider: Arc<dyn Provider>,
    devnet: Option<Arc<Devnet>>,
    registry: Arc<ArtifactRegistry>,
    deployments: DeploymentStore,
    gas: GasReporter,
    /// Snapshot of the untouched in-process chain, for fixtures
    clean_state: Mutex<Option<u64>>,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("network", &self.network)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Runtime {
    /// Connect to `network` as configured. `hardhat` without a URL runs
    /// an in-process development chain.
    pub async fn connect(
        config: ProjectConfig,
        environment: Environment,
        network: &str,
    ) -> DeployResult<Self> {
        let settings = config.network(network)?.clone();
        let mut descriptor = network_config(settings.chain_id)?;
        descriptor.name = network.to_string();
        let registry = Arc::new(load_registry(&config)?);

        if network == "hardhat" && settings.url.is_none() {
            let devnet = Arc::new(Devnet::new(config.devnet.clone(), registry.clone())?);
            let clean = devnet.snapshot().await;
            tracing::info!(network, "Using in-process development chain");
            return Ok(Self {
                gas: GasReporter::new(config.gas_reporter.clone()),
                deployments: DeploymentStore::in_memory(network),
                provider: devnet.clone(),
                devnet: Some(devnet),
                clean_state: Mutex::new(Some(clean)),
                config,
                environment,
                network: descriptor,
                settings,
                registry,
            });
        }

        let url = match &settings.url {
            Some(url) => url.clone(),
            None => environment.rpc_url(network)?.to_string(),
        };
        let mut client = RpcClient::new(url.clone())?;
        if let Some(ms) = settings.polling_interval_ms {
            client = client.with_polling_interval(Duration::from_millis(ms));
        }
        match settings.accounts {
            AccountSource::Node => {}
            AccountSource::PrivateKey => {
                let signer = wallet::signer_from_private_key(environment.private_key()?, settings.chain_id)?;
                client = client.with_signer(signer);
            }
            AccountSource::Keystore => {
                let path = settings
                    .keystore
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(wallet::ENCRYPTED_KEY_FILE));
                let signer = wallet::signer_from_keystore(
                    &path,
                    environment.private_key_password()?,
                    settings.chain_id,
                )?;
                client = client.with_signer(signer);
            }
        }

        let remote_chain_id = client.chain_id().await?;
        if remote_chain_id != settings.chain_id {
            return Err(DeployError::InvalidConfig(format!(
                "{network} expects chain id {} but {url} reports {remote_chain_id}",
                settings.chain_id
            )));
        }
        tracing::info!(network, chain_id = remote_chain_id, "Connected");

        Ok(Self {
            gas: GasReporter::new(config.gas_reporter.clone()),
            deployments: DeploymentStore::open(&config.deployments_dir, network)?,
            provider: Arc::new(client),
            devnet: None,
            clean_state: Mutex::new(None),
            config,
            environment,
            network: descriptor,
            settings,
            registry,
        })
    }

    /// Fresh in-process development chain with default settings
    pub async fn hardhat() -> DeployResult<Self> {
        Self::connect(ProjectConfig::default(), Environment::default(), "hardhat").await
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn network(&self) -> &NetworkDescriptor {
        &self.network
    }

    pub fn is_development(&self) -> bool {
        self.network.is_development()
    }

    pub fn provider(&self) -> Arc<dyn Provider> {
        self.provider.clone()
    }

    /// The in-process chain, when running on `hardhat`
    pub fn devnet(&self) -> Option<&Arc<Devnet>> {
        self.devnet.as_ref()
    }

    pub fn deployments(&self) -> &DeploymentStore {
        &self.deployments
    }

    pub fn gas_reporter(&self) -> &GasReporter {
        &self.gas
    }

    /// Confirmations to wait for after a deployment
    pub fn confirmations(&self) -> u64 {
        self.settings
            .block_confirmations
            .unwrap_or(self.network.block_confirmations)
            .max(1)
    }

    pub fn confirmation_timeout(&self, confirmations: u64) -> Duration {
        let confirmations = u32::try_from(confirmations.max(1)).unwrap_or(u32::MAX);
        CONFIRMATION_TIMEOUT.saturating_mul(confirmations)
    }

    /// Artifact deployable on this network. Development chains run the
    /// native contracts; live chains need a compiled artifact.
    pub fn artifact(&self, name: &str) -> DeployResult<ContractArtifact> {
        let native = self.registry.native(name).ok().map(|entry| entry.artifact().clone());
        let compiled = self.registry.compiled(name).cloned();
        let artifact = if self.is_development() {
            native.or(compiled)
        } else {
            compiled.filter(|artifact| !artifact.is_native())
        };
        artifact.ok_or_else(|| DeployError::MissingArtifact {
            contract: name.to_string(),
            network: self.network.name.clone(),
        })
    }

    pub async fn accounts(&self) -> DeployResult<Vec<Address>> {
        Ok(self.provider.accounts().await?)
    }

    /// Resolve a named account (`deployer`, `player`)
    pub async fn named_account(&self, name: &str) -> DeployResult<Address> {
        let index = self.config.named_accounts.index(name)?;
        self.accounts()
            .await?
            .get(index)
            .copied()
            .ok_or_else(|| DeployError::UnknownAccount(format!("{name} (account #{index})")))
    }

    pub async fn deployer(&self) -> DeployResult<Address> {
        self.named_account("deployer").await
    }

    pub async fn player(&self) -> DeployResult<Address> {
        self.named_account("player").await
    }

    /// Latest deployment of `name`, bound to the deployer
    pub async fn contract(&self, name: &str) -> DeployResult<ContractHandle> {
        let deployer = self.deployer().await?;
        self.contract_as(name, deployer).await
    }

    pub async fn contract_as(&self, name: &str, sender: Address) -> DeployResult<ContractHandle> {
        let record = self.deployments.require(name).await?;
        Ok(ContractHandle::new(record.address, record.abi, self.provider.clone()).connect(sender))
    }

    /// Send a state-changing call and wait for one confirmation. The gas
    /// used is recorded for the report.
    pub async fn send(
        &self,
        contract: &ContractHandle,
        method: &str,
        args: &[Token],
        value: U256,
    ) -> DeployResult<TransactionReceipt> {
        let pending = contract.send_with_value(method, args, value).await?;
        let receipt = pending.wait(1, self.confirmation_timeout(1)).await?;
        if !receipt.succeeded() {
            return Err(DeployError::Reverted(receipt.transaction_hash));
        }
        let name = self.contract_name(contract.address()).await;
        self.gas.record_call(&name, method, &receipt);
        Ok(receipt)
    }

    async fn contract_name(&self, address: Address) -> String {
        self.deployments
            .all()
            .await
            .into_iter()
            .find(|record| record.address == address)
            .map(|record| record.contract_name)
            .unwrap_or_else(|| format!("{address:?}"))
    }

    /// Listener for `event` on `contract`, bounded by the network's event
    /// timeout
    pub fn listener(&self, contract: &ContractHandle, event: &str) -> EventListener {
        EventListener::new(contract, event).timeout(self.network.event_timeout)
    }

    /// Move the chain clock forward and mine a block carrying the new time
    pub async fn advance_time(&self, seconds: u64) -> DeployResult<()> {
        self.provider.increase_time(seconds).await?;
        self.provider.mine().await?;
        Ok(())
    }

    /// Run the deploy scripts matching `tags`, in order
    pub async fn deploy_tags(&self, tags: &[&str]) -> DeployResult<Vec<&'static str>> {
        scripts::run_tags(self, tags).await
    }

    /// Reset the in-process chain to its initial state, forget every
    /// deployment and run the scripts matching `tags`
    pub async fn fixture(&self, tags: &[&str]) -> DeployResult<Vec<&'static str>> {
        let devnet = self.devnet.as_ref().ok_or_else(|| {
            DeployError::InvalidConfig(format!(
                "fixtures need the in-process chain, not {}",
                self.network.name
            ))
        })?;

        {
            let mut clean = self.clean_state.lock().await;
            if let Some(id) = clean.take() {
                devnet.revert(id).await;
            }
            *clean = Some(devnet.snapshot().await);
        }
        self.deployments.clear().await?;
        self.gas.reset();
        self.deploy_tags(tags).await
    }
}

fn load_registry(config: &ProjectConfig) -> DeployResult<ArtifactRegistry> {
    let mut registry = ArtifactRegistry::builtin()?;
    if config.artifacts_dir.is_dir() {
        let loaded = registry.load_compiled_dir(&config.artifacts_dir)?;
        tracing::debug!(loaded, dir = %config.artifacts_dir.display(), "Loaded compiled artifacts");
    }
    Ok(registry)
}
