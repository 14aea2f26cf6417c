// deploy/src/deployer.rs

//! The `deploy()` helper used by every deploy script

use crate::{
    deployments::{token_to_json, DeploymentRecord},
    runtime::Runtime,
    DeployError, DeployResult,
};
use chain_core::{Address, Provider, Token, TransactionRequest};

/// How a contract is deployed
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Sender; the `deployer` named account when unset
    pub from: Option<Address>,
    pub args: Vec<Token>,
    /// Confirmations to wait for; the network's value when unset
    pub wait_confirmations: Option<u64>,
    /// Artifact to deploy when it differs from the deployment name
    pub contract: Option<String>,
    pub log: bool,
}

impl DeployOptions {
    pub fn new() -> Self {
        Self {
            log: true,
            ..Default::default()
        }
    }

    pub fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn args(mut self, args: Vec<Token>) -> Self {
        self.args = args;
        self
    }

    pub fn wait_confirmations(mut self, confirmations: u64) -> Self {
        self.wait_confirmations = Some(confirmations);
        self
    }

    pub fn contract(mut self, artifact: impl Into<String>) -> Self {
        self.contract = Some(artifact.into());
        self
    }

    pub fn log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }
}

/// Deploy `name`, or reuse its existing deployment when the code is still
/// on chain and was deployed with the same arguments
pub async fn deploy(runtime: &Runtime, name: &str, options: DeployOptions) -> DeployResult<DeploymentRecord> {
    let artifact_name = options.contract.as_deref().unwrap_or(name);
    let artifact = runtime.artifact(artifact_name)?;
    let encoded_args = artifact.encode_constructor_args(&options.args)?;
    let provider = runtime.provider();

    if let Some(existing) = runtime.deployments().get(name).await {
        if existing.encoded_args == encoded_args
            && existing.abi == artifact.abi
            && !provider.get_code(existing.address).await?.is_empty()
        {
            if options.log {
                tracing::info!("reusing \"{}\" at {:?}", name, existing.address);
            }
            return Ok(existing);
        }
    }

    let from = match options.from {
        Some(from) => from,
        None => runtime.deployer().await?,
    };
    let data = artifact.deployment_data(&options.args)?;
    let hash = provider
        .send_transaction(TransactionRequest::new().from(from).data(data))
        .await?;
    if options.log {
        tracing::info!("deploying \"{}\" (tx: {:?})...", name, hash);
    }

    let confirmations = options
        .wait_confirmations
        .unwrap_or_else(|| runtime.confirmations())
        .max(1);
    let receipt = chain_core::PendingTransaction::new(hash, provider.clone())
        .wait(confirmations, runtime.confirmation_timeout(confirmations))
        .await?;
    if !receipt.succeeded() {
        return Err(DeployError::Reverted(receipt.transaction_hash));
    }
    let address = receipt
        .contract_address
        .ok_or_else(|| DeployError::NoContractAddress(name.to_string()))?;

    if options.log {
        tracing::info!(
            "deployed \"{}\" at {:?} with {} gas",
            name,
            address,
            receipt.gas_used
        );
    }

    let record = DeploymentRecord {
        contract_name: name.to_string(),
        address,
        args: options.args.iter().map(token_to_json).collect(),
        encoded_args,
        transaction_hash: receipt.transaction_hash,
        block_number: receipt.block_number,
        deployer: from,
        gas_used: receipt.gas_used,
        abi: artifact.abi.clone(),
        deployed_at: chrono::Utc::now().to_rfc3339(),
    };
    runtime.deployments().save(record.clone()).await?;
    runtime.gas_reporter().record_deployment(name, &receipt);
    Ok(record)
}
