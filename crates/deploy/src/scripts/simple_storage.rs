// deploy/src/scripts/simple_storage.rs
use super::DeployScript;
use crate::{deployer::deploy, runtime::Runtime, verify, DeployOptions, DeployResult};
use async_trait::async_trait;
use smart_contracts::contracts::simple_storage;

/// Blocks to wait before asking the explorer, so it has indexed the code
const VERIFY_CONFIRMATIONS: u64 = 6;

pub struct DeploySimpleStorage;

#[async_trait]
impl DeployScript for DeploySimpleStorage {
    fn name(&self) -> &'static str {
        "simple-storage"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["all", "storage"]
    }

    async fn run(&self, runtime: &Runtime) -> DeployResult<()> {
        let will_verify = verify::verifier_for(runtime)?.is_some();
        let confirmations = if will_verify { VERIFY_CONFIRMATIONS } else { 1 };

        tracing::info!("Deploying contract...");
        let record = deploy(
            runtime,
            simple_storage::NAME,
            DeployOptions::new().wait_confirmations(confirmations),
        )
        .await?;
        tracing::info!("Contract: {:?}", record.address);

        if will_verify {
            verify::verify(runtime, &record).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_core::U256;

    #[tokio::test]
    async fn test_deploys_empty_storage() {
        let runtime = Runtime::hardhat().await.unwrap();
        DeploySimpleStorage.run(&runtime).await.unwrap();
        let storage = runtime.contract(simple_storage::NAME).await.unwrap();
        assert_eq!(storage.query_uint("retrieve", &[]).await.unwrap(), U256::zero());
    }
}
