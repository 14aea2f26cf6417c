// deploy/src/scripts/fund_me.rs
use super::DeployScript;
use crate::{deployer::deploy, runtime::Runtime, verify, DeployOptions, DeployResult};
use async_trait::async_trait;
use chain_core::Token;
use smart_contracts::contracts::{fund_me, mock_v3_aggregator};

pub struct DeployFundMe;

#[async_trait]
impl DeployScript for DeployFundMe {
    fn name(&self) -> &'static str {
        "fund-me"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["all", "fundme"]
    }

    fn dependencies(&self) -> &'static [&'static str] {
        &["mocks"]
    }

    async fn run(&self, runtime: &Runtime) -> DeployResult<()> {
        let price_feed = if runtime.is_development() {
            runtime
                .deployments()
                .require(mock_v3_aggregator::NAME)
                .await?
                .address
        } else {
            runtime.network().price_feed()?
        };

        tracing::info!("Deploying Fund Me Contract...");
        tracing::info!("Price feed: {:?}", price_feed);
        let record = deploy(
            runtime,
            fund_me::NAME,
            DeployOptions::new()
                .args(vec![Token::Address(price_feed)])
                .wait_confirmations(runtime.confirmations()),
        )
        .await?;

        verify::verify(runtime, &record).await;
        tracing::info!("{}", "-".repeat(50));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripts::mocks::DeployMocks;

    #[tokio::test]
    async fn test_wires_mock_price_feed() {
        let runtime = Runtime::hardhat().await.unwrap();
        DeployMocks.run(&runtime).await.unwrap();
        DeployFundMe.run(&runtime).await.unwrap();

        let feed = runtime.deployments().require(mock_v3_aggregator::NAME).await.unwrap();
        let fund_me = runtime.contract(fund_me::NAME).await.unwrap();
        assert_eq!(fund_me.query_address("priceFeed", &[]).await.unwrap(), feed.address);
        assert_eq!(
            fund_me.query_address("getOwner", &[]).await.unwrap(),
            runtime.deployer().await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_needs_mocks_on_development_chain() {
        let runtime = Runtime::hardhat().await.unwrap();
        assert!(matches!(
            DeployFundMe.run(&runtime).await,
            Err(crate::DeployError::DeploymentNotFound { .. })
        ));
    }
}
