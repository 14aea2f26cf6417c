// deploy/src/scripts/mocks.rs
use super::DeployScript;
use crate::{deployer::deploy, runtime::Runtime, DeployOptions, DeployResult};
use async_trait::async_trait;
use chain_core::{units::gwei, Token, U256};
use smart_contracts::contracts::{mock_v3_aggregator, vrf_coordinator_v2_mock};

/// Premium per randomness request, in LINK (0.25)
pub fn base_fee() -> U256 {
    U256::from(25) * U256::exp10(16)
}

/// LINK per gas unit of the fulfillment callback
pub fn gas_price_link() -> U256 {
    gwei(1)
}

/// Price feed and randomness coordinator stand-ins for development chains
pub struct DeployMocks;

#[async_trait]
impl DeployScript for DeployMocks {
    fn name(&self) -> &'static str {
        "mocks"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["all", "mocks"]
    }

    async fn run(&self, runtime: &Runtime) -> DeployResult<()> {
        if !runtime.is_development() {
            return Ok(());
        }

        tracing::info!("Local network detected! Deploying mocks...");
        deploy(
            runtime,
            mock_v3_aggregator::NAME,
            DeployOptions::new().args(vec![
                Token::Uint(U256::from(mock_v3_aggregator::DECIMALS)),
                Token::Int(mock_v3_aggregator::int256(mock_v3_aggregator::INITIAL_ANSWER)),
            ]),
        )
        .await?;
        deploy(
            runtime,
            vrf_coordinator_v2_mock::NAME,
            DeployOptions::new().args(vec![Token::Uint(base_fee()), Token::Uint(gas_price_link())]),
        )
        .await?;
        tracing::info!("Mocks Deployed!");
        tracing::info!("{}", "-".repeat(50));
        Ok(())
    }
}
