// deploy/src/scripts/lottery.rs
use super::DeployScript;
use crate::{deployer::deploy, runtime::Runtime, verify, DeployError, DeployOptions, DeployResult};
use async_trait::async_trait;
use chain_core::{units::ether, Token, U256};
use smart_contracts::contracts::{lottery, vrf_coordinator_v2_mock};

/// LINK put on a fresh development subscription
pub fn subscription_fund_amount() -> U256 {
    ether(30)
}

pub struct DeployLottery;

#[async_trait]
impl DeployScript for DeployLottery {
    fn name(&self) -> &'static str {
        "lottery"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["all", "lottery"]
    }

    fn dependencies(&self) -> &'static [&'static str] {
        &["mocks"]
    }

    async fn run(&self, runtime: &Runtime) -> DeployResult<()> {
        let network = runtime.network();
        let (coordinator, subscription_id) = if runtime.is_development() {
            let coordinator = runtime.contract(vrf_coordinator_v2_mock::NAME).await?;
            let receipt = runtime.send(&coordinator, "createSubscription", &[], U256::zero()).await?;
            let subscription_id = coordinator
                .events_in("SubscriptionCreated", &receipt)?
                .first()
                .and_then(|event| event.param("subId").cloned())
                .and_then(|token| token.into_uint())
                .ok_or_else(|| {
                    DeployError::InvalidConfig("createSubscription emitted no SubscriptionCreated".into())
                })?;
            runtime
                .send(
                    &coordinator,
                    "fundSubscription",
                    &[Token::Uint(subscription_id), Token::Uint(subscription_fund_amount())],
                    U256::zero(),
                )
                .await?;
            (coordinator.address(), subscription_id)
        } else {
            (network.coordinator()?, U256::from(network.subscription()?))
        };

        tracing::info!("Deploying Lottery...");
        let record = deploy(
            runtime,
            lottery::NAME,
            DeployOptions::new()
                .args(vec![
                    Token::Address(coordinator),
                    Token::Uint(network.entrance_fee),
                    Token::FixedBytes(network.key_hash()?.as_bytes().to_vec()),
                    Token::Uint(subscription_id),
                    Token::Uint(U256::from(network.callback_gas_limit)),
                    Token::Uint(U256::from(network.interval)),
                ])
                .wait_confirmations(runtime.confirmations()),
        )
        .await?;

        if runtime.is_development() {
            let coordinator = runtime.contract(vrf_coordinator_v2_mock::NAME).await?;
            runtime
                .send(
                    &coordinator,
                    "addConsumer",
                    &[Token::Uint(subscription_id), Token::Address(record.address)],
                    U256::zero(),
                )
                .await?;
            tracing::info!("Consumer is added");
        }

        verify::verify(runtime, &record).await;
        tracing::info!("{}", "-".repeat(50));
        Ok(())
    }
}
