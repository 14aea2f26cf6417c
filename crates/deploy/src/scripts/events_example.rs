// deploy/src/scripts/events_example.rs
use super::DeployScript;
use crate::{deployer::deploy, runtime::Runtime, DeployOptions, DeployResult};
use async_trait::async_trait;
use smart_contracts::contracts::events_example;

pub struct DeployEventsExample;

#[async_trait]
impl DeployScript for DeployEventsExample {
    fn name(&self) -> &'static str {
        "events-example"
    }

    fn tags(&self) -> &'static [&'static str] {
        &["all", "examples", "events"]
    }

    async fn run(&self, runtime: &Runtime) -> DeployResult<()> {
        tracing::info!("Deploying Events Example...");
        deploy(
            runtime,
            events_example::NAME,
            DeployOptions::new().wait_confirmations(runtime.confirmations()),
        )
        .await?;
        tracing::info!("Events Example Deployed!");
        Ok(())
    }
}
