// deploy/src/scripts/mod.rs

//! Tagged deploy scripts, run in a fixed order

pub mod events_example;
pub mod fund_me;
pub mod lottery;
pub mod mocks;
pub mod simple_storage;

use crate::{runtime::Runtime, DeployResult};
use async_trait::async_trait;

#[async_trait]
pub trait DeployScript: Send + Sync {
    fn name(&self) -> &'static str;

    fn tags(&self) -> &'static [&'static str];

    /// Scripts (by name) that must run first
    fn dependencies(&self) -> &'static [&'static str] {
        &[]
    }

    async fn run(&self, runtime: &Runtime) -> DeployResult<()>;
}

/// Every script, in execution order
pub fn all_scripts() -> Vec<Box<dyn DeployScript>> {
    vec![
        Box::new(mocks::DeployMocks),
        Box::new(simple_storage::DeploySimpleStorage),
        Box::new(events_example::DeployEventsExample),
        Box::new(fund_me::DeployFundMe),
        Box::new(lottery::DeployLottery),
    ]
}

/// Scripts selected by `tags` plus their dependencies, in execution
/// order. No tags selects everything.
pub fn select(tags: &[&str]) -> Vec<Box<dyn DeployScript>> {
    let scripts = all_scripts();
    let mut selected: Vec<&'static str> = scripts
        .iter()
        .filter(|script| tags.is_empty() || script.tags().iter().any(|tag| tags.contains(tag)))
        .map(|script| script.name())
        .collect();

    // dependencies are declared on earlier scripts only, one pass in
    // reverse picks up chains
    for script in scripts.iter().rev() {
        if selected.contains(&script.name()) {
            for dependency in script.dependencies() {
                if !selected.contains(dependency) {
                    selected.push(dependency);
                }
            }
        }
    }

    scripts
        .into_iter()
        .filter(|script| selected.contains(&script.name()))
        .collect()
}

/// Run the scripts matching `tags`; returns the names of those that ran
pub async fn run_tags(runtime: &Runtime, tags: &[&str]) -> DeployResult<Vec<&'static str>> {
    let mut ran = Vec::new();
    for script in select(tags) {
        tracing::debug!(script = script.name(), network = %runtime.network().name, "Running deploy script");
        script.run(runtime).await?;
        ran.push(script.name());
    }
    Ok(ran)
}
