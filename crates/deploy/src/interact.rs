// deploy/src/interact.rs

//! One-shot interaction scripts. Each looks up the latest deployment by
//! name, sends one state-changing call as the deployer and waits for one
//! confirmation. Failures propagate; nothing is retried.

use crate::{runtime::Runtime, DeployResult};
use chain_core::{units::ether, Token, TransactionReceipt, U256};
use smart_contracts::contracts::{events_example, fund_me, lottery};

/// Default funding sent by the `fund` script
pub fn default_fund_amount() -> U256 {
    ether(1)
}

/// Number stored by the `store-number` script when none is given
pub const DEFAULT_STORED_NUMBER: u64 = 40;

pub async fn fund(runtime: &Runtime, amount: U256) -> DeployResult<TransactionReceipt> {
    let fund_me = runtime.contract(fund_me::NAME).await?;
    tracing::info!("Funding...");
    let receipt = runtime.send(&fund_me, "fund", &[], amount).await?;
    tracing::info!("Amount funded");
    Ok(receipt)
}

pub async fn withdraw(runtime: &Runtime) -> DeployResult<TransactionReceipt> {
    let fund_me = runtime.contract(fund_me::NAME).await?;
    tracing::info!("Withdrawing...");
    let receipt = runtime.send(&fund_me, "withdraw", &[], U256::zero()).await?;
    tracing::info!("Got it back!");
    Ok(receipt)
}

pub async fn store_number(runtime: &Runtime, number: U256) -> DeployResult<TransactionReceipt> {
    let events = runtime.contract(events_example::NAME).await?;
    tracing::info!("Storing number...");
    let receipt = runtime
        .send(&events, "store", &[Token::Uint(number)], U256::zero())
        .await?;
    tracing::info!("Number stored");
    Ok(receipt)
}

/// Enter the lottery as the deployer, paying exactly the entrance fee
pub async fn enter_lottery(runtime: &Runtime) -> DeployResult<TransactionReceipt> {
    let lottery = runtime.contract(lottery::NAME).await?;
    let fee = lottery.query_uint("getEntranceFee", &[]).await?;
    tracing::info!("Entering lottery...");
    let receipt = runtime.send(&lottery, "participateToLottery", &[], fee).await?;
    tracing::info!("Entered!");
    Ok(receipt)
}
