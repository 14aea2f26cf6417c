// deploy/src/tasks.rs

//! Small utility tasks

use crate::{config::Environment, runtime::Runtime, DeployResult};
use chain_core::{Address, BlockNumber, Provider};
use std::path::Path;
use wallet::EncryptedKey;

/// Print the current block number
pub async fn block_number(runtime: &Runtime) -> DeployResult<BlockNumber> {
    let number = runtime.provider().block_number().await?;
    tracing::info!("The current block number is: {}", number);
    Ok(number)
}

/// Print every account the provider can send from
pub async fn accounts(runtime: &Runtime) -> DeployResult<Vec<Address>> {
    let accounts = runtime.accounts().await?;
    for account in &accounts {
        tracing::info!("{:?}", account);
    }
    Ok(accounts)
}

/// Encrypt `PRIVATE_KEY` with `PRIVATE_KEY_PASSWORD` into a keystore in `dir`
pub fn encrypt_key(environment: &Environment, dir: impl AsRef<Path>) -> DeployResult<EncryptedKey> {
    let encrypted = wallet::encrypt_key(
        environment.private_key()?,
        environment.private_key_password()?,
        dir,
    )?;
    tracing::info!("{}", encrypted.json);
    Ok(encrypted)
}
