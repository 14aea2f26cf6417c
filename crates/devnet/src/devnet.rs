// devnet/src/devnet.rs
use crate::{
    accounts::DevAccounts,
    chain::{ChainState, TxOutcome},
    config::DevnetConfig,
    DevnetResult,
};
use async_trait::async_trait;
use chain_core::{
    Address, Block, BlockNumber, Bytes, ChainError, ChainId, ChainResult, Gas, Log, LogFilter,
    LogSubscription, Provider, TransactionReceipt, TransactionRequest, H256, U256,
};
use ethers_core::types::transaction::eip2718::TypedTransaction;
use ethers_core::utils::{keccak256, rlp::Rlp};
use smart_contracts::{ArtifactRegistry, BlockEnv, Executor, Message, WorldState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

/// Development chain polling interval
const POLLING_INTERVAL: Duration = Duration::from_millis(10);

struct Subscriber {
    filter: LogFilter,
    sender: mpsc::UnboundedSender<Log>,
}

struct Inner {
    chain: ChainState,
    /// Saved chain states, by snapshot id
    snapshots: Vec<ChainState>,
    subscribers: Vec<Subscriber>,
}

/// Single-node chain that mines a block for every transaction
pub struct Devnet {
    config: DevnetConfig,
    accounts: DevAccounts,
    executor: Executor,
    inner: RwLock<Inner>,
}

impl Devnet {
    pub fn new(config: DevnetConfig, registry: Arc<ArtifactRegistry>) -> DevnetResult<Self> {
        config.validate()?;
        let accounts = DevAccounts::derive(&config.seed, config.accounts)?;
        let chain = ChainState::genesis(&config, &accounts);

        tracing::info!(
            chain_id = config.chain_id,
            accounts = accounts.len(),
            "Development chain started"
        );

        Ok(Self {
            executor: Executor::new(registry),
            config,
            accounts,
            inner: RwLock::new(Inner {
                chain,
                snapshots: Vec::new(),
                subscribers: Vec::new(),
            }),
        })
    }

    /// Default chain running the bundled contracts
    pub fn builtin() -> DevnetResult<Self> {
        Self::new(DevnetConfig::default(), Arc::new(ArtifactRegistry::builtin()?))
    }

    pub fn config(&self) -> &DevnetConfig {
        &self.config
    }

    pub fn dev_accounts(&self) -> &DevAccounts {
        &self.accounts
    }

    pub fn registry(&self) -> &ArtifactRegistry {
        self.executor.registry()
    }

    pub fn gas_price(&self) -> U256 {
        self.config.gas_price
    }

    pub async fn get_block_by_hash(&self, hash: H256) -> Option<Block> {
        let inner = self.inner.read().await;
        let height = inner.chain.height();
        (0..=height)
            .rev()
            .filter_map(|n| inner.chain.block(n))
            .find(|block| block.hash == hash)
            .cloned()
    }

    pub async fn transaction_count(&self, address: Address) -> u64 {
        self.inner.read().await.chain.world.nonce(&address)
    }

    /// Override an account balance
    pub async fn set_balance(&self, address: Address, balance: U256) {
        self.inner.write().await.chain.world.set_balance(address, balance);
    }

    /// Save the current chain state and return its id
    pub async fn snapshot(&self) -> u64 {
        let mut inner = self.inner.write().await;
        let state = inner.chain.clone();
        inner.snapshots.push(state);
        let id = inner.snapshots.len() as u64 - 1;
        tracing::debug!(id, "Snapshot taken");
        id
    }

    /// Restore snapshot `id`. Later snapshots are discarded; `id` itself
    /// can not be reused. Returns false for an unknown id.
    pub async fn revert(&self, id: u64) -> bool {
        let mut inner = self.inner.write().await;
        let index = id as usize;
        if index >= inner.snapshots.len() {
            return false;
        }
        inner.snapshots.truncate(index + 1);
        match inner.snapshots.pop() {
            Some(state) => {
                inner.chain = state;
                tracing::debug!(id, "Reverted to snapshot");
                true
            }
            None => false,
        }
    }

    /// Gas a transaction would need, with headroom for refunds
    pub async fn estimate_gas(&self, tx: &TransactionRequest) -> ChainResult<Gas> {
        let inner = self.inner.read().await;
        let env = inner.chain.next_env(self.config.chain_id);
        let from = tx.from.unwrap_or_else(|| self.default_sender());
        self.estimate(&inner.chain.world, &env, from, tx)
    }

    /// Accept an RLP encoded, signed transaction
    pub async fn send_raw_transaction(&self, raw: &[u8]) -> ChainResult<H256> {
        let (typed, signature) = TypedTransaction::decode_signed(&Rlp::new(raw))
            .map_err(|e| ChainError::InvalidParams(format!("invalid raw transaction: {e}")))?;
        if let Some(chain_id) = typed.chain_id() {
            if chain_id.as_u64() != self.config.chain_id {
                return Err(ChainError::InvalidParams(format!(
                    "chain id {} does not match {}",
                    chain_id, self.config.chain_id
                )));
            }
        }
        let from = signature
            .recover(typed.sighash())
            .map_err(|e| ChainError::Signer(e.to_string()))?;

        let mut tx = TransactionRequest::new().from(from);
        tx.to = typed.to_addr().copied();
        tx.value = typed.value().copied();
        tx.data = typed.data().cloned();
        tx.gas = typed.gas().copied();
        tx.gas_price = typed.gas_price();
        tx.nonce = typed.nonce().copied();

        let hash = H256::from(keccak256(raw));
        let mut inner = self.inner.write().await;
        self.apply(&mut inner, from, &tx, hash)
    }

    fn default_sender(&self) -> Address {
        self.accounts.get(0).map(|a| a.address).unwrap_or_default()
    }

    fn message(from: Address, tx: &TransactionRequest, gas_limit: Gas) -> Message {
        match tx.to {
            Some(to) => Message::call(from, to, tx.data_or_empty(), tx.value_or_zero(), gas_limit),
            None => Message::deploy(from, tx.data_or_empty(), tx.value_or_zero(), gas_limit),
        }
    }

    fn estimate(
        &self,
        world: &WorldState,
        env: &BlockEnv,
        from: Address,
        tx: &TransactionRequest,
    ) -> ChainResult<Gas> {
        let message = Self::message(from, tx, self.config.block_gas_limit);
        let result = self.executor.simulate(world, env, &message)?;
        // refunds are capped at a fifth of the gas consumed
        Ok((result.gas_used * 5 / 4 + 1).min(self.config.block_gas_limit))
    }

    fn apply(
        &self,
        inner: &mut Inner,
        from: Address,
        tx: &TransactionRequest,
        hash: H256,
    ) -> ChainResult<H256> {
        let chain = &mut inner.chain;
        let nonce = chain.world.nonce(&from);
        if let Some(expected) = tx.nonce {
            if expected != U256::from(nonce) {
                return Err(ChainError::InvalidParams(format!(
                    "nonce mismatch for {from:?}: expected {nonce}, got {expected}"
                )));
            }
        }

        let env = chain.next_env(self.config.chain_id);
        let gas_limit = match tx.gas {
            Some(gas) if gas > U256::from(self.config.block_gas_limit) => {
                return Err(ChainError::InvalidParams(format!(
                    "gas limit {gas} exceeds block gas limit {}",
                    self.config.block_gas_limit
                )));
            }
            Some(gas) => gas.as_u64(),
            None => self.estimate(&chain.world, &env, from, tx)?,
        };
        let gas_price = tx.gas_price.unwrap_or(self.config.gas_price);

        let max_fee = gas_price
            .checked_mul(U256::from(gas_limit))
            .and_then(|fee| fee.checked_add(tx.value_or_zero()))
            .ok_or_else(|| ChainError::InvalidParams("transaction cost overflows".into()))?;
        let available = chain.world.balance(&from);
        if available < max_fee {
            return Err(ChainError::InsufficientFunds {
                needed: max_fee,
                available,
            });
        }

        let message = Self::message(from, tx, gas_limit);
        let outcome = match self.executor.transact(&mut chain.world, &env, &message) {
            Ok(result) => TxOutcome {
                hash,
                from,
                to: tx.to,
                contract_address: result.contract_address,
                gas_used: result.gas_used,
                gas_price,
                status: 1,
                logs: result.logs,
            },
            Err(err) => {
                tracing::warn!(?hash, %err, "Transaction failed");
                chain.world.increment_nonce(&from);
                TxOutcome {
                    hash,
                    from,
                    to: tx.to,
                    contract_address: None,
                    gas_used: gas_limit,
                    gas_price,
                    status: 0,
                    logs: Vec::new(),
                }
            }
        };

        let fee = gas_price * U256::from(outcome.gas_used);
        chain.world.debit(from, fee)?;

        tracing::debug!(
            ?hash,
            block = env.number,
            gas_used = outcome.gas_used,
            status = outcome.status,
            "Transaction mined"
        );
        let logs = chain.mine_block(&env, Some(outcome));
        Self::notify(&mut inner.subscribers, &logs);
        Ok(hash)
    }

    /// Deliver new logs, dropping subscribers whose receiver is gone
    fn notify(subscribers: &mut Vec<Subscriber>, logs: &[Log]) {
        subscribers.retain(|subscriber| {
            logs.iter()
                .filter(|log| subscriber.filter.matches(log))
                .all(|log| subscriber.sender.send(log.clone()).is_ok())
                && !subscriber.sender.is_closed()
        });
    }

    fn transaction_hash(from: Address, nonce: u64, tx: &TransactionRequest) -> H256 {
        let mut preimage = Vec::new();
        preimage.extend_from_slice(from.as_bytes());
        preimage.extend_from_slice(&nonce.to_be_bytes());
        if let Some(to) = tx.to {
            preimage.extend_from_slice(to.as_bytes());
        }
        let mut value = [0u8; 32];
        tx.value_or_zero().to_big_endian(&mut value);
        preimage.extend_from_slice(&value);
        preimage.extend_from_slice(&tx.data_or_empty());
        H256::from(keccak256(&preimage))
    }
}

#[async_trait]
impl Provider for Devnet {
    async fn chain_id(&self) -> ChainResult<ChainId> {
        Ok(self.config.chain_id)
    }

    async fn block_number(&self) -> ChainResult<BlockNumber> {
        Ok(self.inner.read().await.chain.height())
    }

    async fn get_block(&self, number: BlockNumber) -> ChainResult<Option<Block>> {
        Ok(self.inner.read().await.chain.block(number).cloned())
    }

    async fn accounts(&self) -> ChainResult<Vec<Address>> {
        Ok(self.accounts.addresses())
    }

    async fn get_balance(&self, address: Address) -> ChainResult<U256> {
        Ok(self.inner.read().await.chain.world.balance(&address))
    }

    async fn get_code(&self, address: Address) -> ChainResult<Bytes> {
        Ok(self.inner.read().await.chain.world.code(&address))
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> ChainResult<H256> {
        let from = tx
            .from
            .ok_or_else(|| ChainError::InvalidParams("transaction has no sender".into()))?;
        if !self.accounts.contains(&from) {
            return Err(ChainError::UnknownAccount(from));
        }

        let mut inner = self.inner.write().await;
        let hash = Self::transaction_hash(from, inner.chain.world.nonce(&from), &tx);
        self.apply(&mut inner, from, &tx, hash)
    }

    async fn call(&self, tx: &TransactionRequest) -> ChainResult<Bytes> {
        let inner = self.inner.read().await;
        let env = inner.chain.next_env(self.config.chain_id);
        let from = tx.from.unwrap_or_else(|| self.default_sender());
        let gas = tx.gas.map_or(self.config.block_gas_limit, |g| g.low_u64());
        let message = Self::message(from, tx, gas);
        let result = self.executor.simulate(&inner.chain.world, &env, &message)?;
        Ok(result.output)
    }

    async fn get_transaction_receipt(&self, hash: H256) -> ChainResult<Option<TransactionReceipt>> {
        Ok(self.inner.read().await.chain.receipt(&hash).cloned())
    }

    async fn get_logs(&self, filter: &LogFilter) -> ChainResult<Vec<Log>> {
        Ok(self.inner.read().await.chain.logs(filter))
    }

    async fn subscribe_logs(&self, filter: LogFilter) -> ChainResult<LogSubscription> {
        let (sender, subscription) = LogSubscription::channel();
        self.inner
            .write()
            .await
            .subscribers
            .push(Subscriber { filter, sender });
        Ok(subscription)
    }

    async fn increase_time(&self, seconds: u64) -> ChainResult<u64> {
        let offset = self.inner.write().await.chain.increase_time(seconds)?;
        tracing::debug!(seconds, offset, "Clock advanced");
        Ok(offset)
    }

    async fn mine(&self) -> ChainResult<BlockNumber> {
        let mut inner = self.inner.write().await;
        let env = inner.chain.next_env(self.config.chain_id);
        inner.chain.mine_block(&env, None);
        Ok(env.number)
    }

    fn polling_interval(&self) -> Duration {
        POLLING_INTERVAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain_core::units::ether;
    use smart_contracts::abi::encode_call;
    use smart_contracts::contracts::{events_example, simple_storage};
    use chain_core::Token;

    fn devnet() -> Devnet {
        Devnet::builtin().unwrap()
    }

    async fn deploy_storage(devnet: &Devnet, from: Address) -> Address {
        let data = devnet
            .registry()
            .native(simple_storage::NAME)
            .unwrap()
            .deployment_data(&[])
            .unwrap();
        let hash = devnet
            .send_transaction(TransactionRequest::new().from(from).data(data))
            .await
            .unwrap();
        devnet
            .get_transaction_receipt(hash)
            .await
            .unwrap()
            .unwrap()
            .contract_address
            .unwrap()
    }

    #[tokio::test]
    async fn test_value_transfer_charges_gas() {
        let devnet = devnet();
        let accounts = devnet.accounts().await.unwrap();
        let (alice, bob) = (accounts[0], accounts[1]);

        let hash = devnet
            .send_transaction(TransactionRequest::new().from(alice).to(bob).value(ether(1)))
            .await
            .unwrap();
        let receipt = devnet.get_transaction_receipt(hash).await.unwrap().unwrap();

        assert!(receipt.succeeded());
        assert_eq!(receipt.gas_used, 21_000);
        assert_eq!(devnet.get_balance(bob).await.unwrap(), ether(10_001));
        assert_eq!(
            devnet.get_balance(alice).await.unwrap(),
            ether(9_999) - receipt.gas_cost()
        );
        assert_eq!(devnet.block_number().await.unwrap(), 1);
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(16))]

        #[test]
        fn transfers_only_lose_gas(transfers in proptest::collection::vec((0usize..10, 0usize..10, 0u64..50), 1..8)) {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap()
                .block_on(async {
                    let devnet = devnet();
                    let accounts = devnet.accounts().await.unwrap();
                    let mut gas_paid = U256::zero();
                    for (from, to, amount) in transfers {
                        let hash = devnet
                            .send_transaction(
                                TransactionRequest::new()
                                    .from(accounts[from])
                                    .to(accounts[to])
                                    .value(ether(amount)),
                            )
                            .await
                            .unwrap();
                        gas_paid += devnet.get_transaction_receipt(hash).await.unwrap().unwrap().gas_cost();
                    }

                    let mut total = U256::zero();
                    for account in &accounts {
                        total += devnet.get_balance(*account).await.unwrap();
                    }
                    assert_eq!(total + gas_paid, ether(10_000) * U256::from(accounts.len()));
                });
        }
    }

    #[tokio::test]
    async fn test_unknown_sender_rejected() {
        let devnet = devnet();
        let stranger = Address::repeat_byte(0x42);
        let err = devnet
            .send_transaction(TransactionRequest::new().from(stranger).to(stranger))
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::UnknownAccount(_)));
    }

    #[tokio::test]
    async fn test_insufficient_funds() {
        let devnet = devnet();
        let accounts = devnet.accounts().await.unwrap();
        let err = devnet
            .send_transaction(
                TransactionRequest::new()
                    .from(accounts[0])
                    .to(accounts[1])
                    .value(ether(20_000)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::InsufficientFunds { .. }));
        assert_eq!(devnet.block_number().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_deploy_store_and_call() {
        let devnet = devnet();
        let deployer = devnet.accounts().await.unwrap()[0];
        let storage = deploy_storage(&devnet, deployer).await;
        assert!(!devnet.get_code(storage).await.unwrap().is_empty());

        devnet
            .send_transaction(
                TransactionRequest::new()
                    .from(deployer)
                    .to(storage)
                    .data(encode_call("store(uint256)", &[Token::Uint(7.into())])),
            )
            .await
            .unwrap();

        let output = devnet
            .call(&TransactionRequest::new().to(storage).data(encode_call("retrieve()", &[])))
            .await
            .unwrap();
        assert_eq!(U256::from_big_endian(&output), U256::from(7));
    }

    #[tokio::test]
    async fn test_explicit_gas_failure_mines_failed_receipt() {
        let devnet = devnet();
        let deployer = devnet.accounts().await.unwrap()[0];
        let storage = deploy_storage(&devnet, deployer).await;
        let nonce = devnet.transaction_count(deployer).await;

        let hash = devnet
            .send_transaction(
                TransactionRequest::new()
                    .from(deployer)
                    .to(storage)
                    .gas(21_500)
                    .data(encode_call("store(uint256)", &[Token::Uint(7.into())])),
            )
            .await
            .unwrap();
        let receipt = devnet.get_transaction_receipt(hash).await.unwrap().unwrap();
        assert!(!receipt.succeeded());
        assert_eq!(receipt.gas_used, 21_500);
        assert_eq!(devnet.transaction_count(deployer).await, nonce + 1);
    }

    #[tokio::test]
    async fn test_snapshot_and_revert() {
        let devnet = devnet();
        let accounts = devnet.accounts().await.unwrap();
        let id = devnet.snapshot().await;

        devnet
            .send_transaction(TransactionRequest::new().from(accounts[0]).to(accounts[1]).value(ether(5)))
            .await
            .unwrap();
        assert_eq!(devnet.block_number().await.unwrap(), 1);

        assert!(devnet.revert(id).await);
        assert_eq!(devnet.block_number().await.unwrap(), 0);
        assert_eq!(devnet.get_balance(accounts[1]).await.unwrap(), ether(10_000));
        assert!(!devnet.revert(id).await);
    }

    #[tokio::test]
    async fn test_subscription_receives_new_logs() {
        let devnet = devnet();
        let deployer = devnet.accounts().await.unwrap()[0];
        let data = devnet
            .registry()
            .native(events_example::NAME)
            .unwrap()
            .deployment_data(&[])
            .unwrap();
        let hash = devnet
            .send_transaction(TransactionRequest::new().from(deployer).data(data))
            .await
            .unwrap();
        let events = devnet
            .get_transaction_receipt(hash)
            .await
            .unwrap()
            .unwrap()
            .contract_address
            .unwrap();

        let mut subscription = devnet
            .subscribe_logs(LogFilter::new().address(events).event(events_example::STORED_NUMBER))
            .await
            .unwrap();
        devnet
            .send_transaction(
                TransactionRequest::new()
                    .from(deployer)
                    .to(events)
                    .data(encode_call("store(uint256)", &[Token::Uint(40.into())])),
            )
            .await
            .unwrap();

        let log = subscription.next().await.unwrap();
        assert_eq!(log.address, events);
        assert_eq!(log.block_number, 2);

        // empty blocks deliver nothing
        devnet.mine().await.unwrap();
        assert!(tokio::time::timeout(Duration::from_millis(20), subscription.next())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_set_balance() {
        let devnet = devnet();
        let target = Address::repeat_byte(0x11);
        devnet.set_balance(target, ether(3)).await;
        assert_eq!(devnet.get_balance(target).await.unwrap(), ether(3));
    }
}
