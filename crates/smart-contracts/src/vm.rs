// smart-contracts/src/vm.rs

use crate::{
    artifact::ArtifactRegistry,
    gas::{GasMeter, GasSchedule},
    state::WorldState,
    ContractError, ContractResult,
};
use chain_core::{Address, BlockNumber, Bytes, ChainId, Gas, Timestamp, H256, U256};
use ethers_core::utils::get_contract_address;
use std::sync::Arc;

/// Maximum nesting of contract-to-contract calls
pub const MAX_CALL_DEPTH: usize = 64;

/// Block the transaction executes in
#[derive(Debug, Clone)]
pub struct BlockEnv {
    pub number: BlockNumber,
    pub timestamp: Timestamp,
    pub chain_id: ChainId,
}

/// Event log emitted during execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Contract address that emitted the log
    pub address: Address,
    /// Topics (indexed parameters)
    pub topics: Vec<H256>,
    /// Data (non-indexed parameters)
    pub data: Bytes,
}

/// Execution result of a successful transaction
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Gas used (after refunds)
    pub gas_used: Gas,
    /// Return data
    pub output: Bytes,
    /// Logs emitted
    pub logs: Vec<LogEntry>,
    /// Contract address (if deployment)
    pub contract_address: Option<Address>,
}

/// Top-level transaction parameters
#[derive(Debug, Clone)]
pub struct Message {
    /// Caller address
    pub from: Address,
    /// Target contract address (None for deployment)
    pub to: Option<Address>,
    /// Calldata, or init code followed by constructor arguments
    pub data: Bytes,
    /// Value to transfer
    pub value: U256,
    /// Gas limit
    pub gas_limit: Gas,
}

impl Message {
    /// Create a new contract call
    pub fn call(from: Address, to: Address, data: Bytes, value: U256, gas_limit: Gas) -> Self {
        Self {
            from,
            to: Some(to),
            data,
            value,
            gas_limit,
        }
    }

    /// Create a contract deployment
    pub fn deploy(from: Address, init_code: Bytes, value: U256, gas_limit: Gas) -> Self {
        Self {
            from,
            to: None,
            data: init_code,
            value,
            gas_limit,
        }
    }

    /// Check if this is a contract deployment
    pub fn is_deployment(&self) -> bool {
        self.to.is_none()
    }
}

/// Runs transactions against a `WorldState`
#[derive(Debug, Clone)]
pub struct Executor {
    gas: GasSchedule,
    registry: Arc<ArtifactRegistry>,
}

impl Executor {
    pub fn new(registry: Arc<ArtifactRegistry>) -> Self {
        Self {
            gas: GasSchedule::default(),
            registry,
        }
    }

    pub fn with_gas_schedule(registry: Arc<ArtifactRegistry>, gas: GasSchedule) -> Self {
        Self { gas, registry }
    }

    pub fn registry(&self) -> &ArtifactRegistry {
        &self.registry
    }

    pub fn gas_schedule(&self) -> &GasSchedule {
        &self.gas
    }

    /// Execute a transaction. On error the state is left exactly as it was.
    pub fn transact(
        &self,
        state: &mut WorldState,
        env: &BlockEnv,
        message: &Message,
    ) -> ContractResult<ExecutionResult> {
        let snapshot = state.clone();
        let result = self.run(state, env, message);
        if result.is_err() {
            *state = snapshot;
        }
        result
    }

    /// Execute against a throwaway copy of the state
    pub fn simulate(
        &self,
        state: &WorldState,
        env: &BlockEnv,
        message: &Message,
    ) -> ContractResult<ExecutionResult> {
        let mut scratch = state.clone();
        self.run(&mut scratch, env, message)
    }

    fn run(
        &self,
        state: &mut WorldState,
        env: &BlockEnv,
        message: &Message,
    ) -> ContractResult<ExecutionResult> {
        let mut meter = GasMeter::new(message.gas_limit);
        meter.charge(self.gas.intrinsic(message.is_deployment(), &message.data))?;

        let nonce = state.nonce(&message.from);
        state.increment_nonce(&message.from);

        let mut logs = Vec::new();
        let mut frame = Frame {
            executor: self,
            state,
            env,
            meter: &mut meter,
            logs: &mut logs,
        };

        let (output, contract_address) = match message.to {
            None => {
                let address = get_contract_address(message.from, nonce);
                frame.create(message.from, address, message.value, &message.data)?;
                (Bytes::default(), Some(address))
            }
            Some(to) => {
                let output = frame.call(message.from, to, message.value, &message.data, 0)?;
                (output, None)
            }
        };

        Ok(ExecutionResult {
            gas_used: meter.billed(),
            output,
            logs,
            contract_address,
        })
    }
}

/// Mutable execution state shared by every nested call of one transaction
struct Frame<'a> {
    executor: &'a Executor,
    state: &'a mut WorldState,
    env: &'a BlockEnv,
    meter: &'a mut GasMeter,
    logs: &'a mut Vec<LogEntry>,
}

impl<'a> Frame<'a> {
    fn reborrow(&mut self) -> Frame<'_> {
        Frame {
            executor: self.executor,
            state: &mut *self.state,
            env: self.env,
            meter: &mut *self.meter,
            logs: &mut *self.logs,
        }
    }

    fn create(&mut self, deployer: Address, address: Address, value: U256, init_code: &[u8]) -> ContractResult<()> {
        if self.state.is_contract(&address) {
            return Err(ContractError::DeploymentFailed(format!(
                "address collision at {:?}",
                address
            )));
        }

        let executor = self.executor;
        let entry = executor.registry.resolve_init_code(init_code)?;
        let args = entry.decode_constructor_args(init_code)?;
        let code = entry.artifact().bytecode.clone();
        self.meter.charge(executor.gas.code_deposit(code.len()))?;

        self.state.transfer(deployer, address, value)?;

        let contract = {
            let mut ctx = CallContext {
                frame: self.reborrow(),
                address,
                caller: deployer,
                value,
                depth: 0,
            };
            entry.construct(&mut ctx, args)?
        };

        tracing::debug!(name = contract.name(), ?address, "Contract created");
        self.state.install(address, code, contract)
    }

    fn call(&mut self, caller: Address, to: Address, value: U256, data: &[u8], depth: usize) -> ContractResult<Bytes> {
        if depth > MAX_CALL_DEPTH {
            return Err(ContractError::CallDepthExceeded);
        }

        self.state.transfer(caller, to, value)?;

        if !self.state.is_contract(&to) {
            return Ok(Bytes::default());
        }

        let mut contract = self
            .state
            .take_contract(&to)
            .ok_or(ContractError::ReentrantCall(to))?;

        let result = {
            let mut ctx = CallContext {
                frame: self.reborrow(),
                address: to,
                caller,
                value,
                depth,
            };
            contract.execute(&mut ctx, data)
        };

        self.state.restore_contract(to, contract);
        result
    }
}

/// What a native contract sees while handling a call: `msg`, `block`,
/// its own address, storage gas accounting, events and outgoing calls
pub struct CallContext<'a> {
    frame: Frame<'a>,
    address: Address,
    caller: Address,
    value: U256,
    depth: usize,
}

impl<'a> CallContext<'a> {
    /// `msg.sender`
    pub fn sender(&self) -> Address {
        self.caller
    }

    /// `msg.value`
    pub fn value(&self) -> U256 {
        self.value
    }

    /// `address(this)`
    pub fn this(&self) -> Address {
        self.address
    }

    /// `block.timestamp`
    pub fn timestamp(&self) -> Timestamp {
        self.frame.env.timestamp
    }

    /// `block.number`
    pub fn block_number(&self) -> BlockNumber {
        self.frame.env.number
    }

    pub fn chain_id(&self) -> ChainId {
        self.frame.env.chain_id
    }

    pub fn balance_of(&self, address: &Address) -> U256 {
        self.frame.state.balance(address)
    }

    /// `address(this).balance`
    pub fn self_balance(&self) -> U256 {
        self.frame.state.balance(&self.address)
    }

    pub fn gas_used(&self) -> Gas {
        self.frame.meter.used()
    }

    pub fn gas_remaining(&self) -> Gas {
        self.frame.meter.remaining()
    }

    /// Charge raw gas
    pub fn charge(&mut self, amount: Gas) -> ContractResult<()> {
        self.frame.meter.charge(amount)
    }

    /// Charge for reading a storage slot
    pub fn sload(&mut self) -> ContractResult<()> {
        let gas = self.frame.executor.gas.sload;
        self.frame.meter.charge(gas)
    }

    /// Charge for writing a storage slot from `current` to `new`
    pub fn sstore(&mut self, current: U256, new: U256) -> ContractResult<()> {
        let (gas, refund) = self.frame.executor.gas.sstore(current, new);
        self.frame.meter.charge(gas)?;
        self.frame.meter.add_refund(refund);
        Ok(())
    }

    /// Emit an event
    pub fn emit(&mut self, topics: Vec<H256>, data: Bytes) -> ContractResult<()> {
        let gas = self.frame.executor.gas.log(topics.len(), data.len());
        self.frame.meter.charge(gas)?;
        self.frame.logs.push(LogEntry {
            address: self.address,
            topics,
            data,
        });
        Ok(())
    }

    /// Call another contract (or send value to an account)
    pub fn call(&mut self, to: Address, data: &[u8], value: U256) -> ContractResult<Bytes> {
        let exists = self.frame.state.exists(&to);
        let gas = self.frame.executor.gas.call(value, exists);
        self.frame.meter.charge(gas)?;
        let depth = self.depth + 1;
        self.frame.call(self.address, to, value, data, depth)
    }

    /// Low-level call: a failing callee is rolled back and reported as
    /// `Ok(Err(_))` instead of unwinding the caller. Out-of-gas still unwinds.
    pub fn try_call(
        &mut self,
        to: Address,
        data: &[u8],
        value: U256,
    ) -> ContractResult<Result<Bytes, ContractError>> {
        let snapshot = self.frame.state.clone();
        let log_count = self.frame.logs.len();
        match self.call(to, data, value) {
            Ok(output) => Ok(Ok(output)),
            Err(ContractError::OutOfGas) => Err(ContractError::OutOfGas),
            Err(err) => {
                *self.frame.state = snapshot;
                self.frame.logs.truncate(log_count);
                Ok(Err(err))
            }
        }
    }

    /// `payable(to).call{value: amount}("")`, returning whether it succeeded
    pub fn send_value(&mut self, to: Address, amount: U256) -> ContractResult<bool> {
        Ok(self.try_call(to, &[], amount)?.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::encode_call;
    use crate::contracts::simple_storage;
    use chain_core::Token;

    fn setup() -> (Executor, WorldState, BlockEnv, Address) {
        let registry = Arc::new(ArtifactRegistry::builtin().unwrap());
        let executor = Executor::new(registry);
        let mut state = WorldState::new();
        let deployer = Address::from_low_u64_be(0xdead);
        state.set_balance(deployer, U256::exp10(20));
        let env = BlockEnv {
            number: 1,
            timestamp: 1_700_000_000,
            chain_id: 31337,
        };
        (executor, state, env, deployer)
    }

    fn deploy_storage(executor: &Executor, state: &mut WorldState, env: &BlockEnv, deployer: Address) -> Address {
        let init = executor
            .registry()
            .native(simple_storage::NAME)
            .unwrap()
            .deployment_data(&[])
            .unwrap();
        let result = executor
            .transact(state, env, &Message::deploy(deployer, init, U256::zero(), 3_000_000))
            .unwrap();
        result.contract_address.unwrap()
    }

    #[test]
    fn test_simple_deployment() {
        let (executor, mut state, env, deployer) = setup();
        let address = deploy_storage(&executor, &mut state, &env, deployer);

        assert_eq!(address, get_contract_address(deployer, 0u64));
        assert!(state.is_contract(&address));
        assert_eq!(state.contract_name(&address), Some(simple_storage::NAME));
        assert_eq!(state.nonce(&deployer), 1);
    }

    #[test]
    fn test_call_and_gas() {
        let (executor, mut state, env, deployer) = setup();
        let address = deploy_storage(&executor, &mut state, &env, deployer);

        let data = encode_call("store(uint256)", &[Token::Uint(42.into())]);
        let result = executor
            .transact(&mut state, &env, &Message::call(deployer, address, data, U256::zero(), 100_000))
            .unwrap();
        assert!(result.gas_used > 21_000);

        let data = encode_call("retrieve()", &[]);
        let result = executor
            .simulate(&state, &env, &Message::call(deployer, address, data, U256::zero(), 100_000))
            .unwrap();
        assert_eq!(U256::from_big_endian(&result.output), U256::from(42));
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let (executor, mut state, env, deployer) = setup();
        let address = deploy_storage(&executor, &mut state, &env, deployer);
        let nonce = state.nonce(&deployer);

        // out of gas after the nonce bump still restores everything
        let data = encode_call("store(uint256)", &[Token::Uint(42.into())]);
        let err = executor
            .transact(&mut state, &env, &Message::call(deployer, address, data, U256::zero(), 21_500))
            .unwrap_err();
        assert!(matches!(err, ContractError::OutOfGas));
        assert_eq!(state.nonce(&deployer), nonce);
    }

    #[test]
    fn test_value_transfer() {
        let (executor, mut state, env, deployer) = setup();
        let receiver = Address::from_low_u64_be(0xbeef);

        executor
            .transact(
                &mut state,
                &env,
                &Message::call(deployer, receiver, Bytes::default(), U256::from(1000), 21_000),
            )
            .unwrap();
        assert_eq!(state.balance(&receiver), U256::from(1000));
    }

    #[test]
    fn test_unknown_init_code() {
        let (executor, mut state, env, deployer) = setup();
        let err = executor
            .transact(
                &mut state,
                &env,
                &Message::deploy(deployer, vec![0x60, 0x80].into(), U256::zero(), 3_000_000),
            )
            .unwrap_err();
        assert!(matches!(err, ContractError::InvalidBytecode(_)));
    }
}
