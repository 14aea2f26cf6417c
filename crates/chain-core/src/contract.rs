// chain-core/src/contract.rs
use crate::{
    Abi, Address, Bytes, ChainError, ChainResult, Log, LogFilter, PendingTransaction, Provider,
    Token, TransactionReceipt, TransactionRequest, U256,
};
use ethers_core::abi::RawLog;
use std::fmt;
use std::sync::Arc;

/// A deployed contract bound to a provider and, optionally, a sender
#[derive(Clone)]
pub struct ContractHandle {
    address: Address,
    abi: Arc<Abi>,
    provider: Arc<dyn Provider>,
    sender: Option<Address>,
}

/// An event log decoded against the contract ABI
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    pub name: String,
    pub params: Vec<(String, Token)>,
    pub log: Log,
}

impl DecodedEvent {
    pub fn param(&self, name: &str) -> Option<&Token> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }
}

impl ContractHandle {
    pub fn new(address: Address, abi: Abi, provider: Arc<dyn Provider>) -> Self {
        Self {
            address,
            abi: Arc::new(abi),
            provider,
            sender: None,
        }
    }

    /// Rebind the handle to another sender
    pub fn connect(&self, sender: Address) -> Self {
        Self {
            sender: Some(sender),
            ..self.clone()
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn abi(&self) -> &Abi {
        &self.abi
    }

    pub fn provider(&self) -> Arc<dyn Provider> {
        self.provider.clone()
    }

    pub fn sender(&self) -> Option<Address> {
        self.sender
    }

    /// ABI-encode a call to `method`
    pub fn encode_call(&self, method: &str, args: &[Token]) -> ChainResult<Bytes> {
        let function = self.abi.function(method)?;
        Ok(function.encode_input(args)?.into())
    }

    fn request(&self, data: Bytes) -> TransactionRequest {
        let tx = TransactionRequest::new().to(self.address).data(data);
        match self.sender {
            Some(sender) => tx.from(sender),
            None => tx,
        }
    }

    /// Read-only call returning the decoded outputs
    pub async fn call(&self, method: &str, args: &[Token]) -> ChainResult<Vec<Token>> {
        let function = self.abi.function(method)?;
        let data = Bytes::from(function.encode_input(args)?);
        let output = self.provider.call(&self.request(data)).await?;
        Ok(function.decode_output(&output)?)
    }

    /// Read-only call returning the first output
    pub async fn query(&self, method: &str, args: &[Token]) -> ChainResult<Token> {
        self.call(method, args)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ChainError::Abi(format!("{method} returned no values")))
    }

    pub async fn query_uint(&self, method: &str, args: &[Token]) -> ChainResult<U256> {
        self.query(method, args)
            .await?
            .into_uint()
            .ok_or_else(|| ChainError::Abi(format!("{method} did not return a uint")))
    }

    pub async fn query_address(&self, method: &str, args: &[Token]) -> ChainResult<Address> {
        self.query(method, args)
            .await?
            .into_address()
            .ok_or_else(|| ChainError::Abi(format!("{method} did not return an address")))
    }

    /// State-changing call
    pub async fn send(&self, method: &str, args: &[Token]) -> ChainResult<PendingTransaction> {
        self.send_with_value(method, args, U256::zero()).await
    }

    pub async fn send_with_value(
        &self,
        method: &str,
        args: &[Token],
        value: U256,
    ) -> ChainResult<PendingTransaction> {
        let data = self.encode_call(method, args)?;
        let mut tx = self.request(data);
        if !value.is_zero() {
            tx = tx.value(value);
        }
        let hash = self.provider.send_transaction(tx).await?;
        Ok(PendingTransaction::new(hash, self.provider.clone()))
    }

    /// Filter selecting `event` logs emitted by this contract
    pub fn event_filter(&self, event: &str) -> ChainResult<LogFilter> {
        let event = self.abi.event(event)?;
        Ok(LogFilter::new().address(self.address).topic(0, event.signature()))
    }

    pub fn decode_event(&self, event: &str, log: &Log) -> ChainResult<DecodedEvent> {
        let abi_event = self.abi.event(event)?;
        if log.topics.first() != Some(&abi_event.signature()) {
            return Err(ChainError::Abi(format!("log is not a {event} event")));
        }
        let parsed = abi_event.parse_log(RawLog {
            topics: log.topics.clone(),
            data: log.data.to_vec(),
        })?;
        Ok(DecodedEvent {
            name: event.to_string(),
            params: parsed.params.into_iter().map(|p| (p.name, p.value)).collect(),
            log: log.clone(),
        })
    }

    /// All `event` logs from this contract in a receipt, decoded
    pub fn events_in(&self, event: &str, receipt: &TransactionReceipt) -> ChainResult<Vec<DecodedEvent>> {
        let filter = self.event_filter(event)?;
        receipt
            .logs
            .iter()
            .filter(|log| filter.matches(log))
            .map(|log| self.decode_event(event, log))
            .collect()
    }
}

impl fmt::Debug for ContractHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractHandle")
            .field("address", &self.address)
            .field("sender", &self.sender)
            .finish()
    }
}
