// wallet/src/injected.rs
use crate::{WalletError, WalletResult};
use async_trait::async_trait;
use chain_core::{
    units, Address, ChainResult, ContractHandle, PendingTransaction, Provider, TransactionReceipt,
};
use smart_contracts::{abi::parse_human_abi, contracts::fund_me};
use std::sync::Arc;
use std::time::Duration;

/// An injected wallet: account access plus a provider to send through
#[async_trait]
pub trait InjectedProvider: Send + Sync {
    /// Ask the user to expose their accounts
    async fn request_accounts(&self) -> ChainResult<Vec<Address>>;

    fn provider(&self) -> Arc<dyn Provider>;
}

/// Wallet backed directly by a node's unlocked accounts
pub struct NodeWallet {
    provider: Arc<dyn Provider>,
}

impl NodeWallet {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl InjectedProvider for NodeWallet {
    async fn request_accounts(&self) -> ChainResult<Vec<Address>> {
        self.provider.accounts().await
    }

    fn provider(&self) -> Arc<dyn Provider> {
        self.provider.clone()
    }
}

/// Connection button state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    NotInstalled,
    Connected(Address),
}

impl ConnectionStatus {
    /// Text shown on the connect button
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "Connect",
            ConnectionStatus::NotInstalled => "Install Metamask",
            ConnectionStatus::Connected(_) => "Connected",
        }
    }
}

/// User actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Button {
    Connect,
    /// Fund with an amount in ether, as typed
    Fund(String),
    Balance,
    Withdraw,
}

/// Drives a deployed FundMe through an injected wallet
pub struct WalletClient {
    injected: Option<Arc<dyn InjectedProvider>>,
    contract_address: Address,
    status: ConnectionStatus,
    mine_timeout: Duration,
}

impl WalletClient {
    pub fn new(injected: Option<Arc<dyn InjectedProvider>>, contract_address: Address) -> Self {
        Self {
            injected,
            contract_address,
            status: ConnectionStatus::Disconnected,
            mine_timeout: Duration::from_secs(120),
        }
    }

    /// Bound on how long to wait for a submitted transaction to be mined
    pub fn mine_timeout(mut self, timeout: Duration) -> Self {
        self.mine_timeout = timeout;
        self
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Request account access from the injected wallet
    pub async fn connect(&mut self) -> ConnectionStatus {
        let Some(injected) = &self.injected else {
            self.status = ConnectionStatus::NotInstalled;
            return self.status;
        };

        tracing::info!("Connecting...");
        match injected.request_accounts().await {
            Ok(accounts) => match accounts.first() {
                Some(account) => {
                    self.status = ConnectionStatus::Connected(*account);
                    tracing::info!("Connected");
                }
                None => tracing::error!("Wallet exposed no accounts"),
            },
            Err(e) => tracing::error!("{}", e),
        }
        self.status
    }

    fn injected(&self) -> WalletResult<&Arc<dyn InjectedProvider>> {
        self.injected.as_ref().ok_or(WalletError::NotInstalled)
    }

    fn contract(&self) -> WalletResult<ContractHandle> {
        let injected = self.injected()?;
        let ConnectionStatus::Connected(account) = self.status else {
            return Err(WalletError::NotConnected);
        };
        let abi = parse_human_abi(fund_me::ABI)?;
        Ok(ContractHandle::new(self.contract_address, abi, injected.provider()).connect(account))
    }

    /// Fund the contract with `amount` ether
    pub async fn fund(&self, amount: &str) -> WalletResult<TransactionReceipt> {
        let value = units::parse_ether(amount).map_err(|e| WalletError::InvalidAmount(e.to_string()))?;
        tracing::info!("Funding with {}...", amount);
        let pending = self.contract()?.send_with_value("fund", &[], value).await?;
        self.listen_for_transaction_mine(pending).await
    }

    pub async fn withdraw(&self) -> WalletResult<TransactionReceipt> {
        tracing::info!("Withdrawing...");
        let pending = self.contract()?.send("withdraw", &[]).await?;
        self.listen_for_transaction_mine(pending).await
    }

    /// Contract balance, formatted in ether
    pub async fn balance(&self) -> WalletResult<String> {
        let provider = self.injected()?.provider();
        let balance = provider.get_balance(self.contract_address).await?;
        let formatted = units::format_ether(balance);
        tracing::info!("{}", formatted);
        Ok(formatted)
    }

    /// Log the hash, wait for the first confirmation, log the confirmation count
    pub async fn listen_for_transaction_mine(
        &self,
        pending: PendingTransaction,
    ) -> WalletResult<TransactionReceipt> {
        tracing::info!("Mining {:?}", pending.hash());
        let provider = self.injected()?.provider();
        let receipt = pending.wait(1, self.mine_timeout).await?;
        let head = provider.block_number().await?;
        let confirmations = head.saturating_sub(receipt.block_number) + 1;
        tracing::info!("Completed with {} confirmations.", confirmations);
        Ok(receipt)
    }

    /// Handle a button press. Errors are logged, never returned.
    pub async fn click(&mut self, button: Button) {
        let result = match button {
            Button::Connect => {
                self.connect().await;
                Ok(())
            }
            Button::Fund(amount) => self.fund(&amount).await.map(|_| ()),
            Button::Balance => self.balance().await.map(|_| ()),
            Button::Withdraw => self.withdraw().await.map(|_| ()),
        };
        match result {
            Err(WalletError::NotInstalled) => {
                tracing::error!("Please install MetaMask");
            }
            Err(e) => tracing::error!("{}", e),
            Ok(()) => {}
        }
    }
}
