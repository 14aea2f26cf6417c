// deploy/src/harness.rs

//! Wait for a contract event, then assert on chain state
//!
//! The listener is registered (`arm`) before the triggering transaction is
//! sent (`fire`), so an event emitted by the trigger itself is never
//! missed. Trigger, wait and check together are bounded by a timeout.

use chain_core::{ChainError, ContractHandle, DecodedEvent, LogSubscription, Provider};
use std::fmt::{Debug, Display};
use std::future::Future;
use std::time::Duration;

/// Bound used when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessState {
    Idle,
    Armed,
    Fulfilled,
    Failed,
}

impl HarnessState {
    /// Final state of a fired listener
    pub fn of<R>(result: &Result<R, HarnessError>) -> Self {
        match result {
            Ok(_) => HarnessState::Fulfilled,
            Err(_) => HarnessState::Failed,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("assertion failed: {0}")]
    Assertion(String),

    #[error("trigger failed: {0}")]
    Trigger(String),

    #[error("no {event} event within {timeout:?}")]
    Timeout { event: String, timeout: Duration },

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Fail with `Assertion` unless `condition` holds
pub fn ensure(condition: bool, message: impl Into<String>) -> Result<(), HarnessError> {
    if condition {
        Ok(())
    } else {
        Err(HarnessError::Assertion(message.into()))
    }
}

/// Fail with `Assertion` unless `left == right`
pub fn ensure_eq<T: PartialEq + Debug>(left: T, right: T, what: &str) -> Result<(), HarnessError> {
    ensure(left == right, format!("{what}: {left:?} != {right:?}"))
}

/// Listener for one named event on one contract, not yet registered
#[derive(Debug)]
pub struct EventListener {
    contract: ContractHandle,
    event: String,
    timeout: Duration,
}

impl EventListener {
    pub fn new(contract: &ContractHandle, event: &str) -> Self {
        Self {
            contract: contract.clone(),
            event: event.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn state(&self) -> HarnessState {
        HarnessState::Idle
    }

    /// Register with the provider. Only events mined from here on are seen.
    pub async fn arm(self) -> Result<ArmedListener, HarnessError> {
        let filter = self.contract.event_filter(&self.event)?;
        let subscription = self.contract.provider().subscribe_logs(filter).await?;
        tracing::debug!(event = %self.event, contract = ?self.contract.address(), "Listener armed");
        Ok(ArmedListener {
            contract: self.contract,
            event: self.event,
            timeout: self.timeout,
            subscription,
        })
    }
}

/// A registered single-shot listener
#[derive(Debug)]
pub struct ArmedListener {
    contract: ContractHandle,
    event: String,
    timeout: Duration,
    subscription: LogSubscription,
}

impl ArmedListener {
    pub fn state(&self) -> HarnessState {
        HarnessState::Armed
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    /// Run `trigger`, wait for the first event, then run `check` on it.
    /// All three share the listener's timeout.
    pub async fn fire<T, E, TF, C, CF, R>(self, trigger: TF, check: C) -> Result<R, HarnessError>
    where
        TF: Future<Output = Result<T, E>>,
        E: Display,
        C: FnOnce(DecodedEvent) -> CF,
        CF: Future<Output = Result<R, HarnessError>>,
    {
        let ArmedListener {
            contract,
            event,
            timeout,
            mut subscription,
        } = self;

        let run = async {
            trigger
                .await
                .map_err(|e| HarnessError::Trigger(e.to_string()))?;
            let log = subscription
                .next()
                .await
                .ok_or(HarnessError::Chain(ChainError::SubscriptionClosed))?;
            let decoded = contract.decode_event(&event, &log)?;
            tracing::info!("{} event fired!", event);
            check(decoded).await
        };

        let result = match tokio::time::timeout(timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(HarnessError::Timeout {
                event: event.clone(),
                timeout,
            }),
        };
        if let Err(e) = &result {
            tracing::error!(event = %event, "Listener failed: {}", e);
        }
        result
    }

    /// Wait for the event without a trigger of our own
    pub async fn wait(self) -> Result<DecodedEvent, HarnessError> {
        self.fire(async { Ok::<_, ChainError>(()) }, |event| async move { Ok(event) })
            .await
    }
}
