use crate::retry::{RejectionFlag, RetryExecutor};
use crate::scheduler::Scheduler;
use crate::setup::ApprovalSetup;
use crate::wallet::tron::{TronInjectedProvider, TronRelayConnector, TronRelaySession};
use std::sync::Arc;
use std::time::Duration;
use wallet_approval_lib_common::error::TransportError;
use wallet_approval_lib_common::ConnectionMethod;

pub const INSTALL_WALLET_MESSAGE: &str = "Please install the Tron wallet extension";
pub const UNLOCK_WALLET_MESSAGE: &str = "Please install or unlock the Tron wallet extension";
pub const CONNECTION_REJECTED_MESSAGE: &str = "Connection was rejected";
pub const WALLET_ACCESS_FAILED_MESSAGE: &str = "Failed to access wallet";

/// One cycle of the bounded readiness probe loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessProbe {
    NoExtension,
    /// The provider object itself reports a persisted rejection.
    ProviderRejected,
    Ready {
        address: String,
    },
    NotReady,
}

/// Result of a status check against both Tron transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusCheck {
    /// An existing connection was found and can be adopted as a session.
    Adopted {
        address: String,
        method: ConnectionMethod,
    },
    /// The provider reports a persisted user rejection.
    ProviderRejected,
    Unresolved,
}

/// Unifies the injected extension and the remote relay behind one
/// connection surface. Owns the relay object lifecycle; all session state
/// proper (address, status) lives with the orchestrator.
pub struct TronSessionManager {
    injected: Arc<dyn TronInjectedProvider>,
    relay_connector: Arc<dyn TronRelayConnector>,
    relay: Option<Arc<dyn TronRelaySession>>,
    scheduler: Arc<dyn Scheduler>,
    web_ready: bool,
    probe_attempts: u64,
    probe_delay: Duration,
    settle_delay: Duration,
    status_attempts: u32,
    status_delay: Duration,
}

impl TronSessionManager {
    pub fn new(
        injected: Arc<dyn TronInjectedProvider>,
        relay_connector: Arc<dyn TronRelayConnector>,
        scheduler: Arc<dyn Scheduler>,
        setup: &ApprovalSetup,
    ) -> Self {
        TronSessionManager {
            injected,
            relay_connector,
            relay: None,
            scheduler,
            web_ready: false,
            probe_attempts: setup.readiness_probe_attempts.max(1),
            probe_delay: setup.readiness_probe_delay(),
            settle_delay: setup.settle_delay(),
            status_attempts: setup.status_check_attempts.max(1),
            status_delay: setup.status_check_delay(),
        }
    }

    pub fn injected_provider(&self) -> Arc<dyn TronInjectedProvider> {
        self.injected.clone()
    }

    pub fn relay_session(&self) -> Option<Arc<dyn TronRelaySession>> {
        self.relay.clone()
    }

    pub fn has_relay(&self) -> bool {
        self.relay.is_some()
    }

    /// True once the injected provider reported itself initialized. Reset
    /// by disconnects and negative probes.
    pub fn is_web_ready(&self) -> bool {
        self.web_ready
    }

    /// Records an adopted probe verdict.
    pub fn note_web_ready(&mut self, ready: bool) {
        self.web_ready = ready;
    }

    /// Captures the transports and probe bounds for a check that runs
    /// without the state lock. The snapshot holds plain Arc clones, so a
    /// relay torn down in the meantime stays alive for the probing side
    /// but its answer no longer matters to anyone.
    pub fn probe(&self) -> TronStatusProbe {
        TronStatusProbe {
            injected: self.injected.clone(),
            relay: self.relay.clone(),
            scheduler: self.scheduler.clone(),
            probe_attempts: self.probe_attempts,
            probe_delay: self.probe_delay,
            status_attempts: self.status_attempts,
            status_delay: self.status_delay,
        }
    }

    /// Connects through the injected extension. Account access goes through
    /// the retry executor, then the provider gets a settle delay before its
    /// state is read back.
    pub async fn connect_injected(
        &mut self,
        retry: &RetryExecutor,
        rejection_flag: &RejectionFlag,
    ) -> Result<String, TransportError> {
        let readiness = self.injected.readiness().await;
        if !readiness.installed {
            return Err(TransportError::not_ready(INSTALL_WALLET_MESSAGE));
        }
        let provider = self.injected.clone();
        retry
            .execute(rejection_flag, "tron injected connect", || {
                let provider = provider.clone();
                async move { provider.request_accounts().await }
            })
            .await?;
        self.scheduler.sleep(self.settle_delay).await;
        let readiness = self.injected.readiness().await;
        if readiness.rejected {
            return Err(TransportError::rejected(CONNECTION_REJECTED_MESSAGE));
        }
        match readiness.usable_address() {
            Some(address) => {
                self.web_ready = true;
                Ok(address.to_string())
            }
            None => Err(TransportError::unknown(WALLET_ACCESS_FAILED_MESSAGE)),
        }
    }

    /// Connects through the relay. Any previous relay object is torn down
    /// first and a fresh one built, a stale handshake is never reused.
    pub async fn connect_relay(
        &mut self,
        retry: &RetryExecutor,
        rejection_flag: &RejectionFlag,
    ) -> Result<String, TransportError> {
        self.cleanup_relay().await;
        let relay = self.relay_connector.create()?;
        let session = relay.clone();
        let account = retry
            .execute(rejection_flag, "tron relay connect", || {
                let session = session.clone();
                async move { session.connect().await }
            })
            .await?;
        if account.address.is_empty() {
            rejection_flag.set();
            return Err(TransportError::rejected(CONNECTION_REJECTED_MESSAGE));
        }
        self.relay = Some(relay);
        Ok(account.address)
    }

    /// Drops the relay object, disconnecting remotely first when the
    /// handshake still reports an address. All failures are ignored, the
    /// object is discarded either way.
    pub async fn cleanup_relay(&mut self) {
        if let Some(relay) = self.relay.take() {
            match relay.check_connect_status().await {
                Ok(status) if status.address.is_some() => {
                    if let Err(err) = relay.disconnect().await {
                        log::debug!("relay disconnect failed (ignored): {err}");
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    log::debug!("relay status check during cleanup failed (ignored): {err}");
                }
            }
        }
    }

    pub async fn disconnect(&mut self) {
        self.cleanup_relay().await;
        self.web_ready = false;
    }
}

/// Snapshot of the Tron transports for probing outside the state lock.
/// Probing never mutates; the orchestrator decides what an outcome means
/// once it holds the lock again.
#[derive(Clone)]
pub struct TronStatusProbe {
    injected: Arc<dyn TronInjectedProvider>,
    relay: Option<Arc<dyn TronRelaySession>>,
    scheduler: Arc<dyn Scheduler>,
    probe_attempts: u64,
    probe_delay: Duration,
    status_attempts: u32,
    status_delay: Duration,
}

impl TronStatusProbe {
    /// Bounded probe loop over the injected provider. One cycle of the
    /// background readiness poll.
    pub async fn probe_readiness(&self) -> ReadinessProbe {
        for attempt in 0..self.probe_attempts {
            let readiness = self.injected.readiness().await;
            if !readiness.installed {
                return ReadinessProbe::NoExtension;
            }
            if readiness.rejected {
                return ReadinessProbe::ProviderRejected;
            }
            if let Some(address) = readiness.usable_address() {
                return ReadinessProbe::Ready {
                    address: address.to_string(),
                };
            }
            if attempt + 1 < self.probe_attempts {
                self.scheduler.sleep(self.probe_delay).await;
            }
        }
        ReadinessProbe::NotReady
    }

    /// Looks for an existing connection to adopt, relay first, then the
    /// injected provider. Bounded retries with a delay in between; a set
    /// rejection flag stops the check immediately.
    pub async fn check_status(&self, rejection_flag: &RejectionFlag) -> StatusCheck {
        if rejection_flag.is_set() {
            return StatusCheck::Unresolved;
        }
        let mut attempt = 0;
        loop {
            if let Some(relay) = &self.relay {
                match relay.check_connect_status().await {
                    Ok(status) => {
                        if let Some(address) =
                            status.address.filter(|address| !address.is_empty())
                        {
                            return StatusCheck::Adopted {
                                address,
                                method: ConnectionMethod::Relay,
                            };
                        }
                    }
                    Err(err) => {
                        log::debug!("relay status check failed: {err}");
                    }
                }
            }
            let readiness = self.injected.readiness().await;
            if readiness.rejected {
                return StatusCheck::ProviderRejected;
            }
            if let Some(address) = readiness.usable_address() {
                return StatusCheck::Adopted {
                    address: address.to_string(),
                    method: ConnectionMethod::Injected,
                };
            }
            attempt += 1;
            if attempt >= self.status_attempts || rejection_flag.is_set() {
                return StatusCheck::Unresolved;
            }
            self.scheduler.sleep(self.status_delay).await;
        }
    }
}
