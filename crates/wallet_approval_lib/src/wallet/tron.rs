use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use wallet_approval_lib_common::error::TransportError;
use web3::types::U256;

/// Snapshot of the injected Tron provider as seen from the page.
#[derive(Debug, Clone, Default)]
pub struct TronReadiness {
    /// Extension object is present at all.
    pub installed: bool,
    /// Provider finished its own initialization.
    pub ready: bool,
    /// Provider reports a persisted user rejection instead of a provider object.
    pub rejected: bool,
    pub default_address: Option<String>,
}

impl TronReadiness {
    pub fn usable_address(&self) -> Option<&str> {
        if !self.ready {
            return None;
        }
        self.default_address
            .as_deref()
            .filter(|address| !address.is_empty())
    }
}

/// Transaction descriptor handed to the relay wallet for remote signing.
/// The relay cannot encode locally, so the call is shipped as selector
/// plus typed parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TronTransactionRequest {
    pub to: String,
    /// 0x prefixed 4-byte function selector
    pub data: String,
    /// Always "0" for approvals
    pub value: String,
    pub function_signature: String,
    pub parameter_types: Vec<String>,
    pub parameters: Vec<String>,
}

/// Browser-extension side of the Tron transport.
#[async_trait]
pub trait TronInjectedProvider: Send + Sync {
    async fn readiness(&self) -> TronReadiness;

    /// Asks the extension for account access. A user decline must surface
    /// as [`TransportError::Rejected`].
    async fn request_accounts(&self) -> Result<(), TransportError>;

    /// Resolves the token contract in the provider and submits an approve
    /// call, returning the transaction id.
    async fn approve_token(
        &self,
        token_address: &str,
        spender_address: &str,
        amount: U256,
    ) -> Result<String, TransportError>;

    /// Account switches inside the extension; each message carries the new
    /// default address.
    fn subscribe_address_changes(&self) -> broadcast::Receiver<String>;
}

#[derive(Debug, Clone)]
pub struct RelayAccount {
    pub address: String,
}

#[derive(Debug, Clone, Default)]
pub struct RelayStatus {
    /// Address of the remotely connected wallet, if the handshake still holds.
    pub address: Option<String>,
}

/// One established (or establishable) relay handshake. Obtained from a
/// [`TronRelayConnector`] and discarded whenever the handshake goes stale.
#[async_trait]
pub trait TronRelaySession: Send + Sync {
    async fn connect(&self) -> Result<RelayAccount, TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
    async fn check_connect_status(&self) -> Result<RelayStatus, TransportError>;
    async fn sign_transaction(
        &self,
        request: &TronTransactionRequest,
    ) -> Result<String, TransportError>;
}

/// Factory for relay sessions. A fresh session is built for every explicit
/// relay connect so a stale handshake is never reused.
pub trait TronRelayConnector: Send + Sync {
    fn create(&self) -> Result<Arc<dyn TronRelaySession>, TransportError>;
}

/// Cheap shape check for base58check Tron addresses. Full checksum
/// validation is the wallet's job, this only guards against config typos
/// and obviously malformed advisory answers.
pub fn looks_like_tron_address(address: &str) -> bool {
    address.len() == 34
        && address.starts_with('T')
        && address
            .chars()
            .all(|c| c.is_ascii_alphanumeric() && !"0OIl".contains(c))
}
