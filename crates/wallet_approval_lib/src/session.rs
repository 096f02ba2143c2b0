use serde::Serialize;
use wallet_approval_lib_common::{ChainFamily, ConnectionMethod};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Ready,
    Rejected,
    Error,
}

/// Connection record for one chain family.
///
/// Fields are private so every transition goes through the methods below,
/// which maintain the rule that an address is present exactly when the
/// status is [`SessionStatus::Ready`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSession {
    chain_family: ChainFamily,
    address: Option<String>,
    connection_method: ConnectionMethod,
    status: SessionStatus,
}

impl WalletSession {
    pub fn disconnected(chain_family: ChainFamily) -> Self {
        WalletSession {
            chain_family,
            address: None,
            connection_method: ConnectionMethod::None,
            status: SessionStatus::Disconnected,
        }
    }

    pub fn mark_connecting(&mut self) {
        self.address = None;
        self.connection_method = ConnectionMethod::None;
        self.status = SessionStatus::Connecting;
    }

    pub fn mark_ready(&mut self, address: String, method: ConnectionMethod) {
        self.address = Some(address);
        self.connection_method = method;
        self.status = SessionStatus::Ready;
    }

    pub fn mark_rejected(&mut self) {
        self.address = None;
        self.connection_method = ConnectionMethod::None;
        self.status = SessionStatus::Rejected;
    }

    pub fn mark_error(&mut self) {
        self.address = None;
        self.connection_method = ConnectionMethod::None;
        self.status = SessionStatus::Error;
    }

    pub fn reset(&mut self) {
        self.address = None;
        self.connection_method = ConnectionMethod::None;
        self.status = SessionStatus::Disconnected;
    }

    pub fn chain_family(&self) -> ChainFamily {
        self.chain_family
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn connection_method(&self) -> ConnectionMethod {
        self.connection_method
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_ready(&self) -> bool {
        self.status == SessionStatus::Ready
    }
}
