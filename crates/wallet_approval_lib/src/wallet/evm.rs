use async_trait::async_trait;
use serde::Serialize;
use wallet_approval_lib_common::error::TransportError;
use web3::types::{Address, H256};

/// One selectable wallet connector (browser extension, embedded wallet, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvmConnectorInfo {
    pub id: String,
    pub name: String,
    pub ready: bool,
}

#[derive(Debug, Clone)]
pub struct EvmAccount {
    pub address: Address,
}

/// Unsigned contract call submitted through the connected wallet.
#[derive(Debug, Clone)]
pub struct EvmCall {
    pub from: Address,
    pub to: Address,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct EvmReceipt {
    pub tx_hash: H256,
    /// Receipt status field, false when the transaction reverted.
    pub success: bool,
}

/// EVM wallet transport. Connector enumeration is synchronous because the
/// underlying wallet libraries expose a static connector list.
#[async_trait]
pub trait EvmWallet: Send + Sync {
    fn connectors(&self) -> Vec<EvmConnectorInfo>;

    async fn connect(&self, connector_id: &str) -> Result<EvmAccount, TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;

    async fn send_transaction(&self, call: EvmCall) -> Result<H256, TransportError>;

    /// Blocks until the transaction is mined and returns its receipt.
    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<EvmReceipt, TransportError>;
}
