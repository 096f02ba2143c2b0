use crate::retry::{RejectionFlag, RetryExecutor};
use crate::wallet::evm::{EvmConnectorInfo, EvmWallet};
use std::sync::Arc;
use wallet_approval_lib_common::error::TransportError;
use web3::types::Address;

/// Thin stateful wrapper over the EVM wallet transport. Tracks the
/// connected account; everything session-shaped is the orchestrator's.
pub struct EvmConnectionAdapter {
    wallet: Arc<dyn EvmWallet>,
    account: Option<Address>,
}

impl EvmConnectionAdapter {
    pub fn new(wallet: Arc<dyn EvmWallet>) -> Self {
        EvmConnectionAdapter {
            wallet,
            account: None,
        }
    }

    pub fn wallet(&self) -> Arc<dyn EvmWallet> {
        self.wallet.clone()
    }

    pub fn list_connectors(&self) -> Vec<EvmConnectorInfo> {
        self.wallet.connectors()
    }

    pub fn account(&self) -> Option<Address> {
        self.account
    }

    pub fn is_connected(&self) -> bool {
        self.account.is_some()
    }

    pub async fn connect(
        &mut self,
        connector_id: &str,
        retry: &RetryExecutor,
        rejection_flag: &RejectionFlag,
    ) -> Result<Address, TransportError> {
        let wallet = self.wallet.clone();
        let connector_id = connector_id.to_string();
        let account = retry
            .execute(rejection_flag, "evm connect", || {
                let wallet = wallet.clone();
                let connector_id = connector_id.clone();
                async move { wallet.connect(&connector_id).await }
            })
            .await?;
        self.account = Some(account.address);
        Ok(account.address)
    }

    /// Best effort; the account is forgotten even when the wallet errors.
    pub async fn disconnect(&mut self) {
        if let Err(err) = self.wallet.disconnect().await {
            log::debug!("evm disconnect failed (ignored): {err}");
        }
        self.account = None;
    }
}
