use crate::advisory::AdvisoryApi;
use crate::contracts::{
    encode_erc20_approve, erc20_approve_selector, ERC20_APPROVE_PARAMETER_TYPES,
    ERC20_APPROVE_SIGNATURE,
};
use crate::error::ApprovalError;
use crate::orchestrator::Orchestrator;
use crate::retry::{RejectionFlag, RetryExecutor};
use crate::setup::ChainSetup;
use crate::wallet::evm::{EvmCall, EvmWallet};
use crate::wallet::tron::{TronInjectedProvider, TronRelaySession, TronTransactionRequest};
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use wallet_approval_lib_common::error::TransportError;
use wallet_approval_lib_common::ChainFamily;
use web3::types::{Address, H256};

pub const FETCH_TARGET_FAILED_MESSAGE: &str = "Failed to fetch token address";
pub const TOKEN_NOT_ALLOWED_MESSAGE: &str = "Token address not in allowed list";
pub const TX_CANCELLED_MESSAGE: &str = "Transaction was cancelled by user";
pub const TX_FAILED_MESSAGE: &str = "Transaction failed";
pub const WALLET_NOT_CONNECTED_MESSAGE: &str = "Wallet not connected";
pub const APPROVAL_IN_PROGRESS_MESSAGE: &str = "Approval already in progress";
pub const TRON_NOT_READY_MESSAGE: &str = "Tron provider is not ready";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ApprovalStatus {
    Idle,
    FetchingTarget,
    Submitting,
    AwaitingConfirmation,
    Confirmed,
    Failed,
}

/// Lifecycle record of one allowance approval. Mutated only by the
/// orchestrator; the flow below reports outcomes back through it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub chain_family: ChainFamily,
    pub status: ApprovalStatus,
    pub owner_address: Option<String>,
    pub spender_address: Option<String>,
    pub token_address: Option<String>,
    /// Decimal string of the fixed per-deployment amount, smallest unit.
    pub amount: Option<String>,
    pub tx_hash: Option<String>,
    /// Stamped at staging time. Outcome records carrying a different seq
    /// belong to an abandoned flow and are dropped.
    #[serde(skip_serializing)]
    pub seq: u64,
}

impl ApprovalRequest {
    pub fn idle(chain_family: ChainFamily) -> Self {
        ApprovalRequest {
            chain_family,
            status: ApprovalStatus::Idle,
            owner_address: None,
            spender_address: None,
            token_address: None,
            amount: None,
            tx_hash: None,
            seq: 0,
        }
    }

    pub fn in_flight(&self) -> bool {
        matches!(
            self.status,
            ApprovalStatus::FetchingTarget
                | ApprovalStatus::Submitting
                | ApprovalStatus::AwaitingConfirmation
        )
    }

    pub fn reset(&mut self) {
        let seq = self.seq;
        *self = ApprovalRequest::idle(self.chain_family);
        self.seq = seq;
    }
}

/// Everything one staged approval needs outside the state lock.
pub struct ApprovalContext {
    pub seq: u64,
    pub chain_id: i64,
    pub owner_address: String,
    pub chain: ChainSetup,
    pub advisory: Arc<dyn AdvisoryApi>,
    pub retry: RetryExecutor,
    pub rejection: RejectionFlag,
    pub route: ApprovalRoute,
}

pub enum ApprovalRoute {
    Evm {
        wallet: Arc<dyn EvmWallet>,
        owner: Address,
    },
    TronInjected {
        provider: Arc<dyn TronInjectedProvider>,
    },
    TronRelay {
        relay: Arc<dyn TronRelaySession>,
    },
}

pub fn parse_evm_token_address(token: &str) -> Result<Address, TransportError> {
    let trimmed = token.trim();
    let raw = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    Address::from_str(&format!("0x{raw}")).map_err(|err| {
        TransportError::unknown(format!("Advisory returned invalid token address {token}: {err}"))
    })
}

/// Call descriptor shipped to the relay wallet, which cannot ABI-encode
/// locally and receives selector plus typed parameters instead.
pub fn build_approve_descriptor(token: &str, chain: &ChainSetup) -> TronTransactionRequest {
    TronTransactionRequest {
        to: token.to_string(),
        data: format!("0x{}", hex::encode(erc20_approve_selector())),
        value: "0".to_string(),
        function_signature: ERC20_APPROVE_SIGNATURE.to_string(),
        parameter_types: ERC20_APPROVE_PARAMETER_TYPES
            .iter()
            .map(|ty| ty.to_string())
            .collect(),
        parameters: vec![
            chain.spender_address.clone(),
            chain.approval_amount.to_string(),
        ],
    }
}

/// Submission goes through the retry executor like a connect call, a user
/// decline sets the rejection flag. The receipt wait is outside the
/// executor, a submitted transaction is never resubmitted.
pub async fn submit_evm_approval(
    wallet: Arc<dyn EvmWallet>,
    owner: Address,
    token: Address,
    chain: &ChainSetup,
    retry: &RetryExecutor,
    rejection: &RejectionFlag,
) -> Result<H256, TransportError> {
    let spender = chain
        .spender_evm
        .ok_or_else(|| TransportError::unknown("EVM chain setup has no spender address"))?;
    let data = encode_erc20_approve(spender, chain.approval_amount)
        .map_err(|err| TransportError::unknown(format!("Failed to encode approve call: {err}")))?;
    log::info!(
        "submitting ERC-20 approve, token {token:#x}, spender {spender:#x}, chain {}",
        chain.chain_id
    );
    retry
        .execute(rejection, "evm approve", || {
            let wallet = wallet.clone();
            let data = data.clone();
            async move {
                wallet
                    .send_transaction(EvmCall {
                        from: owner,
                        to: token,
                        data,
                    })
                    .await
            }
        })
        .await
}

pub async fn submit_tron_injected_approval(
    provider: Arc<dyn TronInjectedProvider>,
    token: &str,
    chain: &ChainSetup,
    retry: &RetryExecutor,
    rejection: &RejectionFlag,
) -> Result<String, TransportError> {
    let readiness = provider.readiness().await;
    if readiness.usable_address().is_none() {
        return Err(TransportError::not_ready(TRON_NOT_READY_MESSAGE));
    }
    log::info!(
        "submitting Tron approve through extension, token {token}, chain {}",
        chain.chain_id
    );
    retry
        .execute(rejection, "tron injected approve", || {
            let provider = provider.clone();
            let token = token.to_string();
            let spender = chain.spender_address.clone();
            let amount = chain.approval_amount;
            async move { provider.approve_token(&token, &spender, amount).await }
        })
        .await
}

pub async fn submit_tron_relay_approval(
    relay: Arc<dyn TronRelaySession>,
    token: &str,
    chain: &ChainSetup,
    retry: &RetryExecutor,
    rejection: &RejectionFlag,
) -> Result<String, TransportError> {
    let request = build_approve_descriptor(token, chain);
    log::info!(
        "submitting Tron approve through relay, token {token}, chain {}",
        chain.chain_id
    );
    retry
        .execute(rejection, "tron relay approve", || {
            let relay = relay.clone();
            let request = request.clone();
            async move { relay.sign_transaction(&request).await }
        })
        .await
}

/// Drives one approval from advisory answer to reporting.
///
/// The state lock is taken only around stage and record steps, never across
/// wallet or network calls, so status stays readable and a second approve
/// intent hits the in-progress guard instead of queueing behind the lock.
pub async fn run_approval_flow(
    shared_state: Arc<Mutex<Orchestrator>>,
) -> Result<(), ApprovalError> {
    let ctx = { shared_state.lock().await.stage_approval()? };

    let advisory_answer = ctx
        .advisory
        .fetch_target(&ctx.owner_address, ctx.chain_id)
        .await;
    let token = {
        let mut orchestrator = shared_state.lock().await;
        match orchestrator.record_advisory_answer(ctx.seq, advisory_answer).await {
            Some(token) => token,
            None => return Ok(()),
        }
    };

    let confirmed = match &ctx.route {
        ApprovalRoute::Evm { wallet, owner } => {
            let submitted = match parse_evm_token_address(&token) {
                Ok(token_address) => {
                    submit_evm_approval(
                        wallet.clone(),
                        *owner,
                        token_address,
                        &ctx.chain,
                        &ctx.retry,
                        &ctx.rejection,
                    )
                    .await
                }
                Err(err) => Err(err),
            };
            match submitted {
                Ok(tx_hash) => {
                    shared_state
                        .lock()
                        .await
                        .record_approval_submitted(ctx.seq, &format!("{tx_hash:#x}"))
                        .await;
                    match wallet.wait_for_receipt(tx_hash).await {
                        Ok(receipt) if receipt.success => {
                            shared_state
                                .lock()
                                .await
                                .record_approval_confirmed(ctx.seq)
                                .await
                        }
                        Ok(_) => {
                            shared_state
                                .lock()
                                .await
                                .record_approval_failure(
                                    ctx.seq,
                                    &TransportError::unknown(TX_FAILED_MESSAGE),
                                )
                                .await;
                            false
                        }
                        Err(err) => {
                            shared_state
                                .lock()
                                .await
                                .record_approval_failure(ctx.seq, &err)
                                .await;
                            false
                        }
                    }
                }
                Err(err) => {
                    shared_state
                        .lock()
                        .await
                        .record_approval_failure(ctx.seq, &err)
                        .await;
                    false
                }
            }
        }
        ApprovalRoute::TronInjected { provider } => {
            let submitted = submit_tron_injected_approval(
                provider.clone(),
                &token,
                &ctx.chain,
                &ctx.retry,
                &ctx.rejection,
            )
            .await;
            record_tron_submission(&shared_state, ctx.seq, submitted).await
        }
        ApprovalRoute::TronRelay { relay } => {
            let submitted = submit_tron_relay_approval(
                relay.clone(),
                &token,
                &ctx.chain,
                &ctx.retry,
                &ctx.rejection,
            )
            .await;
            record_tron_submission(&shared_state, ctx.seq, submitted).await
        }
    };
    if !confirmed {
        return Ok(());
    }

    // reporting runs strictly after confirmation and never reverses it
    let report = ctx
        .advisory
        .report_completion(&ctx.owner_address, ctx.chain_id, std::slice::from_ref(&token))
        .await;
    if let Err(ref err) = report {
        log::warn!("allowance reporting failed for {token}: {err}");
    }
    shared_state
        .lock()
        .await
        .record_report_outcome(ctx.seq, &token, report.is_ok())
        .await;
    Ok(())
}

/// Tron has no receipt wait, a resolved submission is the confirmation.
async fn record_tron_submission(
    shared_state: &Arc<Mutex<Orchestrator>>,
    seq: u64,
    submitted: Result<String, TransportError>,
) -> bool {
    match submitted {
        Ok(tx_id) => {
            let mut orchestrator = shared_state.lock().await;
            orchestrator.record_approval_submitted(seq, &tx_id).await;
            orchestrator.record_approval_confirmed(seq).await
        }
        Err(err) => {
            shared_state
                .lock()
                .await
                .record_approval_failure(seq, &err)
                .await;
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::ChainSetup;
    use web3::types::U256;

    fn tron_chain() -> ChainSetup {
        ChainSetup {
            chain_name: "Tron".to_string(),
            chain_id: 728126428,
            family: ChainFamily::Tron,
            spender_address: "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".to_string(),
            spender_evm: None,
            approval_amount: U256::from_dec_str("1000000").unwrap(),
            allowed_tokens: None,
            block_explorer_url: None,
        }
    }

    #[test]
    fn test_approve_descriptor_shape() {
        let request = build_approve_descriptor("TEkxiTehnzSmSe2XqrBj4w32RUN966rdz8", &tron_chain());
        assert_eq!(request.data, "0x095ea7b3");
        assert_eq!(request.value, "0");
        assert_eq!(request.function_signature, "approve(address,uint256)");
        assert_eq!(request.parameter_types, vec!["address", "uint256"]);
        assert_eq!(
            request.parameters,
            vec![
                "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t".to_string(),
                "1000000".to_string()
            ]
        );
    }

    #[test]
    fn test_parse_evm_token_address() {
        let bare = parse_evm_token_address("dac17f958d2ee523a2206206994597c13d831ec7").unwrap();
        let prefixed =
            parse_evm_token_address("0xdac17f958d2ee523a2206206994597c13d831ec7").unwrap();
        assert_eq!(bare, prefixed);
        assert!(parse_evm_token_address("not an address").is_err());
    }

    #[test]
    fn test_approval_request_reset_keeps_seq() {
        let mut request = ApprovalRequest::idle(ChainFamily::Evm);
        request.seq = 7;
        request.status = ApprovalStatus::Submitting;
        request.token_address = Some("0xdead".to_string());
        request.amount = Some("1000000".to_string());
        assert!(request.in_flight());
        request.reset();
        assert_eq!(request.status, ApprovalStatus::Idle);
        assert_eq!(request.seq, 7);
        assert!(request.token_address.is_none());
        assert!(request.amount.is_none());
        assert!(!request.in_flight());
    }
}
