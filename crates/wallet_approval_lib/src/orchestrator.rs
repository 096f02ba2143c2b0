use crate::advisory::AdvisoryApi;
use crate::approval::{
    ApprovalContext, ApprovalRequest, ApprovalRoute, ApprovalStatus, APPROVAL_IN_PROGRESS_MESSAGE,
    FETCH_TARGET_FAILED_MESSAGE, TOKEN_NOT_ALLOWED_MESSAGE, TX_CANCELLED_MESSAGE,
    TX_FAILED_MESSAGE, WALLET_NOT_CONNECTED_MESSAGE,
};
use crate::err_custom_create;
use crate::error::ApprovalError;
use crate::evm::EvmConnectionAdapter;
use crate::retry::{RejectionFlag, RetryExecutor, CONNECTION_FAILED_AFTER_RETRIES};
use crate::scheduler::Scheduler;
use crate::session::WalletSession;
use crate::setup::ApprovalSetup;
use crate::tron_session::{
    ReadinessProbe, StatusCheck, TronSessionManager, CONNECTION_REJECTED_MESSAGE,
    UNLOCK_WALLET_MESSAGE,
};
use crate::wallet::evm::{EvmConnectorInfo, EvmWallet};
use crate::wallet::tron::{TronInjectedProvider, TronRelayConnector};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use wallet_approval_lib_common::error::TransportError;
use wallet_approval_lib_common::{
    ChainFamily, ConnectionMethod, OrchestratorEvent, OrchestratorEventContent,
};

pub const CONNECTION_REJECTED_BY_USER_MESSAGE: &str = "Connection was rejected by user";
pub const CONNECT_FAILED_MESSAGE: &str = "Failed to connect";

/// External transports the engine is wired with. Production code passes
/// browser-bridge implementations, tests pass the sim module's fakes.
pub struct EngineTransports {
    pub tron_injected: Arc<dyn TronInjectedProvider>,
    pub tron_relay_connector: Arc<dyn TronRelayConnector>,
    pub evm_wallet: Arc<dyn EvmWallet>,
    pub advisory: Arc<dyn AdvisoryApi>,
}

/// Per-family slice of the orchestrator state.
pub struct FamilyState {
    pub session: WalletSession,
    pub approval: ApprovalRequest,
    pub error: Option<String>,
    pub connecting: bool,
    pub rejection: RejectionFlag,
}

impl FamilyState {
    fn new(family: ChainFamily) -> Self {
        FamilyState {
            session: WalletSession::disconnected(family),
            approval: ApprovalRequest::idle(family),
            error: None,
            connecting: false,
            rejection: RejectionFlag::new(),
        }
    }

    fn reset_transient(&mut self) {
        self.error = None;
        self.connecting = false;
        self.approval.reset();
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilySnapshot {
    pub session: WalletSession,
    pub approval: ApprovalRequest,
    pub error: Option<String>,
    pub connecting: bool,
    pub rejected: bool,
}

impl From<&FamilyState> for FamilySnapshot {
    fn from(state: &FamilyState) -> Self {
        FamilySnapshot {
            session: state.session.clone(),
            approval: state.approval.clone(),
            error: state.error.clone(),
            connecting: state.connecting,
            rejected: state.rejection.is_set(),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorSnapshot {
    pub active_tab: ChainFamily,
    pub dialog_open: bool,
    pub tron_web_ready: bool,
    pub evm_connectors: Vec<EvmConnectorInfo>,
    pub evm: FamilySnapshot,
    pub tron: FamilySnapshot,
}

/// Single writer of all session, error and approval state. Every state
/// change happens through an explicit intent method here; transports and
/// background loops never touch the records themselves.
pub struct Orchestrator {
    setup: ApprovalSetup,
    advisory: Arc<dyn AdvisoryApi>,
    evm: EvmConnectionAdapter,
    tron: TronSessionManager,
    retry: RetryExecutor,
    evm_state: FamilyState,
    tron_state: FamilyState,
    active_tab: ChainFamily,
    dialog_open: bool,
    approval_seq: u64,
    tron_status_seq: u64,
    event_sender: Option<mpsc::Sender<OrchestratorEvent>>,
}

fn connect_error_message(err: &TransportError) -> String {
    match err {
        TransportError::Rejected { .. } => CONNECTION_REJECTED_BY_USER_MESSAGE.to_string(),
        TransportError::NotReady { reason } => reason.clone(),
        TransportError::Transient { reason } if reason == CONNECTION_FAILED_AFTER_RETRIES => {
            reason.clone()
        }
        TransportError::Transient { .. } => CONNECT_FAILED_MESSAGE.to_string(),
        TransportError::Unknown { reason } => reason.clone(),
    }
}

impl Orchestrator {
    pub fn new(
        setup: ApprovalSetup,
        transports: EngineTransports,
        scheduler: Arc<dyn Scheduler>,
        event_sender: Option<mpsc::Sender<OrchestratorEvent>>,
    ) -> Self {
        let retry = RetryExecutor::new(
            setup.connect_max_attempts,
            setup.connect_retry_delay(),
            scheduler.clone(),
        );
        let tron = TronSessionManager::new(
            transports.tron_injected,
            transports.tron_relay_connector,
            scheduler,
            &setup,
        );
        let evm = EvmConnectionAdapter::new(transports.evm_wallet);
        Orchestrator {
            setup,
            advisory: transports.advisory,
            evm,
            tron,
            retry,
            evm_state: FamilyState::new(ChainFamily::Evm),
            tron_state: FamilyState::new(ChainFamily::Tron),
            active_tab: ChainFamily::Evm,
            dialog_open: false,
            approval_seq: 0,
            tron_status_seq: 0,
            event_sender,
        }
    }

    pub fn setup(&self) -> &ApprovalSetup {
        &self.setup
    }

    pub fn active_tab(&self) -> ChainFamily {
        self.active_tab
    }

    pub fn dialog_open(&self) -> bool {
        self.dialog_open
    }

    pub fn family_state(&self, family: ChainFamily) -> &FamilyState {
        match family {
            ChainFamily::Evm => &self.evm_state,
            ChainFamily::Tron => &self.tron_state,
        }
    }

    fn family_state_mut(&mut self, family: ChainFamily) -> &mut FamilyState {
        match family {
            ChainFamily::Evm => &mut self.evm_state,
            ChainFamily::Tron => &mut self.tron_state,
        }
    }

    pub fn tron_manager(&self) -> &TronSessionManager {
        &self.tron
    }

    pub fn subscribe_tron_address_changes(&self) -> broadcast::Receiver<String> {
        self.tron.injected_provider().subscribe_address_changes()
    }

    pub fn snapshot(&self) -> OrchestratorSnapshot {
        OrchestratorSnapshot {
            active_tab: self.active_tab,
            dialog_open: self.dialog_open,
            tron_web_ready: self.tron.is_web_ready(),
            evm_connectors: self.evm.list_connectors(),
            evm: FamilySnapshot::from(&self.evm_state),
            tron: FamilySnapshot::from(&self.tron_state),
        }
    }

    async fn send_event(&self, content: OrchestratorEventContent) {
        if let Some(event_sender) = &self.event_sender {
            let event = OrchestratorEvent::now(content);
            if let Err(err) = event_sender.send(event).await {
                log::error!("Error when sending orchestrator event: {err}");
            }
        }
    }

    /// The serving layer follows every open and tab switch with
    /// [`run_tron_status_check`]; the intent itself only flips state.
    pub async fn open_dialog(&mut self) {
        if self.dialog_open {
            return;
        }
        self.dialog_open = true;
        self.evm_state.reset_transient();
        self.tron_state.reset_transient();
        log::debug!("connect dialog opened");
    }

    /// Sessions that never reached Ready are cleaned up on close so a
    /// half-done handshake cannot linger behind a closed dialog.
    pub async fn close_dialog(&mut self) {
        if !self.dialog_open {
            return;
        }
        self.dialog_open = false;
        if !self.tron_state.session.is_ready() {
            self.tron.cleanup_relay().await;
        }
        if !self.evm_state.session.is_ready() {
            self.evm.disconnect().await;
        }
        self.evm_state.reset_transient();
        self.tron_state.reset_transient();
        log::debug!("connect dialog closed");
    }

    pub async fn switch_tab(&mut self, family: ChainFamily) {
        if self.active_tab == family {
            return;
        }
        if self.active_tab == ChainFamily::Tron && !self.tron_state.session.is_ready() {
            self.tron.cleanup_relay().await;
        }
        self.active_tab = family;
        self.evm_state.reset_transient();
        self.tron_state.reset_transient();
        log::debug!("active tab switched to {family}");
    }

    pub async fn connect_evm(&mut self, connector_id: &str) -> Result<(), ApprovalError> {
        if self.evm_state.connecting {
            return Err(err_custom_create!("EVM connect already in progress"));
        }
        self.evm_state.connecting = true;
        self.evm_state.error = None;
        self.evm_state.rejection.clear();
        self.evm_state.session.mark_connecting();
        log::info!("connecting EVM wallet through connector {connector_id}");
        let rejection = self.evm_state.rejection.clone();
        let retry = self.retry.clone();
        let result = self.evm.connect(connector_id, &retry, &rejection).await;
        match result {
            Ok(address) => {
                let address = format!("{address:#x}");
                self.evm_state
                    .session
                    .mark_ready(address.clone(), ConnectionMethod::Injected);
                metrics::counter!("connect_established", 1, "family" => ChainFamily::Evm.to_string());
                log::info!("EVM wallet connected, account {address}");
                self.send_event(OrchestratorEventContent::ConnectionEstablished {
                    family: ChainFamily::Evm,
                    address,
                    method: ConnectionMethod::Injected,
                })
                .await;
            }
            Err(err) => {
                self.record_connect_failure(ChainFamily::Evm, &err).await;
            }
        }
        self.evm_state.connecting = false;
        Ok(())
    }

    pub async fn connect_tron(&mut self, method: ConnectionMethod) -> Result<(), ApprovalError> {
        if method == ConnectionMethod::None {
            return Err(err_custom_create!("Tron connect intent requires a method"));
        }
        if self.tron_state.connecting {
            return Err(err_custom_create!("Tron connect already in progress"));
        }
        self.tron_state.connecting = true;
        self.tron_state.error = None;
        self.tron_state.rejection.clear();
        self.tron_state.session.mark_connecting();
        log::info!("connecting Tron wallet via {method}");
        let rejection = self.tron_state.rejection.clone();
        let retry = self.retry.clone();
        let result = match method {
            ConnectionMethod::Relay => self.tron.connect_relay(&retry, &rejection).await,
            _ => self.tron.connect_injected(&retry, &rejection).await,
        };
        match result {
            Ok(address) => {
                self.tron_state.session.mark_ready(address.clone(), method);
                metrics::counter!("connect_established", 1, "family" => ChainFamily::Tron.to_string());
                log::info!("Tron wallet connected via {method}, account {address}");
                self.send_event(OrchestratorEventContent::ConnectionEstablished {
                    family: ChainFamily::Tron,
                    address,
                    method,
                })
                .await;
            }
            Err(err) => {
                self.record_connect_failure(ChainFamily::Tron, &err).await;
            }
        }
        self.tron_state.connecting = false;
        Ok(())
    }

    async fn record_connect_failure(&mut self, family: ChainFamily, err: &TransportError) {
        let message = connect_error_message(err);
        let rejected = err.is_rejection();
        {
            let state = self.family_state_mut(family);
            state.error = Some(message.clone());
            if rejected {
                state.rejection.set();
                state.session.mark_rejected();
            } else {
                state.session.mark_error();
            }
        }
        if rejected {
            metrics::counter!("connect_rejected", 1, "family" => family.to_string());
            log::info!("{family} connect rejected by user");
            self.send_event(OrchestratorEventContent::ConnectionRejected { family, message })
                .await;
        } else {
            metrics::counter!("connect_failed", 1, "family" => family.to_string());
            log::warn!("{family} connect failed: {err}");
            self.send_event(OrchestratorEventContent::ConnectionFailed { family, message })
                .await;
        }
    }

    /// Probing only helps while the dialog shows the Tron tab with nothing
    /// connected, no connect running and no standing rejection.
    fn tron_probe_allowed(&self) -> bool {
        self.dialog_open
            && self.active_tab == ChainFamily::Tron
            && !self.tron_state.connecting
            && !self.tron_state.session.is_ready()
            && !self.tron_state.rejection.is_set()
    }

    async fn adopt_tron_status(&mut self, outcome: StatusCheck) {
        match outcome {
            StatusCheck::Adopted { address, method } => {
                if method == ConnectionMethod::Injected {
                    self.tron.note_web_ready(true);
                }
                self.tron_state.session.mark_ready(address.clone(), method);
                self.tron_state.error = None;
                metrics::counter!("connect_adopted", 1, "family" => ChainFamily::Tron.to_string());
                log::info!("adopted existing Tron connection via {method}, account {address}");
                self.send_event(OrchestratorEventContent::ConnectionEstablished {
                    family: ChainFamily::Tron,
                    address,
                    method,
                })
                .await;
            }
            StatusCheck::ProviderRejected => {
                self.tron_state.rejection.set();
                self.tron_state.session.mark_rejected();
                log::debug!("tron provider reports a persisted rejection");
            }
            StatusCheck::Unresolved => {}
        }
    }

    async fn adopt_tron_readiness(&mut self, outcome: ReadinessProbe) {
        let was_ready = self.tron.is_web_ready();
        match outcome {
            ReadinessProbe::NoExtension => {
                self.tron.note_web_ready(false);
            }
            ReadinessProbe::ProviderRejected => {
                self.tron.note_web_ready(false);
                self.tron_state.rejection.set();
                self.tron_state.session.mark_rejected();
                self.tron_state.error = Some(CONNECTION_REJECTED_MESSAGE.to_string());
                log::info!("tron provider reports a persisted rejection, polling stands down");
                self.send_event(OrchestratorEventContent::ConnectionRejected {
                    family: ChainFamily::Tron,
                    message: CONNECTION_REJECTED_MESSAGE.to_string(),
                })
                .await;
            }
            ReadinessProbe::Ready { .. } => {
                self.tron.note_web_ready(true);
                if !was_ready {
                    log::debug!("tron provider became ready");
                    self.send_event(OrchestratorEventContent::ReadinessChanged {
                        family: ChainFamily::Tron,
                        ready: true,
                    })
                    .await;
                }
            }
            ReadinessProbe::NotReady => {
                self.tron.note_web_ready(false);
                if self.tron_state.error.is_none() {
                    self.tron_state.error = Some(UNLOCK_WALLET_MESSAGE.to_string());
                }
                if was_ready {
                    self.send_event(OrchestratorEventContent::ReadinessChanged {
                        family: ChainFamily::Tron,
                        ready: false,
                    })
                    .await;
                }
            }
        }
    }

    /// Reaction to an account switch in the injected provider. A session
    /// that is not ready is left to the status check the listener loop
    /// runs right after this.
    pub async fn handle_address_changed(&mut self) {
        if self.tron_state.rejection.is_set() {
            log::debug!("address change ignored, user rejected connection earlier");
            return;
        }
        if !self.tron_state.session.is_ready() {
            return;
        }
        if self.tron_state.session.connection_method() != ConnectionMethod::Injected {
            return;
        }
        let readiness = self.tron.injected_provider().readiness().await;
        match readiness.usable_address() {
            Some(address) if Some(address) != self.tron_state.session.address() => {
                let address = address.to_string();
                self.tron_state
                    .session
                    .mark_ready(address.clone(), ConnectionMethod::Injected);
                log::info!("tron account switched to {address}");
                self.send_event(OrchestratorEventContent::ConnectionEstablished {
                    family: ChainFamily::Tron,
                    address,
                    method: ConnectionMethod::Injected,
                })
                .await;
            }
            Some(_) => {}
            None => {
                self.tron_state.session.reset();
                self.tron_state.approval.reset();
                log::info!("tron account no longer available, session dropped");
                self.send_event(OrchestratorEventContent::Disconnected {
                    family: ChainFamily::Tron,
                })
                .await;
            }
        }
    }

    /// First locked phase of an approval. Validates, stamps a sequence
    /// number and hands back everything the flow needs outside the lock.
    pub fn stage_approval(&mut self) -> Result<ApprovalContext, ApprovalError> {
        let family = self.active_tab;
        let chain = self.setup.chain_for_family(family)?.clone();
        if self.family_state(family).approval.in_flight() {
            return Err(err_custom_create!("{APPROVAL_IN_PROGRESS_MESSAGE}"));
        }
        let owner_address = match self.family_state(family).session.address() {
            Some(address) => address.to_string(),
            None => {
                self.family_state_mut(family).error =
                    Some(WALLET_NOT_CONNECTED_MESSAGE.to_string());
                return Err(err_custom_create!("{WALLET_NOT_CONNECTED_MESSAGE}"));
            }
        };
        let route = match family {
            ChainFamily::Evm => {
                let owner = self
                    .evm
                    .account()
                    .ok_or_else(|| err_custom_create!("{WALLET_NOT_CONNECTED_MESSAGE}"))?;
                ApprovalRoute::Evm {
                    wallet: self.evm.wallet(),
                    owner,
                }
            }
            ChainFamily::Tron => match self.family_state(family).session.connection_method() {
                ConnectionMethod::Relay => {
                    let relay = self
                        .tron
                        .relay_session()
                        .ok_or_else(|| err_custom_create!("Relay session not available"))?;
                    ApprovalRoute::TronRelay { relay }
                }
                _ => ApprovalRoute::TronInjected {
                    provider: self.tron.injected_provider(),
                },
            },
        };
        self.approval_seq += 1;
        let seq = self.approval_seq;
        let spender_address = chain.spender_address.clone();
        let amount = chain.approval_amount.to_string();
        let chain_id = chain.chain_id;
        let state = self.family_state_mut(family);
        state.error = None;
        state.rejection.clear();
        let rejection = state.rejection.clone();
        state.approval = ApprovalRequest {
            chain_family: family,
            status: ApprovalStatus::FetchingTarget,
            owner_address: Some(owner_address.clone()),
            spender_address: Some(spender_address),
            token_address: None,
            amount: Some(amount),
            tx_hash: None,
            seq,
        };
        log::info!("approval staged for {family}, owner {owner_address}, chain {chain_id}");
        Ok(ApprovalContext {
            seq,
            chain_id,
            owner_address,
            chain,
            advisory: self.advisory.clone(),
            retry: self.retry.clone(),
            rejection,
            route,
        })
    }

    fn family_by_seq(&self, seq: u64) -> Option<ChainFamily> {
        [&self.evm_state, &self.tron_state]
            .into_iter()
            .find(|state| state.approval.seq == seq)
            .map(|state| state.approval.chain_family)
    }

    async fn fail_approval(&mut self, family: ChainFamily, message: &str) {
        {
            let state = self.family_state_mut(family);
            state.approval.status = ApprovalStatus::Failed;
            state.approval.tx_hash = None;
            state.error = Some(message.to_string());
        }
        metrics::counter!("approval_failed", 1, "family" => family.to_string());
        self.send_event(OrchestratorEventContent::ApprovalFailed {
            family,
            message: message.to_string(),
        })
        .await;
    }

    /// Records the advisory answer for a staged approval, returning the
    /// token to submit when the flow should go on.
    pub async fn record_advisory_answer(
        &mut self,
        seq: u64,
        answer: Result<Option<String>, ApprovalError>,
    ) -> Option<String> {
        let family = self.family_by_seq(seq)?;
        if self.family_state(family).approval.status != ApprovalStatus::FetchingTarget {
            log::debug!("dropping advisory answer from an abandoned approval flow");
            return None;
        }
        match answer {
            Err(err) => {
                log::warn!("advisory allowance check failed: {err}");
                self.fail_approval(family, FETCH_TARGET_FAILED_MESSAGE).await;
                None
            }
            Ok(None) => {
                log::info!("advisory lists no token needing an allowance");
                self.fail_approval(family, FETCH_TARGET_FAILED_MESSAGE).await;
                None
            }
            Ok(Some(token)) => {
                let allowed = self
                    .setup
                    .chain_for_family(family)
                    .map(|chain| chain.token_allowed(&token))
                    .unwrap_or(false);
                if !allowed {
                    log::warn!(
                        "advisory token {token} is not on the configured allow-list, refusing"
                    );
                    self.fail_approval(family, TOKEN_NOT_ALLOWED_MESSAGE).await;
                    return None;
                }
                {
                    let state = self.family_state_mut(family);
                    state.approval.token_address = Some(token.clone());
                    state.approval.status = ApprovalStatus::Submitting;
                }
                self.send_event(OrchestratorEventContent::ApprovalTargetResolved {
                    family,
                    token: token.clone(),
                })
                .await;
                Some(token)
            }
        }
    }

    pub async fn record_approval_submitted(&mut self, seq: u64, tx_id: &str) {
        let Some(family) = self.family_by_seq(seq) else {
            return;
        };
        if self.family_state(family).approval.status != ApprovalStatus::Submitting {
            log::debug!("dropping submission record from an abandoned approval flow");
            return;
        }
        {
            let state = self.family_state_mut(family);
            state.approval.tx_hash = Some(tx_id.to_string());
            state.approval.status = ApprovalStatus::AwaitingConfirmation;
        }
        log::info!("approval transaction submitted, id {tx_id}");
        self.send_event(OrchestratorEventContent::ApprovalSubmitted {
            family,
            tx_hash: tx_id.to_string(),
        })
        .await;
    }

    /// Returns true when the confirmation was accepted into the record.
    pub async fn record_approval_confirmed(&mut self, seq: u64) -> bool {
        let Some(family) = self.family_by_seq(seq) else {
            return false;
        };
        if self.family_state(family).approval.status != ApprovalStatus::AwaitingConfirmation {
            log::debug!("dropping confirmation from an abandoned approval flow");
            return false;
        }
        let (token, tx_hash) = {
            let state = self.family_state_mut(family);
            state.approval.status = ApprovalStatus::Confirmed;
            (
                state.approval.token_address.clone().unwrap_or_default(),
                state.approval.tx_hash.clone().unwrap_or_default(),
            )
        };
        metrics::counter!("approval_confirmed", 1, "family" => family.to_string());
        log::info!("approval confirmed for token {token}, tx {tx_hash}");
        self.send_event(OrchestratorEventContent::ApprovalConfirmed {
            family,
            token,
            tx_hash,
        })
        .await;
        true
    }

    pub async fn record_approval_failure(&mut self, seq: u64, err: &TransportError) {
        let Some(family) = self.family_by_seq(seq) else {
            log::debug!("dropping approval failure from an abandoned flow");
            return;
        };
        if !self.family_state(family).approval.in_flight() {
            log::debug!("dropping approval failure from an abandoned flow");
            return;
        }
        let message = match err {
            TransportError::Rejected { .. } => TX_CANCELLED_MESSAGE,
            _ => TX_FAILED_MESSAGE,
        };
        log::warn!("approval failed: {err}");
        self.fail_approval(family, message).await;
    }

    /// Reporting is observability only, a failed report never reverses a
    /// confirmed approval.
    pub async fn record_report_outcome(&mut self, seq: u64, token: &str, accepted: bool) {
        let Some(family) = self.family_by_seq(seq) else {
            return;
        };
        if self.family_state(family).approval.status != ApprovalStatus::Confirmed {
            return;
        }
        if accepted {
            metrics::counter!("report_accepted", 1, "family" => family.to_string());
        } else {
            metrics::counter!("report_failed", 1, "family" => family.to_string());
        }
        self.send_event(OrchestratorEventContent::ApprovalReported {
            family,
            tokens: vec![token.to_string()],
            accepted,
        })
        .await;
    }

    /// User-initiated disconnect of the active family. Always clears the
    /// rejection flag, an explicit disconnect is a fresh start.
    pub async fn disconnect(&mut self) {
        let family = self.active_tab;
        match family {
            ChainFamily::Evm => self.evm.disconnect().await,
            ChainFamily::Tron => self.tron.disconnect().await,
        }
        {
            let state = self.family_state_mut(family);
            state.session.reset();
            state.approval.reset();
            state.error = None;
            state.connecting = false;
            state.rejection.clear();
        }
        log::info!("{family} wallet disconnected");
        self.send_event(OrchestratorEventContent::Disconnected { family })
            .await;
    }
}

/// Adopts an existing Tron connection if either transport reports one.
/// Runs after dialog open, tab focus and address changes, not on a timer.
///
/// The state lock is held only to stage the probe and to apply its
/// outcome, never across the bounded wait loop, so intents are not
/// serialized behind an in-progress check. A stamped sequence number
/// drops the outcome when a newer check was staged in the meantime.
pub async fn run_tron_status_check(shared_state: Arc<Mutex<Orchestrator>>) {
    let (seq, probe, rejection) = {
        let mut orchestrator = shared_state.lock().await;
        if !orchestrator.tron_probe_allowed() {
            return;
        }
        orchestrator.tron_status_seq += 1;
        (
            orchestrator.tron_status_seq,
            orchestrator.tron.probe(),
            orchestrator.tron_state.rejection.clone(),
        )
    };
    let outcome = probe.check_status(&rejection).await;
    let mut orchestrator = shared_state.lock().await;
    if orchestrator.tron_status_seq != seq || !orchestrator.tron_probe_allowed() {
        log::debug!("tron status check outcome discarded as stale");
        return;
    }
    orchestrator.adopt_tron_status(outcome).await;
}

/// One cycle of the background readiness poll. Gated so it goes quiet
/// whenever probing could not lead to a connection anyway; the probe loop
/// runs without the state lock and its verdict is re-validated against
/// the gate before anything is recorded.
pub async fn run_tron_readiness_poll(shared_state: Arc<Mutex<Orchestrator>>) {
    let probe = {
        let orchestrator = shared_state.lock().await;
        if !orchestrator.tron_probe_allowed() {
            return;
        }
        orchestrator.tron.probe()
    };
    let outcome = probe.probe_readiness().await;
    let mut orchestrator = shared_state.lock().await;
    if !orchestrator.tron_probe_allowed() {
        return;
    }
    orchestrator.adopt_tron_readiness(outcome).await;
}
