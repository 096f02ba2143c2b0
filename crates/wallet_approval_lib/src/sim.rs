//! Programmable in-process transports. These back the `run --simulate`
//! command and the integration tests, no browser or wallet required.

use crate::advisory::AdvisoryApi;
use crate::err_custom_create;
use crate::error::ApprovalError;
use crate::scheduler::Scheduler;
use crate::wallet::evm::{EvmAccount, EvmCall, EvmConnectorInfo, EvmReceipt, EvmWallet};
use crate::wallet::tron::{
    RelayAccount, RelayStatus, TronInjectedProvider, TronRelayConnector, TronRelaySession,
    TronReadiness, TronTransactionRequest,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use wallet_approval_lib_common::error::TransportError;
use web3::types::{Address, H256, U256};

/// Records requested delays and returns immediately.
#[derive(Default)]
pub struct InstantScheduler {
    sleeps: Mutex<Vec<Duration>>,
}

impl InstantScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Scheduler for InstantScheduler {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApproveCall {
    pub token_address: String,
    pub spender_address: String,
    pub amount: U256,
}

struct SimTronState {
    installed: bool,
    ready: bool,
    rejected: bool,
    default_address: Option<String>,
    request_accounts_script: VecDeque<Result<(), TransportError>>,
    approve_script: VecDeque<Result<String, TransportError>>,
    approvals: Vec<ApproveCall>,
}

/// Scriptable injected Tron provider. Unscripted calls succeed with
/// generated values so happy paths need no setup.
pub struct SimTronProvider {
    state: Mutex<SimTronState>,
    address_events: broadcast::Sender<String>,
    readiness_gate: Mutex<Option<Arc<Notify>>>,
    readiness_calls: AtomicU32,
    request_accounts_calls: AtomicU32,
    approve_calls: AtomicU32,
}

impl SimTronProvider {
    fn with_state(installed: bool, ready: bool, default_address: Option<&str>) -> Self {
        let (address_events, _) = broadcast::channel(16);
        SimTronProvider {
            state: Mutex::new(SimTronState {
                installed,
                ready,
                rejected: false,
                default_address: default_address.map(str::to_string),
                request_accounts_script: VecDeque::new(),
                approve_script: VecDeque::new(),
                approvals: Vec::new(),
            }),
            address_events,
            readiness_gate: Mutex::new(None),
            readiness_calls: AtomicU32::new(0),
            request_accounts_calls: AtomicU32::new(0),
            approve_calls: AtomicU32::new(0),
        }
    }

    pub fn not_installed() -> Self {
        Self::with_state(false, false, None)
    }

    pub fn locked() -> Self {
        Self::with_state(true, false, None)
    }

    pub fn unlocked(address: &str) -> Self {
        Self::with_state(true, true, Some(address))
    }

    pub fn set_installed(&self, installed: bool) {
        self.state.lock().unwrap().installed = installed;
    }

    pub fn set_ready(&self, ready: bool) {
        self.state.lock().unwrap().ready = ready;
    }

    pub fn set_rejected(&self, rejected: bool) {
        self.state.lock().unwrap().rejected = rejected;
    }

    pub fn set_address(&self, address: Option<&str>) {
        self.state.lock().unwrap().default_address = address.map(str::to_string);
    }

    pub fn script_request_accounts(&self, outcomes: Vec<Result<(), TransportError>>) {
        self.state
            .lock()
            .unwrap()
            .request_accounts_script
            .extend(outcomes);
    }

    pub fn script_approve(&self, outcomes: Vec<Result<String, TransportError>>) {
        self.state.lock().unwrap().approve_script.extend(outcomes);
    }

    pub fn emit_address_change(&self, address: &str) {
        // nobody listening is fine
        let _ = self.address_events.send(address.to_string());
    }

    /// Makes readiness block until the notify fires, for tests that need
    /// a status check parked mid-flight.
    pub fn gate_readiness(&self, gate: Arc<Notify>) {
        *self.readiness_gate.lock().unwrap() = Some(gate);
    }

    pub fn readiness_calls(&self) -> u32 {
        self.readiness_calls.load(Ordering::SeqCst)
    }

    pub fn request_accounts_calls(&self) -> u32 {
        self.request_accounts_calls.load(Ordering::SeqCst)
    }

    pub fn approve_calls(&self) -> u32 {
        self.approve_calls.load(Ordering::SeqCst)
    }

    pub fn approve_requests(&self) -> Vec<ApproveCall> {
        self.state.lock().unwrap().approvals.clone()
    }
}

#[async_trait]
impl TronInjectedProvider for SimTronProvider {
    async fn readiness(&self) -> TronReadiness {
        self.readiness_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.readiness_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let state = self.state.lock().unwrap();
        TronReadiness {
            installed: state.installed,
            ready: state.ready,
            rejected: state.rejected,
            default_address: state.default_address.clone(),
        }
    }

    async fn request_accounts(&self) -> Result<(), TransportError> {
        self.request_accounts_calls.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .unwrap()
            .request_accounts_script
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn approve_token(
        &self,
        token_address: &str,
        spender_address: &str,
        amount: U256,
    ) -> Result<String, TransportError> {
        let call = self.approve_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state.approvals.push(ApproveCall {
            token_address: token_address.to_string(),
            spender_address: spender_address.to_string(),
            amount,
        });
        state
            .approve_script
            .pop_front()
            .unwrap_or_else(|| Ok(format!("simtron{call}")))
    }

    fn subscribe_address_changes(&self) -> broadcast::Receiver<String> {
        self.address_events.subscribe()
    }
}

struct SimRelayState {
    connect_script: VecDeque<Result<RelayAccount, TransportError>>,
    sign_script: VecDeque<Result<String, TransportError>>,
    status_address: Option<String>,
    last_sign_request: Option<TronTransactionRequest>,
}

/// Scriptable relay handshake. A successful connect makes the session
/// report its address in later status checks, like the real thing.
pub struct SimRelaySession {
    default_address: String,
    state: Mutex<SimRelayState>,
    connect_calls: AtomicU32,
    disconnect_calls: AtomicU32,
    sign_calls: AtomicU32,
    status_calls: AtomicU32,
}

impl SimRelaySession {
    pub fn new(default_address: &str) -> Self {
        SimRelaySession {
            default_address: default_address.to_string(),
            state: Mutex::new(SimRelayState {
                connect_script: VecDeque::new(),
                sign_script: VecDeque::new(),
                status_address: None,
                last_sign_request: None,
            }),
            connect_calls: AtomicU32::new(0),
            disconnect_calls: AtomicU32::new(0),
            sign_calls: AtomicU32::new(0),
            status_calls: AtomicU32::new(0),
        }
    }

    pub fn script_connect(&self, outcomes: Vec<Result<RelayAccount, TransportError>>) {
        self.state.lock().unwrap().connect_script.extend(outcomes);
    }

    pub fn script_sign(&self, outcomes: Vec<Result<String, TransportError>>) {
        self.state.lock().unwrap().sign_script.extend(outcomes);
    }

    pub fn set_status_address(&self, address: Option<&str>) {
        self.state.lock().unwrap().status_address = address.map(str::to_string);
    }

    pub fn last_sign_request(&self) -> Option<TronTransactionRequest> {
        self.state.lock().unwrap().last_sign_request.clone()
    }

    pub fn connect_calls(&self) -> u32 {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> u32 {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn sign_calls(&self) -> u32 {
        self.sign_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TronRelaySession for SimRelaySession {
    async fn connect(&self) -> Result<RelayAccount, TransportError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        let outcome = state.connect_script.pop_front().unwrap_or_else(|| {
            Ok(RelayAccount {
                address: self.default_address.clone(),
            })
        });
        if let Ok(account) = &outcome {
            state.status_address = Some(account.address.clone());
        }
        outcome
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.state.lock().unwrap().status_address = None;
        Ok(())
    }

    async fn check_connect_status(&self) -> Result<RelayStatus, TransportError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        Ok(RelayStatus {
            address: self.state.lock().unwrap().status_address.clone(),
        })
    }

    async fn sign_transaction(
        &self,
        request: &TronTransactionRequest,
    ) -> Result<String, TransportError> {
        let call = self.sign_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state.last_sign_request = Some(request.clone());
        state
            .sign_script
            .pop_front()
            .unwrap_or_else(|| Ok(format!("simrelay{call}")))
    }
}

/// Hands out relay sessions, pre-seeded ones first, then fresh defaults.
/// Keeps every created session so tests can assert on the lifecycle.
pub struct SimRelayConnector {
    default_address: String,
    pending: Mutex<VecDeque<Arc<SimRelaySession>>>,
    created: Mutex<Vec<Arc<SimRelaySession>>>,
    fail_create: AtomicBool,
}

impl SimRelayConnector {
    pub fn new(default_address: &str) -> Self {
        SimRelayConnector {
            default_address: default_address.to_string(),
            pending: Mutex::new(VecDeque::new()),
            created: Mutex::new(Vec::new()),
            fail_create: AtomicBool::new(false),
        }
    }

    pub fn push_session(&self, session: Arc<SimRelaySession>) {
        self.pending.lock().unwrap().push_back(session);
    }

    pub fn set_fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn created_sessions(&self) -> Vec<Arc<SimRelaySession>> {
        self.created.lock().unwrap().clone()
    }

    pub fn create_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

impl TronRelayConnector for SimRelayConnector {
    fn create(&self) -> Result<Arc<dyn TronRelaySession>, TransportError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(TransportError::unknown("Relay initialization failed"));
        }
        let session = self
            .pending
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Arc::new(SimRelaySession::new(&self.default_address)));
        self.created.lock().unwrap().push(session.clone());
        Ok(session)
    }
}

struct SimEvmState {
    connect_script: VecDeque<Result<EvmAccount, TransportError>>,
    send_script: VecDeque<Result<H256, TransportError>>,
    receipt_script: VecDeque<Result<EvmReceipt, TransportError>>,
    sent: Vec<EvmCall>,
}

pub struct SimEvmWallet {
    default_address: Address,
    connectors: Vec<EvmConnectorInfo>,
    state: Mutex<SimEvmState>,
    connect_calls: AtomicU32,
    disconnect_calls: AtomicU32,
    send_calls: AtomicU32,
}

impl SimEvmWallet {
    pub fn new(default_address: Address) -> Self {
        SimEvmWallet {
            default_address,
            connectors: vec![EvmConnectorInfo {
                id: "injected".to_string(),
                name: "Browser Wallet".to_string(),
                ready: true,
            }],
            state: Mutex::new(SimEvmState {
                connect_script: VecDeque::new(),
                send_script: VecDeque::new(),
                receipt_script: VecDeque::new(),
                sent: Vec::new(),
            }),
            connect_calls: AtomicU32::new(0),
            disconnect_calls: AtomicU32::new(0),
            send_calls: AtomicU32::new(0),
        }
    }

    pub fn with_connectors(mut self, connectors: Vec<EvmConnectorInfo>) -> Self {
        self.connectors = connectors;
        self
    }

    pub fn script_connect(&self, outcomes: Vec<Result<EvmAccount, TransportError>>) {
        self.state.lock().unwrap().connect_script.extend(outcomes);
    }

    pub fn script_send(&self, outcomes: Vec<Result<H256, TransportError>>) {
        self.state.lock().unwrap().send_script.extend(outcomes);
    }

    pub fn script_receipt(&self, outcomes: Vec<Result<EvmReceipt, TransportError>>) {
        self.state.lock().unwrap().receipt_script.extend(outcomes);
    }

    pub fn sent_calls(&self) -> Vec<EvmCall> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn connect_calls(&self) -> u32 {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_calls(&self) -> u32 {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn send_calls(&self) -> u32 {
        self.send_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EvmWallet for SimEvmWallet {
    fn connectors(&self) -> Vec<EvmConnectorInfo> {
        self.connectors.clone()
    }

    async fn connect(&self, _connector_id: &str) -> Result<EvmAccount, TransportError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        self.state
            .lock()
            .unwrap()
            .connect_script
            .pop_front()
            .unwrap_or(Ok(EvmAccount {
                address: self.default_address,
            }))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn send_transaction(&self, call: EvmCall) -> Result<H256, TransportError> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state.sent.push(call);
        state
            .send_script
            .pop_front()
            .unwrap_or(Ok(H256::repeat_byte(0x42)))
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<EvmReceipt, TransportError> {
        self.state
            .lock()
            .unwrap()
            .receipt_script
            .pop_front()
            .unwrap_or(Ok(EvmReceipt {
                tx_hash,
                success: true,
            }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportedAllowance {
    pub wallet_address: String,
    pub chain_id: i64,
    pub token_addresses: Vec<String>,
}

/// Advisory backend answering from a fixed token list.
pub struct StaticAdvisory {
    tokens: Mutex<Vec<String>>,
    fail_fetch: AtomicBool,
    fail_report: AtomicBool,
    fetch_gate: Mutex<Option<Arc<Notify>>>,
    fetch_calls: AtomicU32,
    reports: Mutex<Vec<ReportedAllowance>>,
}

impl StaticAdvisory {
    pub fn new(tokens: Vec<&str>) -> Self {
        StaticAdvisory {
            tokens: Mutex::new(tokens.into_iter().map(str::to_string).collect()),
            fail_fetch: AtomicBool::new(false),
            fail_report: AtomicBool::new(false),
            fetch_gate: Mutex::new(None),
            fetch_calls: AtomicU32::new(0),
            reports: Mutex::new(Vec::new()),
        }
    }

    pub fn set_tokens(&self, tokens: Vec<&str>) {
        *self.tokens.lock().unwrap() = tokens.into_iter().map(str::to_string).collect();
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_report(&self, fail: bool) {
        self.fail_report.store(fail, Ordering::SeqCst);
    }

    /// Makes fetch_target block until the notify fires, for tests that
    /// need a flow parked mid-flight.
    pub fn gate_fetch(&self, gate: Arc<Notify>) {
        *self.fetch_gate.lock().unwrap() = Some(gate);
    }

    pub fn fetch_calls(&self) -> u32 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn reports(&self) -> Vec<ReportedAllowance> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl AdvisoryApi for StaticAdvisory {
    async fn fetch_target(
        &self,
        _wallet_address: &str,
        _chain_id: i64,
    ) -> Result<Option<String>, ApprovalError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.fetch_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(err_custom_create!("simulated advisory outage"));
        }
        Ok(self.tokens.lock().unwrap().first().cloned())
    }

    async fn report_completion(
        &self,
        wallet_address: &str,
        chain_id: i64,
        token_addresses: &[String],
    ) -> Result<(), ApprovalError> {
        if self.fail_report.load(Ordering::SeqCst) {
            return Err(err_custom_create!("simulated advisory outage"));
        }
        self.reports.lock().unwrap().push(ReportedAllowance {
            wallet_address: wallet_address.to_string(),
            chain_id,
            token_addresses: token_addresses.to_vec(),
        });
        Ok(())
    }
}
