use std::env;
use std::str::FromStr;
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use wallet_approval_lib::approval::{
    run_approval_flow, ApprovalStatus, APPROVAL_IN_PROGRESS_MESSAGE, FETCH_TARGET_FAILED_MESSAGE,
    TOKEN_NOT_ALLOWED_MESSAGE, TX_CANCELLED_MESSAGE, TX_FAILED_MESSAGE,
    WALLET_NOT_CONNECTED_MESSAGE,
};
use wallet_approval_lib::contracts::{encode_erc20_approve, erc20_approve_selector};
use wallet_approval_lib::orchestrator::EngineTransports;
use wallet_approval_lib::runtime::{
    start_approval_engine_internal, ApprovalRuntime, RuntimeOptions,
};
use wallet_approval_lib::session::SessionStatus;
use wallet_approval_lib::setup::ApprovalSetup;
use wallet_approval_lib::sim::{
    ApproveCall, InstantScheduler, ReportedAllowance, SimEvmWallet, SimRelayConnector,
    SimTronProvider, StaticAdvisory,
};
use wallet_approval_lib::wallet::evm::EvmReceipt;
use wallet_approval_lib::wallet::tron::TronTransactionRequest;
use wallet_approval_lib_common::error::TransportError;
use wallet_approval_lib_common::{
    ChainFamily, ConnectionMethod, OrchestratorEvent, OrchestratorEventContent,
};
use wallet_approval_lib_test::{create_test_config_custom, TEST_EVM_SPENDER, TEST_TRON_SPENDER};
use web3::types::{Address, H256, U256};

const EVM_ACCOUNT: &str = "0xc596aee002ebe98345ce3f967631aaf79cfbdf41";
const TRON_ACCOUNT: &str = "TQ5kV5PRLwnYAKMD5our5e2F5Pgwyghcqz";
const EVM_TOKEN: &str = "0xdac17f958d2ee523a2206206994597c13d831ec7";
const TRON_TOKEN: &str = "TEkxiTehnzSmSe2XqrBj4w32RUN966rdz8";
const OTHER_TRON_TOKEN: &str = "TWm1RRyEaJHzXGmPFVNRVLJkfWTrmy8wcW";

static LOG_INIT: Once = Once::new();

fn init_logging() {
    LOG_INIT.call_once(|| {
        env::set_var(
            "RUST_LOG",
            env::var("RUST_LOG").unwrap_or("info,web3=warn".to_string()),
        );
        env_logger::init();
    });
}

struct TestEngine {
    runtime: ApprovalRuntime,
    tron: Arc<SimTronProvider>,
    relay_connector: Arc<SimRelayConnector>,
    evm: Arc<SimEvmWallet>,
    advisory: Arc<StaticAdvisory>,
    scheduler: Arc<InstantScheduler>,
    events: mpsc::Receiver<OrchestratorEvent>,
}

fn start_engine(
    tron: SimTronProvider,
    tron_allowed_tokens: Option<&[&str]>,
    advisory_tokens: Vec<&str>,
) -> Result<TestEngine, anyhow::Error> {
    init_logging();
    let config = create_test_config_custom("http://127.0.0.1:8000", tron_allowed_tokens);
    let setup = ApprovalSetup::new(&config)?;
    let tron = Arc::new(tron);
    let relay_connector = Arc::new(SimRelayConnector::new(TRON_ACCOUNT));
    let evm = Arc::new(SimEvmWallet::new(Address::from_str(EVM_ACCOUNT).unwrap()));
    let advisory = Arc::new(StaticAdvisory::new(advisory_tokens));
    let scheduler = Arc::new(InstantScheduler::new());
    let (event_sender, events) = mpsc::channel(50);
    let runtime = start_approval_engine_internal(
        setup,
        EngineTransports {
            tron_injected: tron.clone(),
            tron_relay_connector: relay_connector.clone(),
            evm_wallet: evm.clone(),
            advisory: advisory.clone(),
        },
        scheduler.clone(),
        Some(event_sender),
        RuntimeOptions {
            start_readiness_loop: false,
            start_address_listener: false,
        },
    );
    Ok(TestEngine {
        runtime,
        tron,
        relay_connector,
        evm,
        advisory,
        scheduler,
        events,
    })
}

fn drain_events(events: &mut mpsc::Receiver<OrchestratorEvent>) -> Vec<OrchestratorEventContent> {
    let mut contents = Vec::new();
    while let Ok(event) = events.try_recv() {
        contents.push(event.content);
    }
    contents
}

async fn connect_evm(engine: &TestEngine) -> Result<(), anyhow::Error> {
    engine
        .runtime
        .shared_state
        .lock()
        .await
        .connect_evm("injected")
        .await?;
    Ok(())
}

async fn connect_tron(
    engine: &TestEngine,
    method: ConnectionMethod,
) -> Result<(), anyhow::Error> {
    let mut orchestrator = engine.runtime.shared_state.lock().await;
    orchestrator.switch_tab(ChainFamily::Tron).await;
    orchestrator.connect_tron(method).await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_evm_approval_happy_path() -> Result<(), anyhow::Error> {
    let mut engine = start_engine(SimTronProvider::locked(), None, vec![EVM_TOKEN])?;
    connect_evm(&engine).await?;
    run_approval_flow(engine.runtime.shared_state.clone()).await?;

    let snapshot = engine.runtime.shared_state.lock().await.snapshot();
    assert_eq!(snapshot.evm.approval.status, ApprovalStatus::Confirmed);
    assert_eq!(snapshot.evm.approval.token_address.as_deref(), Some(EVM_TOKEN));
    assert_eq!(
        snapshot.evm.approval.tx_hash,
        Some(format!("{:#x}", H256::repeat_byte(0x42)))
    );
    assert_eq!(
        snapshot.evm.approval.amount.as_deref(),
        Some("1000000000000000000")
    );
    assert_eq!(snapshot.evm.error, None);

    let sent = engine.evm.sent_calls();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].from, Address::from_str(EVM_ACCOUNT).unwrap());
    assert_eq!(sent[0].to, Address::from_str(EVM_TOKEN).unwrap());
    let expected_data = encode_erc20_approve(
        Address::from_str(TEST_EVM_SPENDER).unwrap(),
        U256::from_dec_str("1000000000000000000").unwrap(),
    )
    .unwrap();
    assert_eq!(sent[0].data, expected_data);
    assert_eq!(sent[0].data[0..4], erc20_approve_selector());

    assert_eq!(
        engine.advisory.reports(),
        vec![ReportedAllowance {
            wallet_address: EVM_ACCOUNT.to_string(),
            chain_id: 1,
            token_addresses: vec![EVM_TOKEN.to_string()],
        }]
    );

    let events = drain_events(&mut engine.events);
    assert!(matches!(
        events.as_slice(),
        [
            OrchestratorEventContent::ConnectionEstablished { .. },
            OrchestratorEventContent::ApprovalTargetResolved { .. },
            OrchestratorEventContent::ApprovalSubmitted { .. },
            OrchestratorEventContent::ApprovalConfirmed { .. },
            OrchestratorEventContent::ApprovalReported { accepted: true, .. },
        ]
    ));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_tron_injected_approval_happy_path() -> Result<(), anyhow::Error> {
    let engine = start_engine(
        SimTronProvider::unlocked(TRON_ACCOUNT),
        None,
        vec![TRON_TOKEN],
    )?;
    connect_tron(&engine, ConnectionMethod::Injected).await?;
    run_approval_flow(engine.runtime.shared_state.clone()).await?;

    let snapshot = engine.runtime.shared_state.lock().await.snapshot();
    assert_eq!(snapshot.tron.approval.status, ApprovalStatus::Confirmed);
    assert_eq!(
        snapshot.tron.approval.token_address.as_deref(),
        Some(TRON_TOKEN)
    );
    assert_eq!(snapshot.tron.approval.tx_hash.as_deref(), Some("simtron0"));
    assert_eq!(snapshot.tron.approval.amount.as_deref(), Some("1000000"));
    assert_eq!(
        engine.tron.approve_requests(),
        vec![ApproveCall {
            token_address: TRON_TOKEN.to_string(),
            spender_address: TEST_TRON_SPENDER.to_string(),
            amount: U256::from(1_000_000u64),
        }]
    );
    assert_eq!(
        engine.advisory.reports(),
        vec![ReportedAllowance {
            wallet_address: TRON_ACCOUNT.to_string(),
            chain_id: 728126428,
            token_addresses: vec![TRON_TOKEN.to_string()],
        }]
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_tron_relay_approval_signs_descriptor() -> Result<(), anyhow::Error> {
    let engine = start_engine(SimTronProvider::locked(), None, vec![TRON_TOKEN])?;
    connect_tron(&engine, ConnectionMethod::Relay).await?;
    run_approval_flow(engine.runtime.shared_state.clone()).await?;

    let snapshot = engine.runtime.shared_state.lock().await.snapshot();
    assert_eq!(snapshot.tron.approval.status, ApprovalStatus::Confirmed);
    assert_eq!(snapshot.tron.approval.tx_hash.as_deref(), Some("simrelay0"));

    let sessions = engine.relay_connector.created_sessions();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].sign_calls(), 1);
    assert_eq!(
        sessions[0].last_sign_request(),
        Some(TronTransactionRequest {
            to: TRON_TOKEN.to_string(),
            data: "0x095ea7b3".to_string(),
            value: "0".to_string(),
            function_signature: "approve(address,uint256)".to_string(),
            parameter_types: vec!["address".to_string(), "uint256".to_string()],
            parameters: vec![TEST_TRON_SPENDER.to_string(), "1000000".to_string()],
        })
    );
    // the injected provider never sees a relay approval
    assert_eq!(engine.tron.approve_calls(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_second_approval_intent_hits_the_guard() -> Result<(), anyhow::Error> {
    let engine = start_engine(SimTronProvider::locked(), None, vec![EVM_TOKEN])?;
    connect_evm(&engine).await?;
    let gate = Arc::new(Notify::new());
    engine.advisory.gate_fetch(gate.clone());

    let first = tokio::spawn(run_approval_flow(engine.runtime.shared_state.clone()));
    // wait until the first flow is parked inside the advisory call
    tokio::time::timeout(Duration::from_secs(5), async {
        while engine.advisory.fetch_calls() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await?;

    let second = run_approval_flow(engine.runtime.shared_state.clone()).await;
    let err = second.expect_err("second approval should be refused");
    assert!(err.to_string().contains(APPROVAL_IN_PROGRESS_MESSAGE));
    assert_eq!(engine.advisory.fetch_calls(), 1);

    gate.notify_one();
    first.await??;
    let snapshot = engine.runtime.shared_state.lock().await.snapshot();
    assert_eq!(snapshot.evm.approval.status, ApprovalStatus::Confirmed);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_approval_without_wallet_is_refused() -> Result<(), anyhow::Error> {
    let engine = start_engine(SimTronProvider::locked(), None, vec![EVM_TOKEN])?;
    let err = run_approval_flow(engine.runtime.shared_state.clone())
        .await
        .expect_err("approval should require a connected wallet");
    assert!(err.to_string().contains(WALLET_NOT_CONNECTED_MESSAGE));

    let snapshot = engine.runtime.shared_state.lock().await.snapshot();
    assert_eq!(snapshot.evm.approval.status, ApprovalStatus::Idle);
    assert_eq!(
        snapshot.evm.error.as_deref(),
        Some(WALLET_NOT_CONNECTED_MESSAGE)
    );
    assert_eq!(engine.advisory.fetch_calls(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_empty_advisory_answer_fails_the_approval() -> Result<(), anyhow::Error> {
    let mut engine = start_engine(SimTronProvider::locked(), None, vec![])?;
    connect_evm(&engine).await?;
    run_approval_flow(engine.runtime.shared_state.clone()).await?;

    let snapshot = engine.runtime.shared_state.lock().await.snapshot();
    assert_eq!(snapshot.evm.approval.status, ApprovalStatus::Failed);
    assert_eq!(
        snapshot.evm.error.as_deref(),
        Some(FETCH_TARGET_FAILED_MESSAGE)
    );
    assert_eq!(engine.evm.send_calls(), 0);

    let events = drain_events(&mut engine.events);
    match events.last() {
        Some(OrchestratorEventContent::ApprovalFailed { family, message }) => {
            assert_eq!(*family, ChainFamily::Evm);
            assert_eq!(message, FETCH_TARGET_FAILED_MESSAGE);
        }
        other => panic!("unexpected trailing event: {other:?}"),
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_advisory_outage_fails_the_approval() -> Result<(), anyhow::Error> {
    let engine = start_engine(SimTronProvider::locked(), None, vec![EVM_TOKEN])?;
    connect_evm(&engine).await?;
    engine.advisory.set_fail_fetch(true);
    run_approval_flow(engine.runtime.shared_state.clone()).await?;

    let snapshot = engine.runtime.shared_state.lock().await.snapshot();
    assert_eq!(snapshot.evm.approval.status, ApprovalStatus::Failed);
    assert_eq!(
        snapshot.evm.error.as_deref(),
        Some(FETCH_TARGET_FAILED_MESSAGE)
    );
    assert_eq!(engine.evm.send_calls(), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_token_outside_allow_list_is_refused() -> Result<(), anyhow::Error> {
    let engine = start_engine(
        SimTronProvider::unlocked(TRON_ACCOUNT),
        Some(&[TRON_TOKEN]),
        vec![OTHER_TRON_TOKEN],
    )?;
    connect_tron(&engine, ConnectionMethod::Injected).await?;
    run_approval_flow(engine.runtime.shared_state.clone()).await?;

    let snapshot = engine.runtime.shared_state.lock().await.snapshot();
    assert_eq!(snapshot.tron.approval.status, ApprovalStatus::Failed);
    assert_eq!(
        snapshot.tron.error.as_deref(),
        Some(TOKEN_NOT_ALLOWED_MESSAGE)
    );
    assert_eq!(engine.tron.approve_calls(), 0);
    assert!(engine.advisory.reports().is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_user_cancelled_transaction() -> Result<(), anyhow::Error> {
    let engine = start_engine(SimTronProvider::locked(), None, vec![EVM_TOKEN])?;
    connect_evm(&engine).await?;
    engine
        .evm
        .script_send(vec![Err(TransportError::rejected("user denied signature"))]);
    run_approval_flow(engine.runtime.shared_state.clone()).await?;

    let snapshot = engine.runtime.shared_state.lock().await.snapshot();
    assert_eq!(snapshot.evm.approval.status, ApprovalStatus::Failed);
    assert_eq!(snapshot.evm.approval.tx_hash, None);
    assert_eq!(snapshot.evm.error.as_deref(), Some(TX_CANCELLED_MESSAGE));
    // a declined signature latches the rejection flag and is never retried
    assert!(snapshot.evm.rejected);
    assert_eq!(snapshot.evm.session.status(), SessionStatus::Ready);
    assert_eq!(engine.evm.send_calls(), 1);
    assert!(engine.advisory.reports().is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_transient_submission_failures_are_retried() -> Result<(), anyhow::Error> {
    let engine = start_engine(SimTronProvider::locked(), None, vec![EVM_TOKEN])?;
    connect_evm(&engine).await?;
    engine.evm.script_send(vec![
        Err(TransportError::transient("rpc hiccup")),
        Err(TransportError::transient("rpc hiccup")),
    ]);
    run_approval_flow(engine.runtime.shared_state.clone()).await?;

    let snapshot = engine.runtime.shared_state.lock().await.snapshot();
    assert_eq!(snapshot.evm.approval.status, ApprovalStatus::Confirmed);
    assert_eq!(
        snapshot.evm.approval.tx_hash,
        Some(format!("{:#x}", H256::repeat_byte(0x42)))
    );
    assert!(!snapshot.evm.rejected);
    assert_eq!(engine.evm.send_calls(), 3);
    assert_eq!(
        engine.scheduler.sleeps(),
        vec![Duration::from_millis(1000), Duration::from_millis(1000)]
    );
    assert_eq!(engine.advisory.reports().len(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reverted_transaction_fails_the_approval() -> Result<(), anyhow::Error> {
    let mut engine = start_engine(SimTronProvider::locked(), None, vec![EVM_TOKEN])?;
    connect_evm(&engine).await?;
    engine.evm.script_receipt(vec![Ok(EvmReceipt {
        tx_hash: H256::repeat_byte(0x42),
        success: false,
    })]);
    run_approval_flow(engine.runtime.shared_state.clone()).await?;

    let snapshot = engine.runtime.shared_state.lock().await.snapshot();
    assert_eq!(snapshot.evm.approval.status, ApprovalStatus::Failed);
    assert_eq!(snapshot.evm.approval.tx_hash, None);
    assert_eq!(snapshot.evm.error.as_deref(), Some(TX_FAILED_MESSAGE));
    assert!(engine.advisory.reports().is_empty());

    let events = drain_events(&mut engine.events);
    assert!(events
        .iter()
        .any(|event| matches!(event, OrchestratorEventContent::ApprovalSubmitted { .. })));
    match events.last() {
        Some(OrchestratorEventContent::ApprovalFailed { message, .. }) => {
            assert_eq!(message, TX_FAILED_MESSAGE);
        }
        other => panic!("unexpected trailing event: {other:?}"),
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_report_failure_keeps_the_confirmation() -> Result<(), anyhow::Error> {
    let mut engine = start_engine(SimTronProvider::locked(), None, vec![EVM_TOKEN])?;
    connect_evm(&engine).await?;
    engine.advisory.set_fail_report(true);
    run_approval_flow(engine.runtime.shared_state.clone()).await?;

    let snapshot = engine.runtime.shared_state.lock().await.snapshot();
    assert_eq!(snapshot.evm.approval.status, ApprovalStatus::Confirmed);
    assert_eq!(snapshot.evm.error, None);
    assert!(engine.advisory.reports().is_empty());

    let events = drain_events(&mut engine.events);
    match events.last() {
        Some(OrchestratorEventContent::ApprovalReported {
            tokens, accepted, ..
        }) => {
            assert_eq!(tokens, &vec![EVM_TOKEN.to_string()]);
            assert!(!*accepted);
        }
        other => panic!("unexpected trailing event: {other:?}"),
    }
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_tron_provider_locking_mid_flow() -> Result<(), anyhow::Error> {
    let engine = start_engine(
        SimTronProvider::unlocked(TRON_ACCOUNT),
        None,
        vec![TRON_TOKEN],
    )?;
    connect_tron(&engine, ConnectionMethod::Injected).await?;
    // the wallet locks between connect and approve
    engine.tron.set_ready(false);
    run_approval_flow(engine.runtime.shared_state.clone()).await?;

    let snapshot = engine.runtime.shared_state.lock().await.snapshot();
    assert_eq!(snapshot.tron.approval.status, ApprovalStatus::Failed);
    assert_eq!(snapshot.tron.error.as_deref(), Some(TX_FAILED_MESSAGE));
    // a provider that went away is not a user decline
    assert!(!snapshot.tron.rejected);
    assert_eq!(engine.tron.approve_calls(), 0);
    Ok(())
}
