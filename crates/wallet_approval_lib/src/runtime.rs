use crate::config::Config;
use crate::error::ApprovalError;
use crate::orchestrator::{
    run_tron_readiness_poll, run_tron_status_check, EngineTransports, Orchestrator,
};
use crate::scheduler::{Scheduler, TokioScheduler};
use crate::setup::ApprovalSetup;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use wallet_approval_lib_common::{init_metrics, OrchestratorEvent};

#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    pub start_readiness_loop: bool,
    pub start_address_listener: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        RuntimeOptions {
            start_readiness_loop: true,
            start_address_listener: true,
        }
    }
}

/// Running engine. All intents go through `shared_state`; the background
/// loops are stopped by [`ApprovalRuntime::stop`] or on drop.
pub struct ApprovalRuntime {
    pub shared_state: Arc<Mutex<Orchestrator>>,
    pub setup: ApprovalSetup,
    runtime_handles: Vec<JoinHandle<()>>,
}

impl ApprovalRuntime {
    pub fn stop(&mut self) {
        for handle in self.runtime_handles.drain(..) {
            handle.abort();
        }
    }

    pub async fn join(&mut self) {
        for handle in self.runtime_handles.drain(..) {
            let _ = handle.await;
        }
    }
}

impl Drop for ApprovalRuntime {
    fn drop(&mut self) {
        self.stop();
    }
}

pub async fn start_approval_engine(
    config: &Config,
    transports: EngineTransports,
    event_sender: Option<mpsc::Sender<OrchestratorEvent>>,
    options: RuntimeOptions,
) -> Result<ApprovalRuntime, ApprovalError> {
    let setup = ApprovalSetup::new(config)?;
    init_metrics();
    let scheduler: Arc<dyn Scheduler> = Arc::new(TokioScheduler);
    Ok(start_approval_engine_internal(
        setup,
        transports,
        scheduler,
        event_sender,
        options,
    ))
}

/// Scheduler-injected variant for tests driving time themselves.
pub fn start_approval_engine_internal(
    setup: ApprovalSetup,
    transports: EngineTransports,
    scheduler: Arc<dyn Scheduler>,
    event_sender: Option<mpsc::Sender<OrchestratorEvent>>,
    options: RuntimeOptions,
) -> ApprovalRuntime {
    let orchestrator = Orchestrator::new(setup.clone(), transports, scheduler.clone(), event_sender);
    let address_receiver = orchestrator.subscribe_tron_address_changes();
    let shared_state = Arc::new(Mutex::new(orchestrator));
    let mut runtime_handles = Vec::new();
    if options.start_readiness_loop {
        runtime_handles.push(tokio::spawn(readiness_poll_loop(
            shared_state.clone(),
            scheduler,
            setup.readiness_poll_interval(),
        )));
    }
    if options.start_address_listener {
        runtime_handles.push(tokio::spawn(address_change_loop(
            shared_state.clone(),
            address_receiver,
        )));
    }
    ApprovalRuntime {
        shared_state,
        setup,
        runtime_handles,
    }
}

async fn readiness_poll_loop(
    shared_state: Arc<Mutex<Orchestrator>>,
    scheduler: Arc<dyn Scheduler>,
    interval: Duration,
) {
    log::debug!("starting readiness poll loop, interval {interval:?}");
    loop {
        run_tron_readiness_poll(shared_state.clone()).await;
        scheduler.sleep(interval).await;
    }
}

async fn address_change_loop(
    shared_state: Arc<Mutex<Orchestrator>>,
    mut receiver: broadcast::Receiver<String>,
) {
    log::debug!("starting address change listener");
    loop {
        match receiver.recv().await {
            Ok(address) => {
                log::debug!("provider reported address change to {address}");
                shared_state.lock().await.handle_address_changed().await;
                run_tron_status_check(shared_state.clone()).await;
            }
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("address change listener lagged, {skipped} event(s) dropped");
            }
            Err(RecvError::Closed) => {
                log::debug!("address change channel closed, listener exiting");
                break;
            }
        }
    }
}
