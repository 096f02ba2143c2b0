use crate::approval::run_approval_flow;
use crate::orchestrator::{run_tron_status_check, Orchestrator};
use crate::setup::ApprovalSetup;
use actix_web::web::Data;
use actix_web::{web, HttpRequest, Responder, Scope};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use wallet_approval_lib_common::{
    export_metrics_to_prometheus, ChainFamily, ConnectionMethod,
};

pub struct ServerData {
    pub shared_state: Arc<Mutex<Orchestrator>>,
    pub setup: ApprovalSetup,
}

macro_rules! return_on_error {
    ( $e:expr ) => {
        match $e {
            Ok(x) => x,
            Err(err) => {
                return web::Json(json!({
                    "error": err.to_string()
                }))
            }
        }
    };
}

pub async fn status(data: Data<Box<ServerData>>) -> impl Responder {
    let orchestrator = data.shared_state.lock().await;
    web::Json(json!({ "snapshot": orchestrator.snapshot() }))
}

pub async fn config_endpoint(data: Data<Box<ServerData>>) -> impl Responder {
    web::Json(json!({ "config": data.setup }))
}

pub async fn metrics_endpoint(_req: HttpRequest) -> impl Responder {
    export_metrics_to_prometheus().unwrap_or_else(|err| {
        log::error!("Failed to export metrics: {err}");
        String::new()
    })
}

pub async fn dialog_open(data: Data<Box<ServerData>>) -> impl Responder {
    {
        let mut orchestrator = data.shared_state.lock().await;
        orchestrator.open_dialog().await;
    }
    run_tron_status_check(data.shared_state.clone()).await;
    let orchestrator = data.shared_state.lock().await;
    web::Json(json!({ "snapshot": orchestrator.snapshot() }))
}

pub async fn dialog_close(data: Data<Box<ServerData>>) -> impl Responder {
    let mut orchestrator = data.shared_state.lock().await;
    orchestrator.close_dialog().await;
    web::Json(json!({ "snapshot": orchestrator.snapshot() }))
}

fn parse_family(family: &str) -> Result<ChainFamily, String> {
    match family {
        "evm" => Ok(ChainFamily::Evm),
        "tron" => Ok(ChainFamily::Tron),
        other => Err(format!("Unknown chain family {other}")),
    }
}

pub async fn switch_tab(data: Data<Box<ServerData>>, req: HttpRequest) -> impl Responder {
    let family = return_on_error!(parse_family(
        req.match_info().get("family").unwrap_or_default()
    ));
    {
        let mut orchestrator = data.shared_state.lock().await;
        orchestrator.switch_tab(family).await;
    }
    run_tron_status_check(data.shared_state.clone()).await;
    let orchestrator = data.shared_state.lock().await;
    web::Json(json!({ "snapshot": orchestrator.snapshot() }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectIntent {
    pub family: ChainFamily,
    pub method: Option<ConnectionMethod>,
    pub connector_id: Option<String>,
}

pub async fn connect(
    data: Data<Box<ServerData>>,
    intent: web::Json<ConnectIntent>,
) -> impl Responder {
    let mut orchestrator = data.shared_state.lock().await;
    match intent.family {
        ChainFamily::Evm => {
            let connector_id = return_on_error!(intent
                .connector_id
                .as_deref()
                .ok_or("EVM connect intent requires connectorId"));
            return_on_error!(orchestrator.connect_evm(connector_id).await);
        }
        ChainFamily::Tron => {
            let method = return_on_error!(intent
                .method
                .ok_or("Tron connect intent requires method"));
            return_on_error!(orchestrator.connect_tron(method).await);
        }
    }
    web::Json(json!({ "snapshot": orchestrator.snapshot() }))
}

pub async fn approve(data: Data<Box<ServerData>>) -> impl Responder {
    return_on_error!(run_approval_flow(data.shared_state.clone()).await);
    let orchestrator = data.shared_state.lock().await;
    web::Json(json!({ "snapshot": orchestrator.snapshot() }))
}

pub async fn disconnect(data: Data<Box<ServerData>>) -> impl Responder {
    let mut orchestrator = data.shared_state.lock().await;
    orchestrator.disconnect().await;
    web::Json(json!({ "snapshot": orchestrator.snapshot() }))
}

pub fn runtime_web_scope(scope: Scope, server_data: Data<Box<ServerData>>) -> Scope {
    let api_scope = Scope::new("/api")
        .app_data(server_data)
        .route("/status", web::get().to(status))
        .route("/config", web::get().to(config_endpoint))
        .route("/metrics", web::get().to(metrics_endpoint))
        .route("/dialog/open", web::post().to(dialog_open))
        .route("/dialog/close", web::post().to(dialog_close))
        .route("/tab/{family}", web::post().to(switch_tab))
        .route("/connect", web::post().to(connect))
        .route("/approve", web::post().to(approve))
        .route("/disconnect", web::post().to(disconnect));
    scope.service(api_scope)
}
