use actix_web::web::{self, Data};
use actix_web::{App, HttpServer};
use serde_json::{json, Value};
use std::sync::{mpsc, Arc, Mutex};

pub struct AdvisoryStubState {
    tokens: Mutex<Vec<String>>,
    check_requests: Mutex<Vec<Value>>,
    update_requests: Mutex<Vec<Value>>,
}

/// Minimal advisory service bound to an ephemeral localhost port.
/// Records every request body for assertions.
pub struct AdvisoryStub {
    pub base_url: String,
    state: Arc<AdvisoryStubState>,
    server_handle: actix_web::dev::ServerHandle,
}

impl AdvisoryStub {
    pub fn set_tokens(&self, tokens: Vec<&str>) {
        *self.state.tokens.lock().unwrap() =
            tokens.into_iter().map(str::to_string).collect();
    }

    pub fn check_requests(&self) -> Vec<Value> {
        self.state.check_requests.lock().unwrap().clone()
    }

    pub fn update_requests(&self) -> Vec<Value> {
        self.state.update_requests.lock().unwrap().clone()
    }

    pub async fn stop(self) {
        self.server_handle.stop(true).await;
    }
}

async fn check_allowance(
    state: Data<Arc<AdvisoryStubState>>,
    body: web::Json<Value>,
) -> web::Json<Value> {
    state.check_requests.lock().unwrap().push(body.into_inner());
    let tokens: Vec<Value> = state
        .tokens
        .lock()
        .unwrap()
        .iter()
        .map(|token| json!({ "address": token, "symbol": "TOKEN" }))
        .collect();
    web::Json(json!({ "tokensNeedingAllowance": tokens }))
}

async fn update_allowance(
    state: Data<Arc<AdvisoryStubState>>,
    body: web::Json<Value>,
) -> web::Json<Value> {
    state.update_requests.lock().unwrap().push(body.into_inner());
    web::Json(json!({ "message": "Allowances updated successfully" }))
}

/// The server runs on its own thread with its own actix system, so it can
/// be spawned from any test runtime.
pub fn spawn_advisory_stub(tokens: Vec<&str>) -> AdvisoryStub {
    let state = Arc::new(AdvisoryStubState {
        tokens: Mutex::new(tokens.into_iter().map(str::to_string).collect()),
        check_requests: Mutex::new(Vec::new()),
        update_requests: Mutex::new(Vec::new()),
    });
    let thread_state = state.clone();
    let (sender, receiver) = mpsc::channel();
    std::thread::spawn(move || {
        actix_web::rt::System::new().block_on(async move {
            let server = HttpServer::new(move || {
                App::new()
                    .app_data(Data::new(thread_state.clone()))
                    .route(
                        "/api/extension/check-allowance",
                        web::post().to(check_allowance),
                    )
                    .route(
                        "/api/extension/update-allowance",
                        web::post().to(update_allowance),
                    )
            })
            .workers(1)
            .bind(("127.0.0.1", 0))
            .unwrap();
            let port = server.addrs()[0].port();
            let server = server.run();
            sender.send((port, server.handle())).unwrap();
            log::debug!("advisory stub listening on port {port}");
            if let Err(err) = server.await {
                log::error!("advisory stub server failed: {err}");
            }
        });
    });
    let (port, server_handle) = receiver.recv().unwrap();
    AdvisoryStub {
        base_url: format!("http://127.0.0.1:{port}"),
        state,
        server_handle,
    }
}
