//! In-process stand-in for the indexing service, used by the HTTP-level tests.

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Default)]
struct StubState {
    endpoint: String,
    hits: HashMap<String, u32>,
    last_authorization: Option<String>,
    last_accept: Option<String>,
    account_creation_failure: Option<u16>,
    client_creation_failure: Option<u16>,
    blockchain_failure: Option<(u16, u32)>,
    transaction_failure: Option<(u16, u32)>,
    page_size: Option<usize>,
    relative_links: bool,
    no_blockchains: bool,
    testnet_queries: Vec<String>,
    continuations: HashMap<String, Vec<String>>,
    transaction_queries: Vec<Vec<String>>,
}

type Shared = Arc<Mutex<StubState>>;

pub struct StubIndexer {
    state: Shared,
}

impl StubIndexer {
    pub async fn start() -> Self {
        let state: Shared = Arc::default();
        let app = Router::new()
            .route("/accounts", post(create_account))
            .route("/accounts/login", post(login))
            .route("/accounts/:id", get(get_account))
            .route("/clients", get(get_clients).post(create_client))
            .route("/clients/:id", delete(delete_client))
            .route("/blockchains", get(get_blockchains))
            .route("/blockchains/:id", get(get_blockchain))
            .route("/transactions", get(get_transactions))
            .route("/transactions/next/:key", get(get_continuation))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        state.lock().unwrap().endpoint = format!("http://{}", addr);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { state }
    }

    pub fn endpoint(&self) -> String {
        self.state.lock().unwrap().endpoint.clone()
    }

    pub fn hits(&self, path: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .hits
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    pub fn last_authorization(&self) -> Option<String> {
        self.state.lock().unwrap().last_authorization.clone()
    }

    pub fn last_accept(&self) -> Option<String> {
        self.state.lock().unwrap().last_accept.clone()
    }

    pub fn fail_account_creation(&self, status: u16) {
        self.state.lock().unwrap().account_creation_failure = Some(status);
    }

    pub fn fail_client_creation(&self, status: u16) {
        self.state.lock().unwrap().client_creation_failure = Some(status);
    }

    /// Fail the next `times` blockchain lookups (single or listing) with `status`.
    pub fn fail_blockchain(&self, status: u16, times: u32) {
        self.state.lock().unwrap().blockchain_failure = Some((status, times));
    }

    /// Fail the next `times` transaction listings with `status`.
    pub fn fail_transactions(&self, status: u16, times: u32) {
        self.state.lock().unwrap().transaction_failure = Some((status, times));
    }

    /// Split transaction listings into pages of `size`, linked through `_links.next`.
    pub fn paginate(&self, size: usize) {
        self.state.lock().unwrap().page_size = Some(size);
    }

    /// Emit `_links.next` hrefs as paths relative to the endpoint.
    pub fn use_relative_links(&self) {
        self.state.lock().unwrap().relative_links = true;
    }

    /// Answer `GET /blockchains` with an envelope that has no `_embedded`.
    pub fn omit_blockchains(&self) {
        self.state.lock().unwrap().no_blockchains = true;
    }

    /// `testnet` values received by `GET /blockchains`, one entry per request.
    pub fn testnet_queries(&self) -> Vec<String> {
        self.state.lock().unwrap().testnet_queries.clone()
    }

    /// Address filters received by `GET /transactions`, one entry per request.
    pub fn transaction_queries(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().transaction_queries.clone()
    }
}

fn record(state: &Shared, path: &str, headers: &HeaderMap) {
    let mut state = state.lock().unwrap();
    *state.hits.entry(path.to_string()).or_default() += 1;
    state.last_authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.last_accept = headers
        .get("accept")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
}

fn failure(status: u16) -> Response {
    let status = StatusCode::from_u16(status).unwrap();
    (status, Json(json!({ "error": "stub failure" }))).into_response()
}

fn take_failure(slot: &mut Option<(u16, u32)>) -> Option<u16> {
    match slot {
        Some((status, remaining)) if *remaining > 0 => {
            *remaining -= 1;
            Some(*status)
        }
        _ => None,
    }
}

fn account(token: &str) -> Value {
    json!({
        "account_id": "account-1",
        "email": "user@example.com",
        "name": "Test User",
        "token": token,
        "_links": { "self": { "href": "/accounts/account-1" } }
    })
}

/// One confirmed transaction per address, with the address bytes as the raw payload.
fn transaction(address: &str, height: u64) -> Value {
    json!({
        "transaction_id": format!("tx:{}", address),
        "blockchain_id": "bitcoin-testnet",
        "status": "confirmed",
        "timestamp": "2020-05-01T12:00:00Z",
        "block_height": height,
        "raw": STANDARD.encode(address.as_bytes()),
    })
}

fn page(state: &mut StubState, mut addresses: Vec<String>) -> Value {
    let rest = match state.page_size {
        Some(size) if addresses.len() > size => addresses.split_off(size),
        _ => Vec::new(),
    };
    let transactions: Vec<Value> = addresses
        .iter()
        .enumerate()
        .map(|(i, a)| transaction(a, 100 + i as u64))
        .collect();

    let mut links = json!({});
    if !rest.is_empty() {
        let key = format!("{}", state.continuations.len());
        let base = if state.relative_links { "" } else { state.endpoint.as_str() };
        links = json!({ "next": { "href": format!("{}/transactions/next/{}", base, key) } });
        state.continuations.insert(key, rest);
    }

    if transactions.is_empty() {
        json!({ "_links": links })
    } else {
        json!({ "_embedded": { "transactions": transactions }, "_links": links })
    }
}

async fn create_account(State(state): State<Shared>, headers: HeaderMap) -> Response {
    record(&state, "/accounts", &headers);
    if let Some(status) = state.lock().unwrap().account_creation_failure {
        return failure(status);
    }
    (StatusCode::CREATED, Json(account("created-token"))).into_response()
}

async fn login(State(state): State<Shared>, headers: HeaderMap) -> Response {
    record(&state, "/accounts/login", &headers);
    Json(account("login-token")).into_response()
}

async fn get_account(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    record(&state, &format!("/accounts/{}", id), &headers);
    let mut body = account("ignored");
    body["token"] = Value::Null;
    Json(body).into_response()
}

async fn get_clients(State(state): State<Shared>, headers: HeaderMap) -> Response {
    record(&state, "/clients", &headers);
    Json(json!({ "_links": {} })).into_response()
}

async fn create_client(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    record(&state, "/clients", &headers);
    if let Some(status) = state.lock().unwrap().client_creation_failure {
        return failure(status);
    }
    Json(json!({
        "account_id": "account-1",
        "client_id": "client-1",
        "name": body["name"],
        "token": "client-token",
    }))
    .into_response()
}

async fn delete_client(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    record(&state, &format!("/clients/{}", id), &headers);
    StatusCode::NO_CONTENT.into_response()
}

fn blockchain(id: &str) -> Value {
    json!({
        "id": id,
        "name": "Bitcoin",
        "network": "mainnet",
        "is_mainnet": true,
        "block_height": 700_000,
        "verified_height": 699_990,
        "confirmations_until_final": 6,
    })
}

async fn get_blockchains(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    record(&state, "/blockchains", &headers);
    let mut state = state.lock().unwrap();
    if let Some(testnet) = params.get("testnet") {
        state.testnet_queries.push(testnet.clone());
    }
    if let Some(status) = take_failure(&mut state.blockchain_failure) {
        return failure(status);
    }
    if state.no_blockchains {
        return Json(json!({ "_links": {} })).into_response();
    }
    Json(json!({ "_embedded": { "blockchains": [blockchain("bitcoin-mainnet")] } }))
        .into_response()
}

async fn get_blockchain(
    State(state): State<Shared>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    record(&state, &format!("/blockchains/{}", id), &headers);
    if let Some(status) = take_failure(&mut state.lock().unwrap().blockchain_failure) {
        return failure(status);
    }
    Json(blockchain(&id)).into_response()
}

async fn get_transactions(
    State(state): State<Shared>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    record(&state, "/transactions", &headers);
    let mut state = state.lock().unwrap();
    if let Some(status) = take_failure(&mut state.transaction_failure) {
        return failure(status);
    }
    let addresses: Vec<String> = params
        .into_iter()
        .filter(|(k, _)| k == "address[]")
        .map(|(_, v)| v)
        .collect();
    state.transaction_queries.push(addresses.clone());
    Json(page(&mut state, addresses)).into_response()
}

async fn get_continuation(
    State(state): State<Shared>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> Response {
    record(&state, "/transactions/next", &headers);
    let mut state = state.lock().unwrap();
    let addresses = state.continuations.remove(&key).unwrap_or_default();
    Json(page(&mut state, addresses)).into_response()
}
