//! # REST + WebSocket + JSON-RPC API
//!
//! Builds the axum router that exposes the hosted token. All endpoints share
//! application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                             | Description                         |
//! |--------|----------------------------------|-------------------------------------|
//! | GET    | `/health`                        | Liveness probe                      |
//! | GET    | `/status`                        | Token configuration and supply      |
//! | GET    | `/accounts/:address`             | Balance and exemption flag          |
//! | GET    | `/allowances/:owner/:spender`    | Approved amount                     |
//! | GET    | `/tax/:amount`                   | Fee estimate for a decimal amount   |
//! | GET    | `/events?since=N`                | Notifications with sequence >= N    |
//! | GET    | `/ws`                            | Live notification stream            |
//! | POST   | `/rpc`                           | JSON-RPC 2.0 gateway                |
//!
//! ## Ordering
//!
//! Every mutating call takes the token write lock, runs the operation,
//! persists the new state and notifications, and broadcasts them before
//! releasing the lock. Operations are therefore applied, stored, and
//! streamed one at a time in a single order. A call whose write fails is
//! rolled back, so memory never runs ahead of the database.

use anyhow::Context;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use levy_contracts::{
    ErrorCategory, FeeVariant, Notification, SequencedNotification, TaxedToken, TokenError,
    TokenResult, TokenState, TransferReceipt,
};
use levy_protocol::storage::{DbError, LevyDB};
use levy_protocol::{Address, Amount};

use crate::config::GenesisSection;
use crate::metrics::SharedMetrics;

/// Broadcast channel capacity for live event streaming.
const EVENT_CHANNEL_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Where committed token state is written.
///
/// [`LevyDB`] is the production store; the seam lets tests observe how
/// `execute` behaves when a write fails.
pub trait TokenStore: Send + Sync {
    /// Persists `state` together with the notifications appended since the
    /// previous call. Either both land or neither does.
    fn persist(&self, state: &TokenState, events: &[(u64, &Notification)]) -> Result<(), DbError>;
}

impl TokenStore for LevyDB {
    fn persist(&self, state: &TokenState, events: &[(u64, &Notification)]) -> Result<(), DbError> {
        self.put_snapshot(state, events)
    }
}

/// Shared application state available to all request handlers.
///
/// Cheap to clone: everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// The hosted token. Always equal to what `store` last persisted.
    pub token: Arc<RwLock<TaxedToken>>,
    /// Persistent storage for the token snapshot and notifications.
    store: Arc<dyn TokenStore>,
    /// Broadcast channel for committed notifications.
    pub event_tx: broadcast::Sender<SequencedNotification>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

impl AppState {
    /// Wraps a token that is already fully persisted in `store`.
    pub fn new(
        version: String,
        token: TaxedToken,
        store: Arc<dyn TokenStore>,
        metrics: SharedMetrics,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        metrics.paused.set(token.is_paused() as i64);
        Self {
            version,
            token: Arc::new(RwLock::new(token)),
            store,
            event_tx,
            metrics,
        }
    }
}

/// Why a mutating call did not complete. In both cases nothing changed.
#[derive(Debug)]
pub enum OperationError {
    /// The token rejected the operation.
    Token(TokenError),
    /// The operation succeeded in memory but could not be stored, so it was
    /// rolled back.
    Storage(DbError),
}

/// Runs a mutating operation under the write lock, then persists and
/// broadcasts what it committed.
///
/// If the store refuses the write, the token is rewound to where it was
/// before `op` ran and no notification is broadcast.
fn execute<T>(
    state: &AppState,
    op: impl FnOnce(&mut TaxedToken) -> TokenResult<T>,
) -> Result<T, OperationError> {
    let _timer = state.metrics.operation_latency_seconds.start_timer();
    let mut token = state.token.write();
    let checkpoint = token.checkpoint();
    let first_new = token.events().next_seq();

    let value = op(&mut *token).map_err(|e| {
        let category = e.category();
        let label = category.to_string();
        state
            .metrics
            .rejected_operations_total
            .with_label_values(&[label.as_str()])
            .inc();
        tracing::debug!(error = %e, %category, "operation rejected");
        OperationError::Token(e)
    })?;

    let pending = token.events().since(first_new).to_vec();
    let records: Vec<(u64, &Notification)> = pending.iter().map(|e| (e.seq, &e.event)).collect();
    if let Err(e) = state.store.persist(token.state(), &records) {
        tracing::error!("failed to persist token state: {}", e);
        token.rewind(checkpoint);
        return Err(OperationError::Storage(e));
    }
    state.metrics.paused.set(token.is_paused() as i64);

    for event in pending {
        // No subscribers is not an error.
        let _ = state.event_tx.send(event);
    }
    Ok(value)
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/accounts/:address", get(account_handler))
        .route("/allowances/:owner/:spender", get(allowance_handler))
        .route("/tax/:amount", get(tax_handler))
        .route("/events", get(events_handler))
        .route("/ws", get(ws_handler))
        .route("/rpc", post(rpc_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// JSON-RPC Types
// ---------------------------------------------------------------------------

pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// JSON-RPC error code for a token failure class.
pub fn category_code(category: ErrorCategory) -> i32 {
    match category {
        ErrorCategory::Authorization => -32010,
        ErrorCategory::Validation => -32011,
        ErrorCategory::Insufficiency => -32012,
        ErrorCategory::Arithmetic => -32013,
        ErrorCategory::Halted => -32014,
        ErrorCategory::Integrity => -32015,
    }
}

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version. Must be "2.0".
    pub jsonrpc: String,
    /// The method to invoke.
    pub method: String,
    /// Named method parameters.
    pub params: Option<serde_json::Value>,
    /// Request identifier. Echoed back in the response.
    pub id: serde_json::Value,
}

/// A JSON-RPC 2.0 response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version. Always "2.0".
    pub jsonrpc: String,
    /// The result on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// The error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    /// Request identifier, echoed from the request.
    pub id: serde_json::Value,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code.
    pub code: i32,
    /// Short human-readable error description.
    pub message: String,
    /// Optional structured error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

impl From<TokenError> for JsonRpcError {
    fn from(e: TokenError) -> Self {
        let category = e.category();
        Self {
            code: category_code(category),
            message: e.to_string(),
            data: Some(serde_json::json!({ "category": category })),
        }
    }
}

impl From<OperationError> for JsonRpcError {
    fn from(e: OperationError) -> Self {
        match e {
            OperationError::Token(e) => e.into(),
            OperationError::Storage(e) => {
                JsonRpcError::new(INTERNAL_ERROR, format!("Internal error: {}", e))
            }
        }
    }
}

// -- Method parameters ------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TransferParams {
    caller: Address,
    to: Address,
    amount: Amount,
}

#[derive(Debug, Deserialize)]
struct TransferFromParams {
    spender: Address,
    from: Address,
    to: Address,
    amount: Amount,
}

#[derive(Debug, Deserialize)]
struct ApproveParams {
    caller: Address,
    spender: Address,
    amount: Amount,
}

#[derive(Debug, Deserialize)]
struct SetTreasuryParams {
    caller: Address,
    treasury: Address,
}

#[derive(Debug, Deserialize)]
struct SetFeeRateParams {
    caller: Address,
    rate: Amount,
}

#[derive(Debug, Deserialize)]
struct SetExemptionParams {
    caller: Address,
    account: Address,
    exempt: bool,
}

#[derive(Debug, Deserialize)]
struct CallerParams {
    caller: Address,
}

#[derive(Debug, Deserialize)]
struct AccountParams {
    account: Address,
}

#[derive(Debug, Deserialize)]
struct AmountParams {
    amount: Amount,
}

fn parse_params<T: DeserializeOwned>(params: Option<serde_json::Value>) -> Result<T, JsonRpcError> {
    let value = params.unwrap_or(serde_json::Value::Null);
    serde_json::from_value(value)
        .map_err(|e| JsonRpcError::new(INVALID_PARAMS, format!("Invalid params: {}", e)))
}

fn to_json<T: Serialize>(value: T) -> Result<serde_json::Value, JsonRpcError> {
    serde_json::to_value(value)
        .map_err(|e| JsonRpcError::new(INTERNAL_ERROR, format!("Internal error: {}", e)))
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub owner: Address,
    pub treasury: Address,
    pub total_supply: Amount,
    pub fee_rate: Amount,
    pub max_fee_rate: Amount,
    pub variant: FeeVariant,
    pub paused: bool,
    /// Number of notifications recorded so far.
    pub event_count: u64,
    /// Whether balances currently sum to the total supply.
    pub conserved: bool,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Response payload for `GET /accounts/:address`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountResponse {
    pub address: Address,
    pub balance: Amount,
    pub exempt: bool,
}

/// Response payload for `GET /allowances/:owner/:spender`.
#[derive(Debug, Serialize, Deserialize)]
pub struct AllowanceResponse {
    pub owner: Address,
    pub spender: Address,
    pub allowance: Amount,
}

/// Response payload for `GET /tax/:amount`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TaxResponse {
    pub amount: Amount,
    pub fee_rate: Amount,
    /// `amount * fee_rate / 200`.
    pub tax: Amount,
}

/// Query string for `GET /events`.
#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub since: u64,
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

fn parse_address(raw: &str) -> Result<Address, Response> {
    raw.parse()
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, format!("Invalid address {}: {}", raw, e)))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`: token configuration, supply, and integrity.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let token = state.token.read();
    let metadata = token.metadata();
    let resp = StatusResponse {
        version: state.version.clone(),
        name: metadata.name.clone(),
        symbol: metadata.symbol.clone(),
        decimals: metadata.decimals,
        owner: token.owner(),
        treasury: token.treasury(),
        total_supply: token.total_supply(),
        fee_rate: token.current_fee_rate(),
        max_fee_rate: token.max_fee_rate(),
        variant: token.variant(),
        paused: token.is_paused(),
        event_count: token.events().next_seq(),
        conserved: token.conservation_holds(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    Json(resp)
}

/// `GET /accounts/:address`: balance and exemption flag. Unknown accounts
/// report a zero balance.
async fn account_handler(Path(address): Path<String>, State(state): State<AppState>) -> Response {
    let address = match parse_address(&address) {
        Ok(a) => a,
        Err(resp) => return resp,
    };
    let token = state.token.read();
    Json(AccountResponse {
        address,
        balance: token.balance_of(&address),
        exempt: token.is_exempt(&address),
    })
    .into_response()
}

/// `GET /allowances/:owner/:spender`.
async fn allowance_handler(
    Path((owner, spender)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Response {
    let (owner, spender) = match (parse_address(&owner), parse_address(&spender)) {
        (Ok(o), Ok(s)) => (o, s),
        (Err(resp), _) | (_, Err(resp)) => return resp,
    };
    let allowance = state.token.read().allowance(&owner, &spender);
    Json(AllowanceResponse {
        owner,
        spender,
        allowance,
    })
    .into_response()
}

/// `GET /tax/:amount`: estimate for a decimal amount.
async fn tax_handler(Path(amount): Path<String>, State(state): State<AppState>) -> Response {
    let amount = match Amount::from_dec_str(&amount) {
        Ok(a) => a,
        Err(_) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Invalid decimal amount: {}", amount),
            )
        }
    };
    let token = state.token.read();
    match token.calculate_tax(amount) {
        Ok(tax) => Json(TaxResponse {
            amount,
            fee_rate: token.current_fee_rate(),
            tax,
        })
        .into_response(),
        Err(e) => error_response(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
    }
}

/// `GET /events?since=N`: recorded notifications with sequence `>= N`.
async fn events_handler(
    Query(query): Query<EventsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let events = state.token.read().events().since(query.since).to_vec();
    Json(events)
}

/// `POST /rpc`: JSON-RPC 2.0 gateway.
///
/// Parameters are passed by name. Amounts are hex strings (`"0x3e8"`),
/// addresses are `0x`-prefixed hex. Token failures map to error codes by
/// category (see [`category_code`]).
async fn rpc_handler(
    State(state): State<AppState>,
    Json(req): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    if req.jsonrpc != "2.0" {
        return Json(JsonRpcResponse {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(JsonRpcError::new(
                INVALID_REQUEST,
                "Invalid Request: jsonrpc must be \"2.0\"",
            )),
            id: req.id,
        });
    }

    let (result, error) = match dispatch(&state, &req.method, req.params) {
        Ok(value) => (Some(value), None),
        Err(e) => (None, Some(e)),
    };
    Json(JsonRpcResponse {
        jsonrpc: "2.0".into(),
        result,
        error,
        id: req.id,
    })
}

fn dispatch(
    state: &AppState,
    method: &str,
    params: Option<serde_json::Value>,
) -> Result<serde_json::Value, JsonRpcError> {
    match method {
        // -- Value movement -------------------------------------------------
        "levy_transfer" => {
            let p: TransferParams = parse_params(params)?;
            let receipt = execute(state, |t| t.transfer(&p.caller, &p.to, p.amount))?;
            record_transfer(state, &receipt);
            to_json(receipt)
        }
        "levy_transferFrom" => {
            let p: TransferFromParams = parse_params(params)?;
            let receipt = execute(state, |t| t.transfer_from(&p.spender, &p.from, &p.to, p.amount))?;
            record_transfer(state, &receipt);
            to_json(receipt)
        }
        "levy_approve" => {
            let p: ApproveParams = parse_params(params)?;
            execute(state, |t| t.approve(&p.caller, &p.spender, p.amount))?;
            Ok(serde_json::json!(true))
        }

        // -- Administration -------------------------------------------------
        "levy_setTreasury" => {
            let p: SetTreasuryParams = parse_params(params)?;
            admin(state, |t| t.set_treasury(&p.caller, &p.treasury))
        }
        "levy_setFeeRate" => {
            let p: SetFeeRateParams = parse_params(params)?;
            admin(state, |t| t.set_fee_rate(&p.caller, p.rate))
        }
        "levy_setExemption" => {
            let p: SetExemptionParams = parse_params(params)?;
            admin(state, |t| t.set_exemption(&p.caller, &p.account, p.exempt))
        }
        "levy_pause" => {
            let p: CallerParams = parse_params(params)?;
            admin(state, |t| t.pause(&p.caller))
        }
        "levy_unpause" => {
            let p: CallerParams = parse_params(params)?;
            admin(state, |t| t.unpause(&p.caller))
        }

        // -- Queries --------------------------------------------------------
        "levy_balanceOf" => {
            let p: AccountParams = parse_params(params)?;
            to_json(state.token.read().balance_of(&p.account))
        }
        "levy_isExempt" => {
            let p: AccountParams = parse_params(params)?;
            to_json(state.token.read().is_exempt(&p.account))
        }
        "levy_calculateTax" => {
            let p: AmountParams = parse_params(params)?;
            let tax = state.token.read().calculate_tax(p.amount)?;
            to_json(tax)
        }
        "levy_currentFeeRate" => to_json(state.token.read().current_fee_rate()),
        "levy_maxFeeRate" => to_json(state.token.read().max_fee_rate()),
        "levy_totalSupply" => to_json(state.token.read().total_supply()),

        _ => Err(JsonRpcError::new(
            METHOD_NOT_FOUND,
            format!("Method not found: {}", method),
        )),
    }
}

fn admin(
    state: &AppState,
    op: impl FnOnce(&mut TaxedToken) -> TokenResult<()>,
) -> Result<serde_json::Value, JsonRpcError> {
    execute(state, op)?;
    state.metrics.admin_operations_total.inc();
    Ok(serde_json::json!(true))
}

fn record_transfer(state: &AppState, receipt: &TransferReceipt) {
    state.metrics.transfers_total.inc();
    if receipt.taxed {
        state.metrics.fee_collections_total.inc();
    }
}

/// `GET /ws`: WebSocket upgrade for live notification streaming.
///
/// Clients receive each committed [`SequencedNotification`] as JSON. The
/// connection is read-only from the server's perspective; client messages
/// are ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Drives a single WebSocket connection, forwarding broadcast events
/// until the client disconnects or the channel is closed.
async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.event_tx.subscribe();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(ev) => {
                        let payload = match serde_json::to_string(&ev) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!("failed to serialize ws event: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Missed entries can be fetched from /events.
                        tracing::warn!("ws subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Genesis Initialization
// ---------------------------------------------------------------------------

/// Loads the persisted token, if the database holds one.
pub fn load_token(db: &LevyDB) -> anyhow::Result<Option<TaxedToken>> {
    let Some(state) = db
        .get_snapshot::<TokenState>()
        .context("failed to read token snapshot")?
    else {
        return Ok(None);
    };
    let events = db
        .events_since::<Notification>(0)
        .context("failed to read notifications")?
        .into_iter()
        .map(|(seq, event)| SequencedNotification { seq, event })
        .collect();
    let token = TaxedToken::from_state(state, events)
        .context("persisted token failed integrity checks")?;
    Ok(Some(token))
}

/// Restores the persisted token, or creates one from `genesis` and persists
/// it when the database is empty.
pub fn restore_or_initialize(db: &LevyDB, genesis: &GenesisSection) -> anyhow::Result<TaxedToken> {
    if let Some(token) = load_token(db)? {
        tracing::info!(
            symbol = %token.metadata().symbol,
            events = token.events().len(),
            "token restored from database"
        );
        return Ok(token);
    }

    let token = TaxedToken::new(genesis.token_config(), genesis.owner)
        .context("invalid genesis configuration")?;
    let records: Vec<(u64, &Notification)> =
        token.events().iter().map(|e| (e.seq, &e.event)).collect();
    db.put_snapshot(token.state(), &records)
        .context("failed to persist genesis token")?;
    tracing::info!(owner = %genesis.owner, "genesis token persisted");
    Ok(token)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
