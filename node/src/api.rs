//! # REST API
//!
//! Builds the axum router that exposes the gateway's HTTP interface.
//! All endpoints share application state through axum's `State`
//! extractor. Caller identity comes from the request body (`caller`
//! field) -- this is a devnet harness, signature auth belongs to a real
//! chain deployment.
//!
//! ## Endpoints
//!
//! | Method | Path                              | Description                       |
//! |--------|-----------------------------------|-----------------------------------|
//! | GET    | `/health`                         | Liveness probe                    |
//! | GET    | `/status`                         | Gateway status summary            |
//! | POST   | `/vaults/prize-pool`              | Create a prize-pool vault         |
//! | POST   | `/vaults/milestone`               | Create a milestone vault          |
//! | GET    | `/vaults/:id`                     | Vault details                     |
//! | POST   | `/vaults/:id/distribute`          | Distribute a prize pool           |
//! | POST   | `/vaults/:id/release-next`        | Release the next milestone        |
//! | POST   | `/vaults/:id/release-time-locked` | Legacy time-locked release        |
//! | GET    | `/users/:address/funded`          | Vault ids funded by address       |
//! | GET    | `/users/:address/beneficiary`     | Vault ids naming address          |
//! | GET    | `/events`                         | Committed event log               |
//! | POST   | `/tokens`                         | Register a devnet token           |
//! | POST   | `/tokens/:addr/mint`              | Devnet faucet mint                |
//! | POST   | `/tokens/:addr/approve`           | Set an allowance                  |
//! | GET    | `/tokens/:addr/balances/:account` | Token balance                     |
//! | POST   | `/admin/verifiers`                | Register a chain verifier         |
//! | POST   | `/admin/proof-sets/:id`           | Toggle devnet proof-set liveness  |

use axum::{
    extract::{Path, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use haven_engine::{
    Address, InMemoryToken, StaticProofVerifier, TokenLedger, VaultDetails, VaultError,
    VaultEvent, VaultRegistry, VerificationTerms,
};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// In-memory token ledgers, one per registered token address.
///
/// The devnet stand-in for the external chain: every token a vault is
/// denominated in must be registered here first, then minted and
/// approved through the faucet endpoints.
#[derive(Debug, Default)]
pub struct TokenBank {
    tokens: HashMap<Address, InMemoryToken>,
}

impl TokenBank {
    /// Creates an empty bank.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an empty ledger. Returns `false` if one already exists.
    pub fn register(&mut self, address: Address) -> bool {
        if self.tokens.contains_key(&address) {
            return false;
        }
        self.tokens.insert(address, InMemoryToken::new());
        true
    }

    /// The ledger for `address`, if registered.
    pub fn get(&self, address: &Address) -> Option<&InMemoryToken> {
        self.tokens.get(address)
    }

    /// Mutable ledger access for `address`, if registered.
    pub fn get_mut(&mut self, address: &Address) -> Option<&mut InMemoryToken> {
        self.tokens.get_mut(address)
    }
}

/// Shared application state available to all request handlers.
///
/// Cheap to clone -- everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Chain id of the embedded registry deployment.
    pub chain_id: u64,
    /// The escrow ledger itself.
    pub registry: Arc<RwLock<VaultRegistry>>,
    /// Devnet token ledgers.
    pub tokens: Arc<RwLock<TokenBank>>,
    /// Devnet storage-proof oracle with toggleable liveness.
    pub oracle: Arc<RwLock<StaticProofVerifier>>,
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
        .route("/vaults/prize-pool", post(create_prize_pool_handler))
        .route("/vaults/milestone", post(create_milestone_handler))
        .route("/vaults/:id", get(vault_details_handler))
        .route("/vaults/:id/distribute", post(distribute_handler))
        .route("/vaults/:id/release-next", post(release_next_handler))
        .route(
            "/vaults/:id/release-time-locked",
            post(release_time_locked_handler),
        )
        .route("/users/:address/funded", get(funded_vaults_handler))
        .route(
            "/users/:address/beneficiary",
            get(beneficiary_vaults_handler),
        )
        .route("/events", get(events_handler))
        .route("/tokens", post(register_token_handler))
        .route("/tokens/:addr/mint", post(mint_handler))
        .route("/tokens/:addr/approve", post(approve_handler))
        .route("/tokens/:addr/balances/:account", get(balance_handler))
        .route("/admin/verifiers", post(register_verifier_handler))
        .route("/admin/proof-sets/:id", post(proof_set_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Request body for `POST /vaults/prize-pool`.
#[derive(Debug, Deserialize)]
pub struct CreatePrizePoolRequest {
    /// The funder. Deposits are pulled from this account.
    pub caller: Address,
    /// The token the deposit is denominated in.
    pub token: Address,
    /// Deposit amount in token base units.
    pub amount: u64,
    /// Instant at which distribution becomes possible.
    pub release_time: DateTime<Utc>,
    /// Content-addressed terms document.
    pub terms_cid: String,
    /// Proof set gating payouts; omit for a non-verifiable vault.
    #[serde(default)]
    pub proof_set_id: Option<u64>,
    /// Whether the funder may bypass a dead proof set. Fixed at creation.
    #[serde(default)]
    pub funder_can_override: bool,
}

/// Request body for `POST /vaults/milestone`.
#[derive(Debug, Deserialize)]
pub struct CreateMilestoneRequest {
    pub caller: Address,
    pub beneficiary: Address,
    pub token: Address,
    /// Agreed payout per milestone, in order. Sum is pulled at creation.
    pub payouts: Vec<u64>,
    pub terms_cid: String,
    #[serde(default)]
    pub proof_set_id: Option<u64>,
    #[serde(default)]
    pub funder_can_override: bool,
}

/// Request body for `POST /vaults/:id/distribute`.
#[derive(Debug, Deserialize)]
pub struct DistributeRequest {
    pub caller: Address,
    pub recipients: Vec<Address>,
    pub amounts: Vec<u64>,
    /// Ask to skip the liveness check. Only honored if the vault was
    /// created with the funder override.
    #[serde(default)]
    pub bypass_verification: bool,
}

/// Request body for `POST /vaults/:id/release-next`.
#[derive(Debug, Deserialize)]
pub struct ReleaseNextRequest {
    pub caller: Address,
    #[serde(default)]
    pub bypass_verification: bool,
}

/// Request body for `POST /vaults/:id/release-time-locked`.
#[derive(Debug, Deserialize)]
pub struct ReleaseTimeLockedRequest {
    pub caller: Address,
}

/// Request body for `POST /tokens`.
#[derive(Debug, Deserialize)]
pub struct RegisterTokenRequest {
    pub address: Address,
}

/// Request body for `POST /tokens/:addr/mint`.
#[derive(Debug, Deserialize)]
pub struct MintRequest {
    pub account: Address,
    pub amount: u64,
}

/// Request body for `POST /tokens/:addr/approve`.
#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub owner: Address,
    pub spender: Address,
    pub amount: u64,
}

/// Request body for `POST /admin/verifiers`.
#[derive(Debug, Deserialize)]
pub struct RegisterVerifierRequest {
    pub caller: Address,
    pub chain_id: u64,
    pub verifier: Address,
}

/// Request body for `POST /admin/proof-sets/:id`.
#[derive(Debug, Deserialize)]
pub struct ProofSetRequest {
    pub live: bool,
}

/// Response payload for vault creation.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateVaultResponse {
    pub vault_id: u64,
}

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    /// Chain id of the embedded deployment.
    pub chain_id: u64,
    /// Number of vaults ever created.
    pub vault_count: u64,
    /// The custody address funders must approve before creating vaults.
    pub custody: Address,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Response payload for `GET /tokens/:addr/balances/:account`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub token: Address,
    pub account: Address,
    pub balance: u64,
}

/// Generic error body returned by all endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Error Mapping
// ---------------------------------------------------------------------------

/// Maps engine errors onto HTTP status codes: validation 400,
/// authorization 403, missing resources 404, state conflicts 409,
/// external-dependency failures 502.
fn status_for(err: &VaultError) -> StatusCode {
    match err {
        VaultError::ZeroAddress
        | VaultError::ZeroAmount
        | VaultError::MilestoneAmountsCannotBeZero
        | VaultError::NoMilestonesToPay
        | VaultError::AmountOverflow
        | VaultError::TermsCidTooLong { .. }
        | VaultError::WrongVaultType { .. }
        | VaultError::MismatchedPayoutArrays
        | VaultError::IncorrectTotalPayout { .. } => StatusCode::BAD_REQUEST,

        VaultError::NotTheFunder | VaultError::NotTheBeneficiary | VaultError::NotTheOwner => {
            StatusCode::FORBIDDEN
        }

        VaultError::VaultNotFound(_) => StatusCode::NOT_FOUND,

        VaultError::VaultIsFinalized
        | VaultError::ReleaseTimeNotMet
        | VaultError::VerificationNotLive { .. }
        | VaultError::VerificationNotConfigured { .. } => StatusCode::CONFLICT,

        VaultError::TransferFailed { .. } => StatusCode::BAD_GATEWAY,
    }
}

fn engine_error(err: &VaultError) -> Response {
    (
        status_for(err),
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

fn unknown_token(address: &Address) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("token {address} is not registered"),
        }),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health` -- returns 200 if the gateway is alive.
///
/// This is the liveness probe for orchestrators. It intentionally does
/// not inspect registry state; that belongs in `/status`.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status` -- gateway status summary.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.registry.read().await;
    Json(StatusResponse {
        version: state.version.clone(),
        chain_id: state.chain_id,
        vault_count: registry.vault_count(),
        custody: registry.custody_address(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// `POST /vaults/prize-pool` -- creates a prize-pool vault, pulling the
/// deposit from the caller. The caller must have approved the custody
/// address on the token beforehand.
async fn create_prize_pool_handler(
    State(state): State<AppState>,
    Json(req): Json<CreatePrizePoolRequest>,
) -> Response {
    let verification = req.proof_set_id.map(|proof_set_id| VerificationTerms {
        proof_set_id,
        funder_can_override: req.funder_can_override,
    });

    let mut registry = state.registry.write().await;
    let mut bank = state.tokens.write().await;
    let Some(ledger) = bank.get_mut(&req.token) else {
        return unknown_token(&req.token);
    };

    match registry.create_prize_pool_vault(
        ledger,
        req.caller,
        Utc::now(),
        req.token,
        req.amount,
        req.release_time,
        req.terms_cid,
        verification,
    ) {
        Ok(vault_id) => (StatusCode::CREATED, Json(CreateVaultResponse { vault_id }))
            .into_response(),
        Err(e) => engine_error(&e),
    }
}

/// `POST /vaults/milestone` -- creates a milestone vault, pulling the
/// schedule total from the caller.
async fn create_milestone_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateMilestoneRequest>,
) -> Response {
    let verification = req.proof_set_id.map(|proof_set_id| VerificationTerms {
        proof_set_id,
        funder_can_override: req.funder_can_override,
    });

    let mut registry = state.registry.write().await;
    let mut bank = state.tokens.write().await;
    let Some(ledger) = bank.get_mut(&req.token) else {
        return unknown_token(&req.token);
    };

    match registry.create_milestone_vault(
        ledger,
        req.caller,
        Utc::now(),
        req.beneficiary,
        req.token,
        req.payouts,
        req.terms_cid,
        verification,
    ) {
        Ok(vault_id) => (StatusCode::CREATED, Json(CreateVaultResponse { vault_id }))
            .into_response(),
        Err(e) => engine_error(&e),
    }
}

/// `GET /vaults/:id` -- full vault details.
async fn vault_details_handler(
    Path(id): Path<u64>,
    State(state): State<AppState>,
) -> Response {
    let registry = state.registry.read().await;
    match registry.vault_details(id) {
        Ok(details) => Json::<VaultDetails>(details).into_response(),
        Err(e) => engine_error(&e),
    }
}

/// `POST /vaults/:id/distribute` -- distributes a prize pool's full
/// remaining balance across the given recipients.
async fn distribute_handler(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    Json(req): Json<DistributeRequest>,
) -> Response {
    let mut registry = state.registry.write().await;
    let token = match registry.vault(id) {
        Ok(vault) => vault.token,
        Err(e) => return engine_error(&e),
    };

    let mut bank = state.tokens.write().await;
    let Some(ledger) = bank.get_mut(&token) else {
        return unknown_token(&token);
    };
    let oracle = state.oracle.read().await;

    match registry.distribute_prize_pool(
        ledger,
        &*oracle,
        req.caller,
        Utc::now(),
        id,
        &req.recipients,
        &req.amounts,
        req.bypass_verification,
    ) {
        Ok(()) => Json(serde_json::json!({ "status": "distributed" })).into_response(),
        Err(e) => engine_error(&e),
    }
}

/// `POST /vaults/:id/release-next` -- releases the next unpaid milestone
/// to the vault's beneficiary.
async fn release_next_handler(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    Json(req): Json<ReleaseNextRequest>,
) -> Response {
    let mut registry = state.registry.write().await;
    let token = match registry.vault(id) {
        Ok(vault) => vault.token,
        Err(e) => return engine_error(&e),
    };

    let mut bank = state.tokens.write().await;
    let Some(ledger) = bank.get_mut(&token) else {
        return unknown_token(&token);
    };
    let oracle = state.oracle.read().await;

    match registry.release_next_milestone(
        ledger,
        &*oracle,
        req.caller,
        id,
        req.bypass_verification,
    ) {
        Ok(()) => Json(serde_json::json!({ "status": "released" })).into_response(),
        Err(e) => engine_error(&e),
    }
}

/// `POST /vaults/:id/release-time-locked` -- the legacy single-recipient
/// release path for historical time-locked records.
async fn release_time_locked_handler(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    Json(req): Json<ReleaseTimeLockedRequest>,
) -> Response {
    let mut registry = state.registry.write().await;
    let token = match registry.vault(id) {
        Ok(vault) => vault.token,
        Err(e) => return engine_error(&e),
    };

    let mut bank = state.tokens.write().await;
    let Some(ledger) = bank.get_mut(&token) else {
        return unknown_token(&token);
    };

    match registry.release_time_locked_funds(ledger, req.caller, Utc::now(), id) {
        Ok(()) => Json(serde_json::json!({ "status": "released" })).into_response(),
        Err(e) => engine_error(&e),
    }
}

/// `GET /users/:address/funded` -- ids of every vault the address created.
async fn funded_vaults_handler(
    Path(address): Path<Address>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let registry = state.registry.read().await;
    Json(registry.vault_ids_funded_by(&address))
}

/// `GET /users/:address/beneficiary` -- ids of every vault naming the
/// address as beneficiary.
async fn beneficiary_vaults_handler(
    Path(address): Path<Address>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let registry = state.registry.read().await;
    Json(registry.vault_ids_as_beneficiary(&address))
}

/// `GET /events` -- the committed event log, in emission order.
async fn events_handler(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.registry.read().await;
    Json::<Vec<VaultEvent>>(registry.events().to_vec())
}

/// `POST /tokens` -- registers an empty devnet token ledger.
async fn register_token_handler(
    State(state): State<AppState>,
    Json(req): Json<RegisterTokenRequest>,
) -> Response {
    let mut bank = state.tokens.write().await;
    if !bank.register(req.address) {
        return (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: format!("token {} is already registered", req.address),
            }),
        )
            .into_response();
    }
    tracing::info!(token = %req.address, "token registered");
    (StatusCode::CREATED, Json(serde_json::json!({ "status": "registered" }))).into_response()
}

/// `POST /tokens/:addr/mint` -- devnet faucet: credits tokens to an
/// account out of thin air.
async fn mint_handler(
    Path(addr): Path<Address>,
    State(state): State<AppState>,
    Json(req): Json<MintRequest>,
) -> Response {
    let mut bank = state.tokens.write().await;
    let Some(ledger) = bank.get_mut(&addr) else {
        return unknown_token(&addr);
    };
    match ledger.mint(&req.account, req.amount) {
        Ok(()) => Json(serde_json::json!({ "status": "minted" })).into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
            .into_response(),
    }
}

/// `POST /tokens/:addr/approve` -- sets `spender`'s allowance over
/// `owner`'s funds. Funders approve the custody address here before
/// creating vaults.
async fn approve_handler(
    Path(addr): Path<Address>,
    State(state): State<AppState>,
    Json(req): Json<ApproveRequest>,
) -> Response {
    let mut bank = state.tokens.write().await;
    let Some(ledger) = bank.get_mut(&addr) else {
        return unknown_token(&addr);
    };
    ledger.approve(&req.owner, &req.spender, req.amount);
    Json(serde_json::json!({ "status": "approved" })).into_response()
}

/// `GET /tokens/:addr/balances/:account` -- token balance of an account.
async fn balance_handler(
    Path((addr, account)): Path<(Address, Address)>,
    State(state): State<AppState>,
) -> Response {
    let bank = state.tokens.read().await;
    let Some(ledger) = bank.get(&addr) else {
        return unknown_token(&addr);
    };
    Json(BalanceResponse {
        token: addr,
        account,
        balance: ledger.balance_of(&account),
    })
    .into_response()
}

/// `POST /admin/verifiers` -- registers the storage-proof verifier
/// contract for a chain. Owner-only.
async fn register_verifier_handler(
    State(state): State<AppState>,
    Json(req): Json<RegisterVerifierRequest>,
) -> Response {
    let mut registry = state.registry.write().await;
    match registry.set_verifier_for_chain(req.caller, req.chain_id, req.verifier) {
        Ok(()) => Json(serde_json::json!({ "status": "registered" })).into_response(),
        Err(e) => engine_error(&e),
    }
}

/// `POST /admin/proof-sets/:id` -- toggles a proof set's liveness on the
/// devnet oracle. Stand-in for the real PDP verifier's view of storage.
async fn proof_set_handler(
    Path(id): Path<u64>,
    State(state): State<AppState>,
    Json(req): Json<ProofSetRequest>,
) -> impl IntoResponse {
    let mut oracle = state.oracle.write().await;
    oracle.set_live(id, req.live);
    tracing::info!(proof_set_id = id, live = req.live, "proof set liveness updated");
    Json(serde_json::json!({ "status": "updated" }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
