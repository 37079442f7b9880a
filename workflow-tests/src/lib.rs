//! Workflow test infrastructure.
//!
//! Spins up an in-memory stand-in for the Warpgate admin API on a loopback
//! port and connects the real client to it over HTTP, so the controllers are
//! exercised end to end: session login, wire encoding, status handling, and
//! role-set reconciliation all run for real.
//!
//! The stand-in mirrors the documented status contract: 201 on create, 404
//! for unknown ids, 409 on duplicate add-relation, 409 on remove-relation
//! when the edge is gone or marked conflicting, 204 on delete.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, Once};

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use secrecy::Secret;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use warpgate_client::{WarpgateConfig, WarpgateGateway};

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "correct-horse-battery";

// ============================================================================
// In-memory admin state
// ============================================================================

#[derive(Debug, Clone)]
pub struct StoredTarget {
    pub name: String,
    pub options: Value,
    pub roles: BTreeSet<Uuid>,
}

#[derive(Debug, Clone)]
pub struct StoredRole {
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct StoredUser {
    pub username: String,
    pub credentials: Vec<Value>,
    pub roles: BTreeSet<Uuid>,
}

#[derive(Debug, Default)]
pub struct AdminState {
    pub targets: HashMap<Uuid, StoredTarget>,
    pub roles: HashMap<Uuid, StoredRole>,
    pub users: HashMap<Uuid, StoredUser>,
    /// Edges that answer remove-relation with 409 no matter what, simulating
    /// a removal racing with a change on the other side.
    pub conflicting_edges: BTreeSet<(Uuid, Uuid)>,
    pub ssh_keys: Vec<Value>,
}

impl AdminState {
    fn seeded() -> Self {
        Self {
            ssh_keys: vec![json!({
                "kind": "Ed25519",
                "public_key_base64": "AAAAC3NzaC1lZDI1NTE5AAAAIKtest",
            })],
            ..Self::default()
        }
    }
}

type Shared = Arc<Mutex<AdminState>>;

// ============================================================================
// Server + context
// ============================================================================

pub struct TestServer {
    pub url: String,
    pub state: Shared,
}

/// Bind the stand-in on an ephemeral loopback port and serve it in the
/// background for the lifetime of the test process.
pub async fn spawn_admin_api() -> TestServer {
    let state: Shared = Arc::new(Mutex::new(AdminState::seeded()));
    let app = router(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback listener");
    let addr = listener.local_addr().expect("listener address");

    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    TestServer {
        url: format!("http://{addr}"),
        state,
    }
}

pub fn test_config(server: &TestServer) -> WarpgateConfig {
    WarpgateConfig {
        url: server.url.clone(),
        username: ADMIN_USERNAME.to_string(),
        password: Secret::new(ADMIN_PASSWORD.to_string()),
        insecure_skip_verify: false,
    }
}

pub struct TestContext {
    pub server: TestServer,
    pub gateway: Arc<WarpgateGateway>,
    pub cancel: CancellationToken,
}

impl TestContext {
    pub async fn new() -> Self {
        init_tracing();
        let server = spawn_admin_api().await;
        let cancel = CancellationToken::new();
        let gateway = WarpgateGateway::connect(&test_config(&server), &cancel)
            .await
            .expect("login against the admin API stand-in");
        Self {
            server,
            gateway: Arc::new(gateway),
            cancel,
        }
    }
}

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once per binary).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,warpgate_client=debug,warpgate_provisioner=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

// ============================================================================
// Routing
// ============================================================================

fn router(state: Shared) -> Router {
    let admin = Router::new()
        .route("/targets", get(list_targets).post(create_target))
        .route(
            "/targets/:id",
            get(get_target).put(update_target).delete(delete_target),
        )
        .route("/targets/:id/roles", get(list_target_roles))
        .route(
            "/targets/:id/roles/:role_id",
            post(add_target_role).delete(remove_target_role),
        )
        .route("/roles", get(list_roles).post(create_role))
        .route(
            "/roles/:id",
            get(get_role).put(update_role).delete(delete_role),
        )
        .route("/users", post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/users/:id/roles", get(list_user_roles))
        .route(
            "/users/:id/roles/:role_id",
            post(add_user_role).delete(remove_user_role),
        )
        .route("/ssh/own-keys", get(list_ssh_keys));

    Router::new()
        .route("/@warpgate/api/auth/login", post(login))
        .nest("/@warpgate/admin/api", admin)
        .with_state(state)
}

async fn login(Json(body): Json<Value>) -> Response {
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    if username == ADMIN_USERNAME && password == ADMIN_PASSWORD {
        (
            StatusCode::CREATED,
            [(
                header::SET_COOKIE,
                "warpgate-http-session=test-session; Path=/",
            )],
        )
            .into_response()
    } else {
        StatusCode::UNAUTHORIZED.into_response()
    }
}

// ============================================================================
// Targets
// ============================================================================

fn target_json(id: Uuid, stored: &StoredTarget) -> Value {
    json!({
        "id": id,
        "name": stored.name,
        "allow_roles": stored.roles.iter().map(Uuid::to_string).collect::<Vec<_>>(),
        "options": stored.options,
    })
}

async fn create_target(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let id = Uuid::new_v4();
    let stored = StoredTarget {
        name: body["name"].as_str().unwrap_or_default().to_string(),
        options: body["options"].clone(),
        roles: BTreeSet::new(),
    };
    let mut guard = state.lock().unwrap();
    let response = (StatusCode::CREATED, Json(target_json(id, &stored))).into_response();
    guard.targets.insert(id, stored);
    response
}

async fn list_targets(State(state): State<Shared>) -> Response {
    let guard = state.lock().unwrap();
    let items: Vec<Value> = guard
        .targets
        .iter()
        .map(|(id, stored)| target_json(*id, stored))
        .collect();
    (StatusCode::OK, Json(Value::Array(items))).into_response()
}

async fn get_target(State(state): State<Shared>, Path(id): Path<Uuid>) -> Response {
    let guard = state.lock().unwrap();
    match guard.targets.get(&id) {
        Some(stored) => (StatusCode::OK, Json(target_json(id, stored))).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn update_target(
    State(state): State<Shared>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> Response {
    let mut guard = state.lock().unwrap();
    match guard.targets.get_mut(&id) {
        Some(stored) => {
            stored.name = body["name"].as_str().unwrap_or_default().to_string();
            stored.options = body["options"].clone();
            let json = target_json(id, stored);
            (StatusCode::OK, Json(json)).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn delete_target(State(state): State<Shared>, Path(id): Path<Uuid>) -> Response {
    let mut guard = state.lock().unwrap();
    match guard.targets.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn list_target_roles(State(state): State<Shared>, Path(id): Path<Uuid>) -> Response {
    let guard = state.lock().unwrap();
    match guard.targets.get(&id) {
        Some(stored) => (StatusCode::OK, Json(roles_json(&guard, &stored.roles))).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn add_target_role(
    State(state): State<Shared>,
    Path((id, role_id)): Path<(Uuid, Uuid)>,
) -> Response {
    let mut guard = state.lock().unwrap();
    if !guard.roles.contains_key(&role_id) {
        return StatusCode::NOT_FOUND.into_response();
    }
    match guard.targets.get_mut(&id) {
        Some(stored) => {
            if stored.roles.insert(role_id) {
                StatusCode::CREATED.into_response()
            } else {
                StatusCode::CONFLICT.into_response()
            }
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn remove_target_role(
    State(state): State<Shared>,
    Path((id, role_id)): Path<(Uuid, Uuid)>,
) -> Response {
    let mut guard = state.lock().unwrap();
    if guard.conflicting_edges.contains(&(id, role_id)) {
        return StatusCode::CONFLICT.into_response();
    }
    match guard.targets.get_mut(&id) {
        Some(stored) => {
            if stored.roles.remove(&role_id) {
                StatusCode::NO_CONTENT.into_response()
            } else {
                StatusCode::CONFLICT.into_response()
            }
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

// ============================================================================
// Roles
// ============================================================================

fn role_json(id: Uuid, stored: &StoredRole) -> Value {
    json!({ "id": id, "name": stored.name })
}

/// Dangling edges (role deleted while still attached) are silently skipped,
/// the way the real API only reports roles that still exist.
fn roles_json(state: &AdminState, role_ids: &BTreeSet<Uuid>) -> Value {
    Value::Array(
        role_ids
            .iter()
            .filter_map(|role_id| {
                state
                    .roles
                    .get(role_id)
                    .map(|stored| role_json(*role_id, stored))
            })
            .collect(),
    )
}

async fn create_role(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let id = Uuid::new_v4();
    let stored = StoredRole {
        name: body["name"].as_str().unwrap_or_default().to_string(),
    };
    let mut guard = state.lock().unwrap();
    let response = (StatusCode::CREATED, Json(role_json(id, &stored))).into_response();
    guard.roles.insert(id, stored);
    response
}

async fn list_roles(State(state): State<Shared>) -> Response {
    let guard = state.lock().unwrap();
    let items: Vec<Value> = guard
        .roles
        .iter()
        .map(|(id, stored)| role_json(*id, stored))
        .collect();
    (StatusCode::OK, Json(Value::Array(items))).into_response()
}

async fn get_role(State(state): State<Shared>, Path(id): Path<Uuid>) -> Response {
    let guard = state.lock().unwrap();
    match guard.roles.get(&id) {
        Some(stored) => (StatusCode::OK, Json(role_json(id, stored))).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn update_role(
    State(state): State<Shared>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> Response {
    let mut guard = state.lock().unwrap();
    match guard.roles.get_mut(&id) {
        Some(stored) => {
            stored.name = body["name"].as_str().unwrap_or_default().to_string();
            let json = role_json(id, stored);
            (StatusCode::OK, Json(json)).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn delete_role(State(state): State<Shared>, Path(id): Path<Uuid>) -> Response {
    let mut guard = state.lock().unwrap();
    match guard.roles.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

// ============================================================================
// Users
// ============================================================================

fn user_json(id: Uuid, stored: &StoredUser) -> Value {
    json!({
        "id": id,
        "username": stored.username,
        "credentials": stored.credentials,
        "roles": stored.roles.iter().map(Uuid::to_string).collect::<Vec<_>>(),
    })
}

async fn create_user(State(state): State<Shared>, Json(body): Json<Value>) -> Response {
    let id = Uuid::new_v4();
    let stored = StoredUser {
        username: body["username"].as_str().unwrap_or_default().to_string(),
        credentials: body["credentials"].as_array().cloned().unwrap_or_default(),
        roles: BTreeSet::new(),
    };
    let mut guard = state.lock().unwrap();
    let response = (StatusCode::CREATED, Json(user_json(id, &stored))).into_response();
    guard.users.insert(id, stored);
    response
}

async fn get_user(State(state): State<Shared>, Path(id): Path<Uuid>) -> Response {
    let guard = state.lock().unwrap();
    match guard.users.get(&id) {
        Some(stored) => (StatusCode::OK, Json(user_json(id, stored))).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn update_user(
    State(state): State<Shared>,
    Path(id): Path<Uuid>,
    Json(body): Json<Value>,
) -> Response {
    let mut guard = state.lock().unwrap();
    match guard.users.get_mut(&id) {
        Some(stored) => {
            stored.username = body["username"].as_str().unwrap_or_default().to_string();
            stored.credentials = body["credentials"].as_array().cloned().unwrap_or_default();
            let json = user_json(id, stored);
            (StatusCode::OK, Json(json)).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn delete_user(State(state): State<Shared>, Path(id): Path<Uuid>) -> Response {
    let mut guard = state.lock().unwrap();
    match guard.users.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn list_user_roles(State(state): State<Shared>, Path(id): Path<Uuid>) -> Response {
    let guard = state.lock().unwrap();
    match guard.users.get(&id) {
        Some(stored) => (StatusCode::OK, Json(roles_json(&guard, &stored.roles))).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn add_user_role(
    State(state): State<Shared>,
    Path((id, role_id)): Path<(Uuid, Uuid)>,
) -> Response {
    let mut guard = state.lock().unwrap();
    if !guard.roles.contains_key(&role_id) {
        return StatusCode::NOT_FOUND.into_response();
    }
    match guard.users.get_mut(&id) {
        Some(stored) => {
            if stored.roles.insert(role_id) {
                StatusCode::CREATED.into_response()
            } else {
                StatusCode::CONFLICT.into_response()
            }
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn remove_user_role(
    State(state): State<Shared>,
    Path((id, role_id)): Path<(Uuid, Uuid)>,
) -> Response {
    let mut guard = state.lock().unwrap();
    if guard.conflicting_edges.contains(&(id, role_id)) {
        return StatusCode::CONFLICT.into_response();
    }
    match guard.users.get_mut(&id) {
        Some(stored) => {
            if stored.roles.remove(&role_id) {
                StatusCode::NO_CONTENT.into_response()
            } else {
                StatusCode::CONFLICT.into_response()
            }
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

// ============================================================================
// SSH keys
// ============================================================================

async fn list_ssh_keys(State(state): State<Shared>) -> Response {
    let guard = state.lock().unwrap();
    (StatusCode::OK, Json(Value::Array(guard.ssh_keys.clone()))).into_response()
}
