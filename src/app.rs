use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, StatusCode},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Json},
    routing::{delete, get, post, put},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::{AppConfig, SequenceConfig};
use crate::database::models::User;
use crate::database::{open_store, Document, DocumentStore, MemoryStore, Repository};
use crate::handlers::{protected, public};
use crate::middleware::{jwt_auth_middleware, validate_user_middleware};
use crate::sequence::SequenceAllocator;
use crate::services::bootstrap;

/// Shared handles every request works through.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub sequences: Arc<SequenceAllocator>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, sequence: SequenceConfig) -> Self {
        let sequences = Arc::new(SequenceAllocator::new(store.clone(), sequence));
        Self { store, sequences }
    }

    /// Fresh in-memory state with default sequencing; used by tests and `STORAGE_BACKEND=memory`.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::default()), SequenceConfig::default())
    }

    pub fn repo<T: Document>(&self) -> Repository<T> {
        Repository::new(self.store.clone())
    }

    pub fn users(&self) -> Repository<User> {
        self.repo()
    }
}

/// Open storage, seed the bootstrap admin and serve until Ctrl-C.
pub async fn serve(config: &AppConfig) -> anyhow::Result<()> {
    let store = open_store(config).await?;
    let state = AppState::new(store, config.sequence.clone());
    bootstrap::ensure_admin(&state, config).await?;

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", bind_addr, e))?;

    tracing::info!(
        "LexCase API listening on http://{} ({} storage, {:?} sequences)",
        bind_addr,
        state.store.backend_name(),
        config.sequence.strategy
    );

    axum::serve(listener, app(state, config))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

pub fn app(state: AppState, config: &AppConfig) -> Router {
    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        .merge(auth_public_routes())
        // Protected API
        .merge(protected_routes(state.clone()))
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config.security.cors_origins)),
        )
        .with_state(state)
}

fn auth_public_routes() -> Router<AppState> {
    use public::auth;

    Router::new()
        .route("/auth/login", post(auth::login_post))
        .route("/auth/register", post(auth::register_post))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(auth_routes())
        .merge(user_routes())
        .merge(client_routes())
        .merge(case_routes())
        .merge(time_entry_routes())
        .merge(invoice_routes())
        .merge(message_routes())
        .merge(notice_routes())
        // Layers run bottom-up: token first, then the user behind it
        .layer(from_fn_with_state(state, validate_user_middleware))
        .layer(from_fn(jwt_auth_middleware))
}

fn auth_routes() -> Router<AppState> {
    use protected::auth;

    Router::new()
        .route("/api/auth/whoami", get(auth::whoami))
        .route("/api/auth/password", put(auth::change_password))
        .route("/api/auth/refresh", post(auth::refresh))
}

fn user_routes() -> Router<AppState> {
    use protected::users;

    Router::new()
        .route("/api/users", get(users::list).post(users::create))
        .route("/api/users/:id", get(users::get).put(users::update).delete(users::remove))
}

fn client_routes() -> Router<AppState> {
    use protected::clients;

    Router::new()
        .route("/api/clients", get(clients::list).post(clients::create))
        .route("/api/clients/:id", get(clients::get).put(clients::update).delete(clients::remove))
}

fn case_routes() -> Router<AppState> {
    use protected::cases;

    Router::new()
        .route("/api/cases", get(cases::list).post(cases::create))
        .route("/api/cases/:id", get(cases::get).put(cases::update).delete(cases::remove))
        .route("/api/cases/:id/documents", post(cases::add_document))
        .route("/api/cases/:id/documents/:doc_id", delete(cases::remove_document))
        .route("/api/cases/:id/timeline", post(cases::add_timeline_event))
}

fn time_entry_routes() -> Router<AppState> {
    use protected::time_entries;

    Router::new()
        .route("/api/time-entries", get(time_entries::list).post(time_entries::create))
        .route(
            "/api/time-entries/:id",
            get(time_entries::get).put(time_entries::update).delete(time_entries::remove),
        )
}

fn invoice_routes() -> Router<AppState> {
    use protected::invoices;

    Router::new()
        .route("/api/invoices", get(invoices::list).post(invoices::create))
        .route("/api/invoices/:id", get(invoices::get).put(invoices::update).delete(invoices::remove))
        .route("/api/invoices/:id/payments", post(invoices::record_payment))
}

fn message_routes() -> Router<AppState> {
    use protected::messages;

    Router::new()
        .route("/api/messages", get(messages::list).post(messages::send))
        .route("/api/messages/:id", get(messages::get).delete(messages::remove))
        .route("/api/messages/:id/read", put(messages::mark_read))
}

fn notice_routes() -> Router<AppState> {
    use protected::notices;

    Router::new()
        .route("/api/notices", get(notices::list).post(notices::create))
        .route("/api/notices/:id", get(notices::get).put(notices::update).delete(notices::remove))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();
    CorsLayer::permissive().allow_origin(allowed)
}

async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "data": {
            "name": "LexCase API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Legal practice management: cases, clients, time, billing and messaging",
            "endpoints": {
                "public_auth": "/auth/login, /auth/register (public - token acquisition)",
                "auth": "/api/auth/whoami, /api/auth/password, /api/auth/refresh",
                "users": "/api/users[/:id] (admin; lawyers read)",
                "clients": "/api/clients[/:id]",
                "cases": "/api/cases[/:id[/documents|/timeline]]",
                "time_entries": "/api/time-entries[/:id] (staff)",
                "invoices": "/api/invoices[/:id[/payments]]",
                "messages": "/api/messages[/:id[/read]]",
                "notices": "/api/notices[/:id]",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();
    let degraded = state.sequences.degraded_count();

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "storage": state.store.backend_name(),
                    "degraded_identifiers": degraded,
                }
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "storage unavailable",
                "data": {
                    "status": "degraded",
                    "timestamp": now,
                    "storage": state.store.backend_name(),
                    "storage_error": e.to_string(),
                    "degraded_identifiers": degraded,
                }
            })),
        ),
    }
}
