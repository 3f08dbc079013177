use std::sync::Arc;

use axum::http::Method;
use axum::routing::{delete, get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::routes::{accounts, auth, health, request_types, requests};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub event_bus: EventBus,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, event_bus: EventBus) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
            event_bus,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let (event_bus, event_rx) = init_event_bus();
    let state = AppState::new(pool.clone(), jwt_config, event_bus);

    tokio::spawn(start_activity_listener(event_rx, pool));

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    let request_routes = Router::new()
        .route("/", get(requests::list_requests))
        .route("/", post(requests::create_request))
        .route("/by-requester/:id", get(requests::list_by_requester))
        .route("/by-professor/:id", get(requests::list_by_professor))
        .route("/:id", get(requests::get_request))
        .route("/:id", put(requests::update_request))
        .route("/:id/status", put(requests::update_request_status))
        .route("/:id", delete(requests::delete_request));

    let request_type_routes = Router::new()
        .route("/", get(request_types::list_request_types))
        .route("/", post(request_types::create_request_type))
        .route("/:id", get(request_types::get_request_type))
        .route("/:id", put(request_types::update_request_type))
        .route("/:id", delete(request_types::delete_request_type));

    let account_routes = Router::new()
        .route("/", get(accounts::list_accounts))
        .route("/:id", get(accounts::get_account))
        .route("/:id/flags", put(accounts::update_flags));

    let router = Router::new()
        .route("/api/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/requests", request_routes)
        .nest("/request-types", request_type_routes)
        .nest("/accounts", account_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
