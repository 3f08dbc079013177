use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Principal;
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::models::account::{Account, AuthResponse, DbAccount, LoginRequest, RegisterRequest};
use crate::utils::{hash_password, normalize_email, utc_now, verify_password};

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub account: Account,
    /// Effective roles resolved from the account flags for this request.
    pub roles: Vec<String>,
}

/// First-login provisioning: accounts start as students; professor and
/// admin capability is granted later through the admin flag toggle.
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account registered", body = AuthResponse),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let email = normalize_email(&payload.email);
    ensure_email_available(&state.pool, &email).await?;

    let password_hash = hash_password(&payload.password)?;
    let now = utc_now();
    let account_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO accounts (id, name, email, password_hash, is_admin, is_professor, is_student, created_at, updated_at) \
         VALUES (?, ?, ?, ?, 0, 0, 1, ?, ?)",
    )
    .bind(account_id.to_string())
    .bind(&payload.name)
    .bind(&email)
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let db_account = fetch_account_by_id(&state.pool, account_id).await?;
    let account: Account = db_account.try_into()?;
    let token = state.jwt.encode(account.id, &account.email)?;

    log_activity(&state.event_bus, "registered", Some(account.id), &account);

    Ok((StatusCode::CREATED, Json(AuthResponse { token, account })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let email = normalize_email(&payload.email);

    let db_account = sqlx::query_as::<_, DbAccount>(
        "SELECT id, name, email, password_hash, is_admin, is_professor, is_student, created_at, updated_at, deleted_at \
         FROM accounts WHERE email = ? AND deleted_at IS NULL",
    )
    .bind(&email)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::unauthorized("invalid credentials"))?;

    let password_ok = verify_password(&payload.password, &db_account.password_hash)?;
    if !password_ok {
        return Err(AppError::unauthorized("invalid credentials"));
    }

    let account: Account = db_account.try_into()?;
    let token = state.jwt.encode(account.id, &account.email)?;

    Ok(Json(AuthResponse { token, account }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses((status = 200, description = "Current account with resolved roles", body = MeResponse))
)]
pub async fn me(State(state): State<AppState>, principal: Principal) -> AppResult<Json<MeResponse>> {
    let db_account = fetch_account_by_id(&state.pool, principal.account_id).await?;
    let account: Account = db_account.try_into()?;

    let mut roles: Vec<String> = principal.roles.iter().map(|r| r.as_str().to_string()).collect();
    roles.sort();

    Ok(Json(MeResponse { account, roles }))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Logout acknowledged"))
)]
pub async fn logout(_principal: Principal) -> AppResult<Json<MessageResponse>> {
    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

async fn ensure_email_available(pool: &SqlitePool, email: &str) -> AppResult<()> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM accounts WHERE email = ? AND deleted_at IS NULL")
        .bind(email)
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Err(AppError::conflict("email already in use"));
    }

    Ok(())
}

async fn fetch_account_by_id(pool: &SqlitePool, account_id: Uuid) -> AppResult<DbAccount> {
    sqlx::query_as::<_, DbAccount>(
        "SELECT id, name, email, password_hash, is_admin, is_professor, is_student, created_at, updated_at, deleted_at \
         FROM accounts WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(account_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("account not found"))
}
