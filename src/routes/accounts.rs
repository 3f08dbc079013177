//! Admin account directory.
//!
//! Capability flags are only mutable here; there is no self-service
//! elevation. Every flag change is logged at Critical severity.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{ops, Principal};
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity_with_context, RequestContext};
use crate::models::account::{Account, DbAccount, FlagsChange, FlagsUpdateRequest};
use crate::utils::utc_now;

#[utoipa::path(
    get,
    path = "/accounts",
    tag = "Accounts",
    responses((status = 200, description = "List accounts", body = [Account])),
    security(("bearerAuth" = []))
)]
pub async fn list_accounts(State(state): State<AppState>, principal: Principal) -> AppResult<Json<Vec<Account>>> {
    ops::ACCOUNT_READ.check_role(&principal)?;

    let accounts = sqlx::query_as::<_, DbAccount>(
        "SELECT id, name, email, password_hash, is_admin, is_professor, is_student, created_at, updated_at, deleted_at \
         FROM accounts WHERE deleted_at IS NULL ORDER BY created_at DESC",
    )
    .fetch_all(&state.pool)
    .await?;

    let accounts: Vec<Account> = accounts
        .into_iter()
        .map(Account::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(accounts))
}

#[utoipa::path(
    get,
    path = "/accounts/{id}",
    tag = "Accounts",
    params(("id" = Uuid, Path, description = "Account id")),
    responses(
        (status = 200, description = "Account detail", body = Account),
        (status = 404, description = "Account not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_account(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Account>> {
    ops::ACCOUNT_READ.check_role(&principal)?;

    let account = fetch_account(&state.pool, id).await?;
    let account: Account = account.try_into()?;
    Ok(Json(account))
}

/// Toggle capability flags. Only the flags present in the payload change;
/// the new flag state is effective on the target's very next request.
#[utoipa::path(
    put,
    path = "/accounts/{id}/flags",
    tag = "Accounts",
    params(("id" = Uuid, Path, description = "Account id")),
    request_body = FlagsUpdateRequest,
    responses(
        (status = 200, description = "Flags updated", body = Account),
        (status = 404, description = "Account not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_flags(
    State(state): State<AppState>,
    principal: Principal,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<FlagsUpdateRequest>,
) -> AppResult<Json<Account>> {
    ops::ACCOUNT_SET_FLAGS.check_role(&principal)?;

    let account = fetch_account(&state.pool, id).await?;

    let old = FlagsChange {
        account_id: id,
        email: account.email.clone(),
        is_admin: account.is_admin,
        is_professor: account.is_professor,
        is_student: account.is_student,
    };

    let is_admin = payload.is_admin.unwrap_or(account.is_admin);
    let is_professor = payload.is_professor.unwrap_or(account.is_professor);
    let is_student = payload.is_student.unwrap_or(account.is_student);

    let now = utc_now();
    sqlx::query("UPDATE accounts SET is_admin = ?, is_professor = ?, is_student = ?, updated_at = ? WHERE id = ?")
        .bind(is_admin)
        .bind(is_professor)
        .bind(is_student)
        .bind(now)
        .bind(id.to_string())
        .execute(&state.pool)
        .await?;

    let new = FlagsChange {
        account_id: id,
        email: account.email.clone(),
        is_admin,
        is_professor,
        is_student,
    };

    log_activity_with_context(
        &state.event_bus,
        "flags_updated",
        Some(principal.account_id),
        &new,
        Some(&old),
        Some(RequestContext::from_headers(&headers)),
    );

    let account = fetch_account(&state.pool, id).await?;
    let account: Account = account.try_into()?;
    Ok(Json(account))
}

async fn fetch_account(pool: &SqlitePool, id: Uuid) -> AppResult<DbAccount> {
    sqlx::query_as::<_, DbAccount>(
        "SELECT id, name, email, password_hash, is_admin, is_professor, is_student, created_at, updated_at, deleted_at \
         FROM accounts WHERE id = ? AND deleted_at IS NULL",
    )
    .bind(id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found(format!("account {id} not found")))
}
