//! The recommendation-request surface.
//!
//! Role gates run before any store access; ownership is checked after the
//! record is loaded, and a failed predicate is reported exactly like a
//! missing record so non-owners cannot probe for existence.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{ops, require_self_or_admin, OperationSpec, Principal};
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::models::request::{
    DbRecommendationRequest, RecommendationRequest, RequestCreateRequest, RequestStatusUpdateRequest,
    RequestUpdateRequest, STATUS_PENDING,
};
use crate::utils::{normalize_email, utc_now};

const REQUEST_COLUMNS: &str = "id, requester_id, professor_id, request_type, details, needed_by_date, \
    submission_date, completion_date, status, created_at, updated_at";

#[utoipa::path(
    get,
    path = "/requests",
    tag = "Requests",
    responses((status = 200, description = "List all recommendation requests", body = [RecommendationRequest])),
    security(("bearerAuth" = []))
)]
pub async fn list_requests(
    State(state): State<AppState>,
    principal: Principal,
) -> AppResult<Json<Vec<RecommendationRequest>>> {
    ops::REQUEST_LIST_ALL.check_role(&principal)?;

    let sql = format!(
        "SELECT {REQUEST_COLUMNS} FROM recommendation_requests ORDER BY submission_date DESC"
    );
    let requests = sqlx::query_as::<_, DbRecommendationRequest>(&sql)
        .fetch_all(&state.pool)
        .await?;

    collect(requests).map(Json)
}

#[utoipa::path(
    get,
    path = "/requests/by-requester/{id}",
    tag = "Requests",
    params(("id" = Uuid, Path, description = "Requester account id")),
    responses(
        (status = 200, description = "Requests owned by the requester", body = [RecommendationRequest]),
        (status = 404, description = "Account not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_by_requester(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<RecommendationRequest>>> {
    ops::REQUEST_LIST_BY_REQUESTER.check_role(&principal)?;
    require_self_or_admin(&principal, id)?;

    let sql = format!(
        "SELECT {REQUEST_COLUMNS} FROM recommendation_requests WHERE requester_id = ? ORDER BY submission_date DESC"
    );
    let requests = sqlx::query_as::<_, DbRecommendationRequest>(&sql)
        .bind(id.to_string())
        .fetch_all(&state.pool)
        .await?;

    collect(requests).map(Json)
}

#[utoipa::path(
    get,
    path = "/requests/by-professor/{id}",
    tag = "Requests",
    params(("id" = Uuid, Path, description = "Professor account id")),
    responses(
        (status = 200, description = "Requests addressed to the professor", body = [RecommendationRequest]),
        (status = 404, description = "Account not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_by_professor(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<RecommendationRequest>>> {
    ops::REQUEST_LIST_BY_PROFESSOR.check_role(&principal)?;
    require_self_or_admin(&principal, id)?;

    let sql = format!(
        "SELECT {REQUEST_COLUMNS} FROM recommendation_requests WHERE professor_id = ? ORDER BY submission_date DESC"
    );
    let requests = sqlx::query_as::<_, DbRecommendationRequest>(&sql)
        .bind(id.to_string())
        .fetch_all(&state.pool)
        .await?;

    collect(requests).map(Json)
}

#[utoipa::path(
    get,
    path = "/requests/{id}",
    tag = "Requests",
    params(("id" = Uuid, Path, description = "Request id")),
    responses(
        (status = 200, description = "Request detail", body = RecommendationRequest),
        (status = 404, description = "Request not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_request(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RecommendationRequest>> {
    ops::REQUEST_GET.check_role(&principal)?;

    let request = fetch_request(&state.pool, id).await?;
    let request: RecommendationRequest = request.try_into()?;
    Ok(Json(request))
}

/// Create a pending request. The requester is the caller; the professor is
/// resolved from the supplied email and must currently hold the professor
/// flag. Submission date is fixed here and never settable by the client.
#[utoipa::path(
    post,
    path = "/requests",
    tag = "Requests",
    request_body = RequestCreateRequest,
    responses(
        (status = 201, description = "Request created", body = RecommendationRequest),
        (status = 403, description = "Caller is not a student"),
        (status = 404, description = "Professor not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_request(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<RequestCreateRequest>,
) -> AppResult<(StatusCode, Json<RecommendationRequest>)> {
    ops::REQUEST_CREATE.check_role(&principal)?;

    let professor_id = resolve_professor(&state.pool, &payload.professor_email).await?;

    let now = utc_now();
    let request_id = Uuid::new_v4();

    sqlx::query(
        "INSERT INTO recommendation_requests \
         (id, requester_id, professor_id, request_type, details, needed_by_date, submission_date, completion_date, status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, NULL, ?, ?, ?)",
    )
    .bind(request_id.to_string())
    .bind(principal.account_id.to_string())
    .bind(&professor_id)
    .bind(&payload.request_type)
    .bind(&payload.details)
    .bind(payload.needed_by_date)
    .bind(now)
    .bind(STATUS_PENDING)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let request = fetch_request(&state.pool, request_id).await?;
    let request: RecommendationRequest = request.try_into()?;

    log_activity(&state.event_bus, "created", Some(principal.account_id), &request);

    Ok((StatusCode::CREATED, Json(request)))
}

/// Requester's full replace of the non-status fields, allowed in any
/// state. Reassigning the professor re-runs the professor validation.
#[utoipa::path(
    put,
    path = "/requests/{id}",
    tag = "Requests",
    params(("id" = Uuid, Path, description = "Request id")),
    request_body = RequestUpdateRequest,
    responses(
        (status = 200, description = "Request updated", body = RecommendationRequest),
        (status = 404, description = "Request not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_request(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<RequestUpdateRequest>,
) -> AppResult<Json<RecommendationRequest>> {
    ops::REQUEST_UPDATE.check_role(&principal)?;

    let request = fetch_owned(&state.pool, &principal, id, &ops::REQUEST_UPDATE).await?;
    let professor_id = resolve_professor(&state.pool, &payload.professor_email).await?;

    let now = utc_now();
    sqlx::query(
        "UPDATE recommendation_requests SET professor_id = ?, request_type = ?, details = ?, needed_by_date = ?, updated_at = ? \
         WHERE id = ?",
    )
    .bind(&professor_id)
    .bind(&payload.request_type)
    .bind(&payload.details)
    .bind(payload.needed_by_date)
    .bind(now)
    .bind(&request.id)
    .execute(&state.pool)
    .await?;

    let request = fetch_request(&state.pool, id).await?;
    let request: RecommendationRequest = request.try_into()?;

    log_activity(&state.event_bus, "updated", Some(principal.account_id), &request);

    Ok(Json(request))
}

/// Lifecycle transition, owned by the target professor (or an admin).
/// Status stays an open string: anything other than "Pending" fixes the
/// completion date in the same write, and writing "Pending" clears it.
#[utoipa::path(
    put,
    path = "/requests/{id}/status",
    tag = "Requests",
    params(("id" = Uuid, Path, description = "Request id")),
    request_body = RequestStatusUpdateRequest,
    responses(
        (status = 200, description = "Status updated", body = RecommendationRequest),
        (status = 403, description = "Caller is not a professor or admin"),
        (status = 404, description = "Request not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_request_status(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<RequestStatusUpdateRequest>,
) -> AppResult<Json<RecommendationRequest>> {
    ops::REQUEST_UPDATE_STATUS.check_role(&principal)?;

    let request = fetch_owned(&state.pool, &principal, id, &ops::REQUEST_UPDATE_STATUS).await?;

    let now = utc_now();
    let completion_date = if payload.status == STATUS_PENDING { None } else { Some(now) };
    let details = payload.details.or(request.details);

    sqlx::query(
        "UPDATE recommendation_requests SET status = ?, completion_date = ?, details = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&payload.status)
    .bind(completion_date)
    .bind(&details)
    .bind(now)
    .bind(&request.id)
    .execute(&state.pool)
    .await?;

    let request = fetch_request(&state.pool, id).await?;
    let request: RecommendationRequest = request.try_into()?;

    log_activity(&state.event_bus, "status_updated", Some(principal.account_id), &request);

    Ok(Json(request))
}

#[utoipa::path(
    delete,
    path = "/requests/{id}",
    tag = "Requests",
    params(("id" = Uuid, Path, description = "Request id")),
    responses(
        (status = 204, description = "Request deleted"),
        (status = 404, description = "Request not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_request(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    ops::REQUEST_DELETE.check_role(&principal)?;

    let request = fetch_owned(&state.pool, &principal, id, &ops::REQUEST_DELETE).await?;
    let logged: RecommendationRequest = request.clone().try_into()?;

    sqlx::query("DELETE FROM recommendation_requests WHERE id = ?")
        .bind(&request.id)
        .execute(&state.pool)
        .await?;

    log_activity(&state.event_bus, "deleted", Some(principal.account_id), &logged);

    Ok(StatusCode::NO_CONTENT)
}

/// Fetch the record and evaluate the operation's ownership predicate.
/// Absence and non-ownership produce the identical not-found.
async fn fetch_owned(
    pool: &SqlitePool,
    principal: &Principal,
    id: Uuid,
    op: &OperationSpec,
) -> AppResult<DbRecommendationRequest> {
    let request = fetch_request(pool, id).await?;

    if !op.owns(principal, request.requester_id()?, request.professor_id()?) {
        return Err(not_found(id));
    }

    Ok(request)
}

async fn fetch_request(pool: &SqlitePool, id: Uuid) -> AppResult<DbRecommendationRequest> {
    let sql = format!("SELECT {REQUEST_COLUMNS} FROM recommendation_requests WHERE id = ?");
    sqlx::query_as::<_, DbRecommendationRequest>(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| not_found(id))
}

/// Resolve a professor reference from an email. No live account, or an
/// account without the professor flag, both read as not found.
async fn resolve_professor(pool: &SqlitePool, email: &str) -> AppResult<String> {
    let email = normalize_email(email);

    #[derive(sqlx::FromRow)]
    struct ProfessorRow {
        id: String,
        is_professor: bool,
    }

    let row = sqlx::query_as::<_, ProfessorRow>(
        "SELECT id, is_professor FROM accounts WHERE email = ? AND deleted_at IS NULL",
    )
    .bind(&email)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) if row.is_professor => Ok(row.id),
        _ => Err(AppError::not_found(format!("professor {email} not found"))),
    }
}

fn not_found(id: Uuid) -> AppError {
    AppError::not_found(format!("recommendation request {id} not found"))
}

fn collect(rows: Vec<DbRecommendationRequest>) -> AppResult<Vec<RecommendationRequest>> {
    rows.into_iter().map(RecommendationRequest::try_from).collect()
}
