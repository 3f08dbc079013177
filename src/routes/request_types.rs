//! The request-type catalog: a flat, admin-managed lookup table. Requests
//! reference entries by label, not by id.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{ops, Principal};
use crate::errors::{AppError, AppResult};
use crate::events::log_activity;
use crate::models::request_type::{DbRequestType, RequestType, RequestTypeCreateRequest, RequestTypeUpdateRequest};
use crate::utils::utc_now;

#[utoipa::path(
    get,
    path = "/request-types",
    tag = "RequestTypes",
    responses((status = 200, description = "List request types", body = [RequestType])),
    security(("bearerAuth" = []))
)]
pub async fn list_request_types(
    State(state): State<AppState>,
    principal: Principal,
) -> AppResult<Json<Vec<RequestType>>> {
    ops::TYPE_READ.check_role(&principal)?;

    let types = sqlx::query_as::<_, DbRequestType>(
        "SELECT id, label, created_at, updated_at FROM request_types ORDER BY label",
    )
    .fetch_all(&state.pool)
    .await?;

    let types: Vec<RequestType> = types
        .into_iter()
        .map(RequestType::try_from)
        .collect::<Result<_, _>>()?;

    Ok(Json(types))
}

#[utoipa::path(
    get,
    path = "/request-types/{id}",
    tag = "RequestTypes",
    params(("id" = Uuid, Path, description = "Request type id")),
    responses(
        (status = 200, description = "Request type detail", body = RequestType),
        (status = 404, description = "Request type not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn get_request_type(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<Json<RequestType>> {
    ops::TYPE_READ.check_role(&principal)?;

    let request_type = fetch_request_type(&state.pool, id).await?;
    let request_type: RequestType = request_type.try_into()?;
    Ok(Json(request_type))
}

#[utoipa::path(
    post,
    path = "/request-types",
    tag = "RequestTypes",
    request_body = RequestTypeCreateRequest,
    responses(
        (status = 201, description = "Request type created", body = RequestType),
        (status = 409, description = "Label already exists")
    ),
    security(("bearerAuth" = []))
)]
pub async fn create_request_type(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<RequestTypeCreateRequest>,
) -> AppResult<(StatusCode, Json<RequestType>)> {
    ops::TYPE_WRITE.check_role(&principal)?;
    ensure_label_available(&state.pool, &payload.label, None).await?;

    let now = utc_now();
    let type_id = Uuid::new_v4();

    sqlx::query("INSERT INTO request_types (id, label, created_at, updated_at) VALUES (?, ?, ?, ?)")
        .bind(type_id.to_string())
        .bind(&payload.label)
        .bind(now)
        .bind(now)
        .execute(&state.pool)
        .await?;

    let request_type = fetch_request_type(&state.pool, type_id).await?;
    let request_type: RequestType = request_type.try_into()?;

    log_activity(&state.event_bus, "created", Some(principal.account_id), &request_type);

    Ok((StatusCode::CREATED, Json(request_type)))
}

#[utoipa::path(
    put,
    path = "/request-types/{id}",
    tag = "RequestTypes",
    params(("id" = Uuid, Path, description = "Request type id")),
    request_body = RequestTypeUpdateRequest,
    responses(
        (status = 200, description = "Request type updated", body = RequestType),
        (status = 404, description = "Request type not found"),
        (status = 409, description = "Label already exists")
    ),
    security(("bearerAuth" = []))
)]
pub async fn update_request_type(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<RequestTypeUpdateRequest>,
) -> AppResult<Json<RequestType>> {
    ops::TYPE_WRITE.check_role(&principal)?;

    let existing = fetch_request_type(&state.pool, id).await?;
    ensure_label_available(&state.pool, &payload.label, Some(&existing.id)).await?;

    let now = utc_now();
    sqlx::query("UPDATE request_types SET label = ?, updated_at = ? WHERE id = ?")
        .bind(&payload.label)
        .bind(now)
        .bind(&existing.id)
        .execute(&state.pool)
        .await?;

    let request_type = fetch_request_type(&state.pool, id).await?;
    let request_type: RequestType = request_type.try_into()?;

    log_activity(&state.event_bus, "updated", Some(principal.account_id), &request_type);

    Ok(Json(request_type))
}

#[utoipa::path(
    delete,
    path = "/request-types/{id}",
    tag = "RequestTypes",
    params(("id" = Uuid, Path, description = "Request type id")),
    responses(
        (status = 204, description = "Request type deleted"),
        (status = 404, description = "Request type not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn delete_request_type(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    ops::TYPE_WRITE.check_role(&principal)?;

    let existing = fetch_request_type(&state.pool, id).await?;
    let logged: RequestType = existing.clone().try_into()?;

    sqlx::query("DELETE FROM request_types WHERE id = ?")
        .bind(&existing.id)
        .execute(&state.pool)
        .await?;

    log_activity(&state.event_bus, "deleted", Some(principal.account_id), &logged);

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_request_type(pool: &SqlitePool, id: Uuid) -> AppResult<DbRequestType> {
    sqlx::query_as::<_, DbRequestType>("SELECT id, label, created_at, updated_at FROM request_types WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found(format!("request type {id} not found")))
}

async fn ensure_label_available(pool: &SqlitePool, label: &str, exclude_id: Option<&str>) -> AppResult<()> {
    let count: i64 = match exclude_id {
        Some(id) => {
            sqlx::query_scalar("SELECT COUNT(1) FROM request_types WHERE label = ? AND id != ?")
                .bind(label)
                .bind(id)
                .fetch_one(pool)
                .await?
        }
        None => {
            sqlx::query_scalar("SELECT COUNT(1) FROM request_types WHERE label = ?")
                .bind(label)
                .fetch_one(pool)
                .await?
        }
    };

    if count > 0 {
        return Err(AppError::conflict("request type label already in use"));
    }

    Ok(())
}
