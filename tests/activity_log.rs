use std::time::Duration;

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Row, SqlitePool};
use tempfile::tempdir;
use tower::util::ServiceExt;

use letterdesk::create_app;

async fn setup(name: &str) -> Result<(SqlitePool, Router, tempfile::TempDir)> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join(name);
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"))
        .await?;
    migrator.run(&pool).await?;

    std::env::set_var("JWT_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;
    Ok((pool, app, dir))
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))?,
        None => builder.body(Body::empty())?,
    };

    let resp = app.clone().oneshot(req).await?;
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

/// The listener persists asynchronously; poll for a bit instead of racing it.
async fn wait_for_event(pool: &SqlitePool, event_name: &str) -> Result<Option<(String, String)>> {
    for _ in 0..50 {
        let row = sqlx::query("SELECT event_name, severity FROM activity_log WHERE event_name = ?")
            .bind(event_name)
            .fetch_optional(pool)
            .await?;
        if let Some(row) = row {
            return Ok(Some((row.get("event_name"), row.get("severity"))));
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Ok(None)
}

#[tokio::test]
async fn flag_toggle_writes_a_critical_activity_entry() -> Result<()> {
    let (pool, app, _dir) = setup("activity_flags.db").await?;

    let (status, body) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "name": "Target", "email": "target@example.com", "password": "password123" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    let target_id = body
        .get("account")
        .and_then(|a| a.get("id"))
        .and_then(|v| v.as_str())
        .context("missing id")?
        .to_string();

    let (_, body) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "name": "Admin", "email": "admin@example.com", "password": "password123" })),
    )
    .await?;
    let admin_token = body.get("token").and_then(|v| v.as_str()).context("missing token")?.to_string();
    sqlx::query("UPDATE accounts SET is_admin = 1 WHERE email = 'admin@example.com'")
        .execute(&pool)
        .await?;

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/accounts/{target_id}/flags"),
        Some(&admin_token),
        Some(json!({ "is_professor": true })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let entry = wait_for_event(&pool, "account.flags_updated").await?;
    let (event_name, severity) = entry.context("flag change was never logged")?;
    assert_eq!(event_name, "account.flags_updated");
    assert_eq!(severity, "critical");

    // The event store keeps a hash-chained copy.
    let hash: Option<String> =
        sqlx::query_scalar("SELECT hash FROM event_store WHERE event_name = 'account.flags_updated'")
            .fetch_optional(&pool)
            .await?;
    assert!(hash.map(|h| !h.is_empty()).unwrap_or(false), "event store row missing");

    Ok(())
}

#[tokio::test]
async fn request_lifecycle_events_are_logged() -> Result<()> {
    let (pool, app, _dir) = setup("activity_requests.db").await?;

    let (_, body) = send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "name": "Student", "email": "student@example.com", "password": "password123" })),
    )
    .await?;
    let student_token = body.get("token").and_then(|v| v.as_str()).context("missing token")?.to_string();

    send(
        &app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "name": "Prof", "email": "prof@example.com", "password": "password123" })),
    )
    .await?;
    sqlx::query("UPDATE accounts SET is_professor = 1, is_student = 0 WHERE email = 'prof@example.com'")
        .execute(&pool)
        .await?;

    let (status, _) = send(
        &app,
        "POST",
        "/requests",
        Some(&student_token),
        Some(json!({
            "professor_email": "prof@example.com",
            "request_type": "Graduate school",
            "needed_by_date": "2026-03-01"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);

    let entry = wait_for_event(&pool, "request.created").await?;
    let (_, severity) = entry.context("request creation was never logged")?;
    assert_eq!(severity, "important");

    Ok(())
}
