use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
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

/// Register an account and return (token, account id).
async fn register(app: &Router, name: &str, email: &str) -> Result<(String, String)> {
    let (status, body) = send(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({ "name": name, "email": email, "password": "password123" })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "register failed: {body}");

    let token = body.get("token").and_then(|v| v.as_str()).context("missing token")?.to_string();
    let id = body
        .get("account")
        .and_then(|a| a.get("id"))
        .and_then(|v| v.as_str())
        .context("missing account id")?
        .to_string();
    Ok((token, id))
}

async fn set_flags(pool: &SqlitePool, email: &str, is_admin: bool, is_professor: bool, is_student: bool) -> Result<()> {
    sqlx::query("UPDATE accounts SET is_admin = ?, is_professor = ?, is_student = ? WHERE email = ?")
        .bind(is_admin)
        .bind(is_professor)
        .bind(is_student)
        .bind(email)
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_request(app: &Router, token: &str, professor_email: &str) -> Result<String> {
    let (status, body) = send(
        app,
        "POST",
        "/requests",
        Some(token),
        Some(json!({
            "professor_email": professor_email,
            "request_type": "Graduate school",
            "details": "MSc application",
            "needed_by_date": "2026-03-01"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED, "create request failed: {body}");
    Ok(body.get("id").and_then(|v| v.as_str()).context("missing request id")?.to_string())
}

#[tokio::test]
async fn role_gates_reject_with_generic_forbidden() -> Result<()> {
    let (pool, app, _dir) = setup("role_gates.db").await?;

    let (student_token, _) = register(&app, "Student", "student@example.com").await?;
    let (prof_token, _) = register(&app, "Professor", "prof@example.com").await?;
    set_flags(&pool, "prof@example.com", false, true, false).await?;

    // Listing everything is admin-only.
    let (status, body) = send(&app, "GET", "/requests", Some(&student_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body.get("type").and_then(|v| v.as_str()), Some("forbidden"));

    // Creating a request requires the student capability; this account is
    // professor-only.
    let (status, _) = send(
        &app,
        "POST",
        "/requests",
        Some(&prof_token),
        Some(json!({
            "professor_email": "prof@example.com",
            "request_type": "Graduate school",
            "needed_by_date": "2026-03-01"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // The status transition gate requires professor or admin.
    let (status, _) = send(
        &app,
        "PUT",
        "/requests/00000000-0000-0000-0000-000000000000/status",
        Some(&student_token),
        Some(json!({ "status": "Completed" })),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // No token at all is unauthorized, not forbidden.
    let (status, body) = send(&app, "GET", "/requests", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.get("type").and_then(|v| v.as_str()), Some("unauthorized"));

    Ok(())
}

#[tokio::test]
async fn scoped_lists_are_self_or_admin() -> Result<()> {
    let (pool, app, _dir) = setup("scoped_lists.db").await?;

    let (alice_token, alice_id) = register(&app, "Alice", "alice@example.com").await?;
    let (bob_token, bob_id) = register(&app, "Bob", "bob@example.com").await?;
    let (admin_token, _) = register(&app, "Admin", "admin@example.com").await?;
    set_flags(&pool, "admin@example.com", true, false, false).await?;

    let (prof_token, prof_id) = register(&app, "Prof", "prof@example.com").await?;
    set_flags(&pool, "prof@example.com", false, true, false).await?;

    // Self access works.
    let (status, _) = send(&app, "GET", &format!("/requests/by-requester/{alice_id}"), Some(&alice_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", &format!("/requests/by-professor/{prof_id}"), Some(&prof_token), None).await?;
    assert_eq!(status, StatusCode::OK);

    // Another user's scope reads as not-found, never forbidden.
    let (status, body) = send(&app, "GET", &format!("/requests/by-requester/{alice_id}"), Some(&bob_token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body.get("type").and_then(|v| v.as_str()), Some("not_found"));

    let (status, _) = send(&app, "GET", &format!("/requests/by-professor/{prof_id}"), Some(&bob_token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Admin reads any scope.
    let (status, _) = send(&app, "GET", &format!("/requests/by-requester/{bob_id}"), Some(&admin_token), None).await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn ownership_misses_read_as_not_found() -> Result<()> {
    let (pool, app, _dir) = setup("ownership.db").await?;

    let (alice_token, _) = register(&app, "Alice", "alice@example.com").await?;
    let (bob_token, _) = register(&app, "Bob", "bob@example.com").await?;
    let (_prof_token, _) = register(&app, "Prof", "prof@example.com").await?;
    set_flags(&pool, "prof@example.com", false, true, false).await?;
    let (other_prof_token, _) = register(&app, "Other Prof", "other.prof@example.com").await?;
    set_flags(&pool, "other.prof@example.com", false, true, false).await?;

    let request_id = create_request(&app, &alice_token, "prof@example.com").await?;

    let update_body = json!({
        "professor_email": "prof@example.com",
        "request_type": "Scholarship",
        "details": "updated",
        "needed_by_date": "2026-04-01"
    });

    // Bob is neither requester nor professor nor admin: mutation reads as
    // not-found, indistinguishable from a missing record.
    let (status, body) = send(&app, "PUT", &format!("/requests/{request_id}"), Some(&bob_token), Some(update_body.clone())).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body.get("type").and_then(|v| v.as_str()), Some("not_found"));

    let (status, _) = send(&app, "DELETE", &format!("/requests/{request_id}"), Some(&bob_token), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // A different professor gets the same answer on the status route.
    let (status, body) = send(
        &app,
        "PUT",
        &format!("/requests/{request_id}/status"),
        Some(&other_prof_token),
        Some(json!({ "status": "Completed" })),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let message = body.get("message").and_then(|v| v.as_str()).unwrap_or_default();
    assert!(message.contains(&request_id), "message should reference the id: {message}");

    // And a genuinely missing record yields the same shape.
    let (status, _) = send(
        &app,
        "DELETE",
        "/requests/00000000-0000-0000-0000-000000000001",
        Some(&bob_token),
        None,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Plain reads stay open to any authenticated caller.
    let (status, _) = send(&app, "GET", &format!("/requests/{request_id}"), Some(&bob_token), None).await?;
    assert_eq!(status, StatusCode::OK);

    // The owner can still update.
    let (status, _) = send(&app, "PUT", &format!("/requests/{request_id}"), Some(&alice_token), Some(update_body)).await?;
    assert_eq!(status, StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn admin_bypasses_every_ownership_check() -> Result<()> {
    let (pool, app, _dir) = setup("admin_bypass.db").await?;

    let (alice_token, _) = register(&app, "Alice", "alice@example.com").await?;
    let (_prof_token, _) = register(&app, "Prof", "prof@example.com").await?;
    set_flags(&pool, "prof@example.com", false, true, false).await?;
    let (admin_token, _) = register(&app, "Admin", "admin@example.com").await?;
    set_flags(&pool, "admin@example.com", true, false, false).await?;

    let request_id = create_request(&app, &alice_token, "prof@example.com").await?;

    // List all.
    let (status, body) = send(&app, "GET", "/requests", Some(&admin_token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(|a| a.len()), Some(1));

    // Requester-scoped update.
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/requests/{request_id}"),
        Some(&admin_token),
        Some(json!({
            "professor_email": "prof@example.com",
            "request_type": "Scholarship",
            "details": "admin edit",
            "needed_by_date": "2026-05-01"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    // Professor-scoped transition.
    let (status, body) = send(
        &app,
        "PUT",
        &format!("/requests/{request_id}/status"),
        Some(&admin_token),
        Some(json!({ "status": "Rejected" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("status").and_then(|v| v.as_str()), Some("Rejected"));

    // Requester-scoped delete.
    let (status, _) = send(&app, "DELETE", &format!("/requests/{request_id}"), Some(&admin_token), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    Ok(())
}

#[tokio::test]
async fn account_directory_is_admin_only() -> Result<()> {
    let (pool, app, _dir) = setup("account_admin.db").await?;

    let (student_token, student_id) = register(&app, "Student", "student@example.com").await?;
    let (admin_token, _) = register(&app, "Admin", "admin@example.com").await?;
    set_flags(&pool, "admin@example.com", true, false, false).await?;

    let (status, _) = send(&app, "GET", "/accounts", Some(&student_token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let flags_body = json!({ "is_professor": true });
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/accounts/{student_id}/flags"),
        Some(&student_token),
        Some(flags_body.clone()),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN, "no self-service elevation");

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/accounts/{student_id}/flags"),
        Some(&admin_token),
        Some(flags_body),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.get("is_professor").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(body.get("is_student").and_then(|v| v.as_bool()), Some(true), "untouched flags keep their value");

    Ok(())
}
