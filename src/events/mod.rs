//! Activity logging over a broadcast event bus.
//!
//! Handlers publish domain events (entity mutations only; authorization
//! decisions are never logged) and a background listener persists them to
//! the `activity_log` projection and the hash-chained `event_store`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use uuid::Uuid;

pub mod loggable;
pub use loggable::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent<T> {
    pub id: Uuid,
    pub name: &'static str,
    pub occurred_at: DateTime<Utc>,
    pub actor_id: Option<Uuid>,
    pub subject_id: Option<Uuid>,
    pub payload: T,
}

impl<T> DomainEvent<T> {
    pub fn new(name: &'static str, actor_id: Option<Uuid>, subject_id: Option<Uuid>, payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            occurred_at: Utc::now(),
            actor_id,
            subject_id,
            payload,
        }
    }
}

pub type EventBus = broadcast::Sender<Value>;

pub fn init_event_bus() -> (EventBus, broadcast::Receiver<Value>) {
    broadcast::channel(1024)
}

/// Request context attached to activity entries (IP, User-Agent).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl RequestContext {
    pub fn from_headers(headers: &axum::http::HeaderMap) -> Self {
        let ip = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(String::from)
            });

        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Self { ip, user_agent }
    }
}

/// Structured activity payload persisted alongside each event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityPayload {
    /// The current/new state of the entity
    #[serde(rename = "new")]
    pub current: Value,
    /// The previous state (for update/delete operations)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<RequestContext>,
    pub severity: Severity,
}

pub fn log_activity<T: Loggable>(event_bus: &EventBus, action: &str, actor_id: Option<Uuid>, entity: &T) {
    log_activity_with_context(event_bus, action, actor_id, entity, None, None);
}

/// Publish an entity mutation to the bus. Fire and forget: a full or closed
/// channel must never fail the request that produced the event.
pub fn log_activity_with_context<T: Loggable>(
    event_bus: &EventBus,
    action: &str,
    actor_id: Option<Uuid>,
    entity: &T,
    old_entity: Option<&T>,
    context: Option<RequestContext>,
) {
    let event_name = format!("{}.{}", T::entity_type(), action);

    // Event names come from a small bounded set, so leaking them to get a
    // 'static str is fine.
    let static_name: &'static str = Box::leak(event_name.into_boxed_str());

    let payload = ActivityPayload {
        current: serde_json::to_value(entity).unwrap_or_default(),
        old: old_entity.map(|e| serde_json::to_value(e).unwrap_or_default()),
        context,
        severity: entity.severity_for_action(action),
    };

    let event = DomainEvent::new(
        static_name,
        actor_id,
        Some(entity.subject_id()),
        serde_json::to_value(&payload).unwrap_or_default(),
    );

    let _ = event_bus.send(serde_json::to_value(event).unwrap_or_default());
}

fn describe(event_name: &str) -> String {
    match event_name {
        "request.created" => "Recommendation request submitted",
        "request.updated" => "Recommendation request updated",
        "request.status_updated" => "Recommendation request status changed",
        "request.deleted" => "Recommendation request deleted",
        "request_type.created" => "Request type added to catalog",
        "request_type.updated" => "Request type relabeled",
        "request_type.deleted" => "Request type removed from catalog",
        "account.registered" => "Account registered",
        "account.flags_updated" => "Account capability flags changed",
        _ => "System event",
    }
    .to_string()
}

struct StoredEvent {
    name: String,
    actor_id: Option<Uuid>,
    subject_id: Option<Uuid>,
    occurred_at: DateTime<Utc>,
    severity: String,
    raw: Value,
}

fn parse_event(event: &Value) -> StoredEvent {
    let name = event
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown")
        .to_string();

    let actor_id = event
        .get("actor_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok());
    let subject_id = event
        .get("subject_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok());

    let occurred_at = event
        .get("occurred_at")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    let severity = event
        .get("payload")
        .and_then(|p| p.get("severity"))
        .and_then(|s| s.as_str())
        .unwrap_or("important")
        .to_string();

    StoredEvent {
        name,
        actor_id,
        subject_id,
        occurred_at,
        severity,
        raw: event.clone(),
    }
}

async fn append_activity_log(pool: &SqlitePool, stored: &StoredEvent) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO activity_log (id, event_name, description, actor_id, subject_id, occurred_at, properties, severity) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&stored.name)
    .bind(describe(&stored.name))
    .bind(stored.actor_id.map(|u| u.to_string()))
    .bind(stored.subject_id.map(|u| u.to_string()))
    .bind(stored.occurred_at)
    .bind(serde_json::to_string(&stored.raw).unwrap_or_default())
    .bind(&stored.severity)
    .execute(pool)
    .await?;

    Ok(())
}

/// Append to the event store with hash chaining: each row's hash covers the
/// previous row's hash and its own payload, so tampering breaks the chain.
async fn append_event_store(pool: &SqlitePool, stored: &StoredEvent) -> Result<(), sqlx::Error> {
    let payload = serde_json::to_string(&stored.raw).unwrap_or_default();

    let prev_hash: Option<String> =
        sqlx::query_scalar("SELECT hash FROM event_store ORDER BY created_at DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    let mut hasher = Sha256::new();
    if let Some(ref ph) = prev_hash {
        hasher.update(ph.as_bytes());
    }
    hasher.update(payload.as_bytes());
    let hash = hex::encode(hasher.finalize());

    sqlx::query(
        "INSERT INTO event_store (id, event_name, occurred_at, actor_id, subject_id, payload, severity, prev_hash, hash, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&stored.name)
    .bind(stored.occurred_at)
    .bind(stored.actor_id.map(|u| u.to_string()))
    .bind(stored.subject_id.map(|u| u.to_string()))
    .bind(&payload)
    .bind(&stored.severity)
    .bind(&prev_hash)
    .bind(&hash)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn start_activity_listener(mut rx: broadcast::Receiver<Value>, pool: SqlitePool) {
    tracing::info!("activity listener started");
    while let Ok(event) = rx.recv().await {
        let stored = parse_event(&event);

        if let Err(e) = append_activity_log(&pool, &stored).await {
            tracing::error!("failed to save activity log: {}", e);
        }

        if let Err(e) = append_event_store(&pool, &stored).await {
            tracing::error!("failed to save to event store: {}", e);
        }
    }
}
