use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::events::Loggable;
use crate::models::account::parse_id;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RequestType {
    pub id: Uuid,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for RequestType {
    fn entity_type() -> &'static str {
        "request_type"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbRequestType {
    pub id: String,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbRequestType> for RequestType {
    type Error = AppError;

    fn try_from(value: DbRequestType) -> Result<Self, Self::Error> {
        Ok(RequestType {
            id: parse_id(&value.id)?,
            label: value.label,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RequestTypeCreateRequest {
    #[schema(example = "Graduate school")]
    pub label: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RequestTypeUpdateRequest {
    #[schema(example = "Graduate school (MSc/PhD)")]
    pub label: String,
}
