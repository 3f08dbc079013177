use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::events::{Loggable, Severity};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub is_professor: bool,
    pub is_student: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Loggable for Account {
    fn entity_type() -> &'static str {
        "account"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
}

/// Ids are stored as TEXT; the uuid parse happens in the TryFrom below.
#[derive(Debug, Clone, FromRow)]
pub struct DbAccount {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub is_professor: bool,
    pub is_student: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbAccount> for Account {
    type Error = AppError;

    fn try_from(value: DbAccount) -> Result<Self, Self::Error> {
        Ok(Account {
            id: parse_id(&value.id)?,
            name: value.name,
            email: value.email,
            is_admin: value.is_admin,
            is_professor: value.is_professor,
            is_student: value.is_student,
            created_at: value.created_at,
            updated_at: value.updated_at,
            deleted_at: value.deleted_at,
        })
    }
}

pub(crate) fn parse_id(id: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(id).map_err(|_| AppError::internal(format!("malformed id in store: {id}")))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "Ada Lovelace")]
    pub name: String,
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ada@example.com")]
    pub email: String,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub account: Account,
}

/// Partial toggle: only the flags present in the payload change.
#[derive(Debug, Deserialize, ToSchema)]
pub struct FlagsUpdateRequest {
    pub is_admin: Option<bool>,
    pub is_professor: Option<bool>,
    pub is_student: Option<bool>,
}

/// Capability flag changes get their own loggable record so they are
/// retained at Critical severity.
#[derive(Debug, Clone, Serialize)]
pub struct FlagsChange {
    pub account_id: Uuid,
    pub email: String,
    pub is_admin: bool,
    pub is_professor: bool,
    pub is_student: bool,
}

impl Loggable for FlagsChange {
    fn entity_type() -> &'static str {
        "account"
    }
    fn subject_id(&self) -> Uuid {
        self.account_id
    }
    fn severity(&self) -> Severity {
        Severity::Critical
    }
}
