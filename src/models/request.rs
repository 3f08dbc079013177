use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::AppError;
use crate::events::Loggable;
use crate::models::account::parse_id;

/// The one distinguished status value. "Completed" and "Rejected" are the
/// conventional terminal values, but the field is an open string: anything
/// other than pending carries a completion date.
pub const STATUS_PENDING: &str = "Pending";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecommendationRequest {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub professor_id: Uuid,
    pub request_type: String,
    pub details: Option<String>,
    pub needed_by_date: NaiveDate,
    pub submission_date: DateTime<Utc>,
    pub completion_date: Option<DateTime<Utc>>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loggable for RecommendationRequest {
    fn entity_type() -> &'static str {
        "request"
    }
    fn subject_id(&self) -> Uuid {
        self.id
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbRecommendationRequest {
    pub id: String,
    pub requester_id: String,
    pub professor_id: String,
    pub request_type: String,
    pub details: Option<String>,
    pub needed_by_date: NaiveDate,
    pub submission_date: DateTime<Utc>,
    pub completion_date: Option<DateTime<Utc>>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbRecommendationRequest {
    pub fn requester_id(&self) -> Result<Uuid, AppError> {
        parse_id(&self.requester_id)
    }

    pub fn professor_id(&self) -> Result<Uuid, AppError> {
        parse_id(&self.professor_id)
    }
}

impl TryFrom<DbRecommendationRequest> for RecommendationRequest {
    type Error = AppError;

    fn try_from(value: DbRecommendationRequest) -> Result<Self, Self::Error> {
        Ok(RecommendationRequest {
            id: parse_id(&value.id)?,
            requester_id: parse_id(&value.requester_id)?,
            professor_id: parse_id(&value.professor_id)?,
            request_type: value.request_type,
            details: value.details,
            needed_by_date: value.needed_by_date,
            submission_date: value.submission_date,
            completion_date: value.completion_date,
            status: value.status,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

/// Submission date, status and completion date are server-controlled and
/// absent here on purpose.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RequestCreateRequest {
    #[schema(example = "curie@example.edu")]
    pub professor_email: String,
    #[schema(example = "Graduate school")]
    pub request_type: String,
    #[schema(example = "Applying to the MSc programme at ETH.")]
    pub details: Option<String>,
    #[schema(example = "2026-01-15")]
    pub needed_by_date: NaiveDate,
}

/// Full replace of the non-status fields (the requester's PUT).
#[derive(Debug, Deserialize, ToSchema)]
pub struct RequestUpdateRequest {
    #[schema(example = "curie@example.edu")]
    pub professor_email: String,
    #[schema(example = "Scholarship")]
    pub request_type: String,
    pub details: Option<String>,
    #[schema(example = "2026-02-01")]
    pub needed_by_date: NaiveDate,
}

/// The professor's transition call. Status is an open string; any value
/// other than "Pending" sets the completion date.
#[derive(Debug, Deserialize, ToSchema)]
pub struct RequestStatusUpdateRequest {
    #[schema(example = "Completed")]
    pub status: String,
    #[schema(example = "Sent directly to the admissions office.")]
    pub details: Option<String>,
}
