//! Per-request role resolution.
//!
//! Tokens prove identity only. The role set is recomputed from the
//! account's current capability flags on every request, so a flag change
//! takes effect on the very next call and a stale token can never carry a
//! revoked capability.

use std::collections::HashSet;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sqlx::SqlitePool;

use crate::app::AppState;
use crate::errors::AppError;
use crate::jwt::AuthUser;
use crate::utils::normalize_email;

use super::principal::{Principal, Role};

/// Flags -> capability roles. Pure; the baseline `Role::User` is not part
/// of this mapping (it belongs to the token, not the account).
pub fn capability_roles(is_admin: bool, is_professor: bool, is_student: bool) -> HashSet<Role> {
    let mut roles = HashSet::new();
    if is_admin {
        roles.insert(Role::Admin);
    }
    if is_professor {
        roles.insert(Role::Professor);
    }
    if is_student {
        roles.insert(Role::Student);
    }
    roles
}

#[derive(Debug, sqlx::FromRow)]
struct FlagRow {
    is_admin: bool,
    is_professor: bool,
    is_student: bool,
}

/// Build the principal for one request. A missing account is not an error:
/// the caller stays authenticated with only the baseline role, and some
/// other collaborator is responsible for provisioning a profile. Store
/// failures do propagate.
pub async fn resolve(pool: &SqlitePool, auth: &AuthUser) -> Result<Principal, AppError> {
    let email = normalize_email(&auth.email);

    let flags = sqlx::query_as::<_, FlagRow>(
        "SELECT is_admin, is_professor, is_student FROM accounts WHERE email = ? AND deleted_at IS NULL",
    )
    .bind(&email)
    .fetch_optional(pool)
    .await?;

    let mut roles = HashSet::from([Role::User]);

    match flags {
        Some(row) => {
            roles.extend(capability_roles(row.is_admin, row.is_professor, row.is_student));
            tracing::debug!(email = %email, roles = ?roles, "resolved roles from account flags");
        }
        None => {
            tracing::debug!(email = %email, "no account for authenticated caller, baseline roles only");
        }
    }

    Ok(Principal::new(auth.account_id, email).with_roles(roles))
}

/// Extracting a `Principal` runs authentication and role resolution exactly
/// once for the request; handlers receive the finished context as a value.
#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        resolve(&state.pool, &auth).await
    }
}
