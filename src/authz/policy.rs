//! The per-operation policy table.
//!
//! Each exposed operation has a typed descriptor: the role gate checked at
//! the boundary (before any store access) and the ownership predicate
//! evaluated against the loaded record. Role failures surface as a generic
//! forbidden; ownership failures are reported by the caller as not-found so
//! non-owners cannot probe for record existence.

use uuid::Uuid;

use crate::errors::AppError;

use super::principal::{Principal, Role};

#[derive(Debug, Clone, Copy)]
pub enum RoleRule {
    /// Any authenticated principal passes.
    Authenticated,
    /// The principal must hold at least one of the listed roles.
    AnyOf(&'static [Role]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerRule {
    None,
    /// request.requester == caller
    Requester,
    /// request.professor == caller
    Professor,
}

#[derive(Debug, Clone, Copy)]
pub struct OperationSpec {
    pub name: &'static str,
    pub role: RoleRule,
    pub owner: OwnerRule,
}

impl OperationSpec {
    /// The boundary precondition. Deliberately uninformative on failure.
    pub fn check_role(&self, principal: &Principal) -> Result<(), AppError> {
        let allowed = match self.role {
            RoleRule::Authenticated => true,
            RoleRule::AnyOf(roles) => roles.iter().any(|role| principal.has_role(*role)),
        };

        if allowed {
            Ok(())
        } else {
            tracing::debug!(
                account_id = %principal.account_id,
                operation = self.name,
                "role gate denied"
            );
            Err(AppError::forbidden("insufficient role"))
        }
    }

    /// The ownership predicate, with the admin bypass evaluated first.
    /// Callers translate `false` into the same not-found they use for a
    /// missing record.
    pub fn owns(&self, principal: &Principal, requester_id: Uuid, professor_id: Uuid) -> bool {
        if principal.is_admin() {
            tracing::debug!(
                account_id = %principal.account_id,
                operation = self.name,
                "admin bypass"
            );
            return true;
        }

        match self.owner {
            OwnerRule::None => true,
            OwnerRule::Requester => requester_id == principal.account_id,
            OwnerRule::Professor => professor_id == principal.account_id,
        }
    }
}

/// Scoped-list variant: the caller must be the account in the path, or an
/// admin. Failure is not-found on purpose, matching the ownership checks.
pub fn require_self_or_admin(principal: &Principal, account_id: Uuid) -> Result<(), AppError> {
    if principal.is_admin() || principal.account_id == account_id {
        Ok(())
    } else {
        Err(AppError::not_found(format!("account {account_id} not found")))
    }
}

/// Every operation on the recommendation-request surface and its
/// collaborators, in one place.
pub mod ops {
    use super::{OperationSpec, OwnerRule, RoleRule};
    use crate::authz::Role;

    pub const REQUEST_LIST_ALL: OperationSpec = OperationSpec {
        name: "request.list_all",
        role: RoleRule::AnyOf(&[Role::Admin]),
        owner: OwnerRule::None,
    };

    pub const REQUEST_LIST_BY_REQUESTER: OperationSpec = OperationSpec {
        name: "request.list_by_requester",
        role: RoleRule::Authenticated,
        owner: OwnerRule::None,
    };

    pub const REQUEST_LIST_BY_PROFESSOR: OperationSpec = OperationSpec {
        name: "request.list_by_professor",
        role: RoleRule::Authenticated,
        owner: OwnerRule::None,
    };

    pub const REQUEST_GET: OperationSpec = OperationSpec {
        name: "request.get",
        role: RoleRule::Authenticated,
        owner: OwnerRule::None,
    };

    pub const REQUEST_CREATE: OperationSpec = OperationSpec {
        name: "request.create",
        role: RoleRule::AnyOf(&[Role::Student]),
        owner: OwnerRule::None,
    };

    pub const REQUEST_UPDATE: OperationSpec = OperationSpec {
        name: "request.update",
        role: RoleRule::Authenticated,
        owner: OwnerRule::Requester,
    };

    pub const REQUEST_UPDATE_STATUS: OperationSpec = OperationSpec {
        name: "request.update_status",
        role: RoleRule::AnyOf(&[Role::Professor, Role::Admin]),
        owner: OwnerRule::Professor,
    };

    pub const REQUEST_DELETE: OperationSpec = OperationSpec {
        name: "request.delete",
        role: RoleRule::Authenticated,
        owner: OwnerRule::Requester,
    };

    pub const TYPE_READ: OperationSpec = OperationSpec {
        name: "request_type.read",
        role: RoleRule::Authenticated,
        owner: OwnerRule::None,
    };

    pub const TYPE_WRITE: OperationSpec = OperationSpec {
        name: "request_type.write",
        role: RoleRule::AnyOf(&[Role::Admin]),
        owner: OwnerRule::None,
    };

    pub const ACCOUNT_READ: OperationSpec = OperationSpec {
        name: "account.read",
        role: RoleRule::AnyOf(&[Role::Admin]),
        owner: OwnerRule::None,
    };

    pub const ACCOUNT_SET_FLAGS: OperationSpec = OperationSpec {
        name: "account.set_flags",
        role: RoleRule::AnyOf(&[Role::Admin]),
        owner: OwnerRule::None,
    };
}
