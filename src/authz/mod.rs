//! Authorization module - role resolution and the operation policy table.
//!
//! Three pieces, evaluated in order on every request:
//! - the role resolver rebuilds the caller's role set from the account's
//!   persisted capability flags (never from the token),
//! - a per-operation role gate rejects at the boundary with a generic
//!   forbidden,
//! - an ownership predicate is evaluated inside the handler once the target
//!   record is loaded; misses and non-ownership are indistinguishable to the
//!   caller.

mod policy;
mod principal;
mod resolver;

pub use policy::{ops, require_self_or_admin, OperationSpec, OwnerRule, RoleRule};
pub use principal::{Principal, Role};
pub use resolver::{capability_roles, resolve};
