//! Fail-closed role resolution.

use uuid::Uuid;

use crate::provider::Directory;
use crate::state::Role;

/// Resolve the effective role for a user via one directory call.
///
/// Every failure mode (not found, network, malformed payload, unknown role
/// string) degrades to `Role::User` after a log line. An unresolvable role
/// must restrict capability, never block sign-in or escalate.
pub async fn resolve_role(directory: &dyn Directory, user_id: Uuid) -> Role {
    match directory.resolve_role(user_id).await {
        Ok(raw) => Role::from_db_str(&raw).unwrap_or_else(|| {
            tracing::warn!(%user_id, role = %raw, "unrecognized role string, defaulting to user");
            Role::User
        }),
        Err(e) => {
            tracing::warn!(%user_id, error = %e, "role resolution failed, defaulting to user");
            Role::User
        }
    }
}

#[cfg(test)]
#[path = "role_test.rs"]
mod tests;
