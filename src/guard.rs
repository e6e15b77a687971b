//! Route guard: pure authorization decisions over an `AuthState` snapshot.
//!
//! DESIGN
//! ======
//! No side effects, no internal state. The presentation layer calls
//! [`evaluate`] before rendering a protected subtree and re-evaluates on
//! every store notification; given the same snapshot the answer is always
//! the same, so the whole policy is testable as a table.

use uuid::Uuid;

use crate::state::{AuthPhase, AuthState};

/// Access requirement declared by a protected view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLevel {
    /// Any signed-in user.
    Authenticated,
    /// Moderators and admins.
    ModeratorOnly,
    /// Admins only.
    AdminOnly,
}

/// What the presentation layer should render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session bootstrap has not resolved; show a spinner.
    Loading,
    /// Not signed in; send to the login page.
    RedirectLogin,
    /// Signed in but under-privileged; send home.
    RedirectHome,
    /// Render the protected subtree.
    Render,
}

/// Decide whether the protected view may render.
///
/// Role checks fail closed: while a profile/role fetch is still trailing the
/// identity, the role is `User` and admin/moderator gates redirect home.
#[must_use]
pub fn evaluate(state: &AuthState, level: AccessLevel) -> GuardDecision {
    match state.phase {
        AuthPhase::Initializing => GuardDecision::Loading,
        AuthPhase::Unauthenticated => GuardDecision::RedirectLogin,
        AuthPhase::Authenticated => match level {
            AccessLevel::AdminOnly if !state.is_admin() => GuardDecision::RedirectHome,
            AccessLevel::ModeratorOnly if !state.is_moderator() => GuardDecision::RedirectHome,
            _ => GuardDecision::Render,
        },
    }
}

/// Ownership rule shared by every feature page: a signed-in user may modify
/// records they own, admins may modify any record. Moderators get no blanket
/// write access.
#[must_use]
pub fn can_modify(state: &AuthState, owner: Uuid) -> bool {
    if !state.is_authenticated() {
        return false;
    }
    state.is_admin() || state.current_user_id() == Some(owner)
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
