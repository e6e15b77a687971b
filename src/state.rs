//! Auth state model: session, identity, profile, role.
//!
//! DESIGN
//! ======
//! `AuthState` is the one aggregate the rest of the portal reads. It is
//! replaced wholesale through `SessionStore::set_state`; nothing mutates it
//! field-by-field, so a snapshot handed to a subscriber is never torn.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// SESSION
// =============================================================================

/// A time-bounded proof of authentication issued by the identity provider.
///
/// The token is opaque to this crate; the provider auto-refreshes it. The
/// session is replaced as a unit on sign-in, refresh, and sign-out.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Opaque bearer credential presented to the backend on every call.
    pub access_token: String,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    /// Raw claims payload as returned by the provider, kept for diagnostics.
    pub raw_claims: serde_json::Value,
}

// =============================================================================
// IDENTITY & PROFILE
// =============================================================================

/// Stable identity confirmed by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: Uuid,
    pub email: String,
}

/// Portal profile row keyed by the identity's user id.
///
/// Created by a backend-side trigger on first sign-in; this crate only ever
/// reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub profession: Option<String>,
    pub bio: Option<String>,
    pub family_name: Option<String>,
}

// =============================================================================
// ROLE
// =============================================================================

/// Coarse authorization level gating access to protected views.
///
/// `User` is the least-privileged default; role resolution failures always
/// degrade to it, never to `Admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    Admin,
    Moderator,
    #[default]
    User,
}

impl Role {
    /// Parse the backend's lowercase role string. Unknown strings are `None`
    /// so the caller can log them before falling back to `User`.
    #[must_use]
    pub fn from_db_str(raw: &str) -> Option<Self> {
        match raw {
            "admin" => Some(Self::Admin),
            "moderator" => Some(Self::Moderator),
            "user" => Some(Self::User),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Moderator => "moderator",
            Self::User => "user",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// AUTH STATE
// =============================================================================

/// Lifecycle phase of the auth aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    /// Startup: the existing-session query has not resolved yet.
    Initializing,
    Authenticated,
    Unauthenticated,
}

/// The portal's single source of truth for "who is signed in".
///
/// Invariants, maintained by the constructors below and by `AuthService`:
/// - `Unauthenticated` carries no session, identity, or profile and role
///   `User`.
/// - `Authenticated` always carries an identity; profile and role may trail
///   it while their fetch is in flight, during which admin checks fail
///   closed.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthState {
    pub phase: AuthPhase,
    pub session: Option<Session>,
    pub identity: Option<UserIdentity>,
    pub profile: Option<UserProfile>,
    pub role: Role,
}

impl AuthState {
    /// Startup state before the existing-session query resolves.
    #[must_use]
    pub fn initializing() -> Self {
        Self {
            phase: AuthPhase::Initializing,
            session: None,
            identity: None,
            profile: None,
            role: Role::User,
        }
    }

    /// Signed-out state: everything cleared, least-privilege role.
    #[must_use]
    pub fn unauthenticated() -> Self {
        Self {
            phase: AuthPhase::Unauthenticated,
            session: None,
            identity: None,
            profile: None,
            role: Role::User,
        }
    }

    /// Freshly signed-in state: identity confirmed, profile and role still
    /// unresolved.
    #[must_use]
    pub fn authenticated(session: Session, identity: UserIdentity) -> Self {
        Self {
            phase: AuthPhase::Authenticated,
            session: Some(session),
            identity: Some(identity),
            profile: None,
            role: Role::User,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.phase == AuthPhase::Authenticated
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.phase == AuthPhase::Authenticated && self.role == Role::Admin
    }

    /// Admin counts as moderator for moderator-gated views.
    #[must_use]
    pub fn is_moderator(&self) -> bool {
        self.phase == AuthPhase::Authenticated && matches!(self.role, Role::Admin | Role::Moderator)
    }

    /// Current user id for ownership stamping on feature-page writes.
    #[must_use]
    pub fn current_user_id(&self) -> Option<Uuid> {
        self.identity.as_ref().map(|identity| identity.id)
    }

    #[must_use]
    pub fn current_role(&self) -> Role {
        self.role
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;

    /// Session with a one-hour lifetime and the given token.
    #[must_use]
    pub fn dummy_session(token: &str) -> Session {
        let issued_at = OffsetDateTime::now_utc();
        Session {
            access_token: token.to_owned(),
            issued_at,
            expires_at: issued_at + time::Duration::hours(1),
            raw_claims: serde_json::json!({}),
        }
    }

    #[must_use]
    pub fn dummy_identity(id: Uuid, email: &str) -> UserIdentity {
        UserIdentity { id, email: email.to_owned() }
    }

    #[must_use]
    pub fn dummy_profile(user_id: Uuid) -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            user_id,
            full_name: "Asha Patel".into(),
            email: "asha@example.com".into(),
            avatar_url: None,
            phone: None,
            location: Some("Leicester".into()),
            profession: None,
            bio: None,
            family_name: Some("Patel".into()),
        }
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
