//! Traits for the external identity provider and the profile/role store.
//!
//! ARCHITECTURE
//! ============
//! `AuthService` talks to the outside world only through `Arc<dyn
//! IdentityProvider>` and `Arc<dyn Directory>`. The HTTP implementation in
//! [`http`] targets the hosted backend; tests substitute in-memory mocks.
//!
//! All payloads crossing this boundary are typed DTOs: a response missing a
//! required field is a `Decode` error, never a silent coercion.

pub mod http;

use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::state::{Session, UserIdentity, UserProfile};

pub use http::HttpProvider;

/// Session plus the identity it was issued for, as confirmed by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSession {
    pub session: Session,
    pub identity: UserIdentity,
}

/// Events published on the provider's change-notification stream.
#[derive(Debug, Clone)]
pub enum SessionChange {
    SignedIn(ProviderSession),
    /// Provider auto-refreshed the bearer credential.
    Refreshed(ProviderSession),
    SignedOut,
}

/// Outcome of account creation.
///
/// The backend requires email verification before the first authenticated
/// session, so the common case is `VerificationPending`; providers with
/// verification disabled may hand back a session immediately.
#[derive(Debug, Clone, PartialEq)]
pub enum SignUpOutcome {
    VerificationPending,
    Authenticated(ProviderSession),
}

/// Transport-level failure from either backing store. Classification into
/// the user-facing taxonomy happens at the `AuthService` boundary.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("backend returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Credential operations against the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account. Verification email dispatch is the provider's
    /// concern.
    ///
    /// # Errors
    ///
    /// Transport or backend rejection; classification happens upstream.
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<SignUpOutcome, ProviderError>;

    /// Exchange credentials for a session.
    ///
    /// # Errors
    ///
    /// Transport or backend rejection; classification happens upstream.
    async fn authenticate(&self, email: &str, password: &str) -> Result<ProviderSession, ProviderError>;

    /// Query for an existing session (startup bootstrap path).
    ///
    /// # Errors
    ///
    /// Transport failure; an invalid session is `Ok(None)`, not an error.
    async fn current_session(&self) -> Result<Option<ProviderSession>, ProviderError>;

    /// Revoke the session remotely. Local sign-out never waits on this
    /// succeeding.
    ///
    /// # Errors
    ///
    /// Transport or backend rejection; callers log and move on.
    async fn revoke_session(&self, access_token: &str) -> Result<(), ProviderError>;

    /// Subscribe to the provider's change-notification stream.
    fn subscribe_changes(&self) -> broadcast::Receiver<SessionChange>;
}

/// Profile and role lookups keyed by user id.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Fetch the portal profile row. `Ok(None)` means no row exists yet
    /// (the backend trigger has not run).
    ///
    /// # Errors
    ///
    /// Transport failure or a payload missing contract fields.
    async fn fetch_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, ProviderError>;

    /// Resolve the effective role string for the user. Parsing and the
    /// fail-closed fallback belong to `services::role`.
    ///
    /// # Errors
    ///
    /// Transport failure or a payload missing contract fields.
    async fn resolve_role(&self, user_id: Uuid) -> Result<String, ProviderError>;
}
