//! Auth service: credential operations and session-store transitions.
//!
//! ARCHITECTURE
//! ============
//! Every operation here funnels into `SessionStore::set_state`; nothing else
//! in the crate writes the store. Profile/role fetches run as independent
//! spawned tasks so a store notification callback never performs network
//! I/O, and their results are applied only if the identity they were fetched
//! for still matches the live state.
//!
//! TRADE-OFFS
//! ==========
//! Sign-out clears local state before attempting the remote revoke. A failed
//! revoke leaves a server-side session the provider will expire on its own;
//! the alternative (blocking local logout on the network) is worse.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::provider::{Directory, IdentityProvider, ProviderError, ProviderSession, SessionChange, SignUpOutcome};
use crate::services::role;
use crate::state::{AuthPhase, AuthState};
use crate::store::SessionStore;

const MIN_PASSWORD_LEN: usize = 6;

// =============================================================================
// ERROR TYPE
// =============================================================================

/// Classified auth failure. Stable tags the presentation layer maps to
/// human-readable messages; none of these escape as panics or raw transport
/// errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("an account with this email already exists")]
    DuplicateAccount,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("email address has not been verified")]
    UnverifiedEmail,
    #[error("password does not meet minimum requirements")]
    WeakCredential,
    #[error("too many attempts, try again later")]
    RateLimited,
    #[error("network error: {0}")]
    Network(String),
    #[error("authentication failed: {0}")]
    Unknown(String),
}

// =============================================================================
// LOCAL VALIDATION
// =============================================================================

/// Fail-fast checks performed before any network call.
fn validate_sign_up(email: &str, password: &str, full_name: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() {
        return Err(AuthError::Validation("email is required".into()));
    }
    if full_name.trim().is_empty() {
        return Err(AuthError::Validation("full name is required".into()));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_sign_in(email: &str, password: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AuthError::Validation("email and password are required".into()));
    }
    Ok(())
}

// =============================================================================
// ERROR CLASSIFICATION
// =============================================================================

/// Map a sign-up provider failure onto the stable taxonomy by inspecting
/// the backend's message fragments.
fn classify_sign_up_error(err: ProviderError) -> AuthError {
    match err {
        ProviderError::Network(msg) => AuthError::Network(msg),
        ProviderError::Decode(msg) => AuthError::Unknown(msg),
        ProviderError::Http { status: 429, .. } => AuthError::RateLimited,
        ProviderError::Http { status, body } => {
            let lower = body.to_ascii_lowercase();
            if lower.contains("already registered") || lower.contains("already exists") {
                AuthError::DuplicateAccount
            } else if lower.contains("password should be at least") || lower.contains("weak password") {
                AuthError::WeakCredential
            } else {
                AuthError::Unknown(format!("{status}: {body}"))
            }
        }
    }
}

/// Map a sign-in provider failure onto the stable taxonomy.
fn classify_sign_in_error(err: ProviderError) -> AuthError {
    match err {
        ProviderError::Network(msg) => AuthError::Network(msg),
        ProviderError::Decode(msg) => AuthError::Unknown(msg),
        ProviderError::Http { status: 429, .. } => AuthError::RateLimited,
        ProviderError::Http { status, body } => {
            let lower = body.to_ascii_lowercase();
            if lower.contains("invalid login credentials") {
                AuthError::InvalidCredentials
            } else if lower.contains("email not confirmed") {
                AuthError::UnverifiedEmail
            } else {
                AuthError::Unknown(format!("{status}: {body}"))
            }
        }
    }
}

// =============================================================================
// AUTH SERVICE
// =============================================================================

/// Drives the session store against the identity provider and directory.
#[derive(Clone)]
pub struct AuthService {
    store: SessionStore,
    provider: Arc<dyn IdentityProvider>,
    directory: Arc<dyn Directory>,
    /// User ids with a profile/role fetch currently in flight.
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

impl AuthService {
    #[must_use]
    pub fn new(store: SessionStore, provider: Arc<dyn IdentityProvider>, directory: Arc<dyn Directory>) -> Self {
        Self { store, provider, directory, in_flight: Arc::new(Mutex::new(HashSet::new())) }
    }

    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Create an account.
    ///
    /// The backend requires email verification, so the usual success is
    /// [`SignUpOutcome::VerificationPending`] and the store stays
    /// unauthenticated until the user verifies and signs in.
    ///
    /// # Errors
    ///
    /// `Validation` before any network call for empty fields or a password
    /// shorter than six characters; otherwise one of `DuplicateAccount`,
    /// `WeakCredential`, `RateLimited`, `Network`, `Unknown`.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<SignUpOutcome, AuthError> {
        validate_sign_up(email, password, full_name)?;
        let outcome = self
            .provider
            .create_account(email.trim(), password, full_name.trim())
            .await
            .map_err(classify_sign_up_error)?;
        if let SignUpOutcome::Authenticated(provider_session) = &outcome {
            self.apply_session(provider_session.clone());
        }
        Ok(outcome)
    }

    /// Sign in with credentials.
    ///
    /// On success the store is authenticated with identity populated
    /// immediately; the profile/role fetch continues in the background.
    ///
    /// # Errors
    ///
    /// One of `Validation`, `InvalidCredentials`, `UnverifiedEmail`,
    /// `RateLimited`, `Network`, `Unknown`. The store is left untouched on
    /// failure.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        validate_sign_in(email, password)?;
        let provider_session = self
            .provider
            .authenticate(email.trim(), password)
            .await
            .map_err(classify_sign_in_error)?;
        self.apply_session(provider_session);
        Ok(())
    }

    /// Sign out. Local state is cleared unconditionally; a failed remote
    /// revoke is logged, never surfaced. Signing out while already
    /// unauthenticated emits no notification.
    pub async fn sign_out(&self) {
        let current = self.store.get_state();
        let token = current.session.map(|s| s.access_token);
        if current.phase != AuthPhase::Unauthenticated {
            self.store.set_state(AuthState::unauthenticated());
        }
        if let Some(token) = token {
            if let Err(e) = self.provider.revoke_session(&token).await {
                tracing::warn!(error = %e, "remote session revoke failed; local sign-out already applied");
            }
        }
    }

    /// Re-run the profile/role fetch for the current identity. No-op when
    /// unauthenticated. Must be called from within a runtime.
    pub fn refresh_profile(&self) {
        if let Some(user_id) = self.store.get_state().current_user_id() {
            self.spawn_profile_fetch(user_id);
        }
    }

    /// Resolve the startup session race.
    ///
    /// Starts the change-stream listener, then actively queries for an
    /// existing session. Whichever path resolves first moves the phase away
    /// from `Initializing`; the second resolution is idempotent and never
    /// reverts an authenticated state. A failed or empty query only settles
    /// `Initializing` down to `Unauthenticated`.
    pub async fn bootstrap(&self) {
        let mut changes = self.provider.subscribe_changes();
        let listener = self.clone();
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(SessionChange::SignedIn(ps) | SessionChange::Refreshed(ps)) => {
                        listener.apply_session(ps);
                    }
                    Ok(SessionChange::SignedOut) => {
                        if listener.store.get_state().phase != AuthPhase::Unauthenticated {
                            listener.store.set_state(AuthState::unauthenticated());
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "session change stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        match self.provider.current_session().await {
            Ok(Some(provider_session)) => self.apply_session(provider_session),
            Ok(None) => self.settle_unauthenticated(),
            Err(e) => {
                tracing::warn!(error = %e, "existing-session query failed, treating as signed out");
                self.settle_unauthenticated();
            }
        }
    }

    /// Downgrade `Initializing` to `Unauthenticated`; never touches an
    /// authenticated state (the change stream may have won the race).
    fn settle_unauthenticated(&self) {
        if self.store.get_state().phase == AuthPhase::Initializing {
            self.store.set_state(AuthState::unauthenticated());
        }
    }

    /// Apply a confirmed session to the store and kick off the background
    /// profile/role fetch.
    ///
    /// Idempotent: re-applying a session for the already-authenticated
    /// identity keeps the resolved profile and role instead of resetting
    /// them.
    fn apply_session(&self, provider_session: ProviderSession) {
        let ProviderSession { session, identity } = provider_session;
        let user_id = identity.id;
        let current = self.store.get_state();
        let next = if current.phase == AuthPhase::Authenticated
            && current.current_user_id() == Some(user_id)
        {
            AuthState {
                session: Some(session),
                identity: Some(identity),
                ..current
            }
        } else {
            AuthState::authenticated(session, identity)
        };
        self.store.set_state(next);
        self.spawn_profile_fetch(user_id);
    }

    /// Dispatch the profile/role fetch as an independent task.
    ///
    /// Concurrent fetches for the same id collapse into one in-flight
    /// request; a result whose identity no longer matches the live state is
    /// dropped silently.
    fn spawn_profile_fetch(&self, user_id: Uuid) {
        {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if !in_flight.insert(user_id) {
                tracing::debug!(%user_id, "profile fetch already in flight");
                return;
            }
        }
        let service = self.clone();
        tokio::spawn(async move {
            let fetched_profile = match service.directory.fetch_profile(user_id).await {
                Ok(profile) => profile,
                Err(e) => {
                    tracing::warn!(%user_id, error = %e, "profile fetch failed");
                    None
                }
            };
            let resolved_role = role::resolve_role(service.directory.as_ref(), user_id).await;

            service
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&user_id);

            let current = service.store.get_state();
            if current.current_user_id() != Some(user_id) {
                tracing::debug!(%user_id, "discarding stale profile fetch result");
                return;
            }
            // A missing row keeps any previously resolved profile; the
            // backend trigger may simply not have run yet.
            let profile = fetched_profile.or_else(|| current.profile.clone());
            service.store.set_state(AuthState { profile, role: resolved_role, ..current });
        });
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
