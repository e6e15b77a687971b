//! HTTP implementation of the provider traits against the hosted backend.
//!
//! The backend exposes a GoTrue-style auth surface under `/auth/v1` and a
//! PostgREST-style data surface under `/rest/v1`. Every request carries the
//! project's `apikey`; session-scoped requests add a bearer token.
//!
//! Successful sign-in/sign-out calls publish on the change broadcast so the
//! bootstrap listener observes them the same way it observes provider-side
//! refreshes.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::Deserialize;
use time::{Duration, OffsetDateTime};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::BackendConfig;
use crate::state::{Session, UserIdentity, UserProfile};

use super::{Directory, IdentityProvider, ProviderError, ProviderSession, SessionChange, SignUpOutcome};

const CHANGE_CHANNEL_CAPACITY: usize = 16;

// =============================================================================
// WIRE DTOS
// =============================================================================

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: Uuid,
    email: String,
}

#[derive(Debug, Deserialize)]
struct TokenPayload {
    access_token: String,
    /// Lifetime in seconds from issuance.
    expires_in: i64,
    user: UserPayload,
}

/// Sign-up responses come in two shapes: a full token grant when email
/// verification is disabled, or a bare user record while verification is
/// pending.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpPayload {
    Session(TokenPayload),
    Pending(UserPayload),
}

fn provider_session_from_value(value: &serde_json::Value) -> Result<ProviderSession, ProviderError> {
    let payload: TokenPayload = serde_json::from_value(value.clone())
        .map_err(|e| ProviderError::Decode(e.to_string()))?;
    let issued_at = OffsetDateTime::now_utc();
    // An expires_in the calendar can't represent is a malformed payload,
    // same as a missing field.
    let expires_at = issued_at
        .checked_add(Duration::seconds(payload.expires_in))
        .ok_or_else(|| ProviderError::Decode(format!("expires_in out of range: {}", payload.expires_in)))?;
    Ok(ProviderSession {
        session: Session {
            access_token: payload.access_token,
            issued_at,
            expires_at,
            raw_claims: value.clone(),
        },
        identity: UserIdentity { id: payload.user.id, email: payload.user.email },
    })
}

// =============================================================================
// PROVIDER
// =============================================================================

/// Backend client implementing both [`IdentityProvider`] and [`Directory`].
pub struct HttpProvider {
    config: BackendConfig,
    client: reqwest::Client,
    changes: broadcast::Sender<SessionChange>,
    /// Last session handed out by this process; the bootstrap query
    /// revalidates it against the backend before trusting it.
    current: Mutex<Option<ProviderSession>>,
}

impl HttpProvider {
    /// Build a client from config.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Network` if the underlying HTTP client cannot
    /// be constructed.
    pub fn new(config: BackendConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Ok(Self { config, client, changes, current: Mutex::new(None) })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    fn cached_session(&self) -> Option<ProviderSession> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store_session(&self, session: Option<ProviderSession>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = session;
    }

    fn publish(&self, change: SessionChange) {
        // No receivers is fine: nothing has called bootstrap yet.
        let _ = self.changes.send(change);
    }

    async fn post_json(
        &self,
        path: &str,
        bearer: Option<&str>,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        let mut request = self
            .client
            .post(self.endpoint(path))
            .header("apikey", &self.config.anon_key)
            .json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        read_json(response).await
    }

    /// POST where success carries no body (the logout endpoint answers
    /// `204 No Content`); only the status is checked.
    async fn post_no_content(&self, path: &str, bearer: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|e| ProviderError::Network(e.to_string()))?;
            return Err(ProviderError::Http { status: status.as_u16(), body });
        }
        Ok(())
    }

    async fn get_json(&self, path: &str, bearer: &str) -> Result<serde_json::Value, ProviderError> {
        let response = self
            .client
            .get(self.endpoint(path))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        read_json(response).await
    }
}

async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, ProviderError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ProviderError::Network(e.to_string()))?;
    if !status.is_success() {
        return Err(ProviderError::Http { status: status.as_u16(), body });
    }
    serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))
}

#[async_trait]
impl IdentityProvider for HttpProvider {
    async fn create_account(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<SignUpOutcome, ProviderError> {
        let body = serde_json::json!({
            "email": email,
            "password": password,
            "data": { "full_name": full_name },
        });
        let value = self.post_json("/auth/v1/signup", None, &body).await?;
        let payload: SignUpPayload =
            serde_json::from_value(value.clone()).map_err(|e| ProviderError::Decode(e.to_string()))?;
        match payload {
            SignUpPayload::Session(_) => {
                let session = provider_session_from_value(&value)?;
                self.store_session(Some(session.clone()));
                self.publish(SessionChange::SignedIn(session.clone()));
                Ok(SignUpOutcome::Authenticated(session))
            }
            SignUpPayload::Pending(_) => Ok(SignUpOutcome::VerificationPending),
        }
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<ProviderSession, ProviderError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let value = self
            .post_json("/auth/v1/token?grant_type=password", None, &body)
            .await?;
        let session = provider_session_from_value(&value)?;
        self.store_session(Some(session.clone()));
        self.publish(SessionChange::SignedIn(session.clone()));
        Ok(session)
    }

    async fn current_session(&self) -> Result<Option<ProviderSession>, ProviderError> {
        let Some(cached) = self.cached_session() else {
            return Ok(None);
        };
        // Revalidate rather than trusting the cached expiry.
        match self.get_json("/auth/v1/user", &cached.session.access_token).await {
            Ok(_) => Ok(Some(cached)),
            Err(ProviderError::Http { status: 401 | 403, .. }) => {
                self.store_session(None);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn revoke_session(&self, access_token: &str) -> Result<(), ProviderError> {
        self.store_session(None);
        self.publish(SessionChange::SignedOut);
        self.post_no_content("/auth/v1/logout", access_token).await
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }
}

#[async_trait]
impl Directory for HttpProvider {
    async fn fetch_profile(&self, user_id: Uuid) -> Result<Option<UserProfile>, ProviderError> {
        let bearer = self
            .cached_session()
            .map_or_else(|| self.config.anon_key.clone(), |s| s.session.access_token);
        let path = format!("/rest/v1/profiles?user_id=eq.{user_id}&select=*");
        let value = self.get_json(&path, &bearer).await?;
        let mut rows: Vec<UserProfile> =
            serde_json::from_value(value).map_err(|e| ProviderError::Decode(e.to_string()))?;
        if rows.is_empty() { Ok(None) } else { Ok(Some(rows.swap_remove(0))) }
    }

    async fn resolve_role(&self, user_id: Uuid) -> Result<String, ProviderError> {
        let bearer = self
            .cached_session()
            .map(|s| s.session.access_token);
        let body = serde_json::json!({ "user_id": user_id });
        let value = self
            .post_json("/rest/v1/rpc/get_user_role", bearer.as_deref(), &body)
            .await?;
        // The RPC returns a bare JSON string, or null when the user has no
        // role row; null means the default role.
        let role: Option<String> =
            serde_json::from_value(value).map_err(|e| ProviderError::Decode(e.to_string()))?;
        Ok(role.unwrap_or_else(|| "user".to_owned()))
    }
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
