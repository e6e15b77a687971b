use super::*;
use std::time::Duration as StdDuration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

fn test_config() -> BackendConfig {
    BackendConfig::new("https://project.example.co", "anon-key", StdDuration::from_secs(5))
}

fn token_grant_json() -> serde_json::Value {
    serde_json::json!({
        "access_token": "jwt-abc",
        "token_type": "bearer",
        "expires_in": 3600,
        "refresh_token": "refresh-xyz",
        "user": {
            "id": "3f2504e0-4f89-11d3-9a0c-0305e82c3301",
            "email": "asha@example.com",
            "role": "authenticated"
        }
    })
}

// =============================================================================
// provider_session_from_value
// =============================================================================

#[test]
fn token_grant_parses_to_provider_session() {
    let value = token_grant_json();
    let ps = provider_session_from_value(&value).unwrap();
    assert_eq!(ps.session.access_token, "jwt-abc");
    assert_eq!(ps.identity.email, "asha@example.com");
    assert_eq!(ps.identity.id.to_string(), "3f2504e0-4f89-11d3-9a0c-0305e82c3301");
}

#[test]
fn token_grant_expiry_offset_matches_expires_in() {
    let ps = provider_session_from_value(&token_grant_json()).unwrap();
    assert_eq!(ps.session.expires_at - ps.session.issued_at, Duration::seconds(3600));
}

#[test]
fn token_grant_keeps_raw_claims() {
    let value = token_grant_json();
    let ps = provider_session_from_value(&value).unwrap();
    assert_eq!(ps.session.raw_claims, value);
}

#[test]
fn missing_access_token_is_decode_error() {
    let mut value = token_grant_json();
    value.as_object_mut().unwrap().remove("access_token");
    assert!(matches!(provider_session_from_value(&value), Err(ProviderError::Decode(_))));
}

#[test]
fn missing_user_email_is_decode_error() {
    let mut value = token_grant_json();
    value["user"].as_object_mut().unwrap().remove("email");
    assert!(matches!(provider_session_from_value(&value), Err(ProviderError::Decode(_))));
}

#[test]
fn malformed_user_id_is_decode_error() {
    let mut value = token_grant_json();
    value["user"]["id"] = serde_json::json!("not-a-uuid");
    assert!(matches!(provider_session_from_value(&value), Err(ProviderError::Decode(_))));
}

#[test]
fn out_of_range_expires_in_is_decode_error_not_panic() {
    let mut value = token_grant_json();
    value["expires_in"] = serde_json::json!(i64::MAX);
    assert!(matches!(provider_session_from_value(&value), Err(ProviderError::Decode(_))));

    value["expires_in"] = serde_json::json!(i64::MIN);
    assert!(matches!(provider_session_from_value(&value), Err(ProviderError::Decode(_))));
}

// =============================================================================
// SignUpPayload shapes
// =============================================================================

#[test]
fn sign_up_payload_with_token_is_session_shaped() {
    let payload: SignUpPayload = serde_json::from_value(token_grant_json()).unwrap();
    assert!(matches!(payload, SignUpPayload::Session(_)));
}

#[test]
fn sign_up_payload_bare_user_is_pending() {
    let value = serde_json::json!({
        "id": "3f2504e0-4f89-11d3-9a0c-0305e82c3301",
        "email": "asha@example.com",
        "confirmation_sent_at": "2026-08-30T12:00:00Z"
    });
    let payload: SignUpPayload = serde_json::from_value(value).unwrap();
    assert!(matches!(payload, SignUpPayload::Pending(_)));
}

#[test]
fn sign_up_payload_garbage_fails() {
    let value = serde_json::json!({ "message": "oops" });
    assert!(serde_json::from_value::<SignUpPayload>(value).is_err());
}

// =============================================================================
// endpoint building
// =============================================================================

#[test]
fn endpoint_joins_base_and_path() {
    let provider = HttpProvider::new(test_config()).unwrap();
    assert_eq!(
        provider.endpoint("/auth/v1/token?grant_type=password"),
        "https://project.example.co/auth/v1/token?grant_type=password"
    );
}

#[test]
fn endpoint_with_trailing_slash_config_has_no_double_slash() {
    let config = BackendConfig::new("https://project.example.co/", "k", StdDuration::from_secs(5));
    let provider = HttpProvider::new(config).unwrap();
    assert_eq!(provider.endpoint("/rest/v1/profiles"), "https://project.example.co/rest/v1/profiles");
}

// =============================================================================
// session cache & change stream
// =============================================================================

#[test]
fn new_provider_has_no_cached_session() {
    let provider = HttpProvider::new(test_config()).unwrap();
    assert!(provider.cached_session().is_none());
}

#[test]
fn stored_session_round_trips_through_cache() {
    let provider = HttpProvider::new(test_config()).unwrap();
    let ps = provider_session_from_value(&token_grant_json()).unwrap();
    provider.store_session(Some(ps.clone()));
    assert_eq!(provider.cached_session(), Some(ps));
}

#[test]
fn publish_reaches_subscribers() {
    let provider = HttpProvider::new(test_config()).unwrap();
    let mut rx = provider.subscribe_changes();
    provider.publish(SessionChange::SignedOut);
    assert!(matches!(rx.try_recv(), Ok(SessionChange::SignedOut)));
}

#[test]
fn publish_without_subscribers_does_not_panic() {
    let provider = HttpProvider::new(test_config()).unwrap();
    provider.publish(SessionChange::SignedOut);
}

// =============================================================================
// revoke over the wire
// =============================================================================

/// Serve one connection with a canned response, then hang up.
async fn one_shot_server(response: &'static str) -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 2048];
        let _ = stream.read(&mut buf).await;
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();
    });
    addr
}

#[tokio::test]
async fn revoke_session_treats_no_content_as_success() {
    let addr = one_shot_server("HTTP/1.1 204 No Content\r\nconnection: close\r\n\r\n").await;
    let config = BackendConfig::new(format!("http://{addr}"), "anon-key", StdDuration::from_secs(5));
    let provider = HttpProvider::new(config).unwrap();
    assert!(provider.revoke_session("tok").await.is_ok());
}

#[tokio::test]
async fn revoke_session_surfaces_error_status() {
    let addr = one_shot_server(
        "HTTP/1.1 401 Unauthorized\r\nconnection: close\r\ncontent-length: 9\r\n\r\nbad token",
    )
    .await;
    let config = BackendConfig::new(format!("http://{addr}"), "anon-key", StdDuration::from_secs(5));
    let provider = HttpProvider::new(config).unwrap();
    let err = provider.revoke_session("tok").await.unwrap_err();
    assert!(matches!(err, ProviderError::Http { status: 401, .. }));
}

// =============================================================================
// directory payload shapes
// =============================================================================

#[test]
fn profile_rows_deserialize_from_rest_response() {
    let value = serde_json::json!([{
        "id": "7b6d8f7e-52e5-4f7a-9d5e-1d1c2b3a4f5e",
        "user_id": "3f2504e0-4f89-11d3-9a0c-0305e82c3301",
        "full_name": "Asha Patel",
        "email": "asha@example.com",
        "avatar_url": null,
        "phone": null,
        "location": "Leicester",
        "profession": "Engineer",
        "bio": null,
        "family_name": "Patel"
    }]);
    let rows: Vec<UserProfile> = serde_json::from_value(value).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].profession.as_deref(), Some("Engineer"));
}

#[test]
fn role_rpc_string_parses() {
    let role: Option<String> = serde_json::from_value(serde_json::json!("admin")).unwrap();
    assert_eq!(role.as_deref(), Some("admin"));
}

#[test]
fn role_rpc_null_means_default() {
    let role: Option<String> = serde_json::from_value(serde_json::Value::Null).unwrap();
    assert!(role.is_none());
}
