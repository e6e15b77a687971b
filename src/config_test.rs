use super::*;

// =============================================================================
// BackendConfig::from_env — env manipulation requires unsafe in edition 2024.
// We wrap in unsafe blocks; these tests run serially (single test thread).
// =============================================================================

/// # Safety
/// Tests must run with `--test-threads=1` to avoid env races.
unsafe fn clear_portal_env() {
    unsafe {
        std::env::remove_var("PORTAL_BACKEND_URL");
        std::env::remove_var("PORTAL_ANON_KEY");
        std::env::remove_var("PORTAL_HTTP_TIMEOUT_SECS");
    }
}

#[test]
fn from_env_all_set_returns_some() {
    unsafe {
        clear_portal_env();
        std::env::set_var("PORTAL_BACKEND_URL", "https://project.example.co");
        std::env::set_var("PORTAL_ANON_KEY", "anon123");
    }
    let config = BackendConfig::from_env().unwrap();
    assert_eq!(config.base_url, "https://project.example.co");
    assert_eq!(config.anon_key, "anon123");
    assert_eq!(config.http_timeout, Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));
    unsafe { clear_portal_env() };
}

#[test]
fn from_env_missing_url_returns_none() {
    unsafe {
        clear_portal_env();
        std::env::set_var("PORTAL_ANON_KEY", "anon123");
    }
    assert!(BackendConfig::from_env().is_none());
    unsafe { clear_portal_env() };
}

#[test]
fn from_env_missing_key_returns_none() {
    unsafe {
        clear_portal_env();
        std::env::set_var("PORTAL_BACKEND_URL", "https://project.example.co");
    }
    assert!(BackendConfig::from_env().is_none());
    unsafe { clear_portal_env() };
}

#[test]
fn from_env_custom_timeout() {
    unsafe {
        clear_portal_env();
        std::env::set_var("PORTAL_BACKEND_URL", "https://project.example.co");
        std::env::set_var("PORTAL_ANON_KEY", "anon123");
        std::env::set_var("PORTAL_HTTP_TIMEOUT_SECS", "30");
    }
    let config = BackendConfig::from_env().unwrap();
    assert_eq!(config.http_timeout, Duration::from_secs(30));
    unsafe { clear_portal_env() };
}

#[test]
fn from_env_unparseable_timeout_falls_back_to_default() {
    unsafe {
        clear_portal_env();
        std::env::set_var("PORTAL_BACKEND_URL", "https://project.example.co");
        std::env::set_var("PORTAL_ANON_KEY", "anon123");
        std::env::set_var("PORTAL_HTTP_TIMEOUT_SECS", "soon");
    }
    let config = BackendConfig::from_env().unwrap();
    assert_eq!(config.http_timeout, Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));
    unsafe { clear_portal_env() };
}

// =============================================================================
// BackendConfig::new
// =============================================================================

#[test]
fn new_strips_trailing_slashes() {
    let config = BackendConfig::new("https://project.example.co///", "k", Duration::from_secs(1));
    assert_eq!(config.base_url, "https://project.example.co");
}

#[test]
fn new_keeps_clean_url_untouched() {
    let config = BackendConfig::new("https://project.example.co", "k", Duration::from_secs(1));
    assert_eq!(config.base_url, "https://project.example.co");
}
