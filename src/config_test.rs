use super::*;

// =============================================================================
// from_vars
// =============================================================================

#[test]
fn from_vars_complete() {
    let config = BackendConfig::from_vars(
        Some("https://backend.example.com".to_owned()),
        Some("anon-key".to_owned()),
    )
    .unwrap();
    assert_eq!(config.url, "https://backend.example.com");
    assert_eq!(config.anon_key, "anon-key");
}

#[test]
fn from_vars_missing_url_is_fatal() {
    let err = BackendConfig::from_vars(None, Some("anon-key".to_owned())).unwrap_err();
    assert!(matches!(err, ConfigError::MissingUrl));
}

#[test]
fn from_vars_missing_key_is_fatal() {
    let err = BackendConfig::from_vars(Some("https://backend.example.com".to_owned()), None).unwrap_err();
    assert!(matches!(err, ConfigError::MissingKey));
}

#[test]
fn from_vars_blank_key_is_fatal() {
    let err = BackendConfig::from_vars(
        Some("https://backend.example.com".to_owned()),
        Some("   ".to_owned()),
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::MissingKey));
}

#[test]
fn from_vars_trims_trailing_slash() {
    let config = BackendConfig::from_vars(
        Some("https://backend.example.com/".to_owned()),
        Some("anon-key".to_owned()),
    )
    .unwrap();
    assert_eq!(config.url, "https://backend.example.com");
}

// =============================================================================
// env_bool — uses unique env var names to avoid races with parallel tests.
// =============================================================================

#[test]
fn env_bool_true_variants() {
    for (i, val) in ["1", "true", "yes", "on"].iter().enumerate() {
        let key = format!("__TEST_GH_EB_TRUE_{i}__");
        unsafe { std::env::set_var(&key, val) };
        assert_eq!(env_bool(&key), Some(true), "expected true for {val:?}");
        unsafe { std::env::remove_var(&key) };
    }
}

#[test]
fn env_bool_false_variants() {
    for (i, val) in ["0", "false", "no", "off"].iter().enumerate() {
        let key = format!("__TEST_GH_EB_FALSE_{i}__");
        unsafe { std::env::set_var(&key, val) };
        assert_eq!(env_bool(&key), Some(false), "expected false for {val:?}");
        unsafe { std::env::remove_var(&key) };
    }
}

#[test]
fn env_bool_invalid_returns_none() {
    let key = "__TEST_GH_EB_INVALID__";
    unsafe { std::env::set_var(key, "maybe") };
    assert_eq!(env_bool(key), None);
    unsafe { std::env::remove_var(key) };
}

#[test]
fn env_bool_unset_returns_none() {
    assert_eq!(env_bool("__TEST_GH_EB_SURELY_UNSET__"), None);
}

#[test]
fn cookie_secure_override_wins() {
    assert!(cookie_secure_from(Some(true), Some("http://localhost:3000")));
    assert!(!cookie_secure_from(Some(false), Some("https://app.example.com")));
}

#[test]
fn cookie_secure_inferred_from_base_url() {
    assert!(cookie_secure_from(None, Some("https://app.example.com")));
    assert!(!cookie_secure_from(None, Some("http://localhost:3000")));
    assert!(!cookie_secure_from(None, None));
}
