mod credential_resolution_tests {
    use storefront_backend::database::settings::PaymentSettings;
    use storefront_backend::services::credentials::{
        resolve_secret, CredentialError, GatewayCredentials, GatewayMode,
    };

    fn settings(active_mode: &str, test: Option<&str>, live: Option<&str>) -> PaymentSettings {
        PaymentSettings {
            id: 1,
            active_mode: active_mode.to_string(),
            test_public_key: None,
            test_secret_key: test.map(String::from),
            live_public_key: None,
            live_secret_key: live.map(String::from),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_settings_row_wins_over_fallback() {
        let row = settings("live", Some("sk_test_db"), Some("sk_live_db"));
        let creds = GatewayCredentials {
            settings: Some(&row),
            mode_override: None,
        };

        let secret = resolve_secret(&creds, Some("sk_env_fallback")).unwrap();
        assert_eq!(secret, "sk_live_db");
    }

    #[test]
    fn test_fallback_fills_in_missing_mode_key() {
        let row = settings("live", Some("sk_test_db"), None);
        let creds = GatewayCredentials {
            settings: Some(&row),
            mode_override: None,
        };

        // The test key exists but live mode is active; only the fallback
        // counts for the active mode.
        let secret = resolve_secret(&creds, Some("sk_env_fallback")).unwrap();
        assert_eq!(secret, "sk_env_fallback");
    }

    #[test]
    fn test_no_configuration_at_all_is_an_error() {
        let creds = GatewayCredentials {
            settings: None,
            mode_override: None,
        };

        let err = resolve_secret(&creds, None).unwrap_err();
        assert!(matches!(err, CredentialError::NoSecret { mode: "test" }));
        assert!(err.to_string().contains("test mode"));
    }

    #[test]
    fn test_whitespace_only_keys_are_ignored() {
        let row = settings("test", Some("  \t"), None);
        let creds = GatewayCredentials {
            settings: Some(&row),
            mode_override: None,
        };

        assert!(resolve_secret(&creds, Some("   ")).is_err());
    }

    #[test]
    fn test_deployment_override_forces_mode() {
        let row = settings("test", Some("sk_test_db"), Some("sk_live_db"));
        let creds = GatewayCredentials {
            settings: Some(&row),
            mode_override: Some(GatewayMode::Live),
        };

        assert_eq!(resolve_secret(&creds, None).unwrap(), "sk_live_db");
    }

    #[test]
    fn test_unknown_mode_string_falls_back_to_test() {
        let row = settings("production", Some("sk_test_db"), Some("sk_live_db"));
        let creds = GatewayCredentials {
            settings: Some(&row),
            mode_override: None,
        };

        assert_eq!(resolve_secret(&creds, None).unwrap(), "sk_test_db");
    }
}
