//! Gateway credential resolution.
//!
//! Which secret key talks to the gateway depends on the active mode (test or
//! live) and on whether an administrator has stored keys in the settings
//! table. Resolution is a pure function of that state and must run fresh on
//! every payment call so rotated keys apply without a restart; nothing here
//! is cached.

use thiserror::Error;

use crate::database::settings::PaymentSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    Test,
    Live,
}

impl GatewayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Live => "live",
        }
    }

    /// Unknown or absent mode strings fall back to test, the safe default.
    pub fn parse(s: &str) -> Self {
        match s {
            "live" => Self::Live,
            _ => Self::Test,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum CredentialError {
    #[error("No payment gateway secret configured for {mode} mode")]
    NoSecret { mode: &'static str },
}

/// The capability the order engine needs from credential storage: the
/// active mode, and the stored secret for a given mode.
pub trait CredentialSource {
    fn active_mode(&self) -> GatewayMode;
    fn secret_for(&self, mode: GatewayMode) -> Option<String>;
}

/// Credential view combining the nullable admin settings row with an
/// instance-level mode override. Built per request from a fresh settings
/// read.
pub struct GatewayCredentials<'a> {
    pub settings: Option<&'a PaymentSettings>,
    pub mode_override: Option<GatewayMode>,
}

impl CredentialSource for GatewayCredentials<'_> {
    fn active_mode(&self) -> GatewayMode {
        if let Some(mode) = self.mode_override {
            return mode;
        }
        self.settings
            .map(|row| GatewayMode::parse(&row.active_mode))
            .unwrap_or(GatewayMode::Test)
    }

    fn secret_for(&self, mode: GatewayMode) -> Option<String> {
        let row = self.settings?;
        let key = match mode {
            GatewayMode::Test => row.test_secret_key.as_deref(),
            GatewayMode::Live => row.live_secret_key.as_deref(),
        };
        key.map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
    }
}

/// Resolve the secret for the active mode, falling back to the process-wide
/// default from deployment configuration when the settings row has no usable
/// key for that mode.
pub fn resolve_secret(
    source: &impl CredentialSource,
    fallback: Option<&str>,
) -> Result<String, CredentialError> {
    let mode = source.active_mode();

    if let Some(secret) = source.secret_for(mode) {
        return Ok(secret);
    }

    fallback
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .ok_or(CredentialError::NoSecret {
            mode: mode.as_str(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_row(
        active_mode: &str,
        test_secret: Option<&str>,
        live_secret: Option<&str>,
    ) -> PaymentSettings {
        PaymentSettings {
            id: 1,
            active_mode: active_mode.to_string(),
            test_public_key: None,
            test_secret_key: test_secret.map(String::from),
            live_public_key: None,
            live_secret_key: live_secret.map(String::from),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn live_mode_uses_live_secret() {
        let row = settings_row("live", Some("sk_test_a"), Some("sk_live_b"));
        let creds = GatewayCredentials {
            settings: Some(&row),
            mode_override: None,
        };
        assert_eq!(resolve_secret(&creds, None).unwrap(), "sk_live_b");
    }

    #[test]
    fn test_mode_uses_test_secret() {
        let row = settings_row("test", Some("sk_test_a"), Some("sk_live_b"));
        let creds = GatewayCredentials {
            settings: Some(&row),
            mode_override: None,
        };
        assert_eq!(resolve_secret(&creds, None).unwrap(), "sk_test_a");
    }

    #[test]
    fn missing_mode_secret_falls_back_to_deployment_default() {
        let row = settings_row("live", Some("sk_test_a"), None);
        let creds = GatewayCredentials {
            settings: Some(&row),
            mode_override: None,
        };
        assert_eq!(
            resolve_secret(&creds, Some("sk_env_default")).unwrap(),
            "sk_env_default"
        );
    }

    #[test]
    fn absent_settings_row_uses_fallback() {
        let creds = GatewayCredentials {
            settings: None,
            mode_override: None,
        };
        assert_eq!(resolve_secret(&creds, Some("sk_env")).unwrap(), "sk_env");
    }

    #[test]
    fn no_secret_anywhere_is_misconfigured() {
        let creds = GatewayCredentials {
            settings: None,
            mode_override: None,
        };
        assert!(matches!(
            resolve_secret(&creds, None),
            Err(CredentialError::NoSecret { mode: "test" })
        ));
    }

    #[test]
    fn blank_keys_count_as_unconfigured() {
        let row = settings_row("test", Some("   "), None);
        let creds = GatewayCredentials {
            settings: Some(&row),
            mode_override: None,
        };
        assert!(resolve_secret(&creds, None).is_err());
    }

    #[test]
    fn mode_override_wins_over_settings_row() {
        let row = settings_row("test", Some("sk_test_a"), Some("sk_live_b"));
        let creds = GatewayCredentials {
            settings: Some(&row),
            mode_override: Some(GatewayMode::Live),
        };
        assert_eq!(resolve_secret(&creds, None).unwrap(), "sk_live_b");
    }

    #[test]
    fn unknown_mode_string_defaults_to_test() {
        assert_eq!(GatewayMode::parse("sandbox"), GatewayMode::Test);
        assert_eq!(GatewayMode::parse("live"), GatewayMode::Live);
    }
}
