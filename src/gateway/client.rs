//! Paystack client.
//!
//! Stateless wrapper over the gateway's HTTP API: the secret key is an
//! explicit per-call parameter, never stored on the client, so credential
//! rotation between requests can't race against shared state.

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

use crate::gateway::error::{GatewayError, GatewayResult};

pub struct PaystackClient {
    http: Client,
    base_url: String,
}

/// Result of a transaction initialization: where to send the customer
#[derive(Debug, Clone, Deserialize)]
pub struct InitializedTransaction {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

/// Result of a transaction verification
#[derive(Debug, Clone, Deserialize)]
pub struct VerifiedTransaction {
    pub status: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub paid_at: Option<String>,
    #[serde(default)]
    pub gateway_response: Option<String>,
}

impl VerifiedTransaction {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

#[derive(Debug, Deserialize)]
struct PaystackEnvelope<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

/// Convert a major-unit amount to the gateway's minor-unit integer (kobo,
/// NGN x 100). Fractional minor units are truncated toward zero: 10.999
/// becomes 1099.
pub fn to_minor_units(amount: &BigDecimal) -> GatewayResult<i64> {
    if amount < &BigDecimal::from(0) {
        return Err(GatewayError::InvalidAmount {
            amount: amount.to_string(),
        });
    }

    (amount * BigDecimal::from(100))
        .with_scale_round(0, RoundingMode::Down)
        .to_i64()
        .ok_or_else(|| GatewayError::InvalidAmount {
            amount: amount.to_string(),
        })
}

impl PaystackClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> GatewayResult<Self> {
        let http = Client::builder().timeout(timeout).build().map_err(|e| {
            GatewayError::Unavailable {
                message: format!("failed to initialize HTTP client: {}", e),
            }
        })?;

        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Open a checkout session with the gateway. The reference is the
    /// caller-chosen idempotency key correlating this order with one gateway
    /// transaction attempt.
    pub async fn initialize_transaction(
        &self,
        secret_key: &str,
        email: &str,
        amount: &BigDecimal,
        reference: &str,
        callback_url: &str,
    ) -> GatewayResult<InitializedTransaction> {
        let amount_minor = to_minor_units(amount)?;

        let payload = serde_json::json!({
            "email": email,
            "amount": amount_minor,
            "reference": reference,
            "callback_url": callback_url,
        });

        let response = self
            .http
            .post(self.endpoint("/transaction/initialize"))
            .bearer_auth(secret_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable {
                message: format!("initialize request failed: {}", e),
            })?;

        let envelope: PaystackEnvelope<InitializedTransaction> =
            Self::read_envelope(response).await?;

        if !envelope.status {
            tracing::warn!(gateway_message = %envelope.message, "gateway rejected initialization");
            return Err(GatewayError::Rejected {
                message: "Failed to initialize payment".to_string(),
            });
        }

        let data = envelope.data.ok_or_else(|| GatewayError::Unavailable {
            message: "gateway response missing data".to_string(),
        })?;
        info!(reference = %data.reference, "payment transaction initialized");

        Ok(data)
    }

    /// Look up the settlement outcome for a reference. GET, keyed by the
    /// reference chosen at initialization.
    pub async fn verify_transaction(
        &self,
        secret_key: &str,
        reference: &str,
    ) -> GatewayResult<VerifiedTransaction> {
        let response = self
            .http
            .get(self.endpoint(&format!("/transaction/verify/{}", reference)))
            .bearer_auth(secret_key)
            .send()
            .await
            .map_err(|e| GatewayError::Unavailable {
                message: format!("verify request failed: {}", e),
            })?;

        let envelope: PaystackEnvelope<VerifiedTransaction> =
            Self::read_envelope(response).await?;

        if !envelope.status {
            tracing::warn!(gateway_message = %envelope.message, "gateway rejected verification");
            return Err(GatewayError::Rejected {
                message: "Transaction verification failed".to_string(),
            });
        }

        envelope.data.ok_or_else(|| GatewayError::Unavailable {
            message: "gateway response missing data".to_string(),
        })
    }

    async fn read_envelope<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> GatewayResult<PaystackEnvelope<T>> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(GatewayError::Unauthorized);
        }

        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(GatewayError::Unavailable {
                message: format!("gateway returned HTTP {}", status),
            });
        }

        serde_json::from_str(&body).map_err(|e| GatewayError::Unavailable {
            message: format!("invalid gateway JSON response: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn amounts_convert_to_minor_units() {
        let amount = BigDecimal::from_str("5000").unwrap();
        assert_eq!(to_minor_units(&amount).unwrap(), 500_000);

        let amount = BigDecimal::from_str("10.50").unwrap();
        assert_eq!(to_minor_units(&amount).unwrap(), 1050);

        let amount = BigDecimal::from_str("0").unwrap();
        assert_eq!(to_minor_units(&amount).unwrap(), 0);
    }

    #[test]
    fn fractional_minor_units_are_truncated() {
        let amount = BigDecimal::from_str("10.999").unwrap();
        assert_eq!(to_minor_units(&amount).unwrap(), 1099);

        let amount = BigDecimal::from_str("0.009").unwrap();
        assert_eq!(to_minor_units(&amount).unwrap(), 0);
    }

    #[test]
    fn negative_amounts_are_rejected() {
        let amount = BigDecimal::from_str("-1").unwrap();
        assert!(matches!(
            to_minor_units(&amount),
            Err(GatewayError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn verify_success_flag_matches_gateway_status() {
        let verified = VerifiedTransaction {
            status: "success".to_string(),
            channel: Some("card".to_string()),
            paid_at: None,
            gateway_response: None,
        };
        assert!(verified.is_success());

        let verified = VerifiedTransaction {
            status: "abandoned".to_string(),
            channel: None,
            paid_at: None,
            gateway_response: None,
        };
        assert!(!verified.is_success());
    }

    #[test]
    fn envelope_parses_initialize_payload() {
        let body = r#"{
            "status": true,
            "message": "Authorization URL created",
            "data": {
                "authorization_url": "https://checkout.paystack.com/abc123",
                "access_code": "abc123",
                "reference": "ORD-1-deadbeef"
            }
        }"#;

        let envelope: PaystackEnvelope<InitializedTransaction> =
            serde_json::from_str(body).unwrap();
        assert!(envelope.status);
        let data = envelope.data.unwrap();
        assert_eq!(data.reference, "ORD-1-deadbeef");
        assert_eq!(data.access_code, "abc123");
    }

    #[test]
    fn envelope_parses_verify_payload_with_missing_optionals() {
        let body = r#"{
            "status": true,
            "message": "Verification successful",
            "data": { "status": "success" }
        }"#;

        let envelope: PaystackEnvelope<VerifiedTransaction> = serde_json::from_str(body).unwrap();
        let data = envelope.data.unwrap();
        assert!(data.is_success());
        assert!(data.channel.is_none());
    }
}
