use thiserror::Error;

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Failures talking to the payment gateway, classified by what the caller
/// should be told. The raw reqwest error never crosses this boundary.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Gateway answered 2xx but its envelope reports a non-ok status
    #[error("gateway rejected the request: {message}")]
    Rejected { message: String },

    /// Gateway returned HTTP 401. This is OUR credential being refused
    /// upstream; it must never surface as the calling user's own 401.
    #[error("gateway rejected our credentials")]
    Unauthorized,

    /// Transport failure or any other unexpected HTTP response
    #[error("gateway unavailable: {message}")]
    Unavailable { message: String },

    /// Amount cannot be represented in the gateway's minor units
    #[error("invalid amount for gateway: {amount}")]
    InvalidAmount { amount: String },
}

impl GatewayError {
    pub fn http_status_code(&self) -> u16 {
        match self {
            GatewayError::Rejected { .. } => 400,
            GatewayError::Unauthorized => 502,
            GatewayError::Unavailable { .. } => 503,
            GatewayError::InvalidAmount { .. } => 400,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Unavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_http_status_mapping_is_correct() {
        assert_eq!(
            GatewayError::Rejected {
                message: "Failed to initialize payment".to_string()
            }
            .http_status_code(),
            400
        );
        assert_eq!(GatewayError::Unauthorized.http_status_code(), 502);
        assert_eq!(
            GatewayError::Unavailable {
                message: "timeout".to_string()
            }
            .http_status_code(),
            503
        );
    }

    #[test]
    fn only_transport_failures_are_retryable() {
        assert!(GatewayError::Unavailable {
            message: "timeout".to_string()
        }
        .is_retryable());
        assert!(!GatewayError::Unauthorized.is_retryable());
        assert!(!GatewayError::Rejected {
            message: "declined".to_string()
        }
        .is_retryable());
    }
}
