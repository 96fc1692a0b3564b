//! Unified error handling for the storefront backend
//!
//! Every failure surfaced to a caller is funneled through `AppError`, which
//! carries a machine-readable error code, a stable HTTP status mapping and a
//! user-facing message. Internal error types (sqlx, reqwest) never leak.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::database::error::DatabaseError;
use crate::gateway::error::GatewayError;
use crate::services::credentials::CredentialError;

/// Error codes for programmatic client handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "ORDER_NOT_FOUND")]
    OrderNotFound,
    #[serde(rename = "CONTENT_NOT_FOUND")]
    ContentNotFound,
    #[serde(rename = "CONTENT_UNAVAILABLE")]
    ContentUnavailable,
    #[serde(rename = "INSUFFICIENT_STOCK")]
    InsufficientStock,
    #[serde(rename = "ORDER_NOT_PAYABLE")]
    OrderNotPayable,
    #[serde(rename = "PAYMENT_FAILED")]
    PaymentFailed,

    // Gateway errors
    #[serde(rename = "GATEWAY_REJECTED")]
    GatewayRejected,
    #[serde(rename = "GATEWAY_UNAUTHORIZED")]
    GatewayUnauthorized,
    #[serde(rename = "GATEWAY_UNAVAILABLE")]
    GatewayUnavailable,
    #[serde(rename = "GATEWAY_MISCONFIGURED")]
    GatewayMisconfigured,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,

    // Generic
    #[serde(rename = "UNAUTHORIZED")]
    Unauthorized,
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
}

/// Domain-specific business logic errors
#[derive(Debug, Clone)]
pub enum DomainError {
    /// Order absent, or not owned by the caller. Ownership failures
    /// deliberately read as not-found so order existence never leaks
    /// across users.
    OrderNotFound,
    /// Catalog item doesn't exist
    ContentNotFound { content_id: String },
    /// Catalog item exists but is not active for sale
    ContentUnavailable { title: String },
    /// Physical item with no stock tracking or not enough units
    InsufficientStock { title: String },
    /// Order is not in a state that accepts payment
    OrderNotPayable,
    /// Gateway reported a non-success outcome at verification
    PaymentFailed,
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// Quantity must be at least 1
    InvalidQuantity { quantity: i64 },
    /// Required field missing or malformed
    InvalidField { field: String, reason: String },
}

/// External service errors (payment gateway)
#[derive(Debug, Clone)]
pub enum ExternalError {
    /// Gateway answered with an application-level rejection
    GatewayRejected { message: String },
    /// Gateway rejected our credentials (their 401, never ours)
    GatewayUnauthorized,
    /// Transport failure talking to the gateway (timeout, DNS, 5xx)
    GatewayUnavailable { message: String },
}

/// Infrastructure-level errors
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    /// Database connection or query failure
    Database { message: String, is_retryable: bool },
    /// No usable gateway secret for the active mode
    Misconfigured { message: String },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Validation(ValidationError),
    External(ExternalError),
    Infrastructure(InfrastructureError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
        }
    }

    pub fn domain(err: DomainError) -> Self {
        Self::new(AppErrorKind::Domain(err))
    }

    pub fn validation(err: ValidationError) -> Self {
        Self::new(AppErrorKind::Validation(err))
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::OrderNotFound => 404,
                DomainError::ContentNotFound { .. } => 404,
                DomainError::ContentUnavailable { .. } => 409,
                DomainError::InsufficientStock { .. } => 409,
                DomainError::OrderNotPayable => 409,
                DomainError::PaymentFailed => 400,
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::InvalidQuantity { .. } => 422,
                ValidationError::InvalidField { .. } => 400,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::GatewayRejected { .. } => 400,
                // An upstream credential problem must never surface as the
                // caller's own session being invalid.
                ExternalError::GatewayUnauthorized => 502,
                ExternalError::GatewayUnavailable { .. } => 503,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => 500,
                InfrastructureError::Misconfigured { .. } => 400,
            },
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::OrderNotFound => ErrorCode::OrderNotFound,
                DomainError::ContentNotFound { .. } => ErrorCode::ContentNotFound,
                DomainError::ContentUnavailable { .. } => ErrorCode::ContentUnavailable,
                DomainError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
                DomainError::OrderNotPayable => ErrorCode::OrderNotPayable,
                DomainError::PaymentFailed => ErrorCode::PaymentFailed,
            },
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
            AppErrorKind::External(err) => match err {
                ExternalError::GatewayRejected { .. } => ErrorCode::GatewayRejected,
                ExternalError::GatewayUnauthorized => ErrorCode::GatewayUnauthorized,
                ExternalError::GatewayUnavailable { .. } => ErrorCode::GatewayUnavailable,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Misconfigured { .. } => ErrorCode::GatewayMisconfigured,
            },
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::OrderNotFound => "Order not found".to_string(),
                DomainError::ContentNotFound { content_id } => {
                    format!("Content {} not found", content_id)
                }
                DomainError::ContentUnavailable { title } => {
                    format!("Content {} is not available", title)
                }
                DomainError::InsufficientStock { title } => {
                    format!("Insufficient stock for {}", title)
                }
                DomainError::OrderNotPayable => "Order cannot be paid".to_string(),
                DomainError::PaymentFailed => "Payment verification failed".to_string(),
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::InvalidQuantity { .. } => {
                    "Quantity must be at least 1".to_string()
                }
                ValidationError::InvalidField { field, reason } => {
                    format!("Invalid value for '{}': {}", field, reason)
                }
            },
            AppErrorKind::External(err) => match err {
                ExternalError::GatewayRejected { message } => message.clone(),
                ExternalError::GatewayUnauthorized => {
                    "Payment service error: the gateway rejected our credentials. \
                     Check the configured secret key for the selected mode."
                        .to_string()
                }
                ExternalError::GatewayUnavailable { .. } => {
                    "Payment service is temporarily unavailable".to_string()
                }
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => {
                    "Service temporarily unavailable. Please try again later".to_string()
                }
                InfrastructureError::Misconfigured { message } => message.clone(),
            },
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(_) => false,
            AppErrorKind::Validation(_) => false,
            AppErrorKind::External(err) => {
                matches!(err, ExternalError::GatewayUnavailable { .. })
            }
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Misconfigured { .. } => false,
            },
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
            message: err.to_string(),
            is_retryable: err.is_retryable(),
        }))
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        let kind = match err {
            GatewayError::Rejected { message } => {
                AppErrorKind::External(ExternalError::GatewayRejected { message })
            }
            GatewayError::Unauthorized => {
                AppErrorKind::External(ExternalError::GatewayUnauthorized)
            }
            GatewayError::Unavailable { message } => {
                AppErrorKind::External(ExternalError::GatewayUnavailable { message })
            }
            GatewayError::InvalidAmount { amount } => {
                AppErrorKind::Validation(ValidationError::InvalidField {
                    field: "amount".to_string(),
                    reason: format!("{} cannot be charged", amount),
                })
            }
        };
        AppError::new(kind)
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        AppError::new(AppErrorKind::Infrastructure(
            InfrastructureError::Misconfigured {
                message: err.to_string(),
            },
        ))
    }
}

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ownership_failures_read_as_not_found() {
        let error = AppError::domain(DomainError::OrderNotFound);

        assert_eq!(error.status_code(), 404);
        assert_eq!(error.error_code(), ErrorCode::OrderNotFound);
        assert!(!error.is_retryable());
    }

    #[test]
    fn gateway_unauthorized_maps_to_bad_gateway_not_401() {
        let error = AppError::new(AppErrorKind::External(ExternalError::GatewayUnauthorized));

        assert_eq!(error.status_code(), 502);
        assert_eq!(error.error_code(), ErrorCode::GatewayUnauthorized);
    }

    #[test]
    fn gateway_transport_failures_are_retryable_503() {
        let error = AppError::new(AppErrorKind::External(ExternalError::GatewayUnavailable {
            message: "connect timeout".to_string(),
        }));

        assert_eq!(error.status_code(), 503);
        assert!(error.is_retryable());
    }

    #[test]
    fn bad_quantity_is_unprocessable() {
        let error = AppError::validation(ValidationError::InvalidQuantity { quantity: 0 });

        assert_eq!(error.status_code(), 422);
        assert_eq!(error.error_code(), ErrorCode::ValidationError);
    }

    #[test]
    fn conflict_class_errors_map_to_409() {
        for err in [
            DomainError::OrderNotPayable,
            DomainError::ContentUnavailable {
                title: "Banking Law Vol. 2".to_string(),
            },
            DomainError::InsufficientStock {
                title: "Branded Notebook".to_string(),
            },
        ] {
            assert_eq!(AppError::domain(err).status_code(), 409);
        }
    }

    #[test]
    fn misconfigured_gateway_is_a_400_class_error() {
        let error = AppError::new(AppErrorKind::Infrastructure(
            InfrastructureError::Misconfigured {
                message: "no usable gateway secret".to_string(),
            },
        ));

        assert_eq!(error.status_code(), 400);
        assert_eq!(error.error_code(), ErrorCode::GatewayMisconfigured);
    }
}
