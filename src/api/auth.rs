//! Caller identity extraction.
//!
//! Authentication itself lives in the gateway in front of this service; by
//! the time a request arrives here the gateway has already validated the
//! session and stamped the caller's identity onto trusted headers. This
//! extractor only reads those headers back.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json,
};
use uuid::Uuid;

use crate::middleware::error::ErrorResponse;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// The authenticated caller, as asserted by the upstream gateway
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
}

fn unauthorized(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::unauthorized(message)),
    )
}

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| unauthorized("Missing authentication headers"))?;

        let user_id = Uuid::parse_str(user_id)
            .map_err(|_| unauthorized("Invalid user identity header"))?;

        let email = parts
            .headers
            .get(USER_EMAIL_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| unauthorized("Missing authentication headers"))?
            .to_string();

        Ok(Principal { user_id, email })
    }
}
