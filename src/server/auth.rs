use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

use super::error::ApiError;

pub const USER_HEADER: &str = "x-user-id";

/// Authenticated caller, as asserted by the gateway in front of the service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| Identity(value.to_string()))
            .ok_or(ApiError::Unauthorized)
    }
}
