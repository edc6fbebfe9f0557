use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

/// The authenticated caller.
///
/// JWT validation and session checks happen in the gateway upstream; it
/// forwards the resolved user id in the `x-user-id` header. Ownership and
/// participant checks are still enforced in the service layer regardless.
#[derive(Debug, Clone, Copy)]
pub struct User {
    pub id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for User
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .ok_or(AppError::Unauthorized)?;

        Ok(User { id: user_id })
    }
}
