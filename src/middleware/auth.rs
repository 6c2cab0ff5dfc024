use crate::{auth::verify_jwt, error::AppError, state::AppState};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use uuid::Uuid;

/// Owner bucket of the caller.
///
/// Requests without an `Authorization` header act for the anonymous bucket
/// (`None`). A header that is present but does not carry a valid bearer token
/// is rejected with 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner(pub Option<Uuid>);

#[async_trait]
impl FromRequestParts<AppState> for Owner {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(auth_header) = parts.headers.get(AUTHORIZATION) else {
            return Ok(Owner(None));
        };

        let token = auth_header
            .to_str()
            .ok()
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthorized("Invalid credentials".to_string()))?;

        let claims = verify_jwt(token, &state.config.jwt_secret)?;

        let owner_id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;

        Ok(Owner(Some(owner_id)))
    }
}
