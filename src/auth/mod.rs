pub mod jwt;
pub mod password;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::headers::{authorization::Bearer, Authorization};
use axum_extra::TypedHeader;

use crate::{error::AppError, state::AppState};

/// The resolved bearer principal. Extraction fails the request with a 401
/// when the header is missing, the token does not verify, or the user it
/// names no longer exists.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: uuid::Uuid,
    pub name: String,
    pub email: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::unauthorized("Token not provided"))?;

        let claims = state
            .jwt
            .verify_token(bearer.token())
            .map_err(|_| AppError::unauthorized("Token invalid"))?;

        let user = state
            .store
            .find_user(claims.sub)
            .await
            .map_err(AppError::internal)?
            .ok_or_else(|| {
                AppError::unauthorized("The user provided in the token was not found")
            })?;

        Ok(AuthenticatedUser {
            user_id: user.id,
            name: user.name,
            email: user.email,
        })
    }
}
