use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::auth::password;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Deserialize, Validate)]
pub struct SessionRequest {
    #[validate(
        required(message = "email is a required field"),
        email(message = "email must be a valid email")
    )]
    pub email: Option<String>,
    #[validate(required(message = "password is a required field"))]
    pub password: Option<String>,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub user: SessionUser,
    pub token: String,
}

#[derive(Serialize)]
pub struct SessionUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// Email+password login. Both failure modes are 401s with distinct messages
/// so the client can tell an unknown account from a wrong password.
pub async fn create_session(
    State(state): State<AppState>,
    Json(payload): Json<SessionRequest>,
) -> AppResult<Json<SessionResponse>> {
    payload.validate()?;
    let email = payload.email.unwrap_or_default();
    let password = payload.password.unwrap_or_default();

    let user = state
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or_else(|| AppError::unauthorized("User not found"))?;

    let valid = password::verify_password(&password, &user.password_hash)
        .map_err(|_| AppError::unauthorized("Password does not match"))?;
    if !valid {
        return Err(AppError::unauthorized("Password does not match"));
    }

    let token = state.jwt.generate_token(user.id)?;

    tracing::info!(user_id = %user.id, "session created");

    Ok(Json(SessionResponse {
        user: SessionUser {
            id: user.id,
            name: user.name,
            email: user.email,
        },
        token,
    }))
}
