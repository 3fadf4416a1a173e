/// Authentication endpoint
///
/// There is no logout endpoint: sessions are stateless tokens, so a client
/// logs out by discarding its token, which stays valid until it expires.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use chrono::{DateTime, Utc};
use housepoints_shared::{auth::credentials::authenticate, models::user::UserSummary};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 100, message = "username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Bearer token for subsequent requests
    pub token: String,

    pub expires_at: DateTime<Utc>,

    pub user: UserSummary,
}

/// Login endpoint
///
/// ```text
/// POST /auth/login
/// Content-Type: application/json
///
/// { "username": "mcgonagall", "password": "..." }
/// ```
///
/// ```json
/// {
///   "token": "eyJ...",
///   "expires_at": "2025-01-02T10:00:00Z",
///   "user": { "id": "uuid", "username": "mcgonagall", "role": "teacher" }
/// }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: missing username or password
/// - `401 Unauthorized`: unknown username or wrong password (indistinguishable)
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let Json(req) = payload?;
    req.validate().map_err(ApiError::from)?;

    let user = authenticate(state.store.as_ref(), &req.username, &req.password).await?;
    let session = state.tokens.issue(&user)?;

    tracing::info!(user_id = %user.id, role = %user.role, "User logged in");

    Ok(Json(LoginResponse {
        token: session.token,
        expires_at: session.claims.expires_at(),
        user: UserSummary::from(&user),
    }))
}
