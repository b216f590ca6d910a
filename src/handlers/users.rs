use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};

use super::{api_error, json_body, subscription_error_response, ApiError};
use crate::models::user::{RegisterUserRequest, UserResponse};
use crate::services::subscriptions;
use crate::AppState;

/// POST /users
///
/// Registers a Telegram chat with its WAX account, or updates the user
/// already registered for that chat.
pub async fn register_user(
    State(state): State<AppState>,
    payload: Result<Json<RegisterUserRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let request = json_body(payload)?
        .validate()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e, "INVALID_INPUT"))?;

    let user = subscriptions::register_user(&state.db, request)
        .await
        .map_err(subscription_error_response)?;

    Ok(Json(user.into()))
}

/// GET /users/{wax_account}
pub async fn get_user(
    State(state): State<AppState>,
    Path(wax_account): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = subscriptions::find_user_by_wax_account(&state.db, &wax_account)
        .await
        .map_err(subscription_error_response)?
        .ok_or_else(|| {
            api_error(
                StatusCode::NOT_FOUND,
                format!("User {} not found", wax_account),
                "USER_NOT_FOUND",
            )
        })?;

    Ok(Json(user.into()))
}
