use axum::{extract::rejection::JsonRejection, http::StatusCode, Json};
use tracing::{error, warn};

use crate::models::error::ErrorResponse;
use crate::services::subscriptions::SubscriptionError;
use crate::wax::ChainError;

pub mod health;
pub mod proposals;
pub mod subscriptions;
pub mod users;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn api_error(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (status, Json(ErrorResponse::new(error, code)))
}

pub(crate) fn chain_error_response(e: ChainError) -> ApiError {
    match e {
        ChainError::NotFound { key, .. } => api_error(
            StatusCode::NOT_FOUND,
            format!("Proposal {} not found", key),
            "PROPOSAL_NOT_FOUND",
        ),
        ChainError::Transport(msg) => {
            error!(error = %msg, "WAX node unreachable");
            api_error(
                StatusCode::BAD_GATEWAY,
                "WAX node unreachable",
                "CHAIN_UNAVAILABLE",
            )
        }
        ChainError::Api { status, body } => {
            error!(status = status, body = %body, "WAX node returned an error");
            api_error(
                StatusCode::BAD_GATEWAY,
                format!("WAX node error {}", status),
                "CHAIN_ERROR",
            )
        }
        ChainError::Decode(msg) => {
            error!(error = %msg, "Failed to decode WAX table row");
            api_error(
                StatusCode::BAD_GATEWAY,
                "Unexpected data from WAX node",
                "CHAIN_DECODE_ERROR",
            )
        }
    }
}

pub(crate) fn subscription_error_response(e: SubscriptionError) -> ApiError {
    match e {
        SubscriptionError::Database(msg) => {
            error!(error = %msg, "Database error");
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                "DATABASE_ERROR",
            )
        }
        SubscriptionError::Chain(e) => chain_error_response(e),
        SubscriptionError::UserNotFound(account) => api_error(
            StatusCode::NOT_FOUND,
            format!("User {} not found", account),
            "USER_NOT_FOUND",
        ),
        SubscriptionError::ProposalNotFound(id) => api_error(
            StatusCode::NOT_FOUND,
            format!("Proposal {} not found", id),
            "PROPOSAL_NOT_FOUND",
        ),
        SubscriptionError::Conflict(msg) => {
            warn!(reason = %msg, "Rejected conflicting write");
            api_error(StatusCode::CONFLICT, msg, "CONFLICT")
        }
        SubscriptionError::InvalidInput(msg) => api_error(StatusCode::BAD_REQUEST, msg, "INVALID_INPUT"),
    }
}

/// Request body, with malformed or mistyped JSON answered as 400
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        let reason = rejection.body_text();
        warn!(reason = %reason, "Rejected request body");
        api_error(StatusCode::BAD_REQUEST, reason, "INVALID_INPUT")
    })
}

/// Proposal ids in paths and bodies must be positive integers
pub(crate) fn parse_proposal_id(raw: &str) -> Result<u64, ApiError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| invalid_proposal_id(raw))
        .and_then(check_proposal_id)
}

pub(crate) fn check_proposal_id(proposal_id: u64) -> Result<u64, ApiError> {
    if proposal_id == 0 {
        return Err(invalid_proposal_id(&proposal_id.to_string()));
    }
    Ok(proposal_id)
}

fn invalid_proposal_id(raw: &str) -> ApiError {
    api_error(
        StatusCode::BAD_REQUEST,
        format!("Invalid proposal id: {}", raw),
        "INVALID_PROPOSAL_ID",
    )
}

/// 404 for unknown routes, in the same shape as every other error
pub async fn fallback() -> ApiError {
    api_error(StatusCode::NOT_FOUND, "Not found", "NOT_FOUND")
}
