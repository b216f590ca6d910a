use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use super::{check_proposal_id, json_body, subscription_error_response, ApiError};
use crate::models::subscription::{
    SubscribeRequest, SubscribeResponse, SubscriptionListResponse, UnsubscribeResponse,
};
use crate::services::subscriptions;
use crate::AppState;

/// POST /subscriptions
pub async fn subscribe(
    State(state): State<AppState>,
    payload: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<Json<SubscribeResponse>, ApiError> {
    let payload = json_body(payload)?;
    let proposal_id = check_proposal_id(payload.proposal_id)?;

    let subscription = subscriptions::subscribe(
        &state.db,
        state.chain.as_ref(),
        &state.contract,
        &payload.wax_account,
        proposal_id,
    )
    .await
    .map_err(subscription_error_response)?;

    Ok(Json(SubscribeResponse {
        success: true,
        subscription,
    }))
}

/// DELETE /subscriptions
pub async fn unsubscribe(
    State(state): State<AppState>,
    payload: Result<Json<SubscribeRequest>, JsonRejection>,
) -> Result<Json<UnsubscribeResponse>, ApiError> {
    let payload = json_body(payload)?;
    let proposal_id = check_proposal_id(payload.proposal_id)?;

    let removed = subscriptions::unsubscribe(&state.db, &payload.wax_account, proposal_id)
        .await
        .map_err(subscription_error_response)?;

    Ok(Json(UnsubscribeResponse { removed }))
}

/// GET /users/{wax_account}/subscriptions
pub async fn list_subscriptions(
    State(state): State<AppState>,
    Path(wax_account): Path<String>,
) -> Result<Json<SubscriptionListResponse>, ApiError> {
    let subscriptions = subscriptions::list_subscriptions(&state.db, &wax_account)
        .await
        .map_err(subscription_error_response)?;

    Ok(Json(SubscriptionListResponse {
        wax_account,
        subscriptions,
    }))
}
