//! Proposal read endpoints
//!
//! GET /proposals/{id}, /proposals/{id}/profile and /proposals/{id}/deliverables.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use tracing::info;

use super::{chain_error_response, parse_proposal_id, ApiError};
use crate::models::proposal::{Deliverable, Proposal};
use crate::wax::{get_deliverables, get_profile};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct DeliverablesResponse {
    pub proposal_id: u64,
    pub deliverables: Vec<Deliverable>,
}

/// GET /proposals/{id}
///
/// # Response
/// - 200: Proposal as stored on chain
/// - 400: id is not a positive integer
/// - 404: No such proposal
/// - 502: WAX node unreachable or returned unexpected data
pub async fn get_proposal(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Proposal>, ApiError> {
    let proposal_id = parse_proposal_id(&raw_id)?;
    info!(proposal_id = proposal_id, "Fetching proposal");

    let proposal = state
        .proposals
        .get_proposal(state.chain.as_ref(), &state.contract, proposal_id)
        .await
        .map_err(chain_error_response)?;

    Ok(Json(proposal))
}

/// GET /proposals/{id}/profile
///
/// Same row as `/proposals/{id}`, but a missing proposal is `null` with 200.
pub async fn get_proposal_profile(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Option<Proposal>>, ApiError> {
    let proposal_id = parse_proposal_id(&raw_id)?;
    info!(proposal_id = proposal_id, "Fetching proposal profile");

    let profile = get_profile(state.chain.as_ref(), &state.contract, proposal_id)
        .await
        .map_err(chain_error_response)?;

    Ok(Json(profile))
}

/// GET /proposals/{id}/deliverables
pub async fn get_proposal_deliverables(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<DeliverablesResponse>, ApiError> {
    let proposal_id = parse_proposal_id(&raw_id)?;

    let deliverables = get_deliverables(state.chain.as_ref(), &state.contract, proposal_id)
        .await
        .map_err(chain_error_response)?;

    info!(
        proposal_id = proposal_id,
        count = deliverables.len(),
        "Deliverables query completed"
    );

    Ok(Json(DeliverablesResponse {
        proposal_id,
        deliverables,
    }))
}
