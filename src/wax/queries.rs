//! WAX Labs contract queries
//!
//! `get_proposal` treats a missing proposal as an error, `get_profile` treats
//! it as a normal empty answer. Both read the same row.

use futures_util::{pin_mut, TryStreamExt};
use tracing::debug;

use super::chain::{get_table_rows, ChainError, TableRowsQuery, TableRowsSource};
use crate::models::proposal::{Deliverable, Proposal};
use crate::settings::{ContractConfig, Tables};

fn proposal_row_query(contract: &ContractConfig, proposal_id: u64) -> TableRowsQuery {
    TableRowsQuery::new(&contract.account, &contract.account, Tables::Proposals)
        .single_key(proposal_id)
        .full(true)
}

/// Fetch one proposal; absent or empty rows are `ChainError::NotFound`
pub async fn get_proposal(
    source: &dyn TableRowsSource,
    contract: &ContractConfig,
    proposal_id: u64,
) -> Result<Proposal, ChainError> {
    let rows = get_table_rows(source, proposal_row_query(contract, proposal_id).limit(1));
    pin_mut!(rows);

    if let Some(row) = rows.try_next().await? {
        if !row.is_empty() {
            return Proposal::from_row(row);
        }
    }

    debug!(proposal_id, "Proposal not found on chain");
    Err(ChainError::NotFound {
        table: Tables::Proposals.to_string(),
        key: proposal_id.to_string(),
    })
}

/// Fetch a proposal's profile, `None` when the contract has no such row
pub async fn get_profile(
    source: &dyn TableRowsSource,
    contract: &ContractConfig,
    proposal_id: u64,
) -> Result<Option<Proposal>, ChainError> {
    let rows = get_table_rows(source, proposal_row_query(contract, proposal_id));
    pin_mut!(rows);

    match rows.try_next().await? {
        Some(row) => Proposal::from_row(row).map(Some),
        None => Ok(None),
    }
}

/// All deliverables of a proposal; the contract scopes them by proposal id
pub async fn get_deliverables(
    source: &dyn TableRowsSource,
    contract: &ContractConfig,
    proposal_id: u64,
) -> Result<Vec<Deliverable>, ChainError> {
    let query = TableRowsQuery::new(&contract.account, proposal_id.to_string(), Tables::Deliverables)
        .full(true);

    get_table_rows(source, query)
        .and_then(|row| async move { Deliverable::from_row(row) })
        .try_collect()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wax::chain::TableRowsPage;
    use crate::wax::testing::ScriptedSource;
    use serde_json::json;

    fn contract() -> ContractConfig {
        ContractConfig::new("labs.decide")
    }

    fn proposal_42() -> serde_json::Value {
        json!({"proposal_id": 42, "author": "acct123", "status": "active"})
    }

    #[tokio::test]
    async fn test_get_proposal_found() {
        let source = ScriptedSource::with_rows(vec![proposal_42()]);

        let proposal = get_proposal(&source, &contract(), 42).await.unwrap();

        assert_eq!(proposal.proposal_id, 42);
        assert_eq!(proposal.proposer, "acct123");
        assert_eq!(proposal.status, "active");

        let requests = source.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].code, "labs.decide");
        assert_eq!(requests[0].scope, "labs.decide");
        assert_eq!(requests[0].table, "proposals");
        assert_eq!(requests[0].lower_bound.as_deref(), Some("42"));
        assert_eq!(requests[0].upper_bound.as_deref(), Some("42"));
        assert_eq!(requests[0].limit, Some(1));
        assert!(requests[0].full);
    }

    #[tokio::test]
    async fn test_get_proposal_missing_is_not_found() {
        let source = ScriptedSource::with_rows(vec![]);

        let err = get_proposal(&source, &contract(), 9999).await.unwrap_err();

        assert_eq!(
            err,
            ChainError::NotFound {
                table: "proposals".to_string(),
                key: "9999".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_get_proposal_empty_row_is_not_found() {
        let source = ScriptedSource::with_rows(vec![json!({})]);
        let err = get_proposal(&source, &contract(), 42).await.unwrap_err();
        assert!(matches!(err, ChainError::NotFound { .. }));

        let source = ScriptedSource::with_rows(vec![json!(null)]);
        let err = get_proposal(&source, &contract(), 42).await.unwrap_err();
        assert!(matches!(err, ChainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_get_profile_found_matches_get_proposal() {
        let source = ScriptedSource::with_rows(vec![proposal_42()]);
        let profile = get_profile(&source, &contract(), 42).await.unwrap();

        let source = ScriptedSource::with_rows(vec![proposal_42()]);
        let proposal = get_proposal(&source, &contract(), 42).await.unwrap();

        assert_eq!(profile, Some(proposal));
    }

    #[tokio::test]
    async fn test_get_profile_missing_is_none() {
        let source = ScriptedSource::with_rows(vec![]);

        let profile = get_profile(&source, &contract(), 9999).await.unwrap();

        assert_eq!(profile, None);
        let requests = source.requests();
        assert_eq!(requests[0].limit, None);
        assert_eq!(requests[0].lower_bound.as_deref(), Some("9999"));
    }

    #[tokio::test]
    async fn test_get_profile_stops_after_first_row() {
        let source = ScriptedSource::new(vec![
            Ok(TableRowsPage {
                rows: vec![proposal_42(), json!({"garbage": true})],
                more: true,
                next_key: Some("43".to_string()),
            }),
            Ok(TableRowsPage {
                rows: vec![json!({"garbage": true})],
                more: false,
                next_key: None,
            }),
        ]);

        let profile = get_profile(&source, &contract(), 42).await.unwrap();

        assert_eq!(profile.map(|p| p.proposal_id), Some(42));
        assert_eq!(source.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_decode_error_propagates() {
        let source = ScriptedSource::with_rows(vec![json!({"proposal_id": "not a number"})]);
        let err = get_proposal(&source, &contract(), 42).await.unwrap_err();
        assert!(matches!(err, ChainError::Decode(_)));

        let source = ScriptedSource::with_rows(vec![json!({"proposal_id": "not a number"})]);
        let err = get_profile(&source, &contract(), 42).await.unwrap_err();
        assert!(matches!(err, ChainError::Decode(_)));
    }

    #[tokio::test]
    async fn test_transport_error_is_not_absence() {
        let source = ScriptedSource::new(vec![Err(ChainError::Transport("connection reset".to_string()))]);
        let err = get_proposal(&source, &contract(), 42).await.unwrap_err();
        assert_eq!(err, ChainError::Transport("connection reset".to_string()));

        let source = ScriptedSource::new(vec![Err(ChainError::Api {
            status: 500,
            body: "boom".to_string(),
        })]);
        let err = get_profile(&source, &contract(), 42).await.unwrap_err();
        assert!(matches!(err, ChainError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_get_deliverables_scoped_by_proposal() {
        let source = ScriptedSource::with_rows(vec![
            json!({"deliverable_id": 1, "status": "accepted", "requested": "100.00000000 WAX"}),
            json!({"deliverable_id": 2, "status": "drafting"}),
        ]);

        let deliverables = get_deliverables(&source, &contract(), 42).await.unwrap();

        assert_eq!(deliverables.len(), 2);
        assert_eq!(deliverables[1].status, "drafting");
        let requests = source.requests();
        assert_eq!(requests[0].scope, "42");
        assert_eq!(requests[0].table, "deliverables");
        assert_eq!(requests[0].lower_bound, None);
    }
}
