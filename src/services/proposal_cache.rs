//! Short-lived cache in front of `get_proposal` for the HTTP read path
//!
//! Only found proposals are cached. The status tracker never goes through
//! this cache.

use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use crate::models::proposal::Proposal;
use crate::settings::ContractConfig;
use crate::wax::{get_proposal, ChainError, TableRowsSource};

#[derive(Clone)]
pub struct ProposalCache {
    cache: Arc<Cache<u64, Proposal>>,
}

impl ProposalCache {
    pub fn new(ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1_000)
            .time_to_live(ttl)
            .build();

        Self {
            cache: Arc::new(cache),
        }
    }

    pub async fn get_proposal(
        &self,
        source: &dyn TableRowsSource,
        contract: &ContractConfig,
        proposal_id: u64,
    ) -> Result<Proposal, ChainError> {
        if let Some(proposal) = self.cache.get(&proposal_id).await {
            tracing::debug!("Cache hit for proposal {}", proposal_id);
            return Ok(proposal);
        }

        let proposal = get_proposal(source, contract, proposal_id).await?;
        self.cache.insert(proposal_id, proposal.clone()).await;

        Ok(proposal)
    }

    pub async fn invalidate(&self, proposal_id: u64) {
        self.cache.invalidate(&proposal_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wax::testing::ScriptedSource;
    use crate::wax::TableRowsPage;
    use serde_json::json;

    fn row_page(status: &str) -> Result<TableRowsPage, ChainError> {
        Ok(TableRowsPage {
            rows: vec![json!({"proposal_id": 42, "proposer": "acct123", "status": status})],
            more: false,
            next_key: None,
        })
    }

    #[tokio::test]
    async fn test_second_lookup_is_served_from_cache() {
        let source = ScriptedSource::new(vec![row_page("voting"), row_page("approved")]);
        let cache = ProposalCache::new(Duration::from_secs(60));
        let contract = ContractConfig::new("labs.decide");

        let first = cache.get_proposal(&source, &contract, 42).await.unwrap();
        let second = cache.get_proposal(&source, &contract, 42).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(source.requests().len(), 1);

        cache.invalidate(42).await;
        let third = cache.get_proposal(&source, &contract, 42).await.unwrap();
        assert_eq!(third.status, "approved");
        assert_eq!(source.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_not_found_is_not_cached() {
        let source = ScriptedSource::new(vec![
            Ok(TableRowsPage::default()),
            row_page("drafting"),
        ]);
        let cache = ProposalCache::new(Duration::from_secs(60));
        let contract = ContractConfig::new("labs.decide");

        let err = cache.get_proposal(&source, &contract, 42).await.unwrap_err();
        assert!(matches!(err, ChainError::NotFound { .. }));

        let proposal = cache.get_proposal(&source, &contract, 42).await.unwrap();
        assert_eq!(proposal.status, "drafting");
    }
}
