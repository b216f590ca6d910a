//! Proposal status tracking
//!
//! Compares the status stored for every tracked proposal with the one on
//! chain, persists changes and tells the subscribers about them.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::entities::{prelude::ProposalStatuses, proposal_statuses};
use crate::models::proposal::Proposal;
use crate::services::notifier::{escape_html, TelegramNotifier};
use crate::services::proposal_cache::ProposalCache;
use crate::services::subscriptions::subscribers_of;
use crate::settings::ContractConfig;
use crate::wax::{get_proposal, ChainError, TableRowsSource};

#[derive(Debug)]
pub enum TrackerError {
    DatabaseError(String),
}

impl std::fmt::Display for TrackerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackerError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
        }
    }
}

impl std::error::Error for TrackerError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub proposal_id: i32,
    pub previous: Option<String>,
    pub current: String,
}

/// Outcome of one polling pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PollStats {
    pub checked: usize,
    pub changed: usize,
    pub missing: usize,
    pub failed: usize,
    pub notified: usize,
}

/// `None` when the stored status already matches the chain
pub fn detect_status_change(
    stored: &proposal_statuses::Model,
    proposal: &Proposal,
) -> Option<StatusChange> {
    if stored.status.as_deref() == Some(proposal.status.as_str()) {
        return None;
    }

    Some(StatusChange {
        proposal_id: stored.proposal_id,
        previous: stored.status.clone(),
        current: proposal.status.clone(),
    })
}

/// Telegram message (HTML parse mode) announcing a status change
pub fn format_status_message(change: &StatusChange, proposal: &Proposal) -> String {
    let mut message = format!("<b>Proposal #{}</b>", change.proposal_id);
    if !proposal.title.is_empty() {
        message.push_str(&format!(" {}", escape_html(&proposal.title)));
    }

    message.push_str(&format!(
        "\nStatus changed: {} -> <b>{}</b>",
        escape_html(change.previous.as_deref().unwrap_or("unknown")),
        escape_html(&change.current)
    ));

    message
}

pub struct ProposalStatusTracker {
    db: DatabaseConnection,
    source: Arc<dyn TableRowsSource>,
    contract: ContractConfig,
    notifier: Option<TelegramNotifier>,
    cache: Option<ProposalCache>,
}

impl ProposalStatusTracker {
    pub fn new(
        db: DatabaseConnection,
        source: Arc<dyn TableRowsSource>,
        contract: ContractConfig,
        notifier: Option<TelegramNotifier>,
    ) -> Self {
        Self {
            db,
            source,
            contract,
            notifier,
            cache: None,
        }
    }

    /// Drop cached proposals whenever their status changes
    pub fn with_cache(mut self, cache: ProposalCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Check every tracked proposal once
    ///
    /// Per-proposal failures are logged and counted; only failing to list
    /// the tracked proposals aborts the pass.
    pub async fn run_once(&self) -> Result<PollStats, TrackerError> {
        let tracked = ProposalStatuses::find()
            .all(&self.db)
            .await
            .map_err(|e| TrackerError::DatabaseError(e.to_string()))?;

        let mut stats = PollStats::default();

        for record in tracked {
            stats.checked += 1;

            let Ok(proposal_id) = u64::try_from(record.proposal_id) else {
                warn!(proposal_id = record.proposal_id, "Skipping proposal with negative id");
                stats.failed += 1;
                continue;
            };

            let proposal = match get_proposal(self.source.as_ref(), &self.contract, proposal_id).await {
                Ok(proposal) => proposal,
                Err(ChainError::NotFound { .. }) => {
                    warn!(proposal_id = proposal_id, "Tracked proposal no longer on chain");
                    stats.missing += 1;
                    continue;
                }
                Err(e) => {
                    error!(proposal_id = proposal_id, error = %e, "Failed to fetch proposal");
                    stats.failed += 1;
                    continue;
                }
            };

            let Some(change) = detect_status_change(&record, &proposal) else {
                continue;
            };

            info!(
                proposal_id = proposal_id,
                previous = ?change.previous,
                current = %change.current,
                "Proposal status changed"
            );

            let mut active_model: proposal_statuses::ActiveModel = record.into();
            active_model.status = Set(Some(change.current.clone()));
            active_model.updated_at = Set(Utc::now().naive_utc());

            if let Err(e) = active_model.update(&self.db).await {
                error!(proposal_id = proposal_id, error = %e, "Failed to store proposal status");
                stats.failed += 1;
                continue;
            }

            stats.changed += 1;

            if let Some(cache) = &self.cache {
                cache.invalidate(proposal_id).await;
            }

            stats.notified += self.notify_subscribers(&change, &proposal).await;
        }

        Ok(stats)
    }

    /// Returns how many subscribers were reached
    async fn notify_subscribers(&self, change: &StatusChange, proposal: &Proposal) -> usize {
        let subscribers = match subscribers_of(&self.db, change.proposal_id).await {
            Ok(subscribers) => subscribers,
            Err(e) => {
                error!(proposal_id = change.proposal_id, error = %e, "Failed to load subscribers");
                return 0;
            }
        };

        let Some(notifier) = &self.notifier else {
            info!(
                proposal_id = change.proposal_id,
                subscribers = subscribers.len(),
                "No Telegram bot configured, skipping notifications"
            );
            return 0;
        };

        let message = format_status_message(change, proposal);
        let mut delivered = 0;

        for user in subscribers {
            if notifier.send_message(&user.chat_id, &message).await {
                delivered += 1;
            }
        }

        delivered
    }
}
