//! Users, tracked proposals and subscriptions
//!
//! The schema allows one subscription per proposal and one per user; inserts
//! that would break that come back as `SubscriptionError::Conflict`.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, Set, SqlErr,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::entities::{prelude::*, proposal_statuses, subscriptions, users};
use crate::models::proposal::Proposal;
use crate::models::subscription::SubscriptionView;
use crate::models::user::{is_valid_wax_account, RegisterUserRequest};
use crate::settings::ContractConfig;
use crate::wax::{get_proposal, ChainError, TableRowsSource};

#[derive(Debug)]
pub enum SubscriptionError {
    Database(String),
    Chain(ChainError),
    UserNotFound(String),
    ProposalNotFound(u64),
    Conflict(String),
    InvalidInput(String),
}

impl std::fmt::Display for SubscriptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionError::Database(msg) => write!(f, "Database error: {}", msg),
            SubscriptionError::Chain(e) => write!(f, "Chain error: {}", e),
            SubscriptionError::UserNotFound(account) => write!(f, "User not found: {}", account),
            SubscriptionError::ProposalNotFound(id) => write!(f, "Proposal {} not found", id),
            SubscriptionError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            SubscriptionError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for SubscriptionError {}

impl From<SqlErr> for SubscriptionError {
    fn from(e: SqlErr) -> Self {
        match e {
            SqlErr::UniqueConstraintViolation(msg) => SubscriptionError::Conflict(msg),
            SqlErr::ForeignKeyConstraintViolation(msg) => SubscriptionError::InvalidInput(msg),
            #[allow(unreachable_patterns)]
            other => SubscriptionError::Database(other.to_string()),
        }
    }
}

impl From<DbErr> for SubscriptionError {
    fn from(e: DbErr) -> Self {
        match e.sql_err() {
            Some(sql_err) => sql_err.into(),
            None => SubscriptionError::Database(e.to_string()),
        }
    }
}

/// Proposal ids are `int` columns in the database
pub fn proposal_db_id(proposal_id: u64) -> Result<i32, SubscriptionError> {
    i32::try_from(proposal_id)
        .map_err(|_| SubscriptionError::InvalidInput(format!("proposal id {} out of range", proposal_id)))
}

/// Insert a user or update the one registered for the same chat
pub async fn register_user(
    db: &DatabaseConnection,
    request: RegisterUserRequest,
) -> Result<users::Model, SubscriptionError> {
    let now = Utc::now().naive_utc();

    // A WAX account belongs to a single chat
    let owner = Users::find()
        .filter(users::Column::WaxAccount.eq(&request.wax_account))
        .one(db)
        .await?;

    if let Some(owner) = &owner {
        if owner.chat_id != request.chat_id {
            return Err(SubscriptionError::Conflict(format!(
                "WAX account {} is already registered to another chat",
                request.wax_account
            )));
        }
    }

    let existing = Users::find()
        .filter(users::Column::ChatId.eq(&request.chat_id))
        .one(db)
        .await?;

    let user = if let Some(existing_user) = existing {
        let mut active_model = existing_user.into_active_model();
        active_model.name = Set(request.name);
        active_model.telegram_account = Set(request.telegram_account);
        active_model.wax_account = Set(request.wax_account);
        active_model.updated_at = Set(now);

        let user = active_model.update(db).await?;
        info!(wax_account = %user.wax_account, "Updated user");
        user
    } else {
        let new_user = users::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            name: Set(request.name),
            telegram_account: Set(request.telegram_account),
            wax_account: Set(request.wax_account),
            chat_id: Set(request.chat_id),
            updated_at: Set(now),
            ..Default::default()
        };

        let user = new_user.insert(db).await?;
        info!(wax_account = %user.wax_account, "Registered user");
        user
    };

    Ok(user)
}

pub async fn find_user_by_wax_account(
    db: &DatabaseConnection,
    wax_account: &str,
) -> Result<Option<users::Model>, SubscriptionError> {
    Ok(Users::find()
        .filter(users::Column::WaxAccount.eq(wax_account))
        .one(db)
        .await?)
}

async fn require_user(db: &DatabaseConnection, wax_account: &str) -> Result<users::Model, SubscriptionError> {
    find_user_by_wax_account(db, wax_account)
        .await?
        .ok_or_else(|| SubscriptionError::UserNotFound(wax_account.to_string()))
}

/// Make sure a `proposal_statuses` row exists for `proposal`
///
/// An existing row is returned untouched; status updates belong to the
/// status tracker so a change is never swallowed here.
pub async fn track_proposal(
    db: &DatabaseConnection,
    proposal: &Proposal,
) -> Result<proposal_statuses::Model, SubscriptionError> {
    let proposal_id = proposal_db_id(proposal.proposal_id)?;

    // `author` is a varchar(15) holding a WAX account name
    if !is_valid_wax_account(&proposal.proposer) {
        return Err(SubscriptionError::Chain(ChainError::Decode(format!(
            "proposal {} has an invalid proposer {:?}",
            proposal.proposal_id, proposal.proposer
        ))));
    }

    let existing = ProposalStatuses::find()
        .filter(proposal_statuses::Column::ProposalId.eq(proposal_id))
        .one(db)
        .await?;

    if let Some(record) = existing {
        return Ok(record);
    }

    let record = proposal_statuses::ActiveModel {
        uuid: Set(Uuid::new_v4()),
        proposal_id: Set(proposal_id),
        author: Set(proposal.proposer.clone()),
        status: Set(Some(proposal.status.clone())),
        updated_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        proposal_id = proposal_id,
        status = %proposal.status,
        "Tracking proposal"
    );

    Ok(record)
}

fn to_view(
    subscription: subscriptions::Model,
    status: Option<proposal_statuses::Model>,
) -> SubscriptionView {
    SubscriptionView {
        uuid: subscription.uuid,
        proposal_id: subscription.proposal_id,
        status: status.as_ref().and_then(|s| s.status.clone()),
        author: status.map(|s| s.author),
        created_at: subscription.created_at,
    }
}

/// Subscribe the user owning `wax_account` to a proposal that exists on chain
pub async fn subscribe(
    db: &DatabaseConnection,
    source: &dyn TableRowsSource,
    contract: &ContractConfig,
    wax_account: &str,
    proposal_id: u64,
) -> Result<SubscriptionView, SubscriptionError> {
    let user = require_user(db, wax_account).await?;
    let db_proposal_id = proposal_db_id(proposal_id)?;

    let current = Subscriptions::find()
        .filter(subscriptions::Column::UserId.eq(user.uuid))
        .find_also_related(ProposalStatuses)
        .one(db)
        .await?;

    if let Some((subscription, status)) = current {
        if subscription.proposal_id == Some(db_proposal_id) {
            debug!(wax_account = %wax_account, proposal_id = proposal_id, "Already subscribed");
            return Ok(to_view(subscription, status));
        }
        return Err(SubscriptionError::Conflict(format!(
            "{} is already subscribed to another proposal",
            wax_account
        )));
    }

    let taken = Subscriptions::find()
        .filter(subscriptions::Column::ProposalId.eq(db_proposal_id))
        .one(db)
        .await?;

    if taken.is_some() {
        return Err(SubscriptionError::Conflict(format!(
            "proposal {} already has a subscriber",
            proposal_id
        )));
    }

    let proposal = get_proposal(source, contract, proposal_id)
        .await
        .map_err(|e| match e {
            ChainError::NotFound { .. } => SubscriptionError::ProposalNotFound(proposal_id),
            other => SubscriptionError::Chain(other),
        })?;

    let status = track_proposal(db, &proposal).await?;

    let subscription = subscriptions::ActiveModel {
        uuid: Set(Uuid::new_v4()),
        proposal_id: Set(Some(db_proposal_id)),
        user_id: Set(Some(user.uuid)),
        updated_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        wax_account = %wax_account,
        proposal_id = proposal_id,
        "Subscription created"
    );

    Ok(to_view(subscription, Some(status)))
}

/// Remove a subscription; `false` when there was nothing to remove
pub async fn unsubscribe(
    db: &DatabaseConnection,
    wax_account: &str,
    proposal_id: u64,
) -> Result<bool, SubscriptionError> {
    let user = require_user(db, wax_account).await?;
    let db_proposal_id = proposal_db_id(proposal_id)?;

    let result = Subscriptions::delete_many()
        .filter(subscriptions::Column::UserId.eq(user.uuid))
        .filter(subscriptions::Column::ProposalId.eq(db_proposal_id))
        .exec(db)
        .await?;

    if result.rows_affected > 0 {
        info!(wax_account = %wax_account, proposal_id = proposal_id, "Subscription removed");
    }

    Ok(result.rows_affected > 0)
}

pub async fn list_subscriptions(
    db: &DatabaseConnection,
    wax_account: &str,
) -> Result<Vec<SubscriptionView>, SubscriptionError> {
    let user = require_user(db, wax_account).await?;

    let rows = Subscriptions::find()
        .filter(subscriptions::Column::UserId.eq(user.uuid))
        .find_also_related(ProposalStatuses)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(subscription, status)| to_view(subscription, status))
        .collect())
}

/// Users subscribed to a proposal
pub async fn subscribers_of(
    db: &DatabaseConnection,
    proposal_id: i32,
) -> Result<Vec<users::Model>, DbErr> {
    let rows = Subscriptions::find()
        .filter(subscriptions::Column::ProposalId.eq(proposal_id))
        .find_also_related(Users)
        .all(db)
        .await?;

    Ok(rows.into_iter().filter_map(|(_, user)| user).collect())
}
