use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeRequest {
    pub wax_account: String,
    pub proposal_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscribeResponse {
    pub success: bool,
    pub subscription: SubscriptionView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnsubscribeResponse {
    pub removed: bool,
}

/// A subscription together with the last stored status of its proposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionView {
    pub uuid: Uuid,
    pub proposal_id: Option<i32>,
    pub status: Option<String>,
    pub author: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionListResponse {
    pub wax_account: String,
    pub subscriptions: Vec<SubscriptionView>,
}
