//! WAX Labs contract rows
//!
//! `Proposal` mirrors a row of the `proposals` table and `Deliverable` a row
//! of the per-proposal `deliverables` table. Only the identifying fields are
//! required; everything else falls back to defaults so older contract
//! versions still decode.

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::wax::{ChainError, TableRow};

/// Chain asset such as `"1000.00000000 WAX"`
///
/// Serialized back as the same string, so precision survives the round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Asset {
    pub amount: Decimal,
    pub symbol: String,
}

impl FromStr for Asset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (amount, symbol) = s
            .trim()
            .split_once(' ')
            .ok_or_else(|| format!("invalid asset {:?}: expected \"<amount> <SYMBOL>\"", s))?;

        let symbol = symbol.trim();
        if symbol.is_empty() || symbol.len() > 7 || !symbol.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(format!("invalid asset symbol {:?}", symbol));
        }

        let amount = Decimal::from_str(amount).map_err(|e| format!("invalid asset amount {:?}: {}", amount, e))?;

        Ok(Self {
            amount,
            symbol: symbol.to_string(),
        })
    }
}

impl TryFrom<String> for Asset {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Asset> for String {
    fn from(asset: Asset) -> Self {
        asset.to_string()
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.amount, self.symbol)
    }
}

/// One entry of the ballot result map (`{"key": "yes", "value": "10.00000000 VOTE"}`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotResult {
    pub key: String,
    pub value: Asset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub proposal_id: u64,
    #[serde(alias = "author")]
    pub proposer: String,
    pub status: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub ballot_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    /// Estimated days to complete
    #[serde(default)]
    pub estimated_time: u32,
    #[serde(default)]
    pub total_requested_funds: Option<Asset>,
    #[serde(default)]
    pub remaining_funds: Option<Asset>,
    #[serde(default)]
    pub deliverables: u32,
    #[serde(default)]
    pub deliverables_completed: u32,
    #[serde(default)]
    pub reviewer: String,
    #[serde(default)]
    pub ballot_results: Vec<BallotResult>,
    #[serde(default)]
    pub update_ts: Option<NaiveDateTime>,
}

impl Proposal {
    /// Validate a decoded table row into a `Proposal`
    pub fn from_row(row: TableRow) -> Result<Self, ChainError> {
        let value = row.into_decoded()?;
        serde_json::from_value(value).map_err(|e| ChainError::Decode(format!("invalid proposal row: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deliverable {
    pub deliverable_id: u64,
    pub status: String,
    #[serde(default)]
    pub requested: Option<Asset>,
    #[serde(default)]
    pub recipient: String,
    #[serde(default)]
    pub small_description: String,
    #[serde(default)]
    pub days_to_complete: u32,
    #[serde(default)]
    pub report: String,
    #[serde(default)]
    pub review_time: Option<NaiveDateTime>,
}

impl Deliverable {
    pub fn from_row(row: TableRow) -> Result<Self, ChainError> {
        let value = row.into_decoded()?;
        serde_json::from_value(value).map_err(|e| ChainError::Decode(format!("invalid deliverable row: {}", e)))
    }
}
