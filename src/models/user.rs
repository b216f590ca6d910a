//! User registration request/response models

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entities::users;

/// Column limits from the `users` table
const MAX_NAME_LENGTH: usize = 160;
const MAX_TELEGRAM_ACCOUNT_LENGTH: usize = 160;
const MAX_CHAT_ID_LENGTH: usize = 60;

lazy_static::lazy_static! {
    /// WAX account names: up to 12 chars of a-z, 1-5 and '.', not ending in '.'
    static ref WAX_ACCOUNT_RE: Regex = Regex::new(r"^[a-z1-5.]{0,11}[a-z1-5]$").unwrap();
}

pub fn is_valid_wax_account(account: &str) -> bool {
    WAX_ACCOUNT_RE.is_match(account)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterUserRequest {
    #[serde(default)]
    pub name: Option<String>,
    pub telegram_account: String,
    pub wax_account: String,
    pub chat_id: String,
}

impl RegisterUserRequest {
    /// Trim fields and check them against the column limits
    pub fn validate(self) -> Result<Self, String> {
        let name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        let telegram_account = self.telegram_account.trim().trim_start_matches('@').to_string();
        let wax_account = self.wax_account.trim().to_string();
        let chat_id = self.chat_id.trim().to_string();

        if let Some(name) = &name {
            if name.chars().count() > MAX_NAME_LENGTH {
                return Err(format!("name must be at most {} characters", MAX_NAME_LENGTH));
            }
        }

        if telegram_account.is_empty() || telegram_account.chars().count() > MAX_TELEGRAM_ACCOUNT_LENGTH {
            return Err(format!(
                "telegram_account must be 1 to {} characters",
                MAX_TELEGRAM_ACCOUNT_LENGTH
            ));
        }

        if !is_valid_wax_account(&wax_account) {
            return Err(format!("invalid WAX account name: {}", wax_account));
        }

        if chat_id.is_empty() || chat_id.len() > MAX_CHAT_ID_LENGTH {
            return Err(format!("chat_id must be 1 to {} characters", MAX_CHAT_ID_LENGTH));
        }

        Ok(Self {
            name,
            telegram_account,
            wax_account,
            chat_id,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub uuid: Uuid,
    pub name: Option<String>,
    pub telegram_account: String,
    pub wax_account: String,
    pub chat_id: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl From<users::Model> for UserResponse {
    fn from(user: users::Model) -> Self {
        Self {
            uuid: user.uuid,
            name: user.name,
            telegram_account: user.telegram_account,
            wax_account: user.wax_account,
            chat_id: user.chat_id,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}
