//! Operator accounts allowed to publish and edit articles.

use serde::{Deserialize, Serialize};

/// Configured account, with the password stored as a keyed digest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OperatorAccount {
    pub id: u32,
    pub username: String,
    pub password_hash: String,
}

/// Authenticated operator attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operator {
    pub id: u32,
    pub username: String,
}

impl From<&OperatorAccount> for Operator {
    fn from(account: &OperatorAccount) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
        }
    }
}
