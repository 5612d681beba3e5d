//! Accounts

use crate::client::{Client, ResponseTimeout};
use crate::error::{OvcError, Result};
use serde::{Deserialize, Serialize};

/// Access rule on an account
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccountAcl {
    pub status: String,
    pub right: String,
    pub explicit: bool,
    pub user_group_id: String,
    pub guid: String,
    #[serde(rename = "type")]
    pub acl_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccountInfo {
    pub id: i64,
    pub name: String,
    pub update_time: i64,
    pub creation_time: i64,
    pub acl: Vec<AccountAcl>,
}

/// Account endpoints
pub struct Accounts<'a> {
    client: &'a Client,
}

impl Client {
    pub fn accounts(&self) -> Accounts<'_> {
        Accounts { client: self }
    }
}

impl Accounts<'_> {
    pub async fn list(&self) -> Result<Vec<AccountInfo>> {
        let body = self
            .client
            .post_raw("/cloudapi/accounts/list", None, ResponseTimeout::Model)
            .await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn get_id_by_name(&self, name: &str) -> Result<i64> {
        self.list()
            .await?
            .into_iter()
            .find(|account| account.name == name)
            .map(|account| account.id)
            .ok_or_else(|| OvcError::NotFound(format!("Account {} not found", name)))
    }
}
