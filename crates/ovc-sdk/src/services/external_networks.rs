//! External networks public IPs are taken from

use crate::client::{Client, ResponseTimeout};
use crate::error::{OvcError, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExternalNetworkInfo {
    pub id: i64,
    pub name: String,
    pub account_id: i64,
    pub network: String,
    pub gateway: String,
    #[serde(rename = "subnetmask")]
    pub subnet_mask: String,
    pub dhcp: bool,
}

/// External network endpoints
pub struct ExternalNetworks<'a> {
    client: &'a Client,
}

impl Client {
    pub fn external_networks(&self) -> ExternalNetworks<'_> {
        ExternalNetworks { client: self }
    }
}

impl ExternalNetworks<'_> {
    pub async fn get(&self, id: i64) -> Result<ExternalNetworkInfo> {
        self.client
            .post_json(
                "/cloudapi/externalnetwork/get",
                &json!({ "id": id }),
                ResponseTimeout::Model,
            )
            .await
    }

    /// External networks usable by an account
    pub async fn list(&self, account_id: i64) -> Result<Vec<ExternalNetworkInfo>> {
        self.client
            .post_json(
                "/cloudapi/externalnetwork/list",
                &json!({ "accountId": account_id }),
                ResponseTimeout::Model,
            )
            .await
    }

    pub async fn get_by_name(&self, name: &str, account_id: i64) -> Result<ExternalNetworkInfo> {
        let networks = self.list(account_id).await?;
        match networks.iter().find(|n| n.name == name) {
            Some(network) => self.get(network.id).await,
            None => Err(OvcError::NotFound(format!(
                "External Network {} not found",
                name
            ))),
        }
    }
}
