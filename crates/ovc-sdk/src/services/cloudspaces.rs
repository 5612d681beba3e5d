//! Cloud spaces: private networks with their own virtual router

use super::accounts::AccountAcl;
use super::machines::Acl;
use super::parse_id;
use crate::client::{Client, ResponseTimeout};
use crate::error::{OvcError, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Settings for creating or updating a cloud space
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudSpaceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloudspace_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Owner of the cloud space, `<username>@itsyouonline`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_memory_capacity: Option<f64>,
    #[serde(rename = "maxCPUCapacity", skip_serializing_if = "Option::is_none")]
    pub max_cpu_capacity: Option<i64>,
    #[serde(rename = "maxVDiskCapacity", skip_serializing_if = "Option::is_none")]
    pub max_disk_capacity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_network_peer_transfer: Option<i64>,
    #[serde(rename = "maxNumPublicIP", skip_serializing_if = "Option::is_none")]
    pub max_num_public_ip: Option<i64>,
    #[serde(rename = "allowedVMSizes", skip_serializing_if = "Vec::is_empty")]
    pub allowed_vm_sizes: Vec<i64>,
    #[serde(rename = "privatenetwork", skip_serializing_if = "Option::is_none")]
    pub private_network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub cloudspace_type: Option<String>,
    #[serde(rename = "externalnetworkId", skip_serializing_if = "Option::is_none")]
    pub external_network_id: Option<i64>,
}

/// Resource limits of a cloud space; `-1` means unlimited
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    #[serde(rename = "CU_M")]
    pub memory: f64,
    #[serde(rename = "CU_D")]
    pub disk: i64,
    #[serde(rename = "CU_NP")]
    pub network_peer_transfer: i64,
    #[serde(rename = "CU_I")]
    pub public_ips: i64,
    #[serde(rename = "CU_C")]
    pub cpus: i64,
}

/// Full details of one cloud space
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CloudSpace {
    pub id: i64,
    pub account_id: i64,
    pub name: String,
    pub status: String,
    pub update_time: i64,
    pub creation_time: i64,
    #[serde(rename = "externalnetworkip")]
    pub external_network_ip: String,
    pub description: String,
    pub resource_limits: ResourceLimits,
    pub acl: Vec<Acl>,
    pub secret: String,
    #[serde(rename = "gid")]
    pub grid_id: i64,
    pub location: String,
    #[serde(rename = "publicipaddress")]
    pub public_ip_address: String,
    #[serde(rename = "privatenetwork")]
    pub private_network: String,
    #[serde(rename = "type")]
    pub cloudspace_type: String,
    pub mode: String,
}

/// Cloud space as returned by the list call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CloudSpaceInfo {
    pub id: i64,
    pub account_id: i64,
    pub account_name: String,
    pub name: String,
    pub status: String,
    pub update_time: i64,
    pub creation_time: i64,
    #[serde(rename = "externalnetworkip")]
    pub external_network_ip: String,
    pub descr: String,
    pub acl: Vec<Acl>,
    pub account_acl: AccountAcl,
    #[serde(rename = "gid")]
    pub grid_id: i64,
    pub location: String,
    pub mode: String,
    #[serde(rename = "type")]
    pub cloudspace_type: String,
    #[serde(rename = "publicipaddress")]
    pub public_ip_address: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudSpaceDeleteConfig {
    pub cloudspace_id: i64,
    pub permanently: bool,
}

/// Cloud space endpoints
pub struct CloudSpaces<'a> {
    client: &'a Client,
}

impl Client {
    pub fn cloudspaces(&self) -> CloudSpaces<'_> {
        CloudSpaces { client: self }
    }
}

impl CloudSpaces<'_> {
    /// Cloud spaces visible to the caller, deleted ones excluded
    pub async fn list(&self) -> Result<Vec<CloudSpaceInfo>> {
        self.client
            .post_json(
                "/cloudapi/cloudspaces/list",
                &json!({ "includedeleted": false }),
                ResponseTimeout::Model,
            )
            .await
    }

    pub async fn get(&self, id: i64) -> Result<CloudSpace> {
        self.client
            .post_json(
                "/cloudapi/cloudspaces/get",
                &json!({ "cloudspaceId": id }),
                ResponseTimeout::Model,
            )
            .await
    }

    pub async fn get_by_name_and_account(&self, name: &str, account: &str) -> Result<CloudSpace> {
        let cloudspaces = self.list().await?;
        match cloudspaces
            .iter()
            .find(|cs| cs.account_name == account && cs.name == name)
        {
            Some(cloudspace) => self.get(cloudspace.id).await,
            None => Err(OvcError::NotFound(format!(
                "Cloud space {} not found in account {}",
                name, account
            ))),
        }
    }

    /// Create a cloud space, returning its id
    pub async fn create(&self, config: &CloudSpaceConfig) -> Result<i64> {
        let body = self
            .client
            .post(
                "/cloudapi/cloudspaces/create",
                config,
                ResponseTimeout::Operational,
            )
            .await?;
        parse_id(&body)
    }

    pub async fn update(&self, config: &CloudSpaceConfig) -> Result<()> {
        self.client
            .post(
                "/cloudapi/cloudspaces/update",
                config,
                ResponseTimeout::Model,
            )
            .await?;
        Ok(())
    }

    pub async fn delete(&self, config: &CloudSpaceDeleteConfig) -> Result<()> {
        self.client
            .post(
                "/cloudapi/cloudspaces/delete",
                config,
                ResponseTimeout::Operational,
            )
            .await?;
        Ok(())
    }

    /// Route the cloud space's traffic through `gateway`
    pub async fn set_default_gateway(&self, id: i64, gateway: &str) -> Result<()> {
        self.client
            .post(
                "/cloudapi/cloudspaces/setDefaultGateway",
                &json!({ "cloudspaceId": id, "gateway": gateway }),
                ResponseTimeout::Operational,
            )
            .await?;
        Ok(())
    }
}
