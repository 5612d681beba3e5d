//! Virtual machines

use super::{parse_id, result_text};
use crate::client::{Client, ResponseTimeout};
use crate::error::{OvcError, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Network interface of a machine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Nic {
    pub status: String,
    pub mac_address: String,
    pub reference_id: String,
    pub device_name: String,
    #[serde(rename = "type")]
    pub nic_type: String,
    pub params: String,
    pub network_id: i64,
    pub guid: String,
    pub ip_address: String,
}

/// Machine as returned by the list call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Machine {
    pub id: i64,
    pub name: String,
    pub status: String,
    pub stack_id: i64,
    pub update_time: i64,
    pub creation_time: i64,
    pub reference_id: String,
    pub nics: Vec<Nic>,
    pub size_id: i64,
    pub disks: Vec<i64>,
    pub image_id: i64,
    pub storage: i64,
    pub vcpus: i64,
    pub memory: i64,
}

/// Settings for creating, updating or resizing a machine
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloudspace_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcpus: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_id: Option<i64>,
    #[serde(rename = "disksize", skip_serializing_if = "Option::is_none")]
    pub disk_size: Option<i64>,
    /// Sizes of extra data disks in GB
    #[serde(rename = "datadisks", skip_serializing_if = "Vec::is_empty")]
    pub data_disks: Vec<i64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub permanently: bool,
    #[serde(rename = "userdata", skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
}

/// Settings for a machine that is not created from an image
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmptyMachineConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloudspace_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcpus: Option<i64>,
    #[serde(rename = "disksize", skip_serializing_if = "Option::is_none")]
    pub disk_size: Option<i64>,
    #[serde(rename = "datadisks", skip_serializing_if = "Vec::is_empty")]
    pub data_disks: Vec<i64>,
    #[serde(rename = "userdata", skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
}

/// Access rule on a machine or cloud space
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Acl {
    pub status: String,
    pub can_be_deleted: bool,
    pub right: String,
    #[serde(rename = "type")]
    pub acl_type: String,
    pub user_group_id: String,
}

/// Disk as listed in a machine's details
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MachineDisk {
    pub id: i64,
    pub name: String,
    pub status: String,
    pub size_max: i64,
    pub descr: String,
    #[serde(rename = "type")]
    pub disk_type: String,
}

/// Login created on the machine's OS image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserAccount {
    pub guid: String,
    pub login: String,
    pub password: String,
}

/// Full details of one machine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineInfo {
    pub id: i64,
    pub name: String,
    #[serde(rename = "cloudspaceid")]
    pub cloudspace_id: i64,
    pub status: String,
    #[serde(rename = "updateTime")]
    pub update_time: i64,
    #[serde(rename = "creationTime")]
    pub creation_time: i64,
    pub hostname: String,
    pub locked: bool,
    #[serde(rename = "sizeid")]
    pub size_id: i64,
    pub disks: Vec<MachineDisk>,
    pub storage: i64,
    pub acl: Vec<Acl>,
    #[serde(rename = "osImage")]
    pub os_image: String,
    pub accounts: Vec<UserAccount>,
    pub interfaces: Vec<Nic>,
    #[serde(rename = "imageid")]
    pub image_id: i64,
    pub memory: i64,
    pub vcpus: i64,
    pub description: Option<String>,
}

/// Machine endpoints
pub struct Machines<'a> {
    client: &'a Client,
}

impl Client {
    pub fn machines(&self) -> Machines<'_> {
        Machines { client: self }
    }
}

impl Machines<'_> {
    /// Machines in a cloud space
    pub async fn list(&self, cloudspace_id: i64) -> Result<Vec<Machine>> {
        self.client
            .post_json(
                "/cloudapi/machines/list",
                &json!({ "cloudspaceId": cloudspace_id }),
                ResponseTimeout::Model,
            )
            .await
    }

    /// Machine details, serialized with other work on the same machine
    pub async fn get(&self, id: i64) -> Result<MachineInfo> {
        let _guard = self.client.lock_resource(id).await;
        self.client
            .post_json(
                "/cloudapi/machines/get",
                &json!({ "machineId": id }),
                ResponseTimeout::Operational,
            )
            .await
    }

    pub async fn get_by_name(&self, name: &str, cloudspace_id: i64) -> Result<MachineInfo> {
        let machines = self.list(cloudspace_id).await?;
        match machines.iter().find(|m| m.name == name) {
            Some(machine) => self.get(machine.id).await,
            None => Err(OvcError::NotFound(format!("Machine {} not found", name))),
        }
    }

    pub async fn get_by_reference_id(&self, reference_id: &str) -> Result<MachineInfo> {
        let body = self
            .client
            .post(
                "/cloudapi/machines/getByReferenceId",
                &json!({ "referenceId": reference_id }),
                ResponseTimeout::Operational,
            )
            .await?;
        self.get(parse_id(&body)?).await
    }

    /// Create a machine from an image, returning its id
    pub async fn create(&self, config: &MachineConfig) -> Result<i64> {
        let body = self
            .client
            .post(
                "/cloudapi/machines/create",
                config,
                ResponseTimeout::Operational,
            )
            .await?;
        parse_id(&body)
    }

    /// Create a machine without an image, returning its id
    pub async fn create_empty(&self, config: &EmptyMachineConfig) -> Result<i64> {
        let body = self
            .client
            .post(
                "/cloudapi/machines/createEmptyMachine",
                config,
                ResponseTimeout::Model,
            )
            .await?;
        parse_id(&body)
    }

    pub async fn update(&self, config: &MachineConfig) -> Result<String> {
        let body = self
            .client
            .post("/cloudapi/machines/update", config, ResponseTimeout::Model)
            .await?;
        Ok(result_text(&body))
    }

    pub async fn resize(&self, config: &MachineConfig) -> Result<String> {
        let body = self
            .client
            .post(
                "/cloudapi/machines/resize",
                config,
                ResponseTimeout::Operational,
            )
            .await?;
        Ok(result_text(&body))
    }

    pub async fn delete(&self, id: i64, permanently: bool) -> Result<()> {
        self.client
            .post(
                "/cloudapi/machines/delete",
                &json!({ "machineId": id, "permanently": permanently }),
                ResponseTimeout::Operational,
            )
            .await?;
        Ok(())
    }

    /// Stop a machine, pulling the plug when `force` is set
    pub async fn stop(&self, id: i64, force: bool) -> Result<()> {
        self.client
            .post(
                "/cloudapi/machines/stop",
                &json!({ "machineId": id, "force": force }),
                ResponseTimeout::Operational,
            )
            .await?;
        Ok(())
    }

    /// Graceful stop
    pub async fn shutdown(&self, id: i64) -> Result<()> {
        self.stop(id, false).await
    }

    /// Start a machine, booting from `boot_disk_id` (an ISO disk) when given
    pub async fn start(&self, id: i64, boot_disk_id: Option<i64>) -> Result<()> {
        let mut body = json!({ "machineId": id });
        if let Some(disk_id) = boot_disk_id {
            body["diskId"] = json!(disk_id);
        }
        self.client
            .post(
                "/cloudapi/machines/start",
                &body,
                ResponseTimeout::Operational,
            )
            .await?;
        Ok(())
    }

    /// Save the machine's boot disk as an image named `name`
    pub async fn create_image(&self, id: i64, name: &str) -> Result<()> {
        self.client
            .post(
                "/cloudapi/machines/createTemplate",
                &json!({ "machineId": id, "templateName": name }),
                ResponseTimeout::Data,
            )
            .await?;
        Ok(())
    }

    /// Attach a public IP; the G8 picks the external network when none is given
    pub async fn add_external_ip(&self, id: i64, external_network_id: Option<i64>) -> Result<()> {
        let mut body = json!({ "machineId": id });
        if let Some(network_id) = external_network_id {
            body["externalNetworkId"] = json!(network_id);
        }
        self.client
            .post(
                "/cloudapi/machines/attachExternalNetwork",
                &body,
                ResponseTimeout::Operational,
            )
            .await?;
        Ok(())
    }

    /// Detach a public IP
    ///
    /// `ip` narrows the detach to one address and is only sent together
    /// with an external network id.
    pub async fn delete_external_ip(
        &self,
        id: i64,
        external_network_id: Option<i64>,
        ip: Option<&str>,
    ) -> Result<()> {
        let mut body = json!({ "machineId": id });
        if let Some(network_id) = external_network_id {
            body["externalNetworkId"] = json!(network_id);
            if let Some(ip) = ip.filter(|ip| !ip.is_empty()) {
                body["externalnetworkip"] = json!(ip);
            }
        }
        self.client
            .post(
                "/cloudapi/machines/detachExternalNetwork",
                &body,
                ResponseTimeout::Operational,
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_machine_config_omits_unset_fields() {
        let config = MachineConfig {
            cloudspace_id: Some(3),
            name: Some("web-1".to_string()),
            size_id: Some(2),
            image_id: Some(9),
            disk_size: Some(20),
            data_disks: vec![50],
            ..Default::default()
        };
        let encoded = serde_json::to_value(&config).unwrap();
        assert_eq!(
            encoded,
            json!({
                "cloudspaceId": 3,
                "name": "web-1",
                "sizeId": 2,
                "imageId": 9,
                "disksize": 20,
                "datadisks": [50],
            })
        );
    }

    #[test]
    fn test_machine_info_decodes_lowercase_keys() {
        let info: MachineInfo = serde_json::from_value(json!({
            "id": 12,
            "name": "web-1",
            "cloudspaceid": 3,
            "sizeid": 2,
            "imageid": 9,
            "osImage": "Ubuntu 18.04",
            "interfaces": [{"ipAddress": "192.168.103.254", "type": "bridge"}],
            "description": null,
            "unknownField": true
        }))
        .unwrap();
        assert_eq!(info.cloudspace_id, 3);
        assert_eq!(info.size_id, 2);
        assert_eq!(info.interfaces[0].ip_address, "192.168.103.254");
        assert_eq!(info.interfaces[0].nic_type, "bridge");
        assert_eq!(info.description, None);
        assert!(info.disks.is_empty());
    }

    #[test]
    fn test_empty_machine_config_encoding() {
        let config = EmptyMachineConfig {
            cloudspace_id: Some(3),
            name: Some("blank".to_string()),
            memory: Some(2048),
            vcpus: Some(2),
            disk_size: Some(10),
            ..Default::default()
        };
        let encoded: Value = serde_json::to_value(&config).unwrap();
        assert_eq!(encoded["disksize"], json!(10));
        assert!(encoded.get("datadisks").is_none());
    }
}
