//! Data and boot disks
//!
//! Attaching and detaching change a machine's device list, so those calls
//! hold the machine's lock from [`Client::lock_resource`] for their whole
//! duration.

use super::parse_id;
use crate::client::{Client, ResponseTimeout};
use crate::error::{OvcError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Settings for creating, attaching, resizing or limiting a disk
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_id: Option<i64>,
    #[serde(rename = "gid", skip_serializing_if = "Option::is_none")]
    pub grid_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Size in GB
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub disk_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssd_size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iops: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_id: Option<i64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub detach: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub permanently: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskDeleteConfig {
    pub disk_id: i64,
    pub detach: bool,
    pub permanently: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskAttachConfig {
    pub disk_id: i64,
    pub machine_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IoTune {
    pub total_iops_sec: i64,
}

/// Full details of one disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiskInfo {
    pub id: i64,
    pub name: String,
    pub account_id: i64,
    #[serde(rename = "gid")]
    pub grid_id: i64,
    pub reference_id: String,
    pub disk_path: String,
    pub images: Vec<Value>,
    pub guid: i64,
    #[serde(rename = "pci_bus")]
    pub pci_bus: i64,
    #[serde(rename = "pci_slot")]
    pub pci_slot: i64,
    pub size_used: i64,
    pub size_max: i64,
    pub descr: String,
    pub role: String,
    pub params: String,
    #[serde(rename = "type")]
    pub disk_type: String,
    pub status: String,
    pub reality_device_number: i64,
    pub passwd: String,
    pub iotune: IoTune,
    pub iqn: String,
    pub boot_partition: i64,
    pub login: String,
    pub order: i64,
}

/// Disk as returned by the list call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiskSummary {
    pub id: i64,
    pub name: String,
    pub account_id: i64,
    pub username: Value,
    pub status: String,
    pub description: String,
    #[serde(rename = "sizeMax")]
    pub size: i64,
    #[serde(rename = "type")]
    pub disk_type: String,
}

/// Request to expose a disk over NBD through a cloud space
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskExposeConfig {
    pub disk_id: i64,
    pub cloudspace_id: i64,
    pub iops: i64,
}

/// Network Block Device endpoint of an exposed disk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NbdEndpoint {
    pub address: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub psk: String,
}

/// Where an exposed disk can be reached, keyed by storage protocol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "protocol", content = "endpoint", rename_all = "lowercase")]
pub enum DiskExposeInfo {
    Nbd(NbdEndpoint),
}

impl DiskExposeInfo {
    pub fn protocol(&self) -> &'static str {
        match self {
            DiskExposeInfo::Nbd(_) => "nbd",
        }
    }
}

/// Disk endpoints
pub struct Disks<'a> {
    client: &'a Client,
}

impl Client {
    pub fn disks(&self) -> Disks<'_> {
        Disks { client: self }
    }
}

impl Disks<'_> {
    /// Disks of an account, optionally only those of `disk_type` (`B` or `D`)
    pub async fn list(&self, account_id: i64, disk_type: Option<&str>) -> Result<Vec<DiskSummary>> {
        let mut body = json!({ "accountId": account_id });
        if let Some(disk_type) = disk_type.filter(|t| !t.is_empty()) {
            body["type"] = json!(disk_type);
        }
        self.client
            .post_json("/cloudapi/disks/list", &body, ResponseTimeout::Operational)
            .await
    }

    pub async fn get(&self, id: i64) -> Result<DiskInfo> {
        self.client
            .post_json(
                "/cloudapi/disks/get",
                &json!({ "diskId": id }),
                ResponseTimeout::Model,
            )
            .await
    }

    pub async fn get_by_name(
        &self,
        name: &str,
        account_id: i64,
        disk_type: Option<&str>,
    ) -> Result<DiskInfo> {
        let disks = self.list(account_id, disk_type).await?;
        match disks.iter().find(|d| d.name == name) {
            Some(disk) => self.get(disk.id).await,
            None => Err(OvcError::NotFound(format!("Disk {} not found", name))),
        }
    }

    /// Create a detached disk, returning its id
    pub async fn create(&self, config: &DiskConfig) -> Result<i64> {
        let body = self
            .client
            .post("/cloudapi/disks/create", config, ResponseTimeout::Operational)
            .await?;
        parse_id(&body)
    }

    /// Create a disk on `config.machine_id` and attach it, returning its id
    pub async fn create_and_attach(&self, config: &DiskConfig) -> Result<i64> {
        let machine_id = config.machine_id.ok_or_else(|| {
            OvcError::InvalidConfig("machineId is required to attach a new disk".to_string())
        })?;

        let _guard = self.client.lock_resource(machine_id).await;
        let body = self
            .client
            .post(
                "/cloudapi/machines/addDisk",
                config,
                ResponseTimeout::Operational,
            )
            .await?;
        parse_id(&body)
    }

    pub async fn attach(&self, config: &DiskAttachConfig) -> Result<()> {
        let _guard = self.client.lock_resource(config.machine_id).await;
        self.client
            .post(
                "/cloudapi/machines/attachDisk",
                config,
                ResponseTimeout::Operational,
            )
            .await?;
        Ok(())
    }

    pub async fn detach(&self, config: &DiskAttachConfig) -> Result<()> {
        tracing::debug!(
            "Detaching disk {} from machine {}",
            config.disk_id,
            config.machine_id
        );
        let _guard = self.client.lock_resource(config.machine_id).await;
        let result = self
            .client
            .post(
                "/cloudapi/machines/detachDisk",
                config,
                ResponseTimeout::Operational,
            )
            .await;
        match &result {
            Ok(_) => tracing::debug!(
                "Detaching disk {} from machine {} completed",
                config.disk_id,
                config.machine_id
            ),
            Err(e) => tracing::debug!(
                "Detaching disk {} from machine {} failed: {}",
                config.disk_id,
                config.machine_id,
                e
            ),
        }
        result.map(|_| ())
    }

    /// Apply a new size and IO limit
    ///
    /// A size change is followed by a limitIO call so the IO limit is
    /// reapplied to the resized disk. Without a size only the IO limit is
    /// set, and without either nothing is sent.
    pub async fn update(&self, config: &DiskConfig) -> Result<()> {
        if config.size.is_some() {
            self.resize(config).await?;
        } else if config.iops.is_none() {
            return Ok(());
        }
        self.client
            .post(
                "/cloudapi/disks/limitIO",
                config,
                ResponseTimeout::Operational,
            )
            .await?;
        Ok(())
    }

    /// Grow a disk; disks cannot shrink
    pub async fn resize(&self, config: &DiskConfig) -> Result<()> {
        self.client
            .post("/cloudapi/disks/resize", config, ResponseTimeout::Operational)
            .await?;
        Ok(())
    }

    pub async fn delete(&self, config: &DiskDeleteConfig) -> Result<()> {
        self.client
            .post("/cloudapi/disks/delete", config, ResponseTimeout::Operational)
            .await?;
        Ok(())
    }

    /// Expose a disk through a cloud space
    ///
    /// Fails with a JSON error when the G8 answers with a protocol other
    /// than NBD.
    pub async fn expose(&self, config: &DiskExposeConfig) -> Result<DiskExposeInfo> {
        self.client
            .post_json("/cloudapi/disks/expose", config, ResponseTimeout::Operational)
            .await
    }

    /// Stop exposing a disk; the G8 rejects disks that are not exposed
    pub async fn unexpose(&self, disk_id: i64) -> Result<()> {
        self.client
            .post(
                "/cloudapi/disks/unexpose",
                &json!({ "diskId": disk_id }),
                ResponseTimeout::Operational,
            )
            .await?;
        Ok(())
    }
}
