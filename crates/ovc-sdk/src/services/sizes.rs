//! Machine sizes

use crate::client::{Client, ResponseTimeout};
use crate::error::{OvcError, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// CPU and memory combination a machine can be created with
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Size {
    pub id: i64,
    pub name: String,
    pub vcpus: i64,
    /// Memory in MiB
    pub memory: i64,
    /// Boot disk sizes allowed with this size, in GB
    pub disks: Vec<i64>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Size endpoints
pub struct Sizes<'a> {
    client: &'a Client,
}

impl Client {
    pub fn sizes(&self) -> Sizes<'_> {
        Sizes { client: self }
    }
}

impl Sizes<'_> {
    /// Sizes allowed in a cloud space
    pub async fn list(&self, cloudspace_id: i64) -> Result<Vec<Size>> {
        self.client
            .post_json(
                "/cloudapi/sizes/list",
                &json!({ "cloudspaceId": cloudspace_id }),
                ResponseTimeout::Model,
            )
            .await
    }

    pub async fn get_by_vcpus_and_memory(
        &self,
        vcpus: i64,
        memory: i64,
        cloudspace_id: i64,
    ) -> Result<Size> {
        self.list(cloudspace_id)
            .await?
            .into_iter()
            .find(|size| size.vcpus == vcpus && size.memory == memory)
            .ok_or_else(|| {
                OvcError::NotFound(format!(
                    "No size with {} vcpus and {} MiB memory",
                    vcpus, memory
                ))
            })
    }
}
