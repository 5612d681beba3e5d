//! OS images

use crate::client::{Client, ResponseTimeout};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Image to import from a URL
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageConfig {
    pub name: String,
    pub url: String,
    #[serde(rename = "gid")]
    pub grid_id: i64,
    #[serde(rename = "boottype")]
    pub boot_type: String,
    #[serde(rename = "imagetype")]
    pub image_type: String,
    pub username: String,
    pub password: String,
    #[serde(rename = "accountId")]
    pub account_id: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageInfo {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub size: i64,
    pub status: String,
    #[serde(rename = "type")]
    pub image_type: String,
    pub account_id: i64,
    pub username: String,
}

/// Image endpoints
pub struct Images<'a> {
    client: &'a Client,
}

impl Client {
    pub fn images(&self) -> Images<'_> {
        Images { client: self }
    }
}

impl Images<'_> {
    /// Import an image; waits up to a day for the download to finish
    pub async fn upload(&self, config: &ImageConfig) -> Result<()> {
        self.client
            .post(
                "/cloudbroker/image/createImage",
                config,
                ResponseTimeout::Data,
            )
            .await?;
        Ok(())
    }

    /// Permanently delete an account image
    pub async fn delete(&self, id: i64) -> Result<()> {
        self.client
            .post(
                "/cloudapi/images/delete",
                &json!({ "imageId": id, "permanently": true }),
                ResponseTimeout::Operational,
            )
            .await?;
        Ok(())
    }

    /// Permanently delete a system image, recording `reason`
    pub async fn delete_system_image(&self, id: i64, reason: &str) -> Result<()> {
        self.client
            .post(
                "/cloudbroker/image/delete",
                &json!({ "imageId": id, "reason": reason, "permanently": true }),
                ResponseTimeout::Operational,
            )
            .await?;
        Ok(())
    }

    /// Images available to an account
    pub async fn list(&self, account_id: i64) -> Result<Vec<ImageInfo>> {
        self.client
            .post_json(
                "/cloudapi/images/list",
                &json!({ "accountId": account_id }),
                ResponseTimeout::Model,
            )
            .await
    }
}
