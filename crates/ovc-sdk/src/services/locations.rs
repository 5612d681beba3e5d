//! Locations served by the G8

use crate::client::{Client, ResponseTimeout};
use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationInfo {
    pub id: i64,
    pub name: String,
    pub guid: i64,
    #[serde(rename = "gid")]
    pub grid_id: i64,
    #[serde(rename = "locationCode")]
    pub code: String,
    pub flag: String,
}

/// Location endpoints
pub struct Locations<'a> {
    client: &'a Client,
}

impl Client {
    pub fn locations(&self) -> Locations<'_> {
        Locations { client: self }
    }
}

impl Locations<'_> {
    pub async fn list(&self) -> Result<Vec<LocationInfo>> {
        let body = self
            .client
            .post_raw("/cloudapi/locations/list", None, ResponseTimeout::Model)
            .await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
