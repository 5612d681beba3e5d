//! IPsec tunnels between a cloud space and a remote network

use crate::client::{Client, ResponseTimeout};
use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpsecConfig {
    pub cloudspace_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_public_addr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_private_network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub psk_secret: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpsecTunnel {
    #[serde(rename = "remoteAddr")]
    pub remote_addr: String,
    #[serde(rename = "remoteprivatenetwork")]
    pub remote_private_network: String,
    pub psk: String,
}

/// IPsec endpoints
pub struct Ipsec<'a> {
    client: &'a Client,
}

impl Client {
    pub fn ipsec(&self) -> Ipsec<'_> {
        Ipsec { client: self }
    }
}

impl Ipsec<'_> {
    /// Open a tunnel, returning the pre-shared key the G8 settled on
    pub async fn create(&self, config: &IpsecConfig) -> Result<String> {
        self.client
            .post_json(
                "/cloudapi/ipsec/addTunnelToCloudspace",
                config,
                ResponseTimeout::Operational,
            )
            .await
    }

    /// Tunnels of `config.cloudspace_id`
    pub async fn list(&self, config: &IpsecConfig) -> Result<Vec<IpsecTunnel>> {
        self.client
            .post_json(
                "/cloudapi/ipsec/listTunnels",
                config,
                ResponseTimeout::Model,
            )
            .await
    }

    pub async fn delete(&self, config: &IpsecConfig) -> Result<()> {
        self.client
            .post(
                "/cloudapi/ipsec/removeTunnelFromCloudspace",
                config,
                ResponseTimeout::Operational,
            )
            .await?;
        Ok(())
    }
}
