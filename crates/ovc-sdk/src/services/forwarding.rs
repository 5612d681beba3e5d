//! Port forwards from a cloud space's public IP to its machines

use crate::client::{Client, ResponseTimeout};
use crate::error::{OvcError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::ops::Range;

/// Public ports picked when a forward is created without one
pub const RANDOM_PUBLIC_PORTS: Range<i64> = 2000..42000;

const RANDOM_PORT_TRIES: usize = 1000;

/// Selection and settings of a port forward
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortForwardingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloudspace_id: Option<i64>,
    #[serde(rename = "sourcePublicIp", skip_serializing_if = "Option::is_none")]
    pub source_public_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_public_port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_protocol: Option<String>,
    #[serde(rename = "publicIp", skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

/// Existing port forward; the G8 reports ports as strings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PortForward {
    pub id: i64,
    pub protocol: String,
    pub local_port: String,
    pub local_ip: String,
    pub machine_id: i64,
    pub machine_name: String,
    pub public_ip: String,
    pub public_port: String,
}

impl PortForward {
    fn has_public_port(&self, port: i64) -> bool {
        self.public_port.trim().parse::<i64>().ok() == Some(port)
    }
}

/// Port forwarding endpoints
pub struct Forwarding<'a> {
    client: &'a Client,
}

impl Client {
    pub fn forwarding(&self) -> Forwarding<'_> {
        Forwarding { client: self }
    }
}

impl Forwarding<'_> {
    /// Forwards matching `config`, typically all of one cloud space
    pub async fn list(&self, config: &PortForwardingConfig) -> Result<Vec<PortForward>> {
        self.client
            .post_json(
                "/cloudapi/portforwarding/list",
                config,
                ResponseTimeout::Model,
            )
            .await
    }

    /// The forward on `config.public_port`
    pub async fn get(&self, config: &PortForwardingConfig) -> Result<PortForward> {
        let port = config.public_port.unwrap_or_default();
        self.list(config)
            .await?
            .into_iter()
            .find(|forward| forward.has_public_port(port))
            .ok_or_else(|| {
                OvcError::NotFound(format!(
                    "Could not find a portforward with publicport {}",
                    port
                ))
            })
    }

    /// Create a forward and return its public port
    ///
    /// Without a public port in `config`, one that is not yet forwarded in
    /// the cloud space is picked from [`RANDOM_PUBLIC_PORTS`].
    pub async fn create(&self, config: &PortForwardingConfig) -> Result<i64> {
        let mut config = config.clone();
        let public_port = match config.public_port {
            Some(port) => port,
            None => {
                let port = self.free_public_port(config.cloudspace_id).await?;
                config.public_port = Some(port);
                port
            }
        };

        self.client
            .post(
                "/cloudapi/portforwarding/create",
                &config,
                ResponseTimeout::Operational,
            )
            .await?;
        Ok(public_port)
    }

    pub async fn update(&self, config: &PortForwardingConfig) -> Result<()> {
        self.client
            .post(
                "/cloudapi/portforwarding/updateByPort",
                config,
                ResponseTimeout::Operational,
            )
            .await?;
        Ok(())
    }

    pub async fn delete(&self, config: &PortForwardingConfig) -> Result<()> {
        self.client
            .post(
                "/cloudapi/portforwarding/deleteByPort",
                config,
                ResponseTimeout::Operational,
            )
            .await?;
        Ok(())
    }

    pub async fn delete_by_port(
        &self,
        public_port: i64,
        public_ip: &str,
        cloudspace_id: i64,
    ) -> Result<()> {
        self.client
            .post(
                "/cloudapi/portforwarding/deleteByPort",
                &json!({
                    "publicIp": public_ip,
                    "publicPort": public_port,
                    "cloudspaceId": cloudspace_id,
                }),
                ResponseTimeout::Operational,
            )
            .await?;
        Ok(())
    }

    async fn free_public_port(&self, cloudspace_id: Option<i64>) -> Result<i64> {
        let filter = PortForwardingConfig {
            cloudspace_id,
            ..Default::default()
        };
        // An unreadable list leaves the G8 to reject a taken port.
        let taken: HashSet<i64> = match self.list(&filter).await {
            Ok(forwards) => forwards
                .iter()
                .filter_map(|f| f.public_port.trim().parse().ok())
                .collect(),
            Err(e) => {
                tracing::warn!("Could not list port forwards to pick a free port: {}", e);
                HashSet::new()
            }
        };
        pick_free_port(&taken).ok_or_else(|| {
            OvcError::NotFound(format!(
                "no free public port in {}..{}",
                RANDOM_PUBLIC_PORTS.start, RANDOM_PUBLIC_PORTS.end
            ))
        })
    }
}

/// Random free port, falling back to the lowest free one
fn pick_free_port(taken: &HashSet<i64>) -> Option<i64> {
    let mut rng = rand::thread_rng();
    (0..RANDOM_PORT_TRIES)
        .map(|_| rng.gen_range(RANDOM_PUBLIC_PORTS))
        .find(|port| !taken.contains(port))
        .or_else(|| RANDOM_PUBLIC_PORTS.clone().find(|port| !taken.contains(port)))
}
