//! Typed wrappers around the G8 cloud API
//!
//! Each service borrows the [`Client`](crate::Client) and maps one API area
//! onto request and response types. Obtain them through the accessors on
//! the client, e.g. `client.machines()`.

pub mod accounts;
pub mod cloudspaces;
pub mod disks;
pub mod external_networks;
pub mod forwarding;
pub mod images;
pub mod ipsec;
pub mod locations;
pub mod machines;
pub mod sizes;

pub use accounts::{AccountAcl, AccountInfo, Accounts};
pub use cloudspaces::{
    CloudSpace, CloudSpaceConfig, CloudSpaceDeleteConfig, CloudSpaceInfo, CloudSpaces,
    ResourceLimits,
};
pub use disks::{
    DiskAttachConfig, DiskConfig, DiskDeleteConfig, DiskExposeConfig, DiskExposeInfo, DiskInfo,
    DiskSummary, Disks, IoTune, NbdEndpoint,
};
pub use external_networks::{ExternalNetworkInfo, ExternalNetworks};
pub use forwarding::{Forwarding, PortForward, PortForwardingConfig};
pub use images::{ImageConfig, ImageInfo, Images};
pub use ipsec::{Ipsec, IpsecConfig, IpsecTunnel};
pub use locations::{LocationInfo, Locations};
pub use machines::{
    Acl, EmptyMachineConfig, Machine, MachineConfig, MachineDisk, MachineInfo, Machines, Nic,
    UserAccount,
};
pub use sizes::{Size, Sizes};

use crate::error::{OvcError, Result};
use serde_json::Value;

/// Read a numeric id from a task result, either a JSON number or a string
pub(crate) fn parse_id(body: &[u8]) -> Result<i64> {
    let value: Value = serde_json::from_slice(body)?;
    let id = match &value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    id.ok_or_else(|| OvcError::UnexpectedResponse(format!("expected an id, got {}", value)))
}

/// Task result as text, the way update style calls report it
pub(crate) fn result_text(body: &[u8]) -> String {
    String::from_utf8_lossy(body).into_owned()
}
