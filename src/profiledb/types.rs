//! Profile/device domain types and the lookup-error vocabulary.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

pub type ProfileId = String;
pub type DeviceId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockingMode {
    Default,
    NullIp,
    Nxdomain,
    CustomIp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    pub filtering_group: String,
    pub device_ids: Vec<DeviceId>,
    pub blocking_mode: BlockingMode,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub linked_ip: Option<IpAddr>,
    pub dedicated_ips: Vec<IpAddr>,
    /// Lowercased human-readable ID, unique per profile.
    pub human_id: Option<String>,
    pub deleted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupError {
    DeviceNotFound,
    ProfileNotFound,
}

impl std::fmt::Display for LookupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeviceNotFound => write!(f, "device not found"),
            Self::ProfileNotFound => write!(f, "profile not found"),
        }
    }
}

impl std::error::Error for LookupError {}
