//! External profile storage collaborator, modeled as an async port.
//!
//! Grounded in the `BlockFilterEnginePort` shape used elsewhere in the
//! pack: hot-path lookups stay synchronous and in-memory (see
//! [`super::db::ProfileDb`]); only the refresh and device-creation paths
//! are async because they cross a network boundary.

use async_trait::async_trait;

use crate::error::app::{AppError, StorageError};
use crate::profiledb::types::{Device, DeviceId, Profile, ProfileId};

#[derive(Debug, Clone)]
pub struct DeviceChanges {
    /// `true` if `upserted`/`removed_ids` describe a delta rather than
    /// the profile's complete device set.
    pub is_partial: bool,
    pub upserted: Vec<Device>,
    pub removed_ids: Vec<DeviceId>,
}

#[derive(Debug, Clone)]
pub struct ProfileDelta {
    pub profile: Profile,
    pub device_changes: DeviceChanges,
}

#[derive(Debug, Clone)]
pub struct SyncResponse {
    pub sync_time: std::time::SystemTime,
    pub profiles: Vec<ProfileDelta>,
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// `since = None` requests a full sync; `Some(t)` requests the delta
    /// since `t`.
    async fn sync(&self, since: Option<std::time::SystemTime>) -> Result<SyncResponse, StorageError>;

    async fn create_auto_device(
        &self,
        profile_id: &ProfileId,
        human_id: &str,
        device_type: &str,
    ) -> Result<Device, AppError>;
}
