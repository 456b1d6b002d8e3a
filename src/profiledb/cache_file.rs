//! Filesystem cache for the profile/device indices.
//!
//! The on-disk format is a `bincode`-encoded envelope rather than the
//! protobuf the `.pb` extension convention originally implied (no
//! protobuf toolchain is part of this crate's stack); the extension and
//! "treat a version mismatch as an empty cache" contract are preserved.

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::app::AppError;
use crate::profiledb::types::{Device, Profile};

const CACHE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEnvelope {
    version: u32,
    sync_time_unix_secs: u64,
    profiles: Vec<Profile>,
    devices: Vec<Device>,
}

pub struct LoadedCache {
    pub sync_time: SystemTime,
    pub profiles: Vec<Profile>,
    pub devices: Vec<Device>,
}

/// Read the cache at `path`. A version mismatch, corrupt payload, or
/// zero profiles is treated as "no cache" rather than an error.
pub fn load(path: &Path) -> Option<LoadedCache> {
    let bytes = std::fs::read(path).ok()?;
    let envelope: CacheEnvelope = match bincode::deserialize(&bytes) {
        Ok(env) => env,
        Err(e) => {
            log::warn!("profile-db cache at {} is unreadable: {e}", path.display());
            return None;
        }
    };

    if envelope.version != CACHE_VERSION {
        log::warn!(
            "profile-db cache at {} has version {}, expected {CACHE_VERSION}; ignoring",
            path.display(),
            envelope.version
        );
        return None;
    }
    if envelope.profiles.is_empty() {
        return None;
    }

    Some(LoadedCache {
        sync_time: UNIX_EPOCH + Duration::from_secs(envelope.sync_time_unix_secs),
        profiles: envelope.profiles,
        devices: envelope.devices,
    })
}

pub fn store(path: &Path, sync_time: SystemTime, profiles: &[Profile], devices: &[Device]) -> Result<(), AppError> {
    let sync_time_unix_secs = sync_time.duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO).as_secs();
    let envelope = CacheEnvelope {
        version: CACHE_VERSION,
        sync_time_unix_secs,
        profiles: profiles.to_vec(),
        devices: devices.to_vec(),
    };
    let bytes = bincode::serialize(&envelope)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiledb::types::BlockingMode;

    fn sample_profile() -> Profile {
        Profile {
            id: "p1".to_string(),
            filtering_group: "default".to_string(),
            device_ids: vec!["d1".to_string()],
            blocking_mode: BlockingMode::NullIp,
            deleted: false,
        }
    }

    #[test]
    fn round_trips_through_a_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.pb");
        let now = SystemTime::now();
        store(&path, now, &[sample_profile()], &[]).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.profiles.len(), 1);
        assert_eq!(loaded.profiles[0].id, "p1");
    }

    #[test]
    fn version_mismatch_is_treated_as_no_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.pb");
        let stale = CacheEnvelope {
            version: CACHE_VERSION + 1,
            sync_time_unix_secs: 0,
            profiles: vec![sample_profile()],
            devices: vec![],
        };
        std::fs::write(&path, bincode::serialize(&stale).unwrap()).unwrap();
        assert!(load(&path).is_none());
    }

    #[test]
    fn missing_file_is_treated_as_no_cache() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("missing.pb")).is_none());
    }
}
