//! In-memory multi-index profile/device database with scheduled refresh
//! and self-healing stale-entry cleanup.

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use tokio::sync::RwLock;

use crate::config::ProfileDbConfig;
use crate::error::app::AppError;
use crate::profiledb::cache_file;
use crate::profiledb::store::ProfileStore;
use crate::profiledb::types::{Device, DeviceId, LookupError, Profile, ProfileId};

#[derive(Default)]
struct Indices {
    profiles: HashMap<ProfileId, Profile>,
    devices: HashMap<DeviceId, Device>,
    device_to_profile: HashMap<DeviceId, ProfileId>,
    dedicated_ip_to_device: HashMap<IpAddr, DeviceId>,
    linked_ip_to_device: HashMap<IpAddr, DeviceId>,
    human_id_to_device: HashMap<(ProfileId, String), DeviceId>,
}

impl Indices {
    fn clear(&mut self) {
        *self = Indices::default();
    }

    fn index_device(&mut self, profile_id: &ProfileId, device: Device) {
        for ip in &device.dedicated_ips {
            self.dedicated_ip_to_device.insert(*ip, device.id.clone());
        }
        if let Some(ip) = device.linked_ip {
            self.linked_ip_to_device.insert(ip, device.id.clone());
        }
        if let Some(human_id) = &device.human_id {
            self.human_id_to_device.insert((profile_id.clone(), human_id.clone()), device.id.clone());
        }
        self.device_to_profile.insert(device.id.clone(), profile_id.clone());
        self.devices.insert(device.id.clone(), device);
    }

    fn remove_device(&mut self, device_id: &DeviceId) {
        if let Some(device) = self.devices.remove(device_id) {
            for ip in &device.dedicated_ips {
                self.dedicated_ip_to_device.remove(ip);
            }
            if let Some(ip) = device.linked_ip {
                self.linked_ip_to_device.remove(&ip);
            }
            if let Some(profile_id) = self.device_to_profile.remove(device_id) {
                if let Some(human_id) = &device.human_id {
                    self.human_id_to_device.remove(&(profile_id, human_id.clone()));
                }
            }
        }
    }

    fn remove_dedicated_ip(&mut self, ip: IpAddr) {
        self.dedicated_ip_to_device.remove(&ip);
    }

    fn remove_linked_ip(&mut self, ip: IpAddr) {
        self.linked_ip_to_device.remove(&ip);
    }

    fn remove_human_id(&mut self, key: (ProfileId, String)) {
        self.human_id_to_device.remove(&key);
    }
}

pub struct ProfileDb<S: ProfileStore> {
    store: Arc<S>,
    indices: Arc<RwLock<Indices>>,
    config: ProfileDbConfig,
    last_full_sync: tokio::sync::Mutex<Option<Instant>>,
    last_full_sync_error_at: tokio::sync::Mutex<Option<Instant>>,
    last_sync_time: tokio::sync::Mutex<Option<SystemTime>>,
}

impl<S: ProfileStore + 'static> ProfileDb<S> {
    pub fn new(store: Arc<S>, config: ProfileDbConfig) -> Self {
        let mut indices = Indices::default();
        if let Some(cache_path) = cache_path(&config) {
            if let Some(loaded) = cache_file::load(&cache_path) {
                for profile in loaded.profiles {
                    indices.profiles.insert(profile.id.clone(), profile);
                }
                for device in loaded.devices {
                    let Some(profile_id) = indices
                        .profiles
                        .values()
                        .find(|p| p.device_ids.contains(&device.id))
                        .map(|p| p.id.clone())
                    else {
                        continue;
                    };
                    indices.index_device(&profile_id, device);
                }
            }
        }

        Self {
            store,
            indices: Arc::new(RwLock::new(indices)),
            config,
            last_full_sync: tokio::sync::Mutex::new(None),
            last_full_sync_error_at: tokio::sync::Mutex::new(None),
            last_sync_time: tokio::sync::Mutex::new(None),
        }
    }

    /// Decide full vs. incremental, call the store, and apply the
    /// result under the write lock.
    pub async fn refresh(&self) -> Result<(), AppError> {
        let now = Instant::now();
        let is_full = self.should_full_sync(now).await;
        let since = if is_full { None } else { *self.last_sync_time.lock().await };

        let result = self.store.sync(since).await;
        match result {
            Ok(response) => {
                self.apply_sync(is_full, &response.profiles).await;
                *self.last_sync_time.lock().await = Some(response.sync_time);
                if is_full {
                    *self.last_full_sync.lock().await = Some(now);
                    *self.last_full_sync_error_at.lock().await = None;
                    self.persist_cache(response.sync_time).await;
                }
                Ok(())
            }
            Err(err) => {
                if is_full {
                    *self.last_full_sync_error_at.lock().await = Some(now);
                }
                Err(err.into())
            }
        }
    }

    async fn should_full_sync(&self, now: Instant) -> bool {
        let last_full = *self.last_full_sync.lock().await;
        let last_error = *self.last_full_sync_error_at.lock().await;
        match (last_full, last_error) {
            (None, _) => true,
            (Some(last), _) => {
                if now.saturating_duration_since(last) >= self.config.full_sync_interval {
                    return true;
                }
                matches!(last_error, Some(err_at) if now.saturating_duration_since(err_at) >= self.config.full_sync_retry_interval)
            }
        }
    }

    async fn apply_sync(&self, is_full: bool, deltas: &[crate::profiledb::store::ProfileDelta]) {
        let mut indices = self.indices.write().await;
        if is_full {
            indices.clear();
        }

        for delta in deltas {
            let profile_id = delta.profile.id.clone();
            if delta.profile.deleted {
                let device_ids: Vec<_> = indices
                    .profiles
                    .get(&profile_id)
                    .map(|p| p.device_ids.clone())
                    .unwrap_or_default();
                for device_id in device_ids {
                    indices.remove_device(&device_id);
                }
                indices.profiles.remove(&profile_id);
                continue;
            }

            let mut profile = delta.profile.clone();
            if delta.device_changes.is_partial {
                if let Some(existing) = indices.profiles.get(&profile_id) {
                    let mut ids: Vec<_> = existing
                        .device_ids
                        .iter()
                        .filter(|id| !delta.device_changes.removed_ids.contains(id))
                        .cloned()
                        .collect();
                    for device in &delta.device_changes.upserted {
                        if !ids.contains(&device.id) {
                            ids.push(device.id.clone());
                        }
                    }
                    profile.device_ids = ids;
                }
            }

            for removed_id in &delta.device_changes.removed_ids {
                indices.remove_device(removed_id);
            }
            for device in delta.device_changes.upserted.clone() {
                indices.index_device(&profile_id, device);
            }
            indices.profiles.insert(profile_id, profile);
        }
    }

    async fn persist_cache(&self, sync_time: SystemTime) {
        let Some(path) = cache_path(&self.config) else { return };
        let indices = self.indices.read().await;
        let profiles: Vec<_> = indices.profiles.values().cloned().collect();
        let devices: Vec<_> = indices.devices.values().cloned().collect();
        drop(indices);
        if let Err(e) = cache_file::store(&path, sync_time, &profiles, &devices) {
            log::warn!("failed to persist profile-db cache: {e}");
        }
    }

    pub async fn profile_by_device_id(&self, device_id: &DeviceId) -> Result<(Profile, Device), LookupError> {
        let indices = self.indices.read().await;
        let device = indices.devices.get(device_id).cloned().ok_or(LookupError::DeviceNotFound)?;
        let profile_id = indices.device_to_profile.get(device_id).cloned();
        let profile = profile_id.as_ref().and_then(|id| indices.profiles.get(id)).cloned();
        drop(indices);

        match profile {
            // Preserve the re-scan of `device_ids` on every lookup: a
            // profile whose list no longer names this device is treated
            // the same as a missing profile.
            Some(profile) if profile.device_ids.contains(device_id) && !profile.deleted => Ok((profile, device)),
            _ => {
                self.detach_device(device_id.clone());
                Err(LookupError::ProfileNotFound)
            }
        }
    }

    pub async fn profile_by_dedicated_ip(&self, ip: IpAddr) -> Result<(Profile, Device), LookupError> {
        let indices = self.indices.read().await;
        let Some(device_id) = indices.dedicated_ip_to_device.get(&ip).cloned() else {
            return Err(LookupError::DeviceNotFound);
        };
        let device = indices.devices.get(&device_id).cloned();
        drop(indices);

        match device {
            Some(device) if device.dedicated_ips.contains(&ip) && !device.deleted => {
                self.profile_by_device_id(&device.id).await.map(|(p, _)| (p, device))
            }
            _ => {
                self.detach_stale_ip(ip, StaleIndex::Dedicated);
                Err(LookupError::DeviceNotFound)
            }
        }
    }

    pub async fn profile_by_linked_ip(&self, ip: IpAddr) -> Result<(Profile, Device), LookupError> {
        let indices = self.indices.read().await;
        let Some(device_id) = indices.linked_ip_to_device.get(&ip).cloned() else {
            return Err(LookupError::DeviceNotFound);
        };
        let device = indices.devices.get(&device_id).cloned();
        drop(indices);

        match device {
            Some(device) if device.linked_ip == Some(ip) && !device.deleted => {
                self.profile_by_device_id(&device.id).await.map(|(p, _)| (p, device))
            }
            _ => {
                self.detach_stale_ip(ip, StaleIndex::Linked);
                Err(LookupError::DeviceNotFound)
            }
        }
    }

    pub async fn profile_by_human_id(
        &self,
        profile_id: &ProfileId,
        human_id_lower: &str,
    ) -> Result<(Profile, Device), LookupError> {
        let indices = self.indices.read().await;
        let key = (profile_id.clone(), human_id_lower.to_string());
        let Some(device_id) = indices.human_id_to_device.get(&key).cloned() else {
            return Err(LookupError::DeviceNotFound);
        };
        let device = indices.devices.get(&device_id).cloned();
        drop(indices);

        match device {
            Some(device) if device.human_id.as_deref() == Some(human_id_lower) && !device.deleted => {
                self.profile_by_device_id(&device.id).await.map(|(p, _)| (p, device))
            }
            _ => {
                self.detach_stale_human_id(key);
                Err(LookupError::DeviceNotFound)
            }
        }
    }

    pub async fn create_auto_device(
        &self,
        profile_id: &ProfileId,
        human_id: &str,
        device_type: &str,
    ) -> Result<Device, AppError> {
        let device = self.store.create_auto_device(profile_id, human_id, device_type).await?;
        let mut indices = self.indices.write().await;
        if indices.profiles.contains_key(profile_id) {
            indices.index_device(profile_id, device.clone());
            if let Some(profile) = indices.profiles.get_mut(profile_id) {
                if !profile.device_ids.contains(&device.id) {
                    profile.device_ids.push(device.id.clone());
                }
            }
        }
        Ok(device)
    }

    /// Stale-entry removal runs as a detached task so a read-lock lookup
    /// never has to upgrade to a write-lock inline. Correctness must not
    /// depend on when this task actually runs.
    fn detach_device(&self, device_id: DeviceId) {
        let indices = self.indices.clone();
        tokio::spawn(async move {
            indices.write().await.remove_device(&device_id);
        });
    }

    fn detach_stale_ip(&self, ip: IpAddr, which: StaleIndex) {
        let indices = self.indices.clone();
        tokio::spawn(async move {
            let mut indices = indices.write().await;
            match which {
                StaleIndex::Dedicated => indices.remove_dedicated_ip(ip),
                StaleIndex::Linked => indices.remove_linked_ip(ip),
            }
        });
    }

    fn detach_stale_human_id(&self, key: (ProfileId, String)) {
        let indices = self.indices.clone();
        tokio::spawn(async move {
            indices.write().await.remove_human_id(key);
        });
    }
}

enum StaleIndex {
    Dedicated,
    Linked,
}

fn cache_path(config: &ProfileDbConfig) -> Option<PathBuf> {
    if config.cache_path == "none" {
        None
    } else {
        Some(PathBuf::from(&config.cache_path))
    }
}
