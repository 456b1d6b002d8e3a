//! In-memory profile/device database: indices, refresh scheduling, and
//! the external storage port it refreshes from.

mod cache_file;
mod db;
mod store;
mod types;

pub use db::ProfileDb;
pub use store::{DeviceChanges, ProfileDelta, ProfileStore, SyncResponse};
pub use types::{BlockingMode, Device, DeviceId, LookupError, Profile, ProfileId};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProfileDbConfig;
    use crate::error::app::{AppError, StorageError};
    use async_trait::async_trait;
    use std::net::IpAddr;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::time::SystemTime;

    struct FakeStore {
        responses: Mutex<Vec<SyncResponse>>,
    }

    #[async_trait]
    impl ProfileStore for FakeStore {
        async fn sync(&self, _since: Option<SystemTime>) -> Result<SyncResponse, StorageError> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Ok(SyncResponse { sync_time: SystemTime::now(), profiles: vec![] });
            }
            Ok(responses.remove(0))
        }

        async fn create_auto_device(
            &self,
            _profile_id: &ProfileId,
            _human_id: &str,
            _device_type: &str,
        ) -> Result<Device, AppError> {
            unimplemented!()
        }
    }

    fn device(id: &str, linked_ip: Option<&str>) -> Device {
        Device {
            id: id.to_string(),
            linked_ip: linked_ip.map(|ip| ip.parse().unwrap()),
            dedicated_ips: vec![],
            human_id: None,
            deleted: false,
        }
    }

    fn profile(id: &str, device_ids: &[&str]) -> Profile {
        Profile {
            id: id.to_string(),
            filtering_group: "default".to_string(),
            device_ids: device_ids.iter().map(|s| s.to_string()).collect(),
            blocking_mode: BlockingMode::NullIp,
            deleted: false,
        }
    }

    fn delta(p: Profile, upserted: Vec<Device>) -> ProfileDelta {
        ProfileDelta {
            profile: p,
            device_changes: DeviceChanges { is_partial: false, upserted, removed_ids: vec![] },
        }
    }

    #[tokio::test]
    async fn refresh_then_lookup_by_linked_ip_then_relocate_detaches_stale_entry() {
        let first = SyncResponse {
            sync_time: SystemTime::now(),
            profiles: vec![delta(profile("p1", &["d1"]), vec![device("d1", Some("192.0.2.1"))])],
        };
        let second = SyncResponse {
            sync_time: SystemTime::now(),
            profiles: vec![delta(profile("p1", &["d1"]), vec![device("d1", Some("192.0.2.2"))])],
        };
        let store = Arc::new(FakeStore { responses: Mutex::new(vec![first, second]) });
        let db = ProfileDb::new(store, ProfileDbConfig::default());

        db.refresh().await.unwrap();
        let (p, d) = db.profile_by_linked_ip("192.0.2.1".parse().unwrap()).await.unwrap();
        assert_eq!(p.id, "p1");
        assert_eq!(d.id, "d1");

        db.refresh().await.unwrap();
        let old_ip: IpAddr = "192.0.2.1".parse().unwrap();
        assert!(db.profile_by_linked_ip(old_ip).await.is_err());
        let (p, d) = db.profile_by_linked_ip("192.0.2.2".parse().unwrap()).await.unwrap();
        assert_eq!(p.id, "p1");
        assert_eq!(d.id, "d1");
    }

    #[tokio::test]
    async fn device_not_attached_to_any_profile_is_device_not_found() {
        let store = Arc::new(FakeStore { responses: Mutex::new(vec![]) });
        let db = ProfileDb::new(store, ProfileDbConfig::default());
        assert_eq!(
            db.profile_by_device_id(&"missing".to_string()).await.unwrap_err(),
            LookupError::DeviceNotFound
        );
    }
}
