use crate::store::{DiskLocation, LocationHandle, RemoteLocation};
use anyhow::bail;
use gdid::{DEFAULT_VICINITY, MAX_AUTHORITY};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for one hosted [`Authority`].
///
/// All durations are carried as milliseconds so the whole structure
/// round-trips through serde for file- or environment-driven deployment.
///
/// [`Authority`]: crate::Authority
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct AuthorityConfig {
    /// This instance's authority id (0–31). Exactly one live authority may
    /// own an id at a time.
    pub authority_id: u8,

    /// Persistence locations, consulted in ascending `priority` order.
    pub locations: Vec<LocationDescriptor>,

    /// Block size applied when a request does not specify one.
    pub default_block_size: u32,

    /// Vicinity fencing bound applied when a request does not specify one.
    pub default_vicinity: u64,

    /// How often degraded locations are revalidated, in milliseconds.
    pub health_check_interval_ms: u64,

    /// How long shutdown waits for in-flight allocations, in milliseconds.
    pub drain_timeout_ms: u64,
}

/// One persistence location entry: kind, connection detail, priority.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct LocationDescriptor {
    pub name: String,
    pub kind: LocationKind,
    pub priority: u8,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum LocationKind {
    /// Records under a local directory, fsync'd on every write.
    Disk { root: PathBuf },
    /// Records forwarded to a remote peer. Building from configuration alone
    /// yields the transportless (permanently degraded) form; inject a live
    /// transport through [`Authority::start_with_locations`].
    ///
    /// [`Authority::start_with_locations`]: crate::Authority::start_with_locations
    Remote { peer: String },
}

impl AuthorityConfig {
    pub fn new(authority_id: u8) -> Self {
        Self {
            authority_id,
            locations: Vec::new(),
            default_block_size: 100,
            default_vicinity: DEFAULT_VICINITY,
            health_check_interval_ms: 5_000,
            drain_timeout_ms: 3_000,
        }
    }

    pub fn with_disk_location(mut self, name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        let priority = self.locations.len() as u8;
        self.locations.push(LocationDescriptor {
            name: name.into(),
            kind: LocationKind::Disk { root: root.into() },
            priority,
        });
        self
    }

    pub fn with_remote_location(mut self, name: impl Into<String>, peer: impl Into<String>) -> Self {
        let priority = self.locations.len() as u8;
        self.locations.push(LocationDescriptor {
            name: name.into(),
            kind: LocationKind::Remote { peer: peer.into() },
            priority,
        });
        self
    }

    pub fn with_default_block_size(mut self, block_size: u32) -> Self {
        self.default_block_size = block_size;
        self
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// Checks everything that does not require touching the locations.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.authority_id > MAX_AUTHORITY {
            bail!(
                "authority id {} exceeds maximum {MAX_AUTHORITY}",
                self.authority_id
            );
        }
        if self.default_block_size == 0 {
            bail!("default block size must be at least 1");
        }
        if self.default_vicinity < u64::from(self.default_block_size) {
            bail!(
                "default vicinity {} cannot hold a single block of {}",
                self.default_vicinity,
                self.default_block_size
            );
        }
        if self.health_check_interval_ms == 0 {
            bail!("health check interval must be non-zero");
        }
        Ok(())
    }

    /// Builds location handles from the descriptors, in priority order.
    ///
    /// An authority with zero locations has no durable backing and can never
    /// be safely started, so that is rejected here.
    pub fn build_locations(&self) -> anyhow::Result<Vec<Arc<LocationHandle>>> {
        if self.locations.is_empty() {
            bail!("an authority requires at least one persistence location");
        }
        let mut descriptors: Vec<_> = self.locations.iter().collect();
        descriptors.sort_by_key(|descriptor| descriptor.priority);

        Ok(descriptors
            .into_iter()
            .map(|descriptor| match &descriptor.kind {
                LocationKind::Disk { root } => {
                    LocationHandle::new(Arc::new(DiskLocation::new(&descriptor.name, root)))
                }
                LocationKind::Remote { .. } => {
                    LocationHandle::new(Arc::new(RemoteLocation::unconfigured(&descriptor.name)))
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_locations_is_rejected() {
        let config = AuthorityConfig::new(0);
        assert!(config.validate().is_ok());
        assert!(config.build_locations().is_err());
    }

    #[test]
    fn out_of_range_settings_are_rejected() {
        assert!(AuthorityConfig::new(MAX_AUTHORITY + 1).validate().is_err());

        let mut config = AuthorityConfig::new(0);
        config.default_block_size = 0;
        assert!(config.validate().is_err());

        let mut config = AuthorityConfig::new(0);
        config.default_vicinity = 5;
        config.default_block_size = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn locations_are_built_in_priority_order() {
        let mut config = AuthorityConfig::new(3)
            .with_disk_location("local", "/tmp/gdid-a")
            .with_remote_location("peer", "replica-1");
        config.locations.swap(0, 1); // declaration order must not matter

        let handles = config.build_locations().unwrap();
        assert_eq!(handles.len(), 2);
        assert_eq!(handles[0].name(), "local");
        assert_eq!(handles[1].name(), "peer");
    }

    #[test]
    fn round_trips_through_serde() {
        let config = AuthorityConfig::new(7).with_disk_location("local", "/var/lib/gdid");
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AuthorityConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.authority_id, 7);
        assert_eq!(parsed.locations.len(), 1);
    }
}
