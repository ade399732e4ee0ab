//! Remote persistence location.
//!
//! Forwards reads and writes to a peer for off-host redundancy. The network
//! transport is injected as a [`RemoteStore`]; this crate does not pick a wire
//! protocol. A `RemoteLocation` constructed without a transport reports
//! [`StoreError::Unimplemented`] from every operation — a first-class state
//! the engine's fan-out treats uniformly with runtime failures (the location
//! simply stays degraded), rather than an error thrown on every call path.

use super::{PersistenceLocation, StoreError, StoreResult};
use gdid::{HighWaterMark, SequenceKey};
use std::sync::Arc;

/// The transport behind a [`RemoteLocation`].
///
/// Implementations are free to fail independently of local disk (partition,
/// peer down); such failures degrade the location without being fatal to the
/// authority as a whole.
#[async_trait::async_trait]
pub trait RemoteStore: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    async fn fetch(&self, authority: u8, key: &SequenceKey) -> StoreResult<Option<HighWaterMark>>;

    /// Must be durable on the peer before returning.
    async fn store(&self, authority: u8, key: &SequenceKey, mark: HighWaterMark)
    -> StoreResult<()>;
}

pub struct RemoteLocation {
    name: String,
    transport: Option<Arc<dyn RemoteStore>>,
}

impl RemoteLocation {
    pub fn new(name: impl Into<String>, transport: Arc<dyn RemoteStore>) -> Self {
        Self {
            name: name.into(),
            transport: Some(transport),
        }
    }

    /// A remote location with no transport wired up. Every operation reports
    /// [`StoreError::Unimplemented`], so the location immediately degrades
    /// and the authority keeps serving from its other locations.
    pub fn unconfigured(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: None,
        }
    }

    fn transport(&self) -> StoreResult<&Arc<dyn RemoteStore>> {
        self.transport.as_ref().ok_or(StoreError::Unimplemented)
    }
}

#[async_trait::async_trait]
impl PersistenceLocation for RemoteLocation {
    fn name(&self) -> &str {
        &self.name
    }

    async fn validate(&self) -> StoreResult<()> {
        self.transport()?.ping().await
    }

    async fn read(&self, authority: u8, key: &SequenceKey) -> StoreResult<Option<HighWaterMark>> {
        self.transport()?.fetch(authority, key).await
    }

    async fn write(
        &self,
        authority: u8,
        key: &SequenceKey,
        mark: HighWaterMark,
    ) -> StoreResult<()> {
        self.transport()?.store(authority, key, mark).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLocation;

    /// A loopback transport over an in-memory location, standing in for a
    /// real peer.
    struct Loopback(MemoryLocation);

    #[async_trait::async_trait]
    impl RemoteStore for Loopback {
        async fn ping(&self) -> StoreResult<()> {
            self.0.validate().await
        }

        async fn fetch(
            &self,
            authority: u8,
            key: &SequenceKey,
        ) -> StoreResult<Option<HighWaterMark>> {
            self.0.read(authority, key).await
        }

        async fn store(
            &self,
            authority: u8,
            key: &SequenceKey,
            mark: HighWaterMark,
        ) -> StoreResult<()> {
            self.0.write(authority, key, mark).await
        }
    }

    #[tokio::test]
    async fn unconfigured_location_reports_unimplemented() {
        let location = RemoteLocation::unconfigured("peer");
        let key = SequenceKey::new("orders", "invoice").unwrap();

        assert!(matches!(
            location.validate().await,
            Err(StoreError::Unimplemented)
        ));
        assert!(matches!(
            location.read(0, &key).await,
            Err(StoreError::Unimplemented)
        ));
        assert!(matches!(
            location.write(0, &key, HighWaterMark::ZERO).await,
            Err(StoreError::Unimplemented)
        ));
    }

    #[tokio::test]
    async fn configured_location_forwards_to_transport() {
        let location = RemoteLocation::new("peer", Arc::new(Loopback(MemoryLocation::new("m"))));
        let key = SequenceKey::new("orders", "invoice").unwrap();
        let mark = HighWaterMark::new(1, 99);

        location.validate().await.unwrap();
        location.write(3, &key, mark).await.unwrap();
        assert_eq!(location.read(3, &key).await.unwrap(), Some(mark));
    }
}
