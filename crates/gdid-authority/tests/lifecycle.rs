//! Lifecycle wrapper behavior and the full authority-to-client path.

use gdid::{
    AllocateRequest, AuthorityEndpoint, Error, GdidBlock, GdidGenerator, Result,
};
use gdid_authority::store::{MemoryLocation, PersistenceLocation};
use gdid_authority::{Authority, AuthorityConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn config() -> AuthorityConfig {
    let mut config = AuthorityConfig::new(1);
    config.health_check_interval_ms = 50;
    config.drain_timeout_ms = 500;
    config
}

async fn memory_authority(config: AuthorityConfig) -> (Authority, Arc<MemoryLocation>) {
    let location = Arc::new(MemoryLocation::new("mem"));
    let authority = Authority::start_with_locations(
        config,
        vec![Arc::clone(&location) as Arc<dyn PersistenceLocation>],
    )
    .await
    .unwrap();
    (authority, location)
}

/// Counts allocation requests on their way into an authority, for the
/// client-amortization properties.
struct CountingEndpoint {
    inner: Arc<Authority>,
    calls: AtomicUsize,
}

impl CountingEndpoint {
    fn new(inner: Arc<Authority>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait::async_trait]
impl AuthorityEndpoint for CountingEndpoint {
    fn name(&self) -> &str {
        "counted"
    }

    async fn allocate(&self, request: AllocateRequest) -> Result<GdidBlock> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.inner.allocate_block(request).await
    }
}

#[tokio::test]
async fn start_requires_a_persistence_location() {
    assert!(Authority::start(AuthorityConfig::new(0)).await.is_err());
}

#[tokio::test]
async fn start_rejects_out_of_range_authority_id() {
    let config = AuthorityConfig::new(32).with_disk_location("local", "/tmp/unused");
    assert!(Authority::start(config).await.is_err());
}

#[tokio::test]
async fn defaults_are_applied_to_bare_requests() {
    let mut config = config();
    config.default_block_size = 64;
    let (authority, _) = memory_authority(config).await;

    let block = authority
        .allocate_block(AllocateRequest::new("orders", "invoice"))
        .await
        .unwrap();
    assert_eq!(block.count, 64);
    assert_eq!(block.authority, 1);
    authority.shutdown().await;
}

#[tokio::test]
async fn shutdown_rejects_new_requests() {
    let (authority, _) = memory_authority(config()).await;
    authority
        .allocate_block(AllocateRequest::new("orders", "invoice"))
        .await
        .unwrap();

    authority.shutdown().await;
    let err = authority
        .allocate_block(AllocateRequest::new("orders", "invoice"))
        .await
        .unwrap_err();
    assert_eq!(err, Error::ServiceShutdown);
}

#[tokio::test]
async fn authority_id_change_is_fenced_by_cached_marks() {
    let (mut authority, _) = memory_authority(config()).await;

    // No marks cached yet: re-homing is allowed.
    authority.set_authority_id(2).unwrap();
    assert_eq!(authority.authority_id(), 2);

    authority
        .allocate_block(AllocateRequest::new("orders", "invoice"))
        .await
        .unwrap();
    let err = authority.set_authority_id(3).unwrap_err();
    assert!(matches!(err, Error::InvalidRequest { .. }));
    authority.shutdown().await;
}

#[tokio::test]
async fn health_loop_revives_degraded_locations() {
    let location = Arc::new(MemoryLocation::new("mem"));
    location.set_fail_reads(true);
    let authority = Authority::start_with_locations(
        config(),
        vec![Arc::clone(&location) as Arc<dyn PersistenceLocation>],
    )
    .await
    .unwrap();

    // Degraded from the startup validation pass: nothing readable.
    let err = authority
        .allocate_block(AllocateRequest::new("orders", "invoice"))
        .await
        .unwrap_err();
    assert_eq!(err, Error::AuthorityUnavailable { authority: 1 });

    // Once the location recovers, the background loop heals it.
    location.set_fail_reads(false);
    tokio::time::sleep(Duration::from_millis(300)).await;
    authority
        .allocate_block(AllocateRequest::new("orders", "invoice"))
        .await
        .unwrap();
    authority.shutdown().await;
}

#[tokio::test]
async fn two_hundred_fifty_ids_cost_three_allocations() {
    let (authority, _) = memory_authority(config()).await;
    let endpoint = CountingEndpoint::new(Arc::new(authority));
    let generator = GdidGenerator::new(
        vec![Arc::clone(&endpoint) as Arc<dyn AuthorityEndpoint>],
        100,
        Duration::from_secs(2),
    )
    .unwrap();

    let mut ids = Vec::with_capacity(250);
    for _ in 0..250 {
        ids.push(generator.generate_one("orders", "invoice").await.unwrap());
    }

    assert_eq!(endpoint.calls(), 3);
    assert_eq!(generator.stats().blocks_fetched, 3);
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    let unique: std::collections::HashSet<_> = ids.iter().map(|id| id.to_u128()).collect();
    assert_eq!(unique.len(), 250);
}

#[tokio::test]
async fn client_fails_over_to_a_healthy_authority() {
    // First authority has unreadable storage; its errors surface to the
    // client, which fails over to the second authority for the same id.
    let broken = Arc::new(MemoryLocation::new("broken"));
    broken.set_fail_reads(true);
    let primary = Authority::start_with_locations(
        config(),
        vec![Arc::clone(&broken) as Arc<dyn PersistenceLocation>],
    )
    .await
    .unwrap();
    let (fallback, _) = memory_authority(config()).await;

    let generator = GdidGenerator::new(
        vec![
            Arc::new(primary) as Arc<dyn AuthorityEndpoint>,
            Arc::new(fallback) as Arc<dyn AuthorityEndpoint>,
        ],
        10,
        Duration::from_secs(2),
    )
    .unwrap();

    let id = generator.generate_one("orders", "invoice").await.unwrap();
    assert_eq!(id.counter(), 0);
    assert_eq!(generator.stats().blocks_fetched, 1);
}
