//! Lifecycle wrapper around the allocation engine.
//!
//! The [`Authority`] is the only component allowed to mutate engine
//! configuration. It validates configuration, constructs the engine
//! explicitly (no ambient global instance — multiple authorities coexist in
//! one process, which the tests rely on), runs the background health loop for
//! degraded locations, and gates requests during shutdown until in-flight
//! allocations drain.

use crate::config::AuthorityConfig;
use crate::engine::AllocationEngine;
use crate::store::{LocationHandle, PersistenceLocation};
use futures::future::join_all;
use gdid::{AllocateRequest, AuthorityEndpoint, Error, GdidBlock, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

/// How often the shutdown drain re-checks the in-flight counter.
const DRAIN_POLL: Duration = Duration::from_millis(100);

/// A started authority instance: engine + health loop + shutdown gate.
pub struct Authority {
    name: String,
    config: AuthorityConfig,
    engine: Arc<AllocationEngine>,
    inflight: AtomicUsize,
    shutdown: CancellationToken,
    health_task: Mutex<Option<JoinHandle<()>>>,
}

impl Authority {
    /// Starts an authority from configuration alone.
    ///
    /// Remote locations built this way have no transport and immediately
    /// degrade; use [`Self::start_with_locations`] to inject live ones.
    pub async fn start(config: AuthorityConfig) -> anyhow::Result<Self> {
        let handles = config.build_locations()?;
        Self::start_with_handles(config, handles).await
    }

    /// Starts an authority over externally constructed locations, in the
    /// given priority order. The descriptors in `config.locations` are
    /// ignored; everything else in the configuration applies.
    pub async fn start_with_locations(
        config: AuthorityConfig,
        locations: Vec<Arc<dyn PersistenceLocation>>,
    ) -> anyhow::Result<Self> {
        let handles = locations.into_iter().map(LocationHandle::new).collect();
        Self::start_with_handles(config, handles).await
    }

    async fn start_with_handles(
        config: AuthorityConfig,
        handles: Vec<Arc<LocationHandle>>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let engine = Arc::new(AllocationEngine::new(config.authority_id, handles)?);

        // One validation pass up front: failures only degrade, the health
        // loop keeps retrying them. Starting with every location degraded is
        // allowed; requests fail with AuthorityUnavailable until one heals.
        join_all(
            engine
                .locations()
                .iter()
                .map(|handle| handle.revalidate()),
        )
        .await;
        let healthy = engine
            .locations()
            .iter()
            .filter(|handle| handle.is_healthy())
            .count();
        tracing::info!(
            authority = config.authority_id,
            locations = engine.locations().len(),
            healthy,
            "authority started"
        );

        let shutdown = CancellationToken::new();
        let health_task = spawn_health_loop(
            engine.locations().to_vec(),
            config.health_check_interval(),
            shutdown.clone(),
        );

        Ok(Self {
            name: format!("authority-{}", config.authority_id),
            config,
            engine,
            inflight: AtomicUsize::new(0),
            shutdown,
            health_task: Mutex::new(Some(health_task)),
        })
    }

    pub fn authority_id(&self) -> u8 {
        self.engine.authority_id()
    }

    pub fn engine(&self) -> &AllocationEngine {
        &self.engine
    }

    /// The single operation exposed to the transport layer.
    ///
    /// Fills in configured defaults for block size and vicinity, rejects new
    /// work once shutdown has begun, and tracks the request so shutdown can
    /// drain it.
    pub async fn allocate_block(&self, request: AllocateRequest) -> Result<GdidBlock> {
        let _guard = InflightGuard::enter(&self.inflight);
        if self.shutdown.is_cancelled() {
            return Err(Error::ServiceShutdown);
        }

        let block_size = request
            .block_size
            .unwrap_or(self.config.default_block_size);
        let vicinity = request.vicinity.unwrap_or(self.config.default_vicinity);
        self.engine
            .allocate(&request.scope, &request.sequence, block_size, vicinity)
            .await
    }

    /// Re-homes this instance onto a different authority id.
    ///
    /// Only legal while no high-water mark is cached: a cached mark belongs
    /// to the old id's namespace, and carrying it across would silently
    /// invalidate the fencing guarantee.
    pub fn set_authority_id(&mut self, authority_id: u8) -> Result<()> {
        if self.engine.cached_marks() > 0 {
            return Err(Error::InvalidRequest {
                reason: format!(
                    "cannot change authority id {} -> {authority_id} while {} high-water marks are cached",
                    self.engine.authority_id(),
                    self.engine.cached_marks()
                ),
            });
        }
        let locations = self.engine.locations().to_vec();
        self.engine = Arc::new(AllocationEngine::new(authority_id, locations)?);
        self.config.authority_id = authority_id;
        self.name = format!("authority-{authority_id}");
        Ok(())
    }

    /// Graceful shutdown: refuse new requests, drain in-flight allocations
    /// (bounded by the configured drain timeout), stop the health loop.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let deadline = Instant::now() + self.config.drain_timeout();
        while self.inflight.load(Ordering::Acquire) > 0 && Instant::now() < deadline {
            sleep(DRAIN_POLL).await;
        }
        let remaining = self.inflight.load(Ordering::Acquire);
        if remaining > 0 {
            tracing::warn!(remaining, "drain timed out with allocations in flight");
        }

        if let Some(task) = self.health_task.lock().take() {
            let _ = task.await;
        }
        tracing::info!(authority = self.engine.authority_id(), "authority shut down");
    }
}

#[async_trait::async_trait]
impl AuthorityEndpoint for Authority {
    fn name(&self) -> &str {
        &self.name
    }

    async fn allocate(&self, request: AllocateRequest) -> Result<GdidBlock> {
        self.allocate_block(request).await
    }
}

fn spawn_health_loop(
    locations: Vec<Arc<LocationHandle>>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately; skip it, start validated.
        ticker.tick().await;
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let degraded: Vec<_> = locations
                        .iter()
                        .filter(|handle| !handle.is_healthy())
                        .collect();
                    join_all(degraded.iter().map(|handle| handle.revalidate())).await;
                }
            }
        }
    })
}

/// Increments the in-flight counter for the lifetime of one request.
struct InflightGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InflightGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self { counter }
    }
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}
