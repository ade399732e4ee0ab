//! Client-side block cache and identifier generator.
//!
//! A [`GdidGenerator`] runs inside every caller process. Per sequence key it
//! holds at most one active [`BlockCursor`] and slices identifiers out of it
//! without any network traffic; only when the block is exhausted does it
//! request a fresh one from an authority endpoint. Endpoints are tried in
//! priority order with an independent timeout per attempt, so a dead or
//! partitioned authority only costs one timeout before failover.


use crate::{
    AllocateRequest, AuthorityEndpoint, BlockCursor, Error, Gdid, GdidBlock, Result, SequenceKey,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::timeout;

type Slot = Arc<AsyncMutex<Option<BlockCursor>>>;

/// Counters describing how well block caching is amortizing requests.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct GeneratorStats {
    /// Blocks fetched from authority endpoints (successful allocations).
    pub blocks_fetched: u64,
    /// Identifiers handed out to callers.
    pub ids_issued: u64,
}

/// A block-caching GDID generator with endpoint failover.
///
/// Cloning is cheap and clones share the block cache; a process normally owns
/// exactly one generator per authority namespace it mints identifiers in.
#[derive(Clone)]
pub struct GdidGenerator {
    inner: Arc<Inner>,
}

struct Inner {
    endpoints: Vec<Arc<dyn AuthorityEndpoint>>,
    block_size: u32,
    attempt_timeout: Duration,
    sequences: Mutex<HashMap<SequenceKey, Slot>>,
    blocks_fetched: AtomicU64,
    ids_issued: AtomicU64,
}

impl GdidGenerator {
    /// Creates a generator over `endpoints`, tried in the given order.
    ///
    /// `block_size` is requested for every refill; `attempt_timeout` bounds
    /// each individual endpoint attempt.
    pub fn new(
        endpoints: Vec<Arc<dyn AuthorityEndpoint>>,
        block_size: u32,
        attempt_timeout: Duration,
    ) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(Error::invalid("at least one authority endpoint required"));
        }
        if block_size == 0 {
            return Err(Error::invalid("block size must be at least 1"));
        }
        Ok(Self {
            inner: Arc::new(Inner {
                endpoints,
                block_size,
                attempt_timeout,
                sequences: Mutex::new(HashMap::new()),
                blocks_fetched: AtomicU64::new(0),
                ids_issued: AtomicU64::new(0),
            }),
        })
    }

    /// Returns the next identifier for `(scope, sequence)`.
    ///
    /// Served from the cached block when one is active; otherwise a new block
    /// is requested first, failing over across endpoints. Concurrent calls
    /// for the same sequence key are serialized so that exhaustion triggers
    /// exactly one refill; distinct keys proceed in parallel.
    pub async fn generate_one(&self, scope: &str, sequence: &str) -> Result<Gdid> {
        let key = SequenceKey::new(scope, sequence)?;
        let slot = self.inner.slot(&key);
        let mut cursor = slot.lock().await;

        if let Some(active) = cursor.as_mut()
            && let Some(id) = active.next_id()
        {
            self.inner.ids_issued.fetch_add(1, Ordering::Relaxed);
            return Ok(id);
        }

        // Exhausted or never filled. A fresh block always has the full
        // configured size; remainders are never re-requested.
        let mut fresh = self.inner.fetch_block(&key).await?.into_cursor();
        let id = fresh
            .next_id()
            .ok_or_else(|| Error::invalid("authority returned an empty block"))?;
        *cursor = Some(fresh);
        self.inner.ids_issued.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    /// Returns `n` identifiers for `(scope, sequence)`, in increasing order.
    ///
    /// Equivalent to `n` calls to [`Self::generate_one`] but holds the
    /// per-key slot across the whole batch, refilling as needed.
    pub async fn generate_many(&self, scope: &str, sequence: &str, n: usize) -> Result<Vec<Gdid>> {
        let key = SequenceKey::new(scope, sequence)?;
        let slot = self.inner.slot(&key);
        let mut cursor = slot.lock().await;

        let mut ids = Vec::with_capacity(n);
        while ids.len() < n {
            if let Some(active) = cursor.as_mut()
                && let Some(id) = active.next_id()
            {
                ids.push(id);
                continue;
            }
            *cursor = Some(self.inner.fetch_block(&key).await?.into_cursor());
        }
        self.inner
            .ids_issued
            .fetch_add(ids.len() as u64, Ordering::Relaxed);
        Ok(ids)
    }

    /// Snapshot of the amortization counters.
    pub fn stats(&self) -> GeneratorStats {
        GeneratorStats {
            blocks_fetched: self.inner.blocks_fetched.load(Ordering::Relaxed),
            ids_issued: self.inner.ids_issued.load(Ordering::Relaxed),
        }
    }
}

impl Inner {
    fn slot(&self, key: &SequenceKey) -> Slot {
        let mut sequences = self.sequences.lock();
        Arc::clone(sequences.entry(key.clone()).or_default())
    }

    /// Requests one block, trying endpoints in priority order.
    ///
    /// Each attempt is independent: no partial state carries over between
    /// endpoints. A timed-out attempt is recorded as [`Error::AmbiguousOutcome`]
    /// — the authority may have durably advanced its mark, and the block it
    /// would have returned is abandoned (wasted range, never reused wrongly).
    async fn fetch_block(&self, key: &SequenceKey) -> Result<GdidBlock> {
        let request = AllocateRequest::new(key.scope(), key.sequence())
            .with_block_size(self.block_size);

        let mut last = None;
        for endpoint in &self.endpoints {
            match timeout(self.attempt_timeout, endpoint.allocate(request.clone())).await {
                Ok(Ok(block)) => {
                    self.blocks_fetched.fetch_add(1, Ordering::Relaxed);
                    return Ok(block);
                }
                Ok(Err(err)) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        endpoint = endpoint.name(),
                        %key,
                        error = %err,
                        "allocation attempt failed, failing over"
                    );
                    last = Some(err);
                }
                Err(_elapsed) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        endpoint = endpoint.name(),
                        %key,
                        "allocation attempt timed out with unknown outcome, failing over"
                    );
                    last = Some(Error::AmbiguousOutcome {
                        endpoint: endpoint.name().to_string(),
                    });
                }
            }
        }

        Err(Error::ClientExhaustedAllLocations {
            attempts: self.endpoints.len(),
            // The loop runs at least once: `new` rejects empty endpoint lists.
            last: Box::new(last.unwrap_or(Error::ServiceShutdown)),
        })
    }
}
