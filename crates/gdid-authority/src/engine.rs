//! The allocation engine.
//!
//! Owns the per-sequence-key serialization and the read-merge-fence-write
//! cycle against the registered persistence locations. There is no global
//! lock: each sequence key has its own async mutex, held across the durable
//! write, so allocations for distinct keys proceed fully in parallel while
//! allocations for the same key are strictly serialized. That per-key lock
//! across the write is what guarantees non-overlapping blocks without any
//! distributed consensus — there is exactly one engine instance per authority
//! id.

use crate::store::LocationHandle;
use futures::future::join_all;
use gdid::{Error, GdidBlock, HighWaterMark, MAX_AUTHORITY, Result, SequenceKey};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

type Slot = Arc<AsyncMutex<Option<HighWaterMark>>>;

/// Block allocator for one authority id.
///
/// Explicitly constructed and dependency-injected; multiple engines (for
/// different authority ids, or in tests) coexist freely in one process.
pub struct AllocationEngine {
    authority: u8,
    locations: Vec<Arc<LocationHandle>>,
    sequences: Mutex<HashMap<SequenceKey, Slot>>,
}

impl AllocationEngine {
    /// Creates an engine over `locations`, listed in priority order.
    ///
    /// Rejects an out-of-range authority id and an empty location list: an
    /// authority with no durable backing can never be safely started.
    pub fn new(authority: u8, locations: Vec<Arc<LocationHandle>>) -> Result<Self> {
        if authority > MAX_AUTHORITY {
            return Err(Error::InvalidRequest {
                reason: format!("authority id {authority} exceeds maximum {MAX_AUTHORITY}"),
            });
        }
        if locations.is_empty() {
            return Err(Error::InvalidRequest {
                reason: "at least one persistence location required".into(),
            });
        }
        Ok(Self {
            authority,
            locations,
            sequences: Mutex::new(HashMap::new()),
        })
    }

    pub fn authority_id(&self) -> u8 {
        self.authority
    }

    pub fn locations(&self) -> &[Arc<LocationHandle>] {
        &self.locations
    }

    /// Number of sequence keys with an in-memory high-water mark.
    ///
    /// A key whose lock is currently held counts as cached: an allocation is
    /// in flight for it.
    pub fn cached_marks(&self) -> usize {
        let sequences = self.sequences.lock();
        sequences
            .values()
            .filter(|slot| match slot.try_lock() {
                Ok(guard) => guard.is_some(),
                Err(_) => true,
            })
            .count()
    }

    /// Re-checks every degraded location. Driven by the background health
    /// loop; a location that passes validation rejoins the read quorum and
    /// write fan-out.
    pub async fn revalidate_locations(&self) {
        let degraded: Vec<_> = self
            .locations
            .iter()
            .filter(|handle| !handle.is_healthy())
            .collect();
        join_all(degraded.iter().map(|handle| handle.revalidate())).await;
    }

    /// Allocates one block of `block_size` counters for `(scope, sequence)`.
    ///
    /// Under the per-key lock: reads the mark from every healthy location,
    /// merges the maximum with the in-memory mark, applies the fencing and
    /// era-rollover policy, durably writes the advanced mark, and only then
    /// returns the block `[start, start + block_size)`.
    pub async fn allocate(
        &self,
        scope: &str,
        sequence: &str,
        block_size: u32,
        vicinity: u64,
    ) -> Result<GdidBlock> {
        let key = SequenceKey::new(scope, sequence)?;
        if block_size == 0 {
            return Err(Error::InvalidRequest {
                reason: "block size must be at least 1".into(),
            });
        }
        if vicinity < block_size as u64 {
            return Err(Error::InvalidRequest {
                reason: format!(
                    "vicinity {vicinity} cannot hold a single block of {block_size}"
                ),
            });
        }

        let slot = self.slot(&key);
        let mut cached = slot.lock().await;

        // Step 1: read from every healthy location. A read error degrades
        // the location; a missing record is a successful read (first
        // allocation for this key).
        let readers: Vec<_> = self
            .locations
            .iter()
            .filter(|handle| handle.is_healthy())
            .collect();
        let key_ref = &key;
        let reads = join_all(readers.iter().map(|handle| async move {
            let result = handle.location().read(self.authority, key_ref).await;
            (handle, result)
        }))
        .await;

        let mut read_max: Option<HighWaterMark> = None;
        let mut readable = 0usize;
        for (handle, result) in reads {
            match result {
                Ok(found) => {
                    readable += 1;
                    handle.mark_healthy();
                    if let Some(mark) = found {
                        read_max = Some(read_max.map_or(mark, |best| best.max(mark)));
                    }
                }
                Err(err) => handle.mark_degraded(&err),
            }
        }
        if readable == 0 {
            return Err(Error::AuthorityUnavailable {
                authority: self.authority,
            });
        }

        // Step 2 + 3a: the durable truth is the maximum across locations and
        // the in-memory mark — but storage inconsistent with any plausible
        // era progression is reported, never silently resolved.
        if let Some(cache) = *cached {
            if let Some(observed) = read_max
                && observed.era > cache.era.saturating_add(1)
            {
                return Err(Error::FencingViolation {
                    detail: format!(
                        "{key}: location reports era {} but the engine last wrote era {}",
                        observed.era, cache.era
                    ),
                });
            }
            if read_max.is_none_or(|observed| observed < cache) {
                // Every location read back less than a mark this engine
                // already durably acknowledged: storage regressed.
                return Err(Error::FencingViolation {
                    detail: format!(
                        "{key}: durable maximum {read_max:?} is below the acknowledged mark {cache:?}"
                    ),
                });
            }
        }
        let prior = match (*cached, read_max) {
            (Some(cache), Some(observed)) => cache.max(observed),
            (Some(cache), None) => cache,
            (None, observed) => observed.unwrap_or(HighWaterMark::ZERO),
        };

        // Step 3b: era rollover once the counter space is exhausted for the
        // requested vicinity bound.
        let mut mark = prior;
        if mark.counter > vicinity {
            let era = mark.era.wrapping_add(1);
            tracing::info!(
                authority = self.authority,
                %key,
                era,
                exhausted_at = mark.counter,
                "counter space exhausted, rolling over era"
            );
            mark = HighWaterMark::new(era, 0);
        }

        // Step 4: advance.
        let start = mark.counter;
        let new_counter =
            start
                .checked_add(u64::from(block_size))
                .ok_or_else(|| Error::FencingViolation {
                    detail: format!("{key}: counter overflow past u64::MAX"),
                })?;
        let new_mark = HighWaterMark::new(mark.era, new_counter);

        // Step 5: durable write to every healthy location. At least one must
        // succeed or no block is issued — an un-persisted block could be
        // re-issued after a crash. Failed writers degrade and self-heal
        // later through the max-merge.
        let writers: Vec<_> = self
            .locations
            .iter()
            .filter(|handle| handle.is_healthy())
            .collect();
        let writes = join_all(writers.iter().map(|handle| async move {
            let result = handle
                .location()
                .write(self.authority, key_ref, new_mark)
                .await;
            (handle, result)
        }))
        .await;

        let mut written = 0usize;
        for (handle, result) in writes {
            match result {
                Ok(()) => {
                    written += 1;
                    handle.mark_healthy();
                }
                Err(err) => handle.mark_degraded(&err),
            }
        }
        if written == 0 {
            return Err(Error::PersistenceWriteFailed {
                authority: self.authority,
            });
        }

        // Step 6: cache only after the mark is durable.
        *cached = Some(new_mark);

        tracing::debug!(
            authority = self.authority,
            %key,
            era = new_mark.era,
            start,
            count = block_size,
            locations = written,
            "allocated block"
        );
        Ok(GdidBlock {
            authority: self.authority,
            era: new_mark.era,
            start,
            count: block_size,
            vicinity,
        })
    }

    fn slot(&self, key: &SequenceKey) -> Slot {
        let mut sequences = self.sequences.lock();
        Arc::clone(sequences.entry(key.clone()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLocation;
    use gdid::DEFAULT_VICINITY;

    fn engine(locations: Vec<Arc<MemoryLocation>>) -> AllocationEngine {
        let handles = locations
            .into_iter()
            .map(|location| LocationHandle::new(location))
            .collect();
        AllocationEngine::new(1, handles).unwrap()
    }

    #[test]
    fn rejects_invalid_construction() {
        assert!(AllocationEngine::new(MAX_AUTHORITY + 1, vec![]).is_err());
        assert!(AllocationEngine::new(0, vec![]).is_err());
    }

    #[tokio::test]
    async fn rejects_bad_requests_before_io() {
        let location = Arc::new(MemoryLocation::new("m"));
        location.set_fail_reads(true); // would fail if any i/o happened
        let engine = engine(vec![location]);

        assert!(matches!(
            engine.allocate("", "invoice", 1, DEFAULT_VICINITY).await,
            Err(Error::InvalidRequest { .. })
        ));
        assert!(matches!(
            engine.allocate("orders", "invoice", 0, DEFAULT_VICINITY).await,
            Err(Error::InvalidRequest { .. })
        ));
        assert!(matches!(
            engine.allocate("orders", "invoice", 10, 9).await,
            Err(Error::InvalidRequest { .. })
        ));
    }

    #[tokio::test]
    async fn first_allocation_starts_at_zero() {
        let engine = engine(vec![Arc::new(MemoryLocation::new("m"))]);
        let block = engine
            .allocate("orders", "invoice", 100, DEFAULT_VICINITY)
            .await
            .unwrap();
        assert_eq!((block.era, block.start, block.count), (0, 0, 100));
        assert_eq!(engine.cached_marks(), 1);
    }
}
