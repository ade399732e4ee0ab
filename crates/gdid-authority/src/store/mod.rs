//! Durable persistence locations for high-water marks.
//!
//! A location stores one [`HighWaterMark`] record per sequence key under a
//! given authority id. Multiple locations are registered in priority order
//! for redundancy; each may fail independently. The engine treats the
//! *maximum* mark observed across healthy locations as the durable truth, so
//! a single lagging or unreachable location never loses data.

mod disk;
mod memory;
mod remote;

pub use disk::DiskLocation;
pub use memory::MemoryLocation;
pub use remote::{RemoteLocation, RemoteStore};

use gdid::{HighWaterMark, SequenceKey};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures a persistence location can report.
///
/// These stay internal to the authority crate; the allocation engine maps
/// them onto the public error taxonomy (`AuthorityUnavailable`,
/// `PersistenceWriteFailed`, `FencingViolation`).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored record could not be parsed.
    #[error("corrupt record: {detail}")]
    Corrupt { detail: String },

    /// The location is temporarily unreachable (peer down, task failure).
    #[error("location unavailable: {detail}")]
    Unavailable { detail: String },

    /// The location has no transport configured. A permanent state for this
    /// process, treated uniformly with runtime failures by the fan-out.
    #[error("no remote transport configured")]
    Unimplemented,
}

/// One durable backend for high-water-mark records.
///
/// `write` must be durable on return: a crash immediately after a successful
/// call must not lose the record (fsync-equivalent semantics). `read` returns
/// `Ok(None)` for a key that was never written — that is a *successful* read.
/// `validate` checks reachability without side effects on records.
#[async_trait::async_trait]
pub trait PersistenceLocation: Send + Sync {
    /// A stable name for logs and health reporting.
    fn name(&self) -> &str;

    async fn validate(&self) -> StoreResult<()>;

    async fn read(&self, authority: u8, key: &SequenceKey) -> StoreResult<Option<HighWaterMark>>;

    async fn write(&self, authority: u8, key: &SequenceKey, mark: HighWaterMark)
    -> StoreResult<()>;
}

/// A registered location plus its health flag.
///
/// Any failed operation marks the location degraded; any success (including
/// a background revalidation) marks it healthy again. Degraded locations are
/// excluded from the read quorum and the write fan-out.
pub struct LocationHandle {
    location: Arc<dyn PersistenceLocation>,
    healthy: AtomicBool,
}

impl LocationHandle {
    pub fn new(location: Arc<dyn PersistenceLocation>) -> Arc<Self> {
        Arc::new(Self {
            location,
            healthy: AtomicBool::new(true),
        })
    }

    pub fn name(&self) -> &str {
        self.location.name()
    }

    pub fn location(&self) -> &Arc<dyn PersistenceLocation> {
        &self.location
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    pub fn mark_healthy(&self) {
        if !self.healthy.swap(true, Ordering::AcqRel) {
            tracing::info!(location = self.name(), "persistence location recovered");
        }
    }

    pub fn mark_degraded(&self, err: &StoreError) {
        if self.healthy.swap(false, Ordering::AcqRel) {
            tracing::warn!(
                location = self.name(),
                error = %err,
                "persistence location degraded"
            );
        }
    }

    /// Re-checks a location's health without touching any record.
    pub async fn revalidate(&self) {
        match self.location.validate().await {
            Ok(()) => self.mark_healthy(),
            Err(err) => self.mark_degraded(&err),
        }
    }
}
