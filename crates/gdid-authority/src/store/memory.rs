//! In-process persistence location with failure injection.
//!
//! Durable only for the lifetime of the process; exists for tests and doc
//! examples that need a location whose reads/writes can be forced to fail and
//! whose records can be inspected or tampered with directly.

use super::{PersistenceLocation, StoreError, StoreResult};
use gdid::{HighWaterMark, SequenceKey};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Default)]
pub struct MemoryLocation {
    name: String,
    records: Mutex<HashMap<(u8, SequenceKey), HighWaterMark>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryLocation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Forces every subsequent read (and validation) to fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::Release);
    }

    /// Forces every subsequent write to fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Release);
    }

    /// The stored mark for a key, bypassing failure injection.
    pub fn mark_for(&self, authority: u8, key: &SequenceKey) -> Option<HighWaterMark> {
        self.records.lock().get(&(authority, key.clone())).copied()
    }

    /// Overwrites a stored mark directly (seeding or tampering).
    pub fn put_mark(&self, authority: u8, key: &SequenceKey, mark: HighWaterMark) {
        self.records.lock().insert((authority, key.clone()), mark);
    }

    fn injected(&self, flag: &AtomicBool, what: &str) -> StoreResult<()> {
        if flag.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable {
                detail: format!("injected {what} failure"),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl PersistenceLocation for MemoryLocation {
    fn name(&self) -> &str {
        &self.name
    }

    async fn validate(&self) -> StoreResult<()> {
        self.injected(&self.fail_reads, "validate")
    }

    async fn read(&self, authority: u8, key: &SequenceKey) -> StoreResult<Option<HighWaterMark>> {
        self.injected(&self.fail_reads, "read")?;
        Ok(self.mark_for(authority, key))
    }

    async fn write(
        &self,
        authority: u8,
        key: &SequenceKey,
        mark: HighWaterMark,
    ) -> StoreResult<()> {
        self.injected(&self.fail_writes, "write")?;
        self.put_mark(authority, key, mark);
        Ok(())
    }
}
