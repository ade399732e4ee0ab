//! Local-disk persistence location.
//!
//! One JSON record per sequence key at a deterministic path:
//! `<root>/authority-<id>/<scope>/<sequence>.json`. Writes go through a
//! temporary file, fsync, atomic rename, and a directory sync, so a crash
//! immediately after a successful write cannot lose the update and readers
//! never observe a partially written record. No other process may write under
//! the root while the authority owns it.

use super::{PersistenceLocation, StoreError, StoreResult};
use gdid::{HighWaterMark, SequenceKey};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

pub struct DiskLocation {
    name: String,
    root: PathBuf,
}

impl DiskLocation {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, authority: u8, key: &SequenceKey) -> PathBuf {
        self.root
            .join(format!("authority-{authority}"))
            .join(key.scope())
            .join(format!("{}.json", key.sequence()))
    }

    async fn run_blocking<T, F>(task: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> StoreResult<T> + Send + 'static,
    {
        tokio::task::spawn_blocking(task)
            .await
            .map_err(|err| StoreError::Unavailable {
                detail: format!("blocking i/o task failed: {err}"),
            })?
    }
}

#[async_trait::async_trait]
impl PersistenceLocation for DiskLocation {
    fn name(&self) -> &str {
        &self.name
    }

    /// Checks that the root exists (creating it if needed) and is writable,
    /// via a throwaway probe file.
    async fn validate(&self) -> StoreResult<()> {
        let root = self.root.clone();
        Self::run_blocking(move || {
            fs::create_dir_all(&root)?;
            let probe = root.join(".gdid-probe");
            File::create(&probe)?.sync_all()?;
            fs::remove_file(&probe)?;
            Ok(())
        })
        .await
    }

    async fn read(&self, authority: u8, key: &SequenceKey) -> StoreResult<Option<HighWaterMark>> {
        let path = self.record_path(authority, key);
        Self::run_blocking(move || {
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
                Err(err) => return Err(err.into()),
            };
            let mark = serde_json::from_slice(&bytes).map_err(|err| StoreError::Corrupt {
                detail: format!("{}: {err}", path.display()),
            })?;
            Ok(Some(mark))
        })
        .await
    }

    async fn write(
        &self,
        authority: u8,
        key: &SequenceKey,
        mark: HighWaterMark,
    ) -> StoreResult<()> {
        let path = self.record_path(authority, key);
        Self::run_blocking(move || {
            let parent = path.parent().ok_or_else(|| StoreError::Unavailable {
                detail: format!("record path {} has no parent directory", path.display()),
            })?;
            fs::create_dir_all(parent)?;

            // Write-tmp, fsync, rename: the record is never partially visible
            // and survives a crash right after this function returns.
            let tmp = path.with_extension("json.tmp");
            {
                let mut file = File::create(&tmp)?;
                file.write_all(&serde_json::to_vec(&mark).map_err(|err| StoreError::Corrupt {
                    detail: format!("serializing mark: {err}"),
                })?)?;
                file.sync_all()?;
            }
            fs::rename(&tmp, &path)?;

            // Sync the directory so the rename itself is durable.
            #[cfg(unix)]
            {
                if let Ok(dir) = File::open(parent) {
                    let _ = dir.sync_all();
                }
            }

            Ok(())
        })
        .await
    }
}
