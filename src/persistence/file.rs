//! Flat-file snapshot store
//!
//! Writes go to a `.tmp` sibling first and are renamed over the target, so
//! a crash mid-write leaves the previous snapshot intact.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::warn;

use super::{PersistedCounts, SnapshotStore, StoreResult};

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut os: OsString = self.path.as_os_str().to_owned();
        os.push(".tmp");
        PathBuf::from(os)
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }
}

#[async_trait]
impl SnapshotStore for FileStore {
    async fn init(&self) -> StoreResult<()> {
        fs::create_dir_all(self.parent_dir()).await?;
        Ok(())
    }

    async fn load(&self) -> StoreResult<Option<PersistedCounts>> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<PersistedCounts>(&bytes) {
            Ok(counts) => Ok(Some(counts)),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    "Snapshot file is corrupt ({e}), starting with empty counters"
                );
                Ok(None)
            }
        }
    }

    async fn save(&self, counts: &PersistedCounts) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(counts)?;
        let tmp = self.tmp_path();
        fs::write(&tmp, &json).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn ping(&self) -> bool {
        fs::metadata(self.parent_dir()).await.is_ok()
    }
}
