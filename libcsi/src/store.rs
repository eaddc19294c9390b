//! Directory-backed volume store.
//!
//! Every volume is a directory named after its ID directly below the state
//! root:
//!
//! ```text
//! <state_root>/
//!   <volume-id>/            # backing directory, contents owned by workloads
//! ```
//!
//! No metadata is written next to the directories; the path is recomputed
//! from the ID on every call, so any process sharing the state root can find
//! a volume from its ID alone.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::CsiError;
use crate::types::VolumeId;

/// Permission bits for the state root and every directory created below it.
const DIR_MODE: u32 = 0o750;

/// Maps volume IDs to backing directories under a state root.
#[derive(Debug, Clone)]
pub struct VolumeStore {
    root: PathBuf,
}

impl VolumeStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve the backing directory for a volume.
    ///
    /// Callers validate the ID first; see [`VolumeId::validate`].
    pub fn volume_path(&self, volume_id: &VolumeId) -> PathBuf {
        self.root.join(volume_id.as_str())
    }

    /// Create the state root if it does not exist yet.
    pub async fn init(&self) -> Result<(), CsiError> {
        create_dir(&self.root).await?;
        debug!(root = %self.root.display(), "volume store ready");
        Ok(())
    }

    /// Make sure the backing directory for `volume_id` exists and return it.
    ///
    /// An existing directory is not an error, which also makes concurrent
    /// calls for the same ID converge.
    pub async fn ensure(&self, volume_id: &VolumeId) -> Result<PathBuf, CsiError> {
        let path = self.volume_path(volume_id);
        create_dir(&path).await?;
        Ok(path)
    }

    /// Remove the backing directory for `volume_id` and everything below it.
    ///
    /// A directory that is already gone counts as removed.
    pub async fn remove(&self, volume_id: &VolumeId) -> Result<(), CsiError> {
        let path = self.volume_path(volume_id);
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(%volume_id, "backing directory already gone");
                Ok(())
            }
            Err(e) => Err(CsiError::BackendError(format!(
                "remove volume dir {}: {e}",
                path.display()
            ))),
        }
    }

    /// List the IDs of all volumes currently present under the state root.
    pub async fn volumes(&self) -> Result<Vec<VolumeId>, CsiError> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(d) => d,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CsiError::BackendError(format!(
                    "read_dir {}: {e}",
                    self.root.display()
                )));
            }
        };

        let mut ids = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(CsiError::backend)? {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                ids.push(VolumeId::from(name));
            }
        }
        ids.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(ids)
    }

    /// Scan the state root left behind by a previous run and report what is
    /// there.  Nothing is modified: every volume found stays usable through
    /// its ID.
    pub async fn recover(&self) -> Result<usize, CsiError> {
        let ids = self.volumes().await?;
        for id in &ids {
            debug!(volume_id = %id, "found existing volume");
        }
        info!(root = %self.root.display(), count = ids.len(), "volume store recovered");
        Ok(ids.len())
    }
}

/// Recursively create `path` with [`DIR_MODE`]; an existing directory is
/// success.
pub(crate) async fn create_dir(path: &Path) -> Result<(), CsiError> {
    tokio::fs::DirBuilder::new()
        .recursive(true)
        .mode(DIR_MODE)
        .create(path)
        .await
        .map_err(|e| CsiError::BackendError(format!("create dir {}: {e}", path.display())))
}
