//! Bind-mount management for publishing volumes into workloads.
//!
//! [`MountManager`] owns the idempotency rules of the Node service:
//!
//! * publishing a source onto a target that already shows that source is a
//!   no-op, while a target bound to anything else is refused;
//! * unpublishing a target that is not a mount point is a no-op.
//!
//! No binding is remembered between calls.  Every decision is taken against
//! the live mount table through the [`Mounter`] seam, so state left behind by
//! a crashed process is torn down like any other binding.  Calls for the same
//! target path are serialized; distinct targets never contend.

use std::future::Future;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use nix::errno::Errno;
use nix::mount::MsFlags;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::CsiError;
use crate::store::create_dir;

/// Low-level access to the host mount table.
pub trait Mounter: Send + Sync {
    /// Whether `target` is currently a mount point.
    fn is_mounted(&self, target: &Path) -> io::Result<bool>;

    /// Whether the mount at `target` exposes the directory `source`.
    fn is_bound_to(&self, source: &Path, target: &Path) -> io::Result<bool>;

    /// Bind `source` onto `target`, read-only if requested.
    fn bind(&self, source: &Path, target: &Path, read_only: bool) -> io::Result<()>;

    /// Unmount `target`.  Returns `false` when nothing was mounted there.
    fn unmount(&self, target: &Path) -> io::Result<bool>;
}

// ---------------------------------------------------------------------------
// Host mount table
// ---------------------------------------------------------------------------

/// [`Mounter`] backed by `mount(2)` / `umount(2)` and `/proc/self/mounts`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostMounter;

const PROC_MOUNTS: &str = "/proc/self/mounts";

impl Mounter for HostMounter {
    fn is_mounted(&self, target: &Path) -> io::Result<bool> {
        let target = std::fs::canonicalize(target).unwrap_or_else(|_| target.to_path_buf());
        let contents = std::fs::read_to_string(PROC_MOUNTS)?;
        Ok(mount_points(&contents).any(|mp| Path::new(&mp) == target))
    }

    fn is_bound_to(&self, source: &Path, target: &Path) -> io::Result<bool> {
        // A bind mount shows the source directory's inode at the target.
        let source = std::fs::metadata(source)?;
        let target = std::fs::metadata(target)?;
        Ok(source.dev() == target.dev() && source.ino() == target.ino())
    }

    fn bind(&self, source: &Path, target: &Path, read_only: bool) -> io::Result<()> {
        nix::mount::mount(
            Some(source),
            target,
            None::<&str>,
            MsFlags::MS_BIND,
            None::<&str>,
        )?;

        // MS_RDONLY is ignored on the initial bind; it only takes effect on a
        // bind remount.
        if read_only {
            let remount = nix::mount::mount(
                None::<&str>,
                target,
                None::<&str>,
                MsFlags::MS_BIND | MsFlags::MS_REMOUNT | MsFlags::MS_RDONLY,
                None::<&str>,
            );
            if let Err(e) = remount {
                if let Err(undo) = nix::mount::umount(target) {
                    warn!(target = %target.display(), error = %undo, "failed to undo read-write bind");
                }
                return Err(e.into());
            }
        }
        Ok(())
    }

    fn unmount(&self, target: &Path) -> io::Result<bool> {
        match nix::mount::umount(target) {
            Ok(()) => Ok(true),
            // EINVAL: target is not a mount point.
            Err(Errno::EINVAL) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Iterate over the mount point column of a `/proc/self/mounts` listing.
///
/// Format: `<device> <mountpoint> <fstype> <options> <dump> <pass>`, with
/// whitespace and backslashes in paths written as octal escapes.
fn mount_points(contents: &str) -> impl Iterator<Item = String> + '_ {
    contents
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .map(unescape_octal)
}

fn unescape_octal(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && let Some(digits) = bytes.get(i + 1..i + 4)
            && digits.iter().all(|d| (b'0'..=b'7').contains(d))
        {
            let value = digits.iter().fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
            if let Ok(b) = u8::try_from(value) {
                out.push(b);
                i += 4;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

// ---------------------------------------------------------------------------
// In-memory mount table
// ---------------------------------------------------------------------------

/// A binding recorded by [`MemoryMounter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub source: PathBuf,
    pub read_only: bool,
}

/// [`Mounter`] that keeps an explicit target → source registry instead of
/// touching the host.
///
/// Used by tests and for running the plugin without mount privileges.  It
/// enforces the same preconditions as the kernel: both directories must
/// exist and a target can hold only one binding.
#[derive(Debug, Default)]
pub struct MemoryMounter {
    bindings: DashMap<PathBuf, Binding>,
}

impl MemoryMounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The binding currently recorded at `target`, if any.
    pub fn binding(&self, target: &Path) -> Option<Binding> {
        self.bindings.get(target).map(|b| b.clone())
    }

    /// Number of active bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl Mounter for MemoryMounter {
    fn is_mounted(&self, target: &Path) -> io::Result<bool> {
        Ok(self.bindings.contains_key(target))
    }

    fn is_bound_to(&self, source: &Path, target: &Path) -> io::Result<bool> {
        Ok(self
            .bindings
            .get(target)
            .is_some_and(|b| b.source == source))
    }

    fn bind(&self, source: &Path, target: &Path, read_only: bool) -> io::Result<()> {
        if !source.is_dir() || !target.is_dir() {
            return Err(Errno::ENOENT.into());
        }
        match self.bindings.entry(target.to_path_buf()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(Errno::EBUSY.into()),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Binding {
                    source: source.to_path_buf(),
                    read_only,
                });
                Ok(())
            }
        }
    }

    fn unmount(&self, target: &Path) -> io::Result<bool> {
        Ok(self.bindings.remove(target).is_some())
    }
}

// ---------------------------------------------------------------------------
// Mount manager
// ---------------------------------------------------------------------------

/// Publishes and unpublishes bind mounts with idempotent semantics.
pub struct MountManager {
    mounter: Arc<dyn Mounter>,
    /// One lock per target path with a call in flight.
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl MountManager {
    pub fn new(mounter: Arc<dyn Mounter>) -> Self {
        Self {
            mounter,
            locks: DashMap::new(),
        }
    }

    /// Bind `source` onto `target`, creating `target` if needed.
    ///
    /// Succeeds without touching the mount table when `target` already shows
    /// `source`.  A `read_only` flag that differs from the existing binding is
    /// not reconciled.
    pub async fn publish(
        &self,
        source: &Path,
        target: &Path,
        read_only: bool,
    ) -> Result<(), CsiError> {
        self.serialized(target, self.publish_locked(source, target, read_only))
            .await
    }

    /// Unmount `target`; a target that is not mounted is left alone.
    pub async fn unpublish(&self, target: &Path) -> Result<(), CsiError> {
        self.serialized(target, async { self.unpublish_locked(target) })
            .await
    }

    /// Run `call` while holding the lock for `target`.
    ///
    /// The lock entry is released when this future completes or is dropped
    /// part way, e.g. when the caller hangs up.
    async fn serialized<T>(&self, target: &Path, call: impl Future<Output = T>) -> T {
        // Dropped last: the entry may only go once this call's `Arc` is gone.
        let _slot = LockSlot {
            locks: &self.locks,
            target,
        };
        let lock = self.lock_for(target);
        let _held = lock.lock().await;
        call.await
    }

    async fn publish_locked(
        &self,
        source: &Path,
        target: &Path,
        read_only: bool,
    ) -> Result<(), CsiError> {
        let mount_failed = |reason: String| CsiError::MountFailed {
            path: target.display().to_string(),
            reason,
        };

        if self.mounter.is_mounted(target).map_err(|e| mount_failed(e.to_string()))? {
            let same = self
                .mounter
                .is_bound_to(source, target)
                .map_err(|e| mount_failed(e.to_string()))?;
            if same {
                debug!(target = %target.display(), "target already bound, assuming idempotent retry");
                return Ok(());
            }
            return Err(mount_failed(format!(
                "already mounted from a source other than {}",
                source.display()
            )));
        }

        create_dir(target).await.map_err(|e| mount_failed(e.to_string()))?;

        self.mounter
            .bind(source, target, read_only)
            .map_err(|e| mount_failed(format!("bind mount {}: {e}", source.display())))?;

        info!(
            source = %source.display(),
            target = %target.display(),
            read_only,
            "bind mount created",
        );
        Ok(())
    }

    fn unpublish_locked(&self, target: &Path) -> Result<(), CsiError> {
        let unmount_failed = |e: io::Error| CsiError::UnmountFailed {
            path: target.display().to_string(),
            reason: e.to_string(),
        };

        if !self.mounter.is_mounted(target).map_err(unmount_failed)? {
            debug!(target = %target.display(), "target not mounted, nothing to unpublish");
            return Ok(());
        }

        if self.mounter.unmount(target).map_err(unmount_failed)? {
            info!(target = %target.display(), "bind mount removed");
        } else {
            debug!(target = %target.display(), "target was unmounted concurrently");
        }
        Ok(())
    }

    fn lock_for(&self, target: &Path) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(target.to_path_buf()).or_default().value())
    }
}

/// Removes the lock entry for `target` on drop once no other call holds it.
struct LockSlot<'a> {
    locks: &'a DashMap<PathBuf, Arc<Mutex<()>>>,
    target: &'a Path,
}

impl Drop for LockSlot<'_> {
    fn drop(&mut self) {
        self.locks
            .remove_if(self.target, |_, lock| Arc::strong_count(lock) == 1);
    }
}
