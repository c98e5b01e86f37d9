// ABOUTME: Deploy lock to prevent concurrent deployments of the same stack.
// ABOUTME: Uses atomic file creation with lock info stored in ~/.local/state/berth/.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::StackName;

use super::error::{LockError, LockHolderInfo};

/// Base directory for berth state files (XDG Base Directory compliant).
const STATE_DIR: &str = ".local/state/berth";

/// Youngest age at which a lock whose holder cannot be checked is broken.
pub const MIN_STALE_AGE: Duration = Duration::from_secs(60 * 60);

/// Information about who holds a deploy lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockInfo {
    /// Hostname of the machine that holds the lock.
    pub holder: String,
    /// Process ID of the lock holder.
    pub pid: u32,
    /// When the lock was acquired.
    pub started_at: DateTime<Utc>,
    /// Stack being deployed.
    pub stack: String,
}

impl LockInfo {
    /// Create new lock info for the current process.
    pub fn new(stack: &StackName) -> Self {
        Self {
            holder: this_host(),
            pid: std::process::id(),
            started_at: Utc::now(),
            stack: stack.to_string(),
        }
    }

    /// Whether the lock may be broken without `--force-lock`.
    ///
    /// A holder on this host is checked directly: the lock is stale exactly
    /// when its process is gone, whatever its age. Other holders are judged
    /// by age against `max_age`; `None` means age alone never breaks a lock.
    pub fn is_stale(&self, max_age: Option<Duration>) -> bool {
        if let Some(alive) = self.holder_alive() {
            return !alive;
        }
        let Some(max_age) = max_age else {
            return false;
        };
        (Utc::now() - self.started_at)
            .to_std()
            .is_ok_and(|age| age >= max_age)
    }

    /// `None` when the holder runs on another host or liveness cannot be read.
    fn holder_alive(&self) -> Option<bool> {
        if self.holder != this_host() {
            return None;
        }
        process_alive(self.pid)
    }

    /// Default lock directory, `$HOME/.local/state/berth`.
    pub fn default_dir() -> Result<PathBuf, LockError> {
        std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(STATE_DIR))
            .ok_or_else(|| LockError::Io("HOME is not set; configure lock.dir".into()))
    }

    /// Path to the lock file for a stack.
    pub fn lock_path(dir: &Path, stack: &StackName) -> PathBuf {
        dir.join(format!("{stack}.lock"))
    }

    fn holder_info(&self) -> LockHolderInfo {
        LockHolderInfo {
            holder: self.holder.clone(),
            pid: self.pid,
            started_at: self.started_at,
        }
    }
}

fn this_host() -> String {
    gethostname::gethostname().to_string_lossy().into_owned()
}

#[cfg(target_os = "linux")]
fn process_alive(pid: u32) -> Option<bool> {
    Some(Path::new("/proc").join(pid.to_string()).exists())
}

#[cfg(not(target_os = "linux"))]
fn process_alive(_pid: u32) -> Option<bool> {
    None
}

/// A held deploy lock that releases on drop.
pub struct DeployLock {
    path: PathBuf,
    stack: StackName,
    released: bool,
}

impl std::fmt::Debug for DeployLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeployLock")
            .field("stack", &self.stack)
            .field("path", &self.path)
            .finish()
    }
}

impl DeployLock {
    /// Acquire the deploy lock for `stack` in `dir`, treating locks of
    /// unknown liveness as stale after [`MIN_STALE_AGE`].
    pub fn acquire(dir: &Path, stack: &StackName, force: bool) -> Result<Self, LockError> {
        Self::acquire_within(dir, stack, force, Some(MIN_STALE_AGE))
    }

    /// Acquire the deploy lock for `stack` in `dir`.
    ///
    /// The lock file is created with `create_new`, so two processes cannot both
    /// succeed. `budget` is the longest a deploy may run (`None` if
    /// unbounded): a lock whose holder cannot be checked is only broken once
    /// it is older than that, and never younger than [`MIN_STALE_AGE`].
    /// Stale and unreadable lock files are broken with a warning; `force`
    /// breaks any lock.
    pub fn acquire_within(
        dir: &Path,
        stack: &StackName,
        force: bool,
        budget: Option<Duration>,
    ) -> Result<Self, LockError> {
        std::fs::create_dir_all(dir).map_err(|e| {
            LockError::Io(format!(
                "failed to create state directory {}: {e}",
                dir.display()
            ))
        })?;

        let path = LockInfo::lock_path(dir, stack);
        let lock_json = serde_json::to_string(&LockInfo::new(stack))
            .map_err(|e| LockError::Io(format!("failed to serialize lock: {e}")))?;

        if Self::try_create(&path, &lock_json)? {
            return Ok(Self::held(path, stack));
        }

        // Lock acquisition failed - check if existing lock should be broken
        let max_age = budget.map(|b| b.max(MIN_STALE_AGE));
        Self::check_existing_lock(&path, force, max_age)?;

        tracing::debug!("removing stale/forced lock at {}", path.display());
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(LockError::Io(format!("failed to break lock: {e}"))),
        }

        if !Self::try_create(&path, &lock_json)? {
            return Err(LockError::Io(
                "lock acquired by another process during break".to_string(),
            ));
        }

        Ok(Self::held(path, stack))
    }

    fn held(path: PathBuf, stack: &StackName) -> Self {
        tracing::debug!("acquired deploy lock {}", path.display());
        Self {
            path,
            stack: stack.clone(),
            released: false,
        }
    }

    /// Atomically create the lock file. `Ok(false)` when it already exists.
    fn try_create(path: &Path, contents: &str) -> Result<bool, LockError> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                file.write_all(contents.as_bytes())
                    .map_err(|e| LockError::Io(format!("failed to write lock: {e}")))?;
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(LockError::Io(format!("failed to acquire lock: {e}"))),
        }
    }

    /// Decide whether an existing lock may be broken; `Err(Held)` if not.
    fn check_existing_lock(
        path: &Path,
        force: bool,
        max_age: Option<Duration>,
    ) -> Result<(), LockError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            // Released between our create attempt and this read
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(_) => {
                tracing::warn!("Lock info unreadable, breaking lock");
                return Ok(());
            }
        };

        match serde_json::from_str::<LockInfo>(&contents) {
            Ok(existing_lock) => {
                if force {
                    tracing::warn!(
                        "Breaking lock held by {} (pid {}) since {}",
                        existing_lock.holder,
                        existing_lock.pid,
                        existing_lock.started_at
                    );
                    Ok(())
                } else if existing_lock.is_stale(max_age) {
                    tracing::warn!(
                        "Auto-breaking stale lock held by {} (pid {}) since {}",
                        existing_lock.holder,
                        existing_lock.pid,
                        existing_lock.started_at
                    );
                    Ok(())
                } else {
                    Err(LockError::Held(existing_lock.holder_info()))
                }
            }
            Err(_) => {
                tracing::warn!("Lock info corrupted, breaking lock");
                Ok(())
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock.
    pub fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::Io(format!(
                "failed to remove {}: {e}",
                self.path.display()
            ))),
        }
    }
}

impl Drop for DeployLock {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != ErrorKind::NotFound
        {
            tracing::warn!("failed to release deploy lock {}: {}", self.path.display(), e);
        }
    }
}
