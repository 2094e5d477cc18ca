//! Cross-process mutual exclusion for mutating worktree operations.
//!
//! The lock is a small JSON record created with an exclusive create under the
//! repository's git common dir. A record is honoured only while its owner
//! process is alive and it is younger than the stale threshold; anything else
//! is reclaimed by the next process that wants the lock.

use crate::constants::{
    DEFAULT_LOCK_STALE_AFTER, DEFAULT_LOCK_TIMEOUT, LOCK_CORRUPT_GRACE, LOCK_FILE_NAME,
    LOCK_POLL_INTERVAL, METADATA_DIR_NAME,
};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
    thread,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

static TOKEN_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// How long `acquire` waits for a live holder before giving up.
    pub timeout: Duration,
    /// Records older than this are reclaimed even if the owner is alive.
    pub stale_after: Duration,
    pub poll_interval: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_LOCK_TIMEOUT,
            stale_after: DEFAULT_LOCK_STALE_AFTER,
            poll_interval: LOCK_POLL_INTERVAL,
        }
    }
}

/// On-disk contents of the lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub pid: u32,
    pub acquired_at_ms: u64,
    /// Distinguishes successive acquisitions by the same process.
    pub token: u64,
    pub holder: String,
}

impl LockRecord {
    fn current(holder: &str) -> Self {
        let acquired_at_ms = now_unix_millis();
        let sequence = TOKEN_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self {
            pid: std::process::id(),
            acquired_at_ms,
            token: acquired_at_ms.rotate_left(20) ^ sequence,
            holder: holder.to_string(),
        }
    }

    pub fn age(&self) -> Duration {
        Duration::from_millis(now_unix_millis().saturating_sub(self.acquired_at_ms))
    }

    pub fn is_owner_alive(&self) -> bool {
        is_pid_alive(self.pid)
    }

    pub fn is_stale(&self, stale_after: Duration) -> bool {
        !self.is_owner_alive() || self.age() > stale_after
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error(
        "timed out after {waited:?} waiting for the repository lock held by pid {} ({}); \
         if that process is gone, remove {}",
        .holder.as_ref().map_or_else(|| "unknown".to_string(), |h| h.pid.to_string()),
        .holder.as_ref().map_or("unknown operation", |h| h.holder.as_str()),
        .path.display()
    )]
    Timeout {
        path: PathBuf,
        holder: Option<LockRecord>,
        waited: Duration,
    },
    #[error("lock file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl LockError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Where the lock for a repository lives, given its git common dir.
pub fn lock_path(git_common_dir: &Path) -> PathBuf {
    git_common_dir.join(METADATA_DIR_NAME).join(LOCK_FILE_NAME)
}

/// A held repository lock. Dropping it releases the lock best-effort.
#[derive(Debug)]
pub struct RepoLock {
    path: PathBuf,
    record: LockRecord,
    released: bool,
}

impl RepoLock {
    pub fn acquire(
        git_common_dir: &Path,
        holder: &str,
        options: &LockOptions,
    ) -> Result<Self, LockError> {
        Self::acquire_at(lock_path(git_common_dir), holder, options)
    }

    pub fn acquire_at(
        path: PathBuf,
        holder: &str,
        options: &LockOptions,
    ) -> Result<Self, LockError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| LockError::io(&path, e))?;
        }

        let started = Instant::now();
        // No deadline when the timeout is too large to represent.
        let deadline = started.checked_add(options.timeout);
        let mut last_holder = None;

        loop {
            let record = LockRecord::current(holder);
            match try_create(&path, &record) {
                Ok(()) => {
                    log::info!("acquired repository lock {} for {holder}", path.display());
                    return Ok(Self {
                        path,
                        record,
                        released: false,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(LockError::io(&path, e)),
            }

            match inspect(&path, options.stale_after).map_err(|e| LockError::io(&path, e))? {
                Existing::Vanished => continue,
                Existing::Stale { raw, record } => {
                    if reclaim(&path, &raw).map_err(|e| LockError::io(&path, e))? {
                        match &record {
                            Some(r) => log::debug!(
                                "reclaimed stale lock {} (pid {}, holder {}, age {:?})",
                                path.display(),
                                r.pid,
                                r.holder,
                                r.age()
                            ),
                            None => log::debug!("reclaimed corrupt lock {}", path.display()),
                        }
                        continue;
                    }
                }
                Existing::Held(record) => last_holder = Some(record),
                Existing::Unreadable => {}
            }

            let now = Instant::now();
            let pause = match deadline {
                Some(deadline) if now >= deadline => {
                    return Err(LockError::Timeout {
                        path,
                        holder: last_holder,
                        waited: started.elapsed(),
                    });
                }
                Some(deadline) => options.poll_interval.min(deadline - now),
                None => options.poll_interval,
            };
            thread::sleep(pause);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self) -> &LockRecord {
        &self.record
    }

    /// Remove the lock file if it still belongs to this handle.
    pub fn release(mut self) -> Result<(), LockError> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<(), LockError> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        let _guard = ReclaimGuard::wait(&self.path, LOCK_CORRUPT_GRACE)
            .map_err(|e| LockError::io(&self.path, e))?;
        let current = match fs::read(&self.path) {
            Ok(raw) => serde_json::from_slice::<LockRecord>(&raw).ok(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::warn!(
                    "repository lock {} disappeared before release",
                    self.path.display()
                );
                return Ok(());
            }
            Err(e) => return Err(LockError::io(&self.path, e)),
        };

        match current {
            Some(record) if record.pid == self.record.pid && record.token == self.record.token => {
                remove_if_exists(&self.path).map_err(|e| LockError::io(&self.path, e))?;
                log::info!("released repository lock {}", self.path.display());
            }
            _ => log::warn!(
                "repository lock {} was reclaimed by another process; leaving it in place",
                self.path.display()
            ),
        }
        Ok(())
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            log::warn!("failed to release repository lock: {e}");
        }
    }
}

/// Run `f` while holding the repository lock, releasing it afterwards.
pub fn with_repo_lock<T, E, F>(
    git_common_dir: &Path,
    holder: &str,
    options: &LockOptions,
    f: F,
) -> Result<T, E>
where
    E: From<LockError>,
    F: FnOnce() -> Result<T, E>,
{
    let lock = RepoLock::acquire(git_common_dir, holder, options)?;
    let result = f();
    if let Err(e) = lock.release() {
        log::warn!("failed to release repository lock: {e}");
    }
    result
}

enum Existing {
    Vanished,
    Held(LockRecord),
    Stale {
        raw: Vec<u8>,
        record: Option<LockRecord>,
    },
    /// Unparseable but young enough that its writer may still be busy.
    Unreadable,
}

fn try_create(path: &Path, record: &LockRecord) -> io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    let json = serde_json::to_vec(record).map_err(io::Error::other)?;
    let written = file.write_all(&json).and_then(|()| file.sync_all());
    if let Err(e) = written {
        // Never leave a half-written record of ours behind.
        let _ = fs::remove_file(path);
        return Err(e);
    }
    Ok(())
}

fn inspect(path: &Path, stale_after: Duration) -> io::Result<Existing> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Existing::Vanished),
        Err(e) => return Err(e),
    };

    match serde_json::from_slice::<LockRecord>(&raw) {
        Ok(record) if record.is_stale(stale_after) => Ok(Existing::Stale {
            raw,
            record: Some(record),
        }),
        Ok(record) => Ok(Existing::Held(record)),
        Err(_) => {
            if modified_age(path) > LOCK_CORRUPT_GRACE {
                Ok(Existing::Stale { raw, record: None })
            } else {
                Ok(Existing::Unreadable)
            }
        }
    }
}

/// Unlink the lock only if it still holds exactly the bytes judged stale, so
/// a fresh lock written by a faster competitor is left alone. The re-check and
/// the unlink happen under the reclaim guard.
fn reclaim(path: &Path, judged: &[u8]) -> io::Result<bool> {
    let Some(_guard) = ReclaimGuard::try_acquire(path)? else {
        return Ok(false);
    };
    match fs::read(path) {
        Ok(current) if current == judged => {
            remove_if_exists(path)?;
            Ok(true)
        }
        Ok(_) => Ok(false),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Exclusive right to re-check and unlink the lock file at `lock`.
struct ReclaimGuard {
    path: PathBuf,
}

impl ReclaimGuard {
    fn path_for(lock: &Path) -> PathBuf {
        lock.with_extension("reclaim")
    }

    fn try_acquire(lock: &Path) -> io::Result<Option<Self>> {
        let path = Self::path_for(lock);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(Some(Self { path })),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                // Guards live for microseconds; an old one was left by a crash.
                if modified_age(&path) > LOCK_CORRUPT_GRACE {
                    log::debug!("removing abandoned reclaim guard {}", path.display());
                    remove_if_exists(&path)?;
                }
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Retry for up to `patience`. `None` means the guard stayed busy.
    fn wait(lock: &Path, patience: Duration) -> io::Result<Option<Self>> {
        let started = Instant::now();
        loop {
            if let Some(guard) = Self::try_acquire(lock)? {
                return Ok(Some(guard));
            }
            if started.elapsed() >= patience {
                log::warn!(
                    "reclaim guard for {} stayed busy for {patience:?}",
                    lock.display()
                );
                return Ok(None);
            }
            thread::sleep(LOCK_POLL_INTERVAL);
        }
    }
}

impl Drop for ReclaimGuard {
    fn drop(&mut self) {
        if let Err(e) = remove_if_exists(&self.path) {
            log::warn!("failed to remove reclaim guard {}: {e}", self.path.display());
        }
    }
}

fn modified_age(path: &Path) -> Duration {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .unwrap_or_default()
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn now_unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Whether `pid` names a live process on this machine.
#[cfg(unix)]
pub fn is_pid_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 performs only the existence and permission check.
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

/// Liveness cannot be probed here; only the age rule reclaims locks.
#[cfg(not(unix))]
pub fn is_pid_alive(_pid: u32) -> bool {
    true
}
