//! Unique Chrome user-data-dir management for locally launched sessions.
//!
//! UUID-based naming avoids `SingletonLock` contention between concurrently
//! launched sessions; `is_singleton_lock_stale` lets a maintenance sweep
//! reclaim directories left behind by a crashed process.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// RAII wrapper for a Chrome profile directory. Cleans up on drop unless
/// `into_path()` hands ownership to the browser process lifecycle instead.
#[derive(Debug)]
pub struct BrowserProfile {
    path: PathBuf,
    cleanup_on_drop: bool,
}

impl BrowserProfile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            cleanup_on_drop: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Consume and return the path, disabling auto-cleanup. Use when the
    /// browser process (not this guard) now owns the directory's lifetime.
    pub fn into_path(mut self) -> PathBuf {
        self.cleanup_on_drop = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for BrowserProfile {
    fn drop(&mut self) {
        if self.cleanup_on_drop && self.path.exists() {
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!(path = %self.path.display(), error = %e, "failed to clean up profile directory");
            }
        }
    }
}

pub fn create_unique_profile_with_prefix(prefix: &str) -> Result<BrowserProfile> {
    let path = std::env::temp_dir().join(format!("{prefix}_{}", Uuid::new_v4()));
    debug!(path = %path.display(), "creating unique browser profile");
    std::fs::create_dir(&path)
        .with_context(|| format!("failed to create profile directory: {}", path.display()))?;
    Ok(BrowserProfile::new(path))
}

/// `SingletonLock` is a symlink with target `{hostname}-{pid}`; stale means
/// that pid is no longer running.
#[cfg(unix)]
pub fn is_singleton_lock_stale(profile_dir: &Path) -> bool {
    let lock_path = profile_dir.join("SingletonLock");
    if !lock_path.exists() && !lock_path.is_symlink() {
        return true;
    }

    match std::fs::read_link(&lock_path) {
        Ok(target) => {
            let target_str = target.to_string_lossy();
            if let Some(pid_str) = target_str.rsplit('-').next()
                && let Ok(pid) = pid_str.parse::<i32>()
            {
                let exists = unsafe { libc::kill(pid, 0) == 0 };
                return !exists;
            }
            false
        }
        Err(_) => lock_path.is_file(),
    }
}

#[cfg(not(unix))]
pub fn is_singleton_lock_stale(_profile_dir: &Path) -> bool {
    true
}

/// Remove profile directories left over from a crashed process. Best-effort;
/// intended to run once at startup.
pub fn cleanup_stale_profiles(prefix: &str) -> Result<usize> {
    let temp_dir = std::env::temp_dir();
    let mut cleaned = 0;

    let entries = std::fs::read_dir(&temp_dir)
        .with_context(|| format!("failed to read temp directory: {}", temp_dir.display()))?;

    for entry in entries.flatten() {
        let path = entry.path();
        if let Some(name) = path.file_name().and_then(|n| n.to_str())
            && name.starts_with(prefix)
            && path.is_dir()
            && is_singleton_lock_stale(&path)
        {
            if std::fs::remove_dir_all(&path).is_ok() {
                cleaned += 1;
            }
        }
    }

    if cleaned > 0 {
        info!(cleaned, "cleaned stale browser profile directories");
    }
    Ok(cleaned)
}
