//! Persisted client-address blacklist
//!
//! One entry per line: either a bare address (blocked forever) or an
//! address followed by the unix time at which the block expires.
//! Entries are only ever appended; [`BlacklistStore::prune`] is the single
//! operation that rewrites the file.
//!
//! Writers in different processes (the server and `spool-user blacklist
//! prune`) serialize on an advisory lock held on `<path>.lock`.

use crate::error::{MailError, Result};
use fs2::FileExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A single blacklist line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlacklistEntry {
    pub address: String,
    /// Unix seconds; `None` never expires
    pub expires_at: Option<i64>,
}

impl BlacklistEntry {
    /// Parse one line, `None` for blank or malformed lines
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let address = parts.next()?.to_string();

        let expires_at = match parts.next() {
            Some(raw) => Some(raw.parse::<i64>().ok()?),
            None => None,
        };

        if parts.next().is_some() {
            return None;
        }

        Some(Self {
            address,
            expires_at,
        })
    }

    pub fn is_active(&self, now: i64) -> bool {
        self.expires_at.map_or(true, |expires| now < expires)
    }

    fn to_line(&self) -> String {
        match self.expires_at {
            Some(expires) => format!("{} {}\n", self.address, expires),
            None => format!("{}\n", self.address),
        }
    }
}

/// Exclusive advisory lock, released when dropped
struct FileLock {
    file: std::fs::File,
}

impl FileLock {
    async fn acquire(path: PathBuf) -> Result<Self> {
        tokio::task::spawn_blocking(move || -> Result<Self> {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .open(&path)?;
            file.lock_exclusive()?;
            Ok(Self { file })
        })
        .await
        .map_err(|e| MailError::Storage(format!("Blacklist lock task failed: {}", e)))?
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release blacklist lock: {}", e);
        }
    }
}

/// Line-oriented blacklist file
pub struct BlacklistStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl BlacklistStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Serialize writers in this process, then across processes
    async fn lock_for_write(&self) -> Result<(tokio::sync::MutexGuard<'_, ()>, FileLock)> {
        let guard = self.write_lock.lock().await;
        self.ensure_parent().await?;
        let file_lock = FileLock::acquire(self.lock_path()).await?;
        Ok((guard, file_lock))
    }

    /// All parseable entries, active or not. A missing file is empty.
    pub async fn entries(&self) -> Result<Vec<BlacklistEntry>> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(MailError::Storage(format!(
                    "Failed to read blacklist {:?}: {}",
                    self.path, e
                )))
            }
        };

        Ok(contents.lines().filter_map(BlacklistEntry::parse).collect())
    }

    /// Whether `address` has an active entry
    pub async fn contains(&self, address: &str) -> Result<bool> {
        let now = chrono::Utc::now().timestamp();
        let blocked = self
            .entries()
            .await?
            .iter()
            .any(|entry| entry.address == address && entry.is_active(now));

        if blocked {
            debug!("{} is blacklisted", address);
        }
        Ok(blocked)
    }

    /// Append an entry for `address`; `ban` of `None` blocks permanently
    pub async fn append(&self, address: &str, ban: Option<Duration>) -> Result<()> {
        let entry = BlacklistEntry {
            address: address.to_string(),
            expires_at: ban.map(|ban| {
                let secs = i64::try_from(ban.as_secs()).unwrap_or(i64::MAX);
                chrono::Utc::now().timestamp().saturating_add(secs)
            }),
        };

        let _locks = self.lock_for_write().await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                MailError::Storage(format!("Failed to open blacklist {:?}: {}", self.path, e))
            })?;
        file.write_all(entry.to_line().as_bytes()).await?;
        file.flush().await?;

        match entry.expires_at {
            Some(expires) => warn!("Blacklisted {} until {}", address, expires),
            None => warn!("Blacklisted {} permanently", address),
        }
        Ok(())
    }

    /// Rewrite the file without expired entries, returning how many were removed
    pub async fn prune(&self) -> Result<usize> {
        let _locks = self.lock_for_write().await?;

        let entries = self.entries().await?;
        let now = chrono::Utc::now().timestamp();
        let (active, expired): (Vec<_>, Vec<_>) =
            entries.into_iter().partition(|entry| entry.is_active(now));

        if expired.is_empty() {
            return Ok(0);
        }

        let contents: String = active.iter().map(BlacklistEntry::to_line).collect();
        let partial = self.path.with_extension("tmp");
        fs::write(&partial, contents).await?;
        fs::rename(&partial, &self.path).await?;

        info!(
            "Pruned {} expired blacklist entries from {}",
            expired.len(),
            self.path.display()
        );
        Ok(expired.len())
    }

    async fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    MailError::Storage(format!("Failed to create directory {:?}: {}", parent, e))
                })?;
            }
        }
        Ok(())
    }
}
