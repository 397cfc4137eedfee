pub mod error;
pub mod import;
pub mod migrations;
pub mod models;
mod password;
pub mod queries;
pub mod users;

use rusqlite::{Connection, OpenFlags, Transaction, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::info;

pub use error::{StoreError, StoreResult};
pub use queries::{QueryIter, QueryListing, QueryStore};
pub use users::UserStore;

const DEFAULT_READER_POOL_SIZE: usize = 4;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Connection settings for [`Database::open`].
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    pub readers: usize,
    pub busy_timeout: Duration,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            readers: DEFAULT_READER_POOL_SIZE,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }

    /// Reads `HELPDESK_DB_PATH`, `HELPDESK_DB_READERS` and
    /// `HELPDESK_DB_BUSY_TIMEOUT_MS`, falling back to defaults when unset.
    pub fn from_env() -> anyhow::Result<Self> {
        let path = std::env::var("HELPDESK_DB_PATH").unwrap_or_else(|_| "helpdesk.db".into());
        let readers: usize = match std::env::var("HELPDESK_DB_READERS") {
            Ok(v) => v.parse()?,
            Err(_) => DEFAULT_READER_POOL_SIZE,
        };
        let busy_timeout_ms: u64 = match std::env::var("HELPDESK_DB_BUSY_TIMEOUT_MS") {
            Ok(v) => v.parse()?,
            Err(_) => DEFAULT_BUSY_TIMEOUT_MS,
        };

        Ok(Self {
            path: path.into(),
            readers,
            busy_timeout: Duration::from_millis(busy_timeout_ms),
        })
    }
}

/// Helpdesk database with a single writer and a round-robin pool of
/// read-only connections.
pub struct Database {
    writer: Mutex<Connection>,
    readers: Vec<Mutex<Connection>>,
    reader_idx: AtomicUsize,
}

impl Database {
    /// Opens (creating if needed) the database file, runs migrations and
    /// fills the reader pool.
    pub fn open(config: &DbConfig) -> StoreResult<Self> {
        ensure_parent_dir(&config.path)?;

        let writer = Connection::open(&config.path)?;
        // WAL mode for concurrent reads
        writer.pragma_update(None, "journal_mode", "WAL")?;
        writer.busy_timeout(config.busy_timeout)?;

        migrations::run(&writer)?;

        let pool_size = config.readers.max(1);
        let mut readers = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let conn = Connection::open_with_flags(
                &config.path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            conn.busy_timeout(config.busy_timeout)?;
            readers.push(Mutex::new(conn));
        }

        password::warm_up()?;

        info!(
            "Helpdesk DB opened at {} (1 writer + {} readers)",
            config.path.display(),
            pool_size
        );
        Ok(Self {
            writer: Mutex::new(writer),
            readers,
            reader_idx: AtomicUsize::new(0),
        })
    }

    /// Account operations.
    pub fn users(&self) -> UserStore<'_> {
        UserStore::new(self)
    }

    /// Client query operations.
    pub fn queries(&self) -> QueryStore<'_> {
        QueryStore::new(self)
    }

    /// Releases every connection, reporting the first close failure.
    pub fn close(self) -> StoreResult<()> {
        let Database { writer, readers, .. } = self;

        for reader in readers {
            let conn = reader
                .into_inner()
                .map_err(|e| StoreError::StorageUnavailable(format!("reader lock poisoned: {}", e)))?;
            conn.close().map_err(|(_, e)| StoreError::from(e))?;
        }

        let conn = writer
            .into_inner()
            .map_err(|e| StoreError::StorageUnavailable(format!("writer lock poisoned: {}", e)))?;
        conn.close().map_err(|(_, e)| StoreError::from(e))?;

        info!("Helpdesk DB closed");
        Ok(())
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        let idx = self.reader_idx.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let conn = self.readers[idx]
            .lock()
            .map_err(|e| StoreError::StorageUnavailable(format!("reader lock poisoned: {}", e)))?;
        f(&conn)
    }

    pub(crate) fn with_conn_mut<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        let conn = self
            .writer
            .lock()
            .map_err(|e| StoreError::StorageUnavailable(format!("writer lock poisoned: {}", e)))?;
        f(&conn)
    }
}

/// Begins a write transaction holding the write lock from `BEGIN`, so lock
/// contention with another process is waited out under the busy timeout.
pub(crate) fn begin_write(conn: &Connection) -> StoreResult<Transaction<'_>> {
    Ok(Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?)
}

fn ensure_parent_dir(path: &Path) -> StoreResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::StorageUnavailable(format!(
                    "cannot create {}: {}",
                    parent.display(),
                    e
                ))
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    pub(crate) fn open_temp() -> (TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&DbConfig::new(dir.path().join("helpdesk.db"))).unwrap();
        (dir, db)
    }
}
