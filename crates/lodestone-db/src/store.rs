//! Embedded SQLite connection handling for the durable key store.
//!
//! The store is a process-scoped resource: it is opened once at startup
//! with [`DurableStore::open`], shared by clone, and released with
//! [`DurableStore::close`] on shutdown. All atomicity comes from single SQL
//! statements or short transactions; no lock outside the database guards
//! any key.
//!
//! Uses [`sqlx`] with runtime query construction (not compile-time checked)
//! so no database is needed at build time. All queries are parameterized.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use crate::announcement_store::AnnouncementStore;
use crate::claim_store::ClaimStore;
use crate::error::DbError;
use crate::snapshot_store::SnapshotStore;

/// Default maximum number of pooled connections for a file database.
const DEFAULT_MAX_CONNECTIONS: u32 = 4;

/// Default time a statement waits on a locked database, in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// A SQLite file, created if missing.
    File(PathBuf),
    /// A private in-memory database (tests and dry runs).
    Memory,
}

/// Configuration for the key store connection pool.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database location.
    pub location: StoreLocation,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// How long a statement waits for a lock held by another connection.
    pub busy_timeout: Duration,
}

impl StoreConfig {
    /// Configuration for a SQLite file at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            location: StoreLocation::File(path.as_ref().to_path_buf()),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }

    /// Configuration for a private in-memory database.
    ///
    /// The pool is pinned to one connection that is never recycled, since
    /// every new SQLite memory connection would see an empty database.
    pub const fn in_memory() -> Self {
        Self {
            location: StoreLocation::Memory,
            max_connections: 1,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub const fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the busy timeout.
    #[must_use]
    pub const fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

/// Handle to the durable key store.
///
/// Cheap to clone; every clone shares the same pool.
#[derive(Clone, Debug)]
pub struct DurableStore {
    pool: SqlitePool,
}

impl DurableStore {
    /// Open the database described by `config` and apply pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] for an invalid configuration,
    /// [`DbError::Unavailable`] if the database cannot be opened and
    /// [`DbError::Migration`] if the schema cannot be applied.
    pub async fn open(config: &StoreConfig) -> Result<Self, DbError> {
        if config.max_connections == 0 {
            return Err(DbError::Config("max_connections must be at least 1".to_owned()));
        }

        let pool = match &config.location {
            StoreLocation::File(path) => {
                let options = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .busy_timeout(config.busy_timeout);
                SqlitePoolOptions::new()
                    .max_connections(config.max_connections)
                    .connect_with(options)
                    .await?
            }
            StoreLocation::Memory => {
                let options: SqliteConnectOptions = "sqlite::memory:"
                    .parse()
                    .map_err(|e: sqlx::Error| DbError::Config(format!("invalid memory URL: {e}")))?;
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect_with(options.busy_timeout(config.busy_timeout))
                    .await?
            }
        };

        let store = Self { pool };
        store.run_migrations().await?;

        tracing::info!(
            location = ?config.location,
            max_connections = config.max_connections,
            "Opened key store"
        );

        Ok(store)
    }

    /// Open a fresh in-memory store.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if SQLite cannot be initialized.
    pub async fn open_in_memory() -> Result<Self, DbError> {
        Self::open(&StoreConfig::in_memory()).await
    }

    /// Apply all pending migrations from the `migrations/` directory.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Migration`] if any migration fails.
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::debug!("Key store migrations completed");
        Ok(())
    }

    /// Region-claim operations.
    pub const fn claims(&self) -> ClaimStore<'_> {
        ClaimStore::new(&self.pool)
    }

    /// Actor-snapshot operations.
    pub const fn snapshots(&self) -> SnapshotStore<'_> {
        SnapshotStore::new(&self.pool)
    }

    /// Announcement-feed operations.
    pub const fn announcements(&self) -> AnnouncementStore<'_> {
        AnnouncementStore::new(&self.pool)
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Return a reference to the underlying [`SqlitePool`].
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every connection. Later operations report unavailable.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Key store closed");
    }
}
