//! Library index persistence.
//!
//! Uses SQLx with SQLite. All scan-time access goes through [`Db`], which
//! pairs every transaction with a guard on a process-wide reader/writer lock:
//! any number of read transactions may be open at once, a write transaction
//! is exclusive. Guards live exactly as long as their transaction.
//!
//! Query helpers take a `&mut SqliteConnection` so they can run inside either
//! kind of transaction:
//!
//! ```ignore
//! use music_indexer::db::{Db, track};
//!
//! let db = Db::open("sqlite:index.db").await?;
//! let mut tx = db.read_tx().await?;
//! let found = track::find_by_path(tx.conn(), "/music/a.flac").await?;
//! ```

pub mod artist;
pub mod artist_info;
pub mod artwork;
pub mod cluster;
pub mod cursor;
pub mod files;
pub mod image;
pub mod library;
pub mod lyrics;
pub mod orphan;
pub mod playlist;
pub mod release;
pub mod settings;
pub mod track;

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::migrate::MigrateDatabase;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::error::{Result, ResultExt};

/// Default database filename, used when no data directory is available.
pub const DEFAULT_DB_NAME: &str = "music_indexer.db";

/// Build a SQLite database URL from an optional path.
pub fn db_url(path: Option<&Path>) -> String {
    match path {
        Some(p) => format!("sqlite:{}", p.display()),
        None => format!("sqlite:{}", DEFAULT_DB_NAME),
    }
}

/// Initialize the database connection pool and run migrations.
///
/// Creates the database file if it doesn't exist, establishes a connection
/// pool with up to 5 connections in WAL mode with foreign keys enforced, and
/// runs all pending migrations.
pub async fn init_db(db_url: &str) -> std::result::Result<SqlitePool, sqlx::Error> {
    if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
        Sqlite::create_database(db_url).await?;
    }

    let options = SqliteConnectOptions::from_str(db_url)?
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Connection pool plus the reader/writer lock serializing writers.
#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
    lock: Arc<RwLock<()>>,
}

impl Db {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            lock: Arc::new(RwLock::new(())),
        }
    }

    /// Open (and create/migrate if needed) the index at `url`.
    pub async fn open(url: &str) -> Result<Self> {
        let pool = init_db(url)
            .await
            .with_context(format!("opening library index {url}"))?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Begin a shared read transaction.
    pub async fn read_tx(&self) -> Result<ReadTx> {
        let guard = Arc::clone(&self.lock).read_owned().await;
        let tx = self.pool.begin().await?;
        Ok(ReadTx { tx, _guard: guard })
    }

    /// Begin the exclusive write transaction. Waits for open readers to finish.
    pub async fn write_tx(&self) -> Result<WriteTx> {
        let guard = Arc::clone(&self.lock).write_owned().await;
        let tx = self.pool.begin().await?;
        Ok(WriteTx { tx, _guard: guard })
    }
}

/// A read transaction. Rolled back on drop.
pub struct ReadTx {
    // Dropped before the guard
    tx: Transaction<'static, Sqlite>,
    _guard: OwnedRwLockReadGuard<()>,
}

impl ReadTx {
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }
}

/// The write transaction. Changes are discarded unless [`WriteTx::commit`] is called.
pub struct WriteTx {
    tx: Transaction<'static, Sqlite>,
    _guard: OwnedRwLockWriteGuard<()>,
}

impl WriteTx {
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
