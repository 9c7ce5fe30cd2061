use std::path::Path;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use tracing::info;

use super::StoreResult;
use crate::constants::{SCHEMA_VERSION, STORE_FILE};
use crate::models::{Handle, StoreCounts, TweetId};

/// Additive schema steps. A store opened below a step's version gets that
/// step applied; sets that already exist are never touched.
pub(crate) const MIGRATIONS: &[(i32, &str)] = &[
    (
        1,
        r#"
        CREATE TABLE IF NOT EXISTS monitored_users (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            handle TEXT NOT NULL UNIQUE,
            target_tweets INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS keywords (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            term TEXT NOT NULL UNIQUE,
            match_count INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS user_gather (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            handle TEXT NOT NULL UNIQUE,
            target_tweets INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS tweet_queue (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            tweet_id TEXT NOT NULL UNIQUE,
            author TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS reported_tweets (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            tweet_id TEXT NOT NULL UNIQUE,
            author TEXT,
            report_count INTEGER NOT NULL,
            last_reported_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS reported_users (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            handle TEXT NOT NULL UNIQUE,
            report_count INTEGER NOT NULL,
            last_reported_at INTEGER NOT NULL
        );
        "#,
    ),
    (
        2,
        r#"
        CREATE TABLE IF NOT EXISTS regex_patterns (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            pattern TEXT NOT NULL UNIQUE,
            match_count INTEGER NOT NULL DEFAULT 0
        );
        "#,
    ),
    (
        4,
        r#"
        CREATE TABLE IF NOT EXISTS unreported_tweets (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            tweet_id TEXT NOT NULL UNIQUE,
            author TEXT,
            text TEXT NOT NULL
        );
        "#,
    ),
    (
        5,
        r#"
        CREATE TABLE IF NOT EXISTS unreported_tweet_ids (
            tweet_id TEXT PRIMARY KEY,
            staged_seq INTEGER
        );
        "#,
    ),
];

/// Durable home of every record set.
///
/// Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the store inside `data_dir`.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> StoreResult<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;

        let conn = Connection::open(data_dir.join(STORE_FILE))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::with_connection(conn)
    }

    /// Store that lives only as long as the process.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(mut conn: Connection) -> StoreResult<Self> {
        migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    pub fn schema_version(&self) -> StoreResult<i32> {
        Ok(user_version(&self.conn())?)
    }

    pub fn counts(&self) -> StoreResult<StoreCounts> {
        let conn = self.conn();
        let count = |table: &str| -> rusqlite::Result<u64> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get::<_, i64>(0)
            })
            .map(|n| n as u64)
        };

        Ok(StoreCounts {
            monitored_users: count("monitored_users")?,
            keywords: count("keywords")?,
            regex_patterns: count("regex_patterns")?,
            gather_queue: count("user_gather")?,
            tweet_queue: count("tweet_queue")?,
            reported_tweets: count("reported_tweets")?,
            reported_users: count("reported_users")?,
            unreported_tweets: count("unreported_tweets")?,
            unreported_ids: count("unreported_tweet_ids")?,
        })
    }
}

fn user_version(conn: &Connection) -> rusqlite::Result<i32> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

fn migrate(conn: &mut Connection) -> StoreResult<()> {
    let from = user_version(conn)?;
    if from >= SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (version, sql) in MIGRATIONS {
        if from < *version {
            tx.execute_batch(sql)?;
        }
    }
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;

    info!(from, to = SCHEMA_VERSION, "Migrated store schema");
    Ok(())
}

pub(crate) fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

fn invalid_column(idx: usize, err: crate::models::InvalidKey) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn handle_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Handle> {
    let raw: String = row.get(idx)?;
    Handle::parse(&raw).map_err(|e| invalid_column(idx, e))
}

pub(crate) fn opt_handle_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Handle>> {
    let raw: Option<String> = row.get(idx)?;
    Ok(raw.as_deref().and_then(Handle::new))
}

pub(crate) fn tweet_id_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<TweetId> {
    let raw: String = row.get(idx)?;
    TweetId::parse(&raw).map_err(|e| invalid_column(idx, e))
}

pub(crate) fn exists(conn: &Connection, sql: &str, key: &str) -> StoreResult<bool> {
    let count: i64 = conn.query_row(sql, params![key], |row| row.get(0))?;
    Ok(count > 0)
}
