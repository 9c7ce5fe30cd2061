//! Monitored users, the user-gather queue and the tweet queue.

use rusqlite::{params, OptionalExtension};

use super::db::{exists, handle_col, tweet_id_col, Database};
use super::StoreResult;
use crate::models::{GatherEntry, Handle, MonitoredUser, QueuedTweet, TweetId};

impl Database {
    // ===== Monitored users =====

    /// Returns false when the handle was already monitored (left unchanged).
    pub fn add_monitored_user(&self, handle: &Handle, target_tweet_count: u32) -> StoreResult<bool> {
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO monitored_users (handle, target_tweets) VALUES (?1, ?2)",
            params![handle.as_str(), target_tweet_count],
        )?;
        Ok(inserted > 0)
    }

    pub fn remove_monitored_user(&self, handle: &Handle) -> StoreResult<bool> {
        let removed = self.conn().execute(
            "DELETE FROM monitored_users WHERE handle = ?1",
            params![handle.as_str()],
        )?;
        Ok(removed > 0)
    }

    pub fn monitored_users(&self) -> StoreResult<Vec<MonitoredUser>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT handle, target_tweets FROM monitored_users ORDER BY seq")?;
        let rows = stmt.query_map([], |row| {
            Ok(MonitoredUser {
                handle: handle_col(row, 0)?,
                target_tweet_count: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ===== User-gather queue =====

    /// Seed the gather queue from every monitored user in one pass.
    ///
    /// Writes are keyed by handle, so reloading never duplicates an entry and
    /// a queued entry keeps its position while taking the current target.
    pub fn load_user_gather_queue(&self) -> StoreResult<usize> {
        let loaded = self.conn().execute(
            "INSERT INTO user_gather (handle, target_tweets)
             SELECT handle, target_tweets FROM monitored_users WHERE true ORDER BY seq
             ON CONFLICT(handle) DO UPDATE SET target_tweets = excluded.target_tweets",
            [],
        )?;
        Ok(loaded)
    }

    pub fn gather_entry(&self, handle: &Handle) -> StoreResult<Option<GatherEntry>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT handle, target_tweets FROM user_gather WHERE handle = ?1",
                params![handle.as_str()],
                |row| {
                    Ok(GatherEntry {
                        handle: handle_col(row, 0)?,
                        target_tweet_count: row.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    pub fn next_gather_entry(&self) -> StoreResult<Option<GatherEntry>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT handle, target_tweets FROM user_gather ORDER BY seq LIMIT 1",
                [],
                |row| {
                    Ok(GatherEntry {
                        handle: handle_col(row, 0)?,
                        target_tweet_count: row.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    pub fn gather_queue(&self) -> StoreResult<Vec<GatherEntry>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT handle, target_tweets FROM user_gather ORDER BY seq")?;
        let rows = stmt.query_map([], |row| {
            Ok(GatherEntry {
                handle: handle_col(row, 0)?,
                target_tweet_count: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn remove_gather_entry(&self, handle: &Handle) -> StoreResult<bool> {
        let removed = self.conn().execute(
            "DELETE FROM user_gather WHERE handle = ?1",
            params![handle.as_str()],
        )?;
        Ok(removed > 0)
    }

    pub fn clear_gather_queue(&self) -> StoreResult<()> {
        self.conn().execute("DELETE FROM user_gather", [])?;
        Ok(())
    }

    pub fn is_gather_queue_empty(&self) -> StoreResult<bool> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM user_gather", [], |row| row.get(0))?;
        Ok(count == 0)
    }

    // ===== Tweet queue =====

    /// Returns false when the tweet was already queued; it keeps its position.
    pub fn enqueue_tweet(&self, tweet_id: &TweetId, author: &Handle) -> StoreResult<bool> {
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO tweet_queue (tweet_id, author) VALUES (?1, ?2)",
            params![tweet_id.as_str(), author.as_str()],
        )?;
        Ok(inserted > 0)
    }

    pub fn tweet_in_queue(&self, tweet_id: &TweetId) -> StoreResult<bool> {
        exists(
            &self.conn(),
            "SELECT COUNT(*) FROM tweet_queue WHERE tweet_id = ?1",
            tweet_id.as_str(),
        )
    }

    pub fn next_queued_tweet(&self) -> StoreResult<Option<QueuedTweet>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT tweet_id, author FROM tweet_queue ORDER BY seq LIMIT 1",
                [],
                |row| {
                    Ok(QueuedTweet {
                        tweet_id: tweet_id_col(row, 0)?,
                        author: handle_col(row, 1)?,
                    })
                },
            )
            .optional()?)
    }

    pub fn tweet_queue(&self) -> StoreResult<Vec<QueuedTweet>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT tweet_id, author FROM tweet_queue ORDER BY seq")?;
        let rows = stmt.query_map([], |row| {
            Ok(QueuedTweet {
                tweet_id: tweet_id_col(row, 0)?,
                author: handle_col(row, 1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn remove_queued_tweet(&self, tweet_id: &TweetId) -> StoreResult<bool> {
        let removed = self.conn().execute(
            "DELETE FROM tweet_queue WHERE tweet_id = ?1",
            params![tweet_id.as_str()],
        )?;
        Ok(removed > 0)
    }

    pub fn clear_tweet_queue(&self) -> StoreResult<()> {
        self.conn().execute("DELETE FROM tweet_queue", [])?;
        Ok(())
    }

    pub fn is_tweet_queue_empty(&self) -> StoreResult<bool> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM tweet_queue", [], |row| row.get(0))?;
        Ok(count == 0)
    }
}
