//! Staging area for tweets no rule fired on, and the id index that dedupes
//! repeated sightings.
//!
//! Every index row remembers the staging row it was written with
//! (`staged_seq`). A staging row whose id is indexed by some other sighting is
//! a duplicate; reconciliation removes those and indexes anything unindexed.

use rusqlite::params;
use tracing::{debug, info};

use super::db::{exists, opt_handle_col, tweet_id_col, Database};
use super::StoreResult;
use crate::models::{Handle, ReconcileReport, TweetId, UnreportedTweet};

const REMOVE_SEEN_DUPLICATES: &str = "DELETE FROM unreported_tweets
     WHERE EXISTS (
         SELECT 1 FROM unreported_tweet_ids i
         WHERE i.tweet_id = unreported_tweets.tweet_id
           AND (i.staged_seq IS NULL OR i.staged_seq != unreported_tweets.seq)
     )";

const INDEX_UNINDEXED: &str = "INSERT INTO unreported_tweet_ids (tweet_id, staged_seq)
     SELECT tweet_id, seq FROM unreported_tweets
     WHERE tweet_id NOT IN (SELECT tweet_id FROM unreported_tweet_ids)";

impl Database {
    /// Hold a tweet for manual review unless its id was already seen.
    ///
    /// Staging row and index row are written together. Returns false for a
    /// repeated sighting.
    pub fn stage_unreported(
        &self,
        tweet_id: &TweetId,
        author: Option<&Handle>,
        text: &str,
    ) -> StoreResult<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        if exists(
            &tx,
            "SELECT COUNT(*) FROM unreported_tweet_ids WHERE tweet_id = ?1",
            tweet_id.as_str(),
        )? {
            return Ok(false);
        }

        tx.execute(
            "INSERT OR IGNORE INTO unreported_tweets (tweet_id, author, text) VALUES (?1, ?2, ?3)",
            params![tweet_id.as_str(), author.map(Handle::as_str), text],
        )?;
        tx.execute(
            "INSERT INTO unreported_tweet_ids (tweet_id, staged_seq)
             SELECT tweet_id, seq FROM unreported_tweets WHERE tweet_id = ?1",
            params![tweet_id.as_str()],
        )?;
        tx.commit()?;
        Ok(true)
    }

    pub fn unreported_id_exists(&self, tweet_id: &TweetId) -> StoreResult<bool> {
        exists(
            &self.conn(),
            "SELECT COUNT(*) FROM unreported_tweet_ids WHERE tweet_id = ?1",
            tweet_id.as_str(),
        )
    }

    /// Mark an id as seen without staging it.
    pub fn index_unreported_id(&self, tweet_id: &TweetId) -> StoreResult<bool> {
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO unreported_tweet_ids (tweet_id, staged_seq) VALUES (?1, NULL)",
            params![tweet_id.as_str()],
        )?;
        Ok(inserted > 0)
    }

    /// Staged tweets in the order they were seen.
    pub fn unreported_tweets(&self) -> StoreResult<Vec<UnreportedTweet>> {
        self.select_unreported(-1)
    }

    /// Remove and return the first `n` staged tweets. Their ids stay indexed,
    /// so they are never staged again.
    pub fn take_unreported(&self, n: usize) -> StoreResult<Vec<UnreportedTweet>> {
        if n < 1 {
            return Ok(Vec::new());
        }
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        let tweets = self.select_unreported(limit)?;

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for tweet in &tweets {
            tx.execute(
                "DELETE FROM unreported_tweets WHERE tweet_id = ?1",
                params![tweet.tweet_id.as_str()],
            )?;
        }
        tx.commit()?;
        Ok(tweets)
    }

    fn select_unreported(&self, limit: i64) -> StoreResult<Vec<UnreportedTweet>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT tweet_id, author, text FROM unreported_tweets ORDER BY seq LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(UnreportedTweet {
                tweet_id: tweet_id_col(row, 0)?,
                author: opt_handle_col(row, 1)?,
                text: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Index every staged id that has no index row yet.
    pub fn preload_unreported_ids(&self) -> StoreResult<usize> {
        Ok(self.conn().execute(INDEX_UNINDEXED, [])?)
    }

    /// Restore index ⊇ staging keys.
    ///
    /// Drops staged tweets already indexed by an earlier sighting, then indexes
    /// whatever is left unindexed. A second call without writes in between
    /// changes nothing.
    pub fn fix_unreported(&self) -> StoreResult<ReconcileReport> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let removed_duplicates = tx.execute(REMOVE_SEEN_DUPLICATES, [])?;
        let indexed = tx.execute(INDEX_UNINDEXED, [])?;
        tx.commit()?;

        let report = ReconcileReport {
            removed_duplicates,
            indexed,
        };
        if report.is_noop() {
            debug!("Unreported staging already consistent");
        } else {
            info!(removed_duplicates, indexed, "Reconciled unreported staging");
        }
        Ok(report)
    }
}
