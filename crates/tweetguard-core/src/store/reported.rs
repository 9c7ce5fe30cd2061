//! Reported tweets and reported users, deduplicated by increment.

use rusqlite::{params, OptionalExtension};

use super::db::{exists, handle_col, now_secs, opt_handle_col, tweet_id_col, Database};
use super::{StoreError, StoreResult};
use crate::models::{Handle, ReportedTweet, ReportedUser, TweetId};

impl Database {
    // ===== Reported tweets =====

    /// Insert with a count of one, or bump the existing record. Returns the new count.
    pub fn record_reported_tweet(
        &self,
        tweet_id: &TweetId,
        author: Option<&Handle>,
    ) -> StoreResult<u32> {
        if self.reported_tweet_exists(tweet_id)? {
            return self.increment_reported_tweet(tweet_id);
        }
        self.conn().execute(
            "INSERT INTO reported_tweets (tweet_id, author, report_count, last_reported_at)
             VALUES (?1, ?2, 1, ?3)",
            params![tweet_id.as_str(), author.map(Handle::as_str), now_secs()],
        )?;
        Ok(1)
    }

    pub fn reported_tweet_exists(&self, tweet_id: &TweetId) -> StoreResult<bool> {
        exists(
            &self.conn(),
            "SELECT COUNT(*) FROM reported_tweets WHERE tweet_id = ?1",
            tweet_id.as_str(),
        )
    }

    /// Fails with NotFound when the tweet was never reported.
    pub fn increment_reported_tweet(&self, tweet_id: &TweetId) -> StoreResult<u32> {
        let conn = self.conn();
        let updated = conn.execute(
            "UPDATE reported_tweets
             SET report_count = report_count + 1, last_reported_at = ?2
             WHERE tweet_id = ?1",
            params![tweet_id.as_str(), now_secs()],
        )?;
        if updated == 0 {
            return Err(StoreError::not_found("reported_tweets", tweet_id.as_str()));
        }
        Ok(conn.query_row(
            "SELECT report_count FROM reported_tweets WHERE tweet_id = ?1",
            params![tweet_id.as_str()],
            |row| row.get(0),
        )?)
    }

    pub fn reported_tweet(&self, tweet_id: &TweetId) -> StoreResult<Option<ReportedTweet>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT tweet_id, author, report_count, last_reported_at
                 FROM reported_tweets WHERE tweet_id = ?1",
                params![tweet_id.as_str()],
                |row| {
                    Ok(ReportedTweet {
                        tweet_id: tweet_id_col(row, 0)?,
                        author: opt_handle_col(row, 1)?,
                        report_count: row.get(2)?,
                        last_reported_at: row.get(3)?,
                    })
                },
            )
            .optional()?)
    }

    // ===== Reported users =====

    /// Insert with a count of one, or bump the existing record. Returns the new count.
    pub fn record_reported_user(&self, handle: &Handle) -> StoreResult<u32> {
        if self.reported_user_exists(handle)? {
            return self.increment_reported_user(handle);
        }
        self.conn().execute(
            "INSERT INTO reported_users (handle, report_count, last_reported_at) VALUES (?1, 1, ?2)",
            params![handle.as_str(), now_secs()],
        )?;
        Ok(1)
    }

    pub fn reported_user_exists(&self, handle: &Handle) -> StoreResult<bool> {
        exists(
            &self.conn(),
            "SELECT COUNT(*) FROM reported_users WHERE handle = ?1",
            handle.as_str(),
        )
    }

    /// Fails with NotFound when the user was never reported.
    pub fn increment_reported_user(&self, handle: &Handle) -> StoreResult<u32> {
        let conn = self.conn();
        let updated = conn.execute(
            "UPDATE reported_users
             SET report_count = report_count + 1, last_reported_at = ?2
             WHERE handle = ?1",
            params![handle.as_str(), now_secs()],
        )?;
        if updated == 0 {
            return Err(StoreError::not_found("reported_users", handle.as_str()));
        }
        Ok(conn.query_row(
            "SELECT report_count FROM reported_users WHERE handle = ?1",
            params![handle.as_str()],
            |row| row.get(0),
        )?)
    }

    pub fn reported_user(&self, handle: &Handle) -> StoreResult<Option<ReportedUser>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT handle, report_count, last_reported_at FROM reported_users WHERE handle = ?1",
                params![handle.as_str()],
                |row| {
                    Ok(ReportedUser {
                        handle: handle_col(row, 0)?,
                        report_count: row.get(1)?,
                        last_reported_at: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }
}
