use serde::{Deserialize, Serialize};

use super::ids::{Handle, TweetId};

/// Author whose replies page is periodically swept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredUser {
    pub handle: Handle,
    pub target_tweet_count: u32,
}

/// Pending sweep of a monitored author's page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatherEntry {
    pub handle: Handle,
    pub target_tweet_count: u32,
}

impl From<MonitoredUser> for GatherEntry {
    fn from(user: MonitoredUser) -> Self {
        Self {
            handle: user.handle,
            target_tweet_count: user.target_tweet_count,
        }
    }
}

/// Tweet whose reply thread is awaiting a reporting run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedTweet {
    pub tweet_id: TweetId,
    pub author: Handle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedTweet {
    pub tweet_id: TweetId,
    pub author: Option<Handle>,
    pub report_count: u32,
    /// Unix seconds of the latest report
    pub last_reported_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportedUser {
    pub handle: Handle,
    pub report_count: u32,
    pub last_reported_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordTerm {
    pub term: String,
    pub match_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegexPattern {
    pub source: String,
    pub match_count: u32,
}

/// Tweet seen without any rule firing, held for manual review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreportedTweet {
    pub tweet_id: TweetId,
    pub author: Option<Handle>,
    pub text: String,
}

/// Size of every record set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    pub monitored_users: u64,
    pub keywords: u64,
    pub regex_patterns: u64,
    pub gather_queue: u64,
    pub tweet_queue: u64,
    pub reported_tweets: u64,
    pub reported_users: u64,
    pub unreported_tweets: u64,
    pub unreported_ids: u64,
}

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub removed_duplicates: usize,
    pub indexed: usize,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.removed_duplicates == 0 && self.indexed == 0
    }
}
