pub mod ids;
pub mod records;

pub use ids::{Handle, InvalidKey, TweetId};
pub use records::{
    GatherEntry, KeywordTerm, MonitoredUser, QueuedTweet, ReconcileReport, RegexPattern,
    ReportedTweet, ReportedUser, StoreCounts, UnreportedTweet,
};
