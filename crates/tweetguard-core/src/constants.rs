//! Application-wide constants
//!
//! Centralized location for textual markers and default values
//! that are used across multiple modules.

/// Default site the driven page lives on
pub const BASE_URL: &str = "https://twitter.com";

/// Current on-disk schema version (stored in SQLite `user_version`)
pub const SCHEMA_VERSION: i32 = 5;

/// Store file name inside the data directory
pub const STORE_FILE: &str = "store.db";

/// Default number of tweets to gather per monitored user
pub const DEFAULT_TARGET_TWEETS: u32 = 30;

/// Consecutive transient error pages before the driven view is reloaded
pub const TRANSIENT_RELOAD_THRESHOLD: u32 = 5;

/// Upper bound on "close layer" clicks while unwinding stacked overlays
pub const MAX_LAYER_CLOSE_ATTEMPTS: u32 = 10;

// Textual markers of rendered list items
pub mod markers {
    /// Search-suggestion banner rendered above results
    pub const SEARCH_SUGGESTION: &str = "Including results for";
    /// Placeholder left behind after a tweet has been reported
    pub const REPORTED_NOTICE: &str = "You reported this Tweet";
    /// Pagination control at the end of a reply chain
    pub const SHOW_MORE_REPLIES: &str = "Show more replies";
    /// Collapsed reply chain control
    pub const SHOW_REPLIES: &str = "Show replies";
    /// Control revealing replies hidden as likely spam
    pub const SHOW_ADDITIONAL_REPLIES: &str = "Show additional replies, including";
    /// Header text of the expired/not-found report page
    pub const NOTHING_TO_SEE: &str = "Nothing to see here";
}

// URL shapes of the driven site
pub mod paths {
    /// Last segment of a user's tweets-and-replies page
    pub const WITH_REPLIES: &str = "with_replies";
    /// Segment preceding a tweet id on a tweet page
    pub const STATUS: &str = "status";
    /// Path of the report sub-document
    pub const REPORT_FRAME: &str = "i/safety/report_story";
    /// Query key carrying the reported tweet id in the report sub-document
    pub const REPORTED_TWEET_ID: &str = "reported_tweet_id";
}
