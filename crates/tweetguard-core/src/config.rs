use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    BASE_URL, DEFAULT_TARGET_TWEETS, MAX_LAYER_CLOSE_ATTEMPTS, TRANSIENT_RELOAD_THRESHOLD,
};
use crate::retry::StepPolicy;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreConfig {
    pub data_dir: PathBuf,
    /// Scheme and host of the driven site, without trailing slash
    pub base_url: String,
    /// Runs refuse to start while the current location contains this text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_path_marker: Option<String>,
    /// Cap on pass restarts after a problem. None restarts until stopped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pass_restarts: Option<u32>,
    pub default_target_tweets: u32,
    pub timings: Timings,
}

impl CoreConfig {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            base_url: BASE_URL.to_string(),
            abort_path_marker: None,
            max_pass_restarts: None,
            default_target_tweets: DEFAULT_TARGET_TWEETS,
            timings: Timings::default(),
        }
    }

    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tweetguard")
    }

    /// True when `location` is on the configured abort path.
    pub fn is_abort_location(&self, location: &str) -> bool {
        match self.abort_path_marker.as_deref() {
            Some(marker) if !marker.is_empty() => location.contains(marker),
            _ => false,
        }
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self::new(Self::default_data_dir())
    }
}

/// Every deliberate wait of the engine, in milliseconds.
///
/// The defaults give the remote UI time to settle after each mutating action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Timings {
    pub report_start_settle_ms: u64,
    pub item_settle_ms: u64,
    pub expand_settle_ms: u64,
    pub scroll_settle_ms: u64,
    pub pass_restart_backoff_ms: u64,
    pub pause_ms: u64,
    pub error_check_settle_ms: u64,
    pub transient_backoff_ms: u64,
    pub frame_failure_backoff_ms: u64,
    pub layer_close_interval_ms: u64,
    pub layer_close_attempts: u32,
    pub transient_reload_threshold: u32,
    pub report_entry: StepPolicy,
    pub spam_reason: StepPolicy,
    pub reply_spam_subreason: StepPolicy,
    pub done: StepPolicy,
    pub gather_page_settle_ms: u64,
    pub gather_pass_interval_ms: u64,
    pub gather_item_interval_ms: u64,
    pub replies_item_interval_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            report_start_settle_ms: 2_000,
            item_settle_ms: 500,
            expand_settle_ms: 5_000,
            scroll_settle_ms: 1_000,
            pass_restart_backoff_ms: 10_000,
            pause_ms: 30_000,
            error_check_settle_ms: 1_000,
            transient_backoff_ms: 10_000,
            frame_failure_backoff_ms: 10_000,
            layer_close_interval_ms: 1_000,
            layer_close_attempts: MAX_LAYER_CLOSE_ATTEMPTS,
            transient_reload_threshold: TRANSIENT_RELOAD_THRESHOLD,
            report_entry: StepPolicy::new(1_000, 3_000, 2),
            spam_reason: StepPolicy::new(1_000, 5_000, 2),
            reply_spam_subreason: StepPolicy::new(1_000, 5_000, 2),
            done: StepPolicy::new(1_000, 2_000, 2),
            gather_page_settle_ms: 4_000,
            gather_pass_interval_ms: 2_000,
            gather_item_interval_ms: 400,
            replies_item_interval_ms: 200,
        }
    }
}

pub(crate) fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}
