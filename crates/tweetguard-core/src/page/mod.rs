//! The driven page, seen as a handful of facts and a list of rendered items.
//!
//! [`PageDriver`] covers navigation and the item list; [`InteractionSurface`]
//! covers the controls of the report flow, some of which live in an isolated
//! sub-document. Concrete element lookups belong to the implementations.

pub mod location;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::constants::markers;
use crate::models::{Handle, TweetId};

pub use location::{
    report_frame_url, reported_tweet_id, tweet_page_id, tweet_page_subject, tweet_page_url,
    user_page_subject, user_page_url,
};

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Sub-document not accessible: {0}")]
    FrameAccess(String),

    #[error("Page detached: {0}")]
    Detached(String),
}

/// Snapshot of one rendered list item.
///
/// Valid until the list is re-queried; expanding a control invalidates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedItem {
    /// Position in the underlying list
    pub slot: usize,
    /// Full text content of the item
    pub text: String,
    /// Text of the tweet body, when the item has one
    pub body: Option<String>,
    pub author: Option<Handle>,
    pub tweet_id: Option<TweetId>,
    /// Whether the item carries an activatable expansion control
    pub has_expander: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// Empty placeholder or unrelated banner
    Filler,
    /// Notice left where an already-reported tweet was
    ReportedNotice,
    /// Pagination / collapsed-thread control
    Expander,
    Tweet,
}

impl RenderedItem {
    pub fn kind(&self) -> ItemKind {
        let text = self.text.as_str();
        if text.is_empty() || text.starts_with(markers::SEARCH_SUGGESTION) {
            ItemKind::Filler
        } else if text.starts_with(markers::REPORTED_NOTICE) {
            ItemKind::ReportedNotice
        } else if self.has_expander
            || text == markers::SHOW_MORE_REPLIES
            || text == markers::SHOW_REPLIES
            || text.starts_with(markers::SHOW_ADDITIONAL_REPLIES)
        {
            ItemKind::Expander
        } else {
            ItemKind::Tweet
        }
    }
}

/// Controls the report flow activates, in protocol order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Control {
    /// "Report" entry of the item's context menu
    ReportEntry,
    /// "It's suspicious or spam" reason (sub-document)
    SpamReason,
    /// "Uses the reply function to spam" sub-reason (sub-document)
    ReplySpamSubreason,
    /// Confirmation button closing the report dialog
    Done,
    /// Backdrop of the topmost overlay layer
    CloseLayer,
}

impl Control {
    /// Whether the control lives in the isolated report sub-document.
    pub fn in_frame(self) -> bool {
        matches!(self, Control::SpamReason | Control::ReplySpamSubreason)
    }
}

/// Markers the remote surface shows instead of the expected controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Marker {
    /// Generic error page inside the report sub-document
    ErrorPage,
    /// "Nothing to see here": the reported tweet is gone
    NothingToSee,
}

#[async_trait]
pub trait PageDriver: Send {
    /// Current navigable location (full URL).
    fn location(&self) -> String;

    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;

    /// Reload the driven view from scratch.
    async fn reload(&mut self) -> Result<(), DriverError>;

    /// Re-query the list; dismissed items are excluded.
    async fn visible_items(&mut self) -> Result<Vec<RenderedItem>, DriverError>;

    /// Hide the item from future passes without removing it from the page.
    async fn dismiss(&mut self, item: &RenderedItem) -> Result<(), DriverError>;

    async fn scroll_into_view(&mut self, item: &RenderedItem) -> Result<(), DriverError>;

    /// Trigger the item's expansion control. Returns false when it has none.
    async fn expand(&mut self, item: &RenderedItem) -> Result<bool, DriverError>;

    async fn scroll_to_end(&mut self) -> Result<(), DriverError>;
}

#[async_trait]
pub trait InteractionSurface: Send {
    /// Open the item's context menu. Returns false when the menu control is missing.
    async fn open_item_menu(&mut self, item: &RenderedItem) -> Result<bool, DriverError>;

    /// Look the control up and activate it. Returns false when it is absent.
    async fn activate(&mut self, control: Control) -> Result<bool, DriverError>;

    async fn has_marker(&mut self, marker: Marker) -> Result<bool, DriverError>;

    /// Tweet id the report sub-document was opened for.
    async fn frame_target_id(&mut self) -> Result<Option<TweetId>, DriverError>;
}
