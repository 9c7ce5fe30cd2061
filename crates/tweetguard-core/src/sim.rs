//! In-memory page and interaction surface.
//!
//! `SimulatedPage` renders lists of items per URL from a fixture and scripts
//! the report dialog (missing or late controls, error pages, expired tweets,
//! sub-document failures). The daemon uses it in fixture mode; the engine's
//! scenarios run against it.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::constants::BASE_URL;
use crate::models::{Handle, TweetId};
use crate::page::{
    report_frame_url, reported_tweet_id, Control, DriverError, InteractionSurface, Marker,
    PageDriver, RenderedItem,
};

fn default_true() -> bool {
    true
}

/// One item of a simulated list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimItem {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tweet_id: Option<String>,
    #[serde(default = "default_true")]
    pub has_menu: bool,
    /// Items rendered in place of this one when its control is triggered
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reveals: Vec<SimItem>,
}

impl SimItem {
    pub fn tweet(author: &str, tweet_id: &str, body: &str) -> Self {
        Self {
            text: format!("@{author} {body}"),
            body: Some(body.to_string()),
            author: Some(author.to_string()),
            tweet_id: Some(tweet_id.to_string()),
            has_menu: true,
            reveals: Vec::new(),
        }
    }

    pub fn filler(text: &str) -> Self {
        Self {
            text: text.to_string(),
            has_menu: false,
            ..Self::default()
        }
    }

    pub fn expander(text: &str, reveals: Vec<SimItem>) -> Self {
        Self {
            text: text.to_string(),
            has_menu: false,
            reveals,
            ..Self::default()
        }
    }

    pub fn without_menu(mut self) -> Self {
        self.has_menu = false;
        self
    }
}

/// Scripted behavior of the report dialog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SurfaceScript {
    /// Upcoming error-page checks that find the error page
    pub error_pages: u32,
    /// Tweet ids whose report sub-document shows "Nothing to see here"
    pub expired: Vec<String>,
    /// Controls that are never found
    pub missing: Vec<Control>,
    /// Controls absent for their first N lookups
    pub delayed: HashMap<Control, u32>,
    /// Upcoming sub-document lookups that fail to access the frame
    pub frame_failures: u32,
    /// Extra overlay layers stacked on top of the report dialog
    pub stacked_layers: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    pub location: String,
    #[serde(default)]
    pub pages: HashMap<String, Vec<SimItem>>,
    #[serde(default)]
    pub surface: SurfaceScript,
    /// Navigations that land somewhere else (deleted tweets, suspended users)
    #[serde(default)]
    pub redirects: HashMap<String, String>,
    /// Navigations that fail outright
    #[serde(default)]
    pub unreachable: Vec<String>,
}

#[derive(Debug, Clone)]
struct LiveItem {
    item: SimItem,
    dismissed: bool,
}

#[derive(Debug, Clone)]
pub struct SimulatedPage {
    location: String,
    pages: HashMap<String, Vec<SimItem>>,
    redirects: HashMap<String, String>,
    unreachable: Vec<String>,
    live: HashMap<String, Vec<LiveItem>>,
    surface: SurfaceScript,
    lookups: HashMap<Control, u32>,
    layers: u32,
    menu_target: Option<SimItem>,
    /// Location of the open report sub-document
    frame: Option<String>,
    activations: Vec<Control>,
    navigations: Vec<String>,
    confirmed: Vec<Option<TweetId>>,
    reloads: u32,
    scrolls_to_end: u32,
}

impl SimulatedPage {
    pub fn new(location: &str) -> Self {
        Self::from_fixture(Fixture {
            location: location.to_string(),
            ..Fixture::default()
        })
    }

    pub fn from_fixture(fixture: Fixture) -> Self {
        let mut page = Self {
            location: fixture.location,
            pages: fixture.pages,
            redirects: fixture.redirects,
            unreachable: fixture.unreachable,
            live: HashMap::new(),
            surface: fixture.surface,
            lookups: HashMap::new(),
            layers: 0,
            menu_target: None,
            frame: None,
            activations: Vec::new(),
            navigations: Vec::new(),
            confirmed: Vec::new(),
            reloads: 0,
            scrolls_to_end: 0,
        };
        page.render_current();
        page
    }

    pub fn from_fixture_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture: {}", path.display()))?;
        let fixture: Fixture = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse fixture: {}", path.display()))?;
        Ok(Self::from_fixture(fixture))
    }

    pub fn with_page(mut self, url: &str, items: Vec<SimItem>) -> Self {
        self.pages.insert(url.to_string(), items);
        if url == self.location {
            self.render_current();
        }
        self
    }

    pub fn with_redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }

    pub fn with_unreachable(mut self, url: &str) -> Self {
        self.unreachable.push(url.to_string());
        self
    }

    pub fn with_surface(mut self, surface: SurfaceScript) -> Self {
        self.surface = surface;
        self
    }

    pub fn surface_mut(&mut self) -> &mut SurfaceScript {
        &mut self.surface
    }

    // ===== Inspection =====

    pub fn activations(&self) -> &[Control] {
        &self.activations
    }

    pub fn navigations(&self) -> &[String] {
        &self.navigations
    }

    /// Tweet ids whose report dialog was confirmed, in order.
    pub fn confirmed_reports(&self) -> &[Option<TweetId>] {
        &self.confirmed
    }

    pub fn reload_count(&self) -> u32 {
        self.reloads
    }

    pub fn scrolls_to_end(&self) -> u32 {
        self.scrolls_to_end
    }

    pub fn open_layers(&self) -> u32 {
        self.layers
    }

    /// Items of the current page that have not been dismissed.
    pub fn remaining(&self) -> usize {
        self.live
            .get(&self.location)
            .map(|items| items.iter().filter(|i| !i.dismissed).count())
            .unwrap_or(0)
    }

    fn render_current(&mut self) {
        let fresh = self
            .pages
            .get(&self.location)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|item| LiveItem {
                item,
                dismissed: false,
            })
            .collect();
        self.live.insert(self.location.clone(), fresh);
        self.menu_target = None;
        self.frame = None;
        self.layers = 0;
    }

    fn current_items_mut(&mut self) -> &mut Vec<LiveItem> {
        self.live.entry(self.location.clone()).or_default()
    }

    fn live_item(&mut self, item: &RenderedItem) -> Result<&mut LiveItem, DriverError> {
        let location = self.location.clone();
        self.current_items_mut()
            .get_mut(item.slot)
            .ok_or_else(|| DriverError::Detached(format!("slot {} on {}", item.slot, location)))
    }

    fn render(slot: usize, item: &SimItem) -> RenderedItem {
        RenderedItem {
            slot,
            text: item.text.clone(),
            body: item.body.clone(),
            author: item.author.as_deref().and_then(Handle::new),
            tweet_id: item.tweet_id.as_deref().and_then(TweetId::new),
            has_expander: !item.reveals.is_empty(),
        }
    }

    fn lookup_succeeds(&mut self, control: Control) -> bool {
        let seen = self.lookups.entry(control).or_insert(0);
        *seen += 1;
        if self.surface.missing.contains(&control) {
            return false;
        }
        match self.surface.delayed.get(&control) {
            Some(late_by) => *seen > *late_by,
            None => true,
        }
    }
}

#[async_trait]
impl PageDriver for SimulatedPage {
    fn location(&self) -> String {
        self.location.clone()
    }

    async fn navigate(&mut self, url: &str) -> Result<(), DriverError> {
        self.navigations.push(url.to_string());
        if self.unreachable.iter().any(|u| u == url) {
            return Err(DriverError::Navigation(url.to_string()));
        }
        self.location = self
            .redirects
            .get(url)
            .cloned()
            .unwrap_or_else(|| url.to_string());
        self.render_current();
        Ok(())
    }

    async fn reload(&mut self) -> Result<(), DriverError> {
        self.reloads += 1;
        self.render_current();
        Ok(())
    }

    async fn visible_items(&mut self) -> Result<Vec<RenderedItem>, DriverError> {
        Ok(self
            .current_items_mut()
            .iter()
            .enumerate()
            .filter(|(_, live)| !live.dismissed)
            .map(|(slot, live)| Self::render(slot, &live.item))
            .collect())
    }

    async fn dismiss(&mut self, item: &RenderedItem) -> Result<(), DriverError> {
        self.live_item(item)?.dismissed = true;
        Ok(())
    }

    async fn scroll_into_view(&mut self, item: &RenderedItem) -> Result<(), DriverError> {
        self.live_item(item).map(|_| ())
    }

    async fn expand(&mut self, item: &RenderedItem) -> Result<bool, DriverError> {
        let revealed = std::mem::take(&mut self.live_item(item)?.item.reveals);
        if revealed.is_empty() {
            return Ok(false);
        }
        let slot = item.slot;
        let items = self.current_items_mut();
        items[slot].dismissed = true;
        let inserted = revealed.into_iter().map(|item| LiveItem {
            item,
            dismissed: false,
        });
        items.splice(slot + 1..slot + 1, inserted);
        Ok(true)
    }

    async fn scroll_to_end(&mut self) -> Result<(), DriverError> {
        self.scrolls_to_end += 1;
        Ok(())
    }
}

#[async_trait]
impl InteractionSurface for SimulatedPage {
    async fn open_item_menu(&mut self, item: &RenderedItem) -> Result<bool, DriverError> {
        let live = self.live_item(item)?.item.clone();
        if !live.has_menu {
            return Ok(false);
        }
        self.frame = live
            .tweet_id
            .as_deref()
            .and_then(TweetId::new)
            .map(|id| report_frame_url(BASE_URL, &id));
        self.menu_target = Some(live);
        self.layers = 1 + self.surface.stacked_layers;
        Ok(true)
    }

    async fn activate(&mut self, control: Control) -> Result<bool, DriverError> {
        if control.in_frame() && self.surface.frame_failures > 0 {
            self.surface.frame_failures -= 1;
            return Err(DriverError::FrameAccess(format!("{control:?}")));
        }

        if control == Control::CloseLayer {
            if self.layers == 0 {
                return Ok(false);
            }
            self.layers -= 1;
            self.activations.push(control);
            return Ok(true);
        }

        if !self.lookup_succeeds(control) {
            return Ok(false);
        }
        self.activations.push(control);

        if control == Control::Done {
            let target = self
                .menu_target
                .take()
                .and_then(|item| item.tweet_id.as_deref().and_then(TweetId::new));
            self.confirmed.push(target);
            self.frame = None;
            self.layers = 0;
        }
        Ok(true)
    }

    async fn has_marker(&mut self, marker: Marker) -> Result<bool, DriverError> {
        match marker {
            Marker::ErrorPage => {
                if self.surface.error_pages > 0 {
                    self.surface.error_pages -= 1;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Marker::NothingToSee => {
                let target = self.frame.as_deref().and_then(reported_tweet_id);
                Ok(target.is_some_and(|id| self.surface.expired.iter().any(|e| e == id.as_str())))
            }
        }
    }

    async fn frame_target_id(&mut self) -> Result<Option<TweetId>, DriverError> {
        Ok(self.frame.as_deref().and_then(reported_tweet_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: &str = "https://twitter.com/home";

    #[tokio::test]
    async fn test_dismissed_items_disappear_but_slots_stay() {
        let mut page = SimulatedPage::new(HOME).with_page(
            HOME,
            vec![
                SimItem::tweet("a", "1", "one"),
                SimItem::tweet("b", "2", "two"),
            ],
        );

        let items = page.visible_items().await.unwrap();
        assert_eq!(items.len(), 2);
        page.dismiss(&items[0]).await.unwrap();

        let items = page.visible_items().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].slot, 1);
        assert_eq!(items[0].author.as_ref().unwrap().as_str(), "b");
    }

    #[tokio::test]
    async fn test_expand_reveals_in_place() {
        let mut page = SimulatedPage::new(HOME).with_page(
            HOME,
            vec![
                SimItem::tweet("a", "1", "one"),
                SimItem::expander("Show more replies", vec![SimItem::tweet("c", "3", "three")]),
                SimItem::tweet("b", "2", "two"),
            ],
        );

        let items = page.visible_items().await.unwrap();
        assert!(items[1].has_expander);
        assert!(page.expand(&items[1]).await.unwrap());

        let ids: Vec<String> = page
            .visible_items()
            .await
            .unwrap()
            .into_iter()
            .filter_map(|i| i.tweet_id.map(|id| id.to_string()))
            .collect();
        assert_eq!(ids, vec!["1", "3", "2"]);
    }

    #[tokio::test]
    async fn test_frame_names_the_menu_target() {
        let mut page = SimulatedPage::new(HOME).with_page(HOME, vec![SimItem::tweet("a", "9", "x")]);
        assert!(page.frame_target_id().await.unwrap().is_none());

        let items = page.visible_items().await.unwrap();
        assert!(page.open_item_menu(&items[0]).await.unwrap());
        assert_eq!(page.frame_target_id().await.unwrap(), TweetId::new("9"));

        assert!(page.activate(Control::Done).await.unwrap());
        assert!(page.frame_target_id().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreachable_navigation_fails_in_place() {
        let gone = "https://twitter.com/gone/with_replies";
        let mut page = SimulatedPage::new(HOME).with_unreachable(gone);

        let err = page.navigate(gone).await.unwrap_err();
        assert!(matches!(err, DriverError::Navigation(_)));
        assert_eq!(page.location(), HOME);
        assert_eq!(page.navigations(), &[gone.to_string()]);
    }

    #[tokio::test]
    async fn test_navigation_renders_fresh_page() {
        let other = "https://twitter.com/x/with_replies";
        let mut page = SimulatedPage::new(HOME).with_page(other, vec![SimItem::filler("")]);
        assert_eq!(page.remaining(), 0);

        page.navigate(other).await.unwrap();
        assert_eq!(page.location(), other);
        assert_eq!(page.remaining(), 1);
        assert_eq!(page.navigations(), &[other.to_string()]);
    }

    #[tokio::test]
    async fn test_scripted_surface() {
        let mut page = SimulatedPage::new(HOME)
            .with_page(HOME, vec![SimItem::tweet("a", "1", "one")])
            .with_surface(SurfaceScript {
                error_pages: 1,
                delayed: HashMap::from([(Control::SpamReason, 1)]),
                ..SurfaceScript::default()
            });
        let item = page.visible_items().await.unwrap().remove(0);

        assert!(page.open_item_menu(&item).await.unwrap());
        assert!(page.has_marker(Marker::ErrorPage).await.unwrap());
        assert!(!page.has_marker(Marker::ErrorPage).await.unwrap());
        assert!(!page.activate(Control::SpamReason).await.unwrap());
        assert!(page.activate(Control::SpamReason).await.unwrap());
        assert!(page.activate(Control::Done).await.unwrap());
        assert_eq!(page.confirmed_reports(), &[TweetId::new("1")]);
        assert_eq!(page.open_layers(), 0);
    }

    #[test]
    fn test_fixture_parses() {
        let json = r#"{
            "location": "https://twitter.com/home",
            "pages": {
                "https://twitter.com/home": [
                    {"text": "@a hi", "body": "hi", "author": "a", "tweetId": "1"},
                    {"text": "Show more replies", "reveals": [{"text": "x"}]}
                ]
            },
            "surface": {"errorPages": 2, "missing": ["done"], "delayed": {"spamReason": 1}}
        }"#;
        let fixture: Fixture = serde_json::from_str(json).unwrap();
        assert_eq!(fixture.surface.error_pages, 2);
        assert_eq!(fixture.surface.missing, vec![Control::Done]);
        assert_eq!(fixture.surface.delayed.get(&Control::SpamReason), Some(&1));

        let page = SimulatedPage::from_fixture(fixture);
        assert_eq!(page.remaining(), 2);
    }
}
