//! Two-stage work queue: sweep monitored users' pages for their recent
//! tweets, then run the reporter over each queued tweet's reply thread.
//!
//! Progress lives in the store, so a drain interrupted by a navigation or a
//! restart resumes where it left off: a gather entry matching the current
//! user page is picked up without navigating again, and a queued tweet
//! matching the current tweet page is reported in place.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{ms, CoreConfig};
use crate::models::GatherEntry;
use crate::page::{
    tweet_page_id, tweet_page_subject, tweet_page_url, user_page_subject, user_page_url,
    InteractionSurface, ItemKind, PageDriver,
};
use crate::reporter::{EngineError, Reporter, RunOutcome};
use crate::signals::RunSignals;
use crate::store::Database;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Both queues are empty.
    Drained,
    Stopped,
    /// The current location is on the configured abort path.
    Aborted,
}

pub struct QueueEngine {
    db: Database,
    config: CoreConfig,
    clock: Arc<dyn Clock>,
    signals: RunSignals,
    reporter: Reporter,
}

impl QueueEngine {
    pub fn new(
        db: Database,
        config: CoreConfig,
        clock: Arc<dyn Clock>,
        signals: RunSignals,
    ) -> Self {
        let reporter = Reporter::new(db.clone(), config.clone(), clock.clone(), signals.clone());
        Self {
            db,
            config,
            clock,
            signals,
            reporter,
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn signals(&self) -> &RunSignals {
        &self.signals
    }

    pub fn reporter(&self) -> &Reporter {
        &self.reporter
    }

    pub fn reporter_mut(&mut self) -> &mut Reporter {
        &mut self.reporter
    }

    /// Queue every monitored user unless a sweep is already pending, then drain.
    pub async fn report_all<P>(&mut self, page: &mut P) -> Result<DrainOutcome, EngineError>
    where
        P: PageDriver + InteractionSurface,
    {
        if self.db.is_gather_queue_empty()? {
            let loaded = self.db.load_user_gather_queue()?;
            info!(users = loaded, "Loaded user gather queue");
        }
        self.drain(page).await
    }

    /// Work both queues until they are empty or the run is interrupted.
    pub async fn drain<P>(&mut self, page: &mut P) -> Result<DrainOutcome, EngineError>
    where
        P: PageDriver + InteractionSurface,
    {
        loop {
            if self.signals.should_stop() {
                info!("Drain stopped");
                return Ok(DrainOutcome::Stopped);
            }
            let location = page.location();
            if self.config.is_abort_location(&location) {
                warn!(location = %location, "Refusing to drain on abort path");
                return Ok(DrainOutcome::Aborted);
            }

            if !self.db.is_gather_queue_empty()? {
                self.gather_next(page).await?;
                continue;
            }

            let Some(next) = self.db.next_queued_tweet()? else {
                info!("Tweet queue empty");
                return Ok(DrainOutcome::Drained);
            };

            // Report in place when already on a queued tweet
            if let Some(id) = tweet_page_id(&location) {
                if self.db.tweet_in_queue(&id)? {
                    match self.reporter.run(page).await? {
                        RunOutcome::Finished => {
                            info!(tweet_id = %id, "Finished reporting replies");
                        }
                        RunOutcome::GaveUp { restarts } => {
                            warn!(tweet_id = %id, restarts, "Dropping tweet after repeated problems");
                        }
                        RunOutcome::Stopped => return Ok(DrainOutcome::Stopped),
                        RunOutcome::Aborted => return Ok(DrainOutcome::Aborted),
                    }
                    self.db.remove_queued_tweet(&id)?;
                    continue;
                }
            }

            let url = tweet_page_url(&self.config.base_url, &next.author, &next.tweet_id);
            info!(url = %url, "Loading next queued tweet");
            if let Err(e) = page.navigate(&url).await {
                warn!(tweet_id = %next.tweet_id, "Dropping unreachable tweet: {}", e);
                self.db.remove_queued_tweet(&next.tweet_id)?;
                continue;
            }
            if tweet_page_id(&page.location()).as_ref() != Some(&next.tweet_id) {
                warn!(
                    tweet_id = %next.tweet_id,
                    location = %page.location(),
                    "Tweet page did not load, dropping"
                );
                self.db.remove_queued_tweet(&next.tweet_id)?;
            }
        }
    }

    /// Sweep the page of the current or next gather entry, then retire it.
    async fn gather_next<P>(&mut self, page: &mut P) -> Result<(), EngineError>
    where
        P: PageDriver + InteractionSurface,
    {
        let resumed = match user_page_subject(&page.location()) {
            Some(handle) => self.db.gather_entry(&handle)?,
            None => None,
        };

        let entry = match resumed {
            Some(entry) => {
                debug!(handle = %entry.handle, "Resuming on current user page");
                entry
            }
            None => {
                let Some(entry) = self.db.next_gather_entry()? else {
                    return Ok(());
                };
                let url = user_page_url(&self.config.base_url, &entry.handle);
                info!(url = %url, "Loading next user page");
                if let Err(e) = page.navigate(&url).await {
                    warn!(handle = %entry.handle, "Dropping unreachable user page: {}", e);
                    self.db.remove_gather_entry(&entry.handle)?;
                    return Ok(());
                }
                if user_page_subject(&page.location()).as_ref() != Some(&entry.handle) {
                    warn!(handle = %entry.handle, "User page did not load, dropping");
                    self.db.remove_gather_entry(&entry.handle)?;
                    return Ok(());
                }
                entry
            }
        };

        self.clock.sleep(ms(self.config.timings.gather_page_settle_ms)).await;
        let gathered = self.gather(page, &entry).await?;
        info!(handle = %entry.handle, gathered, "Gathered tweets");
        self.db.remove_gather_entry(&entry.handle)?;
        Ok(())
    }

    /// Queue up to `entry.target_tweet_count` of the subject's own tweets from
    /// the current page, in render order. Returns how many were queued.
    pub async fn gather<P>(&mut self, page: &mut P, entry: &GatherEntry) -> Result<u32, EngineError>
    where
        P: PageDriver + InteractionSurface,
    {
        let target = entry.target_tweet_count;
        if target == 0 {
            return Ok(0);
        }

        let timings = self.config.timings.clone();
        let mut total = 0u32;
        loop {
            self.clock.sleep(ms(timings.gather_pass_interval_ms)).await;

            let mut found = 0u32;
            for item in page.visible_items().await? {
                if item.text.is_empty() {
                    self.clock.sleep(ms(timings.gather_item_interval_ms)).await;
                    page.dismiss(&item).await?;
                    continue;
                }

                let own = item.author.as_ref() == Some(&entry.handle);
                match (&item.tweet_id, &item.author) {
                    (Some(id), Some(author)) if own => {
                        self.db.enqueue_tweet(id, author)?;
                        page.scroll_into_view(&item).await?;
                        page.dismiss(&item).await?;
                        total += 1;
                        found += 1;
                        debug!(tweet_id = %id, total, "Queued tweet");
                        if total >= target {
                            return Ok(total);
                        }
                    }
                    _ => {
                        page.dismiss(&item).await?;
                    }
                }
                self.clock.sleep(ms(timings.gather_item_interval_ms)).await;
            }

            if found == 0 {
                return Ok(total);
            }
        }
    }

    /// Bodies of the replies on the current tweet page that are not by its
    /// author. Every visited item is dismissed; collapsed replies are expanded.
    pub async fn collect_replies<P>(&mut self, page: &mut P) -> Result<Vec<String>, EngineError>
    where
        P: PageDriver + InteractionSurface,
    {
        let subject = tweet_page_subject(&page.location());
        let timings = self.config.timings.clone();
        let mut replies = Vec::new();

        'sweep: loop {
            let items = page.visible_items().await?;
            if items.is_empty() {
                break;
            }
            for item in items {
                if self.signals.should_stop() {
                    break 'sweep;
                }
                self.clock.sleep(ms(timings.replies_item_interval_ms)).await;
                page.scroll_into_view(&item).await?;

                match item.kind() {
                    ItemKind::Expander => {
                        if page.expand(&item).await? {
                            self.clock.sleep(ms(timings.expand_settle_ms)).await;
                            continue 'sweep;
                        }
                    }
                    ItemKind::Tweet if item.author.is_some() && item.author != subject => {
                        if let Some(body) = &item.body {
                            replies.push(body.clone());
                        }
                    }
                    _ => {}
                }
                page.dismiss(&item).await?;
            }
        }
        Ok(replies)
    }

    /// Forget all pending work and start the driven view over.
    pub async fn reset<P>(&mut self, page: &mut P) -> Result<(), EngineError>
    where
        P: PageDriver + InteractionSurface,
    {
        self.db.clear_gather_queue()?;
        self.db.clear_tweet_queue()?;
        info!("Queues cleared");
        page.reload().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{Handle, TweetId};
    use crate::page::Control;
    use crate::sim::{SimItem, SimulatedPage, SurfaceScript};

    const HOME: &str = "https://twitter.com/home";
    const SPACEX_PAGE: &str = "https://twitter.com/spacex/with_replies";

    fn setup() -> (Database, RunSignals, QueueEngine) {
        let db = Database::open_in_memory().unwrap();
        let signals = RunSignals::new();
        let engine = QueueEngine::new(
            db.clone(),
            CoreConfig::new("/unused"),
            Arc::new(ManualClock::new()),
            signals.clone(),
        );
        (db, signals, engine)
    }

    fn handle(raw: &str) -> Handle {
        Handle::new(raw).unwrap()
    }

    fn queued_ids(db: &Database) -> Vec<String> {
        db.tweet_queue()
            .unwrap()
            .into_iter()
            .map(|t| t.tweet_id.to_string())
            .collect()
    }

    fn spacex_page() -> Vec<SimItem> {
        vec![
            SimItem::tweet("spacex", "1", "launch"),
            SimItem::tweet("someone", "2", "reply"),
            SimItem::tweet("spacex", "3", "landing"),
        ]
    }

    #[tokio::test]
    async fn test_gather_queues_subject_tweets_in_order() {
        let (db, _, mut engine) = setup();
        db.add_monitored_user(&handle("spacex"), 2).unwrap();
        db.load_user_gather_queue().unwrap();
        let mut page = SimulatedPage::new(SPACEX_PAGE).with_page(SPACEX_PAGE, spacex_page());

        engine.drain_gather_only(&mut page).await;

        assert_eq!(queued_ids(&db), vec!["1", "3"]);
        assert!(db.is_gather_queue_empty().unwrap());
        // Resumed on the current page without navigating
        assert!(page.navigations().is_empty());
        assert_eq!(page.remaining(), 0);
    }

    #[tokio::test]
    async fn test_gather_stops_at_target() {
        let (db, _, mut engine) = setup();
        let mut page = SimulatedPage::new(SPACEX_PAGE).with_page(SPACEX_PAGE, spacex_page());
        let entry = GatherEntry {
            handle: handle("spacex"),
            target_tweet_count: 1,
        };

        assert_eq!(engine.gather(&mut page, &entry).await.unwrap(), 1);
        assert_eq!(queued_ids(&db), vec!["1"]);
        assert_eq!(page.remaining(), 2);
    }

    #[tokio::test]
    async fn test_gather_with_zero_target_is_noop() {
        let (db, _, mut engine) = setup();
        let mut page = SimulatedPage::new(SPACEX_PAGE).with_page(SPACEX_PAGE, spacex_page());
        let entry = GatherEntry {
            handle: handle("spacex"),
            target_tweet_count: 0,
        };

        assert_eq!(engine.gather(&mut page, &entry).await.unwrap(), 0);
        assert!(db.is_tweet_queue_empty().unwrap());
        assert_eq!(page.remaining(), 3);
    }

    #[tokio::test]
    async fn test_report_all_full_cycle() {
        let (db, _, mut engine) = setup();
        db.add_monitored_user(&handle("spacex"), 2).unwrap();
        db.add_keyword("giveaway").unwrap();

        let first = "https://twitter.com/spacex/status/1";
        let third = "https://twitter.com/spacex/status/3";
        let mut page = SimulatedPage::new(HOME)
            .with_page(SPACEX_PAGE, spacex_page())
            .with_page(
                first,
                vec![
                    SimItem::tweet("spacex", "1", "launch"),
                    SimItem::tweet("bot", "11", "crypto giveaway"),
                    SimItem::tweet("fan", "12", "congrats"),
                ],
            )
            .with_page(third, vec![SimItem::tweet("spacex", "3", "landing")]);

        let outcome = engine.report_all(&mut page).await.unwrap();
        assert_eq!(outcome, DrainOutcome::Drained);

        assert_eq!(
            page.navigations(),
            &[SPACEX_PAGE.to_string(), first.to_string(), third.to_string()]
        );
        assert!(db.is_gather_queue_empty().unwrap());
        assert!(db.is_tweet_queue_empty().unwrap());
        assert_eq!(
            page.confirmed_reports(),
            &[Some(TweetId::new("11").unwrap())]
        );
        assert!(db.reported_user_exists(&handle("bot")).unwrap());
        let staged: Vec<String> = db
            .unreported_tweets()
            .unwrap()
            .into_iter()
            .map(|t| t.tweet_id.to_string())
            .collect();
        assert_eq!(staged, vec!["1", "12", "3"]);
    }

    #[tokio::test]
    async fn test_unreachable_tweet_is_dropped() {
        let (db, _, mut engine) = setup();
        db.enqueue_tweet(&TweetId::new("5").unwrap(), &handle("gone"))
            .unwrap();
        let mut page = SimulatedPage::new(HOME)
            .with_redirect("https://twitter.com/gone/status/5", HOME);

        assert_eq!(engine.drain(&mut page).await.unwrap(), DrainOutcome::Drained);
        assert!(db.is_tweet_queue_empty().unwrap());
        assert_eq!(page.navigations().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_navigation_drops_entries() {
        let (db, _, mut engine) = setup();
        db.add_monitored_user(&handle("gone"), 5).unwrap();
        db.load_user_gather_queue().unwrap();
        db.enqueue_tweet(&TweetId::new("5").unwrap(), &handle("gone"))
            .unwrap();
        let mut page = SimulatedPage::new(HOME)
            .with_unreachable("https://twitter.com/gone/with_replies")
            .with_unreachable("https://twitter.com/gone/status/5");

        assert_eq!(engine.drain(&mut page).await.unwrap(), DrainOutcome::Drained);
        assert!(db.is_gather_queue_empty().unwrap());
        assert!(db.is_tweet_queue_empty().unwrap());
        assert_eq!(page.navigations().len(), 2);
        assert_eq!(page.location(), HOME);
    }

    #[tokio::test]
    async fn test_drain_observes_stop_and_abort() {
        let (db, signals, mut engine) = setup();
        db.enqueue_tweet(&TweetId::new("5").unwrap(), &handle("a"))
            .unwrap();
        let mut page = SimulatedPage::new(HOME);

        signals.request_stop();
        assert_eq!(engine.drain(&mut page).await.unwrap(), DrainOutcome::Stopped);
        signals.clear_stop();

        let mut config = CoreConfig::new("/unused");
        config.abort_path_marker = Some("/home".to_string());
        let mut guarded = QueueEngine::new(
            db.clone(),
            config,
            Arc::new(ManualClock::new()),
            signals.clone(),
        );
        assert_eq!(guarded.drain(&mut page).await.unwrap(), DrainOutcome::Aborted);

        assert!(page.navigations().is_empty());
        assert!(!db.is_tweet_queue_empty().unwrap());
    }

    #[tokio::test]
    async fn test_tweet_dropped_after_giving_up() {
        let db = Database::open_in_memory().unwrap();
        let mut config = CoreConfig::new("/unused");
        config.max_pass_restarts = Some(0);
        let mut engine = QueueEngine::new(
            db.clone(),
            config,
            Arc::new(ManualClock::new()),
            RunSignals::new(),
        );
        db.add_keyword("scam").unwrap();
        let url = "https://twitter.com/a/status/5";
        db.enqueue_tweet(&TweetId::new("5").unwrap(), &handle("a"))
            .unwrap();
        let mut page = SimulatedPage::new(url)
            .with_page(url, vec![SimItem::tweet("bot", "6", "scam")])
            .with_surface(SurfaceScript {
                missing: vec![Control::ReportEntry],
                ..SurfaceScript::default()
            });

        assert_eq!(engine.drain(&mut page).await.unwrap(), DrainOutcome::Drained);
        assert!(db.is_tweet_queue_empty().unwrap());
    }

    #[tokio::test]
    async fn test_collect_replies_skips_author_and_expands() {
        let (_, _, mut engine) = setup();
        let url = "https://twitter.com/spacex/status/1";
        let mut page = SimulatedPage::new(url).with_page(
            url,
            vec![
                SimItem::tweet("spacex", "1", "launch"),
                SimItem::filler(""),
                SimItem::tweet("fan", "2", "first"),
                SimItem::tweet("spacex", "4", "thanks"),
                SimItem::expander("Show more replies", vec![SimItem::tweet("late", "3", "second")]),
            ],
        );

        let replies = engine.collect_replies(&mut page).await.unwrap();
        assert_eq!(replies, vec!["first".to_string(), "second".to_string()]);
        assert_eq!(page.remaining(), 0);
    }

    #[tokio::test]
    async fn test_reset_clears_queues_and_reloads() {
        let (db, _, mut engine) = setup();
        db.add_monitored_user(&handle("spacex"), 30).unwrap();
        db.load_user_gather_queue().unwrap();
        db.enqueue_tweet(&TweetId::new("1").unwrap(), &handle("spacex"))
            .unwrap();
        let mut page = SimulatedPage::new(HOME);

        engine.reset(&mut page).await.unwrap();
        assert!(db.is_gather_queue_empty().unwrap());
        assert!(db.is_tweet_queue_empty().unwrap());
        assert_eq!(db.monitored_users().unwrap().len(), 1);
        assert_eq!(page.reload_count(), 1);
    }

    impl QueueEngine {
        /// Work the gather queue only.
        async fn drain_gather_only(&mut self, page: &mut SimulatedPage) {
            while !self.db.is_gather_queue_empty().unwrap() {
                self.gather_next(page).await.unwrap();
            }
        }
    }
}
