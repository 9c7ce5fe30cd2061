//! Report flow for a single item, and the pass loop over a list of items.
//!
//! A report walks `Idle → MenuOpened → ReasonSelected → SubreasonSelected →
//! Confirmed → Done`. Any step whose control cannot be found moves to
//! `ErrorRecovery`, which inspects the surface for error markers and closes
//! whatever overlay layers are left open.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::classifier::{Classifier, ClassifierError, Verdict};
use crate::clock::Clock;
use crate::config::{ms, CoreConfig};
use crate::models::TweetId;
use crate::page::{
    Control, DriverError, InteractionSurface, ItemKind, Marker, PageDriver, RenderedItem,
};
use crate::retry::StepPolicy;
use crate::signals::RunSignals;
use crate::store::{Database, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportState {
    Idle,
    MenuOpened,
    ReasonSelected,
    SubreasonSelected,
    Confirmed,
    Done,
    ErrorRecovery,
}

/// How one report attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    Reported,
    /// The tweet is gone; carries the id the report dialog was opened for.
    Skipped(Option<TweetId>),
    Failed,
    /// The driven view was reloaded; every rendered item is stale.
    ViewReloaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Pass ran to its end. Zero processed items means the list is exhausted.
    Completed { processed: u32 },
    /// An item could not be handled; the pass was abandoned.
    Problem,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Finished,
    Stopped,
    /// The current location is on the configured abort path.
    Aborted,
    GaveUp { restarts: u32 },
}

enum SurfaceCheck {
    Clear,
    Skipped(Option<TweetId>),
    Reloaded,
}

enum ItemStep {
    Next,
    EndPass,
    Problem,
}

pub struct Reporter {
    db: Database,
    config: CoreConfig,
    clock: Arc<dyn Clock>,
    signals: RunSignals,
    classifier: Classifier,
    state: ReportState,
    err_count: u32,
}

impl Reporter {
    pub fn new(
        db: Database,
        config: CoreConfig,
        clock: Arc<dyn Clock>,
        signals: RunSignals,
    ) -> Self {
        Self {
            db,
            config,
            clock,
            signals,
            classifier: Classifier::default(),
            state: ReportState::Idle,
            err_count: 0,
        }
    }

    pub fn state(&self) -> ReportState {
        self.state
    }

    /// Consecutive error pages seen without a clear surface in between.
    pub fn err_count(&self) -> u32 {
        self.err_count
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Re-read keywords and patterns from the store.
    pub fn reload_rules(&mut self) -> Result<(), ClassifierError> {
        self.classifier = Classifier::load(&self.db)?;
        debug!(
            keywords = self.classifier.keyword_count(),
            patterns = self.classifier.pattern_count(),
            "Rules loaded"
        );
        Ok(())
    }

    fn transition(&mut self, next: ReportState) {
        debug!(from = ?self.state, to = ?next, "Report state");
        self.state = next;
    }

    // ===== Pass loop =====

    /// Repeat passes over the current list until one finds nothing left.
    pub async fn run<P>(&mut self, page: &mut P) -> Result<RunOutcome, EngineError>
    where
        P: PageDriver + InteractionSurface,
    {
        let location = page.location();
        if self.config.is_abort_location(&location) {
            warn!(location = %location, "Refusing to run on abort path");
            return Ok(RunOutcome::Aborted);
        }

        self.clock.sleep(ms(self.config.timings.report_start_settle_ms)).await;
        let mut restarts = 0u32;
        loop {
            // Rules added while running take effect on the next pass
            self.reload_rules()?;

            match self.process_list(page).await {
                PassOutcome::Stopped => {
                    info!("Run stopped");
                    return Ok(RunOutcome::Stopped);
                }
                PassOutcome::Problem => {
                    restarts += 1;
                    if let Some(max) = self.config.max_pass_restarts {
                        if restarts > max {
                            warn!(restarts, "Giving up after repeated problems");
                            return Ok(RunOutcome::GaveUp { restarts });
                        }
                    }
                    warn!(restarts, "Problem during pass, restarting after backoff");
                    self.clock.sleep(ms(self.config.timings.pass_restart_backoff_ms)).await;
                }
                PassOutcome::Completed { processed: 0 } => {
                    info!("List exhausted");
                    return Ok(RunOutcome::Finished);
                }
                PassOutcome::Completed { processed } => {
                    debug!(processed, "Pass complete, loading more");
                    if let Err(e) = page.scroll_to_end().await {
                        warn!("Failed to scroll to end: {}", e);
                    }
                    self.clock.sleep(ms(self.config.timings.scroll_settle_ms)).await;
                }
            }
        }
    }

    /// One pass over the visible items.
    pub async fn process_list<P>(&mut self, page: &mut P) -> PassOutcome
    where
        P: PageDriver + InteractionSurface,
    {
        let items = match page.visible_items().await {
            Ok(items) => items,
            Err(e) => {
                warn!("Failed to read list: {}", e);
                return PassOutcome::Problem;
            }
        };

        let mut processed = 0u32;
        for item in items {
            if self.signals.should_stop() {
                info!("Manual stop detected");
                return PassOutcome::Stopped;
            }
            if self.signals.take_pause() {
                info!("Manual pause detected");
                self.clock.sleep(ms(self.config.timings.pause_ms)).await;
                info!("Resuming from pause");
            }

            self.clock.sleep(ms(self.config.timings.item_settle_ms)).await;
            if let Err(e) = page.scroll_into_view(&item).await {
                warn!(slot = item.slot, "Item went away: {}", e);
                return PassOutcome::Problem;
            }
            processed += 1;

            match self.process_item(page, &item).await {
                Ok(ItemStep::Next) => {}
                Ok(ItemStep::EndPass) => break,
                Ok(ItemStep::Problem) => return PassOutcome::Problem,
                Err(e) => {
                    warn!(slot = item.slot, "Failed to process item: {}", e);
                    return PassOutcome::Problem;
                }
            }
        }
        PassOutcome::Completed { processed }
    }

    async fn process_item<P>(
        &mut self,
        page: &mut P,
        item: &RenderedItem,
    ) -> Result<ItemStep, EngineError>
    where
        P: PageDriver + InteractionSurface,
    {
        match item.kind() {
            ItemKind::Filler => {
                debug!("Collapsing unrelated item");
                page.dismiss(item).await?;
                return Ok(ItemStep::Next);
            }
            ItemKind::ReportedNotice => {
                debug!("Collapsing reported notice");
                page.dismiss(item).await?;
                return Ok(ItemStep::Next);
            }
            ItemKind::Expander => {
                if page.expand(item).await? {
                    info!(text = %item.text, "Expanded replies");
                    self.clock.sleep(ms(self.config.timings.expand_settle_ms)).await;
                    // Rendered handles are stale now
                    return Ok(ItemStep::EndPass);
                }
                page.dismiss(item).await?;
                return Ok(ItemStep::Next);
            }
            ItemKind::Tweet => {}
        }

        let verdict = self.classifier.classify(&self.db, item)?;
        match &verdict {
            Verdict::AlreadyReported => {
                debug!(tweet_id = ?item.tweet_id, "Already reported");
            }
            Verdict::Unmatched => {
                if let Some(id) = &item.tweet_id {
                    self.db.stage_unreported(id, item.author.as_ref(), &item.text)?;
                }
                debug!(text = %item.text, "Collapsing unrelated tweet");
            }
            _ => {
                info!(
                    verdict = ?verdict,
                    author = ?item.author,
                    tweet_id = ?item.tweet_id,
                    "Reporting tweet"
                );
                match self.report_item(page, item).await {
                    ReportOutcome::Reported => {}
                    ReportOutcome::Skipped(id) => {
                        if let Some(id) = id {
                            info!(tweet_id = %id, "Tweet gone, marking skipped");
                            self.db.remove_queued_tweet(&id)?;
                        }
                    }
                    ReportOutcome::Failed | ReportOutcome::ViewReloaded => {
                        warn!("Problem during report");
                        return Ok(ItemStep::Problem);
                    }
                }
            }
        }
        page.dismiss(item).await?;
        Ok(ItemStep::Next)
    }

    // ===== Report flow =====

    /// Walk the report dialog for one item. Never fails; driver trouble ends
    /// as `Failed` or `ViewReloaded`.
    pub async fn report_item<P>(&mut self, page: &mut P, item: &RenderedItem) -> ReportOutcome
    where
        P: PageDriver + InteractionSurface,
    {
        let outcome = match self.report_flow(page, item).await {
            Ok(outcome) => outcome,
            Err(DriverError::FrameAccess(e)) => {
                warn!("Report dialog not accessible ({}), reloading", e);
                self.clock.sleep(ms(self.config.timings.frame_failure_backoff_ms)).await;
                match page.reload().await {
                    Ok(()) => ReportOutcome::ViewReloaded,
                    Err(e) => {
                        warn!("Reload failed: {}", e);
                        ReportOutcome::Failed
                    }
                }
            }
            Err(e) => {
                warn!("Report failed: {}", e);
                ReportOutcome::Failed
            }
        };
        if outcome != ReportOutcome::Reported {
            self.state = ReportState::Idle;
        }
        outcome
    }

    async fn report_flow<P>(
        &mut self,
        page: &mut P,
        item: &RenderedItem,
    ) -> Result<ReportOutcome, DriverError>
    where
        P: PageDriver + InteractionSurface,
    {
        self.state = ReportState::Idle;
        if !page.open_item_menu(item).await? {
            warn!(slot = item.slot, "No menu control on item");
            return Ok(ReportOutcome::Failed);
        }
        self.transition(ReportState::MenuOpened);

        let timings = self.config.timings.clone();
        if !self.step(page, Control::ReportEntry, timings.report_entry).await? {
            return self.recover(page).await;
        }

        let frame_steps = [
            (Control::SpamReason, timings.spam_reason, ReportState::ReasonSelected),
            (
                Control::ReplySpamSubreason,
                timings.reply_spam_subreason,
                ReportState::SubreasonSelected,
            ),
        ];
        for (control, policy, next) in frame_steps {
            if let Some(outcome) = self.guard_surface(page).await? {
                return Ok(outcome);
            }
            if !self.step(page, control, policy).await? {
                return self.recover(page).await;
            }
            self.transition(next);
        }

        self.transition(ReportState::Confirmed);
        self.record_report(item);

        if let Some(outcome) = self.guard_surface(page).await? {
            return Ok(outcome);
        }
        if !self.step(page, Control::Done, timings.done).await? {
            return self.recover(page).await;
        }
        self.transition(ReportState::Done);
        Ok(ReportOutcome::Reported)
    }

    /// Surface check ahead of a step. `Some` ends the flow.
    async fn guard_surface<P>(&mut self, page: &mut P) -> Result<Option<ReportOutcome>, DriverError>
    where
        P: PageDriver + InteractionSurface,
    {
        match self.check_surface(page).await? {
            SurfaceCheck::Clear => Ok(None),
            SurfaceCheck::Skipped(id) => {
                self.transition(ReportState::ErrorRecovery);
                self.close_layers(page).await?;
                Ok(Some(ReportOutcome::Skipped(id)))
            }
            SurfaceCheck::Reloaded => Ok(Some(ReportOutcome::ViewReloaded)),
        }
    }

    /// Persist the report. User and tweet are written independently.
    fn record_report(&self, item: &RenderedItem) {
        if let Some(author) = &item.author {
            if let Err(e) = self.db.record_reported_user(author) {
                warn!(author = %author, "Failed to record reported user: {}", e);
            }
        }
        if let Some(id) = &item.tweet_id {
            if let Err(e) = self.db.record_reported_tweet(id, item.author.as_ref()) {
                warn!(tweet_id = %id, "Failed to record reported tweet: {}", e);
            }
        }
    }

    /// Look a control up per `policy` and activate it.
    async fn step<P>(
        &mut self,
        page: &mut P,
        control: Control,
        policy: StepPolicy,
    ) -> Result<bool, DriverError>
    where
        P: PageDriver + InteractionSurface,
    {
        self.clock.sleep(policy.settle()).await;
        let mut attempt = 1;
        loop {
            if page.activate(control).await? {
                debug!(?control, attempt, "Activated");
                return Ok(true);
            }
            if !policy.has_retry_after(attempt) {
                warn!(?control, attempt, "Control not found");
                return Ok(false);
            }
            debug!(?control, "Waiting for control");
            self.clock.sleep(policy.backoff()).await;
            attempt += 1;
        }
    }

    async fn recover<P>(&mut self, page: &mut P) -> Result<ReportOutcome, DriverError>
    where
        P: PageDriver + InteractionSurface,
    {
        self.transition(ReportState::ErrorRecovery);
        match self.check_surface(page).await? {
            SurfaceCheck::Reloaded => Ok(ReportOutcome::ViewReloaded),
            SurfaceCheck::Skipped(id) => {
                self.close_layers(page).await?;
                Ok(ReportOutcome::Skipped(id))
            }
            SurfaceCheck::Clear => {
                self.close_layers(page).await?;
                Ok(ReportOutcome::Failed)
            }
        }
    }

    /// Inspect the surface for error markers.
    ///
    /// An error page backs off and re-checks without advancing; once the
    /// consecutive count reaches the threshold the view is reloaded.
    async fn check_surface<P>(&mut self, page: &mut P) -> Result<SurfaceCheck, DriverError>
    where
        P: PageDriver + InteractionSurface,
    {
        let threshold = self.config.timings.transient_reload_threshold.max(1);
        loop {
            self.clock.sleep(ms(self.config.timings.error_check_settle_ms)).await;

            if page.has_marker(Marker::ErrorPage).await? {
                self.err_count += 1;
                if self.err_count >= threshold {
                    warn!(count = self.err_count, "Repeated error pages, reloading view");
                    page.reload().await?;
                    self.err_count = 0;
                    return Ok(SurfaceCheck::Reloaded);
                }
                warn!(count = self.err_count, "Error page detected, backing off");
                self.clock.sleep(ms(self.config.timings.transient_backoff_ms)).await;
                continue;
            }

            if page.has_marker(Marker::NothingToSee).await? {
                if let Some(id) = page.frame_target_id().await? {
                    return Ok(SurfaceCheck::Skipped(Some(id)));
                }
            }

            self.err_count = 0;
            return Ok(SurfaceCheck::Clear);
        }
    }

    /// Click overlay backdrops until none is left, up to the configured cap.
    async fn close_layers<P>(&mut self, page: &mut P) -> Result<u32, DriverError>
    where
        P: PageDriver + InteractionSurface,
    {
        let attempts = self.config.timings.layer_close_attempts;
        let mut closed = 0;
        for attempt in 1..=attempts {
            if !page.activate(Control::CloseLayer).await? {
                debug!("No layer left");
                break;
            }
            debug!(attempt, "Closed layer");
            closed += 1;
            self.clock.sleep(ms(self.config.timings.layer_close_interval_ms)).await;
        }
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::models::Handle;
    use crate::sim::{SimItem, SimulatedPage, SurfaceScript};

    const PAGE: &str = "https://twitter.com/spacex/status/1000";

    /// Timings with distinct values so waits can be told apart.
    fn config() -> CoreConfig {
        let mut config = CoreConfig::new("/unused");
        let t = &mut config.timings;
        t.transient_backoff_ms = 10_001;
        t.frame_failure_backoff_ms = 10_002;
        t.pass_restart_backoff_ms = 10_003;
        t.pause_ms = 30_000;
        t.layer_close_interval_ms = 1_001;
        config
    }

    fn setup(config: CoreConfig) -> (Database, ManualClock, RunSignals, Reporter) {
        let db = Database::open_in_memory().unwrap();
        let clock = ManualClock::new();
        let signals = RunSignals::new();
        let reporter = Reporter::new(
            db.clone(),
            config,
            Arc::new(clock.clone()),
            signals.clone(),
        );
        (db, clock, signals, reporter)
    }

    fn page_with(items: Vec<SimItem>, surface: SurfaceScript) -> SimulatedPage {
        SimulatedPage::new(PAGE)
            .with_page(PAGE, items)
            .with_surface(surface)
    }

    async fn first_item(page: &mut SimulatedPage) -> RenderedItem {
        page.visible_items().await.unwrap().remove(0)
    }

    #[tokio::test]
    async fn test_report_walks_every_step() {
        let (db, _, _, mut reporter) = setup(config());
        let mut page = page_with(
            vec![SimItem::tweet("bot", "7", "spam")],
            SurfaceScript::default(),
        );
        let item = first_item(&mut page).await;

        let outcome = reporter.report_item(&mut page, &item).await;
        assert_eq!(outcome, ReportOutcome::Reported);
        assert_eq!(reporter.state(), ReportState::Done);
        assert_eq!(
            page.activations(),
            &[
                Control::ReportEntry,
                Control::SpamReason,
                Control::ReplySpamSubreason,
                Control::Done
            ]
        );
        let id = TweetId::new("7").unwrap();
        assert_eq!(page.confirmed_reports(), &[Some(id.clone())]);
        assert!(db.reported_tweet_exists(&id).unwrap());
        assert!(db
            .reported_user_exists(&Handle::new("bot").unwrap())
            .unwrap());
    }

    #[tokio::test]
    async fn test_reporting_twice_increments() {
        let (db, _, _, mut reporter) = setup(config());
        let mut page = page_with(
            vec![SimItem::tweet("bot", "7", "spam")],
            SurfaceScript::default(),
        );
        let item = first_item(&mut page).await;

        reporter.report_item(&mut page, &item).await;
        reporter.report_item(&mut page, &item).await;

        let id = TweetId::new("7").unwrap();
        assert_eq!(db.reported_tweet(&id).unwrap().unwrap().report_count, 2);
        let user = db.reported_user(&Handle::new("bot").unwrap()).unwrap().unwrap();
        assert_eq!(user.report_count, 2);
        assert_eq!(db.counts().unwrap().reported_tweets, 1);
    }

    #[tokio::test]
    async fn test_five_error_pages_reload_the_view() {
        let (db, clock, _, mut reporter) = setup(config());
        let mut page = page_with(
            vec![SimItem::tweet("bot", "7", "spam")],
            SurfaceScript {
                error_pages: 5,
                ..SurfaceScript::default()
            },
        );
        let item = first_item(&mut page).await;

        let outcome = reporter.report_item(&mut page, &item).await;
        assert_eq!(outcome, ReportOutcome::ViewReloaded);
        assert_eq!(reporter.err_count(), 0);
        assert_eq!(page.reload_count(), 1);
        // Backoff after each of the first four, reload on the fifth
        assert_eq!(clock.count_of(Duration::from_millis(10_001)), 4);
        assert_eq!(page.activations(), &[Control::ReportEntry]);
        assert_eq!(db.counts().unwrap().reported_tweets, 0);
    }

    #[tokio::test]
    async fn test_transient_errors_below_threshold_are_waited_out() {
        let (_, clock, _, mut reporter) = setup(config());
        let mut page = page_with(
            vec![SimItem::tweet("bot", "7", "spam")],
            SurfaceScript {
                error_pages: 2,
                ..SurfaceScript::default()
            },
        );
        let item = first_item(&mut page).await;

        assert_eq!(
            reporter.report_item(&mut page, &item).await,
            ReportOutcome::Reported
        );
        assert_eq!(reporter.err_count(), 0);
        assert_eq!(page.reload_count(), 0);
        assert_eq!(clock.count_of(Duration::from_millis(10_001)), 2);
    }

    #[tokio::test]
    async fn test_expired_tweet_is_skipped() {
        let (db, _, _, mut reporter) = setup(config());
        let mut page = page_with(
            vec![SimItem::tweet("bot", "7", "spam")],
            SurfaceScript {
                expired: vec!["7".to_string()],
                ..SurfaceScript::default()
            },
        );
        let item = first_item(&mut page).await;

        let outcome = reporter.report_item(&mut page, &item).await;
        assert_eq!(outcome, ReportOutcome::Skipped(TweetId::new("7")));
        assert_eq!(page.open_layers(), 0);
        assert_eq!(db.counts().unwrap().reported_tweets, 0);
    }

    #[tokio::test]
    async fn test_missing_control_fails_and_closes_layers() {
        let (_, clock, _, mut reporter) = setup(config());
        let mut page = page_with(
            vec![SimItem::tweet("bot", "7", "spam")],
            SurfaceScript {
                missing: vec![Control::ReportEntry],
                stacked_layers: 2,
                ..SurfaceScript::default()
            },
        );
        let item = first_item(&mut page).await;

        assert_eq!(
            reporter.report_item(&mut page, &item).await,
            ReportOutcome::Failed
        );
        assert_eq!(page.open_layers(), 0);
        assert_eq!(page.activations(), &[Control::CloseLayer; 3]);
        assert_eq!(clock.count_of(Duration::from_millis(1_001)), 3);
        // One retry after the default backoff
        assert_eq!(clock.count_of(Duration::from_millis(3_000)), 1);
    }

    #[tokio::test]
    async fn test_layer_closing_is_capped() {
        let (_, _, _, mut reporter) = setup(config());
        let mut page = page_with(
            vec![SimItem::tweet("bot", "7", "spam")],
            SurfaceScript {
                missing: vec![Control::SpamReason],
                stacked_layers: 20,
                ..SurfaceScript::default()
            },
        );
        let item = first_item(&mut page).await;

        assert_eq!(
            reporter.report_item(&mut page, &item).await,
            ReportOutcome::Failed
        );
        let closes = page
            .activations()
            .iter()
            .filter(|c| **c == Control::CloseLayer)
            .count();
        assert_eq!(closes, 10);
        assert_eq!(page.open_layers(), 11);
    }

    #[tokio::test]
    async fn test_late_control_found_on_retry() {
        let (_, clock, _, mut reporter) = setup(config());
        let mut page = page_with(
            vec![SimItem::tweet("bot", "7", "spam")],
            SurfaceScript {
                delayed: HashMap::from([(Control::SpamReason, 1)]),
                ..SurfaceScript::default()
            },
        );
        let item = first_item(&mut page).await;

        assert_eq!(
            reporter.report_item(&mut page, &item).await,
            ReportOutcome::Reported
        );
        assert_eq!(clock.count_of(Duration::from_millis(5_000)), 1);
    }

    #[tokio::test]
    async fn test_frame_failure_reloads_view() {
        let (_, clock, _, mut reporter) = setup(config());
        let mut page = page_with(
            vec![SimItem::tweet("bot", "7", "spam")],
            SurfaceScript {
                frame_failures: 1,
                ..SurfaceScript::default()
            },
        );
        let item = first_item(&mut page).await;

        assert_eq!(
            reporter.report_item(&mut page, &item).await,
            ReportOutcome::ViewReloaded
        );
        assert_eq!(page.reload_count(), 1);
        assert_eq!(clock.count_of(Duration::from_millis(10_002)), 1);
        assert_eq!(reporter.state(), ReportState::Idle);
    }

    #[tokio::test]
    async fn test_item_without_menu_fails() {
        let (_, _, _, mut reporter) = setup(config());
        let mut page = page_with(
            vec![SimItem::tweet("bot", "7", "spam").without_menu()],
            SurfaceScript::default(),
        );
        let item = first_item(&mut page).await;

        assert_eq!(
            reporter.report_item(&mut page, &item).await,
            ReportOutcome::Failed
        );
        assert!(page.activations().is_empty());
    }

    #[tokio::test]
    async fn test_pass_handles_each_kind_of_item() {
        let (db, _, _, mut reporter) = setup(config());
        db.add_keyword("giveaway").unwrap();
        reporter.reload_rules().unwrap();
        let mut page = page_with(
            vec![
                SimItem::filler(""),
                SimItem::filler("You reported this Tweet."),
                SimItem::tweet("bot", "2", "free giveaway"),
                SimItem::tweet("fan", "3", "great launch"),
            ],
            SurfaceScript::default(),
        );

        let outcome = reporter.process_list(&mut page).await;
        assert_eq!(outcome, PassOutcome::Completed { processed: 4 });
        assert_eq!(page.remaining(), 0);
        assert!(db.reported_tweet_exists(&TweetId::new("2").unwrap()).unwrap());
        let staged = db.unreported_tweets().unwrap();
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].tweet_id.as_str(), "3");
        assert_eq!(db.keyword("giveaway").unwrap().unwrap().match_count, 1);

        // Nothing left on the next pass
        assert_eq!(
            reporter.process_list(&mut page).await,
            PassOutcome::Completed { processed: 0 }
        );
    }

    #[tokio::test]
    async fn test_stop_and_pause_are_observed_between_items() {
        let (_, clock, signals, mut reporter) = setup(config());
        let mut page = page_with(
            vec![SimItem::tweet("a", "1", "x"), SimItem::tweet("b", "2", "y")],
            SurfaceScript::default(),
        );

        signals.request_pause();
        assert_eq!(
            reporter.process_list(&mut page).await,
            PassOutcome::Completed { processed: 2 }
        );
        assert_eq!(clock.count_of(Duration::from_millis(30_000)), 1);
        assert!(!signals.is_pause_requested());

        let mut page = page_with(vec![SimItem::tweet("a", "1", "x")], SurfaceScript::default());
        signals.request_stop();
        assert_eq!(reporter.process_list(&mut page).await, PassOutcome::Stopped);
        assert_eq!(page.remaining(), 1);
    }

    #[tokio::test]
    async fn test_skipped_report_drops_queued_tweet() {
        let (db, _, _, mut reporter) = setup(config());
        let author = Handle::new("bot").unwrap();
        let id = TweetId::new("7").unwrap();
        db.enqueue_tweet(&id, &author).unwrap();
        db.record_reported_user(&author).unwrap();

        let mut page = page_with(
            vec![SimItem::tweet("bot", "7", "hello")],
            SurfaceScript {
                expired: vec!["7".to_string()],
                ..SurfaceScript::default()
            },
        );
        reporter.reload_rules().unwrap();

        assert_eq!(
            reporter.process_list(&mut page).await,
            PassOutcome::Completed { processed: 1 }
        );
        assert!(!db.tweet_in_queue(&id).unwrap());
        assert_eq!(page.remaining(), 0);
    }

    #[tokio::test]
    async fn test_run_expands_and_finishes() {
        let (db, _, _, mut reporter) = setup(config());
        db.add_keyword("scam").unwrap();
        let mut page = page_with(
            vec![
                SimItem::tweet("fan", "1", "nice"),
                SimItem::expander(
                    "Show more replies",
                    vec![SimItem::tweet("bot", "2", "scam link")],
                ),
            ],
            SurfaceScript::default(),
        );

        assert_eq!(reporter.run(&mut page).await.unwrap(), RunOutcome::Finished);
        assert!(db.reported_tweet_exists(&TweetId::new("2").unwrap()).unwrap());
        assert_eq!(page.scrolls_to_end(), 2);
        assert_eq!(page.remaining(), 0);
    }

    #[tokio::test]
    async fn test_run_gives_up_after_restart_cap() {
        let mut config = config();
        config.max_pass_restarts = Some(1);
        let (db, clock, _, mut reporter) = setup(config);
        db.add_keyword("scam").unwrap();
        let mut page = page_with(
            vec![SimItem::tweet("bot", "2", "scam")],
            SurfaceScript {
                missing: vec![Control::ReportEntry],
                ..SurfaceScript::default()
            },
        );

        assert_eq!(
            reporter.run(&mut page).await.unwrap(),
            RunOutcome::GaveUp { restarts: 2 }
        );
        assert_eq!(clock.count_of(Duration::from_millis(10_003)), 1);
    }

    #[tokio::test]
    async fn test_run_refuses_abort_path() {
        let mut config = config();
        config.abort_path_marker = Some("/status/".to_string());
        let (_, clock, _, mut reporter) = setup(config);
        let mut page = page_with(vec![SimItem::tweet("a", "1", "x")], SurfaceScript::default());

        assert_eq!(reporter.run(&mut page).await.unwrap(), RunOutcome::Aborted);
        assert!(clock.sleeps().is_empty());
        assert_eq!(page.remaining(), 1);
    }
}
