use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use tweetguard_core::classifier::compile_pattern;
use tweetguard_core::tracing_setup::init_tracing;
use tweetguard_core::{
    Clock, CoreConfig, Database, Handle, ManualClock, PageDriver, QueueEngine, RunSignals,
    SimulatedPage, TokioClock,
};

use super::config::CliConfig;
use super::protocol::{Request, Response};

const SOCKET_NAME: &str = "tweetguard.sock";
const PID_FILE: &str = "daemon.pid";

/// Get socket path, using config override if provided
pub fn get_socket_path(config: Option<&CliConfig>) -> PathBuf {
    if let Some(cfg) = config {
        if let Some(ref path) = cfg.socket_path {
            return path.clone();
        }
    }
    default_socket_path()
}

/// Default socket path when no config is provided
pub fn default_socket_path() -> PathBuf {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tweetguard");
    base_dir.join(SOCKET_NAME)
}

fn get_pid_path(config: Option<&CliConfig>) -> PathBuf {
    // Put PID file next to socket
    let socket_path = get_socket_path(config);
    if let Some(parent) = socket_path.parent() {
        parent.join(PID_FILE)
    } else {
        PathBuf::from(PID_FILE)
    }
}

/// Run the daemon server
#[tokio::main]
pub async fn run_daemon(config: Option<CliConfig>) -> Result<()> {
    if let Err(e) = init_tracing() {
        eprintln!("Logging unavailable: {}", e);
    }
    let config = config.unwrap_or_default();
    info!("Starting tweetguard daemon...");

    // Ensure base directory exists
    let socket_path = get_socket_path(Some(&config));
    if let Some(parent) = socket_path.parent() {
        fs::create_dir_all(parent)?;
    }

    // Remove stale socket if exists
    if socket_path.exists() {
        fs::remove_file(&socket_path)?;
    }

    let pid_path = get_pid_path(Some(&config));
    fs::write(&pid_path, std::process::id().to_string())?;

    let core = config.core_config();
    let db = Database::open(&core.data_dir)
        .with_context(|| format!("Failed to open store in {}", core.data_dir.display()))?;
    let page = match config.fixture {
        Some(ref path) => Some(SimulatedPage::from_fixture_file(path)?),
        None => {
            warn!("No fixture configured; run and dump_replies are unavailable");
            None
        }
    };
    let clock: Arc<dyn Clock> = if config.instant {
        Arc::new(ManualClock::unrecorded())
    } else {
        Arc::new(TokioClock)
    };
    let mut state = DaemonState::new(core, db, page, clock);

    let listener = UnixListener::bind(&socket_path)?;
    info!("Listening on {:?}", socket_path);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _)) => match handle_connection(stream, &mut state).await {
                        Ok(true) => {
                            info!("Shutdown requested");
                            break;
                        }
                        Ok(false) => {}
                        Err(e) => warn!("Connection error: {}", e),
                    },
                    Err(e) => warn!("Accept error: {}", e),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                state.signals.request_stop();
                state.wait_for_job().await;
                break;
            }
        }
    }

    fs::remove_file(&socket_path).ok();
    fs::remove_file(&pid_path).ok();

    info!("Daemon stopped");
    Ok(())
}

async fn handle_connection(stream: UnixStream, state: &mut DaemonState) -> Result<bool> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let (response, should_shutdown) = match serde_json::from_str::<Request>(&line) {
            Ok(request) => state.handle_request(&request).await,
            Err(e) => (Response::error(0, "PARSE_ERROR", &e.to_string()), false),
        };

        let mut payload = serde_json::to_string(&response)?;
        payload.push('\n');
        writer.write_all(payload.as_bytes()).await?;
        writer.flush().await?;

        if should_shutdown {
            return Ok(true);
        }
    }

    Ok(false)
}

struct Failure {
    code: &'static str,
    message: String,
}

impl Failure {
    fn invalid(message: impl Into<String>) -> Self {
        Self {
            code: "INVALID_PARAMS",
            message: message.into(),
        }
    }

    fn busy() -> Self {
        Self {
            code: "BUSY",
            message: "A run is in progress; stop it first".to_string(),
        }
    }

    fn no_driver() -> Self {
        Self {
            code: "NO_DRIVER",
            message: "No page driver configured; set `fixture` in the config".to_string(),
        }
    }

    fn internal(err: impl std::fmt::Display) -> Self {
        Self {
            code: "INTERNAL_ERROR",
            message: err.to_string(),
        }
    }
}

fn str_param<'a>(params: &'a Value, key: &str) -> Result<&'a str, Failure> {
    params[key]
        .as_str()
        .ok_or_else(|| Failure::invalid(format!("Missing parameter: {}", key)))
}

fn handle_param(params: &Value, key: &str) -> Result<Handle, Failure> {
    Handle::parse(str_param(params, key)?).map_err(|e| Failure::invalid(e.to_string()))
}

fn to_json<T: serde::Serialize>(value: T) -> Result<Value, Failure> {
    serde_json::to_value(value).map_err(Failure::internal)
}

/// Everything the daemon serves requests from.
///
/// The engine and the page sit behind async mutexes so a run can own them in
/// a background task while the socket keeps answering. Without a page only
/// the store-backed methods are served.
pub struct DaemonState {
    config: CoreConfig,
    db: Database,
    signals: RunSignals,
    engine: Arc<Mutex<QueueEngine>>,
    page: Option<Arc<Mutex<SimulatedPage>>>,
    job: Option<JoinHandle<()>>,
    last_outcome: Arc<parking_lot::Mutex<Option<String>>>,
    start_time: Instant,
}

impl DaemonState {
    pub fn new(
        config: CoreConfig,
        db: Database,
        page: Option<SimulatedPage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let signals = RunSignals::new();
        let engine = QueueEngine::new(db.clone(), config.clone(), clock, signals.clone());
        Self {
            config,
            db,
            signals,
            engine: Arc::new(Mutex::new(engine)),
            page: page.map(|page| Arc::new(Mutex::new(page))),
            job: None,
            last_outcome: Arc::new(parking_lot::Mutex::new(None)),
            start_time: Instant::now(),
        }
    }

    fn is_running(&self) -> bool {
        self.job.as_ref().is_some_and(|job| !job.is_finished())
    }

    /// Wait for the background run, if any, to return.
    pub async fn wait_for_job(&mut self) {
        if let Some(job) = self.job.take() {
            if let Err(e) = job.await {
                warn!("Run task failed: {}", e);
            }
        }
    }

    pub async fn handle_request(&mut self, request: &Request) -> (Response, bool) {
        let id = request.id;
        let params = &request.params;

        let result = match request.method.as_str() {
            "add_user" => self.add_user(params),
            "remove_user" => handle_param(params, "handle").and_then(|handle| {
                let removed = self
                    .db
                    .remove_monitored_user(&handle)
                    .map_err(Failure::internal)?;
                Ok(json!({ "handle": handle, "removed": removed }))
            }),
            "list_users" => self
                .db
                .monitored_users()
                .map_err(Failure::internal)
                .and_then(to_json),
            "add_keyword" => self.add_keywords(params),
            "add_regex" => self.add_regex(params),
            "add_spammer" => handle_param(params, "handle").and_then(|handle| {
                let report_count = self
                    .db
                    .record_reported_user(&handle)
                    .map_err(Failure::internal)?;
                Ok(json!({ "handle": handle, "report_count": report_count }))
            }),
            "list_rules" => self.list_rules(),
            "print_unreported" => self.print_unreported(params),
            "fix_unreported" => self
                .db
                .fix_unreported()
                .map_err(Failure::internal)
                .and_then(to_json),
            "clear" => self
                .db
                .clear_tweet_queue()
                .map(|()| json!({ "cleared": true }))
                .map_err(Failure::internal),
            "reset" => self.reset().await,
            "stop" => {
                self.signals.request_stop();
                Ok(json!({ "stopping": self.is_running() }))
            }
            "pause" => {
                self.signals.request_pause();
                Ok(json!({ "pausing": self.is_running() }))
            }
            "run" => self.start_run(),
            "dump_replies" => self.dump_replies().await,
            "status" => self.status(),
            "shutdown" => {
                self.signals.request_stop();
                self.wait_for_job().await;
                let response = Response::success(id, json!({ "shutdown": true }));
                return (response, true);
            }
            other => Err(Failure {
                code: "UNKNOWN_METHOD",
                message: format!("Unknown method: {}", other),
            }),
        };

        let response = match result {
            Ok(value) => Response::success(id, value),
            Err(failure) => Response::error(id, failure.code, &failure.message),
        };
        (response, false)
    }

    fn add_user(&self, params: &Value) -> Result<Value, Failure> {
        let handle = handle_param(params, "handle")?;
        let target = match params["target"].as_u64() {
            Some(raw) => u32::try_from(raw).map_err(|_| Failure::invalid("target out of range"))?,
            None => self.config.default_target_tweets,
        };
        let added = self
            .db
            .add_monitored_user(&handle, target)
            .map_err(Failure::internal)?;
        Ok(json!({ "handle": handle, "target": target, "added": added }))
    }

    fn add_keywords(&self, params: &Value) -> Result<Value, Failure> {
        let terms = params["terms"]
            .as_array()
            .ok_or_else(|| Failure::invalid("Missing parameter: terms"))?;

        let mut added = Vec::new();
        let mut existing = Vec::new();
        for term in terms {
            let term = term
                .as_str()
                .ok_or_else(|| Failure::invalid("Keywords must be strings"))?;
            let inserted = self.db.add_keyword(term).map_err(|e| {
                if matches!(e, tweetguard_core::StoreError::InvalidKey(_)) {
                    Failure::invalid(e.to_string())
                } else {
                    Failure::internal(e)
                }
            })?;
            if inserted {
                added.push(term.to_string());
            } else {
                existing.push(term.to_string());
            }
        }
        Ok(json!({ "added": added, "existing": existing }))
    }

    fn add_regex(&self, params: &Value) -> Result<Value, Failure> {
        let pattern = str_param(params, "pattern")?;
        compile_pattern(pattern).map_err(|e| Failure {
            code: "INVALID_PATTERN",
            message: e.to_string(),
        })?;
        let added = self.db.add_regex(pattern).map_err(Failure::internal)?;
        Ok(json!({ "pattern": pattern, "added": added }))
    }

    fn list_rules(&self) -> Result<Value, Failure> {
        let keywords = self.db.keywords().map_err(Failure::internal)?;
        let patterns = self.db.regex_patterns().map_err(Failure::internal)?;
        Ok(json!({ "keywords": keywords, "patterns": patterns }))
    }

    fn print_unreported(&self, params: &Value) -> Result<Value, Failure> {
        let count = params["count"]
            .as_u64()
            .ok_or_else(|| Failure::invalid("Missing parameter: count"))?;
        let count = usize::try_from(count).map_err(|_| Failure::invalid("count out of range"))?;
        let tweets = self.db.take_unreported(count).map_err(Failure::internal)?;
        to_json(tweets)
    }

    fn driver(&self) -> Result<Arc<Mutex<SimulatedPage>>, Failure> {
        self.page.as_ref().map(Arc::clone).ok_or_else(Failure::no_driver)
    }

    fn start_run(&mut self) -> Result<Value, Failure> {
        if self.is_running() {
            return Err(Failure::busy());
        }
        let page = self.driver()?;
        // A pause sent while idle must not carry over into this run
        self.signals.clear();
        *self.last_outcome.lock() = None;

        let engine = Arc::clone(&self.engine);
        let last_outcome = Arc::clone(&self.last_outcome);
        self.job = Some(tokio::spawn(async move {
            let mut engine = engine.lock().await;
            let mut page = page.lock().await;
            let summary = match engine.report_all(&mut *page).await {
                Ok(outcome) => {
                    info!(?outcome, "Run ended");
                    format!("{:?}", outcome)
                }
                Err(e) => {
                    warn!("Run failed: {}", e);
                    format!("Error: {}", e)
                }
            };
            *last_outcome.lock() = Some(summary);
        }));
        Ok(json!({ "started": true }))
    }

    async fn reset(&mut self) -> Result<Value, Failure> {
        self.signals.request_stop();
        self.wait_for_job().await;

        let result = match self.page {
            Some(ref page) => {
                let mut engine = self.engine.lock().await;
                let mut page = page.lock().await;
                engine.reset(&mut *page).await.map_err(Failure::internal)
            }
            None => self
                .db
                .clear_gather_queue()
                .and_then(|()| self.db.clear_tweet_queue())
                .map_err(Failure::internal),
        };
        self.signals.clear_stop();
        result?;
        Ok(json!({ "reset": true, "reloaded": self.page.is_some() }))
    }

    async fn dump_replies(&mut self) -> Result<Value, Failure> {
        if self.is_running() {
            return Err(Failure::busy());
        }
        let page = self.driver()?;
        let mut engine = self.engine.lock().await;
        let mut page = page.lock().await;
        let replies = engine
            .collect_replies(&mut *page)
            .await
            .map_err(Failure::internal)?;
        Ok(json!({ "replies": replies }))
    }

    fn status(&self) -> Result<Value, Failure> {
        let counts = self.db.counts().map_err(Failure::internal)?;
        // The page is owned by a running job; report its location only when idle
        let location = self
            .page
            .as_ref()
            .and_then(|page| page.try_lock().ok().map(|page| page.location()));
        Ok(json!({
            "running": self.is_running(),
            "driver": self.page.is_some(),
            "uptime_secs": self.start_time.elapsed().as_secs(),
            "location": location,
            "last_outcome": self.last_outcome.lock().clone(),
            "counts": counts,
        }))
    }
}
