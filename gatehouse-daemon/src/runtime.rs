use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::time::Instant;

use gatehouse_auth::{update_avatar, IdentityVerifier, Resolver, StaticTokenVerifier};
use gatehouse_core::config;
use gatehouse_store::{RecordStore, RestFallback, RestStore};
use gatehouse_sync::{
    sync_avatars, sync_roster, AvatarSyncOutcome, RestSheet, RosterSyncOptions, RosterSyncOutcome,
    SheetSource,
};

use crate::error::{io_err, DaemonError};
use crate::paths::{logs_dir, socket_path, DAEMON_LABEL};
use crate::protocol::{DaemonRequest, DaemonResponse};

pub const JOB_ROSTER: &str = "roster";
pub const JOB_AVATARS: &str = "avatars";

/// Last finished run per job name ("roster" / "avatars").
#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub finished_at_unix: u64,
    pub ok: bool,
    pub summary: String,
}

pub type JobHistory = HashMap<String, JobRecord>;

struct SyncJob {
    source: &'static str,
    respond_to: oneshot::Sender<Result<JobReport, String>>,
}

/// What a completed job run sends back over the control socket.
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job: &'static str,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<usize>,
    pub duration_ms: u128,
}

impl JobReport {
    fn roster(source: &'static str, outcome: &RosterSyncOutcome, duration: Duration) -> Self {
        Self {
            job: JOB_ROSTER,
            source: source.to_string(),
            processed: Some(outcome.processed),
            deleted: Some(outcome.deleted),
            updated: None,
            skipped: None,
            duration_ms: duration.as_millis(),
        }
    }

    fn avatars(source: &'static str, outcome: &AvatarSyncOutcome, duration: Duration) -> Self {
        Self {
            job: JOB_AVATARS,
            source: source.to_string(),
            processed: None,
            deleted: None,
            updated: Some(outcome.updated),
            skipped: Some(outcome.skipped),
            duration_ms: duration.as_millis(),
        }
    }

    fn summary_line(&self) -> String {
        if self.job == JOB_AVATARS {
            format!(
                "updated {}, skipped {}",
                self.updated.unwrap_or(0),
                self.skipped.unwrap_or(0)
            )
        } else {
            format!(
                "upserted {}, deleted {}",
                self.processed.unwrap_or(0),
                self.deleted.unwrap_or(0)
            )
        }
    }
}

/// Shared handles every socket client needs.
#[derive(Clone)]
struct ServerState {
    home: PathBuf,
    store: Arc<dyn RecordStore>,
    resolver: Arc<Resolver>,
    verifier: Arc<StaticTokenVerifier>,
    history: Arc<RwLock<JobHistory>>,
    roster_tx: mpsc::Sender<SyncJob>,
    avatar_tx: mpsc::Sender<SyncJob>,
    shutdown_tx: broadcast::Sender<()>,
    started_at_unix: u64,
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path) -> Result<(), DaemonError> {
    init_tracing();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf()))
}

/// Run the daemon runtime.
pub async fn run(home: PathBuf) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;

    let cfg = config::load_at(&home)?;
    let store: Arc<dyn RecordStore> = Arc::new(RestStore::new(&cfg.store));
    let sheet: Arc<dyn SheetSource> = Arc::new(RestSheet::new(&cfg.sheet));
    let fallback = Arc::new(RestFallback::new(&cfg.resolver, &cfg.store.collection));
    let verifier = Arc::new(StaticTokenVerifier::from_config(&cfg));
    let resolver = Arc::new(Resolver::with_timeout(
        store.clone(),
        fallback,
        cfg.resolver.primary_timeout(),
    ));

    if verifier.is_empty() {
        tracing::warn!("no bearer tokens configured; resolve and set-avatar will refuse all callers");
    }

    let history: Arc<RwLock<JobHistory>> = Arc::new(RwLock::new(HashMap::new()));
    let started_at_unix = unix_seconds_now();

    let (roster_tx, roster_rx) = mpsc::channel::<SyncJob>(16);
    let (avatar_tx, avatar_rx) = mpsc::channel::<SyncJob>(16);
    let (shutdown_tx, _) = broadcast::channel::<()>(16);

    let roster_processor_handle = {
        let shutdown = shutdown_tx.clone();
        let store = store.clone();
        let sheet = sheet.clone();
        let tab = cfg.sheet.tab.clone();
        let options = RosterSyncOptions {
            reconcile_deletes: cfg.sync.reconcile_deletes,
            dry_run: false,
        };
        let history = history.clone();
        tokio::spawn(async move {
            let result = roster_processor_task(
                store,
                sheet,
                tab,
                options,
                history,
                roster_rx,
                shutdown.subscribe(),
            )
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let avatar_processor_handle = {
        let shutdown = shutdown_tx.clone();
        let store = store.clone();
        let sheet = sheet.clone();
        let tab = cfg.sheet.tab.clone();
        let history = history.clone();
        tokio::spawn(async move {
            let result =
                avatar_processor_task(store, sheet, tab, history, avatar_rx, shutdown.subscribe())
                    .await;
            let _ = shutdown.send(());
            result
        })
    };

    let roster_schedule_handle = {
        let shutdown = shutdown_tx.clone();
        let job_tx = roster_tx.clone();
        let every = cfg.sync.roster_interval();
        tokio::spawn(async move {
            let result = schedule_task(JOB_ROSTER, every, job_tx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let avatar_schedule_handle = {
        let shutdown = shutdown_tx.clone();
        let job_tx = avatar_tx.clone();
        let every = cfg.sync.avatar_interval();
        tokio::spawn(async move {
            let result = schedule_task(JOB_AVATARS, every, job_tx, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let state = ServerState {
            home: home.clone(),
            store: store.clone(),
            resolver: resolver.clone(),
            verifier: verifier.clone(),
            history: history.clone(),
            roster_tx: roster_tx.clone(),
            avatar_tx: avatar_tx.clone(),
            shutdown_tx: shutdown_tx.clone(),
            started_at_unix,
        };
        tokio::spawn(async move {
            let result = socket_server_task(state, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let rotation_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        tokio::spawn(async move {
            let result = log_rotation_task(home, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (
        roster_processor_result,
        avatar_processor_result,
        roster_schedule_result,
        avatar_schedule_result,
        socket_result,
        rotation_result,
        signal_result,
    ) = tokio::join!(
        roster_processor_handle,
        avatar_processor_handle,
        roster_schedule_handle,
        avatar_schedule_handle,
        socket_handle,
        rotation_handle,
        signal_handle
    );

    handle_join("roster_processor", roster_processor_result)?;
    handle_join("avatar_processor", avatar_processor_result)?;
    handle_join("roster_schedule", roster_schedule_result)?;
    handle_join("avatar_schedule", avatar_schedule_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("log_rotation", rotation_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

/// Enqueue scheduled runs at a fixed period. The first immediate tick is
/// consumed so a fresh daemon does not sync the instant it starts.
async fn schedule_task(
    job: &'static str,
    every: Duration,
    job_tx: mpsc::Sender<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    if every.is_zero() {
        // An interval of zero disables the schedule for this job.
        tracing::info!("{job} schedule disabled by config");
        return Ok(());
    }

    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    interval.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                match enqueue_job(&job_tx, "schedule").await {
                    Ok(report) => {
                        tracing::info!(
                            job = report.job,
                            summary = %report.summary_line(),
                            duration_ms = report.duration_ms,
                            "scheduled sync completed",
                        );
                    }
                    Err(err) => {
                        tracing::error!(job = job, error = %err, "scheduled sync failed");
                    }
                }
            }
        }
    }
    Ok(())
}

async fn roster_processor_task(
    store: Arc<dyn RecordStore>,
    sheet: Arc<dyn SheetSource>,
    tab: String,
    options: RosterSyncOptions,
    history: Arc<RwLock<JobHistory>>,
    mut job_rx: mpsc::Receiver<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = job_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let started = Instant::now();

                let store = store.clone();
                let sheet = sheet.clone();
                let tab_for_run = tab.clone();
                let options_for_run = options.clone();
                let run = tokio::task::spawn_blocking(move || {
                    sync_roster(store.as_ref(), sheet.as_ref(), &tab_for_run, &options_for_run)
                })
                .await
                .map_err(|err| DaemonError::Protocol(format!("roster job join error: {err}")))?;

                let outcome = match run {
                    Ok(outcome) => {
                        let report = JobReport::roster(job.source, &outcome, started.elapsed());
                        record_job(&history, JOB_ROSTER, true, report.summary_line()).await;
                        Ok(report)
                    }
                    Err(err) => {
                        record_job(&history, JOB_ROSTER, false, err.to_string()).await;
                        Err(err.to_string())
                    }
                };

                let _ = job.respond_to.send(outcome);
            }
        }
    }
    Ok(())
}

async fn avatar_processor_task(
    store: Arc<dyn RecordStore>,
    sheet: Arc<dyn SheetSource>,
    tab: String,
    history: Arc<RwLock<JobHistory>>,
    mut job_rx: mpsc::Receiver<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = job_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let started = Instant::now();

                let store = store.clone();
                let sheet = sheet.clone();
                let tab_for_run = tab.clone();
                let run = tokio::task::spawn_blocking(move || {
                    sync_avatars(store.as_ref(), sheet.as_ref(), &tab_for_run, false)
                })
                .await
                .map_err(|err| DaemonError::Protocol(format!("avatar job join error: {err}")))?;

                let outcome = match run {
                    Ok(outcome) => {
                        let report = JobReport::avatars(job.source, &outcome, started.elapsed());
                        record_job(&history, JOB_AVATARS, true, report.summary_line()).await;
                        Ok(report)
                    }
                    Err(err) => {
                        record_job(&history, JOB_AVATARS, false, err.to_string()).await;
                        Err(err.to_string())
                    }
                };

                let _ = job.respond_to.send(outcome);
            }
        }
    }
    Ok(())
}

async fn record_job(
    history: &Arc<RwLock<JobHistory>>,
    job: &str,
    ok: bool,
    summary: String,
) {
    let mut guard = history.write().await;
    guard.insert(
        job.to_string(),
        JobRecord {
            finished_at_unix: unix_seconds_now(),
            ok,
            summary,
        },
    );
}

async fn socket_server_task(
    state: ServerState,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let socket = socket_path(&state.home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let state = state.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, state).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(stream: UnixStream, state: ServerState) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: Result<DaemonRequest, _> = serde_json::from_str(&line);
        let request = match request {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let cmd = request.cmd.clone();
        let bearer = request.bearer.clone();
        let avatar_url = request.avatar_url.clone();

        let response = match cmd.as_str() {
            "status" => {
                let payload = build_status_payload(
                    &state.home,
                    state.history.clone(),
                    state.started_at_unix,
                )
                .await;
                DaemonResponse::ok(payload)
            }
            "sync-roster" => match enqueue_job(&state.roster_tx, "socket").await {
                Ok(report) => DaemonResponse::ok(json!(report)),
                Err(err) => DaemonResponse::error(err.to_string()),
            },
            "sync-avatars" => match enqueue_job(&state.avatar_tx, "socket").await {
                Ok(report) => DaemonResponse::ok(json!(report)),
                Err(err) => DaemonResponse::error(err.to_string()),
            },
            "resolve" => match bearer.as_deref().and_then(|b| state.verifier.verify(b)) {
                Some(identity) => {
                    let resolution = state.resolver.resolve(&identity).await;
                    DaemonResponse::ok(json!(resolution))
                }
                None => DaemonResponse::error("authentication required"),
            },
            "set-avatar" => {
                let identity = bearer.as_deref().and_then(|b| state.verifier.verify(b));
                let url = avatar_url.unwrap_or_default();
                let store = state.store.clone();
                let applied = tokio::task::spawn_blocking(move || {
                    update_avatar(store.as_ref(), identity.as_ref(), &url)
                })
                .await
                .map_err(|err| DaemonError::Protocol(format!("avatar task join error: {err}")))?;
                match applied {
                    Ok(update) => DaemonResponse::ok(json!(update)),
                    Err(err) => DaemonResponse::error(err.to_string()),
                }
            }
            "stop" => {
                let _ = state.shutdown_tx.send(());
                DaemonResponse::ok(json!({ "stopping": true }))
            }
            other => DaemonResponse::error(format!("unknown command '{other}'")),
        };

        write_response(&mut writer, &response).await?;
        if cmd == "stop" {
            break;
        }
    }

    Ok(())
}

async fn build_status_payload(
    home: &Path,
    history: Arc<RwLock<JobHistory>>,
    started_at_unix: u64,
) -> Value {
    // Snapshot the history (read lock, dropped before JSON assembly).
    let snapshot: JobHistory = {
        let guard = history.read().await;
        guard.clone()
    };

    let jobs: Vec<Value> = [JOB_ROSTER, JOB_AVATARS]
        .iter()
        .map(|job| match snapshot.get(*job) {
            Some(record) => json!({
                "job": job,
                "last_run_at_unix": record.finished_at_unix,
                "ok": record.ok,
                "summary": record.summary,
            }),
            None => json!({
                "job": job,
                "last_run_at_unix": 0,
            }),
        })
        .collect();

    // Daemon-wide last run = max of per-job timestamps (0 if none yet).
    let last_run_at_unix = snapshot
        .values()
        .map(|record| record.finished_at_unix)
        .max()
        .unwrap_or(0);

    json!({
        "running": true,
        "label": DAEMON_LABEL,
        "started_at_unix": started_at_unix,
        "last_run_at_unix": last_run_at_unix,
        "jobs": jobs,
        "socket": socket_path(home).display().to_string(),
    })
}

async fn enqueue_job(
    job_tx: &mpsc::Sender<SyncJob>,
    source: &'static str,
) -> Result<JobReport, DaemonError> {
    let (tx, rx) = oneshot::channel();
    job_tx
        .send(SyncJob {
            source,
            respond_to: tx,
        })
        .await
        .map_err(|_| DaemonError::ChannelClosed("job queue"))?;

    let outcome = rx
        .await
        .map_err(|_| DaemonError::ChannelClosed("job response"))?;
    outcome.map_err(DaemonError::Protocol)
}

async fn log_rotation_task(
    home: PathBuf,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut interval = tokio::time::interval(Duration::from_secs(5));
    // Skip the first (immediate) tick to avoid rotating on startup.
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    interval.tick().await; // consume the first immediate tick

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = interval.tick() => {
                let home = home.clone();
                tokio::task::spawn_blocking(move || {
                    crate::log_rotation::rotate_logs(&home);
                })
                .await
                .ok(); // rotation errors are logged inside rotate_logs; never crash the daemon
            }
        }
    }
    Ok(())
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    config::ensure_dir_at(home)?;
    let logs = logs_dir(home);
    if !logs.exists() {
        fs::create_dir_all(&logs).map_err(|e| io_err(&logs, e))?;
    }
    Ok(())
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

fn unix_seconds_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
