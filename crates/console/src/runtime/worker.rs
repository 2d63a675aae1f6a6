use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use protocol::api::{ApiRequest, ApiResponse, FeedEvent};
use protocol::SuiteStatusFilter;

use crate::events::ConsoleEvent;
use crate::health::build_listing;
use crate::state::{ConsoleState, RunnerStatus, ViewCommand, ViewTab};
use crate::view::{Applied, StreamKind, ViewController};

use super::channel::{connect_runner, ControlChannel};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub(crate) struct WorkerOptions {
    pub(crate) addr: String,
    pub(crate) poll_delay: Duration,
    pub(crate) request_timeout: Duration,
    pub(crate) log_lines: u32,
    pub(crate) status_filter: SuiteStatusFilter,
}

pub(crate) async fn spawn_runner_worker(
    options: WorkerOptions,
    state: Arc<RwLock<ConsoleState>>,
    event_tx: broadcast::Sender<ConsoleEvent>,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    {
        let mut state = state.write().await;
        state.register_command_sender(cmd_tx);
    }
    info!(addr = %options.addr, "runner worker spawned");
    tokio::spawn(run_runner_worker(options, state, cmd_rx, event_tx, shutdown))
}

async fn run_runner_worker(
    options: WorkerOptions,
    state: Arc<RwLock<ConsoleState>>,
    mut cmd_rx: mpsc::UnboundedReceiver<ViewCommand>,
    event_tx: broadcast::Sender<ConsoleEvent>,
    shutdown: CancellationToken,
) {
    let (tick_tx, mut tick_rx) = mpsc::unbounded_channel();
    let mut controller = ViewController::new(
        options.poll_delay,
        options.request_timeout,
        options.log_lines,
        options.status_filter,
        tick_tx,
    );
    loop {
        if shutdown.is_cancelled() {
            break;
        }
        info!(addr = %options.addr, "connecting runner control channel");
        match connect_runner(&options.addr).await {
            Ok(mut channel) => {
                if let Err(err) = channel.send(ApiRequest::Subscribe).await {
                    set_status_and_notify(
                        RunnerStatus::Down,
                        Some(err.to_string()),
                        &state,
                        &event_tx,
                    )
                    .await;
                    warn!(error = %err, "failed to subscribe to runner feed");
                } else {
                    set_status_and_notify(RunnerStatus::Ready, None, &state, &event_tx).await;
                    let mut resync_failed = false;
                    for request in controller.resync() {
                        if let Err(err) = channel.send(request).await {
                            warn!(error = %err, "failed to restart view streams");
                            resync_failed = true;
                            break;
                        }
                    }
                    if !resync_failed {
                        info!("runner session started");
                        match session_loop(
                            &mut channel,
                            &mut controller,
                            &mut cmd_rx,
                            &mut tick_rx,
                            &state,
                            &event_tx,
                            &shutdown,
                        )
                        .await
                        {
                            Ok(()) => break,
                            Err(err) => {
                                set_status_and_notify(
                                    RunnerStatus::Down,
                                    Some(err.to_string()),
                                    &state,
                                    &event_tx,
                                )
                                .await;
                                warn!(error = %err, "runner session ended");
                            }
                        }
                    }
                }
            }
            Err(err) => {
                set_status_and_notify(
                    RunnerStatus::Down,
                    Some(err.to_string()),
                    &state,
                    &event_tx,
                )
                .await;
                warn!(error = %err, "failed to connect runner control channel");
            }
        }
        if wait_reconnect_or_shutdown(&shutdown, RECONNECT_DELAY).await {
            break;
        }
    }
    info!("runner worker stopped");
}

async fn session_loop<C: ControlChannel>(
    channel: &mut C,
    controller: &mut ViewController,
    cmd_rx: &mut mpsc::UnboundedReceiver<ViewCommand>,
    tick_rx: &mut mpsc::UnboundedReceiver<StreamKind>,
    state: &Arc<RwLock<ConsoleState>>,
    event_tx: &broadcast::Sender<ConsoleEvent>,
    shutdown: &CancellationToken,
) -> anyhow::Result<()> {
    loop {
        let deadline = controller.next_deadline();
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            Some(command) = cmd_rx.recv() => {
                for request in handle_command(controller, command, state, event_tx).await {
                    channel.send(request).await?;
                }
            }
            Some(kind) = tick_rx.recv() => {
                if let Some(request) = controller.handle_tick(kind) {
                    channel.send(request).await?;
                }
            }
            _ = wait_deadline(deadline) => {
                for kind in controller.expire_overdue(Instant::now()) {
                    warn!(stream = ?kind, "fetch timed out, dropping it");
                }
            }
            response = channel.next_response() => {
                let response = match response {
                    Some(response) => response?,
                    None => anyhow::bail!("control channel closed"),
                };
                for request in apply_response(controller, response, state, event_tx).await {
                    channel.send(request).await?;
                }
            }
        }
    }
}

async fn handle_command(
    controller: &mut ViewController,
    command: ViewCommand,
    state: &Arc<RwLock<ConsoleState>>,
    event_tx: &broadcast::Sender<ConsoleEvent>,
) -> Vec<ApiRequest> {
    match command {
        ViewCommand::OpenJob { job, tab } => {
            info!(job = %job, tab = ?tab, "opening job view");
            let requests = controller.open_job(job, tab);
            publish_model(controller, state, event_tx).await;
            requests
        }
        ViewCommand::SwitchTab(tab) => {
            let requests = controller.switch_tab(tab);
            publish_model(controller, state, event_tx).await;
            requests
        }
        ViewCommand::CloseView => {
            controller.close_view();
            state.write().await.clear_job_model();
            Vec::new()
        }
        ViewCommand::SetStatusFilter(filter) => {
            let requests = controller.set_status_filter(filter);
            publish_model(controller, state, event_tx).await;
            requests
        }
        ViewCommand::ReloadSuites => {
            let requests = controller.reload_suites();
            publish_model(controller, state, event_tx).await;
            requests
        }
        ViewCommand::SetLogFilter(expr) => {
            match controller.set_log_filter(&expr) {
                Ok(true) => publish_model(controller, state, event_tx).await,
                Ok(false) => {}
                Err(err) => notify(event_tx, format!("invalid log filter: {err}")),
            }
            Vec::new()
        }
        ViewCommand::SetLogOptions(options) => {
            let requests = controller.set_log_options(options);
            publish_model(controller, state, event_tx).await;
            requests
        }
        ViewCommand::RefreshLog => controller.refresh_log().into_iter().collect(),
        ViewCommand::Halt { job } => {
            notify(event_tx, format!("Stopping job {job} ..."));
            vec![ApiRequest::Halt { job }]
        }
        ViewCommand::Start { job } => vec![ApiRequest::Start {
            request_id: Uuid::new_v4().to_string(),
            job,
        }],
        ViewCommand::Ack { job, user } => vec![ApiRequest::Ack { job, user }],
        ViewCommand::Resolve { job, user } => vec![ApiRequest::Resolve { job, user }],
    }
}

async fn apply_response(
    controller: &mut ViewController,
    response: ApiResponse,
    state: &Arc<RwLock<ConsoleState>>,
    event_tx: &broadcast::Sender<ConsoleEvent>,
) -> Vec<ApiRequest> {
    if let ApiResponse::Event { event } = response {
        apply_feed_event(event, state, event_tx).await;
        return Vec::new();
    }
    match controller.handle_response(response) {
        Applied::Ignored => Vec::new(),
        Applied::ModelUpdated => {
            publish_model(controller, state, event_tx).await;
            Vec::new()
        }
        Applied::Notice(message) => {
            notify(event_tx, message);
            Vec::new()
        }
        Applied::JobStarted(Some(job_id)) => {
            info!(job = %job_id, "job started, switching view");
            let requests = controller.open_job(job_id, ViewTab::Summary);
            publish_model(controller, state, event_tx).await;
            requests
        }
        Applied::JobStarted(None) => {
            notify(event_tx, "Job cannot be started at this time.".to_string());
            Vec::new()
        }
    }
}

async fn apply_feed_event(
    event: FeedEvent,
    state: &Arc<RwLock<ConsoleState>>,
    event_tx: &broadcast::Sender<ConsoleEvent>,
) {
    match event {
        FeedEvent::ProjectsUpdated(projects) => {
            let listing = build_listing(projects, now_ms());
            info!(
                event = "feed.projects",
                projects = listing.projects.len(),
                health = ?listing.health,
                "project listing updated"
            );
            let mut guard = state.write().await;
            guard.set_runner_status(RunnerStatus::Ready, None);
            guard.apply_listing(listing.clone());
            drop(guard);
            let _ = event_tx.send(ConsoleEvent::ProjectsUpdated { listing });
        }
    }
}

async fn publish_model(
    controller: &mut ViewController,
    state: &Arc<RwLock<ConsoleState>>,
    event_tx: &broadcast::Sender<ConsoleEvent>,
) {
    if let Some(model) = controller.job_model() {
        let mut guard = state.write().await;
        guard.set_job_model(model.clone());
        drop(guard);
        let _ = event_tx.send(ConsoleEvent::JobModelUpdated { model });
    }
}

async fn set_status_and_notify(
    status: RunnerStatus,
    error: Option<String>,
    state: &Arc<RwLock<ConsoleState>>,
    event_tx: &broadcast::Sender<ConsoleEvent>,
) {
    {
        let mut guard = state.write().await;
        guard.set_runner_status(status, error.clone());
    }
    let runner = state.read().await.runner_info();
    let _ = event_tx.send(ConsoleEvent::RunnerStatus { runner });
    if let Some(message) = error {
        notify(event_tx, message);
    }
}

fn notify(event_tx: &broadcast::Sender<ConsoleEvent>, message: String) {
    let _ = event_tx.send(ConsoleEvent::Notice { message });
}

async fn wait_reconnect_or_shutdown(shutdown: &CancellationToken, delay: Duration) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => true,
        _ = tokio::time::sleep(delay) => false,
    }
}

async fn wait_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}
