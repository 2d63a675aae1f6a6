mod cli;
mod config;
mod events;
mod gate;
mod health;
mod logview;
mod merge;
mod results;
mod runtime;
mod scheduler;
mod state;
mod view;

use crate::cli::Args;
use crate::config::load_console_config;
use crate::events::ConsoleEvent;
use crate::health::ProjectListing;
use crate::runtime::{spawn_runner_worker, WorkerOptions};
use crate::state::{ConsoleState, JobModel, LogOptions, RunnerInfo, ViewCommand, ViewTab};
use anyhow::Context;
use axum::body::Body;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::{Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use protocol::SuiteStatusFilter;
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Clone)]
struct AppState {
    state: Arc<RwLock<ConsoleState>>,
    event_tx: broadcast::Sender<ConsoleEvent>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_to_stderr)?;

    info!(
        listen_addr = %args.listen_addr,
        config = %args.config.display(),
        "console starting"
    );
    let config = load_console_config(&args.config)
        .with_context(|| format!("failed to load config {}", args.config.display()))?;
    let shutdown = CancellationToken::new();
    let shared_state = Arc::new(RwLock::new(ConsoleState::new()));
    let (event_tx, _) = broadcast::channel(512);
    let app_state = AppState {
        state: Arc::clone(&shared_state),
        event_tx: event_tx.clone(),
    };

    let worker = spawn_runner_worker(
        WorkerOptions {
            addr: config.runner.addr.clone(),
            poll_delay: config.poll_delay(),
            request_timeout: config.request_timeout(),
            log_lines: config.log_lines(),
            status_filter: config.status_filter(),
        },
        Arc::clone(&shared_state),
        event_tx.clone(),
        shutdown.clone(),
    )
    .await;

    let app = Router::new()
        .route("/health", get(health))
        .route("/runner", get(runner_info))
        .route("/projects", get(list_projects))
        .route("/job", get(get_job_model))
        .route("/view/open", post(open_view))
        .route("/view/tab", post(switch_tab))
        .route("/view/close", post(close_view))
        .route("/view/status-filter", post(set_status_filter))
        .route("/view/reload-suites", post(reload_suites))
        .route("/view/log-filter", post(set_log_filter))
        .route("/view/log-options", post(set_log_options))
        .route("/view/refresh-log", post(refresh_log))
        .route("/job/:id/halt", post(halt_job))
        .route("/job/:id/start", post(start_job))
        .route("/job/:id/ack", post(ack_job))
        .route("/job/:id/resolve", post(resolve_job))
        .route("/ws", get(ws_handler))
        .with_state(app_state)
        .layer(middleware::from_fn(log_http_request));

    let listener = TcpListener::bind(&args.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", args.listen_addr))?;
    info!(addr = %args.listen_addr, "console listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(shutdown.clone()))
        .await?;
    info!("console shutting down");
    shutdown.cancel();
    let _ = worker.await;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

async fn log_http_request(req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let response = next.run(req).await;
    let status = response.status();
    tracing::info!(method = %method, uri = %uri, status = %status, "http request");
    response
}

async fn runner_info(State(app): State<AppState>) -> Json<RunnerInfo> {
    let state = app.state.read().await;
    Json(state.runner_info())
}

async fn list_projects(State(app): State<AppState>) -> Result<Json<ProjectListing>, StatusCode> {
    let state = app.state.read().await;
    match state.listing() {
        Some(listing) => Ok(Json(listing)),
        None => Err(StatusCode::NOT_FOUND),
    }
}

async fn get_job_model(State(app): State<AppState>) -> Result<Json<JobModel>, StatusCode> {
    let state = app.state.read().await;
    match state.job_model() {
        Some(model) => Ok(Json(model)),
        None => {
            tracing::info!(event = "job_model.miss", "no active job view");
            Err(StatusCode::NOT_FOUND)
        }
    }
}

#[derive(Deserialize)]
struct OpenViewPayload {
    job: String,
    tab: Option<ViewTab>,
}

#[derive(Deserialize)]
struct TabPayload {
    tab: ViewTab,
}

#[derive(Deserialize)]
struct StatusFilterPayload {
    status_filter: SuiteStatusFilter,
}

#[derive(Deserialize)]
struct LogFilterPayload {
    filter: String,
}

#[derive(Deserialize)]
struct UserPayload {
    user: String,
}

#[derive(serde::Serialize)]
struct ActionResponse {
    message: String,
}

async fn send_command(app: &AppState, command: ViewCommand) -> Result<(), StatusCode> {
    let sender = app.state.read().await.command_sender();
    let Some(sender) = sender else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };
    sender
        .send(command)
        .map_err(|_| StatusCode::SERVICE_UNAVAILABLE)
}

fn queued(message: &str) -> Json<ActionResponse> {
    Json(ActionResponse {
        message: message.to_string(),
    })
}

async fn open_view(
    State(app): State<AppState>,
    Json(payload): Json<OpenViewPayload>,
) -> Result<Json<ActionResponse>, StatusCode> {
    send_command(
        &app,
        ViewCommand::OpenJob {
            job: payload.job,
            tab: payload.tab.unwrap_or(ViewTab::Summary),
        },
    )
    .await?;
    Ok(queued("view opened"))
}

async fn switch_tab(
    State(app): State<AppState>,
    Json(payload): Json<TabPayload>,
) -> Result<Json<ActionResponse>, StatusCode> {
    send_command(&app, ViewCommand::SwitchTab(payload.tab)).await?;
    Ok(queued("tab switched"))
}

async fn close_view(State(app): State<AppState>) -> Result<Json<ActionResponse>, StatusCode> {
    send_command(&app, ViewCommand::CloseView).await?;
    Ok(queued("view closed"))
}

async fn set_status_filter(
    State(app): State<AppState>,
    Json(payload): Json<StatusFilterPayload>,
) -> Result<Json<ActionResponse>, StatusCode> {
    send_command(&app, ViewCommand::SetStatusFilter(payload.status_filter)).await?;
    Ok(queued("status filter updated"))
}

async fn reload_suites(State(app): State<AppState>) -> Result<Json<ActionResponse>, StatusCode> {
    send_command(&app, ViewCommand::ReloadSuites).await?;
    Ok(queued("suite reload queued"))
}

async fn set_log_filter(
    State(app): State<AppState>,
    Json(payload): Json<LogFilterPayload>,
) -> Result<Json<ActionResponse>, StatusCode> {
    send_command(&app, ViewCommand::SetLogFilter(payload.filter)).await?;
    Ok(queued("log filter updated"))
}

async fn set_log_options(
    State(app): State<AppState>,
    Json(payload): Json<LogOptions>,
) -> Result<Json<ActionResponse>, StatusCode> {
    send_command(&app, ViewCommand::SetLogOptions(payload)).await?;
    Ok(queued("log options updated"))
}

async fn refresh_log(State(app): State<AppState>) -> Result<Json<ActionResponse>, StatusCode> {
    send_command(&app, ViewCommand::RefreshLog).await?;
    Ok(queued("log refresh queued"))
}

async fn halt_job(
    Path(id): Path<String>,
    State(app): State<AppState>,
) -> Result<Json<ActionResponse>, StatusCode> {
    send_command(&app, ViewCommand::Halt { job: id }).await?;
    Ok(queued("halt queued"))
}

async fn start_job(
    Path(id): Path<String>,
    State(app): State<AppState>,
) -> Result<Json<ActionResponse>, StatusCode> {
    send_command(&app, ViewCommand::Start { job: id }).await?;
    Ok(queued("start queued"))
}

async fn ack_job(
    Path(id): Path<String>,
    State(app): State<AppState>,
    Json(payload): Json<UserPayload>,
) -> Result<Json<ActionResponse>, StatusCode> {
    send_command(
        &app,
        ViewCommand::Ack {
            job: id,
            user: payload.user,
        },
    )
    .await?;
    Ok(queued("ack queued"))
}

async fn resolve_job(
    Path(id): Path<String>,
    State(app): State<AppState>,
    Json(payload): Json<UserPayload>,
) -> Result<Json<ActionResponse>, StatusCode> {
    send_command(
        &app,
        ViewCommand::Resolve {
            job: id,
            user: payload.user,
        },
    )
    .await?;
    Ok(queued("resolve queued"))
}

async fn ws_handler(ws: WebSocketUpgrade, State(app): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, app))
}

async fn handle_ws(mut socket: WebSocket, app: AppState) {
    // Late subscribers get the current snapshots first, then live events.
    let (runner, listing, model) = {
        let state = app.state.read().await;
        (state.runner_info(), state.listing(), state.job_model())
    };
    if send_ws_event(&mut socket, ConsoleEvent::RunnerStatus { runner })
        .await
        .is_err()
    {
        return;
    }
    if let Some(listing) = listing {
        if send_ws_event(&mut socket, ConsoleEvent::ProjectsUpdated { listing })
            .await
            .is_err()
        {
            return;
        }
    }
    if let Some(model) = model {
        if send_ws_event(&mut socket, ConsoleEvent::JobModelUpdated { model })
            .await
            .is_err()
        {
            return;
        }
    }

    let mut rx = app.event_tx.subscribe();
    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(event) => {
                        if send_ws_event(&mut socket, event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }
}

async fn send_ws_event(socket: &mut WebSocket, event: ConsoleEvent) -> Result<(), axum::Error> {
    let payload = match serde_json::to_string(&event) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(error = %err, "failed to serialize websocket event");
            return Ok(());
        }
    };
    socket.send(Message::Text(payload)).await
}

fn init_tracing(log_to_stderr: bool) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
    );
    if log_to_stderr {
        builder.with_writer(std::io::stderr).init();
    } else {
        builder.init();
    }
    Ok(())
}

async fn wait_for_shutdown(shutdown: CancellationToken) {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
    shutdown.cancel();
}
