use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use protocol::api::{ApiRequest, ApiResponse};
use protocol::{JobSummary, SuiteStatusFilter};

use crate::gate::{FetchGate, FetchToken};
use crate::logview::LogBuffer;
use crate::merge::merge_suites;
use crate::results::aggregate_tree;
use crate::scheduler::RefreshTimer;
use crate::state::{JobModel, LogModel, LogOptions, ViewTab};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum StreamKind {
    Summary,
    Suites,
    Log,
    Artifacts,
    Results,
}

impl StreamKind {
    fn tab(self) -> ViewTab {
        match self {
            StreamKind::Summary => ViewTab::Summary,
            StreamKind::Suites => ViewTab::Suites,
            StreamKind::Log => ViewTab::Log,
            StreamKind::Artifacts => ViewTab::Artifacts,
            StreamKind::Results => ViewTab::Results,
        }
    }

    fn for_tab(tab: ViewTab) -> StreamKind {
        match tab {
            ViewTab::Summary => StreamKind::Summary,
            ViewTab::Suites => StreamKind::Suites,
            ViewTab::Log => StreamKind::Log,
            ViewTab::Artifacts => StreamKind::Artifacts,
            ViewTab::Results => StreamKind::Results,
        }
    }
}

/// Gate and timer for one polled stream. The pair is owned by the view
/// that created it and dies with that view; there is no process-wide timer
/// for a stale view to leak through.
struct StreamHandle {
    gate: FetchGate,
    timer: RefreshTimer,
}

impl StreamHandle {
    fn new() -> Self {
        Self {
            gate: FetchGate::new(),
            timer: RefreshTimer::new(),
        }
    }

    fn cancel(&mut self) {
        self.gate.cancel();
        self.timer.cancel();
    }
}

struct JobView {
    job_id: String,
    tab: ViewTab,
    job: Option<JobSummary>,
    suites: Vec<protocol::SuiteRecord>,
    suites_bookmark: u64,
    status_filter: SuiteStatusFilter,
    log: LogBuffer,
    artifacts: Vec<protocol::ArtifactRecord>,
    results: Option<crate::results::AggregatedNode>,
    scroll_to_bottom: bool,
    summary: StreamHandle,
    suites_stream: StreamHandle,
    log_stream: StreamHandle,
    artifacts_stream: StreamHandle,
    results_stream: StreamHandle,
}

impl JobView {
    fn new(job_id: String, tab: ViewTab, status_filter: SuiteStatusFilter, log_lines: u32) -> Self {
        Self {
            job_id,
            tab,
            job: None,
            suites: Vec::new(),
            suites_bookmark: 0,
            status_filter,
            log: LogBuffer::new(log_lines),
            artifacts: Vec::new(),
            results: None,
            scroll_to_bottom: false,
            summary: StreamHandle::new(),
            suites_stream: StreamHandle::new(),
            log_stream: StreamHandle::new(),
            artifacts_stream: StreamHandle::new(),
            results_stream: StreamHandle::new(),
        }
    }

    fn handle_mut(&mut self, kind: StreamKind) -> &mut StreamHandle {
        match kind {
            StreamKind::Summary => &mut self.summary,
            StreamKind::Suites => &mut self.suites_stream,
            StreamKind::Log => &mut self.log_stream,
            StreamKind::Artifacts => &mut self.artifacts_stream,
            StreamKind::Results => &mut self.results_stream,
        }
    }

    fn cancel_all(&mut self) {
        self.summary.cancel();
        self.suites_stream.cancel();
        self.log_stream.cancel();
        self.artifacts_stream.cancel();
        self.results_stream.cancel();
    }

    fn job_is_active(&self) -> bool {
        // An unseen job may still be anything; keep polling until the first
        // summary says otherwise.
        self.job.as_ref().map(|job| job.status.is_active()).unwrap_or(true)
    }
}

struct InFlight {
    kind: StreamKind,
    token: FetchToken,
    deadline: Instant,
}

/// What applying a response to the view amounted to.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Applied {
    /// Stale, unknown, or out-of-scope; the model was not touched.
    Ignored,
    /// The model changed; a fresh snapshot should be published.
    ModelUpdated,
    /// Passive, user-visible notification.
    Notice(String),
    /// A job start was acknowledged; `Some` carries the new job to open.
    JobStarted(Option<String>),
}

/// Owns the active job view and everything needed to keep it in sync:
/// per-stream single-flight gates, refresh timers, and the table of
/// requests still in flight. The runtime worker is thin I/O around this;
/// everything here is synchronous and directly testable.
pub(crate) struct ViewController {
    view: Option<JobView>,
    poll_delay: Duration,
    request_timeout: Duration,
    default_log_lines: u32,
    default_status_filter: SuiteStatusFilter,
    in_flight: HashMap<String, InFlight>,
    tick_tx: mpsc::UnboundedSender<StreamKind>,
}

impl ViewController {
    pub(crate) fn new(
        poll_delay: Duration,
        request_timeout: Duration,
        default_log_lines: u32,
        default_status_filter: SuiteStatusFilter,
        tick_tx: mpsc::UnboundedSender<StreamKind>,
    ) -> Self {
        Self {
            view: None,
            poll_delay,
            request_timeout,
            default_log_lines,
            default_status_filter,
            in_flight: HashMap::new(),
            tick_tx,
        }
    }

    /// Tears down the current view and allocates a fresh one for `job`.
    /// Cancellation is synchronous and happens before the new view exists,
    /// so a late response for the old job can never land in the new model.
    pub(crate) fn open_job(&mut self, job: String, tab: ViewTab) -> Vec<ApiRequest> {
        self.teardown();
        self.view = Some(JobView::new(
            job,
            tab,
            self.default_status_filter,
            self.default_log_lines,
        ));
        let mut requests = Vec::new();
        requests.extend(self.start_stream(StreamKind::Summary));
        if tab != ViewTab::Summary {
            requests.extend(self.start_stream(StreamKind::for_tab(tab)));
        }
        requests
    }

    pub(crate) fn close_view(&mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(mut view) = self.view.take() {
            view.cancel_all();
        }
        self.in_flight.clear();
    }

    pub(crate) fn switch_tab(&mut self, tab: ViewTab) -> Vec<ApiRequest> {
        let Some(view) = self.view.as_mut() else {
            return Vec::new();
        };
        if view.tab == tab {
            return Vec::new();
        }
        // The outgoing tab stops polling; its in-flight fetch, if any, is
        // still for this job and may apply once, but will not re-arm.
        let outgoing = StreamKind::for_tab(view.tab);
        view.handle_mut(outgoing).timer.cancel();
        view.tab = tab;
        let kind = StreamKind::for_tab(tab);
        if view.handle_mut(kind).gate.busy() {
            return Vec::new();
        }
        self.start_stream(kind).into_iter().collect()
    }

    /// Changing the filter invalidates every suite row fetched so far;
    /// never merge pages fetched under different filters.
    pub(crate) fn set_status_filter(&mut self, filter: SuiteStatusFilter) -> Vec<ApiRequest> {
        if let Some(view) = self.view.as_mut() {
            view.status_filter = filter;
        }
        self.reload_suites()
    }

    /// Drops the accumulated suite sequence and bookmark and starts over
    /// from the beginning. The cancelled gate token makes sure a fetch
    /// issued before the reset can never merge into the cleared sequence.
    pub(crate) fn reload_suites(&mut self) -> Vec<ApiRequest> {
        let Some(view) = self.view.as_mut() else {
            return Vec::new();
        };
        view.suites.clear();
        view.suites_bookmark = 0;
        view.handle_mut(StreamKind::Suites).cancel();
        if view.tab == ViewTab::Suites {
            self.start_stream(StreamKind::Suites).into_iter().collect()
        } else {
            Vec::new()
        }
    }

    pub(crate) fn set_log_filter(&mut self, expr: &str) -> Result<bool, regex::Error> {
        match self.view.as_mut() {
            Some(view) => view.log.set_filter(expr).map(|_| true),
            None => Ok(false),
        }
    }

    pub(crate) fn set_log_options(&mut self, options: LogOptions) -> Vec<ApiRequest> {
        let Some(view) = self.view.as_mut() else {
            return Vec::new();
        };
        let mut refetch = false;
        if let Some(lines) = options.lines {
            if lines != view.log.lines {
                view.log.lines = lines;
                refetch = true;
            }
        }
        if let Some(pin) = options.pin_to_bottom {
            view.log.pin_to_bottom = pin;
        }
        if let Some(auto) = options.auto_refresh {
            view.log.auto_refresh = auto;
        }
        if let Some(direction) = options.direction {
            if direction != view.log.direction() {
                view.log.set_direction(direction);
                // A fetch issued under the old direction must not land in
                // the fresh buffer.
                view.handle_mut(StreamKind::Log).gate.cancel();
                refetch = true;
            }
        }
        let on_log_tab = view.tab == ViewTab::Log;
        let want_poll = on_log_tab && view.log.auto_refresh;
        if refetch && on_log_tab {
            self.start_stream(StreamKind::Log).into_iter().collect()
        } else if want_poll {
            self.rearm(StreamKind::Log);
            Vec::new()
        } else {
            Vec::new()
        }
    }

    pub(crate) fn refresh_log(&mut self) -> Option<ApiRequest> {
        let view = self.view.as_mut()?;
        if view.tab != ViewTab::Log {
            return None;
        }
        view.handle_mut(StreamKind::Log).timer.cancel();
        self.start_stream(StreamKind::Log)
    }

    /// Called after a reconnect: every fetch that was in flight on the old
    /// connection is gone for good, so forget it all and start the visible
    /// streams again from their current bookmarks.
    pub(crate) fn resync(&mut self) -> Vec<ApiRequest> {
        self.in_flight.clear();
        let Some(view) = self.view.as_mut() else {
            return Vec::new();
        };
        view.cancel_all();
        let tab = view.tab;
        let mut requests = Vec::new();
        requests.extend(self.start_stream(StreamKind::Summary));
        if tab != ViewTab::Summary {
            requests.extend(self.start_stream(StreamKind::for_tab(tab)));
        }
        requests
    }

    /// A tick means the stream's timer fired; fetch again. `None` when the
    /// gate still holds an outstanding fetch.
    pub(crate) fn handle_tick(&mut self, kind: StreamKind) -> Option<ApiRequest> {
        self.start_stream(kind)
    }

    fn start_stream(&mut self, kind: StreamKind) -> Option<ApiRequest> {
        let timeout = self.request_timeout;
        let view = self.view.as_mut()?;
        let token = match view.handle_mut(kind).gate.begin() {
            Ok(token) => token,
            Err(_) => {
                debug!(job = %view.job_id, stream = ?kind, "fetch already in flight");
                return None;
            }
        };
        let request_id = Uuid::new_v4().to_string();
        self.in_flight.insert(
            request_id.clone(),
            InFlight {
                kind,
                token,
                deadline: Instant::now() + timeout,
            },
        );
        let job = view.job_id.clone();
        Some(match kind {
            StreamKind::Summary => ApiRequest::Summary { request_id, job },
            StreamKind::Suites => ApiRequest::SuitesPage {
                request_id,
                job,
                bookmark: view.suites_bookmark,
                status_filter: view.status_filter,
            },
            StreamKind::Log => ApiRequest::Log {
                request_id,
                job,
                direction: view.log.direction(),
                lines: view.log.lines,
            },
            StreamKind::Artifacts => ApiRequest::Artifacts { request_id, job },
            StreamKind::Results => ApiRequest::ResultTree { request_id, job },
        })
    }

    /// Applies one response from the runner. Stale responses (unknown
    /// request id, or a token the gate has since invalidated) are dropped
    /// here and never reach the model or the user.
    pub(crate) fn handle_response(&mut self, response: ApiResponse) -> Applied {
        match response {
            ApiResponse::Summary { request_id, job } => {
                if !self.accept(&request_id, StreamKind::Summary) {
                    return Applied::Ignored;
                }
                self.apply_job(job);
                self.rearm(StreamKind::Summary);
                Applied::ModelUpdated
            }
            ApiResponse::SuitesPage {
                request_id,
                job,
                suites,
                bookmark,
            } => {
                if !self.accept(&request_id, StreamKind::Suites) {
                    return Applied::Ignored;
                }
                self.apply_job(job);
                if let Some(view) = self.view.as_mut() {
                    merge_suites(&mut view.suites, suites, &mut view.suites_bookmark, bookmark);
                }
                self.rearm(StreamKind::Suites);
                Applied::ModelUpdated
            }
            ApiResponse::Log {
                request_id,
                job,
                log,
            } => {
                if !self.accept(&request_id, StreamKind::Log) {
                    return Applied::Ignored;
                }
                self.apply_job(job);
                if let Some(view) = self.view.as_mut() {
                    let direction = view.log.direction();
                    view.scroll_to_bottom = view.log.apply(&log, direction);
                }
                self.rearm(StreamKind::Log);
                Applied::ModelUpdated
            }
            ApiResponse::Artifacts {
                request_id,
                job,
                artifacts,
            } => {
                if !self.accept(&request_id, StreamKind::Artifacts) {
                    return Applied::Ignored;
                }
                self.apply_job(job);
                if let Some(view) = self.view.as_mut() {
                    view.artifacts = artifacts;
                }
                self.rearm(StreamKind::Artifacts);
                Applied::ModelUpdated
            }
            ApiResponse::ResultTree { request_id, root } => {
                if !self.accept(&request_id, StreamKind::Results) {
                    return Applied::Ignored;
                }
                if let Some(view) = self.view.as_mut() {
                    view.results = Some(aggregate_tree(&root));
                }
                // One-shot stream: results are fetched on demand, never
                // polled.
                Applied::ModelUpdated
            }
            ApiResponse::Started { job_id, .. } => Applied::JobStarted(job_id),
            ApiResponse::Ack { message } => Applied::Notice(message),
            ApiResponse::Error {
                request_id,
                message,
            } => {
                // A failed fetch does not stop polling; the stream re-arms
                // at the normal cadence and self-heals on the next pass.
                if let Some(request_id) = request_id {
                    if let Some(entry) = self.in_flight.remove(&request_id) {
                        if let Some(view) = self.view.as_mut() {
                            view.handle_mut(entry.kind).gate.complete(entry.token);
                        }
                        self.rearm(entry.kind);
                    }
                }
                Applied::Notice(message)
            }
            ApiResponse::Event { .. } => Applied::Ignored,
        }
    }

    fn accept(&mut self, request_id: &str, kind: StreamKind) -> bool {
        let Some(entry) = self.in_flight.remove(request_id) else {
            debug!(request_id, "dropping response for unknown request");
            return false;
        };
        if entry.kind != kind {
            debug!(request_id, expected = ?entry.kind, got = ?kind, "response kind mismatch");
            return false;
        }
        let Some(view) = self.view.as_mut() else {
            return false;
        };
        if !view.handle_mut(kind).gate.complete(entry.token) {
            debug!(request_id, stream = ?kind, "dropping superseded response");
            return false;
        }
        true
    }

    fn apply_job(&mut self, job: JobSummary) {
        if let Some(view) = self.view.as_mut() {
            view.job = Some(job);
        }
    }

    /// Re-arms the stream's one-shot timer. The predicate is evaluated
    /// fresh on every re-arm: the stream must still be the visible one and
    /// the job must still be able to change.
    fn rearm(&mut self, kind: StreamKind) {
        let delay = self.poll_delay;
        let tick_tx = self.tick_tx.clone();
        let Some(view) = self.view.as_mut() else {
            return;
        };
        let visible = view.tab == kind.tab();
        let job_active = view.job_is_active();
        let auto_refresh = kind != StreamKind::Log || view.log.auto_refresh;
        view.handle_mut(kind).timer.schedule(
            || visible && job_active && auto_refresh,
            delay,
            &tick_tx,
            kind,
        );
    }

    /// Deadline of the oldest in-flight fetch, if any.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.in_flight.values().map(|entry| entry.deadline).min()
    }

    /// Gives up on fetches that outlived the request timeout: the gate is
    /// cancelled so the response, should it ever arrive, is dropped as
    /// stale, and the stream re-arms at the normal cadence.
    pub(crate) fn expire_overdue(&mut self, now: Instant) -> Vec<StreamKind> {
        let overdue: Vec<(String, StreamKind)> = self
            .in_flight
            .iter()
            .filter(|(_, entry)| entry.deadline <= now)
            .map(|(id, entry)| (id.clone(), entry.kind))
            .collect();
        for (request_id, kind) in &overdue {
            self.in_flight.remove(request_id);
            if let Some(view) = self.view.as_mut() {
                view.handle_mut(*kind).gate.cancel();
            }
            self.rearm(*kind);
        }
        overdue.into_iter().map(|(_, kind)| kind).collect()
    }

    /// Renderable snapshot of the current view. The scroll flag is
    /// consumed: only the first snapshot after a pinned tail fetch carries
    /// it.
    pub(crate) fn job_model(&mut self) -> Option<JobModel> {
        let view = self.view.as_mut()?;
        let scroll_to_bottom = std::mem::take(&mut view.scroll_to_bottom);
        Some(JobModel {
            job_id: view.job_id.clone(),
            tab: view.tab,
            job: view.job.clone(),
            suites: view.suites.clone(),
            status_filter: view.status_filter,
            log: LogModel {
                text: view.log.rendered().to_string(),
                filter: view.log.filter_expr().to_string(),
                direction: view.log.direction(),
                lines: view.log.lines,
                pin_to_bottom: view.log.pin_to_bottom,
                auto_refresh: view.log.auto_refresh,
            },
            artifacts: view.artifacts.clone(),
            results: view.results.clone(),
            scroll_to_bottom,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{JobStatus, SuiteRecord};
    use tokio::time::timeout;

    const POLL: Duration = Duration::from_millis(20);
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

    fn controller(
        tick_tx: mpsc::UnboundedSender<StreamKind>,
    ) -> ViewController {
        ViewController::new(POLL, REQUEST_TIMEOUT, 2000, SuiteStatusFilter::Failed, tick_tx)
    }

    fn job(id: &str, status: JobStatus) -> JobSummary {
        JobSummary {
            id: id.to_string(),
            project: "web".to_string(),
            sequence: 1,
            status,
            started_at_ms: 0,
            completed_at_ms: None,
            tasks: 10,
            complete: 5,
            success: 5,
            failed: 0,
        }
    }

    fn suite(name: &str, tasks: u64, complete: u64, success: u64, duration_ms: u64) -> SuiteRecord {
        SuiteRecord {
            suite: name.to_string(),
            tasks,
            complete,
            success,
            duration_ms,
        }
    }

    fn request_id(request: &ApiRequest) -> String {
        request.request_id().expect("request id").to_string()
    }

    #[test]
    fn opening_a_job_fetches_summary_and_tab_stream() {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        rt.block_on(async {
            let (tick_tx, _tick_rx) = mpsc::unbounded_channel();
            let mut controller = controller(tick_tx);
            let requests = controller.open_job("web.13".to_string(), ViewTab::Suites);
            assert_eq!(requests.len(), 2);
            assert!(matches!(&requests[0], ApiRequest::Summary { job, .. } if job == "web.13"));
            assert!(matches!(
                &requests[1],
                ApiRequest::SuitesPage { job, bookmark: 0, .. } if job == "web.13"
            ));
        });
    }

    #[test]
    fn second_fetch_for_a_busy_stream_is_refused() {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        rt.block_on(async {
            let (tick_tx, _tick_rx) = mpsc::unbounded_channel();
            let mut controller = controller(tick_tx);
            controller.open_job("web.13".to_string(), ViewTab::Summary);
            assert!(controller.handle_tick(StreamKind::Summary).is_none());
        });
    }

    #[test]
    fn suite_pages_merge_across_the_boundary() {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        rt.block_on(async {
            let (tick_tx, _tick_rx) = mpsc::unbounded_channel();
            let mut controller = controller(tick_tx);
            let requests = controller.open_job("web.13".to_string(), ViewTab::Suites);
            let page_one = request_id(&requests[1]);

            let applied = controller.handle_response(ApiResponse::SuitesPage {
                request_id: page_one,
                job: job("web.13", JobStatus::Running),
                suites: vec![suite("A", 5, 5, 5, 100)],
                bookmark: 10,
            });
            assert_eq!(applied, Applied::ModelUpdated);

            // The next poll resumes from the server-issued bookmark.
            let next = controller.handle_tick(StreamKind::Suites).expect("request");
            assert!(matches!(next, ApiRequest::SuitesPage { bookmark: 10, .. }));
            let page_two = request_id(&next);

            controller.handle_response(ApiResponse::SuitesPage {
                request_id: page_two,
                job: job("web.13", JobStatus::Running),
                suites: vec![suite("A", 2, 2, 1, 20), suite("B", 3, 3, 3, 50)],
                bookmark: 20,
            });
            let model = controller.job_model().expect("model");
            assert_eq!(
                model.suites,
                vec![suite("A", 7, 7, 6, 120), suite("B", 3, 3, 3, 50)]
            );
        });
    }

    #[test]
    fn response_for_a_previous_job_never_touches_the_new_view() {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        rt.block_on(async {
            let (tick_tx, _tick_rx) = mpsc::unbounded_channel();
            let mut controller = controller(tick_tx);
            let old = controller.open_job("web.13".to_string(), ViewTab::Suites);
            let stale_id = request_id(&old[1]);

            controller.open_job("web.14".to_string(), ViewTab::Suites);

            let applied = controller.handle_response(ApiResponse::SuitesPage {
                request_id: stale_id,
                job: job("web.13", JobStatus::Running),
                suites: vec![suite("A", 5, 5, 5, 100)],
                bookmark: 10,
            });
            assert_eq!(applied, Applied::Ignored);

            let model = controller.job_model().expect("model");
            assert_eq!(model.job_id, "web.14");
            assert!(model.suites.is_empty());
            assert!(model.job.is_none());
        });
    }

    #[test]
    fn running_summary_rearms_and_terminal_summary_does_not() {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        rt.block_on(async {
            let (tick_tx, mut tick_rx) = mpsc::unbounded_channel();
            let mut controller = controller(tick_tx);
            let requests = controller.open_job("web.13".to_string(), ViewTab::Summary);

            controller.handle_response(ApiResponse::Summary {
                request_id: request_id(&requests[0]),
                job: job("web.13", JobStatus::Running),
            });
            let tick = timeout(Duration::from_secs(1), tick_rx.recv())
                .await
                .expect("tick while running");
            assert_eq!(tick, Some(StreamKind::Summary));

            let next = controller.handle_tick(StreamKind::Summary).expect("request");
            controller.handle_response(ApiResponse::Summary {
                request_id: request_id(&next),
                job: job("web.13", JobStatus::Completed),
            });
            let silence = timeout(POLL * 4, tick_rx.recv()).await;
            assert!(silence.is_err(), "terminal job must not re-arm");
        });
    }

    #[test]
    fn status_filter_change_resets_accumulated_suites() {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        rt.block_on(async {
            let (tick_tx, _tick_rx) = mpsc::unbounded_channel();
            let mut controller = controller(tick_tx);
            let requests = controller.open_job("web.13".to_string(), ViewTab::Suites);
            controller.handle_response(ApiResponse::SuitesPage {
                request_id: request_id(&requests[1]),
                job: job("web.13", JobStatus::Running),
                suites: vec![suite("A", 5, 5, 5, 100)],
                bookmark: 10,
            });

            let requests = controller.set_status_filter(SuiteStatusFilter::All);
            assert_eq!(requests.len(), 1);
            assert!(matches!(
                &requests[0],
                ApiRequest::SuitesPage { bookmark: 0, status_filter: SuiteStatusFilter::All, .. }
            ));
            let model = controller.job_model().expect("model");
            assert!(model.suites.is_empty());
        });
    }

    #[test]
    fn in_flight_fetch_is_dropped_across_a_filter_change() {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        rt.block_on(async {
            let (tick_tx, _tick_rx) = mpsc::unbounded_channel();
            let mut controller = controller(tick_tx);
            let requests = controller.open_job("web.13".to_string(), ViewTab::Suites);
            let stale_id = request_id(&requests[1]);

            controller.set_status_filter(SuiteStatusFilter::All);

            let applied = controller.handle_response(ApiResponse::SuitesPage {
                request_id: stale_id,
                job: job("web.13", JobStatus::Running),
                suites: vec![suite("A", 5, 5, 5, 100)],
                bookmark: 10,
            });
            assert_eq!(applied, Applied::Ignored);
            assert!(controller.job_model().expect("model").suites.is_empty());
        });
    }

    #[test]
    fn overdue_fetch_is_expired_and_its_late_response_dropped() {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        rt.block_on(async {
            let (tick_tx, _tick_rx) = mpsc::unbounded_channel();
            let mut controller = controller(tick_tx);
            let requests = controller.open_job("web.13".to_string(), ViewTab::Summary);
            let stale_id = request_id(&requests[0]);

            let expired = controller.expire_overdue(Instant::now() + REQUEST_TIMEOUT * 2);
            assert_eq!(expired, vec![StreamKind::Summary]);

            let applied = controller.handle_response(ApiResponse::Summary {
                request_id: stale_id,
                job: job("web.13", JobStatus::Running),
            });
            assert_eq!(applied, Applied::Ignored);

            // The gate is free again for the next poll.
            assert!(controller.handle_tick(StreamKind::Summary).is_some());
        });
    }

    #[test]
    fn fetch_error_frees_the_gate_and_keeps_polling() {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        rt.block_on(async {
            let (tick_tx, mut tick_rx) = mpsc::unbounded_channel();
            let mut controller = controller(tick_tx);
            let requests = controller.open_job("web.13".to_string(), ViewTab::Summary);

            let applied = controller.handle_response(ApiResponse::Error {
                request_id: Some(request_id(&requests[0])),
                message: "runner busy".to_string(),
            });
            assert_eq!(applied, Applied::Notice("runner busy".to_string()));

            let tick = timeout(Duration::from_secs(1), tick_rx.recv())
                .await
                .expect("poll continues after a failed fetch");
            assert_eq!(tick, Some(StreamKind::Summary));
        });
    }

    #[test]
    fn log_tail_response_requests_scroll_once() {
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        rt.block_on(async {
            let (tick_tx, _tick_rx) = mpsc::unbounded_channel();
            let mut controller = controller(tick_tx);
            let requests = controller.open_job("web.13".to_string(), ViewTab::Log);

            controller.handle_response(ApiResponse::Log {
                request_id: request_id(&requests[1]),
                job: job("web.13", JobStatus::Running),
                log: "tail chunk\n".to_string(),
            });
            let model = controller.job_model().expect("model");
            assert!(model.scroll_to_bottom);
            assert_eq!(model.log.text, "tail chunk\n");

            // The flag is consumed with the snapshot.
            assert!(!controller.job_model().expect("model").scroll_to_bottom);
        });
    }
}
