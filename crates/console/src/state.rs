mod model;

use std::time::SystemTime;

use tokio::sync::mpsc;

use crate::health::ProjectListing;

pub(crate) use model::{
    JobModel, LogModel, LogOptions, RunnerInfo, RunnerStatus, ViewCommand, ViewTab,
};

struct RunnerLink {
    status: RunnerStatus,
    last_seen: Option<SystemTime>,
    last_error: Option<String>,
}

/// State shared between the runner worker (writer) and the HTTP/WS surface
/// (readers), behind an `Arc<RwLock<_>>`. Holds renderable snapshots only;
/// the live view with its gates and timers stays inside the worker.
pub(crate) struct ConsoleState {
    runner: RunnerLink,
    listing: Option<ProjectListing>,
    job_model: Option<JobModel>,
    command_tx: Option<mpsc::UnboundedSender<ViewCommand>>,
}

impl ConsoleState {
    pub(crate) fn new() -> Self {
        Self {
            runner: RunnerLink {
                status: RunnerStatus::Down,
                last_seen: None,
                last_error: None,
            },
            listing: None,
            job_model: None,
            command_tx: None,
        }
    }

    pub(crate) fn register_command_sender(&mut self, sender: mpsc::UnboundedSender<ViewCommand>) {
        self.command_tx = Some(sender);
    }

    pub(crate) fn command_sender(&self) -> Option<mpsc::UnboundedSender<ViewCommand>> {
        self.command_tx.clone()
    }

    pub(crate) fn set_runner_status(&mut self, status: RunnerStatus, error: Option<String>) {
        self.runner.status = status;
        self.runner.last_error = error;
    }

    pub(crate) fn note_seen(&mut self) {
        self.runner.last_seen = Some(SystemTime::now());
    }

    pub(crate) fn runner_info(&self) -> RunnerInfo {
        RunnerInfo {
            status: self.runner.status,
            last_seen: self.runner.last_seen.map(format_time),
            last_error: self.runner.last_error.clone(),
        }
    }

    pub(crate) fn apply_listing(&mut self, listing: ProjectListing) {
        self.listing = Some(listing);
        self.note_seen();
    }

    pub(crate) fn listing(&self) -> Option<ProjectListing> {
        self.listing.clone()
    }

    pub(crate) fn set_job_model(&mut self, model: JobModel) {
        self.job_model = Some(model);
        self.note_seen();
    }

    pub(crate) fn clear_job_model(&mut self) {
        self.job_model = None;
    }

    pub(crate) fn job_model(&self) -> Option<JobModel> {
        self.job_model.clone()
    }
}

fn format_time(time: SystemTime) -> String {
    humantime::format_rfc3339(time).to_string()
}
