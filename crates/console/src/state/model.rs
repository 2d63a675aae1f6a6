use serde::{Deserialize, Serialize};

use protocol::{
    ArtifactRecord, JobSummary, LogDirection, SuiteRecord, SuiteStatusFilter,
};

use crate::results::AggregatedNode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum RunnerStatus {
    Ready,
    Down,
}

#[derive(Clone, Debug, Serialize)]
pub(crate) struct RunnerInfo {
    pub(crate) status: RunnerStatus,
    pub(crate) last_seen: Option<String>,
    pub(crate) last_error: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ViewTab {
    Summary,
    Suites,
    Log,
    Artifacts,
    Results,
}

/// Commands the presentation surface sends to the runner worker.
#[derive(Debug)]
pub(crate) enum ViewCommand {
    OpenJob { job: String, tab: ViewTab },
    SwitchTab(ViewTab),
    CloseView,
    SetStatusFilter(SuiteStatusFilter),
    ReloadSuites,
    SetLogFilter(String),
    SetLogOptions(LogOptions),
    RefreshLog,
    Halt { job: String },
    Start { job: String },
    Ack { job: String, user: String },
    Resolve { job: String, user: String },
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct LogOptions {
    pub(crate) direction: Option<LogDirection>,
    pub(crate) lines: Option<u32>,
    pub(crate) pin_to_bottom: Option<bool>,
    pub(crate) auto_refresh: Option<bool>,
}

/// Renderable snapshot of the log tab.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct LogModel {
    pub(crate) text: String,
    pub(crate) filter: String,
    pub(crate) direction: LogDirection,
    pub(crate) lines: u32,
    pub(crate) pin_to_bottom: bool,
    pub(crate) auto_refresh: bool,
}

/// Renderable snapshot of the active job view, rebuilt after every applied
/// response and handed to the presentation layer as-is.
#[derive(Clone, Debug, Serialize)]
pub(crate) struct JobModel {
    pub(crate) job_id: String,
    pub(crate) tab: ViewTab,
    pub(crate) job: Option<JobSummary>,
    pub(crate) suites: Vec<SuiteRecord>,
    pub(crate) status_filter: SuiteStatusFilter,
    pub(crate) log: LogModel,
    pub(crate) artifacts: Vec<ArtifactRecord>,
    pub(crate) results: Option<AggregatedNode>,
    /// Presentation obligation: scroll the log view to the bottom after
    /// rendering this snapshot.
    pub(crate) scroll_to_bottom: bool,
}
