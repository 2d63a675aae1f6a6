use serde::{Deserialize, Serialize};

use crate::{
    ArtifactRecord, JobSummary, LogDirection, ProjectSummary, ResultNode, SuiteRecord,
    SuiteStatusFilter,
};

/// Requests the console sends over the runner control channel. Fetches carry
/// a `request_id` that the runner echoes back, so a response can be matched
/// to the fetch that asked for it (and dropped when that fetch has since
/// been cancelled). Fire-and-forget actions have no id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiRequest {
    Subscribe,
    Summary {
        request_id: String,
        job: String,
    },
    SuitesPage {
        request_id: String,
        job: String,
        bookmark: u64,
        status_filter: SuiteStatusFilter,
    },
    Log {
        request_id: String,
        job: String,
        direction: LogDirection,
        lines: u32,
    },
    Artifacts {
        request_id: String,
        job: String,
    },
    ResultTree {
        request_id: String,
        job: String,
    },
    Halt {
        job: String,
    },
    Start {
        request_id: String,
        job: String,
    },
    Ack {
        job: String,
        user: String,
    },
    Resolve {
        job: String,
        user: String,
    },
}

impl ApiRequest {
    pub fn request_id(&self) -> Option<&str> {
        match self {
            ApiRequest::Summary { request_id, .. }
            | ApiRequest::SuitesPage { request_id, .. }
            | ApiRequest::Log { request_id, .. }
            | ApiRequest::Artifacts { request_id, .. }
            | ApiRequest::ResultTree { request_id, .. }
            | ApiRequest::Start { request_id, .. } => Some(request_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiResponse {
    Summary {
        request_id: String,
        job: JobSummary,
    },
    SuitesPage {
        request_id: String,
        job: JobSummary,
        suites: Vec<SuiteRecord>,
        bookmark: u64,
    },
    Log {
        request_id: String,
        job: JobSummary,
        log: String,
    },
    Artifacts {
        request_id: String,
        job: JobSummary,
        artifacts: Vec<ArtifactRecord>,
    },
    ResultTree {
        request_id: String,
        root: ResultNode,
    },
    Started {
        request_id: String,
        #[serde(default)]
        job_id: Option<String>,
    },
    Ack {
        message: String,
    },
    Error {
        #[serde(default)]
        request_id: Option<String>,
        message: String,
    },
    Event {
        event: FeedEvent,
    },
}

impl ApiResponse {
    pub fn request_id(&self) -> Option<&str> {
        match self {
            ApiResponse::Summary { request_id, .. }
            | ApiResponse::SuitesPage { request_id, .. }
            | ApiResponse::Log { request_id, .. }
            | ApiResponse::Artifacts { request_id, .. }
            | ApiResponse::ResultTree { request_id, .. }
            | ApiResponse::Started { request_id, .. } => Some(request_id),
            ApiResponse::Error { request_id, .. } => request_id.as_deref(),
            _ => None,
        }
    }
}

/// Out-of-band pushes delivered on a subscribed channel. Each push is a
/// full replacement of the listing it names, never a delta.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum FeedEvent {
    ProjectsUpdated(Vec<ProjectSummary>),
}
