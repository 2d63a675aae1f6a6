use serde::Serialize;

use crate::health::ProjectListing;
use crate::state::{JobModel, RunnerInfo};

/// Everything the presentation layer can observe, pushed over the event
/// channel after each applied update.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ConsoleEvent {
    RunnerStatus { runner: RunnerInfo },
    ProjectsUpdated { listing: ProjectListing },
    JobModelUpdated { model: JobModel },
    Notice { message: String },
}
