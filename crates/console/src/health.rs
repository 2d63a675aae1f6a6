use protocol::ProjectSummary;
use serde::Serialize;

/// Failures older than this turn the board from gloom to doom.
const STALE_FAILURE_AGE_MS: u64 = 24 * 60 * 60 * 1000;

/// Projects in this group never affect overall health.
const EXPERIMENTS_GROUP: &str = "Experiments";

const DEFAULT_GROUP: &str = "General";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum OverallHealth {
    Ok,
    Gloom,
    Doom,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(crate) struct ProjectGroup {
    pub(crate) name: String,
    pub(crate) projects: Vec<ProjectSummary>,
}

/// Renderable form of one push-feed update: the raw listing, the projects
/// bucketed by group in first-seen order, and the derived health.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(crate) struct ProjectListing {
    pub(crate) projects: Vec<ProjectSummary>,
    pub(crate) groups: Vec<ProjectGroup>,
    pub(crate) health: OverallHealth,
}

pub(crate) fn build_listing(projects: Vec<ProjectSummary>, now_ms: u64) -> ProjectListing {
    let health = overall_health(&projects, now_ms);
    let groups = group_projects(&projects);
    ProjectListing {
        projects,
        groups,
        health,
    }
}

/// Any failing project outside the experiments group degrades health to
/// gloom; a failure that has been standing for over a day is doom.
pub(crate) fn overall_health(projects: &[ProjectSummary], now_ms: u64) -> OverallHealth {
    let mut health = OverallHealth::Ok;
    for project in projects {
        if project.failed == 0 || project.group == EXPERIMENTS_GROUP {
            continue;
        }
        if project.started_at_ms.saturating_add(STALE_FAILURE_AGE_MS) < now_ms {
            return OverallHealth::Doom;
        }
        health = OverallHealth::Gloom;
    }
    health
}

fn group_projects(projects: &[ProjectSummary]) -> Vec<ProjectGroup> {
    let mut groups: Vec<ProjectGroup> = Vec::new();
    for project in projects {
        let name = if project.group.is_empty() {
            DEFAULT_GROUP
        } else {
            project.group.as_str()
        };
        match groups.iter_mut().find(|group| group.name == name) {
            Some(group) => group.projects.push(project.clone()),
            None => groups.push(ProjectGroup {
                name: name.to_string(),
                projects: vec![project.clone()],
            }),
        }
    }
    groups
}
