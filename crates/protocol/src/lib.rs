use serde::{Deserialize, Serialize};

pub mod api;
pub mod framing;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Initializing,
    Running,
    Completed,
    Failed,
    Abandoned,
}

impl JobStatus {
    /// A job in one of these states can still change on the runner; everything
    /// else is terminal and will never produce new data.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            JobStatus::Pending | JobStatus::Initializing | JobStatus::Running
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobSummary {
    pub id: String,
    pub project: String,
    pub sequence: u64,
    pub status: JobStatus,
    pub started_at_ms: u64,
    #[serde(default)]
    pub completed_at_ms: Option<u64>,
    pub tasks: u64,
    pub complete: u64,
    pub success: u64,
    pub failed: u64,
}

/// One suite row of a job's paginated results. `suite` identifies the row
/// within a job only; a page boundary can split one suite across two pages,
/// in which case two consecutive rows carry the same name and must be
/// stitched by the console.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuiteRecord {
    pub suite: String,
    pub tasks: u64,
    pub complete: u64,
    pub success: u64,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SuiteStatusFilter {
    All,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogDirection {
    Head,
    Tail,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    pub name: String,
    pub size_bytes: u64,
}

/// One row of the push-feed project listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectSummary {
    pub project: String,
    #[serde(default)]
    pub group: String,
    pub failed: u64,
    pub started_at_ms: u64,
}

/// Result tree delivered by the runner. A node is a leaf or an internal
/// node for its whole lifetime; internal nodes carry no duration or success
/// of their own, those are aggregated from the leaves.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultNode {
    Leaf {
        name: String,
        #[serde(default)]
        duration_ms: Option<u64>,
        success: bool,
    },
    Internal {
        name: String,
        children: Vec<ResultNode>,
    },
}

impl ResultNode {
    pub fn name(&self) -> &str {
        match self {
            ResultNode::Leaf { name, .. } => name,
            ResultNode::Internal { name, .. } => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_status_wire_form_is_screaming_snake() {
        let json = serde_json::to_string(&JobStatus::Initializing).expect("serialize");
        assert_eq!(json, "\"INITIALIZING\"");
        let decoded: JobStatus = serde_json::from_str("\"RUNNING\"").expect("deserialize");
        assert_eq!(decoded, JobStatus::Running);
    }

    #[test]
    fn active_statuses_match_refresh_predicate() {
        assert!(JobStatus::Pending.is_active());
        assert!(JobStatus::Initializing.is_active());
        assert!(JobStatus::Running.is_active());
        assert!(!JobStatus::Completed.is_active());
        assert!(!JobStatus::Failed.is_active());
        assert!(!JobStatus::Abandoned.is_active());
    }

    #[test]
    fn suite_record_roundtrip() {
        let record = SuiteRecord {
            suite: "auth".to_string(),
            tasks: 5,
            complete: 5,
            success: 4,
            duration_ms: 1200,
        };
        let json = serde_json::to_string(&record).expect("serialize");
        let decoded: SuiteRecord = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(record, decoded);
    }

    #[test]
    fn result_node_is_tagged_by_kind() {
        let root = ResultNode::Internal {
            name: "job".to_string(),
            children: vec![ResultNode::Leaf {
                name: "case".to_string(),
                duration_ms: Some(10),
                success: true,
            }],
        };
        let json = serde_json::to_string(&root).expect("serialize");
        assert!(json.contains("\"kind\":\"internal\""));
        assert!(json.contains("\"kind\":\"leaf\""));
        let decoded: ResultNode = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(root, decoded);
    }

    #[test]
    fn leaf_duration_defaults_to_absent() {
        let json = "{\"kind\":\"leaf\",\"name\":\"case\",\"success\":false}";
        let decoded: ResultNode = serde_json::from_str(json).expect("deserialize");
        match decoded {
            ResultNode::Leaf { duration_ms, .. } => assert_eq!(duration_ms, None),
            _ => panic!("expected leaf"),
        }
    }
}
