use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::manifest::ObjectMeta;

/// Workflow phase as reported by the controller.
///
/// An empty or unrecognised phase maps to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WorkflowPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Error,
    #[default]
    #[serde(other)]
    Unknown,
}

impl WorkflowPhase {
    /// True once the workflow will not progress any further.
    pub fn is_completed(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Error)
    }
}

/// Point-in-time view of one workflow, as much as the poller needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    pub name: String,
    pub phase: WorkflowPhase,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowSnapshot {
    /// Time between creation and the controller starting the workflow, in ms.
    pub fn wait_ms(&self) -> i64 {
        self.started_at
            .map(|started| (started - self.created_at).num_milliseconds())
            .unwrap_or(0)
    }

    /// Time the workflow spent running, in ms.
    pub fn run_ms(&self) -> i64 {
        match (self.started_at, self.finished_at) {
            (Some(started), Some(finished)) => (finished - started).num_milliseconds(),
            _ => 0,
        }
    }
}

/// Wire shape of a workflow object returned by the API server.
#[derive(Debug, Deserialize)]
pub(crate) struct WorkflowObject {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: WorkflowStatusBody,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WorkflowStatusBody {
    #[serde(default, deserialize_with = "phase_or_unknown")]
    pub phase: WorkflowPhase,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

// The controller sends `""` and `null` before it has picked a workflow up.
fn phase_or_unknown<'de, D>(deserializer: D) -> Result<WorkflowPhase, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<WorkflowPhase>::deserialize(deserializer)?.unwrap_or_default())
}

impl WorkflowObject {
    pub fn into_snapshot(self, requested: &str) -> WorkflowSnapshot {
        WorkflowSnapshot {
            name: self.metadata.name.unwrap_or_else(|| requested.to_string()),
            phase: self.status.phase,
            created_at: self.metadata.creation_timestamp.unwrap_or_else(Utc::now),
            started_at: self.status.started_at,
            finished_at: self.status.finished_at,
        }
    }
}
