//! In-memory workflow API for testing
//!
//! Simulates the control plane closely enough to exercise the installer,
//! submitter and poller without a cluster:
//!
//! - **Scripted phases**: each workflow walks through a list of phases, one
//!   step per `get_workflow`, and stays on the last one
//! - **Failure injection**: fail the next N calls of an operation on a name
//! - **Optimistic concurrency**: template updates must carry the current
//!   `resourceVersion`
//! - **Call history**: every operation is recorded for assertions
//!
//! # Examples
//!
//! ```rust
//! use wfstress_core::remote::{MockWorkflowApi, WorkflowApi};
//! use wfstress_core::{Operation, WorkflowPhase};
//!
//! # async fn example() -> wfstress_core::StressResult<()> {
//! let mock = MockWorkflowApi::new();
//! mock.insert_workflow("stress-0", vec![WorkflowPhase::Running, WorkflowPhase::Succeeded], 10, 100);
//!
//! assert!(!mock.get_workflow("stress-0").await?.phase.is_completed());
//! assert!(mock.get_workflow("stress-0").await?.phase.is_completed());
//! assert_eq!(mock.calls(Operation::Get), 2);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};

use super::WorkflowApi;
use crate::error::{StressError, StressResult};
use crate::manifest::Manifest;
use crate::workflow::{WorkflowPhase, WorkflowSnapshot};

/// Operations recorded by the mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    Create,
    Delete,
    GetTemplate,
    CreateTemplate,
    UpdateTemplate,
}

/// Mock call history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub operation: Operation,

    /// Object name the call targeted.
    pub name: String,

    /// Whether the call succeeded.
    pub success: bool,

    /// `resourceVersion` carried by template writes.
    pub resource_version: Option<String>,
}

#[derive(Debug, Clone)]
struct Script {
    phases: VecDeque<WorkflowPhase>,
    wait_ms: i64,
    run_ms: i64,
}

impl Script {
    fn new(phases: Vec<WorkflowPhase>, wait_ms: i64, run_ms: i64) -> Self {
        Self {
            phases: phases.into(),
            wait_ms,
            run_ms,
        }
    }
}

#[derive(Debug)]
struct MockWorkflow {
    created_at: DateTime<Utc>,
    script: Script,
}

impl MockWorkflow {
    /// Advance one step and render the snapshot for this observation.
    fn observe(&mut self, name: &str) -> WorkflowSnapshot {
        let phase = if self.script.phases.len() > 1 {
            self.script.phases.pop_front().unwrap_or_default()
        } else {
            self.script.phases.front().copied().unwrap_or_default()
        };

        let started_at = match phase {
            WorkflowPhase::Unknown | WorkflowPhase::Pending => None,
            _ => Some(self.created_at + Duration::milliseconds(self.script.wait_ms)),
        };
        let finished_at = if phase.is_completed() {
            started_at.map(|s| s + Duration::milliseconds(self.script.run_ms))
        } else {
            None
        };

        WorkflowSnapshot {
            name: name.to_string(),
            phase,
            created_at: self.created_at,
            started_at,
            finished_at,
        }
    }
}

/// Mock workflow API implementation for testing.
pub struct MockWorkflowApi {
    workflows: RwLock<HashMap<String, MockWorkflow>>,

    /// Scripts waiting for the matching `create_workflow`.
    scripts: RwLock<HashMap<String, Script>>,

    /// Script for created workflows that have none of their own.
    default_script: Script,

    templates: RwLock<HashMap<String, Manifest>>,

    /// Remaining injected failures per (operation, name).
    failures: RwLock<HashMap<(Operation, String), usize>>,

    history: RwLock<Vec<CallRecord>>,

    next_version: RwLock<u64>,
}

impl MockWorkflowApi {
    /// Mock where every created workflow completes on its first observation.
    pub fn new() -> Self {
        Self::with_default_script(vec![WorkflowPhase::Succeeded], 0, 0)
    }

    /// Mock whose created workflows follow `phases` with fixed timings.
    pub fn with_default_script(phases: Vec<WorkflowPhase>, wait_ms: i64, run_ms: i64) -> Self {
        Self {
            workflows: RwLock::new(HashMap::new()),
            scripts: RwLock::new(HashMap::new()),
            default_script: Script::new(phases, wait_ms, run_ms),
            templates: RwLock::new(HashMap::new()),
            failures: RwLock::new(HashMap::new()),
            history: RwLock::new(Vec::new()),
            next_version: RwLock::new(1),
        }
    }

    /// Place a workflow directly on the "server", as if submitted earlier.
    pub fn insert_workflow(
        &self,
        name: &str,
        phases: Vec<WorkflowPhase>,
        wait_ms: i64,
        run_ms: i64,
    ) {
        let workflow = MockWorkflow {
            created_at: Self::epoch(),
            script: Script::new(phases, wait_ms, run_ms),
        };
        self.workflows.write().insert(name.to_string(), workflow);
    }

    /// Script the workflow that will be created under `name`.
    pub fn script_workflow(&self, name: &str, phases: Vec<WorkflowPhase>, wait_ms: i64, run_ms: i64) {
        self.scripts
            .write()
            .insert(name.to_string(), Script::new(phases, wait_ms, run_ms));
    }

    /// Place a template directly on the "server". Returns its version.
    pub fn insert_template(&self, mut manifest: Manifest) -> String {
        let version = self.bump_version();
        manifest.set_resource_version(Some(version.clone()));
        let name = manifest.name().unwrap_or_default().to_string();
        self.templates.write().insert(name, manifest);
        version
    }

    /// Fail the next `times` calls of `operation` on `name`.
    pub fn fail_next(&self, operation: Operation, name: &str, times: usize) {
        self.failures
            .write()
            .insert((operation, name.to_string()), times);
    }

    /// Fail every call of `operation` on `name`.
    pub fn fail_always(&self, operation: Operation, name: &str) {
        self.fail_next(operation, name, usize::MAX);
    }

    pub fn history(&self) -> Vec<CallRecord> {
        self.history.read().clone()
    }

    /// Number of calls of one operation, successful or not.
    pub fn calls(&self, operation: Operation) -> usize {
        self.history
            .read()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Calls of one operation on one name.
    pub fn calls_for(&self, operation: Operation, name: &str) -> usize {
        self.history
            .read()
            .iter()
            .filter(|c| c.operation == operation && c.name == name)
            .count()
    }

    pub fn has_workflow(&self, name: &str) -> bool {
        self.workflows.read().contains_key(name)
    }

    pub fn workflow_count(&self) -> usize {
        self.workflows.read().len()
    }

    pub fn template(&self, name: &str) -> Option<Manifest> {
        self.templates.read().get(name).cloned()
    }

    fn epoch() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    fn bump_version(&self) -> String {
        let mut next = self.next_version.write();
        let version = next.to_string();
        *next += 1;
        version
    }

    /// Consume one injected failure, if any is pending.
    fn check_failure(&self, operation: Operation, name: &str) -> Option<StressError> {
        let mut failures = self.failures.write();
        let key = (operation, name.to_string());
        match failures.get_mut(&key) {
            Some(0) | None => None,
            Some(remaining) => {
                if *remaining != usize::MAX {
                    *remaining -= 1;
                }
                Some(StressError::remote(
                    503,
                    format!("injected {:?} failure for {}", operation, name),
                ))
            }
        }
    }

    fn record<T>(
        &self,
        operation: Operation,
        name: &str,
        resource_version: Option<&str>,
        result: StressResult<T>,
    ) -> StressResult<T> {
        self.history.write().push(CallRecord {
            operation,
            name: name.to_string(),
            success: result.is_ok(),
            resource_version: resource_version.map(str::to_string),
        });
        result
    }
}

impl Default for MockWorkflowApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowApi for MockWorkflowApi {
    async fn get_workflow(&self, name: &str) -> StressResult<WorkflowSnapshot> {
        let result = match self.check_failure(Operation::Get, name) {
            Some(err) => Err(err),
            None => match self.workflows.write().get_mut(name) {
                Some(workflow) => Ok(workflow.observe(name)),
                None => Err(StressError::not_found("workflow", name)),
            },
        };
        self.record(Operation::Get, name, None, result)
    }

    async fn create_workflow(&self, manifest: &Manifest) -> StressResult<String> {
        let name = manifest.name().unwrap_or_default().to_string();
        let result = match self.check_failure(Operation::Create, &name) {
            Some(err) => Err(err),
            None if name.is_empty() => Err(StressError::remote(422, "metadata.name is required")),
            None => {
                let mut workflows = self.workflows.write();
                if workflows.contains_key(&name) {
                    Err(StressError::remote(
                        409,
                        format!("workflows \"{}\" already exists", name),
                    ))
                } else {
                    let script = self
                        .scripts
                        .write()
                        .remove(&name)
                        .unwrap_or_else(|| self.default_script.clone());
                    workflows.insert(
                        name.clone(),
                        MockWorkflow {
                            created_at: Self::epoch(),
                            script,
                        },
                    );
                    Ok(name.clone())
                }
            }
        };
        self.record(Operation::Create, &name, None, result)
    }

    async fn delete_workflow(&self, name: &str) -> StressResult<()> {
        let result = match self.check_failure(Operation::Delete, name) {
            Some(err) => Err(err),
            None => match self.workflows.write().remove(name) {
                Some(_) => Ok(()),
                None => Err(StressError::not_found("workflow", name)),
            },
        };
        self.record(Operation::Delete, name, None, result)
    }

    async fn get_template(&self, name: &str) -> StressResult<Manifest> {
        let result = match self.check_failure(Operation::GetTemplate, name) {
            Some(err) => Err(err),
            None => self
                .templates
                .read()
                .get(name)
                .cloned()
                .ok_or_else(|| StressError::not_found("workflow template", name)),
        };
        self.record(Operation::GetTemplate, name, None, result)
    }

    async fn create_template(&self, manifest: &Manifest) -> StressResult<()> {
        let name = manifest.name().unwrap_or_default().to_string();
        let exists = self.templates.read().contains_key(&name);
        let result = match self.check_failure(Operation::CreateTemplate, &name) {
            Some(err) => Err(err),
            None if exists => Err(StressError::remote(
                409,
                format!("workflowtemplates \"{}\" already exists", name),
            )),
            None => {
                self.insert_template(manifest.clone());
                Ok(())
            }
        };
        self.record(
            Operation::CreateTemplate,
            &name,
            manifest.resource_version(),
            result,
        )
    }

    async fn update_template(&self, manifest: &Manifest) -> StressResult<()> {
        let name = manifest.name().unwrap_or_default().to_string();
        let current = self
            .templates
            .read()
            .get(&name)
            .and_then(|t| t.resource_version().map(str::to_string));
        let result = match self.check_failure(Operation::UpdateTemplate, &name) {
            Some(err) => Err(err),
            None => match current {
                None => Err(StressError::not_found("workflow template", &name)),
                Some(version) if manifest.resource_version() != Some(version.as_str()) => {
                    Err(StressError::remote(
                        409,
                        "the object has been modified; please apply your changes to the latest version",
                    ))
                }
                Some(_) => {
                    self.insert_template(manifest.clone());
                    Ok(())
                }
            },
        };
        self.record(
            Operation::UpdateTemplate,
            &name,
            manifest.resource_version(),
            result,
        )
    }
}
