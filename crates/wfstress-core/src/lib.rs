//! Stress harness core: submit batches of Argo workflows, wait for them to
//! finish, and report how long they queued and ran.

pub mod config;
pub mod error;
pub mod installer;
pub mod manifest;
pub mod plan;
pub mod poller;
pub mod remote;
pub mod submitter;
pub mod workflow;

pub use crate::config::{ApiConfig, PlanConfig, RoundConfig, StressConfig};
pub use error::{StressError, StressResult};
pub use installer::{InstallOutcome, TemplateInstaller};
pub use manifest::{batch_names, instance_name, Manifest, ObjectMeta};
pub use plan::Experiment;
pub use poller::{CompletionPoller, LatencyAccumulator, PendingSet, PollSettings, RoundStats};
pub use remote::{CallRecord, HttpWorkflowApi, MockWorkflowApi, Operation, WorkflowApi};
pub use submitter::{BatchSubmitter, SubmitReport, SubmitSettings};
pub use workflow::{WorkflowPhase, WorkflowSnapshot};
