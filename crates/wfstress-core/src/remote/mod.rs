//! Remote workflow API abstraction
//!
//! Two implementations:
//! - `HttpWorkflowApi` talks to a Kubernetes API server running Argo Workflows
//! - `MockWorkflowApi` keeps everything in memory with scripted phases and
//!   injectable failures (tests)

mod http;
mod mock;

pub use http::HttpWorkflowApi;
pub use mock::{CallRecord, MockWorkflowApi, Operation};

use async_trait::async_trait;

use crate::error::StressResult;
use crate::manifest::Manifest;
use crate::workflow::WorkflowSnapshot;

/// Capability handle onto the workflow control plane.
///
/// Every call is a single remote round trip. Callers must not assume a
/// failed call left no trace on the remote side.
///
/// # Errors
///
/// - `StressError::NotFound` - the named object does not exist
/// - `StressError::Remote` - the API rejected the request
/// - `StressError::Transport` - no usable response
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    /// Fetch the current status of a workflow.
    async fn get_workflow(&self, name: &str) -> StressResult<WorkflowSnapshot>;

    /// Submit a workflow. Returns the name the server assigned.
    async fn create_workflow(&self, manifest: &Manifest) -> StressResult<String>;

    /// Delete a workflow.
    async fn delete_workflow(&self, name: &str) -> StressResult<()>;

    /// Fetch a workflow template, including its `resourceVersion`.
    async fn get_template(&self, name: &str) -> StressResult<Manifest>;

    /// Create a workflow template.
    async fn create_template(&self, manifest: &Manifest) -> StressResult<()>;

    /// Replace a workflow template. The manifest must carry the current
    /// `resourceVersion` or the server refuses the update.
    async fn update_template(&self, manifest: &Manifest) -> StressResult<()>;
}
