use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::PlanConfig;
use crate::error::{StressError, StressResult};
use crate::manifest::{instance_name, Manifest};
use crate::remote::WorkflowApi;

/// Naming and retry policy for a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitSettings {
    pub name_prefix: String,
    pub create_attempts: u32,
    pub progress_every: usize,
}

impl Default for SubmitSettings {
    fn default() -> Self {
        Self {
            name_prefix: "stress-".to_string(),
            create_attempts: 5,
            progress_every: 10,
        }
    }
}

impl From<&PlanConfig> for SubmitSettings {
    fn from(plan: &PlanConfig) -> Self {
        Self {
            name_prefix: plan.name_prefix.clone(),
            create_attempts: plan.create_attempts,
            progress_every: plan.progress_every,
        }
    }
}

/// Result of a fully submitted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitReport {
    pub submitted: usize,
    /// Failed attempts that a later attempt recovered from.
    pub retries: usize,
}

/// Creates `count` sequentially named workflows from one manifest.
pub struct BatchSubmitter<'a, A: WorkflowApi + ?Sized> {
    api: &'a A,
    settings: SubmitSettings,
}

impl<'a, A: WorkflowApi + ?Sized> BatchSubmitter<'a, A> {
    pub fn new(api: &'a A, settings: SubmitSettings) -> Self {
        Self { api, settings }
    }

    pub async fn submit_from_path(
        &self,
        path: impl AsRef<Path>,
        count: usize,
    ) -> StressResult<SubmitReport> {
        let workflow = Manifest::load(path).await?;
        self.submit(&workflow, count).await
    }

    /// Submit `<prefix>0 .. <prefix>(count-1)`.
    ///
    /// Each instance gets up to `create_attempts` tries. When all of them
    /// fail the batch stops right there with `StressError::SubmitExhausted`;
    /// later indices are never attempted.
    pub async fn submit(&self, workflow: &Manifest, count: usize) -> StressResult<SubmitReport> {
        let attempts = self.settings.create_attempts.max(1);
        let progress_every = self.settings.progress_every.max(1);
        let mut retries = 0;

        for index in 0..count {
            let instance = workflow.instantiate(instance_name(&self.settings.name_prefix, index));
            let mut last_err = None;

            for attempt in 1..=attempts {
                match self.api.create_workflow(&instance).await {
                    Ok(name) => {
                        debug!(%name, attempt, "workflow created");
                        retries += (attempt - 1) as usize;
                        last_err = None;
                        break;
                    }
                    Err(err) => {
                        debug!(index, attempt, error = %err, "workflow create failed");
                        last_err = Some(err);
                    }
                }
            }

            if let Some(err) = last_err {
                warn!(index, attempts, error = %err, "giving up on batch");
                return Err(StressError::SubmitExhausted {
                    index,
                    attempts,
                    source: Box::new(err),
                });
            }

            if index % progress_every == 0 {
                info!(index, "submitted");
            }
        }

        Ok(SubmitReport {
            submitted: count,
            retries,
        })
    }
}
