use tracing::{error, info};

use crate::config::{PlanConfig, RoundConfig};
use crate::error::{StressError, StressResult};
use crate::installer::TemplateInstaller;
use crate::manifest::batch_names;
use crate::poller::{CompletionPoller, PollSettings, RoundStats};
use crate::remote::WorkflowApi;
use crate::submitter::{BatchSubmitter, SubmitSettings};

/// Runs the configured rounds back to back against one API handle.
pub struct Experiment<'a, A: WorkflowApi + ?Sized> {
    api: &'a A,
    plan: &'a PlanConfig,
}

impl<'a, A: WorkflowApi + ?Sized> Experiment<'a, A> {
    pub fn new(api: &'a A, plan: &'a PlanConfig) -> Self {
        Self { api, plan }
    }

    /// Warm-up (if configured) then every measured round, in order.
    ///
    /// `on_round` sees each round's stats as soon as it finishes. The first
    /// error ends the experiment and is returned as is, batch aborts included.
    pub async fn run<F>(&self, mut on_round: F) -> StressResult<Vec<RoundStats>>
    where
        F: FnMut(usize, &RoundConfig, &RoundStats),
    {
        self.plan.validate()?;

        let mut results = Vec::new();
        for (index, round) in self.plan.all_rounds().enumerate() {
            let stats = self.run_round(round).await.map_err(|err| {
                if err.is_batch_abort() {
                    error!(round = index, error = %err, "batch submission abandoned");
                }
                err
            })?;
            on_round(index, round, &stats);
            results.push(stats);
        }

        Ok(results)
    }

    /// One round: install the template, submit the batch, poll it to
    /// completion. Poll-only rounds skip the first two steps.
    pub async fn run_round(&self, round: &RoundConfig) -> StressResult<RoundStats> {
        if round.batch_size == 0 {
            return Err(StressError::EmptyBatch);
        }
        info!(
            batch_size = round.batch_size,
            sleep_budget_secs = round.sleep_budget_secs,
            submit = round.submit,
            "starting round"
        );

        if round.submit {
            TemplateInstaller::new(self.api)
                .install_from_path(&self.plan.template_path)
                .await?;
            BatchSubmitter::new(self.api, SubmitSettings::from(self.plan))
                .submit_from_path(&self.plan.workflow_path, round.batch_size)
                .await?;
        }

        let names = batch_names(&self.plan.name_prefix, round.batch_size);
        CompletionPoller::new(self.api, PollSettings::for_round(self.plan, round))
            .wait_and_reap(names)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MockWorkflowApi, Operation};
    use crate::workflow::WorkflowPhase;
    use std::path::Path;

    const TEMPLATE: &str = r#"
apiVersion: argoproj.io/v1alpha1
kind: WorkflowTemplate
metadata:
  name: massive-workflow-template
spec:
  entrypoint: sleep
"#;

    const WORKFLOW: &str = r#"
apiVersion: argoproj.io/v1alpha1
kind: Workflow
metadata:
  generateName: massive-sleep-
spec:
  workflowTemplateRef:
    name: massive-workflow-template
"#;

    fn plan_in(dir: &Path, rounds: Vec<RoundConfig>, warmup: Option<RoundConfig>) -> PlanConfig {
        let template_path = dir.join("template.yaml");
        let workflow_path = dir.join("workflow.yaml");
        std::fs::write(&template_path, TEMPLATE).unwrap();
        std::fs::write(&workflow_path, WORKFLOW).unwrap();
        PlanConfig {
            template_path,
            workflow_path,
            warmup,
            rounds,
            ..PlanConfig::default()
        }
    }

    #[tokio::test]
    async fn test_rounds_run_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan_in(
            dir.path(),
            vec![RoundConfig::new(4, 0), RoundConfig::new(7, 0)],
            Some(RoundConfig::new(2, 0)),
        );
        let mock = MockWorkflowApi::with_default_script(
            vec![WorkflowPhase::Pending, WorkflowPhase::Running, WorkflowPhase::Succeeded],
            30,
            90,
        );

        let mut seen = Vec::new();
        let results = Experiment::new(&mock, &plan)
            .run(|index, round, stats| seen.push((index, round.batch_size, stats.batch_size)))
            .await
            .unwrap();

        assert_eq!(seen, vec![(0, 2, 2), (1, 4, 4), (2, 7, 7)]);
        assert_eq!(results.len(), 3);
        for stats in &results {
            assert_eq!(stats.mean_wait_ms, 30);
            assert_eq!(stats.mean_run_ms, 90);
            assert_eq!(stats.passes, 3);
            assert_eq!(stats.delete_failures, 0);
        }

        // template created once, then updated each later round
        assert_eq!(mock.calls(Operation::CreateTemplate), 1);
        assert_eq!(mock.calls(Operation::UpdateTemplate), 2);
        assert_eq!(mock.calls(Operation::Create), 13);
        assert_eq!(mock.calls(Operation::Delete), 13);
        assert_eq!(mock.workflow_count(), 0);
    }

    #[tokio::test]
    async fn test_batch_abort_stops_the_experiment() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan_in(
            dir.path(),
            vec![RoundConfig::new(5, 0), RoundConfig::new(5, 0)],
            None,
        );
        let mock = MockWorkflowApi::new();
        mock.fail_always(Operation::Create, "stress-2");

        let mut rounds_reported = 0;
        let err = Experiment::new(&mock, &plan)
            .run(|_, _, _| rounds_reported += 1)
            .await
            .unwrap_err();

        assert!(err.is_batch_abort());
        assert_eq!(rounds_reported, 0);
        assert_eq!(mock.calls(Operation::Get), 0);
        assert_eq!(mock.calls_for(Operation::Create, "stress-3"), 0);
    }

    #[tokio::test]
    async fn test_poll_only_round_reaps_existing_batch() {
        let dir = tempfile::tempdir().unwrap();
        let round = RoundConfig {
            submit: false,
            ..RoundConfig::new(3, 0)
        };
        let plan = plan_in(dir.path(), vec![round.clone()], None);
        let mock = MockWorkflowApi::new();
        for i in 0..3 {
            mock.insert_workflow(&format!("stress-{i}"), vec![WorkflowPhase::Succeeded], 10, 10);
        }

        let stats = Experiment::new(&mock, &plan).run_round(&round).await.unwrap();
        assert_eq!(stats.deleted, 3);
        assert_eq!(mock.calls(Operation::Create), 0);
        assert_eq!(mock.calls(Operation::GetTemplate), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_warmup_only_reaps_existing_batch() {
        let plan = PlanConfig {
            template_path: "missing-template.yaml".into(),
            workflow_path: "missing-workflow.yaml".into(),
            rounds: Vec::new(),
            ..PlanConfig::default()
        };
        let mock = MockWorkflowApi::new();
        for name in batch_names(&plan.name_prefix, 500) {
            mock.insert_workflow(&name, vec![WorkflowPhase::Succeeded], 5, 50);
        }

        let results = Experiment::new(&mock, &plan).run(|_, _, _| {}).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].batch_size, 500);
        assert_eq!(results[0].deleted, 500);
        assert_eq!((results[0].mean_wait_ms, results[0].mean_run_ms), (5, 50));
        assert_eq!(mock.calls(Operation::GetTemplate), 0);
        assert_eq!(mock.calls(Operation::CreateTemplate), 0);
        assert_eq!(mock.calls(Operation::Create), 0);
        assert_eq!(mock.workflow_count(), 0);
    }

    #[tokio::test]
    async fn test_scripted_instances_feed_round_means() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan_in(dir.path(), vec![RoundConfig::new(3, 0)], None);
        let mock = MockWorkflowApi::with_default_script(vec![WorkflowPhase::Succeeded], 10, 100);
        mock.script_workflow(
            "stress-1",
            vec![WorkflowPhase::Pending, WorkflowPhase::Running, WorkflowPhase::Failed],
            40,
            400,
        );

        let results = Experiment::new(&mock, &plan).run(|_, _, _| {}).await.unwrap();

        assert_eq!(results[0].total_wait_ms, 60);
        assert_eq!(results[0].mean_wait_ms, 20);
        assert_eq!(results[0].mean_run_ms, 200);
        assert_eq!(results[0].passes, 3);
        assert_eq!(mock.calls_for(Operation::Get, "stress-0"), 1);
        assert_eq!(mock.calls_for(Operation::Get, "stress-1"), 3);
    }

    #[tokio::test]
    async fn test_missing_template_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut plan = plan_in(dir.path(), vec![RoundConfig::new(1, 0)], None);
        plan.template_path = dir.path().join("nope.yaml");
        let mock = MockWorkflowApi::new();

        let err = Experiment::new(&mock, &plan).run(|_, _, _| {}).await.unwrap_err();
        assert!(matches!(err, StressError::Io(_)));
        assert!(mock.history().is_empty());
    }
}
