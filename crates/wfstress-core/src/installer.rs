use std::path::Path;
use tracing::{info, warn};

use crate::error::StressResult;
use crate::manifest::Manifest;
use crate::remote::WorkflowApi;

/// What `TemplateInstaller::install` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Created,
    /// Replaced an existing template that was at `previous_version`.
    Updated { previous_version: Option<String> },
}

/// Upserts the workflow template a batch refers to.
pub struct TemplateInstaller<'a, A: WorkflowApi + ?Sized> {
    api: &'a A,
}

impl<'a, A: WorkflowApi + ?Sized> TemplateInstaller<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// Load a template manifest from disk and install it.
    pub async fn install_from_path(&self, path: impl AsRef<Path>) -> StressResult<InstallOutcome> {
        let template = Manifest::load(path).await?;
        self.install(template).await
    }

    /// Create the template, or update it in place if one with the same name
    /// exists.
    ///
    /// Any failure to fetch the existing template is treated as "absent".
    /// Updates reuse the fetched `resourceVersion`; the server rejects
    /// updates without it.
    pub async fn install(&self, mut template: Manifest) -> StressResult<InstallOutcome> {
        let name = template.require_name()?.to_string();

        match self.api.get_template(&name).await {
            Err(err) => {
                if !err.is_not_found() {
                    warn!(template = %name, error = %err, "template lookup failed, creating");
                }
                self.api.create_template(&template).await?;
                info!(template = %name, "workflow template created");
                Ok(InstallOutcome::Created)
            }
            Ok(existing) => {
                let previous_version = existing.metadata.resource_version;
                template.set_resource_version(previous_version.clone());
                self.api.update_template(&template).await?;
                info!(
                    template = %name,
                    previous_version = previous_version.as_deref().unwrap_or(""),
                    "workflow template updated"
                );
                Ok(InstallOutcome::Updated { previous_version })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StressError;
    use crate::remote::{MockWorkflowApi, Operation};

    fn template() -> Manifest {
        Manifest::from_yaml_str(
            r#"
apiVersion: argoproj.io/v1alpha1
kind: WorkflowTemplate
metadata:
  name: massive-workflow-template
spec:
  entrypoint: sleep
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_creates_when_absent() {
        let mock = MockWorkflowApi::new();
        let outcome = TemplateInstaller::new(&mock).install(template()).await.unwrap();

        assert_eq!(outcome, InstallOutcome::Created);
        assert_eq!(mock.calls(Operation::CreateTemplate), 1);
        assert_eq!(mock.calls(Operation::UpdateTemplate), 0);
        assert!(mock.template("massive-workflow-template").is_some());
    }

    #[tokio::test]
    async fn test_updates_with_fetched_token() {
        let mock = MockWorkflowApi::new();
        let version = mock.insert_template(template());

        let mut changed = template();
        changed.body.insert("spec".to_string(), serde_json::json!({"entrypoint": "main"}));
        let outcome = TemplateInstaller::new(&mock).install(changed).await.unwrap();

        assert_eq!(
            outcome,
            InstallOutcome::Updated {
                previous_version: Some(version.clone())
            }
        );
        assert_eq!(mock.calls(Operation::CreateTemplate), 0);
        let updates: Vec<_> = mock
            .history()
            .into_iter()
            .filter(|c| c.operation == Operation::UpdateTemplate)
            .collect();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].resource_version, Some(version));
        assert!(updates[0].success);

        let stored = mock.template("massive-workflow-template").unwrap();
        assert_eq!(stored.body["spec"]["entrypoint"], "main");
    }

    #[tokio::test]
    async fn test_lookup_error_falls_back_to_create() {
        let mock = MockWorkflowApi::new();
        mock.fail_next(Operation::GetTemplate, "massive-workflow-template", 1);

        let outcome = TemplateInstaller::new(&mock).install(template()).await.unwrap();
        assert_eq!(outcome, InstallOutcome::Created);
    }

    #[tokio::test]
    async fn test_write_failures_are_fatal() {
        let mock = MockWorkflowApi::new();
        mock.fail_always(Operation::CreateTemplate, "massive-workflow-template");
        let err = TemplateInstaller::new(&mock).install(template()).await.unwrap_err();
        assert!(matches!(err, StressError::Remote { .. }));

        let mock = MockWorkflowApi::new();
        mock.insert_template(template());
        mock.fail_always(Operation::UpdateTemplate, "massive-workflow-template");
        assert!(TemplateInstaller::new(&mock).install(template()).await.is_err());
    }

    #[tokio::test]
    async fn test_unnamed_template_is_rejected() {
        let mock = MockWorkflowApi::new();
        let err = TemplateInstaller::new(&mock)
            .install(Manifest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StressError::Manifest(_)));
        assert!(mock.history().is_empty());
    }

    #[tokio::test]
    async fn test_install_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.yaml");
        std::fs::write(&path, serde_yaml::to_string(&template()).unwrap()).unwrap();

        let mock = MockWorkflowApi::new();
        let outcome = TemplateInstaller::new(&mock)
            .install_from_path(&path)
            .await
            .unwrap();
        assert_eq!(outcome, InstallOutcome::Created);

        let missing = TemplateInstaller::new(&mock)
            .install_from_path(dir.path().join("missing.yaml"))
            .await
            .unwrap_err();
        assert!(matches!(missing, StressError::Io(_)));
    }
}
