//! Kubernetes-style object manifests.
//!
//! Only the metadata fields the harness touches are typed. Everything else
//! (`spec`, `status`, labels, annotations, ...) is carried through verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

use crate::error::{StressError, StressResult};

/// Object metadata subset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Optimistic-concurrency token required for updates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_timestamp: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A declarative object: a workflow, a workflow template, or anything else
/// the API server accepts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Manifest {
    /// Parse a manifest from YAML (JSON is accepted too).
    pub fn from_yaml_str(input: &str) -> StressResult<Self> {
        let manifest: Manifest = serde_yaml::from_str(input)?;
        Ok(manifest)
    }

    /// Read and parse a manifest file.
    pub async fn load(path: impl AsRef<Path>) -> StressResult<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        Self::from_yaml_str(&raw)
            .map_err(|e| StressError::Manifest(format!("{}: {}", path.display(), e)))
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata.name.as_deref().filter(|n| !n.is_empty())
    }

    /// Name, or a `Manifest` error naming what was expected.
    pub fn require_name(&self) -> StressResult<&str> {
        self.name().ok_or_else(|| {
            let kind = if self.kind.is_empty() { "object" } else { self.kind.as_str() };
            StressError::Manifest(format!("{} has no metadata.name", kind))
        })
    }

    pub fn resource_version(&self) -> Option<&str> {
        self.metadata.resource_version.as_deref()
    }

    pub fn set_resource_version(&mut self, version: Option<String>) {
        self.metadata.resource_version = version;
    }

    /// Derive a concretely named copy: `generateName` is cleared so the API
    /// server uses `name` verbatim, and server-assigned fields are dropped.
    pub fn instantiate(&self, name: impl Into<String>) -> Manifest {
        let mut instance = self.clone();
        instance.metadata.generate_name = None;
        instance.metadata.resource_version = None;
        instance.metadata.creation_timestamp = None;
        instance.metadata.name = Some(name.into());
        instance.body.remove("status");
        instance
    }
}

/// Name of the `index`-th instance of a batch.
pub fn instance_name(prefix: &str, index: usize) -> String {
    format!("{}{}", prefix, index)
}

/// Names of a whole batch of `count` instances.
pub fn batch_names(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| instance_name(prefix, i)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKFLOW: &str = r#"
apiVersion: argoproj.io/v1alpha1
kind: Workflow
metadata:
  generateName: massive-sleep-
  labels:
    suite: stress
spec:
  workflowTemplateRef:
    name: massive-workflow-template
"#;

    #[test]
    fn test_parse_keeps_unknown_sections() {
        let manifest = Manifest::from_yaml_str(WORKFLOW).unwrap();

        assert_eq!(manifest.api_version, "argoproj.io/v1alpha1");
        assert_eq!(manifest.kind, "Workflow");
        assert_eq!(
            manifest.metadata.generate_name.as_deref(),
            Some("massive-sleep-")
        );
        assert_eq!(manifest.name(), None);
        assert_eq!(manifest.metadata.extra["labels"]["suite"], "stress");
        assert_eq!(
            manifest.body["spec"]["workflowTemplateRef"]["name"],
            "massive-workflow-template"
        );
    }

    #[test]
    fn test_instantiate_sets_explicit_name() {
        let manifest = Manifest::from_yaml_str(WORKFLOW).unwrap();
        let instance = manifest.instantiate(instance_name("stress-", 42));

        assert_eq!(instance.name(), Some("stress-42"));
        assert_eq!(instance.metadata.generate_name, None);
        assert_eq!(instance.body["spec"], manifest.body["spec"]);

        let json = serde_json::to_value(&instance).unwrap();
        assert_eq!(json["metadata"]["name"], "stress-42");
        assert!(json["metadata"].get("generateName").is_none());
        assert_eq!(json["metadata"]["labels"]["suite"], "stress");
        assert_eq!(json["apiVersion"], "argoproj.io/v1alpha1");
    }

    #[test]
    fn test_require_name() {
        let manifest = Manifest::from_yaml_str(WORKFLOW).unwrap();
        let err = manifest.require_name().unwrap_err();
        assert!(err.to_string().contains("Workflow has no metadata.name"));
    }

    #[tokio::test]
    async fn test_load_reports_path_on_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "metadata: [unterminated").unwrap();

        let err = Manifest::load(&path).await.unwrap_err();
        assert!(matches!(err, StressError::Manifest(_)));
        assert!(err.to_string().contains("broken.yaml"));
    }
}
