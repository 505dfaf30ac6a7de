use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Certificate, Client, Response, StatusCode};
use tracing::debug;

use super::WorkflowApi;
use crate::config::ApiConfig;
use crate::error::{StressError, StressResult};
use crate::manifest::Manifest;
use crate::workflow::{WorkflowObject, WorkflowSnapshot};

const API_GROUP_PATH: &str = "apis/argoproj.io/v1alpha1";

/// Argo Workflows CRDs served by a Kubernetes API server.
///
/// All requests target one namespace. The base URL is kept without a
/// trailing slash.
pub struct HttpWorkflowApi {
    base_url: String,
    namespace: String,
    client: Client,
}

impl HttpWorkflowApi {
    /// Build a client from connection settings.
    ///
    /// Reads `token_file` and `ca_cert_path` eagerly so a bad path fails here
    /// rather than on the first request.
    pub fn new(config: &ApiConfig) -> StressResult<Self> {
        let token = match (&config.token, &config.token_file) {
            (Some(token), _) => Some(token.trim().to_string()),
            (None, Some(path)) => Some(std::fs::read_to_string(path)?.trim().to_string()),
            (None, None) => None,
        };

        let mut headers = HeaderMap::new();
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| StressError::invalid_config("api token is not a valid header value"))?;
            headers.insert(AUTHORIZATION, value);
        }

        let mut builder = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .danger_accept_invalid_certs(config.insecure_skip_tls_verify);
        if let Some(path) = &config.ca_cert_path {
            let pem = std::fs::read(path)?;
            builder = builder.add_root_certificate(Certificate::from_pem(&pem)?);
        }

        let mut base_url = config.server.clone();
        let trimmed_len = base_url.trim_end_matches('/').len();
        base_url.truncate(trimmed_len);

        Ok(Self {
            base_url,
            namespace: config.namespace.clone(),
            client: builder.build()?,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn collection_url(&self, resource: &str) -> String {
        format!(
            "{}/{}/namespaces/{}/{}",
            self.base_url, API_GROUP_PATH, self.namespace, resource
        )
    }

    fn object_url(&self, resource: &str, name: &str) -> String {
        format!("{}/{}", self.collection_url(resource), name)
    }

    /// Map non-success statuses onto the error taxonomy.
    async fn check(response: Response, kind: &'static str, name: &str) -> StressResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(StressError::not_found(kind, name));
        }
        let body = response.text().await.unwrap_or_default();
        let message = if body.is_empty() {
            status.canonical_reason().unwrap_or("unknown").to_string()
        } else {
            body
        };
        Err(StressError::remote(status.as_u16(), message))
    }
}

#[async_trait]
impl WorkflowApi for HttpWorkflowApi {
    async fn get_workflow(&self, name: &str) -> StressResult<WorkflowSnapshot> {
        let response = self
            .client
            .get(self.object_url("workflows", name))
            .send()
            .await?;
        let response = Self::check(response, "workflow", name).await?;
        let object: WorkflowObject = response.json().await?;
        let snapshot = object.into_snapshot(name);
        debug!(name, phase = ?snapshot.phase, "fetched workflow");
        Ok(snapshot)
    }

    async fn create_workflow(&self, manifest: &Manifest) -> StressResult<String> {
        let requested = manifest.name().unwrap_or_default().to_string();
        let response = self
            .client
            .post(self.collection_url("workflows"))
            .json(manifest)
            .send()
            .await?;
        let response = Self::check(response, "workflow", &requested).await?;
        let created: Manifest = response.json().await?;
        Ok(created.name().map(str::to_string).unwrap_or(requested))
    }

    async fn delete_workflow(&self, name: &str) -> StressResult<()> {
        let response = self
            .client
            .delete(self.object_url("workflows", name))
            .send()
            .await?;
        Self::check(response, "workflow", name).await?;
        Ok(())
    }

    async fn get_template(&self, name: &str) -> StressResult<Manifest> {
        let response = self
            .client
            .get(self.object_url("workflowtemplates", name))
            .send()
            .await?;
        let response = Self::check(response, "workflow template", name).await?;
        Ok(response.json().await?)
    }

    async fn create_template(&self, manifest: &Manifest) -> StressResult<()> {
        let name = manifest.require_name()?;
        let response = self
            .client
            .post(self.collection_url("workflowtemplates"))
            .json(manifest)
            .send()
            .await?;
        Self::check(response, "workflow template", name).await?;
        Ok(())
    }

    async fn update_template(&self, manifest: &Manifest) -> StressResult<()> {
        let name = manifest.require_name()?;
        let response = self
            .client
            .put(self.object_url("workflowtemplates", name))
            .json(manifest)
            .send()
            .await?;
        Self::check(response, "workflow template", name).await?;
        Ok(())
    }
}
