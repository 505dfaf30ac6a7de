//! Configuration management for wfstress
//!
//! Sources, lowest to highest priority:
//! - hard-coded defaults (the benchmark plan the harness was written for)
//! - the file given on the command line or in `WFSTRESS_CONFIG`
//! - `./config/wfstress.{yaml,toml,json}`
//! - `WFSTRESS_*` environment variables (`__` separates nested keys)

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{StressError, StressResult};

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct StressConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub plan: PlanConfig,
}

impl StressConfig {
    /// Load configuration from all sources.
    ///
    /// `explicit` takes the place of `WFSTRESS_CONFIG` when given.
    pub fn load(explicit: Option<&Path>) -> StressResult<Self> {
        let mut builder = Self::set_defaults(Config::builder())?;

        let explicit = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("WFSTRESS_CONFIG").map(PathBuf::from));
        if let Some(path) = explicit {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder
            .add_source(File::with_name("./config/wfstress").required(false))
            // Example: WFSTRESS_API__NAMESPACE=argo
            .add_source(
                Environment::with_prefix("WFSTRESS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: StressConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a single file, without env overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> StressResult<Self> {
        let config: StressConfig = Self::set_defaults(Config::builder())?
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    fn set_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let api = ApiConfig::default();
        let plan = PlanConfig::default();
        builder
            .set_default("api.server", api.server)?
            .set_default("api.namespace", api.namespace)?
            .set_default("api.insecure_skip_tls_verify", api.insecure_skip_tls_verify)?
            .set_default("api.request_timeout_secs", api.request_timeout_secs as i64)?
            .set_default("plan.template_path", plan.template_path.display().to_string())?
            .set_default("plan.workflow_path", plan.workflow_path.display().to_string())?
            .set_default("plan.name_prefix", plan.name_prefix)?
            .set_default("plan.create_attempts", i64::from(plan.create_attempts))?
            .set_default("plan.progress_every", plan.progress_every as i64)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> StressResult<()> {
        if self.api.server.trim().is_empty() {
            return Err(StressError::invalid_config("api.server cannot be empty"));
        }
        if self.api.namespace.trim().is_empty() {
            return Err(StressError::invalid_config("api.namespace cannot be empty"));
        }
        if self.api.token.is_some() && self.api.token_file.is_some() {
            return Err(StressError::invalid_config(
                "api.token and api.token_file are mutually exclusive",
            ));
        }
        self.plan.validate()
    }
}

/// Connection settings for the Kubernetes API server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// API server base URL
    pub server: String,

    /// Namespace holding the workflows and templates
    pub namespace: String,

    /// Static bearer token
    #[serde(default)]
    pub token: Option<String>,

    /// File holding the bearer token (e.g. a service-account token)
    #[serde(default)]
    pub token_file: Option<PathBuf>,

    /// PEM bundle used to verify the API server
    #[serde(default)]
    pub ca_cert_path: Option<PathBuf>,

    #[serde(default)]
    pub insecure_skip_tls_verify: bool,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            server: "https://kubernetes.default.svc".to_string(),
            namespace: "argo-workflow".to_string(),
            token: None,
            token_file: None,
            ca_cert_path: None,
            insecure_skip_tls_verify: false,
            request_timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// The experiment: which manifests to use and which batch sizes to run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlanConfig {
    pub template_path: PathBuf,

    pub workflow_path: PathBuf,

    /// Instance names are `<name_prefix><index>`
    pub name_prefix: String,

    /// Creation attempts per instance before the batch is abandoned
    pub create_attempts: u32,

    /// Emit a progress marker every this many items
    pub progress_every: usize,

    /// Round run before the measured rounds; `None` skips it
    #[serde(default = "default_warmup")]
    pub warmup: Option<RoundConfig>,

    #[serde(default = "default_rounds")]
    pub rounds: Vec<RoundConfig>,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            template_path: PathBuf::from("test/stress/massive-workflow-template.yaml"),
            workflow_path: PathBuf::from("test/stress/massive-workflow-sleep-2hour.yaml"),
            name_prefix: "stress-".to_string(),
            create_attempts: 5,
            progress_every: 10,
            warmup: default_warmup(),
            rounds: default_rounds(),
        }
    }
}

impl PlanConfig {
    pub fn validate(&self) -> StressResult<()> {
        if self.name_prefix.is_empty() {
            return Err(StressError::invalid_config("plan.name_prefix cannot be empty"));
        }
        if self.create_attempts == 0 {
            return Err(StressError::invalid_config(
                "plan.create_attempts must be > 0",
            ));
        }
        if self.progress_every == 0 {
            return Err(StressError::invalid_config("plan.progress_every must be > 0"));
        }
        for (i, round) in self.warmup.iter().chain(self.rounds.iter()).enumerate() {
            if round.batch_size == 0 {
                return Err(StressError::invalid_config(format!(
                    "round {} has batch_size 0",
                    i
                )));
            }
        }
        Ok(())
    }

    /// Warm-up round (if any) followed by the measured rounds.
    pub fn all_rounds(&self) -> impl Iterator<Item = &RoundConfig> {
        self.warmup.iter().chain(self.rounds.iter())
    }
}

/// One batch of the experiment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RoundConfig {
    /// Number of workflows in the batch
    pub batch_size: usize,

    /// Upper bound of the pre-poll jitter, in seconds. One hundredth of it
    /// bounds the pause after each not-yet-completed fetch.
    pub sleep_budget_secs: u64,

    /// Install the template and submit the batch before polling. When false
    /// the round only waits for and reaps an existing batch.
    #[serde(default = "default_true")]
    pub submit: bool,
}

impl RoundConfig {
    pub fn new(batch_size: usize, sleep_budget_secs: u64) -> Self {
        Self {
            batch_size,
            sleep_budget_secs,
            submit: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_warmup() -> Option<RoundConfig> {
    Some(RoundConfig {
        submit: false,
        ..RoundConfig::new(500, 5)
    })
}

fn default_rounds() -> Vec<RoundConfig> {
    [800, 1000, 1500, 2000, 3000, 4000, 5000, 6000, 7000, 8000]
        .into_iter()
        .map(|n| RoundConfig::new(n, 7200))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_configuration() {
        let config = StressConfig::default();

        assert_eq!(config.api.namespace, "argo-workflow");
        assert_eq!(config.api.request_timeout_secs, 30);
        assert_eq!(config.plan.name_prefix, "stress-");
        assert_eq!(config.plan.create_attempts, 5);
        assert_eq!(config.plan.progress_every, 10);

        let warmup = config.plan.warmup.clone().unwrap();
        assert_eq!((warmup.batch_size, warmup.sleep_budget_secs), (500, 5));
        assert!(!warmup.submit);
        let sizes: Vec<usize> = config.plan.rounds.iter().map(|r| r.batch_size).collect();
        assert_eq!(
            sizes,
            vec![800, 1000, 1500, 2000, 3000, 4000, 5000, 6000, 7000, 8000]
        );
        assert!(config.plan.rounds.iter().all(|r| r.sleep_budget_secs == 7200));
        assert_eq!(config.plan.all_rounds().count(), 11);

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_overrides() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(
            file,
            r#"
api:
  server: http://127.0.0.1:6443
  namespace: bench
plan:
  create_attempts: 3
  warmup:
    batch_size: 10
    sleep_budget_secs: 1
  rounds:
    - batch_size: 20
      sleep_budget_secs: 0
    - batch_size: 40
      sleep_budget_secs: 200
      submit: false
"#
        )
        .unwrap();

        let config = StressConfig::from_file(file.path()).unwrap();
        assert_eq!(config.api.server, "http://127.0.0.1:6443");
        assert_eq!(config.api.namespace, "bench");
        assert_eq!(config.api.request_timeout_secs, 30);
        assert_eq!(config.plan.create_attempts, 3);
        assert_eq!(config.plan.progress_every, 10);
        assert_eq!(config.plan.warmup, Some(RoundConfig::new(10, 1)));
        assert_eq!(config.plan.rounds.len(), 2);
        assert!(config.plan.rounds[0].submit);
        assert!(!config.plan.rounds[1].submit);
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        let mut config = StressConfig::default();
        config.plan.create_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = StressConfig::default();
        config.plan.rounds.push(RoundConfig::new(0, 10));
        assert!(config.validate().is_err());

        let mut config = StressConfig::default();
        config.api.namespace = " ".to_string();
        assert!(config.validate().is_err());

        let mut config = StressConfig::default();
        config.api.token = Some("abc".to_string());
        config.api.token_file = Some(PathBuf::from("/tmp/token"));
        assert!(config.validate().is_err());
    }
}
