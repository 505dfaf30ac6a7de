/// Commented configuration template written by `wfstress generate-config`.
pub const CONFIG_TEMPLATE: &str = r#"# wfstress configuration
# Every key may also be set from the environment, e.g.
#   WFSTRESS_API__NAMESPACE=argo
#   WFSTRESS_PLAN__CREATE_ATTEMPTS=3

api:
  server: https://kubernetes.default.svc
  namespace: argo-workflow
  # Bearer token, inline or read from a file (not both)
  # token: ...
  token_file: /var/run/secrets/kubernetes.io/serviceaccount/token
  ca_cert_path: /var/run/secrets/kubernetes.io/serviceaccount/ca.crt
  insecure_skip_tls_verify: false
  request_timeout_secs: 30

plan:
  template_path: test/stress/massive-workflow-template.yaml
  workflow_path: test/stress/massive-workflow-sleep-2hour.yaml
  name_prefix: stress-
  create_attempts: 5
  progress_every: 10

  # Unmeasured round run first (`wfstress run --skip-warmup` skips it).
  # With submit: false it only waits for and deletes an existing
  # stress-0 .. stress-499 batch.
  warmup:
    batch_size: 500
    sleep_budget_secs: 5
    submit: false

  # Polling starts after a random delay in [0, sleep_budget_secs) seconds
  rounds:
    - { batch_size: 800, sleep_budget_secs: 7200 }
    - { batch_size: 1000, sleep_budget_secs: 7200 }
    - { batch_size: 1500, sleep_budget_secs: 7200 }
    - { batch_size: 2000, sleep_budget_secs: 7200 }
    - { batch_size: 3000, sleep_budget_secs: 7200 }
    - { batch_size: 4000, sleep_budget_secs: 7200 }
    - { batch_size: 5000, sleep_budget_secs: 7200 }
    - { batch_size: 6000, sleep_budget_secs: 7200 }
    - { batch_size: 7000, sleep_budget_secs: 7200 }
    - { batch_size: 8000, sleep_budget_secs: 7200 }
"#;
