use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

use wfstress_core::{
    batch_names, BatchSubmitter, CompletionPoller, Experiment, HttpWorkflowApi, InstallOutcome,
    PollSettings, StressConfig, SubmitSettings, TemplateInstaller,
};

mod report;
mod template;

use report::round_summary;
use template::CONFIG_TEMPLATE;

#[derive(Parser, Debug)]
#[command(name = "wfstress")]
#[command(about = "Stress harness for Argo workflow control planes", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (overrides WFSTRESS_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the warm-up and every measured round
    Run {
        /// Start directly with the measured rounds
        #[arg(long)]
        skip_warmup: bool,
    },

    /// Create or update the workflow template
    InstallTemplate {
        /// Template manifest (defaults to plan.template_path)
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Submit one batch without polling it
    Submit {
        /// Number of workflows to create
        #[arg(long)]
        count: usize,

        /// Workflow manifest (defaults to plan.workflow_path)
        #[arg(long)]
        path: Option<PathBuf>,
    },

    /// Wait for an already submitted batch, then delete it
    Poll {
        /// Size of the batch to wait for
        #[arg(long)]
        count: usize,

        /// Upper bound of the start-up jitter in seconds
        #[arg(long, default_value = "0")]
        sleep_budget_secs: u64,
    },

    /// Generate a configuration file template
    GenerateConfig {
        /// Output configuration file path
        #[arg(long, default_value = "wfstress.yaml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let cli = Cli::parse();

    if let Commands::GenerateConfig { output } = &cli.command {
        std::fs::write(output, CONFIG_TEMPLATE)?;
        println!("Configuration template written to: {}", output.display());
        println!("\nEdit the file and use it with:");
        println!("  wfstress --config {} run", output.display());
        return Ok(());
    }

    let mut config = StressConfig::load(cli.config.as_deref())?;
    let api = HttpWorkflowApi::new(&config.api)?;

    match cli.command {
        Commands::Run { skip_warmup } => {
            if skip_warmup {
                config.plan.warmup = None;
            }
            println!(
                "Running {} round(s) against {} (namespace {})",
                config.plan.all_rounds().count(),
                config.api.server,
                api.namespace()
            );

            Experiment::new(&api, &config.plan)
                .run(|index, round, stats| {
                    let label = if index == 0 && config.plan.warmup.is_some() {
                        "warm-up".to_string()
                    } else {
                        format!("round {}", index)
                    };
                    println!("\n[{}] n={}", label, round.batch_size);
                    println!("{}", round_summary(stats));
                })
                .await?;

            println!("\nAll rounds complete.");
        }

        Commands::InstallTemplate { path } => {
            let path = path.unwrap_or_else(|| config.plan.template_path.clone());
            match TemplateInstaller::new(&api).install_from_path(&path).await? {
                InstallOutcome::Created => println!("Template created from {}", path.display()),
                InstallOutcome::Updated { previous_version } => println!(
                    "Template updated from {} (was at resourceVersion {})",
                    path.display(),
                    previous_version.as_deref().unwrap_or("unknown")
                ),
            }
        }

        Commands::Submit { count, path } => {
            let path = path.unwrap_or_else(|| config.plan.workflow_path.clone());
            let report = BatchSubmitter::new(&api, SubmitSettings::from(&config.plan))
                .submit_from_path(&path, count)
                .await?;
            println!(
                "Submitted {} workflow(s), {} retried attempt(s)",
                report.submitted, report.retries
            );
        }

        Commands::Poll {
            count,
            sleep_budget_secs,
        } => {
            let settings = PollSettings {
                sleep_budget_secs,
                progress_every: config.plan.progress_every,
            };
            let stats = CompletionPoller::new(&api, settings)
                .wait_and_reap(batch_names(&config.plan.name_prefix, count))
                .await?;
            println!("{}", round_summary(&stats));
        }

        Commands::GenerateConfig { .. } => {}
    }

    Ok(())
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).with_target(false).init();
}
