pub mod api;
pub mod cli;
pub mod clients;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod copy;
pub mod detect;
pub mod domain;
pub mod durable;
pub mod naming;
pub mod state;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use config::Config;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    run_with_config(config).await
}

pub async fn run_with_config(config: Config) -> anyhow::Result<()> {
    config.validate()?;

    let prometheus_handle = init_prometheus(&config)?;
    init_logging(&config)?;

    let cli = Cli::parse();
    execute_command(cli, config, prometheus_handle).await
}

fn init_prometheus(
    config: &Config,
) -> anyhow::Result<Option<metrics_exporter_prometheus::PrometheusHandle>> {
    if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("failed to install prometheus recorder: {e}"))?;
        tracing::info!("prometheus metrics recorder initialized");
        Ok(Some(handle))
    } else {
        Ok(None)
    }
}

fn init_logging(config: &Config) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    let use_json = std::env::var("LOG_FORMAT").unwrap_or_default() == "json";
    if use_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().flatten_event(true))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().pretty()).init();
    }
    Ok(())
}

async fn execute_command(
    cli: Cli,
    config: Config,
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> anyhow::Result<()> {
    match cli.command {
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
            Ok(())
        }
        Some(Commands::Worker) => cli::cmd_worker(config, prometheus_handle).await,
        Some(Commands::Organize { path, dry_run, confidence_threshold }) => {
            cli::cmd_organize(&config, path, dry_run, confidence_threshold).await
        }
        Some(Commands::Status { workflow_id }) => cli::cmd_status(&config, &workflow_id).await,
        Some(Commands::Approve { workflow_id }) => cli::cmd_approve(&config, &workflow_id).await,
        Some(Commands::Reject { workflow_id }) => cli::cmd_reject(&config, &workflow_id).await,
        Some(Commands::Review { workflow_id, review_item_id, approve, reject, season, episode }) => {
            if approve == reject {
                anyhow::bail!("exactly one of --approve or --reject must be given");
            }
            cli::cmd_review(&config, &workflow_id, &review_item_id, approve, season, episode).await
        }
        Some(Commands::DiscStatus { workflow_id, folder }) => {
            cli::cmd_disc_status(&config, &workflow_id, &folder).await
        }
        Some(Commands::ConfirmDetection { workflow_id, folder, confirm, reject, add, remove }) => {
            if confirm == reject {
                anyhow::bail!("exactly one of --confirm or --reject must be given");
            }
            cli::cmd_confirm_detection(&config, &workflow_id, &folder, confirm, add, remove).await
        }
    }
}
