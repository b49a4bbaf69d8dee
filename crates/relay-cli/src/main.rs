//! relay - run one workflow extension handler on the Redis bus
//!
//! # フロー
//! 1. ログ初期化（`RUST_LOG`、既定 info）
//! 2. 環境変数から RelayConfig
//! 3. 名前で handler を選び ExtensionRunner を組み立てる
//! 4. 任意で /health を立てる
//! 5. SIGINT / SIGTERM を shutdown として run
//!
//! インフラ側のエラー（設定・バス・壊れた task）は exit 1。
//! handler の失敗は `failed` envelope を出して exit 0。

mod integrations;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use relay_core::app::HealthServer;
use relay_core::ports::BusError;
use relay_core::typed::RegistryError;
use relay_core::{ConfigError, RelayConfig, RunnerError};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::integrations::SetupError;

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Run one workflow extension handler on the Redis bus")]
#[command(version)]
struct Cli {
    /// Handler to run (see --list-handlers)
    #[arg(long, env = "RELAY_HANDLER")]
    handler: Option<String>,

    /// Print the registered handler names and exit
    #[arg(long)]
    list_handlers: bool,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("handler setup failed: {0}")]
    Setup(#[from] SetupError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no handler selected; pass --handler or set RELAY_HANDLER")]
    NoHandler,
    #[error(transparent)]
    Handler(#[from] RegistryError),
    #[error("bus setup failed: {0}")]
    Bus(#[from] BusError),
    #[error("health endpoint failed: {0}")]
    Health(#[source] std::io::Error),
    #[error(transparent)]
    Runner(#[from] RunnerError),
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "relay failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let app = integrations::app(reqwest::Client::new())?;

    if cli.list_handlers {
        for name in app.task_types() {
            println!("{name}");
        }
        return Ok(());
    }

    let config = RelayConfig::from_env()?;
    let handler = cli
        .handler
        .or_else(|| config.relay_handler.clone())
        .ok_or(CliError::NoHandler)?;

    let connector = Arc::new(config.redis_connector()?);
    let runner = app
        .runner(
            &handler,
            connector,
            config.channels(),
            config.workflow_ids(),
        )?
        .with_options(config.runner_options());

    let health = match config.relay_health_addr {
        Some(addr) => Some(HealthServer::bind(addr).await.map_err(CliError::Health)?),
        None => None,
    };

    let result = runner.run_until(shutdown_signal()).await;
    if let Some(health) = health {
        health.shutdown();
    }

    let report = result?;
    info!(
        run_id = %report.run_id,
        envelopes = report.envelopes_published(),
        outcome = ?report.last_outcome(),
        "run finished"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_handler_flag() {
        let cli = Cli::try_parse_from(["relay", "--handler", "webhook.acknowledge"]).unwrap();
        assert_eq!(cli.handler.as_deref(), Some("webhook.acknowledge"));
        assert!(!cli.list_handlers);
    }

    #[test]
    fn cli_parses_list_flag() {
        let cli = Cli::try_parse_from(["relay", "--list-handlers"]).unwrap();
        assert!(cli.list_handlers);
    }

    #[tokio::test]
    async fn list_handlers_needs_no_environment() {
        let cli = Cli::try_parse_from(["relay", "--list-handlers"]).unwrap();
        assert!(run(cli).await.is_ok());
    }
}
