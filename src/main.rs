//! Scrypt Mining Client - Main Application

use scrypt_mining_client::{
    client::GetworkClient,
    coordinator::{CoordinatorConfig, MiningCoordinator},
    crypto::ScryptHasher,
    logging::init_logging,
    worker::CpuWorker,
    Config, NonceSearcher, Result, APP_NAME, APP_VERSION,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load and validate configuration
    let config = Config::load().await?;

    if config.print_config {
        print_configuration(&config)?;
        return Ok(());
    }

    let _log_guard = init_logging(config.log_level, config.log_format, config.log_file.as_deref())?;

    info!("Starting {} v{}", APP_NAME, APP_VERSION);
    info!(
        "Configuration: rpc_url={}, work_timeout={}s, once={}",
        config.rpc_url, config.work_timeout, config.once
    );

    let client = GetworkClient::new(
        &config.rpc_url,
        config.credentials(),
        config.http_timeout_duration(),
    )?
    .with_backoff_config(config.backoff_config());

    let searcher = NonceSearcher::new(ScryptHasher::new()?)
        .with_progress_interval(config.progress_interval);
    let coordinator = MiningCoordinator::new(
        client,
        CpuWorker::new(searcher),
        CoordinatorConfig::from(&config),
    );

    let cancellation = CancellationToken::new();
    let shutdown = cancellation.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received interrupt, shutting down"),
            Err(e) => warn!("Failed to listen for interrupt: {}", e),
        }
        shutdown.cancel();
    });

    match coordinator.run(cancellation).await {
        Ok(stats) => {
            info!(
                "Mining finished: {} accepted, {} rejected",
                stats.accepted, stats.rejected
            );
            Ok(())
        }
        Err(e) => {
            error!("Mining stopped: {}", e);
            Err(e.into())
        }
    }
}

/// Print current configuration with secrets redacted
fn print_configuration(config: &Config) -> Result<()> {
    let config_yaml = serde_yaml::to_string(&config.redacted())?;
    println!("{}", config_yaml);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_config_printing() {
        let config = Config::try_parse_from([
            "scrypt-mining-client",
            "--rpc-user",
            "miner",
            "--rpc-password",
            "secret",
        ])
        .unwrap();

        let result = print_configuration(&config);
        assert!(result.is_ok());
    }
}
