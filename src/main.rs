//! kvfront server binary
//!
//! # Startup Sequence
//! 1. Parse the command line
//! 2. Load and validate configuration (exits on error)
//! 3. Build the JSON logger
//! 4. Connect to Cassandra
//! 5. Serve HTTP (or HTTPS) until SIGINT/SIGTERM
//! 6. Close the storage session

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kvfront::{create_router, server, AppState, CassandraStore, Config, Logger, Store};

#[derive(Parser, Debug)]
#[command(name = "kvfront")]
#[command(about = "HTTP key/value front end for Cassandra")]
#[command(version)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "/etc/kvfront/config.yaml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Transport and driver diagnostics; the service log goes through `Logger`.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}: {}", args.config.display(), err);
            return ExitCode::FAILURE;
        }
    };

    let logger = Arc::new(Logger::stdout(&config.service_name, config.log_level));

    match run(config, Arc::clone(&logger)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            logger.fatal(format_args!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}

async fn run(config: Config, logger: Arc<Logger>) -> Result<()> {
    let store = CassandraStore::connect(&config.cassandra)
        .await
        .context("Error connecting to Cassandra")?;
    let store: Arc<dyn Store> = Arc::new(store);
    logger.info(format_args!(
        "Connected to Cassandra at {:?} (keyspace {}, table {}, tls {})",
        config.cassandra.hosts,
        config.cassandra.keyspace,
        config.cassandra.table,
        config.cassandra.tls.is_enabled()
    ));

    let state = AppState::from_config(&config, Arc::clone(&store), Arc::clone(&logger));
    let app = create_router(state);

    let address = config.bind_address();
    let scheme = if config.tls.is_enabled() { "https" } else { "http" };
    logger.info(format_args!(
        "Starting service as {}://{}{}",
        scheme, address, config.base_uri
    ));

    let served = server::serve(
        app,
        &address,
        &config.tls,
        shutdown_signal(Arc::clone(&logger)),
    )
    .await;

    store.close().await;
    served?;
    logger.info(format_args!("Server shutdown complete"));
    Ok(())
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal(logger: Arc<Logger>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            logger.info(format_args!("Received Ctrl+C, initiating shutdown..."));
        }
        _ = terminate => {
            logger.info(format_args!("Received SIGTERM, initiating shutdown..."));
        }
    }
}
