use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use relay_core::{Clock, SystemClock};
use relay_gc::GarbageCollector;
use relay_server::api::AppState;
use relay_server::config::RelayConfig;
use relay_server::service::FileService;

/// Anonymous file relay HTTP server.
#[derive(Parser, Debug)]
#[command(name = "relay-server", about = "Anonymous file relay server")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "relay.toml")]
    config: String,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the repository schema, then exit.
    Migrate,
    /// Run a single garbage collection sweep, then exit.
    Sweep,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration from TOML file, or use defaults if the file does not exist.
    let config_exists = Path::new(&cli.config).exists();
    let mut config: RelayConfig = if config_exists {
        let contents = std::fs::read_to_string(&cli.config)?;
        toml::from_str(&contents)?
    } else {
        toml::from_str("")?
    };
    config.apply_env()?;
    let providers = config.validate()?;

    relay_server::telemetry::init(&config.logging);

    if !config_exists {
        info!(path = %cli.config, "config file not found, using defaults");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let repository = relay_server::repository_factory::create_repository(
        providers.repository,
        &config.repository,
        Arc::clone(&clock),
    )
    .await?;

    if let Some(Commands::Migrate) = cli.command {
        // The factory already ran migrations; a dead database shows here.
        if !repository.is_live().await {
            return Err("file repository is not reachable".into());
        }
        info!(provider = %providers.repository, "migrations complete");
        return Ok(());
    }

    let storage =
        relay_server::storage_factory::create_storage(providers.storage, &config.storage).await?;
    let gc_config = config.gc.to_gc_config()?;
    let collector = Arc::new(GarbageCollector::new(
        Arc::clone(&repository),
        Arc::clone(&storage),
        Arc::clone(&clock),
        gc_config,
    ));

    if let Some(Commands::Sweep) = cli.command {
        let report = collector.sweep().await?;
        info!(
            deleted = report.deleted,
            failed = report.failed,
            pages = report.pages,
            "sweep complete"
        );
        return Ok(());
    }

    let limiter = relay_server::ratelimit_factory::create_rate_limiter(
        providers.rate_limit,
        &config.rate_limit,
        Arc::clone(&clock),
    )?;

    tokio::fs::create_dir_all(&config.server.temp_dir).await?;

    let gc_handle = if config.gc.enabled {
        Some(Arc::clone(&collector).start())
    } else {
        info!("garbage collector disabled");
        None
    };

    let service = FileService::new(limiter, repository, storage, clock)
        .with_backend_error_policy(config.rate_limit.on_backend_error);
    let state = AppState {
        service: Arc::new(service),
        temp_dir: Arc::new(config.server.temp_dir.clone()),
        max_upload_bytes: config.server.max_upload_bytes,
        trust_proxy: config.server.trust_proxy,
    };
    let app = relay_server::api::router(state);

    // Resolve the bind address (CLI overrides take precedence).
    let host = cli.host.unwrap_or(config.server.host);
    let port = cli.port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "relay-server listening");

    // Serve with graceful shutdown on SIGINT / SIGTERM.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    if let Some(handle) = gc_handle {
        let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout_seconds);
        info!(
            timeout_secs = config.server.shutdown_timeout_seconds,
            "stopping garbage collector..."
        );
        if tokio::time::timeout(shutdown_timeout, handle.stop())
            .await
            .is_err()
        {
            warn!(
                timeout_secs = config.server.shutdown_timeout_seconds,
                "shutdown timeout exceeded, abandoning garbage collection sweep"
            );
        }
    }

    info!("relay-server shut down");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM, then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
