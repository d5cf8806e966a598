//! Dual-mode transport command line tool

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use log::{error, info, warn};
use tokio::task::JoinSet;

use dual_mode_transport::admin::{self, AdminState};
use dual_mode_transport::common::{init_logger, parse_socket_addr, Result, TransportError};
use dual_mode_transport::config::{
    check_warnings, dual_mode, validate_config, ConfigLoader, NodeConfig,
    DEFAULT_CONFIG_FILE, ENV_PREFIX,
};
use dual_mode_transport::tls::{OpensslEngineFactory, SslEngineFactory};
use dual_mode_transport::transport::{
    ConnectionHook, ConnectionSettings, DualModeTransport, OpportunisticConnector,
    OutboundListener, TransportServer,
};
use dual_mode_transport::{APP_NAME, VERSION};

/// Single-port TLS/plaintext node transport
#[derive(Parser, Debug)]
#[command(author, version = VERSION, about, long_about = None)]
struct Args {
    /// Configuration file (JSON)
    #[arg(long)]
    config_file: Option<PathBuf>,

    /// Apply DUAL_MODE_TRANSPORT_* environment variables
    #[arg(long)]
    from_env: bool,

    /// Transport listen address
    #[arg(short, long)]
    listen: Option<String>,

    /// Local service receiving inbound traffic
    #[arg(short, long)]
    target: Option<String>,

    /// Serve TLS and plaintext on the same port
    #[arg(long)]
    dual_mode: bool,

    /// Admin API listen address
    #[arg(long)]
    admin_listen: Option<String>,

    /// Log level
    #[arg(long)]
    log_level: Option<String>,
}

fn load_config(args: &Args) -> Result<NodeConfig> {
    let mut config = match &args.config_file {
        Some(path) => NodeConfig::from_file(path)?,
        None if PathBuf::from(DEFAULT_CONFIG_FILE).exists() => NodeConfig::from_file(DEFAULT_CONFIG_FILE)?,
        None => NodeConfig::default(),
    };

    if args.from_env {
        config.apply_env(ENV_PREFIX)?;
    }

    if let Some(listen) = &args.listen {
        config.listen = parse_socket_addr(listen)?;
    }
    if let Some(target) = &args.target {
        config.target = parse_socket_addr(target)?;
    }
    if args.dual_mode {
        config.dual_mode_enabled = true;
    }
    if let Some(admin_listen) = &args.admin_listen {
        config.admin_listen = Some(parse_socket_addr(admin_listen)?);
    }
    if let Some(log_level) = &args.log_level {
        config.log_level = log_level.clone();
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    init_logger(&config.log_level);
    info!("Starting {} v{}", APP_NAME, VERSION);

    validate_config(&config)?;
    for warning in check_warnings(&config) {
        warn!("{}", warning);
    }
    config.log();

    // Fixed before anything is accepted or opened
    let flag = dual_mode::initialize(config.dual_mode_enabled);

    let factory: Arc<dyn SslEngineFactory> = Arc::new(OpensslEngineFactory::from_config(&config)?);
    let hook: Arc<dyn ConnectionHook> = Arc::new(DualModeTransport::from_config(&config, Arc::clone(&flag), factory)?);

    let mut tasks = JoinSet::new();

    let server = TransportServer::bind(config.listen, Arc::clone(&hook), ConnectionSettings::from_config(&config)).await?;
    tasks.spawn(server.run());

    let connector = Arc::new(OpportunisticConnector::new(
        Arc::clone(&hook),
        Duration::from_secs(config.connection_timeout),
    ));
    for route in &config.outbound {
        let listener = OutboundListener::bind(route, Arc::clone(&connector), config.buffer_size).await?;
        tasks.spawn(listener.run());
    }

    if let Some(admin_listen) = config.admin_listen {
        let state = AdminState { dual_mode: Arc::clone(&flag) };
        tasks.spawn(async move {
            admin::bind_and_serve(admin_listen, state)
                .await
                .map_err(|e| TransportError::Other(e.to_string()))
        });
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
        Some(result) = tasks.join_next() => {
            match result {
                Ok(Err(e)) => error!("Listener stopped: {}", e),
                Err(e) => error!("Listener task failed: {}", e),
                Ok(Ok(())) => info!("Listener stopped"),
            }
        }
    }

    tasks.shutdown().await;
    Ok(())
}
