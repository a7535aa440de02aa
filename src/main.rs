use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use skgrid_server::clock::SystemClock;
use skgrid_server::config::{Config, WifiCredentials};
use skgrid_server::connectivity::ConnectivityManager;
use skgrid_server::grid::PixelGrid;
use skgrid_server::radio::HostRadio;
use skgrid_server::status::{LogDisplay, StatusReporter, STARTUP_BANNER};
use skgrid_server::stream_server::StreamServer;
use skgrid_server::transport::{LedTransport, NullTransport, SerialTransport};

#[derive(Parser)]
#[command(name = "skgrid_server")]
#[command(about = "SK9822 Grid controller\n\nReceives raw LED frames over TCP and forwards them to the LED chain.", long_about = None)]
struct Cli {
    /// Path to configuration file (JSON)
    config: String,

    /// Enable debug logging (session events and throughput)
    #[arg(long)]
    debug: bool,

    /// Enable detailed debug (hex dumps of received data)
    #[arg(long)]
    ddebug: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ddebug implies debug
    let level = if cli.ddebug {
        "trace"
    } else if cli.debug {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;

    let mut status = StatusReporter::new(LogDisplay::new());
    status.banner(STARTUP_BANNER);

    let credentials = WifiCredentials::load(&config.connectivity.credentials_path).with_context(|| {
        format!(
            "Failed to read credentials from {}",
            config.connectivity.credentials_path.display()
        )
    })?;

    let radio = HostRadio::new(
        config.connectivity.route_address,
        config.connectivity.ap_address,
    );
    let mut connectivity =
        ConnectivityManager::new(radio, SystemClock, &config.connectivity, credentials);
    let address = connectivity.resolve();

    let grid = PixelGrid::new(config.grid.width, config.grid.height)?;
    info!(
        "Grid {}x{} ({} LEDs, {} byte frames)",
        grid.width(),
        grid.height(),
        grid.led_count(),
        grid.frame_len()
    );

    let transport: Box<dyn LedTransport> = match &config.transport {
        Some(transport_config) => Box::new(
            SerialTransport::open(transport_config)
                .with_context(|| format!("Failed to open serial port {}", transport_config.port))?,
        ),
        None => {
            warn!("No transport configured, LED output is discarded");
            Box::new(NullTransport::new())
        }
    };

    let mut server = StreamServer::new(
        config.server.clone(),
        address,
        grid,
        transport,
        status,
        SystemClock,
    );

    // Set up Ctrl-C handler with graceful shutdown
    let running = server.get_running_flag();
    let result = ctrlc::set_handler(move || {
        info!("Shutting down...");
        running.store(false, std::sync::atomic::Ordering::Relaxed);
    });

    if let Err(e) = result {
        warn!("Could not set Ctrl-C handler: {}", e);
    }

    // Run server (blocks until shutdown)
    let served = server.run();

    // Graceful shutdown - send a blank frame to turn off LEDs
    server.shutdown();

    served.context("Stream server failed")?;
    Ok(())
}
