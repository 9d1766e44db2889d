//! deepa-io - PixelPusher network endpoint daemon

use deepa_io::config::Config;
use deepa_io::devices::create_device;
use deepa_io::error::{Error, Result};
use deepa_io::server;
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("deepa-io v{} starting...", env!("CARGO_PKG_VERSION"));

    // Get config path from args or default
    let config_path = env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/deepa-io.toml".to_string());

    // Load configuration
    log::info!("Using config: {}", config_path);
    let config = Config::load(&config_path)?;

    log::info!(
        "Device: {} ({})",
        config.device.name,
        config.device.device_type
    );

    // Create output device
    let device = create_device(&config)?;

    // Set up shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);

    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    // Probe the network and start the beacon + receiver threads
    let handle = server::start(&config, device, Arc::clone(&running))?;

    log::info!("deepa-io running. Press Ctrl-C to stop.");

    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(100));
    }

    // Shutdown
    log::info!("Shutting down...");
    handle.shutdown();

    log::info!("deepa-io stopped");
    Ok(())
}
