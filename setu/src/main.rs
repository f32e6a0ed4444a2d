//! Setu - serial-to-cloud JSON event bridge daemon
//!
//! ## Threads
//!
//! - **link-monitor**: connectivity state machine, publishes readiness
//! - **status-indicator**: link indicator pattern
//! - **ingest**: serial reads, framing, routing, bounded queue
//! - **dispatch**: readiness-gated HTTPS PATCH per message

use setu::config::Config;
use setu::error::{Error, Result};
use setu::framing::FrameExtractor;
use setu::link::{ConnectivityMachine, LinkMonitor, ProbeStation, readiness};
use setu::pipeline::{self, DispatchQueue, DispatchWorker, Ingestor};
use setu::status::{LogSink, StatusEvent, StatusIndicator, StatusSink};
use setu::transport::SerialTransport;
use setu::uplink::{Dispatcher, HttpsClient};
use std::env;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Parse config path from command line arguments.
///
/// Supports:
/// - `setu <path>` (positional)
/// - `setu --config <path>` (flag-based)
/// - `setu -c <path>` (short flag)
///
/// Defaults to `/etc/setu.toml` if not specified.
fn parse_config_path() -> String {
    let args: Vec<String> = env::args().collect();

    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }

    if args.len() > 1 && !args[1].starts_with('-') {
        return args[1].clone();
    }

    "/etc/setu.toml".to_string()
}

fn main() -> Result<()> {
    let config_path = parse_config_path();
    let config = Config::load(&config_path)?;

    // RUST_LOG still wins over the file
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("Setu v{} starting...", env!("CARGO_PKG_VERSION"));
    log::info!("Using config: {}", config_path);
    log::info!(
        "Serial: {} @ {} baud, uplink: {}",
        config.serial.port,
        config.serial.baud_rate,
        setu::uplink::normalize_host(&config.uplink.host)
    );

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let sink: Arc<dyn StatusSink> = Arc::new(LogSink);
    sink.notify(StatusEvent::Started);

    // Link monitor
    let (writer, link_readiness) = readiness();
    let station = ProbeStation::new(
        config.probe_host(),
        config.link.probe_port,
        Duration::from_millis(config.link.connect_timeout_ms),
    );
    let mut monitor = LinkMonitor::new(
        station,
        ConnectivityMachine::new(config.link.backoff),
        writer,
        Arc::clone(&sink),
        Duration::from_millis(config.link.probe_interval_ms),
        Arc::clone(&running),
    );
    let link_handle = thread::Builder::new()
        .name("link-monitor".to_string())
        .spawn(move || {
            if let Err(e) = monitor.run() {
                log::error!("Link monitor error: {}", e);
            }
        })
        .map_err(|e| Error::Other(format!("Failed to spawn link monitor: {}", e)))?;

    // Status indicator
    let indicator = StatusIndicator::new(
        link_readiness.clone(),
        Arc::clone(&sink),
        &config.status,
        Arc::clone(&running),
    );
    let indicator_handle = thread::Builder::new()
        .name("status-indicator".to_string())
        .spawn(move || indicator.run())
        .map_err(|e| Error::Other(format!("Failed to spawn status indicator: {}", e)))?;

    if config.pipeline.startup_link_wait_secs > 0 {
        let wait = Duration::from_secs(config.pipeline.startup_link_wait_secs);
        log::info!("Waiting up to {:?} for the link before opening the serial port", wait);
        if !link_readiness.wait_connected(wait, &running) {
            log::warn!("Link still {} after startup wait, continuing", link_readiness.snapshot());
        }
    }

    // Pipeline
    let transport = SerialTransport::open(
        &config.serial.port,
        config.serial.baud_rate,
        Duration::from_millis(config.serial.read_timeout_ms),
    )?;
    let client = HttpsClient::new(&config.uplink)?;
    let dispatcher = Dispatcher::new(
        client,
        &config.uplink.host,
        &config.uplink.auth_token,
        Arc::clone(&sink),
    );
    let queue = DispatchQueue::new(
        config.pipeline.queue_capacity,
        config.pipeline.queue_full_policy,
    );
    log::info!(
        "Dispatch queue: {} messages, {:?} when full",
        queue.capacity(),
        queue.policy()
    );

    let ingestor = Ingestor::new(
        transport,
        FrameExtractor::new(config.framing.buffer_capacity),
        queue.clone(),
        Arc::clone(&sink),
        config.serial.chunk_size,
        Arc::clone(&running),
    );
    let worker = DispatchWorker::new(
        dispatcher,
        queue,
        link_readiness,
        Arc::clone(&sink),
        Arc::clone(&running),
    );
    let handles = pipeline::spawn(ingestor, worker)?;

    log::info!("Setu running. Press Ctrl-C to stop.");

    while running.load(Ordering::Relaxed) {
        if handles.is_finished() {
            log::error!("Pipeline thread exited unexpectedly, shutting down");
            running.store(false, Ordering::Relaxed);
            break;
        }
        thread::sleep(Duration::from_millis(100));
    }

    log::info!("Shutting down...");
    handles.join();
    if link_handle.join().is_err() {
        log::error!("Link monitor thread panicked");
    }
    if indicator_handle.join().is_err() {
        log::error!("Status indicator thread panicked");
    }

    log::info!("Setu stopped");
    Ok(())
}
