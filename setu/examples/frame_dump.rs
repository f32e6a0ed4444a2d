//! Serial frame dumper
//!
//! Opens a serial port and prints every extracted frame with its routed
//! category. Nothing is sent upstream; use it to check what a device emits.
//!
//! ```text
//! cargo run --example frame_dump -- /dev/ttyUSB0 115200 30
//! ```

use setu::framing::FrameExtractor;
use setu::routing::route;
use setu::transport::{SerialTransport, Transport};
use std::env;
use std::time::{Duration, Instant};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args: Vec<String> = env::args().collect();
    let port = args.get(1).map(String::as_str).unwrap_or("/dev/ttyUSB0");
    let baud_rate: u32 = args.get(2).map(|s| s.parse()).transpose()?.unwrap_or(115200);
    let seconds: u64 = args.get(3).map(|s| s.parse()).transpose()?.unwrap_or(10);

    log::info!("=== Setu Frame Dumper ===");
    log::info!("Opening serial port {} at {} baud...", port, baud_rate);
    let mut transport = SerialTransport::open(port, baud_rate, Duration::from_millis(100))?;
    transport.discard_input()?;
    log::info!("Capturing for {} seconds", seconds);

    let start = Instant::now();
    let duration = Duration::from_secs(seconds);
    let mut extractor = FrameExtractor::new(6144);
    let mut buffer = vec![0u8; 1024];
    let mut total_bytes = 0;

    while start.elapsed() < duration {
        let bytes_read = transport.read(&mut buffer)?;
        if bytes_read == 0 {
            continue;
        }
        total_bytes += bytes_read;

        for result in extractor.feed(&buffer[..bytes_read]) {
            match result {
                Ok(frame) => {
                    let text = frame.to_string();
                    match route(frame) {
                        Ok(message) => println!(
                            "[{:8.3}s] {:<20} {}",
                            start.elapsed().as_secs_f64(),
                            message.category,
                            message.body()
                        ),
                        Err(e) => println!("  --> unroutable frame {}: {}", text, e),
                    }
                }
                Err(e) => println!("  --> {}", e),
            }
        }
    }

    let stats = extractor.stats();
    log::info!("");
    log::info!("=== Summary ===");
    log::info!("Total bytes: {}", total_bytes);
    log::info!("Frames: {}", stats.frames);
    log::info!("Overflows: {}", stats.overflows);
    log::info!("Malformed: {}", stats.malformed);
    log::info!("Skipped bytes: {}", stats.skipped_bytes);
    log::info!("Partial frame at exit: {} bytes", extractor.buffered());

    Ok(())
}
