//! Ingest thread: serial bytes → frames → messages → queue

use super::queue::{DispatchQueue, PushOutcome};
use crate::framing::FrameExtractor;
use crate::routing::route;
use crate::status::{FaultKind, StatusEvent, StatusSink};
use crate::transport::Transport;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// How often extractor counters are logged
const STATS_INTERVAL: Duration = Duration::from_secs(60);

/// Pause after a failed read so a vanished device doesn't spin the loop
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(100);

pub struct Ingestor<T: Transport> {
    transport: T,
    extractor: FrameExtractor,
    queue: DispatchQueue,
    sink: Arc<dyn StatusSink>,
    chunk_size: usize,
    running: Arc<AtomicBool>,
}

impl<T: Transport> Ingestor<T> {
    pub fn new(
        transport: T,
        extractor: FrameExtractor,
        queue: DispatchQueue,
        sink: Arc<dyn StatusSink>,
        chunk_size: usize,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            transport,
            extractor,
            queue,
            sink,
            chunk_size: chunk_size.max(1),
            running,
        }
    }

    /// Read until shutdown
    pub fn run(&mut self) {
        log::info!("Ingest started ({} byte chunks)", self.chunk_size);
        let mut chunk = vec![0u8; self.chunk_size];
        let mut last_stats = Instant::now();

        while self.running.load(Ordering::Relaxed) {
            match self.transport.read(&mut chunk) {
                Ok(0) => {}
                Ok(n) => {
                    self.process_chunk(&chunk[..n]);
                }
                Err(e) => {
                    log::error!("Serial read failed: {}", e);
                    self.sink.notify(StatusEvent::Fault(FaultKind::ReadError));
                    if let Err(e) = self.transport.discard_input() {
                        log::warn!("Failed to flush serial input: {}", e);
                    }
                    self.extractor.reset();
                    std::thread::sleep(READ_ERROR_BACKOFF);
                }
            }

            if last_stats.elapsed() >= STATS_INTERVAL {
                let stats = self.extractor.stats();
                log::info!(
                    "Ingest stats: frames={} overflows={} malformed={} skipped={} queued={}",
                    stats.frames,
                    stats.overflows,
                    stats.malformed,
                    stats.skipped_bytes,
                    self.queue.len()
                );
                last_stats = Instant::now();
            }
        }

        log::info!("Ingest exiting");
    }

    /// Frame, route and enqueue one chunk. Returns how many messages were queued.
    pub fn process_chunk(&mut self, chunk: &[u8]) -> usize {
        self.sink.notify(StatusEvent::UartActivity { bytes: chunk.len() });
        log::debug!("RX {} bytes: {}", chunk.len(), String::from_utf8_lossy(chunk));

        let mut queued = 0;
        for result in self.extractor.feed(chunk) {
            let message = match result.and_then(route) {
                Ok(message) => message,
                Err(e) => {
                    log::warn!("Dropping input: {}", e);
                    if let Some(kind) = e.fault_kind() {
                        self.sink.notify(StatusEvent::Fault(kind));
                    }
                    continue;
                }
            };

            log::debug!("Frame routed to '{}'", message.category);
            match self.queue.push(message) {
                PushOutcome::Queued => queued += 1,
                PushOutcome::DroppedOldest(old) => {
                    queued += 1;
                    log::warn!("Dispatch queue full, dropped oldest '{}'", old.category);
                    self.sink.notify(StatusEvent::Fault(FaultKind::QueueFull));
                }
                PushOutcome::DroppedNewest(new) => {
                    log::warn!("Dispatch queue full, dropped newest '{}'", new.category);
                    self.sink.notify(StatusEvent::Fault(FaultKind::QueueFull));
                }
            }
        }
        queued
    }
}
