//! Status notifications
//!
//! The bridge reports what happens to a [`StatusSink`]: deliveries, serial
//! activity, link changes and faults. Sinks are fire-and-forget; a board
//! with indicator LEDs implements one that pulses GPIOs, the daemon default
//! ([`LogSink`]) writes to the log.
//!
//! [`StatusIndicator`] is the periodic part: it renders the link state as
//! an on/off pattern, steady while connected and blinking otherwise.

use crate::config::StatusConfig;
use crate::link::{ConnectivityState, Readiness};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Non-fatal fault classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultKind {
    BufferOverflow,
    MalformedFrame,
    InvalidJson,
    EmptyObject,
    /// Message vetoed because the link was not connected
    LinkNotReady,
    /// Message dropped because the dispatch queue was full
    QueueFull,
    /// Uplink answered with a non-2xx status
    Rejected,
    /// Connection, TLS or timeout failure
    TransportFailed,
    /// Serial read failed
    ReadError,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaultKind::BufferOverflow => "buffer overflow",
            FaultKind::MalformedFrame => "malformed frame",
            FaultKind::InvalidJson => "invalid json",
            FaultKind::EmptyObject => "empty object",
            FaultKind::LinkNotReady => "link not ready",
            FaultKind::QueueFull => "queue full",
            FaultKind::Rejected => "rejected",
            FaultKind::TransportFailed => "transport failed",
            FaultKind::ReadError => "read error",
        };
        f.write_str(name)
    }
}

/// Something worth signalling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// Daemon is up (power indicator)
    Started,
    /// Bytes arrived on the serial line
    UartActivity { bytes: usize },
    /// Uplink accepted a message
    Delivered { category: String, status: u16 },
    /// Connectivity state changed
    LinkChanged(ConnectivityState),
    /// Link indicator level
    Indicator { on: bool },
    /// A message or chunk was lost
    Fault(FaultKind),
}

/// Receiver of status events. Must not block.
pub trait StatusSink: Send + Sync {
    fn notify(&self, event: StatusEvent);
}

/// Sink that writes events to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn notify(&self, event: StatusEvent) {
        match event {
            StatusEvent::Started => log::info!("Status: started"),
            StatusEvent::UartActivity { bytes } => {
                log::trace!("Status: uart activity ({} bytes)", bytes)
            }
            StatusEvent::Delivered { category, status } => {
                log::debug!("Status: delivered '{}' (HTTP {})", category, status)
            }
            StatusEvent::LinkChanged(state) => log::debug!("Status: link {}", state),
            StatusEvent::Indicator { on } => {
                log::trace!("Status: link indicator {}", if on { "on" } else { "off" })
            }
            StatusEvent::Fault(kind) => log::debug!("Status: fault ({})", kind),
        }
    }
}

/// Periodic link indicator
pub struct StatusIndicator {
    readiness: Readiness,
    sink: Arc<dyn StatusSink>,
    connected_refresh: Duration,
    blink_interval: Duration,
    running: Arc<AtomicBool>,
}

impl StatusIndicator {
    pub fn new(
        readiness: Readiness,
        sink: Arc<dyn StatusSink>,
        config: &StatusConfig,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            readiness,
            sink,
            connected_refresh: Duration::from_millis(config.connected_refresh_ms),
            blink_interval: Duration::from_millis(config.blink_interval_ms),
            running,
        }
    }

    /// Indicator levels and hold times for one cycle in `state`
    pub fn pattern(&self, state: ConnectivityState) -> Vec<(bool, Duration)> {
        match state {
            ConnectivityState::Connected => vec![(true, self.connected_refresh)],
            ConnectivityState::Connecting | ConnectivityState::Disconnected => {
                vec![(true, self.blink_interval), (false, self.blink_interval)]
            }
        }
    }

    /// Run until shutdown
    pub fn run(&self) {
        log::debug!("Status indicator started");
        while self.running.load(Ordering::Relaxed) {
            for (on, hold) in self.pattern(self.readiness.snapshot()) {
                self.sink.notify(StatusEvent::Indicator { on });
                if !sleep_while_running(hold, &self.running) {
                    break;
                }
            }
        }
        log::debug!("Status indicator exiting");
    }
}

/// Sleep for `duration` in short slices; false if shutdown interrupted it
pub(crate) fn sleep_while_running(duration: Duration, running: &AtomicBool) -> bool {
    const SLICE: Duration = Duration::from_millis(50);
    let mut remaining = duration;
    while !remaining.is_zero() {
        if !running.load(Ordering::Relaxed) {
            return false;
        }
        let step = remaining.min(SLICE);
        std::thread::sleep(step);
        remaining -= step;
    }
    running.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::readiness;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<StatusEvent>>);

    impl StatusSink for RecordingSink {
        fn notify(&self, event: StatusEvent) {
            self.0.lock().push(event);
        }
    }

    fn indicator(
        readiness: Readiness,
        sink: Arc<RecordingSink>,
        running: Arc<AtomicBool>,
    ) -> StatusIndicator {
        let config = StatusConfig {
            connected_refresh_ms: 40,
            blink_interval_ms: 10,
        };
        StatusIndicator::new(readiness, sink, &config, running)
    }

    #[test]
    fn test_pattern_steady_when_connected_blinking_otherwise() {
        let (_writer, reader) = readiness();
        let sink = Arc::new(RecordingSink::default());
        let ind = indicator(reader, sink, Arc::new(AtomicBool::new(true)));

        assert_eq!(
            ind.pattern(ConnectivityState::Connected),
            vec![(true, Duration::from_millis(40))]
        );
        for state in [ConnectivityState::Connecting, ConnectivityState::Disconnected] {
            assert_eq!(
                ind.pattern(state),
                vec![
                    (true, Duration::from_millis(10)),
                    (false, Duration::from_millis(10))
                ]
            );
        }
    }

    #[test]
    fn test_indicator_blinks_while_disconnected() {
        let (_writer, reader) = readiness();
        let sink = Arc::new(RecordingSink::default());
        let running = Arc::new(AtomicBool::new(true));
        let ind = indicator(reader, Arc::clone(&sink), Arc::clone(&running));

        let handle = std::thread::spawn(move || ind.run());
        std::thread::sleep(Duration::from_millis(100));
        running.store(false, Ordering::Relaxed);
        handle.join().unwrap();

        let events = sink.0.lock();
        assert!(events.contains(&StatusEvent::Indicator { on: true }));
        assert!(events.contains(&StatusEvent::Indicator { on: false }));
    }

    #[test]
    fn test_sleep_while_running_stops_early() {
        let running = AtomicBool::new(false);
        assert!(!sleep_while_running(Duration::from_secs(10), &running));
    }
}
