//! Uplink connectivity tracking
//!
//! ```text
//!                 StationStarted
//!   ┌──────────────┐ ──────────▶ ┌────────────┐ AddressAcquired ┌───────────┐
//!   │ Disconnected │             │ Connecting │ ──────────────▶ │ Connected │
//!   └──────────────┘ ◀────────── └────────────┘                 └───────────┘
//!          ▲  │       Disconnected                                    │
//!          │  └─ backoff elapsed ─▶ Connecting                        │
//!          └──────────────────────── Disconnected ────────────────────┘
//! ```
//!
//! The link monitor thread is the only writer of the readiness cell; the
//! dispatcher and status indicator read snapshots of it.

mod machine;
mod monitor;
mod station;

pub use machine::{BackoffPolicy, ConnectivityMachine, LinkAction, LinkEvent};
pub use monitor::LinkMonitor;
pub use station::{ProbeStation, Station};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::{Duration, Instant};

/// Uplink link state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ConnectivityState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
}

impl ConnectivityState {
    fn from_u8(value: u8) -> Self {
        match value {
            2 => ConnectivityState::Connected,
            1 => ConnectivityState::Connecting,
            _ => ConnectivityState::Disconnected,
        }
    }
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectivityState::Disconnected => "disconnected",
            ConnectivityState::Connecting => "connecting",
            ConnectivityState::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Create the readiness cell: one writer, any number of readers
pub fn readiness() -> (ReadinessWriter, Readiness) {
    let cell = Arc::new(AtomicU8::new(ConnectivityState::Disconnected as u8));
    (
        ReadinessWriter {
            cell: Arc::clone(&cell),
        },
        Readiness { cell },
    )
}

/// Write half of the readiness cell. Not `Clone`: whoever owns it is the
/// single writer.
#[derive(Debug)]
pub struct ReadinessWriter {
    cell: Arc<AtomicU8>,
}

impl ReadinessWriter {
    /// Publish a new state, returning the previous one
    pub fn publish(&self, state: ConnectivityState) -> ConnectivityState {
        ConnectivityState::from_u8(self.cell.swap(state as u8, Ordering::AcqRel))
    }

    /// Another read handle onto the same cell
    pub fn reader(&self) -> Readiness {
        Readiness {
            cell: Arc::clone(&self.cell),
        }
    }
}

/// Read half of the readiness cell
#[derive(Debug, Clone)]
pub struct Readiness {
    cell: Arc<AtomicU8>,
}

impl Readiness {
    /// Consistent snapshot of the current state
    #[inline]
    pub fn snapshot(&self) -> ConnectivityState {
        ConnectivityState::from_u8(self.cell.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.snapshot() == ConnectivityState::Connected
    }

    /// Block until connected, `timeout` elapses or `running` clears.
    ///
    /// Returns whether the link is connected on return. A timeout too large
    /// to represent waits without a deadline.
    pub fn wait_connected(&self, timeout: Duration, running: &AtomicBool) -> bool {
        const POLL: Duration = Duration::from_millis(50);
        let deadline = Instant::now().checked_add(timeout);

        while running.load(Ordering::Relaxed) {
            if self.is_connected() {
                return true;
            }
            let mut sleep = POLL;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                sleep = sleep.min(deadline - now);
            }
            std::thread::sleep(sleep);
        }
        self.is_connected()
    }
}
