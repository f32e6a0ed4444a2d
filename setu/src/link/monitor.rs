//! Link monitor thread
//!
//! Owns the state machine, the station and the readiness writer. Runs for
//! the lifetime of the process; no state is terminal.

use super::{
    ConnectivityMachine, ConnectivityState, LinkAction, LinkEvent, ReadinessWriter, Station,
};
use crate::error::Result;
use crate::status::{StatusEvent, StatusSink};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Upper bound on how long the loop sleeps before re-checking shutdown
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Minimum spacing between connect attempts, whatever the backoff says
pub const MIN_ATTEMPT_INTERVAL: Duration = Duration::from_secs(1);

/// Longest delay the loop schedules; larger configured values are clamped
const MAX_SCHEDULE: Duration = Duration::from_secs(24 * 60 * 60);

/// `from + by`, clamped so oversized configured delays cannot overflow
fn later(from: Instant, by: Duration) -> Instant {
    from.checked_add(by.min(MAX_SCHEDULE)).unwrap_or(from)
}

/// Drives a [`Station`] through the connectivity state machine
pub struct LinkMonitor<S: Station> {
    station: S,
    machine: ConnectivityMachine,
    writer: ReadinessWriter,
    sink: Arc<dyn StatusSink>,
    events_tx: Sender<LinkEvent>,
    events_rx: Receiver<LinkEvent>,
    check_interval: Duration,
    min_attempt_interval: Duration,
    running: Arc<AtomicBool>,
}

impl<S: Station> LinkMonitor<S> {
    /// Create a new link monitor
    pub fn new(
        station: S,
        machine: ConnectivityMachine,
        writer: ReadinessWriter,
        sink: Arc<dyn StatusSink>,
        check_interval: Duration,
        running: Arc<AtomicBool>,
    ) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        Self {
            station,
            machine,
            writer,
            sink,
            events_tx,
            events_rx,
            check_interval,
            min_attempt_interval: MIN_ATTEMPT_INTERVAL,
            running,
        }
    }

    /// Override the minimum spacing between connect attempts
    pub fn with_min_attempt_interval(mut self, interval: Duration) -> Self {
        self.min_attempt_interval = interval;
        self
    }

    /// Sender for events from sources other than the station
    pub fn events(&self) -> Sender<LinkEvent> {
        self.events_tx.clone()
    }

    /// Run the monitor loop until shutdown
    pub fn run(&mut self) -> Result<()> {
        log::info!("Link monitor started");
        self.station.start(&self.events_tx)?;

        let mut pending_attempt: Option<Instant> = None;
        let mut last_attempt: Option<Instant> = None;
        let mut next_check = later(Instant::now(), self.check_interval);

        while self.running.load(Ordering::Relaxed) {
            let now = Instant::now();

            if let Some(due) = pending_attempt
                && now >= due
            {
                pending_attempt = None;
                last_attempt = Some(now);
                self.machine.begin_attempt();
                self.publish();
                self.station.connect(&self.events_tx);
                continue;
            }

            if self.machine.state() == ConnectivityState::Connected && now >= next_check {
                self.station.check(&self.events_tx);
                next_check = later(now, self.check_interval);
            }

            let mut wait = POLL_INTERVAL;
            if let Some(due) = pending_attempt {
                wait = wait.min(due.saturating_duration_since(now));
            }

            match self.events_rx.recv_timeout(wait) {
                Ok(event) => {
                    if let Some(LinkAction::Connect { after }) = self.handle(event) {
                        let now = Instant::now();
                        let mut due = later(now, after);
                        if let Some(last) = last_attempt {
                            due = due.max(later(last, self.min_attempt_interval));
                        }
                        if due > now {
                            log::info!("Reconnecting in {:?}", due - now);
                        }
                        pending_attempt = Some(due);
                    }
                    next_check = later(Instant::now(), self.check_interval);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        log::info!("Link monitor exiting");
        Ok(())
    }

    /// Apply one event and publish the resulting state
    fn handle(&mut self, event: LinkEvent) -> Option<LinkAction> {
        match &event {
            LinkEvent::StationStarted => log::debug!("Station started"),
            LinkEvent::Disconnected { reason } => {
                log::warn!("Link down: {}. Retrying...", reason)
            }
            LinkEvent::AddressAcquired(ip) => log::info!("Link up, local address {}", ip),
        }
        let action = self.machine.on_event(&event);
        self.publish();
        action
    }

    fn publish(&self) {
        let state = self.machine.state();
        let previous = self.writer.publish(state);
        if previous != state {
            log::info!("Connectivity: {} -> {}", previous, state);
            self.sink.notify(StatusEvent::LinkChanged(state));
        }
    }
}
