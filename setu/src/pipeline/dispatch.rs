//! Dispatch thread: queue → readiness check → uplink

use super::queue::DispatchQueue;
use crate::error::Error;
use crate::link::Readiness;
use crate::routing::Message;
use crate::status::{FaultKind, StatusEvent, StatusSink};
use crate::uplink::{Dispatcher, UplinkClient, UplinkOutcome};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Upper bound on a queue wait before re-checking shutdown
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

pub struct DispatchWorker<C: UplinkClient> {
    dispatcher: Dispatcher<C>,
    queue: DispatchQueue,
    readiness: Readiness,
    sink: Arc<dyn StatusSink>,
    running: Arc<AtomicBool>,
}

impl<C: UplinkClient> DispatchWorker<C> {
    pub fn new(
        dispatcher: Dispatcher<C>,
        queue: DispatchQueue,
        readiness: Readiness,
        sink: Arc<dyn StatusSink>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            dispatcher,
            queue,
            readiness,
            sink,
            running,
        }
    }

    /// Drain the queue until shutdown
    pub fn run(&self) {
        log::info!("Dispatch started");
        while self.running.load(Ordering::Relaxed) {
            if let Some(message) = self.queue.recv_timeout(RECV_TIMEOUT) {
                self.handle(&message);
            }
        }
        log::info!("Dispatch exiting ({} messages left undelivered)", self.queue.len());
    }

    /// Dispatch one message against the current readiness snapshot
    pub fn handle(&self, message: &Message) -> Option<UplinkOutcome> {
        match self.dispatcher.dispatch(message, self.readiness.snapshot()) {
            Ok(outcome) => {
                match &outcome {
                    UplinkOutcome::Delivered(_) => {}
                    UplinkOutcome::Rejected(_) => {
                        self.sink.notify(StatusEvent::Fault(FaultKind::Rejected))
                    }
                    UplinkOutcome::TransportFailed(_) => {
                        self.sink.notify(StatusEvent::Fault(FaultKind::TransportFailed))
                    }
                }
                Some(outcome)
            }
            Err(e @ Error::LinkNotReady(_)) => {
                log::warn!("Dropping '{}': {}", message.category, e);
                self.sink.notify(StatusEvent::Fault(FaultKind::LinkNotReady));
                None
            }
            Err(e) => {
                log::error!("Dispatch of '{}' failed: {}", message.category, e);
                self.sink.notify(StatusEvent::Fault(FaultKind::TransportFailed));
                None
            }
        }
    }
}
