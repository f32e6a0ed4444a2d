//! Ingest and dispatch threads
//!
//! ```text
//!  Transport ─▶ [ingest] ─▶ DispatchQueue ─▶ [dispatch] ─▶ UplinkClient
//!               extractor    (bounded)        readiness
//!               router                        check
//! ```
//!
//! The ingest thread never touches the network, so a slow uplink can only
//! fill the queue, never stall the serial reader.

mod dispatch;
mod ingest;
mod queue;

pub use dispatch::DispatchWorker;
pub use ingest::Ingestor;
pub use queue::{DispatchQueue, PushOutcome, QueueFullPolicy};

use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::uplink::UplinkClient;
use std::thread::{self, JoinHandle};

/// Pipeline thread handles
pub struct PipelineHandles {
    pub ingest: JoinHandle<()>,
    pub dispatch: JoinHandle<()>,
}

impl PipelineHandles {
    pub fn is_finished(&self) -> bool {
        self.ingest.is_finished() || self.dispatch.is_finished()
    }

    /// Wait for both threads
    pub fn join(self) {
        if self.ingest.join().is_err() {
            log::error!("Ingest thread panicked");
        }
        if self.dispatch.join().is_err() {
            log::error!("Dispatch thread panicked");
        }
    }
}

/// Spawn the ingest and dispatch threads
pub fn spawn<T, C>(mut ingestor: Ingestor<T>, worker: DispatchWorker<C>) -> Result<PipelineHandles>
where
    T: Transport + 'static,
    C: UplinkClient + 'static,
{
    let dispatch = thread::Builder::new()
        .name("dispatch".into())
        .spawn(move || worker.run())
        .map_err(|e| Error::Other(format!("Failed to spawn dispatch thread: {}", e)))?;

    let ingest = thread::Builder::new()
        .name("ingest".into())
        .spawn(move || ingestor.run())
        .map_err(|e| Error::Other(format!("Failed to spawn ingest thread: {}", e)))?;

    Ok(PipelineHandles { ingest, dispatch })
}
