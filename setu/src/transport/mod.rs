//! Ingestion transports delivering raw byte chunks

use crate::error::Result;

mod mock;
mod serial;

pub use mock::MockTransport;
pub use serial::SerialTransport;

/// Byte source feeding the frame extractor
pub trait Transport: Send {
    /// Read available bytes into `buffer`.
    ///
    /// Returns `Ok(0)` when nothing arrived within the transport's timeout;
    /// an idle bus is not an error.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Drop any input queued below us (kernel/driver buffers).
    ///
    /// Called after a read error so stale, possibly truncated bytes are not
    /// fed into the next frame.
    fn discard_input(&mut self) -> Result<()> {
        Ok(())
    }
}
