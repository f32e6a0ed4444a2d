//! Mock transport for testing

use super::Transport;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Scripted transport: each injected chunk is returned by exactly one read
///
/// Clones share state, so a test can keep a handle while the ingest loop
/// owns another.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
    idle_delay: Duration,
}

struct MockTransportInner {
    chunks: VecDeque<MockRead>,
    discards: usize,
}

enum MockRead {
    Data(Vec<u8>),
    Fail(String),
}

impl MockTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        MockTransport {
            inner: Arc::new(Mutex::new(MockTransportInner {
                chunks: VecDeque::new(),
                discards: 0,
            })),
            idle_delay: Duration::from_millis(1),
        }
    }

    /// Queue a chunk to be returned by a single read
    pub fn inject(&self, data: &[u8]) {
        self.inner.lock().chunks.push_back(MockRead::Data(data.to_vec()));
    }

    /// Queue a read error
    pub fn inject_error(&self, message: &str) {
        self.inner
            .lock()
            .chunks
            .push_back(MockRead::Fail(message.to_string()));
    }

    /// Chunks not yet read
    pub fn pending(&self) -> usize {
        self.inner.lock().chunks.len()
    }

    /// Number of `discard_input` calls seen
    pub fn discards(&self) -> usize {
        self.inner.lock().discards
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let next = self.inner.lock().chunks.pop_front();
        match next {
            Some(MockRead::Data(mut data)) => {
                let n = data.len().min(buffer.len());
                buffer[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    // Remainder is delivered by the next read
                    let rest = data.split_off(n);
                    self.inner.lock().chunks.push_front(MockRead::Data(rest));
                }
                Ok(n)
            }
            Some(MockRead::Fail(message)) => Err(Error::Io(std::io::Error::other(message))),
            None => {
                // Behave like a serial read timing out on an idle bus
                std::thread::sleep(self.idle_delay);
                Ok(0)
            }
        }
    }

    fn discard_input(&mut self) -> Result<()> {
        self.inner.lock().discards += 1;
        Ok(())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}
