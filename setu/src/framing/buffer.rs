//! Bounded reassembly buffer

/// Fixed-capacity byte accumulator for one in-progress frame
///
/// Unlike a ring buffer, overflow is never partial: the caller checks
/// [`would_overflow`](Self::would_overflow) before a chunk is admitted and
/// clears the whole buffer when it would not fit.
#[derive(Debug)]
pub struct ReassemblyBuffer {
    data: Vec<u8>,
    capacity: usize,
}

impl ReassemblyBuffer {
    /// Create an empty buffer holding at most `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum number of bytes held
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently held
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True if admitting `incoming` more bytes could exceed capacity
    #[inline]
    pub fn would_overflow(&self, incoming: usize) -> bool {
        self.data.len().saturating_add(incoming) > self.capacity
    }

    /// Append one byte. Callers must have checked `would_overflow` for the
    /// chunk this byte belongs to.
    #[inline]
    pub fn push(&mut self, byte: u8) {
        debug_assert!(self.data.len() < self.capacity);
        self.data.push(byte);
    }

    /// Move the held bytes out, leaving the buffer empty
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::replace(&mut self.data, Vec::with_capacity(self.capacity))
    }

    /// Drop everything held
    #[inline]
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// View of the held bytes
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}
