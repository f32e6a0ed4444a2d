//! Frame extraction from the raw device byte stream
//!
//! The device writes JSON objects back to back on the serial line with no
//! length prefix or delimiter. Frames are found by brace counting:
//!
//! ```text
//!  bytes:  \n { " a " : { } }  \n { ...
//!  depth:     1         2 1 0     1
//!                           ^ frame emitted, buffer reset
//! ```
//!
//! - Braces inside string literals are ignored (escape-aware).
//! - Bytes between frames (newlines, noise) are skipped, so a frame is
//!   always exactly its `{...}` span.
//! - A chunk that would push the reassembly buffer past its capacity
//!   discards the partial frame and reports [`Error::BufferOverflow`].
//! - A `}` with nothing open reports [`Error::MalformedFrame`].
//!
//! # Known limitation
//!
//! This is a framer, not a JSON validator. Valid input from a trusted
//! producer frames correctly; adversarial input such as an unterminated
//! string can hold a frame open until the buffer overflows. Grammar is
//! checked afterwards by the router.

mod buffer;
mod scan;

pub use buffer::ReassemblyBuffer;
pub use scan::{ScanState, Step};

use crate::error::{Error, Result};
use std::fmt;

/// One brace-balanced `{...}` span cut from the stream
#[derive(Clone, PartialEq, Eq)]
pub struct Frame(Vec<u8>);

impl Frame {
    /// Wrap bytes that are already known to be one balanced object
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({})", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// Running counters, logged periodically by the ingest loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractorStats {
    pub frames: u64,
    pub overflows: u64,
    pub malformed: u64,
    /// Non-whitespace bytes dropped between frames
    pub skipped_bytes: u64,
}

/// Incremental frame extractor
pub struct FrameExtractor {
    buffer: ReassemblyBuffer,
    scan: ScanState,
    stats: ExtractorStats,
}

impl FrameExtractor {
    /// Create an extractor whose reassembly buffer holds `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: ReassemblyBuffer::new(capacity),
            scan: ScanState::new(),
            stats: ExtractorStats::default(),
        }
    }

    /// Consume one chunk and return every frame it completed, in order,
    /// interleaved with the faults encountered along the way.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<Frame>> {
        let mut out = Vec::new();

        if self.buffer.would_overflow(chunk.len()) {
            let buffered = self.buffer.len();
            self.reset();
            self.stats.overflows += 1;
            out.push(Err(Error::BufferOverflow {
                buffered,
                incoming: chunk.len(),
                capacity: self.buffer.capacity(),
            }));
            return out;
        }

        for (offset, &byte) in chunk.iter().enumerate() {
            if !self.scan.is_open() && byte != b'{' && byte != b'}' {
                if !byte.is_ascii_whitespace() {
                    self.stats.skipped_bytes += 1;
                    log::debug!("Skipping byte 0x{:02X} outside a frame", byte);
                }
                continue;
            }

            match self.scan.step(byte) {
                Step::Continue => self.buffer.push(byte),
                Step::Complete => {
                    self.buffer.push(byte);
                    let frame = Frame::new(self.buffer.take());
                    self.scan.reset();
                    self.stats.frames += 1;
                    out.push(Ok(frame));
                }
                Step::Unbalanced => {
                    self.reset();
                    self.stats.malformed += 1;
                    out.push(Err(Error::MalformedFrame { offset }));
                }
            }
        }

        out
    }

    /// Discard any partial frame
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.scan.reset();
    }

    /// True when no partial frame is held
    pub fn is_idle(&self) -> bool {
        self.buffer.is_empty() && self.scan == ScanState::new()
    }

    /// Bytes of the partial frame currently held
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Current scanner state
    pub fn scan_state(&self) -> ScanState {
        self.scan
    }

    pub fn stats(&self) -> ExtractorStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(results: Vec<Result<Frame>>) -> Vec<Vec<u8>> {
        results
            .into_iter()
            .map(|r| r.expect("unexpected fault").into_bytes())
            .collect()
    }

    #[test]
    fn test_single_frame() {
        let mut ex = FrameExtractor::new(64);
        let out = frames(ex.feed(br#"{"winding":{"x":1}}"#));
        assert_eq!(out, vec![br#"{"winding":{"x":1}}"#.to_vec()]);
        assert!(ex.is_idle());
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut ex = FrameExtractor::new(64);
        assert!(ex.feed(br#"{"a":{"#).is_empty());
        assert_eq!(ex.scan_state().brace_depth, 2);
        assert!(ex.feed(br#""b":2"#).is_empty());
        let out = frames(ex.feed(b"}}"));
        assert_eq!(out, vec![br#"{"a":{"b":2}}"#.to_vec()]);
    }

    #[test]
    fn test_braces_inside_string() {
        let mut ex = FrameExtractor::new(64);
        let input = br#"{"a":"}{"}"#;
        let out = frames(ex.feed(input));
        assert_eq!(out, vec![input.to_vec()]);
        assert!(ex.is_idle());
    }

    #[test]
    fn test_escaped_quote_inside_string() {
        let mut ex = FrameExtractor::new(64);
        let input = br#"{"a":"\""}"#;
        let out = frames(ex.feed(input));
        assert_eq!(out, vec![input.to_vec()]);
        assert!(ex.is_idle());
    }

    #[test]
    fn test_escaped_quote_split_at_backslash() {
        let mut ex = FrameExtractor::new(64);
        assert!(ex.feed(br#"{"a":"x\"#).is_empty());
        assert!(ex.scan_state().escaped);
        assert!(ex.feed(br#""}"#).is_empty());
        assert!(ex.scan_state().in_string);
        let out = frames(ex.feed(br#""}"#));
        assert_eq!(out, vec![br#"{"a":"x\"}"}"#.to_vec()]);
    }

    #[test]
    fn test_back_to_back_frames_with_separators() {
        let mut ex = FrameExtractor::new(64);
        let out = frames(ex.feed(b"{\"a\":1}\r\n{\"b\":2}\n{\"c\":"));
        assert_eq!(out, vec![b"{\"a\":1}".to_vec(), b"{\"b\":2}".to_vec()]);
        assert_eq!(ex.buffered(), 5);

        let out = frames(ex.feed(b"3}"));
        assert_eq!(out, vec![b"{\"c\":3}".to_vec()]);
        assert_eq!(ex.stats().frames, 3);
        assert_eq!(ex.stats().skipped_bytes, 0);
    }

    #[test]
    fn test_noise_between_frames_is_skipped() {
        let mut ex = FrameExtractor::new(64);
        let out = frames(ex.feed(b"boot ok {\"a\":1}"));
        assert_eq!(out, vec![b"{\"a\":1}".to_vec()]);
        assert_eq!(ex.stats().skipped_bytes, 6);
    }

    #[test]
    fn test_overflow_clears_and_recovers() {
        let mut ex = FrameExtractor::new(16);
        assert!(ex.feed(b"{\"long\":\"").is_empty());
        assert!(ex.scan_state().in_string);

        let out = ex.feed(b"aaaaaaaaaaaa");
        assert_eq!(out.len(), 1);
        assert!(matches!(
            out[0],
            Err(Error::BufferOverflow {
                buffered: 9,
                incoming: 12,
                capacity: 16
            })
        ));
        assert!(ex.is_idle());
        assert_eq!(ex.stats().overflows, 1);

        let out = frames(ex.feed(b"{\"ok\":1}"));
        assert_eq!(out, vec![b"{\"ok\":1}".to_vec()]);
    }

    #[test]
    fn test_chunk_larger_than_capacity() {
        let mut ex = FrameExtractor::new(4);
        let out = ex.feed(b"{\"a\":1}");
        assert!(matches!(out[..], [Err(Error::BufferOverflow { .. })]));
        assert!(ex.is_idle());
    }

    #[test]
    fn test_exact_capacity_fits() {
        let mut ex = FrameExtractor::new(7);
        let out = frames(ex.feed(b"{\"a\":1}"));
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_unbalanced_close_is_malformed() {
        let mut ex = FrameExtractor::new(64);
        let out = ex.feed(b"}{\"a\":1}");
        assert_eq!(out.len(), 2);
        assert!(matches!(out[0], Err(Error::MalformedFrame { offset: 0 })));
        assert_eq!(out[1].as_ref().unwrap().as_bytes(), b"{\"a\":1}");
        assert_eq!(ex.stats().malformed, 1);
    }

    #[test]
    fn test_trailing_close_after_frame() {
        let mut ex = FrameExtractor::new(64);
        let out = ex.feed(b"{\"a\":1}}");
        assert_eq!(out.len(), 2);
        assert!(out[0].is_ok());
        assert!(matches!(out[1], Err(Error::MalformedFrame { offset: 7 })));
        assert!(ex.is_idle());
    }

    #[test]
    fn test_refeeding_consumed_input_is_stateless() {
        let input = b"{\"a\":{\"b\":[1,2]}}";
        let mut ex = FrameExtractor::new(64);
        let first = frames(ex.feed(input));
        assert!(ex.is_idle());
        let second = frames(ex.feed(input));
        assert!(ex.is_idle());
        assert_eq!(first, second);
    }

    #[test]
    fn test_same_frames_at_every_chunk_boundary() {
        let expected: Vec<Vec<u8>> = vec![
            br#"{"a":"}{ {"}"#.to_vec(),
            br#"{"b":"say \"hi\" \\"}"#.to_vec(),
            br#"{"c":{"d":{"e":[1,{"f":2}]}}}"#.to_vec(),
        ];
        let mut stream = Vec::new();
        for frame in &expected {
            stream.extend_from_slice(frame);
            stream.extend_from_slice(b"\r\n");
        }

        for split in 0..=stream.len() {
            let mut ex = FrameExtractor::new(128);
            let mut out = frames(ex.feed(&stream[..split]));
            out.extend(frames(ex.feed(&stream[split..])));
            assert_eq!(out, expected, "split at {}", split);
            assert!(ex.is_idle());
        }

        let mut ex = FrameExtractor::new(128);
        let mut out = Vec::new();
        for byte in &stream {
            out.extend(frames(ex.feed(std::slice::from_ref(byte))));
        }
        assert_eq!(out, expected);
        assert_eq!(ex.stats().frames, 3);
    }
}
