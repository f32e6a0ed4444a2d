//! Byte-level brace/string scanner

/// What a single byte did to the frame being scanned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Byte belongs to the current frame, frame still open
    Continue,
    /// Byte closed the outermost brace; the frame ends here
    Complete,
    /// Closing brace with nothing open
    Unbalanced,
}

/// Position-independent scanner state
///
/// Tracks only what is needed to find the end of a top-level JSON object:
/// nesting depth and whether we are inside a string literal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanState {
    /// Open `{` count outside strings
    pub brace_depth: usize,
    /// Inside a string literal
    pub in_string: bool,
    /// Previous byte was an unconsumed `\` inside a string
    pub escaped: bool,
}

impl ScanState {
    /// Fresh state for a new frame
    pub const fn new() -> Self {
        Self {
            brace_depth: 0,
            in_string: false,
            escaped: false,
        }
    }

    /// Back to the initial state
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// True while at least one brace is open
    #[inline]
    pub fn is_open(&self) -> bool {
        self.brace_depth > 0
    }

    /// Advance over one byte
    #[inline]
    pub fn step(&mut self, byte: u8) -> Step {
        if self.in_string {
            if self.escaped {
                // The escape covers exactly this one byte
                self.escaped = false;
            } else if byte == b'\\' {
                self.escaped = true;
            } else if byte == b'"' {
                self.in_string = false;
            }
            return Step::Continue;
        }

        match byte {
            b'"' => {
                self.in_string = true;
                Step::Continue
            }
            b'{' => {
                self.brace_depth += 1;
                Step::Continue
            }
            b'}' => {
                if self.brace_depth == 0 {
                    return Step::Unbalanced;
                }
                self.brace_depth -= 1;
                if self.brace_depth == 0 {
                    Step::Complete
                } else {
                    Step::Continue
                }
            }
            _ => Step::Continue,
        }
    }
}
