//! Filter delay line.
use crate::{BLOCK_SIZE, NUM_TAPS, Q15};

/// Length of a delay line: a full block plus the history a block needs.
pub const DELAY_LINE_LEN: usize = NUM_TAPS + BLOCK_SIZE - 1;

/// Delay line holding the most recent `NUM_TAPS + BLOCK_SIZE - 1` input
/// samples of one filter.
///
/// The first `NUM_TAPS - 1` entries are history from the previous block,
/// the rest is the current block, oldest first. Once a block is full, the
/// next push slides the line forward by `BLOCK_SIZE`, keeping only the
/// history.
#[derive(Clone, Debug)]
pub struct DelayLine {
    buf: [Q15; DELAY_LINE_LEN],
    pos: usize,
}

impl DelayLine {
    /// Create new zeroed delay line.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: [Q15::ZERO; DELAY_LINE_LEN],
            pos: 0,
        }
    }

    /// Shift in one new sample.
    pub fn push(&mut self, x: Q15) {
        if self.pos == BLOCK_SIZE {
            self.buf.copy_within(BLOCK_SIZE.., 0);
            self.pos = 0;
        }
        self.buf[NUM_TAPS - 1 + self.pos] = x;
        self.pos += 1;
    }

    /// The last `NUM_TAPS` samples, newest first.
    ///
    /// Item `i` is the input delayed by `i` samples.
    pub fn window(&self) -> impl Iterator<Item = Q15> + '_ {
        let start = self.pos.saturating_sub(1);
        self.buf[start..start + NUM_TAPS]
            .iter()
            .rev()
            .copied()
    }

    /// Zero all history.
    pub fn reset(&mut self) {
        self.buf = [Q15::ZERO; DELAY_LINE_LEN];
        self.pos = 0;
    }

    /// Raw contents, oldest first.
    #[must_use]
    pub fn as_slice(&self) -> &[Q15] {
        &self.buf
    }
}

impl Default for DelayLine {
    fn default() -> Self {
        Self::new()
    }
}
