//! Resumable raw DEFLATE decoder
//!
//! [`Inflater`] owns the complete decoder state (sliding window, bit
//! position, Huffman tables) inside a [`flate2::Decompress`], so a caller can
//! stop after any number of output bytes and resume later with the next
//! slice of input. Nothing is re-decoded on resume.

use crate::error::{Result, UnzipError};
use flate2::{Decompress, FlushDecompress, Status};

/// Lifecycle of an [`Inflater`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InflateState {
    /// No input fed yet
    Idle,
    /// Stream started, final block not yet finished
    InProgress,
    /// Final block decoded; no more output will be produced
    Done,
    /// Malformed stream; terminal
    Faulted,
}

/// Progress made by one [`Inflater::step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// Input bytes consumed
    pub consumed: usize,
    /// Output bytes written
    pub produced: usize,
}

/// Raw (headerless) DEFLATE decoder with explicit state
pub struct Inflater {
    inner: Decompress,
    state: InflateState,
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Inflater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inflater")
            .field("state", &self.state)
            .field("total_in", &self.inner.total_in())
            .field("total_out", &self.inner.total_out())
            .finish()
    }
}

impl Inflater {
    pub fn new() -> Self {
        Self {
            // ZIP entries carry raw deflate data without a zlib header
            inner: Decompress::new(false),
            state: InflateState::Idle,
        }
    }

    pub fn state(&self) -> InflateState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == InflateState::Done
    }

    /// Total input consumed since creation
    pub fn total_in(&self) -> u64 {
        self.inner.total_in()
    }

    /// Total output produced since creation
    pub fn total_out(&self) -> u64 {
        self.inner.total_out()
    }

    /// Decode from `input` into `output` until one of them is exhausted or
    /// the stream ends.
    ///
    /// A step on a finished stream makes no progress. A step on a faulted
    /// stream fails again.
    pub fn step(&mut self, input: &[u8], output: &mut [u8]) -> Result<Step> {
        match self.state {
            InflateState::Done => {
                return Ok(Step {
                    consumed: 0,
                    produced: 0,
                })
            }
            InflateState::Faulted => {
                return Err(UnzipError::inflate("stream previously faulted"));
            }
            InflateState::Idle if input.is_empty() => {
                return Ok(Step {
                    consumed: 0,
                    produced: 0,
                })
            }
            InflateState::Idle => self.state = InflateState::InProgress,
            InflateState::InProgress => {}
        }

        let in_before = self.inner.total_in();
        let out_before = self.inner.total_out();

        let status = self
            .inner
            .decompress(input, output, FlushDecompress::None)
            .map_err(|e| {
                self.state = InflateState::Faulted;
                UnzipError::inflate(format!(
                    "malformed deflate stream after {} input bytes: {}",
                    in_before, e
                ))
            })?;

        let step = Step {
            consumed: (self.inner.total_in() - in_before) as usize,
            produced: (self.inner.total_out() - out_before) as usize,
        };

        if status == Status::StreamEnd {
            self.state = InflateState::Done;
        }

        Ok(step)
    }
}
