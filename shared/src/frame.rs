//! Reassembly of terminator-delimited frames from a byte stream.
//!
//! TCP hands us arbitrary slices of the stream: a read may hold half a
//! frame, several frames, or end between the two terminator bytes. The
//! assembler keeps whatever has not been consumed yet and always looks for
//! the first terminator in it, so the same frames come out no matter where
//! the stream was split.

use bytes::{Buf, BytesMut};
use thiserror::Error;

use crate::TERMINATOR;

/// Initial buffer size, enough for the longest frame any state allows.
const INITIAL_CAPACITY: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("no terminator within {limit} bytes")]
    TooLong { limit: usize },
}

/// Carry-over state for one direction of one connection.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    /// Received bytes not yet returned as part of a frame
    buffer: BytesMut,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Queues a freshly read chunk behind any carry-over.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Pops the next complete frame.
    ///
    /// `limit` is the frame budget including the terminator. It is passed
    /// per call because the budget depends on the protocol state, which
    /// may change after every frame. Only a terminator that ends within the
    /// first `limit` bytes completes a frame. Returns `Ok(None)` while fewer
    /// than `limit` bytes are queued and none of them end a frame. The
    /// returned frame excludes the terminator and may be empty.
    pub fn next_frame(&mut self, limit: usize) -> Result<Option<Vec<u8>>, FrameError> {
        let window = &self.buffer[..self.buffer.len().min(limit)];
        if let Some(end) = window
            .windows(TERMINATOR.len())
            .position(|candidate| candidate == TERMINATOR)
        {
            let frame = self.buffer.split_to(end).to_vec();
            self.buffer.advance(TERMINATOR.len());
            return Ok(Some(frame));
        }

        if self.buffer.len() >= limit {
            return Err(FrameError::TooLong { limit });
        }
        Ok(None)
    }

    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}
