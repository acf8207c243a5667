//! zlib-stream inflater
//!
//! The gateway compresses the whole connection as one zlib stream, sync-flushing after
//! every message. Frames may split a message; a message is complete when the buffered
//! bytes end with the sync-flush marker `00 00 FF FF`.

use flate2::{Decompress, FlushDecompress, Status};
use thiserror::Error;

/// Sync-flush marker closing every compressed message
pub const ZLIB_SUFFIX: [u8; 4] = [0x00, 0x00, 0xFF, 0xFF];

/// Initial output reservation per input byte; grown as needed
const OUTPUT_RATIO: usize = 4;

/// Buffers above this size are released when a context is reset
const RETAINED_CAPACITY: usize = 64 * 1024;

/// Decompression failure; the session's compressed state is unrecoverable
#[derive(Debug, Error)]
pub enum DecompressError {
    #[error("corrupt zlib stream: {0}")]
    Corrupt(#[from] flate2::DecompressError),

    #[error("zlib stream stalled after {consumed} of {total} bytes")]
    Stalled { consumed: usize, total: usize },
}

/// Whether `bytes` open a new zlib stream (CMF 0x78 with a valid FLG check)
#[must_use]
pub fn is_stream_header(bytes: &[u8]) -> bool {
    matches!(bytes, [0x78, 0x01 | 0x9C | 0xDA, ..])
}

/// One streaming decompression context with its fragment buffer
pub struct Inflater {
    context: Decompress,
    buffer: Vec<u8>,
}

impl Inflater {
    #[must_use]
    pub fn new() -> Self {
        Self {
            context: Decompress::new(true),
            buffer: Vec::new(),
        }
    }

    /// Feed one frame.
    ///
    /// Returns the decompressed message once the buffer ends with [`ZLIB_SUFFIX`], or
    /// `None` while more fragments are needed. Nothing is decompressed before the marker.
    pub fn push(&mut self, fragment: &[u8]) -> Result<Option<Vec<u8>>, DecompressError> {
        // A fresh stream on a used context: the server restarted compression
        if self.buffer.is_empty() && self.context.total_in() > 0 && is_stream_header(fragment) {
            self.context.reset(true);
        }

        self.buffer.extend_from_slice(fragment);
        if !self.buffer.ends_with(&ZLIB_SUFFIX) {
            return Ok(None);
        }

        let result = self.inflate();
        self.buffer.clear();
        result.map(Some)
    }

    /// Bytes buffered towards the next message
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Total compressed bytes consumed by this stream
    pub fn total_in(&self) -> u64 {
        self.context.total_in()
    }

    /// Drop buffered bytes and start a new stream
    pub fn reset(&mut self) {
        self.context.reset(true);
        self.buffer.clear();
        if self.buffer.capacity() > RETAINED_CAPACITY {
            self.buffer.shrink_to(RETAINED_CAPACITY);
        }
    }

    fn inflate(&mut self) -> Result<Vec<u8>, DecompressError> {
        let input = &self.buffer;
        let mut output = Vec::with_capacity(input.len().saturating_mul(OUTPUT_RATIO));
        let mut offset = 0;

        loop {
            if output.len() == output.capacity() {
                output.reserve(input.len().max(1024));
            }

            let before_in = self.context.total_in();
            let before_out = self.context.total_out();
            let status =
                self.context
                    .decompress_vec(&input[offset..], &mut output, FlushDecompress::Sync)?;
            let consumed = usize::try_from(self.context.total_in() - before_in).unwrap_or(usize::MAX);
            let produced = self.context.total_out() - before_out;
            offset = offset.saturating_add(consumed).min(input.len());

            let output_full = output.len() == output.capacity();
            match status {
                Status::StreamEnd => break,
                _ if offset >= input.len() && !output_full => break,
                _ if consumed == 0 && produced == 0 && !output_full => {
                    return Err(DecompressError::Stalled {
                        consumed: offset,
                        total: input.len(),
                    });
                }
                _ => {}
            }
        }

        Ok(output)
    }
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Inflater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inflater")
            .field("pending", &self.buffer.len())
            .field("total_in", &self.context.total_in())
            .field("total_out", &self.context.total_out())
            .finish()
    }
}
