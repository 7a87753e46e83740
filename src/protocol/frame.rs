//! Line reassembly for the unstructured scale byte stream.
//!
//! There is no framing beyond the terminator: a record is everything up
//! to the next line-feed or carriage-return byte. Either terminator
//! alone closes a record, so `\r\n` pairs simply produce an empty
//! second record, which is discarded.

use bytes::{Buf, BytesMut};

/// Line assembler that handles partial reads.
///
/// Bytes are accumulated across [`feed`](Self::feed) calls and complete
/// lines extracted with [`next_line`](Self::next_line); the buffer only
/// ever holds bytes received since the last emitted line boundary.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buffer: BytesMut,
}

impl LineAssembler {
    /// Creates a new line assembler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    /// Feeds data into the assembler.
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Extracts the next complete line, if one is buffered.
    ///
    /// Bytes that are not valid UTF-8 are dropped rather than failing
    /// the line. Lines that are empty after trimming surrounding
    /// whitespace are skipped, never returned.
    pub fn next_line(&mut self) -> Option<String> {
        while let Some(pos) = self
            .buffer
            .iter()
            .position(|&b| b == b'\n' || b == b'\r')
        {
            let line = self.buffer.split_to(pos);
            self.buffer.advance(1); // drop the terminator

            let mut text = String::from_utf8_lossy(&line).into_owned();
            text.retain(|c| c != char::REPLACEMENT_CHARACTER);

            let trimmed = text.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_owned());
            }
        }
        None
    }

    /// Returns the number of bytes currently buffered.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
