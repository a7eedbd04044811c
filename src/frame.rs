//! Length-prefixed frame reassembly for the datagram stream
//!
//! Frame format on the wire:
//! - Length (4 bytes, big-endian unsigned)
//! - Payload (length bytes, opaque)
//!
//! No magic number, no version field, no checksum. The stream may arrive
//! arbitrarily fragmented or coalesced: a single chunk can carry several
//! frames, part of one, or even part of the length prefix itself.

use bytes::{Buf, Bytes, BytesMut};

use crate::error::{Result, ScreenWireError};

/// Size of the length prefix
pub const LEN_PREFIX_SIZE: usize = 4;

/// Default sanity ceiling for a declared payload length.
///
/// Well above any screen grab the sender produces (a raw 640x360 BGRA
/// buffer is ~0.9 MiB) while keeping a corrupt prefix from parking
/// gigabytes in the accumulation buffer.
pub const DEFAULT_MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Frame decoder for streaming data
///
/// Owns one connection's accumulation buffer. Bytes go in via
/// [`push`](Self::push) or [`feed`](Self::feed); completed payloads come
/// out in arrival order. Anything short of a complete frame stays
/// buffered untouched until more data arrives.
pub struct FrameDecoder {
    buffer: BytesMut,
    max_frame_len: u32,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_FRAME_LEN)
    }

    /// Create a decoder with a custom declared-length ceiling
    pub fn with_limit(max_frame_len: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            max_frame_len,
        }
    }

    /// Add data to the buffer
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Try to extract the next complete frame
    ///
    /// Returns `Ok(None)` while the buffered bytes do not yet form a
    /// complete frame; nothing is consumed in that case. A declared
    /// length above the ceiling fails with
    /// [`ScreenWireError::MalformedLength`] and leaves the corrupt prefix
    /// in place, so every later call fails the same way — there is no
    /// marker to resynchronize on, and the caller is expected to drop the
    /// decoder with its connection.
    pub fn try_next(&mut self) -> Result<Option<Bytes>> {
        if self.buffer.len() < LEN_PREFIX_SIZE {
            return Ok(None);
        }

        let declared = u32::from_be_bytes([
            self.buffer[0],
            self.buffer[1],
            self.buffer[2],
            self.buffer[3],
        ]);

        if declared > self.max_frame_len {
            return Err(ScreenWireError::MalformedLength {
                declared,
                limit: self.max_frame_len,
            });
        }

        let payload_len = declared as usize;
        if self.buffer.len() - LEN_PREFIX_SIZE < payload_len {
            // Frame still incomplete, wait for more data
            return Ok(None);
        }

        self.buffer.advance(LEN_PREFIX_SIZE);
        Ok(Some(self.buffer.split_to(payload_len).freeze()))
    }

    /// Append a chunk and drain every frame it completes
    ///
    /// One chunk may complete several buffered frames or none; the loop
    /// re-evaluates after each extraction so nothing stays stuck behind a
    /// completed frame.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Bytes>> {
        self.push(chunk);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_next()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Number of bytes awaiting frame completion
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode one payload in the wire format
///
/// The sender half of the protocol; also what the tests feed back through
/// the decoder.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    assert!(
        payload.len() <= u32::MAX as usize,
        "frame payload too large: {} bytes",
        payload.len()
    );
    let mut framed = Vec::with_capacity(LEN_PREFIX_SIZE + payload.len());
    framed.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    framed.extend_from_slice(payload);
    framed
}
