//! Raw pixel payload reconstruction
//!
//! The raw-pixel convention carries no header: geometry and pixel format
//! are agreed out of band by both peers. The reference convention is
//! 640x360 BGRA at 4 bytes per pixel, rows packed with no padding.

use bytes::Bytes;

use crate::error::{Result, ScreenWireError};

/// Default width of the out-of-band pixel convention
pub const DEFAULT_WIDTH: u32 = 640;
/// Default height of the out-of-band pixel convention
pub const DEFAULT_HEIGHT: u32 = 360;

/// Pixel formats we support
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Bgra8888,
    Rgba8888,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8888 | PixelFormat::Rgba8888 => 4,
        }
    }
}

/// Fixed frame geometry agreed by both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelGeometry {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl PixelGeometry {
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
        }
    }

    /// Bytes in one packed row
    pub fn stride(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Exact payload size this geometry demands
    pub fn byte_len(&self) -> usize {
        self.stride() * self.height as usize
    }
}

impl Default for PixelGeometry {
    fn default() -> Self {
        Self::new(DEFAULT_WIDTH, DEFAULT_HEIGHT, PixelFormat::Bgra8888)
    }
}

/// An immutable pixel buffer ready for display
#[derive(Debug, Clone)]
pub struct PixelBuffer {
    geometry: PixelGeometry,
    data: Bytes,
}

impl PixelBuffer {
    /// Reconstruct a pixel buffer from a raw payload
    ///
    /// Allocates a buffer of exactly the geometry's size and copies the
    /// payload into it verbatim. The copy also detaches the pixels from
    /// the connection's receive buffer. A payload of any other length is
    /// rejected; an allocation refusal is reported per frame rather than
    /// aborting, so the connection keeps decoding.
    pub fn from_payload(geometry: PixelGeometry, payload: &[u8]) -> Result<Self> {
        let expected = geometry.byte_len();
        if payload.len() != expected {
            return Err(ScreenWireError::SizeMismatch {
                expected,
                actual: payload.len(),
            });
        }

        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(expected)
            .map_err(|_| ScreenWireError::AllocationFailed { bytes: expected })?;
        pixels.extend_from_slice(payload);

        Ok(Self {
            geometry,
            data: Bytes::from(pixels),
        })
    }

    pub fn geometry(&self) -> PixelGeometry {
        self.geometry
    }

    pub fn width(&self) -> u32 {
        self.geometry.width
    }

    pub fn height(&self) -> u32 {
        self.geometry.height
    }

    pub fn format(&self) -> PixelFormat {
        self.geometry.format
    }

    /// Bytes in one packed row
    pub fn stride(&self) -> usize {
        self.geometry.stride()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> PixelGeometry {
        PixelGeometry::new(2, 2, PixelFormat::Bgra8888)
    }

    #[test]
    fn geometry_arithmetic() {
        let geometry = PixelGeometry::default();
        assert_eq!(geometry.stride(), 640 * 4);
        assert_eq!(geometry.byte_len(), 640 * 360 * 4);
    }

    #[test]
    fn reconstructs_exact_payload() {
        let payload: Vec<u8> = (0u8..16).collect();

        let buffer = PixelBuffer::from_payload(tiny(), &payload).unwrap();
        assert_eq!(buffer.width(), 2);
        assert_eq!(buffer.height(), 2);
        assert_eq!(buffer.stride(), 8);
        assert_eq!(buffer.as_bytes(), &payload[..]);
    }

    #[test]
    fn short_payload_is_a_size_mismatch() {
        let err = PixelBuffer::from_payload(tiny(), &[0u8; 15]).unwrap_err();
        match err {
            ScreenWireError::SizeMismatch { expected, actual } => {
                assert_eq!(expected, 16);
                assert_eq!(actual, 15);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn long_payload_is_a_size_mismatch() {
        assert!(matches!(
            PixelBuffer::from_payload(tiny(), &[0u8; 17]),
            Err(ScreenWireError::SizeMismatch {
                expected: 16,
                actual: 17
            })
        ));
    }

    #[test]
    fn mismatch_does_not_poison_later_frames() {
        let geometry = tiny();

        assert!(PixelBuffer::from_payload(geometry, &[0u8; 3]).is_err());

        let good = PixelBuffer::from_payload(geometry, &[7u8; 16]).unwrap();
        assert_eq!(good.as_bytes(), &[7u8; 16]);
    }

    #[test]
    fn reference_geometry_payload_round_trips() {
        let geometry = PixelGeometry::default();
        let payload = vec![0x5Au8; geometry.byte_len()];

        let buffer = PixelBuffer::from_payload(geometry, &payload).unwrap();
        assert_eq!(buffer.as_bytes().len(), 640 * 360 * 4);
        assert_eq!(buffer.format(), PixelFormat::Bgra8888);
    }
}
