//! Payload post-processing
//!
//! A reassembled frame is an opaque byte payload. What it means is a
//! per-deployment convention: either a self-describing encoded image
//! (JPEG, PNG, ...) or a headerless raw pixel dump with out-of-band
//! geometry. Processing validates the payload against the convention and
//! wraps it for delivery; it never re-encodes or scales.

use bytes::Bytes;

use crate::error::{Result, ScreenWireError};
use crate::pixel::{PixelBuffer, PixelGeometry};

/// Image containers recognized by signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Tiff,
    Heif,
}

impl ImageFormat {
    /// Sniff the container from the payload's magic bytes
    ///
    /// Returns `None` when no known signature matches, which the caller
    /// reports as a decode failure for that frame.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(ImageFormat::Jpeg);
        }
        if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(ImageFormat::Png);
        }
        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some(ImageFormat::Gif);
        }
        if data.starts_with(b"BM") {
            return Some(ImageFormat::Bmp);
        }
        if data.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || data.starts_with(&[0x4D, 0x4D, 0x00, 0x2A]) {
            return Some(ImageFormat::Tiff);
        }
        // ISO BMFF: [box size][b"ftyp"][brand]
        if data.len() >= 12 && &data[4..8] == b"ftyp" {
            let brand = &data[8..12];
            if matches!(brand, b"heic" | b"heix" | b"hevc" | b"mif1" | b"msf1" | b"avif") {
                return Some(ImageFormat::Heif);
            }
        }
        None
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Gif => "gif",
            ImageFormat::Bmp => "bmp",
            ImageFormat::Tiff => "tiff",
            ImageFormat::Heif => "heic",
        }
    }
}

/// An encoded image payload, validated but not decompressed
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub format: ImageFormat,
    pub data: Bytes,
}

/// How this deployment interprets frame payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadConvention {
    /// Payloads are self-describing encoded images
    EncodedImage,
    /// Payloads are headerless pixel dumps of a fixed geometry
    RawPixels(PixelGeometry),
}

impl Default for PayloadConvention {
    fn default() -> Self {
        PayloadConvention::EncodedImage
    }
}

/// A payload that survived post-processing, ready for the consumer
#[derive(Debug, Clone)]
pub enum DecodedPayload {
    Image(EncodedImage),
    Pixels(PixelBuffer),
}

impl DecodedPayload {
    pub fn byte_len(&self) -> usize {
        match self {
            DecodedPayload::Image(image) => image.data.len(),
            DecodedPayload::Pixels(pixels) => pixels.as_bytes().len(),
        }
    }
}

/// Validate one reassembled frame payload under the given convention
///
/// Failures here are per-frame: the caller drops the frame and keeps the
/// connection and its decoder state intact.
pub fn process(payload: Bytes, convention: PayloadConvention) -> Result<DecodedPayload> {
    match convention {
        PayloadConvention::EncodedImage => {
            let format =
                ImageFormat::detect(&payload).ok_or(ScreenWireError::UnrecognizedImage)?;
            Ok(DecodedPayload::Image(EncodedImage {
                format,
                data: payload,
            }))
        }
        PayloadConvention::RawPixels(geometry) => {
            let pixels = PixelBuffer::from_payload(geometry, &payload)?;
            Ok(DecodedPayload::Pixels(pixels))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::pixel::PixelFormat;

    const JPEG_STUB: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'];
    const PNG_STUB: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    #[test]
    fn detects_common_containers() {
        assert_eq!(ImageFormat::detect(JPEG_STUB), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::detect(PNG_STUB), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::detect(b"GIF89a..."), Some(ImageFormat::Gif));
        assert_eq!(ImageFormat::detect(b"BM\x36\x00"), Some(ImageFormat::Bmp));
        assert_eq!(
            ImageFormat::detect(&[0x49, 0x49, 0x2A, 0x00, 1, 2]),
            Some(ImageFormat::Tiff)
        );
        assert_eq!(
            ImageFormat::detect(b"\x00\x00\x00\x18ftypheic more"),
            Some(ImageFormat::Heif)
        );
    }

    #[test]
    fn rejects_unknown_bytes() {
        assert_eq!(ImageFormat::detect(b"not an image"), None);
        assert_eq!(ImageFormat::detect(&[]), None);
        assert_eq!(ImageFormat::detect(&[0xFF, 0xD8]), None);
    }

    #[test]
    fn image_convention_wraps_recognized_payloads() {
        let decoded = process(Bytes::from_static(JPEG_STUB), PayloadConvention::EncodedImage)
            .unwrap();
        match decoded {
            DecodedPayload::Image(image) => {
                assert_eq!(image.format, ImageFormat::Jpeg);
                assert_eq!(&image.data[..], JPEG_STUB);
            }
            other => panic!("expected an image, got {other:?}"),
        }
    }

    #[test]
    fn image_convention_rejects_garbage_per_frame() {
        let err = process(
            Bytes::from_static(b"garbage bytes"),
            PayloadConvention::EncodedImage,
        )
        .unwrap_err();
        assert!(matches!(err, ScreenWireError::UnrecognizedImage));

        // The failure is scoped to that frame only
        assert!(process(Bytes::from_static(PNG_STUB), PayloadConvention::EncodedImage).is_ok());
    }

    #[test]
    fn raw_convention_enforces_geometry() {
        let geometry = PixelGeometry::new(2, 2, PixelFormat::Bgra8888);
        let convention = PayloadConvention::RawPixels(geometry);

        let decoded = process(Bytes::from(vec![9u8; 16]), convention).unwrap();
        match decoded {
            DecodedPayload::Pixels(pixels) => {
                assert_eq!(pixels.geometry(), geometry);
                assert_eq!(pixels.as_bytes(), &[9u8; 16]);
            }
            other => panic!("expected pixels, got {other:?}"),
        }

        assert!(matches!(
            process(Bytes::from(vec![9u8; 15]), convention),
            Err(ScreenWireError::SizeMismatch { .. })
        ));
    }

    #[test]
    fn byte_len_reports_payload_size() {
        let decoded = process(Bytes::from_static(JPEG_STUB), PayloadConvention::EncodedImage)
            .unwrap();
        assert_eq!(decoded.byte_len(), JPEG_STUB.len());
    }
}
