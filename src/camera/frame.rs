// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/ppe-monitor

//! Captured frames

use std::io::Cursor;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageReader};

use crate::error::{MonitorError, Result};

/// JPEG quality used when a raw frame has to be encoded
pub const JPEG_QUALITY: u8 = 85;

/// Pixel payload layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEncoding {
    /// Complete JPEG file
    Jpeg,
    /// Packed 8-bit RGB, row-major, no padding
    Rgb8,
}

/// A single captured image. Immutable once built; clones share the pixel buffer.
#[derive(Debug, Clone)]
pub struct Frame {
    data: Bytes,
    width: u32,
    height: u32,
    encoding: FrameEncoding,
    sequence: u64,
    captured_at: DateTime<Utc>,
}

impl Frame {
    /// Wrap a JPEG image, reading its dimensions from the header
    pub fn from_jpeg(data: impl Into<Bytes>, sequence: u64) -> Result<Self> {
        let data = data.into();
        let (width, height) = ImageReader::new(Cursor::new(data.as_ref()))
            .with_guessed_format()
            .map_err(|e| MonitorError::Encoding(e.to_string()))?
            .into_dimensions()?;

        Ok(Self {
            data,
            width,
            height,
            encoding: FrameEncoding::Jpeg,
            sequence,
            captured_at: Utc::now(),
        })
    }

    /// Wrap a packed RGB buffer
    pub fn from_rgb8(width: u32, height: u32, pixels: Vec<u8>, sequence: u64) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if pixels.len() != expected {
            return Err(MonitorError::Encoding(format!(
                "rgb buffer is {} bytes, expected {} for {}x{}",
                pixels.len(),
                expected,
                width,
                height
            )));
        }

        Ok(Self {
            data: Bytes::from(pixels),
            width,
            height,
            encoding: FrameEncoding::Rgb8,
            sequence,
            captured_at: Utc::now(),
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn encoding(&self) -> FrameEncoding {
        self.encoding
    }

    /// Position in the capture order of the camera that produced it
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// JPEG bytes for this frame. Free for JPEG frames; encodes raw ones.
    pub fn to_jpeg(&self) -> Result<Bytes> {
        match self.encoding {
            FrameEncoding::Jpeg => Ok(self.data.clone()),
            FrameEncoding::Rgb8 => {
                let mut out = Vec::with_capacity(self.data.len() / 8);
                JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY).encode(
                    &self.data,
                    self.width,
                    self.height,
                    ExtendedColorType::Rgb8,
                )?;
                Ok(Bytes::from(out))
            }
        }
    }

    /// Like [`Frame::to_jpeg`], moving the encode off the async executor when needed
    pub async fn encode_jpeg(&self) -> Result<Bytes> {
        if self.encoding == FrameEncoding::Jpeg {
            return Ok(self.data.clone());
        }

        let frame = self.clone();
        tokio::task::spawn_blocking(move || frame.to_jpeg())
            .await
            .map_err(|e| MonitorError::Encoding(format!("encoder task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Vec<u8> {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[(x * 8) as u8, (y * 8) as u8, 128]);
            }
        }
        pixels
    }

    #[test]
    fn test_rgb_frame_encodes_to_jpeg() {
        let frame = Frame::from_rgb8(32, 16, gradient(32, 16), 1).unwrap();
        let jpeg = frame.to_jpeg().unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);

        let decoded = Frame::from_jpeg(jpeg, 2).unwrap();
        assert_eq!(decoded.width(), 32);
        assert_eq!(decoded.height(), 16);
        assert_eq!(decoded.encoding(), FrameEncoding::Jpeg);
    }

    #[test]
    fn test_rejects_short_rgb_buffer() {
        assert!(Frame::from_rgb8(4, 4, vec![0; 10], 0).is_err());
    }

    #[test]
    fn test_rejects_garbage_jpeg() {
        assert!(Frame::from_jpeg(vec![1u8, 2, 3, 4], 0).is_err());
    }

    #[tokio::test]
    async fn test_jpeg_frame_passes_through() {
        let jpeg = Frame::from_rgb8(8, 8, gradient(8, 8), 0)
            .unwrap()
            .to_jpeg()
            .unwrap();
        let frame = Frame::from_jpeg(jpeg.clone(), 1).unwrap();
        assert_eq!(frame.encode_jpeg().await.unwrap(), jpeg);
    }
}
