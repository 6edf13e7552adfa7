//! Captured frames and pixel-format conversion.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("buffer too short: expected {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },
}

/// Fraction of near-black pixels above which a frame counts as dark.
const DARK_PIXEL_FRACTION: f32 = 0.95;
/// Luma value below which a pixel counts as near-black.
const DARK_PIXEL_CUTOFF: u8 = 32;

/// A captured grayscale camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Grayscale pixel data, `width * height` bytes, row-major.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub sequence: u32,
}

impl Frame {
    /// Build a frame from a packed YUYV 4:2:2 buffer by extracting the
    /// luma channel (every even byte).
    pub fn from_yuyv(buf: &[u8], width: u32, height: u32, sequence: u32) -> Result<Self, FrameError> {
        let expected = (width * height * 2) as usize;
        if buf.len() < expected {
            return Err(FrameError::BufferTooShort {
                expected,
                actual: buf.len(),
            });
        }
        let data = buf[..expected].iter().step_by(2).copied().collect();
        Ok(Self {
            data,
            width,
            height,
            sequence,
        })
    }

    /// Build a frame from a native 8-bit grayscale buffer.
    pub fn from_grey(buf: &[u8], width: u32, height: u32, sequence: u32) -> Result<Self, FrameError> {
        let expected = (width * height) as usize;
        if buf.len() < expected {
            return Err(FrameError::BufferTooShort {
                expected,
                actual: buf.len(),
            });
        }
        Ok(Self {
            data: buf[..expected].to_vec(),
            width,
            height,
            sequence,
        })
    }

    /// True when the frame is almost entirely near-black — a doorbell
    /// camera staring into an unlit night. Such frames carry no usable
    /// signal and are treated as capture failures upstream.
    pub fn is_dark(&self) -> bool {
        if self.data.is_empty() {
            return true;
        }
        let dark = self.data.iter().filter(|&&p| p < DARK_PIXEL_CUTOFF).count();
        (dark as f32 / self.data.len() as f32) > DARK_PIXEL_FRACTION
    }
}
