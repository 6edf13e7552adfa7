//! V4L2 camera capture via the `v4l` crate.

use crate::frame::Frame;
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("video capture not supported by device")]
    CaptureNotSupported,
    #[error("capture failed: {0}")]
    CaptureFailed(String),
}

/// Pixel format negotiated with the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NegotiatedFormat {
    /// YUYV 4:2:2 packed, 2 bytes per pixel.
    Yuyv,
    /// Native 8-bit grayscale.
    Grey,
}

/// Requested capture resolution. Drivers may negotiate something else;
/// whatever comes back is what we use.
const REQUEST_WIDTH: u32 = 640;
const REQUEST_HEIGHT: u32 = 480;

/// A V4L2 video capture device.
pub struct Camera {
    device: Device,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    format: NegotiatedFormat,
}

impl Camera {
    /// Open a camera by device path (e.g. "/dev/video0") and negotiate
    /// a YUYV or GREY format.
    pub fn open(device_path: &str) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device
            .query_caps()
            .map_err(|e| CameraError::CaptureFailed(format!("query capabilities: {e}")))?;
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::CaptureNotSupported);
        }

        let mut fmt = device
            .format()
            .map_err(|e| CameraError::FormatNegotiationFailed(format!("get format: {e}")))?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = REQUEST_WIDTH;
        fmt.height = REQUEST_HEIGHT;

        let negotiated = device
            .set_format(&fmt)
            .map_err(|e| CameraError::FormatNegotiationFailed(format!("set format: {e}")))?;

        let format = if negotiated.fourcc == FourCC::new(b"YUYV") {
            NegotiatedFormat::Yuyv
        } else if negotiated.fourcc == FourCC::new(b"GREY") {
            NegotiatedFormat::Grey
        } else {
            return Err(CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format {:?} (need YUYV or GREY)",
                negotiated.fourcc
            )));
        };

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?negotiated.fourcc,
            "camera opened"
        );

        Ok(Self {
            device,
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
            format,
        })
    }

    /// Capture a single grayscale frame.
    pub fn capture(&self) -> Result<Frame, CameraError> {
        let mut stream = MmapStream::with_buffers(&self.device, BufType::VideoCapture, 4)
            .map_err(|e| CameraError::CaptureFailed(format!("mmap stream: {e}")))?;

        let (buf, meta) = stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("dequeue buffer: {e}")))?;

        let frame = match self.format {
            NegotiatedFormat::Yuyv => Frame::from_yuyv(buf, self.width, self.height, meta.sequence),
            NegotiatedFormat::Grey => Frame::from_grey(buf, self.width, self.height, meta.sequence),
        }
        .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;

        Ok(frame)
    }

    /// Discard a handful of frames so auto-gain and auto-exposure can
    /// settle after opening the device.
    pub fn warm_up(&self, frames: usize) {
        if frames == 0 {
            return;
        }
        tracing::info!(count = frames, "discarding warmup frames");
        for _ in 0..frames {
            let _ = self.capture();
        }
    }
}
