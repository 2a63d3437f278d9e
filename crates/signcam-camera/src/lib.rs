//! signcam – camera contract layer
//!
//! This crate defines the frame-side vocabulary of the pipeline: the planar
//! YUV payload delivered by a camera stream ([`FrameImage`]), the opaque
//! per-frame handle that must be returned to the stream exactly once
//! ([`RawFrame`]), and the explicit single-slot feed that carries frames to
//! the analysis worker while preserving the at-most-one-in-flight guarantee
//! ([`frame_feed`]).
//!
//! The camera hardware itself is an external collaborator.  It is reached
//! through the [`CameraProvider`] trait, which a host platform (or a test
//! stub) implements; this crate never links a capture backend.

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod feed;
pub use feed::{frame_feed, FeedError, FrameProducer, FrameReceiver};

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("no camera device found")]
    NoCamera,
    #[error("camera bind failed: {0}")]
    Bind(String),
    #[error("{format:?} frame at {width}x{height} needs {expected} bytes, payload has {actual}")]
    PayloadSize {
        format: PixelFormat,
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

pub type Result<T> = std::result::Result<T, CameraError>;

/// Sensor pixel encodings a stream may deliver.
///
/// The converter downstream only understands the planar luma/chroma
/// encodings; anything else is skipped per frame rather than treated as
/// fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// I420: full Y plane, then quarter-size U and V planes.
    Yuv420Planar,
    /// NV12: full Y plane, then one interleaved UV plane.
    Nv12,
    /// Compressed frames, not decodable by the YUV converter.
    Mjpeg,
}

impl PixelFormat {
    /// Payload size in bytes for a W×H frame, or `None` when the encoding
    /// has no fixed size (compressed formats).
    pub fn frame_len(self, width: u32, height: u32) -> Option<usize> {
        match self {
            PixelFormat::Yuv420Planar | PixelFormat::Nv12 => {
                Some((width as usize * height as usize * 3) / 2)
            }
            PixelFormat::Mjpeg => None,
        }
    }
}

/// One camera-delivered image: encoding, dimensions and the raw bytes.
#[derive(Debug, Clone)]
pub struct FrameImage {
    format: PixelFormat,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl FrameImage {
    /// Wrap a payload, validating its size against the encoding.  Compressed
    /// formats carry variable payloads and are accepted as-is.
    pub fn new(format: PixelFormat, width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if let Some(expected) = format.frame_len(width, height) {
            if data.len() != expected {
                return Err(CameraError::PayloadSize {
                    format,
                    width,
                    height,
                    expected,
                    actual: data.len(),
                });
            }
        }
        Ok(Self {
            format,
            width,
            height,
            data,
        })
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Luma plane (first W×H bytes of a planar payload).
    pub fn y_plane(&self) -> &[u8] {
        let len = self.width as usize * self.height as usize;
        &self.data[..len.min(self.data.len())]
    }

    /// Chroma bytes following the luma plane.  Layout depends on
    /// [`PixelFormat`]: planar U then V for I420, interleaved UV for NV12.
    pub fn chroma(&self) -> &[u8] {
        let len = self.width as usize * self.height as usize;
        &self.data[len.min(self.data.len())..]
    }
}

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// Opaque handle to one in-flight camera frame.
///
/// The stream will not deliver another frame until this one has been
/// released, so the holder must return it on every exit path.  Release is
/// exactly-once by construction: [`RawFrame::release`] consumes the handle,
/// and `Drop` fires the hook if nothing else did (covering early returns and
/// panic unwinding in the analysis path).
pub struct RawFrame {
    image: Option<FrameImage>,
    rotation_degrees: i32,
    hook: Option<ReleaseHook>,
}

impl RawFrame {
    /// `image` may be `None`: a stream tearing down can still flush a handle
    /// that no longer carries a decodable image.
    pub fn new(image: Option<FrameImage>, rotation_degrees: i32) -> Self {
        Self {
            image,
            rotation_degrees,
            hook: None,
        }
    }

    /// Attach the hook that returns the underlying buffer to the stream.
    pub fn with_release_hook(mut self, hook: ReleaseHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Rotation to apply so the image displays upright, as reported by the
    /// sensor metadata.
    pub fn rotation_degrees(&self) -> i32 {
        self.rotation_degrees
    }

    pub fn image(&self) -> Option<&FrameImage> {
        self.image.as_ref()
    }

    /// Take ownership of the image, leaving the handle releasable.
    pub fn take_image(&mut self) -> Option<FrameImage> {
        self.image.take()
    }

    /// Return the frame to the camera stream.
    pub fn release(self) {
        // Drop fires the hook.
    }
}

impl Drop for RawFrame {
    fn drop(&mut self) {
        if let Some(hook) = self.hook.take() {
            hook();
        }
    }
}

/// Which way the selected camera points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LensFacing {
    Front,
    Back,
}

impl LensFacing {
    pub fn toggled(self) -> Self {
        match self {
            LensFacing::Front => LensFacing::Back,
            LensFacing::Back => LensFacing::Front,
        }
    }
}

/// Target aspect ratio for the preview and analysis streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    FourThree,
    SixteenNine,
}

impl AspectRatio {
    pub fn ratio(self) -> f64 {
        match self {
            AspectRatio::FourThree => 4.0 / 3.0,
            AspectRatio::SixteenNine => 16.0 / 9.0,
        }
    }

    /// Pick the ratio closest to the screen's long/short edge ratio.
    /// A tie favors 4:3.
    pub fn from_screen(width_px: u32, height_px: u32) -> Self {
        let long = width_px.max(height_px) as f64;
        let short = width_px.min(height_px).max(1) as f64;
        let screen = long / short;
        if (screen - AspectRatio::FourThree.ratio()).abs()
            <= (screen - AspectRatio::SixteenNine.ratio()).abs()
        {
            AspectRatio::FourThree
        } else {
            AspectRatio::SixteenNine
        }
    }
}

/// Stream selection the controller hands to the provider on every (re)bind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub lens_facing: LensFacing,
    pub aspect_ratio: AspectRatio,
    pub rotation_degrees: i32,
}

/// Token held while a camera session is bound.
#[derive(Debug)]
pub struct CameraHandle {
    id: u64,
}

impl CameraHandle {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// External camera service.
///
/// Implementations own the hardware side of the feed: after `bind` they push
/// frames through the given [`FrameProducer`] (blocking between frames until
/// the previous one is released) and must drop the producer on `unbind_all`
/// so the analysis worker drains and exits.
pub trait CameraProvider {
    fn has_camera(&self, facing: LensFacing) -> bool;

    fn bind(&mut self, config: &StreamConfig, frames: FrameProducer) -> Result<CameraHandle>;

    fn unbind_all(&mut self);
}
