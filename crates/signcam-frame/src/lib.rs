//! signcam – per-frame pixel transforms.
//!
//! Two pieces live here.  [`YuvToRgbConverter`] turns one planar-YUV camera
//! frame into an RGB buffer of identical dimensions (BT.601, full range).
//! [`FrameNormalizer`] owns the buffer reuse and upright-rotation step on
//! top of it: the output bitmap is the converted frame with the sensor's
//! reported rotation applied, ready for classification or display.

use image::RgbImage;
use log::warn;
use signcam_camera::{FrameImage, PixelFormat};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("unsupported pixel format {0:?}")]
    UnsupportedFormat(PixelFormat),
    #[error("frame dimensions {width}x{height} must be even")]
    OddDimensions { width: u32, height: u32 },
}

pub type Result<T> = std::result::Result<T, ConvertError>;

/// Reusable YUV → RGB conversion context.
///
/// Stateless per frame; one instance is constructed per dispatcher and
/// reused for every frame it analyzes.
#[derive(Debug, Default)]
pub struct YuvToRgbConverter {
    _private: (),
}

impl YuvToRgbConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert `frame` into `out`, which must already be sized W×H.
    ///
    /// Only the planar luma/chroma encodings are decodable; anything else is
    /// [`ConvertError::UnsupportedFormat`], which callers treat as a skipped
    /// frame rather than a fatal condition.
    pub fn convert(&mut self, frame: &FrameImage, out: &mut RgbImage) -> Result<()> {
        let (w, h) = (frame.width(), frame.height());
        if w % 2 != 0 || h % 2 != 0 {
            return Err(ConvertError::OddDimensions {
                width: w,
                height: h,
            });
        }
        debug_assert_eq!((out.width(), out.height()), (w, h));

        let (w, h) = (w as usize, h as usize);
        let y = frame.y_plane();
        let chroma = frame.chroma();
        let rgb: &mut [u8] = out;

        match frame.format() {
            PixelFormat::Yuv420Planar => {
                let (u, v) = chroma.split_at(w * h / 4);
                i420_to_rgb(y, u, v, w, h, rgb);
                Ok(())
            }
            PixelFormat::Nv12 => {
                nv12_to_rgb(y, chroma, w, h, rgb);
                Ok(())
            }
            other => Err(ConvertError::UnsupportedFormat(other)),
        }
    }
}

#[inline]
fn pack(y: f32, u: f32, v: f32, out: &mut [u8], base: usize) {
    let r = (y + 1.402 * v).clamp(0.0, 255.0);
    let g = (y - 0.344_13 * u - 0.714_14 * v).clamp(0.0, 255.0);
    let b = (y + 1.772 * u).clamp(0.0, 255.0);
    out[base] = r as u8;
    out[base + 1] = g as u8;
    out[base + 2] = b as u8;
}

/// I420 4:2:0 → RGB24 (BT.601, full range).
fn i420_to_rgb(y: &[u8], u: &[u8], v: &[u8], w: usize, h: usize, out: &mut [u8]) {
    for j in 0..h {
        for i in 0..w {
            let y_val = y[j * w + i] as f32;
            let c_idx = (j / 2) * (w / 2) + i / 2;
            let u_val = u[c_idx] as f32 - 128.0;
            let v_val = v[c_idx] as f32 - 128.0;
            pack(y_val, u_val, v_val, out, (j * w + i) * 3);
        }
    }
}

/// NV12 4:2:0 → RGB24 (BT.601, full range).
fn nv12_to_rgb(y: &[u8], uv: &[u8], w: usize, h: usize, out: &mut [u8]) {
    for j in 0..h {
        for i in 0..w {
            let y_val = y[j * w + i] as f32;
            let uv_idx = (j / 2) * w + (i & !1);
            let u_val = uv[uv_idx] as f32 - 128.0;
            let v_val = uv[uv_idx + 1] as f32 - 128.0;
            pack(y_val, u_val, v_val, out, (j * w + i) * 3);
        }
    }
}

/// Upright-rotation transform, computed once per normalizer setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    /// Quadrant rotation from the sensor's degrees metadata.  Camera
    /// metadata is quadrant-valued; anything else falls back to 0° with a
    /// warning rather than dropping the frame.
    pub fn from_degrees(degrees: i32) -> Self {
        match degrees.rem_euclid(360) {
            0 => Rotation::R0,
            90 => Rotation::R90,
            180 => Rotation::R180,
            270 => Rotation::R270,
            other => {
                warn!("non-quadrant rotation {other}°, treating as 0°");
                Rotation::R0
            }
        }
    }

    /// 90° and 270° swap the output's width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(self, Rotation::R90 | Rotation::R270)
    }

    /// Produce a new rotated image; `src` is left untouched.
    pub fn apply(self, src: &RgbImage) -> RgbImage {
        match self {
            Rotation::R0 => src.clone(),
            Rotation::R90 => image::imageops::rotate90(src),
            Rotation::R180 => image::imageops::rotate180(src),
            Rotation::R270 => image::imageops::rotate270(src),
        }
    }
}

enum NormalizerState {
    Uninitialized,
    Ready { buffer: RgbImage, rotation: Rotation },
}

/// Converts frames into a reused RGB buffer and applies the upright
/// rotation.
///
/// The buffer and rotation are set up on the first frame and reused for the
/// dispatcher's whole lifetime; a rotation change therefore requires a fresh
/// dispatcher (the session controller rebuilds one on every rebind).  A
/// dimension change mid-stream re-runs the setup.
pub struct FrameNormalizer {
    state: NormalizerState,
    rotation_setups: u32,
}

impl FrameNormalizer {
    pub fn new() -> Self {
        Self {
            state: NormalizerState::Uninitialized,
            rotation_setups: 0,
        }
    }

    /// Convert and rotate one frame.  Output dimensions are the frame's,
    /// swapped for 90°/270° rotations.
    pub fn normalize(
        &mut self,
        converter: &mut YuvToRgbConverter,
        frame: &FrameImage,
        rotation_degrees: i32,
    ) -> Result<RgbImage> {
        let needs_setup = match &self.state {
            NormalizerState::Uninitialized => true,
            NormalizerState::Ready { buffer, .. } => {
                buffer.width() != frame.width() || buffer.height() != frame.height()
            }
        };
        if needs_setup {
            self.state = NormalizerState::Ready {
                buffer: RgbImage::new(frame.width(), frame.height()),
                rotation: Rotation::from_degrees(rotation_degrees),
            };
            self.rotation_setups += 1;
        }

        match &mut self.state {
            NormalizerState::Ready { buffer, rotation } => {
                converter.convert(frame, buffer)?;
                Ok(rotation.apply(buffer))
            }
            NormalizerState::Uninitialized => unreachable!("set up above"),
        }
    }

    /// How many times the rotation transform has been (re)computed.
    pub fn rotation_setups(&self) -> u32 {
        self.rotation_setups
    }
}

impl Default for FrameNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_quadrant_degrees_fall_back() {
        assert_eq!(Rotation::from_degrees(45), Rotation::R0);
        assert_eq!(Rotation::from_degrees(-90), Rotation::R270);
        assert_eq!(Rotation::from_degrees(450), Rotation::R90);
    }
}
