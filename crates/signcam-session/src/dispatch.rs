// Per-frame orchestration: extract → convert/normalize → listener → release.

use std::thread;

use image::RgbImage;
use log::{debug, warn};
use signcam_camera::{FrameReceiver, RawFrame};
use signcam_frame::{FrameNormalizer, YuvToRgbConverter};

/// Receives each upright bitmap; 0 or 1 invocations per analyzed frame.
pub type BitmapListener = Box<dyn FnMut(RgbImage) + Send>;

/// Analyzes camera frames in arrival order.
///
/// One dispatcher per camera binding: its converter, pixel buffer and
/// rotation transform live exactly as long as the binding, and the session
/// controller builds a fresh one on every rebind.
pub struct FrameDispatcher {
    converter: YuvToRgbConverter,
    normalizer: FrameNormalizer,
    listener: BitmapListener,
}

impl FrameDispatcher {
    pub fn new(listener: BitmapListener) -> Self {
        Self {
            converter: YuvToRgbConverter::new(),
            normalizer: FrameNormalizer::new(),
            listener,
        }
    }

    /// Process one frame.  The frame is released on every exit path; the
    /// listener fires at most once.
    ///
    /// A handle without an image (stream teardown race) is released
    /// silently.  A conversion failure is logged and the frame skipped –
    /// per-frame trouble must never propagate up and tear down the live
    /// session.
    pub fn analyze(&mut self, mut frame: RawFrame) {
        if let Some(bitmap) = self.to_bitmap(&mut frame) {
            (self.listener)(bitmap);
        }
        frame.release();
    }

    fn to_bitmap(&mut self, frame: &mut RawFrame) -> Option<RgbImage> {
        let image = frame.take_image()?;
        match self
            .normalizer
            .normalize(&mut self.converter, &image, frame.rotation_degrees())
        {
            Ok(bitmap) => Some(bitmap),
            Err(err) => {
                warn!("frame skipped: {err}");
                None
            }
        }
    }

    /// Rotation setup count of the underlying normalizer (once per
    /// dispatcher lifetime in steady state).
    pub fn rotation_setups(&self) -> u32 {
        self.normalizer.rotation_setups()
    }
}

/// Spawn the dedicated single-worker context that drains a feed.
///
/// Frames arrive serially (the feed admits one unreleased frame at a time),
/// so no further synchronization exists inside the dispatcher chain.  The
/// worker exits once every producer handle is dropped.
pub fn spawn_analysis_worker(
    frames: FrameReceiver,
    mut dispatcher: FrameDispatcher,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while let Ok(frame) = frames.recv() {
            dispatcher.analyze(frame);
        }
        debug!("analysis worker shutting down");
    })
}
