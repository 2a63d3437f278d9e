// Single-slot frame feed: producer → channel → analysis worker.
//
// The camera framework's "one frame at a time" delivery contract is made
// explicit here instead of being inherited implicitly: `offer` blocks until
// the previous frame's release hook has run, so at most one unreleased
// frame exists per feed at any moment.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{bounded, Receiver, Sender};
use thiserror::Error;

use crate::{FrameImage, RawFrame};

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("frame feed closed")]
    Closed,
    #[error("previous frame still in flight")]
    Busy,
}

/// Receiving end of a feed; drained serially by the analysis worker.
pub type FrameReceiver = Receiver<RawFrame>;

struct Slot {
    in_flight: Mutex<bool>,
    freed: Condvar,
}

fn lock_in_flight(slot: &Slot) -> MutexGuard<'_, bool> {
    slot.in_flight
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Producing end of a feed, handed to the [`CameraProvider`] on bind.
///
/// [`CameraProvider`]: crate::CameraProvider
pub struct FrameProducer {
    tx: Sender<RawFrame>,
    slot: Arc<Slot>,
}

/// Create a connected producer/receiver pair with a single frame slot.
pub fn frame_feed() -> (FrameProducer, FrameReceiver) {
    let (tx, rx) = bounded(1);
    let slot = Arc::new(Slot {
        in_flight: Mutex::new(false),
        freed: Condvar::new(),
    });
    (FrameProducer { tx, slot }, rx)
}

impl FrameProducer {
    /// Deliver a frame, blocking until the previously offered frame has been
    /// released.  Returns [`FeedError::Closed`] once the receiving side is
    /// gone.
    pub fn offer(&self, image: Option<FrameImage>, rotation_degrees: i32) -> Result<(), FeedError> {
        let mut in_flight = lock_in_flight(&self.slot);
        while *in_flight {
            in_flight = self
                .slot
                .freed
                .wait(in_flight)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *in_flight = true;
        drop(in_flight);
        self.send(image, rotation_degrees)
    }

    /// Non-blocking variant: fails with [`FeedError::Busy`] while a frame is
    /// still unreleased.
    pub fn try_offer(
        &self,
        image: Option<FrameImage>,
        rotation_degrees: i32,
    ) -> Result<(), FeedError> {
        {
            let mut in_flight = lock_in_flight(&self.slot);
            if *in_flight {
                return Err(FeedError::Busy);
            }
            *in_flight = true;
        }
        self.send(image, rotation_degrees)
    }

    fn send(&self, image: Option<FrameImage>, rotation_degrees: i32) -> Result<(), FeedError> {
        let slot = Arc::clone(&self.slot);
        let frame = RawFrame::new(image, rotation_degrees).with_release_hook(Box::new(move || {
            let mut in_flight = lock_in_flight(&slot);
            *in_flight = false;
            slot.freed.notify_one();
        }));
        // A failed send drops the frame, which fires the hook and frees the
        // slot again.
        self.tx.send(frame).map_err(|_| FeedError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PixelFormat;

    fn gray_image(w: u32, h: u32) -> FrameImage {
        let len = PixelFormat::Yuv420Planar.frame_len(w, h).unwrap();
        FrameImage::new(PixelFormat::Yuv420Planar, w, h, vec![128u8; len]).unwrap()
    }

    #[test]
    fn slot_blocks_second_frame_until_release() {
        let (producer, rx) = frame_feed();
        producer.offer(Some(gray_image(4, 4)), 0).unwrap();

        assert!(matches!(
            producer.try_offer(Some(gray_image(4, 4)), 0),
            Err(FeedError::Busy)
        ));

        let frame = rx.recv().unwrap();
        // Still in flight while the worker holds the handle.
        assert!(matches!(
            producer.try_offer(Some(gray_image(4, 4)), 0),
            Err(FeedError::Busy)
        ));

        frame.release();
        producer.try_offer(Some(gray_image(4, 4)), 0).unwrap();
    }

    #[test]
    fn dropped_frame_frees_the_slot() {
        let (producer, rx) = frame_feed();
        producer.offer(None, 90).unwrap();
        drop(rx.recv().unwrap());
        producer.try_offer(None, 90).unwrap();
    }

    #[test]
    fn closed_feed_reports_closed() {
        let (producer, rx) = frame_feed();
        drop(rx);
        assert!(matches!(
            producer.offer(Some(gray_image(4, 4)), 0),
            Err(FeedError::Closed)
        ));
    }

    #[test]
    fn release_hook_fires_exactly_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let count = Arc::new(AtomicUsize::new(0));
        let hook_count = Arc::clone(&count);
        let frame = RawFrame::new(None, 0)
            .with_release_hook(Box::new(move || {
                hook_count.fetch_add(1, Ordering::SeqCst);
            }));
        frame.release();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        let count = Arc::new(AtomicUsize::new(0));
        let hook_count = Arc::clone(&count);
        {
            let _frame = RawFrame::new(None, 0)
                .with_release_hook(Box::new(move || {
                    hook_count.fetch_add(1, Ordering::SeqCst);
                }));
            // Dropped without an explicit release.
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
