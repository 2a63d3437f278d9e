// Worker → UI handoff and the overlay-text presentation policy.

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::debug;
use signcam_classify::Classification;

/// Messages crossing from the analysis worker to the UI context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiUpdate {
    /// Show a recognized gesture label.
    SetOverlay(String),
    /// Blank the overlay (no gesture, or an empty result).
    ClearOverlay,
    /// One-shot user-visible message (permission denial and the like).
    Notice(String),
}

/// Fire-and-forget submission handle for the UI context.
///
/// Delivery is at-least-once while the UI end is alive; there is no
/// acknowledgment and no backpressure – the UI side coalesces however it
/// renders.  Updates posted after the receiver is gone are dropped.
#[derive(Clone)]
pub struct UiScheduler {
    tx: Sender<UiUpdate>,
}

/// Receiving end, drained by the host's UI loop.
pub type UiUpdates = Receiver<UiUpdate>;

pub fn ui_channel() -> (UiScheduler, UiUpdates) {
    let (tx, rx) = unbounded();
    (UiScheduler { tx }, rx)
}

impl UiScheduler {
    pub fn post(&self, update: UiUpdate) {
        if self.tx.send(update).is_err() {
            debug!("ui receiver gone, update dropped");
        }
    }
}

/// Turns classification results into overlay updates.
///
/// Ranks the result descending by score and reads the top entry: the
/// sentinel label (the model's "no gesture" class) and the empty result
/// both clear the overlay, anything else becomes the displayed text.
#[derive(Clone)]
pub struct PresentationSink {
    ui: UiScheduler,
    sentinel: String,
}

impl PresentationSink {
    /// Default sentinel is the model's `"None"` class.
    pub fn new(ui: UiScheduler) -> Self {
        Self::with_sentinel(ui, "None")
    }

    pub fn with_sentinel(ui: UiScheduler, sentinel: impl Into<String>) -> Self {
        Self {
            ui,
            sentinel: sentinel.into(),
        }
    }

    /// The underlying UI submission handle, for out-of-band notices.
    pub fn scheduler(&self) -> &UiScheduler {
        &self.ui
    }

    pub fn publish(&self, result: Classification) {
        match result.into_top() {
            Some(top) if top.label != self.sentinel => {
                self.ui.post(UiUpdate::SetOverlay(top.label));
            }
            _ => self.ui.post(UiUpdate::ClearOverlay),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signcam_classify::Category;

    fn result(pairs: &[(&str, f32)]) -> Classification {
        Classification::new(pairs.iter().map(|(l, s)| Category::new(*l, *s)).collect())
    }

    #[test]
    fn sentinel_top_clears_overlay() {
        let (ui, updates) = ui_channel();
        let sink = PresentationSink::new(ui);
        sink.publish(result(&[("A", 0.2), ("None", 0.9), ("B", 0.5)]));
        assert_eq!(updates.try_recv().unwrap(), UiUpdate::ClearOverlay);
    }

    #[test]
    fn gesture_top_sets_overlay() {
        let (ui, updates) = ui_channel();
        let sink = PresentationSink::new(ui);
        sink.publish(result(&[("wave", 0.95), ("None", 0.1)]));
        assert_eq!(
            updates.try_recv().unwrap(),
            UiUpdate::SetOverlay("wave".into())
        );
    }

    #[test]
    fn empty_result_clears_overlay() {
        let (ui, updates) = ui_channel();
        let sink = PresentationSink::new(ui);
        sink.publish(result(&[]));
        assert_eq!(updates.try_recv().unwrap(), UiUpdate::ClearOverlay);
    }

    #[test]
    fn custom_sentinel() {
        let (ui, updates) = ui_channel();
        let sink = PresentationSink::with_sentinel(ui, "background");
        sink.publish(result(&[("background", 0.8), ("fist", 0.2)]));
        assert_eq!(updates.try_recv().unwrap(), UiUpdate::ClearOverlay);
    }

    #[test]
    fn posting_without_receiver_does_not_panic() {
        let (ui, updates) = ui_channel();
        drop(updates);
        ui.post(UiUpdate::ClearOverlay);
    }
}
