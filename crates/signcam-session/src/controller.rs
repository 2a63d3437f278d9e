// Camera session lifecycle: permission gate, lens/aspect selection and
// rebinding.  All mutable session state lives in one `SessionState` value
// that the transition methods replace wholesale.

use std::mem;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{error, info, warn};
use signcam_camera::{
    frame_feed, AspectRatio, CameraError, CameraHandle, CameraProvider, LensFacing, StreamConfig,
};
use signcam_classify::Classifier;

use crate::dispatch::{spawn_analysis_worker, FrameDispatcher};
use crate::sink::{PresentationSink, UiUpdate};
use crate::{Result, SessionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    Granted,
    Denied,
}

/// External permission service.  `request` resolves asynchronously through
/// the given callback; the host glue routes the outcome back into
/// [`SessionController::on_permission_result`].
pub trait PermissionBroker {
    fn is_granted(&self) -> bool;

    fn request(&mut self, on_result: Box<dyn FnOnce(PermissionOutcome) + Send>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayMetrics {
    pub width_px: u32,
    pub height_px: u32,
    pub rotation_degrees: i32,
}

/// External display surface; queried for current metrics on every bind.
pub trait DisplaySurface {
    fn metrics(&self) -> DisplayMetrics;
}

/// An active camera binding.  Dropping it detaches the old analysis worker,
/// which drains and exits once the provider releases its producer handle.
pub struct BoundSession {
    pub config: StreamConfig,
    handle: CameraHandle,
    worker: JoinHandle<()>,
}

impl BoundSession {
    pub fn camera_id(&self) -> u64 {
        self.handle.id()
    }
}

pub enum SessionState {
    Uninitialized,
    PermissionPending,
    Bound(BoundSession),
    /// Transient while an existing binding is being torn down and replaced.
    Rebinding,
    /// Permission denied: terminal until a fresh session is started.
    Denied,
}

/// Owns the camera lifecycle around the frame pipeline.
pub struct SessionController<P: CameraProvider, D: DisplaySurface> {
    provider: P,
    display: D,
    classifier: Arc<Mutex<dyn Classifier + Send>>,
    sink: PresentationSink,
    state: SessionState,
    permission_tx: Sender<PermissionOutcome>,
    permission_rx: Receiver<PermissionOutcome>,
}

impl<P: CameraProvider, D: DisplaySurface> SessionController<P, D> {
    pub fn new(
        provider: P,
        display: D,
        classifier: Arc<Mutex<dyn Classifier + Send>>,
        sink: PresentationSink,
    ) -> Self {
        let (permission_tx, permission_rx) = unbounded();
        Self {
            provider,
            display,
            classifier,
            sink,
            state: SessionState::Uninitialized,
            permission_tx,
            permission_rx,
        }
    }

    /// Begin the session: bind immediately when permission is already
    /// granted, otherwise ask the broker and wait for its callback.
    pub fn start(&mut self, broker: &mut dyn PermissionBroker) -> Result<()> {
        if !matches!(self.state, SessionState::Uninitialized) {
            return Ok(());
        }
        if broker.is_granted() {
            self.bind_initial()
        } else {
            self.state = SessionState::PermissionPending;
            let tx = self.permission_tx.clone();
            broker.request(Box::new(move |outcome| {
                let _ = tx.send(outcome);
            }));
            Ok(())
        }
    }

    /// Drain permission responses queued by the broker callback.  Call from
    /// the UI loop.
    pub fn handle_permission_responses(&mut self) -> Result<()> {
        while let Ok(outcome) = self.permission_rx.try_recv() {
            self.on_permission_result(outcome)?;
        }
        Ok(())
    }

    pub fn on_permission_result(&mut self, outcome: PermissionOutcome) -> Result<()> {
        if !matches!(self.state, SessionState::PermissionPending) {
            return Ok(());
        }
        match outcome {
            PermissionOutcome::Granted => self.bind_initial(),
            PermissionOutcome::Denied => {
                warn!("camera permission denied, camera will not start");
                self.sink
                    .scheduler()
                    .post(UiUpdate::Notice("Camera permission denied.".into()));
                self.state = SessionState::Denied;
                Ok(())
            }
        }
    }

    /// Whether both lenses exist, i.e. whether a toggle control makes sense.
    pub fn can_toggle_lens(&self) -> bool {
        self.provider.has_camera(LensFacing::Front) && self.provider.has_camera(LensFacing::Back)
    }

    /// Switch between front and back camera, rebuilding the whole binding.
    pub fn toggle_lens(&mut self) -> Result<()> {
        let current = self.bound_lens().ok_or(SessionError::NotBound)?;
        let next = current.toggled();
        if !self.provider.has_camera(next) {
            return Err(SessionError::LensUnavailable);
        }
        self.rebind(next)
    }

    /// React to a display rotation/size change: same lens, fresh aspect
    /// ratio and rotation target.
    pub fn on_display_changed(&mut self) -> Result<()> {
        let lens = self.bound_lens().ok_or(SessionError::NotBound)?;
        self.rebind(lens)
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.state, SessionState::Bound(_))
    }

    pub fn config(&self) -> Option<&StreamConfig> {
        match &self.state {
            SessionState::Bound(bound) => Some(&bound.config),
            _ => None,
        }
    }

    /// Unbind and wait for the analysis worker to drain.
    pub fn shutdown(&mut self) {
        self.provider.unbind_all();
        if let SessionState::Bound(bound) = mem::replace(&mut self.state, SessionState::Uninitialized)
        {
            if bound.worker.join().is_err() {
                warn!("analysis worker panicked");
            }
        }
    }

    fn bound_lens(&self) -> Option<LensFacing> {
        match &self.state {
            SessionState::Bound(bound) => Some(bound.config.lens_facing),
            _ => None,
        }
    }

    fn bind_initial(&mut self) -> Result<()> {
        let lens = self.initial_lens()?;
        self.bind_with(lens)
    }

    /// Initial lens policy: prefer the front camera, fall back to the back
    /// camera, fail fatally when the device has neither.
    fn initial_lens(&self) -> Result<LensFacing> {
        if self.provider.has_camera(LensFacing::Front) {
            Ok(LensFacing::Front)
        } else if self.provider.has_camera(LensFacing::Back) {
            Ok(LensFacing::Back)
        } else {
            error!("no camera device found");
            Err(CameraError::NoCamera.into())
        }
    }

    fn rebind(&mut self, lens: LensFacing) -> Result<()> {
        // The outgoing worker may still publish one in-flight result after
        // this point; that bounded staleness is accepted.
        let _prev = mem::replace(&mut self.state, SessionState::Rebinding);
        self.bind_with(lens)
    }

    fn bind_with(&mut self, lens: LensFacing) -> Result<()> {
        let metrics = self.display.metrics();
        let config = StreamConfig {
            lens_facing: lens,
            aspect_ratio: AspectRatio::from_screen(metrics.width_px, metrics.height_px),
            rotation_degrees: metrics.rotation_degrees,
        };

        self.provider.unbind_all();

        // Fresh feed + dispatcher per binding: pixel buffer and rotation
        // transform start over.
        let (producer, frames) = frame_feed();
        let classifier = Arc::clone(&self.classifier);
        let sink = self.sink.clone();
        let dispatcher = FrameDispatcher::new(Box::new(move |bitmap| {
            let result = {
                let mut model = classifier.lock().unwrap_or_else(PoisonError::into_inner);
                model.classify(&bitmap)
            };
            match result {
                Ok(classification) => sink.publish(classification),
                Err(err) => warn!("classification failed: {err}"),
            }
        }));
        let worker = spawn_analysis_worker(frames, dispatcher);

        match self.provider.bind(&config, producer) {
            Ok(handle) => {
                info!(
                    "camera bound: {:?} {:?}, rotation {}°",
                    config.lens_facing, config.aspect_ratio, config.rotation_degrees
                );
                self.state = SessionState::Bound(BoundSession {
                    config,
                    handle,
                    worker,
                });
                Ok(())
            }
            Err(err) => {
                error!("camera bind failed: {err}");
                self.state = SessionState::Uninitialized;
                Err(err.into())
            }
        }
    }
}
