//! signcam – session layer.
//!
//! Ties the leaf crates into the running pipeline: the [`FrameDispatcher`]
//! drains the single-slot feed on a dedicated worker thread, classified
//! results cross back to the UI context through the [`UiScheduler`], and the
//! [`SessionController`] owns the camera lifecycle (permission gate, lens
//! and aspect-ratio selection, rebinding on lens toggles and display
//! changes).

use thiserror::Error;

mod controller;
mod dispatch;
mod sink;

pub use controller::{
    BoundSession, DisplayMetrics, DisplaySurface, PermissionBroker, PermissionOutcome,
    SessionController, SessionState,
};
pub use dispatch::{spawn_analysis_worker, BitmapListener, FrameDispatcher};
pub use sink::{ui_channel, PresentationSink, UiScheduler, UiUpdate, UiUpdates};

pub use signcam_camera::StreamConfig as SessionConfig;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Camera(#[from] signcam_camera::CameraError),
    #[error("session is not bound")]
    NotBound,
    #[error("requested lens is not available")]
    LensUnavailable,
}

pub type Result<T> = std::result::Result<T, SessionError>;
