//! End-to-end pipeline demo without camera hardware.
//!
//! A synthetic provider pushes moving-gradient I420 frames through the
//! single-slot feed; the session controller wires them through conversion,
//! normalization and classification, and this binary plays the role of the
//! UI loop, printing every overlay update.
//!
//! With `--manifest` a real ONNX model is loaded via Tract; without it a
//! luma-bucket stub classifier stands in so the demo runs anywhere.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::info;
use signcam_camera::{
    CameraHandle, CameraProvider, FrameImage, FrameProducer, LensFacing, PixelFormat, StreamConfig,
};
use signcam_classify::{Category, Classification, Classifier, ModelManifest, TractClassifier};
use signcam_session::{
    ui_channel, DisplayMetrics, DisplaySurface, PermissionBroker, PermissionOutcome,
    PresentationSink, SessionController, UiUpdate,
};

#[derive(Parser)]
struct CliArgs {
    /// Overlay updates to print before exiting.
    #[arg(long, default_value = "40")]
    updates: usize,

    /// Optional model manifest (JSON); omit to use the stub classifier.
    #[arg(long)]
    manifest: Option<String>,

    /// Synthetic frame width.
    #[arg(long, default_value = "64")]
    width: u32,

    /// Synthetic frame height.
    #[arg(long, default_value = "48")]
    height: u32,
}

/// Camera provider that fabricates I420 frames on its own thread.
struct SyntheticProvider {
    width: u32,
    height: u32,
    stop: Option<Arc<AtomicBool>>,
    bindings: u64,
}

impl SyntheticProvider {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            stop: None,
            bindings: 0,
        }
    }
}

fn synthetic_frame(width: u32, height: u32, seq: u64) -> FrameImage {
    let (w, h) = (width as usize, height as usize);
    let mut data = Vec::with_capacity(w * h * 3 / 2);
    for j in 0..h {
        for i in 0..w {
            data.push(((i + j + seq as usize * 4) % 256) as u8);
        }
    }
    data.resize(w * h * 3 / 2, 128); // neutral chroma
    FrameImage::new(PixelFormat::Yuv420Planar, width, height, data)
        .expect("synthetic payload sized to format")
}

impl CameraProvider for SyntheticProvider {
    fn has_camera(&self, _facing: LensFacing) -> bool {
        true
    }

    fn bind(
        &mut self,
        config: &StreamConfig,
        frames: FrameProducer,
    ) -> signcam_camera::Result<CameraHandle> {
        self.bindings += 1;
        info!("synthetic camera bound: {config:?}");

        let stop = Arc::new(AtomicBool::new(false));
        self.stop = Some(Arc::clone(&stop));
        let (width, height) = (self.width, self.height);
        let rotation = config.rotation_degrees;
        thread::spawn(move || {
            let mut seq = 0u64;
            while !stop.load(Ordering::Relaxed) {
                if frames
                    .offer(Some(synthetic_frame(width, height, seq)), rotation)
                    .is_err()
                {
                    break;
                }
                seq += 1;
                thread::sleep(Duration::from_millis(33));
            }
        });
        Ok(CameraHandle::new(self.bindings))
    }

    fn unbind_all(&mut self) {
        if let Some(stop) = self.stop.take() {
            stop.store(true, Ordering::Relaxed);
        }
    }
}

struct FixedDisplay;

impl DisplaySurface for FixedDisplay {
    fn metrics(&self) -> DisplayMetrics {
        DisplayMetrics {
            width_px: 1080,
            height_px: 1920,
            rotation_degrees: 90,
        }
    }
}

struct AlwaysGranted;

impl PermissionBroker for AlwaysGranted {
    fn is_granted(&self) -> bool {
        true
    }

    fn request(&mut self, on_result: Box<dyn FnOnce(PermissionOutcome) + Send>) {
        on_result(PermissionOutcome::Granted);
    }
}

/// Stand-in classifier: buckets the mean luma into fake gesture classes.
struct LumaClassifier;

impl Classifier for LumaClassifier {
    fn classify(&mut self, image: &image::RgbImage) -> signcam_classify::Result<Classification> {
        let sum: u64 = image.pixels().map(|p| p.0[0] as u64).sum();
        let mean = (sum / (image.width() as u64 * image.height() as u64).max(1)) as u8;
        let (fist, open, none) = match mean {
            0..=85 => (0.8, 0.1, 0.1),
            86..=170 => (0.1, 0.8, 0.1),
            _ => (0.1, 0.1, 0.8),
        };
        Ok(Classification::new(vec![
            Category::new("fist", fist),
            Category::new("open-hand", open),
            Category::new("None", none),
        ]))
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = CliArgs::parse();

    let classifier: Arc<Mutex<dyn Classifier + Send>> = match &args.manifest {
        Some(path) => {
            let manifest = ModelManifest::load(path)?;
            info!(
                "loading model {:?} ({} labels)",
                manifest.model,
                manifest.labels.len()
            );
            Arc::new(Mutex::new(TractClassifier::from_manifest(&manifest)?))
        }
        None => Arc::new(Mutex::new(LumaClassifier)),
    };

    let (ui, updates) = ui_channel();
    let sink = PresentationSink::new(ui);
    let provider = SyntheticProvider::new(args.width, args.height);
    let mut session = SessionController::new(provider, FixedDisplay, classifier, sink);

    session.start(&mut AlwaysGranted)?;
    session.handle_permission_responses()?;

    let mut seen = 0usize;
    while seen < args.updates {
        match updates.recv_timeout(Duration::from_secs(2)) {
            Ok(UiUpdate::SetOverlay(label)) => println!("overlay: {label}"),
            Ok(UiUpdate::ClearOverlay) => println!("overlay: (cleared)"),
            Ok(UiUpdate::Notice(text)) => println!("notice: {text}"),
            Err(_) => anyhow::bail!("pipeline stalled"),
        }
        seen += 1;

        if seen == args.updates / 2 {
            info!("toggling lens mid-run");
            session.toggle_lens()?;
        }
    }

    session.shutdown();
    info!("done after {seen} overlay updates");
    Ok(())
}
