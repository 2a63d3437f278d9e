//! signcam – classification layer.
//!
//! A backend-agnostic [`Classifier`] trait plus a concrete
//! [`TractClassifier`] that runs a hand-sign image-classification model via
//! Tract (pure Rust, no C deps).  Swapping in another engine is a matter of
//! implementing the trait – the outer API stays identical.
//!
//! Input bitmaps come from the frame normalizer (upright RGB).  Output is a
//! [`Classification`]: one score per label, unique by label, in model output
//! order.  It is *not* sorted – consumers rank it via
//! [`Classification::into_top`] before reading the best entry.

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use resize::{Pixel, Type};
use rgb::FromSlice;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tract_onnx::prelude::*;

#[derive(Error, Debug)]
pub enum ClassifyError {
    #[error("model load or inference failed: {0}")]
    Model(#[from] TractError),
    #[error("manifest read failed: {0}")]
    ManifestIo(#[from] std::io::Error),
    #[error("manifest parse failed: {0}")]
    ManifestParse(#[from] serde_json::Error),
    #[error("model emitted {outputs} scores for {labels} labels")]
    LabelMismatch { outputs: usize, labels: usize },
    #[error("input resize failed: {0}")]
    Resize(#[from] resize::Error),
}

pub type Result<T> = std::result::Result<T, ClassifyError>;

/// One (label, confidence) pair.  Scores are the model's probability
/// outputs in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub label: String,
    pub score: f32,
}

impl Category {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// An unranked classification result.
#[derive(Debug, Clone, Default)]
pub struct Classification {
    categories: Vec<Category>,
}

impl Classification {
    pub fn new(categories: Vec<Category>) -> Self {
        Self { categories }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Categories sorted descending by score (stable, so equal scores keep
    /// model output order).
    pub fn into_ranked(mut self) -> Vec<Category> {
        self.categories.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        self.categories
    }

    /// The highest-scoring category, or `None` for an empty result.
    pub fn into_top(self) -> Option<Category> {
        self.into_ranked().into_iter().next()
    }
}

/// Image classifier over upright RGB bitmaps.
///
/// `&mut self` because the underlying model resource is not guaranteed
/// reentrant; the frame dispatcher only ever calls this from its single
/// worker context, and any shared use must serialize access externally.
pub trait Classifier {
    fn classify(&mut self, image: &RgbImage) -> Result<Classification>;
}

/// Description of a bundled model: where the graph lives, its label set,
/// the square input edge it expects and the thread-parallelism hint fixed
/// at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelManifest {
    pub model: PathBuf,
    pub labels: Vec<String>,
    #[serde(default = "default_input_edge")]
    pub input_edge: u32,
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
}

fn default_input_edge() -> u32 {
    224
}

fn default_num_threads() -> usize {
    num_cpus::get().min(4)
}

impl ModelManifest {
    /// Load a JSON manifest; a relative model path is resolved against the
    /// manifest's own directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let mut manifest: ModelManifest = serde_json::from_str(&text)?;
        if manifest.model.is_relative() {
            if let Some(dir) = path.parent() {
                manifest.model = dir.join(&manifest.model);
            }
        }
        Ok(manifest)
    }
}

/// Tract-powered classifier backend.
pub struct TractClassifier {
    model: RunnableModel<TypedFact, Box<dyn TypedOp>, TypedModel>,
    labels: Vec<String>,
    input_edge: u32,
    num_threads: usize,
}

impl TractClassifier {
    /// Load and optimize the ONNX graph, preparing it for inference.
    pub fn new(
        model_path: impl AsRef<Path>,
        labels: Vec<String>,
        input_edge: u32,
        num_threads: usize,
    ) -> Result<Self> {
        let edge = input_edge as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec![1, 3, edge, edge]),
            )?
            .into_optimized()?
            .into_runnable()?;

        Ok(Self {
            model,
            labels,
            input_edge,
            num_threads,
        })
    }

    pub fn from_manifest(manifest: &ModelManifest) -> Result<Self> {
        Self::new(
            &manifest.model,
            manifest.labels.clone(),
            manifest.input_edge,
            manifest.num_threads,
        )
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// The construction-time parallelism hint.  Tract runs a plan
    /// single-threaded, so this backend records the hint without acting on
    /// it; backends with intra-op parallelism consume it.
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    fn resize_input(&self, image: &RgbImage) -> Result<Vec<u8>> {
        let edge = self.input_edge as usize;
        let mut dst = vec![0u8; edge * edge * 3];
        let mut resizer = resize::new(
            image.width() as usize,
            image.height() as usize,
            edge,
            edge,
            Pixel::RGB8,
            Type::Lanczos3,
        )?;
        resizer.resize(image.as_raw().as_rgb(), dst.as_rgb_mut())?;
        Ok(dst)
    }
}

impl Classifier for TractClassifier {
    fn classify(&mut self, image: &RgbImage) -> Result<Classification> {
        let edge = self.input_edge as usize;
        let rgb = self.resize_input(image)?;

        let tensor: Tensor =
            tract_ndarray::Array4::from_shape_fn((1, 3, edge, edge), |(_, c, y, x)| {
                rgb[(y * edge + x) * 3 + c] as f32 / 255.0
            })
            .into();

        let outputs = self.model.run(tvec![tensor.into()])?;
        let scores = outputs[0].to_array_view::<f32>()?;
        let scores: Vec<f32> = scores.iter().copied().collect();

        if scores.len() != self.labels.len() {
            return Err(ClassifyError::LabelMismatch {
                outputs: scores.len(),
                labels: self.labels.len(),
            });
        }

        let categories = self
            .labels
            .iter()
            .zip(scores)
            .map(|(label, score)| Category::new(label.clone(), score))
            .collect();
        Ok(Classification::new(categories))
    }
}
