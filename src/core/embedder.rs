//! ONNX Runtime feature extractor.
//!
//! Wraps a frozen pretrained network behind the [`ImageEmbedder`] trait. The
//! embedding is read from a named intermediate activation rather than the
//! network's final classification layer. A small pool of sessions checked
//! out round-robin keeps concurrent predictions from serializing on one
//! session lock.

use crate::core::config::ExtractorConfig;
use crate::core::errors::{ClassifyError, ClassifyResult, SimpleError};
use crate::core::traits::ImageEmbedder;
use crate::processors::ImagePreprocessor;
use image::RgbImage;
use ndarray::{Array2, ArrayView2};
use ort::logging::LogLevel;
use ort::session::Session;
use ort::value::TensorRef;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Feature extractor backed by an ONNX Runtime session pool.
pub struct OrtEmbedder {
    sessions: Vec<Mutex<Session>>,
    next_idx: AtomicUsize,
    preprocessor: ImagePreprocessor,
    input_name: String,
    output_name: String,
    embedding_dim: usize,
    model_name: String,
}

impl std::fmt::Debug for OrtEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtEmbedder")
            .field("sessions", &self.sessions.len())
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("embedding_dim", &self.embedding_dim)
            .field("model_name", &self.model_name)
            .finish()
    }
}

impl OrtEmbedder {
    /// Loads the extractor network described by the configuration.
    ///
    /// The network weights are frozen; this type performs no training.
    ///
    /// # Errors
    ///
    /// Returns a session error if the model file cannot be loaded or is not
    /// a valid ONNX graph.
    pub fn from_config(config: &ExtractorConfig) -> ClassifyResult<Self> {
        config.validate()?;
        let preprocessor = ImagePreprocessor::from_config(config)?;

        let pool_size = config.session_pool_size.max(1);
        let mut sessions = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            let session = Session::builder()?
                .with_log_level(LogLevel::Error)?
                .commit_from_file(&config.model_path)
                .map_err(|e| {
                    ClassifyError::embedding(
                        &config.model_path.display().to_string(),
                        "failed to create ONNX session; verify the model path and file",
                        e,
                    )
                })?;
            sessions.push(Mutex::new(session));
        }

        let model_name = config
            .model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("extractor")
            .to_string();

        tracing::info!(
            "loaded extractor '{}' ({} session(s), embedding dim {})",
            model_name,
            pool_size,
            config.embedding_dim
        );

        Ok(Self {
            sessions,
            next_idx: AtomicUsize::new(0),
            preprocessor,
            input_name: config.input_name.clone(),
            output_name: config.output_name.clone(),
            embedding_dim: config.embedding_dim,
            model_name,
        })
    }

    /// Returns the extractor model name.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    fn run_session(&self, batch: &crate::core::Tensor4D) -> ClassifyResult<Array2<f32>> {
        let batch_size = batch.shape()[0];

        let input_tensor = TensorRef::from_array_view(batch.view()).map_err(|e| {
            ClassifyError::embedding(
                &self.model_name,
                &format!(
                    "failed to convert input tensor with shape {:?}",
                    batch.shape()
                ),
                e,
            )
        })?;
        let inputs = ort::inputs![self.input_name.as_str() => input_tensor];

        let idx = self.next_idx.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[idx].lock().map_err(|_| {
            ClassifyError::embedding(
                &self.model_name,
                &format!("failed to acquire session lock {}/{}", idx, self.sessions.len()),
                SimpleError::new("session lock poisoned"),
            )
        })?;

        let outputs = session.run(inputs).map_err(|e| {
            ClassifyError::embedding(
                &self.model_name,
                &format!(
                    "forward pass failed with input '{}' -> output '{}'",
                    self.input_name, self.output_name
                ),
                e,
            )
        })?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            ClassifyError::schema_mismatch(format!(
                "model '{}' has no output named '{}'",
                self.model_name, self.output_name
            ))
        })?;
        let (output_shape, output_data) = output.try_extract_tensor::<f32>().map_err(|e| {
            ClassifyError::embedding(
                &self.model_name,
                &format!("failed to extract output tensor '{}' as f32", self.output_name),
                e,
            )
        })?;

        // The embedding layer must yield one fixed-length row per image.
        if output_shape.len() != 2 || output_shape[0] as usize != batch_size {
            return Err(ClassifyError::schema_mismatch(format!(
                "extractor output '{}' has shape {:?}, expected [{}, {}]",
                self.output_name, output_shape, batch_size, self.embedding_dim
            )));
        }
        let width = output_shape[1] as usize;
        if width != self.embedding_dim {
            return Err(ClassifyError::schema_mismatch(format!(
                "extractor output '{}' is {} wide but the configuration declares embedding dim {}",
                self.output_name, width, self.embedding_dim
            )));
        }

        let view = ArrayView2::from_shape((batch_size, width), output_data)
            .map_err(ClassifyError::Tensor)?;
        Ok(view.to_owned())
    }
}

impl ImageEmbedder for OrtEmbedder {
    fn dim(&self) -> usize {
        self.embedding_dim
    }

    fn embed_batch(&self, images: &[RgbImage]) -> ClassifyResult<Array2<f32>> {
        let batch = self.preprocessor.apply_batch(images)?;
        tracing::debug!(
            "embedding batch of {} image(s) with '{}'",
            images.len(),
            self.model_name
        );
        self.run_session(&batch)
    }
}
