//! The training pipeline: dataset file to persisted model artifact.
//!
//! Composes the whole training run: read the tab-separated dataset, load and
//! embed every image through the frozen extractor, fit the maximum-entropy
//! head, and assemble the artifact. Training is a one-shot batch computation
//! that blocks the calling thread; only one run should be in flight per
//! pipeline instance.

use crate::artifact::ModelArtifact;
use crate::core::config::{ExtractorConfig, TrainerConfig};
use crate::core::errors::{ClassifyError, ClassifyResult};
use crate::core::{ImageEmbedder, OrtEmbedder};
use crate::dataset::{load_dataset, LabelVocabulary, LabeledImageSample};
use crate::eval::{EvaluationReport, Evaluator};
use crate::predictor::ImageClassifier;
use crate::trainer::MaxEntTrainer;
use crate::utils::load_images_batch;
use ndarray::Array2;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEFAULT_BATCH_SIZE: usize = 32;

/// Trains classification models from labeled dataset files.
pub struct TrainingPipeline {
    embedder: Arc<dyn ImageEmbedder>,
    extractor: ExtractorConfig,
    trainer: MaxEntTrainer,
    batch_size: usize,
}

impl std::fmt::Debug for TrainingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainingPipeline")
            .field("extractor", &self.extractor.model_path)
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl TrainingPipeline {
    /// Starts building a training pipeline.
    pub fn builder() -> TrainingPipelineBuilder {
        TrainingPipelineBuilder::new()
    }

    /// Trains a model from a tab-separated dataset file.
    ///
    /// Image paths in the dataset resolve against `image_root` when given.
    /// The returned artifact is complete and validated but not yet saved.
    ///
    /// # Errors
    ///
    /// * `SchemaMismatch` for a malformed dataset row.
    /// * `TrainingDivergence` if the optimizer fails to converge; no
    ///   artifact is produced.
    pub fn train(
        &self,
        dataset_path: &Path,
        image_root: Option<&Path>,
    ) -> ClassifyResult<ModelArtifact> {
        let samples = load_dataset(dataset_path, image_root)?;
        if samples.is_empty() {
            return Err(ClassifyError::invalid_input(format!(
                "dataset '{}' contains no samples",
                dataset_path.display()
            )));
        }

        let vocabulary = LabelVocabulary::from_samples(&samples);
        if vocabulary.len() < 2 {
            return Err(ClassifyError::invalid_input(format!(
                "dataset '{}' must contain at least 2 distinct labels, found {}",
                dataset_path.display(),
                vocabulary.len()
            )));
        }
        tracing::info!(
            "training on {} samples across {} labels",
            samples.len(),
            vocabulary.len()
        );

        let classes = vocabulary.class_indexes(&samples)?;
        let embeddings = self.embed_samples(&samples)?;
        let outcome = self
            .trainer
            .fit(embeddings.view(), &classes, vocabulary.len())?;

        let artifact = ModelArtifact {
            extractor: self.extractor.clone(),
            vocabulary,
            weights: outcome.weights,
        };
        artifact.validate()?;
        Ok(artifact)
    }

    /// Trains on one dataset and evaluates the result on a held-out one.
    ///
    /// The report lets the caller gate whether the new artifact is good
    /// enough to replace the serving one.
    pub fn train_and_evaluate(
        &self,
        train_path: &Path,
        test_path: &Path,
        image_root: Option<&Path>,
    ) -> ClassifyResult<(ModelArtifact, EvaluationReport)> {
        let artifact = self.train(train_path, image_root)?;
        let classifier = self.classifier_for(&artifact)?;
        let test_samples = load_dataset(test_path, image_root)?;
        let report = Evaluator::new(&classifier).evaluate(&test_samples)?;
        Ok((artifact, report))
    }

    /// Builds a classifier over an artifact, reusing this pipeline's
    /// already-loaded extractor.
    pub fn classifier_for(&self, artifact: &ModelArtifact) -> ClassifyResult<ImageClassifier> {
        ImageClassifier::from_parts(
            Arc::clone(&self.embedder),
            artifact.vocabulary.clone(),
            artifact.weights.clone(),
        )
    }

    /// Runs every sample through preprocessing and the extractor,
    /// one batch at a time.
    fn embed_samples(&self, samples: &[LabeledImageSample]) -> ClassifyResult<Array2<f32>> {
        let dim = self.embedder.dim();
        let mut embeddings = Array2::zeros((samples.len(), dim));

        for (chunk_idx, chunk) in samples.chunks(self.batch_size).enumerate() {
            let paths: Vec<PathBuf> = chunk.iter().map(|s| s.image_path.clone()).collect();
            let images = load_images_batch(&paths)?;
            let batch = self.embedder.embed_batch(&images)?;
            let start = chunk_idx * self.batch_size;
            embeddings
                .slice_mut(ndarray::s![start..start + chunk.len(), ..])
                .assign(&batch);
            tracing::debug!(
                "embedded batch {} ({} image(s))",
                chunk_idx + 1,
                chunk.len()
            );
        }
        Ok(embeddings)
    }
}

/// Builder for [`TrainingPipeline`].
pub struct TrainingPipelineBuilder {
    extractor: Option<ExtractorConfig>,
    trainer: TrainerConfig,
    batch_size: usize,
}

impl TrainingPipelineBuilder {
    /// Creates a builder with default trainer settings.
    pub fn new() -> Self {
        Self {
            extractor: None,
            trainer: TrainerConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Sets the extractor configuration. Required.
    pub fn extractor(mut self, config: ExtractorConfig) -> Self {
        self.extractor = Some(config);
        self
    }

    /// Sets the trainer configuration.
    pub fn trainer(mut self, config: TrainerConfig) -> Self {
        self.trainer = config;
        self
    }

    /// Sets how many images are loaded and embedded per batch.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Builds the pipeline, loading the ONNX extractor from the
    /// configuration.
    pub fn build(self) -> ClassifyResult<TrainingPipeline> {
        let extractor = self.require_extractor()?;
        let embedder: Arc<dyn ImageEmbedder> = Arc::new(OrtEmbedder::from_config(&extractor)?);
        self.assemble(extractor, embedder)
    }

    /// Builds the pipeline around an explicit embedder implementation.
    ///
    /// The extractor configuration is still required: it is recorded in the
    /// produced artifacts and its embedding dimension must match the
    /// embedder.
    pub fn build_with_embedder(
        self,
        embedder: Arc<dyn ImageEmbedder>,
    ) -> ClassifyResult<TrainingPipeline> {
        let extractor = self.require_extractor()?;
        if embedder.dim() != extractor.embedding_dim {
            return Err(ClassifyError::schema_mismatch(format!(
                "embedder produces {}-dimensional vectors but the extractor configuration declares {}",
                embedder.dim(),
                extractor.embedding_dim
            )));
        }
        self.assemble(extractor, embedder)
    }

    fn require_extractor(&self) -> ClassifyResult<ExtractorConfig> {
        let extractor = self
            .extractor
            .clone()
            .ok_or_else(|| ClassifyError::config_error("an extractor configuration is required"))?;
        extractor.validate()?;
        Ok(extractor)
    }

    fn assemble(
        self,
        extractor: ExtractorConfig,
        embedder: Arc<dyn ImageEmbedder>,
    ) -> ClassifyResult<TrainingPipeline> {
        Ok(TrainingPipeline {
            embedder,
            extractor,
            trainer: MaxEntTrainer::new(self.trainer)?,
            batch_size: self.batch_size,
        })
    }
}

impl Default for TrainingPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
