//! Labeled dataset loading and the label vocabulary.
//!
//! Training and evaluation data arrive as tab-separated files with two
//! columns and no header: an image path and a label. Paths may be relative
//! to a configured image root directory.

use crate::core::errors::{ClassifyError, ClassifyResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// One row of a labeled dataset: an image path and its label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledImageSample {
    /// Path to the image file.
    pub image_path: PathBuf,
    /// Ground-truth label.
    pub label: String,
}

/// Loads a tab-separated dataset file into samples.
///
/// Each non-empty line must contain exactly `<imagePath>\t<label>`. When
/// `image_root` is given, relative image paths are resolved against it.
///
/// # Errors
///
/// Returns `SchemaMismatch` for a malformed row (wrong column count or an
/// empty field), identifying the offending line number.
pub fn load_dataset(
    path: &Path,
    image_root: Option<&Path>,
) -> ClassifyResult<Vec<LabeledImageSample>> {
    let contents = std::fs::read_to_string(path)?;
    let mut samples = Vec::new();

    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split('\t');
        let (image_path, label) = match (fields.next(), fields.next(), fields.next()) {
            (Some(p), Some(l), None) if !p.trim().is_empty() && !l.trim().is_empty() => {
                (p.trim(), l.trim())
            }
            _ => {
                return Err(ClassifyError::schema_mismatch(format!(
                    "dataset row {} of '{}' is not '<imagePath>\\t<label>': {:?}",
                    line_no + 1,
                    path.display(),
                    line
                )));
            }
        };

        let image_path = match image_root {
            Some(root) if !Path::new(image_path).is_absolute() => root.join(image_path),
            _ => PathBuf::from(image_path),
        };
        samples.push(LabeledImageSample {
            image_path,
            label: label.to_string(),
        });
    }

    tracing::debug!(
        "loaded {} samples from dataset '{}'",
        samples.len(),
        path.display()
    );
    Ok(samples)
}

/// The ordered set of labels a trained classifier can output.
///
/// Fixed at training time from the distinct labels in the dataset, in
/// first-seen order. The position of a label defines which classifier score
/// slot belongs to it, so the vocabulary is embedded in the model artifact
/// and must never be reordered after training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct LabelVocabulary {
    labels: Vec<String>,
    index: HashMap<String, usize>,
}

impl LabelVocabulary {
    /// Builds a vocabulary from the distinct labels of a sample set,
    /// in first-seen order.
    pub fn from_samples(samples: &[LabeledImageSample]) -> Self {
        let mut labels = Vec::new();
        let mut index = HashMap::new();
        for sample in samples {
            if !index.contains_key(&sample.label) {
                index.insert(sample.label.clone(), labels.len());
                labels.push(sample.label.clone());
            }
        }
        Self { labels, index }
    }

    /// Builds a vocabulary from an explicit ordered label list,
    /// dropping duplicates.
    pub fn from_labels(labels: impl IntoIterator<Item = String>) -> Self {
        let mut out = Vec::new();
        let mut index = HashMap::new();
        for label in labels {
            if !index.contains_key(&label) {
                index.insert(label.clone(), out.len());
                out.push(label);
            }
        }
        Self { labels: out, index }
    }

    /// Returns the label at a score-slot index.
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.labels.get(idx).map(String::as_str)
    }

    /// Returns the score-slot index of a label.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    /// Number of labels in the vocabulary.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the vocabulary is empty.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Iterates over the labels in score-slot order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    /// Maps every sample's label to its score-slot index.
    ///
    /// # Errors
    ///
    /// Returns `SchemaMismatch` if a sample carries a label that is not in
    /// this vocabulary.
    pub fn class_indexes(&self, samples: &[LabeledImageSample]) -> ClassifyResult<Vec<usize>> {
        samples
            .iter()
            .map(|sample| {
                self.index_of(&sample.label).ok_or_else(|| {
                    ClassifyError::schema_mismatch(format!(
                        "label '{}' does not appear in the trained vocabulary",
                        sample.label
                    ))
                })
            })
            .collect()
    }
}

impl From<Vec<String>> for LabelVocabulary {
    fn from(labels: Vec<String>) -> Self {
        Self::from_labels(labels)
    }
}

impl From<LabelVocabulary> for Vec<String> {
    fn from(vocab: LabelVocabulary) -> Self {
        vocab.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tsv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_dataset_parses_rows() {
        let file = write_tsv("cat1.jpg\tcat\ndog1.jpg\tdog\n\ncat2.jpg\tcat\n");
        let samples = load_dataset(file.path(), None).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].label, "cat");
        assert_eq!(samples[1].image_path, PathBuf::from("dog1.jpg"));
    }

    #[test]
    fn test_load_dataset_resolves_image_root() {
        let file = write_tsv("cat1.jpg\tcat\n");
        let samples = load_dataset(file.path(), Some(Path::new("/data/images"))).unwrap();
        assert_eq!(samples[0].image_path, PathBuf::from("/data/images/cat1.jpg"));
    }

    #[test]
    fn test_load_dataset_rejects_malformed_row() {
        let file = write_tsv("cat1.jpg\tcat\nno-label-here\n");
        let err = load_dataset(file.path(), None).unwrap_err();
        assert!(matches!(err, ClassifyError::SchemaMismatch { .. }));
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn test_load_dataset_rejects_extra_column() {
        let file = write_tsv("cat1.jpg\tcat\textra\n");
        assert!(load_dataset(file.path(), None).is_err());
    }

    #[test]
    fn test_load_dataset_missing_file_is_io_error() {
        let err = load_dataset(Path::new("/nonexistent/tags.tsv"), None).unwrap_err();
        assert!(matches!(err, ClassifyError::Io(_)));
    }

    #[test]
    fn test_vocabulary_first_seen_order() {
        let samples = vec![
            LabeledImageSample {
                image_path: "a.jpg".into(),
                label: "dog".into(),
            },
            LabeledImageSample {
                image_path: "b.jpg".into(),
                label: "cat".into(),
            },
            LabeledImageSample {
                image_path: "c.jpg".into(),
                label: "dog".into(),
            },
        ];
        let vocab = LabelVocabulary::from_samples(&samples);
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.get(0), Some("dog"));
        assert_eq!(vocab.get(1), Some("cat"));
        assert_eq!(vocab.index_of("cat"), Some(1));
        assert_eq!(vocab.index_of("bird"), None);
    }

    #[test]
    fn test_class_indexes_rejects_unknown_label() {
        let vocab = LabelVocabulary::from_labels(["cat".to_string()]);
        let samples = vec![LabeledImageSample {
            image_path: "x.jpg".into(),
            label: "bird".into(),
        }];
        assert!(matches!(
            vocab.class_indexes(&samples),
            Err(ClassifyError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_vocabulary_serde_round_trip() {
        let vocab = LabelVocabulary::from_labels(["cat".to_string(), "dog".to_string()]);
        let json = serde_json::to_string(&vocab).unwrap();
        assert_eq!(json, r#"["cat","dog"]"#);
        let back: LabelVocabulary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vocab);
        assert_eq!(back.index_of("dog"), Some(1));
    }
}
