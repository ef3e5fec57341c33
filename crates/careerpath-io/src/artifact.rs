//! Durable storage of the fitted forest and label encoder, and the
//! inference-side [`Predictor`] built from them.

use std::path::{Path, PathBuf};

use careerpath_rf::{RandomForest, write_atomic};
use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::FeatureSchema;
use crate::label::LabelEncoder;
use crate::profile::CareerProfile;

/// File name of the serialized forest.
pub const MODEL_FILE: &str = "career_field_model.bin";

/// File name of the serialized label encoder.
pub const ENCODER_FILE: &str = "field_label_encoder.bin";

const ENCODER_FORMAT_VERSION: u32 = 1;
const ENCODER_KIND: &str = "label_encoder";

#[derive(serde::Serialize, serde::Deserialize)]
struct EncoderEnvelope {
    format_version: u32,
    kind: String,
    run_id: u64,
    encoder: LabelEncoder,
}

/// Leading fields shared by every artifact envelope.
#[derive(serde::Deserialize)]
struct EnvelopeHeader {
    format_version: u32,
    kind: String,
    run_id: u64,
}

/// Reads and writes the two artifact blobs in one directory.
///
/// Each blob is written to a temporary file next to its destination and
/// renamed over it, so a reader never observes a partial file. Both blobs
/// of one save carry the same random run id, and [`ArtifactStore::load`]
/// refuses a model and encoder that came from different saves.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Store artifacts under `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the model blob.
    #[must_use]
    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    /// Path of the encoder blob.
    #[must_use]
    pub fn encoder_path(&self) -> PathBuf {
        self.dir.join(ENCODER_FILE)
    }

    /// Persist `forest` and `encoder`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::ArtifactMismatch`] | The encoder has fewer classes than the forest |
    /// | [`IoError::OutputDirCreate`] | The directory cannot be created |
    /// | [`IoError::Model`] | The forest cannot be encoded |
    /// | [`IoError::SerializeArtifact`] | The encoder cannot be encoded |
    /// | [`IoError::WriteArtifact`] | A temp file write or rename failed |
    #[instrument(skip_all, fields(dir = %self.dir.display()))]
    pub fn save(&self, forest: &RandomForest, encoder: &LabelEncoder) -> Result<(), IoError> {
        check_class_coverage(forest, encoder)?;
        std::fs::create_dir_all(&self.dir).map_err(|source| IoError::OutputDirCreate {
            path: self.dir.clone(),
            source,
        })?;

        let run_id: u64 = rand::random();
        let model_bytes = forest.to_bytes(run_id)?;
        let encoder_bytes = bincode::serialize(&EncoderEnvelope {
            format_version: ENCODER_FORMAT_VERSION,
            kind: ENCODER_KIND.to_string(),
            run_id,
            encoder: encoder.clone(),
        })
        .map_err(|source| IoError::SerializeArtifact { source })?;

        for (path, bytes) in [
            (self.model_path(), &model_bytes),
            (self.encoder_path(), &encoder_bytes),
        ] {
            write_atomic(&path, bytes).map_err(|source| IoError::WriteArtifact { path, source })?;
        }

        info!(
            run_id,
            model_bytes = model_bytes.len(),
            encoder_bytes = encoder_bytes.len(),
            n_classes = encoder.n_classes(),
            "artifacts saved"
        );
        Ok(())
    }

    /// Load both blobs.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::ReadArtifact`] | A file cannot be read |
    /// | [`IoError::DeserializeArtifact`] | A blob is truncated or not an envelope |
    /// | [`IoError::IncompatibleArtifactVersion`] | Unknown format version |
    /// | [`IoError::WrongArtifactKind`] | The file holds the other artifact |
    /// | [`IoError::ArtifactMismatch`] | The two files were written by different saves |
    /// | [`IoError::Model`] | The model envelope is valid but its body is not |
    #[instrument(skip_all, fields(dir = %self.dir.display()))]
    pub fn load(&self) -> Result<(RandomForest, LabelEncoder), IoError> {
        let model_path = self.model_path();
        let bytes = read_artifact(&model_path)?;
        let model_run = check_header(
            &model_path,
            &bytes,
            RandomForest::FORMAT_VERSION,
            RandomForest::ARTIFACT_KIND,
        )?;
        let forest = RandomForest::from_bytes(&bytes, &model_path)?;

        let encoder_path = self.encoder_path();
        let bytes = read_artifact(&encoder_path)?;
        let encoder_run = check_header(&encoder_path, &bytes, ENCODER_FORMAT_VERSION, ENCODER_KIND)?;
        if model_run != encoder_run {
            return Err(IoError::ArtifactMismatch {
                reason: format!(
                    "model was written by save {model_run:016x} but the encoder by save {encoder_run:016x}"
                ),
            });
        }
        let envelope: EncoderEnvelope =
            bincode::deserialize(&bytes).map_err(|source| IoError::DeserializeArtifact {
                path: encoder_path.clone(),
                source,
            })?;

        debug!(
            n_trees = forest.n_trees(),
            n_classes = envelope.encoder.n_classes(),
            "artifacts loaded"
        );
        Ok((forest, envelope.encoder))
    }

    /// Load both blobs and bind them into a [`Predictor`].
    ///
    /// # Errors
    ///
    /// Any error of [`ArtifactStore::load`] or [`Predictor::new`].
    pub fn load_predictor(&self) -> Result<Predictor, IoError> {
        let (forest, encoder) = self.load()?;
        Predictor::new(forest, encoder)
    }
}

fn read_artifact(path: &Path) -> Result<Vec<u8>, IoError> {
    std::fs::read(path).map_err(|source| IoError::ReadArtifact {
        path: path.to_path_buf(),
        source,
    })
}

/// Decode only the envelope header, check version and kind, and return the
/// run id.
fn check_header(path: &Path, bytes: &[u8], version: u32, kind: &'static str) -> Result<u64, IoError> {
    let header: EnvelopeHeader =
        bincode::deserialize(bytes).map_err(|source| IoError::DeserializeArtifact {
            path: path.to_path_buf(),
            source,
        })?;
    if header.format_version != version {
        return Err(IoError::IncompatibleArtifactVersion {
            path: path.to_path_buf(),
            expected: version,
            found: header.format_version,
        });
    }
    if header.kind != kind {
        return Err(IoError::WrongArtifactKind {
            path: path.to_path_buf(),
            expected: kind,
            found: header.kind,
        });
    }
    Ok(header.run_id)
}

fn check_class_coverage(forest: &RandomForest, encoder: &LabelEncoder) -> Result<(), IoError> {
    if encoder.n_classes() < forest.n_classes() {
        return Err(IoError::ArtifactMismatch {
            reason: format!(
                "model predicts {} classes but the encoder names only {}",
                forest.n_classes(),
                encoder.n_classes()
            ),
        });
    }
    Ok(())
}

/// A loaded forest and encoder, bound to the canonical feature schema.
#[derive(Debug, Clone)]
pub struct Predictor {
    forest: RandomForest,
    encoder: LabelEncoder,
    schema: FeatureSchema,
}

impl Predictor {
    /// Bind `forest` and `encoder`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::FeatureOrderMismatch`] | The forest's feature names differ from the career schema |
    /// | [`IoError::ArtifactMismatch`] | The encoder cannot decode every class the forest predicts |
    pub fn new(forest: RandomForest, encoder: LabelEncoder) -> Result<Self, IoError> {
        let schema = FeatureSchema::career();
        schema.ensure_exact(forest.feature_names())?;
        check_class_coverage(&forest, &encoder)?;
        Ok(Self {
            forest,
            encoder,
            schema,
        })
    }

    /// Predicted field for a validated profile.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::NonFiniteFeature`] | A value is NaN or infinite |
    /// | [`IoError::ValueOutOfRange`] | A value lies outside its range |
    pub fn predict(&self, profile: &CareerProfile) -> Result<String, IoError> {
        profile.validate()?;
        self.predict_values(&profile.to_feature_vector())
    }

    /// Predicted field for a raw vector in schema order.
    ///
    /// No range checks are applied.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::Model`] | `values` has the wrong length |
    /// | [`IoError::NonFiniteFeature`] | A value is NaN or infinite |
    pub fn predict_values(&self, values: &[f64]) -> Result<String, IoError> {
        self.check_finite(values)?;
        let class = self.forest.predict(values)?;
        Ok(self.encoder.decode(class)?.to_string())
    }

    /// The `k` most probable fields with their vote shares, most probable first.
    ///
    /// # Errors
    ///
    /// Same as [`Predictor::predict`].
    pub fn predict_top_k(&self, profile: &CareerProfile, k: usize) -> Result<Vec<(String, f64)>, IoError> {
        profile.validate()?;
        let distribution = self.forest.predict_proba(&profile.to_feature_vector())?;
        distribution
            .top_k(k)
            .into_iter()
            .map(|(class, p)| Ok((self.encoder.decode(class)?.to_string(), p)))
            .collect()
    }

    /// Field names the predictor can return, in index order.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        self.encoder.classes()
    }

    /// Borrow the forest.
    #[must_use]
    pub fn forest(&self) -> &RandomForest {
        &self.forest
    }

    /// Borrow the encoder.
    #[must_use]
    pub fn encoder(&self) -> &LabelEncoder {
        &self.encoder
    }

    fn check_finite(&self, values: &[f64]) -> Result<(), IoError> {
        match values.iter().position(|v| !v.is_finite()) {
            Some(i) => Err(IoError::NonFiniteFeature {
                field: self
                    .schema
                    .columns()
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| format!("#{i}")),
            }),
            None => Ok(()),
        }
    }
}
