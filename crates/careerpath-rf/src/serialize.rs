//! Model serialization and deserialization via bincode.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::RfError;
use crate::forest::RandomForest;

/// Current binary format version.
const FORMAT_VERSION: u32 = 1;

/// Versioned envelope for the serialized model.
#[derive(serde::Serialize, serde::Deserialize)]
struct ModelEnvelope {
    format_version: u32,
    kind: String,
    run_id: u64,
    forest: RandomForest,
}

/// Write `bytes` to `path` through a temp file in the same directory, so a
/// reader sees either the old file or the complete new one.
///
/// # Errors
///
/// Any I/O error from creating, writing, syncing or renaming the temp file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

impl RandomForest {
    /// Binary format version written by [`RandomForest::to_bytes`].
    pub const FORMAT_VERSION: u32 = FORMAT_VERSION;

    /// Tag distinguishing a model blob from other artifacts.
    pub const ARTIFACT_KIND: &'static str = "random_forest";

    /// Serialize the model into a versioned bincode envelope.
    ///
    /// `run_id` is written right after the kind tag. Blobs produced by the
    /// same save share it, which lets a loader detect a mixed pair.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::SerializeModel`] if bincode encoding fails.
    pub fn to_bytes(&self, run_id: u64) -> Result<Vec<u8>, RfError> {
        let envelope = ModelEnvelope {
            format_version: FORMAT_VERSION,
            kind: Self::ARTIFACT_KIND.to_string(),
            run_id,
            forest: self.clone(),
        };
        bincode::serialize(&envelope).map_err(|source| RfError::SerializeModel { source })
    }

    /// Decode a model produced by [`RandomForest::to_bytes`].
    ///
    /// `path` is only used for error context.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`RfError::DeserializeModel`] | bincode decoding failed or the blob is not a model |
    /// | [`RfError::IncompatibleModelVersion`] | format version mismatch |
    pub fn from_bytes(bytes: &[u8], path: &Path) -> Result<Self, RfError> {
        let envelope: ModelEnvelope =
            bincode::deserialize(bytes).map_err(|source| RfError::DeserializeModel {
                path: path.to_path_buf(),
                source,
            })?;

        if envelope.format_version != FORMAT_VERSION {
            return Err(RfError::IncompatibleModelVersion {
                expected: FORMAT_VERSION,
                found: envelope.format_version,
                path: path.to_path_buf(),
            });
        }
        if envelope.kind != Self::ARTIFACT_KIND {
            return Err(RfError::DeserializeModel {
                path: path.to_path_buf(),
                source: Box::new(bincode::ErrorKind::Custom(format!(
                    "expected a {} blob, found {}",
                    Self::ARTIFACT_KIND, envelope.kind
                ))),
            });
        }

        Ok(envelope.forest)
    }
}
