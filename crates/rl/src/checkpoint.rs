//! # Checkpoint Persistence
//!
//! A checkpoint is a small JSON record holding the controller weights as an
//! ordered triple, the learning rate, an ISO-8601 save time and a semantic
//! format version. [`CheckpointStore`] is the seam the trainer saves
//! through; [`JsonCheckpointStore`] writes one pretty-printed file per save.

use chrono::{DateTime, Utc};
use ml::{Controller, ControllerError, Weights};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Version written into every new checkpoint.
pub const FORMAT_VERSION: &str = "1.0.0";

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("checkpoint not found: {0}")]
    NotFound(PathBuf),
    #[error("malformed checkpoint {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("checkpoint weights rejected: {0}")]
    InvalidWeights(#[from] ControllerError),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// `[angle, angular_velocity, bias]`
    pub weights: Vec<f32>,
    pub learning_rate: f32,
    pub saved_at: DateTime<Utc>,
    pub version: String,
}

impl Checkpoint {
    /// Snapshot of a controller's weights and learning rate, stamped now.
    #[must_use]
    pub fn from_controller(controller: &Controller) -> Self {
        Self {
            weights: controller.weights().to_array().to_vec(),
            learning_rate: controller.learning_rate(),
            saved_at: Utc::now(),
            version: FORMAT_VERSION.to_string(),
        }
    }

    /// Load the weights and learning rate into `controller`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::InvalidWeights`] when the weight vector is
    /// not a finite triple; the controller is left untouched in that case.
    pub fn apply_to(&self, controller: &mut Controller) -> Result<(), PersistenceError> {
        controller.set_weights(&self.weights)?;
        controller.set_learning_rate(self.learning_rate);
        Ok(())
    }

    /// Weights as a typed triple, if the vector has the right arity.
    #[must_use]
    pub fn typed_weights(&self) -> Option<Weights> {
        let values: [f32; 3] = self.weights.as_slice().try_into().ok()?;
        Some(Weights::from_array(values))
    }
}

/// Where the trainer sends checkpoints.
pub trait CheckpointStore: Send + Sync {
    /// Persist `checkpoint`, returning where it went.
    ///
    /// # Errors
    ///
    /// Returns a [`PersistenceError`] when the checkpoint could not be written.
    fn save(&mut self, checkpoint: &Checkpoint) -> Result<PathBuf, PersistenceError>;

    /// Read a checkpoint back.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NotFound`] for a missing file and
    /// [`PersistenceError::Malformed`] for content that does not parse or
    /// carries an invalid version.
    fn load(&self, path: &Path) -> Result<Checkpoint, PersistenceError>;
}

/// Writes `<prefix>_<timestamp>_<seq>.json` files into one directory.
#[derive(Clone, Debug)]
pub struct JsonCheckpointStore {
    dir: PathBuf,
    prefix: String,
    saved: u64,
}

impl JsonCheckpointStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            saved: 0,
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl CheckpointStore for JsonCheckpointStore {
    fn save(&mut self, checkpoint: &Checkpoint) -> Result<PathBuf, PersistenceError> {
        fs::create_dir_all(&self.dir).map_err(|source| PersistenceError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let name = format!(
            "{}_{}_{:04}.json",
            self.prefix,
            checkpoint.saved_at.format("%Y%m%dT%H%M%S%.3fZ"),
            self.saved
        );
        let path = self.dir.join(name);
        let body = serde_json::to_string_pretty(checkpoint).map_err(|e| {
            PersistenceError::Malformed {
                path: path.clone(),
                reason: e.to_string(),
            }
        })?;
        fs::write(&path, body).map_err(|source| PersistenceError::Io {
            path: path.clone(),
            source,
        })?;

        self.saved += 1;
        debug!("checkpoint written to {}", path.display());
        Ok(path)
    }

    fn load(&self, path: &Path) -> Result<Checkpoint, PersistenceError> {
        read_checkpoint(path)
    }
}

/// Read and validate a checkpoint file.
///
/// # Errors
///
/// See [`CheckpointStore::load`].
pub fn read_checkpoint(path: &Path) -> Result<Checkpoint, PersistenceError> {
    let body = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            PersistenceError::NotFound(path.to_path_buf())
        } else {
            PersistenceError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    let checkpoint: Checkpoint =
        serde_json::from_str(&body).map_err(|e| PersistenceError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    if !is_semver(&checkpoint.version) {
        return Err(PersistenceError::Malformed {
            path: path.to_path_buf(),
            reason: format!("version {:?} is not MAJOR.MINOR.PATCH", checkpoint.version),
        });
    }
    Ok(checkpoint)
}

fn is_semver(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::is_semver;

    #[test]
    fn semver_shapes() {
        assert!(is_semver("1.0.0"));
        assert!(is_semver("12.4.103"));
        assert!(!is_semver("1.0"));
        assert!(!is_semver("1.0.x"));
        assert!(!is_semver("1..0"));
        assert!(!is_semver(""));
    }
}
