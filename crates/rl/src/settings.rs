//! Grouped configuration for an ensemble run.
//!
//! Every section falls back to its defaults, so a settings file only needs
//! the values it changes:
//!
//! ```json
//! { "physics": { "track_length": 6.0 }, "ensemble": { "size": 16 } }
//! ```

use ml::{BalanceReward, ControllerConfig, ControllerError, RewardError};
use physics::PhysicsConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::ensemble::EnsembleConfig;
use crate::trainer::TrainerConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read settings from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse settings: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid physics settings: {0}")]
    Physics(#[from] physics::ConfigError),
    #[error("invalid controller settings: {0}")]
    Controller(#[from] ControllerError),
    #[error("invalid reward settings: {0}")]
    Reward(#[from] RewardError),
    #[error("invalid setting {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub physics: PhysicsConfig,
    pub controller: ControllerConfig,
    pub trainer: TrainerConfig,
    pub ensemble: EnsembleConfig,
    pub reward: BalanceReward,
}

impl Settings {
    /// Parse and validate settings from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and the matching
    /// validation error for out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse and validate a JSON settings file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise
    /// as [`Settings::from_json_str`].
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// # Errors
    ///
    /// Returns the first section error found, checking physics, controller,
    /// trainer, ensemble and reward in that order.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.physics.validate()?;
        self.controller.validate()?;
        self.trainer.validate()?;
        self.ensemble.validate()?;
        self.reward.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_keep_defaults() {
        let settings =
            Settings::from_json_str(r#"{ "ensemble": { "size": 4 }, "trainer": { "batch_size": 8 } }"#)
                .unwrap();
        assert_eq!(settings.ensemble.size, 4);
        assert_eq!(settings.trainer.batch_size, 8);
        assert_eq!(settings.physics, PhysicsConfig::default());
        assert_eq!(settings.controller, ControllerConfig::default());
    }

    #[test]
    fn invalid_sections_are_reported() {
        let err = Settings::from_json_str(r#"{ "physics": { "timestep": 0.0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Physics(_)));

        let err = Settings::from_json_str(r#"{ "ensemble": { "size": 0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "size", .. }));

        let err = Settings::from_json_str(r#"{ "reward": { "sharpness": 0.5 } }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Reward(RewardError::InvalidSetting { field: "sharpness", .. })
        ));

        let err = Settings::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
