use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControllerError {
    #[error("weight vector must have {expected} entries, got {actual}")]
    InvalidWeightVector { expected: usize, actual: usize },
    #[error("weight {index} is not finite")]
    NonFiniteWeight { index: usize },
    #[error("invalid controller config: {field} {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RewardError {
    #[error("invalid reward setting: {field} {reason}")]
    InvalidSetting {
        field: &'static str,
        reason: &'static str,
    },
}
