use thiserror::Error;

/// A physics step that would leave the allowed configuration space.
///
/// This is an expected outcome of training, not a system failure: the
/// engine keeps its previous state and the caller resets it.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum ConstraintViolation {
    #[error("cart left the track at x = {position:.3} m (limit ±{limit:.3} m)")]
    TrackBoundsExceeded { position: f32, limit: f32 },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be positive and finite, got {value}")]
    NonPositive { field: &'static str, value: f32 },
    #[error("{field} must be finite")]
    NonFinite { field: &'static str },
}
