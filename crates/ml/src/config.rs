use serde::{Deserialize, Serialize};

use crate::error::ControllerError;
use crate::params::Weights;

/// Target used to form the temporal-difference error in `Controller::update`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TdTarget {
    /// `error = reward`
    Raw,
    /// `error = r_prev + discount * V(s) - V(s_prev)`, learned one step
    /// late; the last step of an episode uses `r - V(s)`
    Discounted,
}

/// Configuration for a single-neuron controller
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub initial_weights: Weights,
    pub initial_learning_rate: f32,
    pub min_learning_rate: f32,
    pub max_learning_rate: f32,
    /// Multiplier applied to the learning rate after a sustained success streak
    pub learning_rate_growth: f32,
    /// Multiplier applied to the learning rate after sustained failure
    pub learning_rate_shrink: f32,
    /// Fraction of the previous update carried into the next one
    pub momentum: f32,
    pub weight_min: f32,
    pub weight_max: f32,
    /// Scale applied to the angular velocity input
    pub velocity_scale: f32,
    /// Force produced at full activation, in N
    pub max_force: f32,
    pub td_target: TdTarget,
    pub discount: f32,
    /// Per-step reward counted as a success in the rolling window
    pub success_reward: f32,
    pub success_window: usize,
    pub raise_threshold: f32,
    pub lower_threshold: f32,
    pub difficulty_step: f32,
    pub initial_difficulty: f32,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            initial_weights: Weights::default(),
            initial_learning_rate: 0.01,
            min_learning_rate: 1.0e-4,
            max_learning_rate: 0.1,
            learning_rate_growth: 1.05,
            learning_rate_shrink: 0.95,
            momentum: 0.5,
            weight_min: -10.0,
            weight_max: 10.0,
            velocity_scale: 0.25,
            max_force: 10.0,
            td_target: TdTarget::Discounted,
            discount: 0.95,
            success_reward: 0.5,
            success_window: 50,
            raise_threshold: 0.8,
            lower_threshold: 0.2,
            difficulty_step: 0.1,
            initial_difficulty: 0.0,
        }
    }
}

impl ControllerConfig {
    /// # Errors
    ///
    /// Returns [`ControllerError::InvalidConfig`] naming the first field whose
    /// value cannot drive a controller.
    pub fn validate(&self) -> Result<(), ControllerError> {
        let fail = |field: &'static str, reason: &'static str| -> Result<(), ControllerError> {
            Err(ControllerError::InvalidConfig { field, reason })
        };

        if !(self.min_learning_rate > 0.0 && self.min_learning_rate <= self.max_learning_rate) {
            return fail("min_learning_rate", "must be positive and at most max_learning_rate");
        }
        if !(self.min_learning_rate..=self.max_learning_rate).contains(&self.initial_learning_rate) {
            return fail("initial_learning_rate", "must lie within the learning rate bounds");
        }
        if !(self.learning_rate_growth >= 1.0 && self.learning_rate_shrink > 0.0 && self.learning_rate_shrink <= 1.0) {
            return fail("learning_rate_growth", "growth must be >= 1 and shrink in (0, 1]");
        }
        if !(0.0..1.0).contains(&self.momentum) {
            return fail("momentum", "must be in [0, 1)");
        }
        if !(self.weight_min < self.weight_max) {
            return fail("weight_min", "must be below weight_max");
        }
        if !(self.max_force > 0.0 && self.max_force.is_finite()) {
            return fail("max_force", "must be positive");
        }
        if !(0.0..=1.0).contains(&self.discount) {
            return fail("discount", "must be in [0, 1]");
        }
        if self.success_window == 0 {
            return fail("success_window", "must hold at least one entry");
        }
        if !(0.0 <= self.lower_threshold
            && self.lower_threshold < self.raise_threshold
            && self.raise_threshold <= 1.0)
        {
            return fail("raise_threshold", "thresholds must satisfy 0 <= lower < raise <= 1");
        }
        if !(0.0..=1.0).contains(&self.initial_difficulty) {
            return fail("initial_difficulty", "must be in [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.difficulty_step) {
            return fail("difficulty_step", "must be in [0, 1]");
        }
        Ok(())
    }
}
