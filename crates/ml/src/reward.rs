//! Reward shaping for the balance task.

use physics::SimulationState;
use serde::{Deserialize, Serialize};

use crate::error::RewardError;

/// Maps states and transitions to a scalar reward in `[-1, 1]`.
///
/// Implementations must be pure: the same inputs always give the same
/// reward, and nothing is mutated.
pub trait RewardModel: Send + Sync {
    /// Reward for being in `state` at the given difficulty.
    fn state_reward(&self, state: &SimulationState, difficulty: f32) -> f32;

    /// Reward for the transition `prev -> next`.
    fn reward(&self, prev: &SimulationState, next: &SimulationState, difficulty: f32) -> f32 {
        let _ = prev;
        self.state_reward(next, difficulty)
    }

    /// Reward for a step that violated a physical constraint.
    fn failure_reward(&self) -> f32 {
        -1.0
    }
}

/// Default reward: favours a pendulum close to upright, a calm pendulum and
/// a cart near the middle of the track, plus a bonus for moving toward
/// upright.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceReward {
    /// Exponent applied to the uprightness term at full difficulty; higher
    /// values narrow the band of angles that earn a positive reward
    pub sharpness: f32,
    /// Penalty per (rad/s)^2 of angular velocity
    pub velocity_penalty: f32,
    /// Penalty per m^2 of cart displacement
    pub position_penalty: f32,
    /// Bonus per radian of progress toward upright
    pub progress_weight: f32,
    pub failure: f32,
}

impl Default for BalanceReward {
    fn default() -> Self {
        Self {
            sharpness: 4.0,
            velocity_penalty: 0.01,
            position_penalty: 0.05,
            progress_weight: 2.0,
            failure: -1.0,
        }
    }
}

impl BalanceReward {
    /// # Errors
    ///
    /// Returns [`RewardError::InvalidSetting`] naming the first unusable
    /// field.
    pub fn validate(&self) -> Result<(), RewardError> {
        let fail = |field: &'static str, reason: &'static str| -> Result<(), RewardError> {
            Err(RewardError::InvalidSetting { field, reason })
        };

        if !(self.sharpness.is_finite() && self.sharpness >= 1.0) {
            return fail("sharpness", "must be finite and at least 1");
        }
        let weights = [
            ("velocity_penalty", self.velocity_penalty),
            ("position_penalty", self.position_penalty),
            ("progress_weight", self.progress_weight),
        ];
        for (field, value) in weights {
            if !(value.is_finite() && value >= 0.0) {
                return fail(field, "must be finite and non-negative");
            }
        }
        if !self.failure.is_finite() {
            return fail("failure", "must be finite");
        }
        Ok(())
    }

    fn angle_sensitivity(&self, difficulty: f32) -> f32 {
        1.0 + difficulty.clamp(0.0, 1.0) * (self.sharpness - 1.0)
    }
}

impl RewardModel for BalanceReward {
    fn state_reward(&self, state: &SimulationState, difficulty: f32) -> f32 {
        // 1 upright, 0 hanging
        let uprightness = 0.5 * (1.0 + state.angle.cos());
        let shaped = uprightness.powf(self.angle_sensitivity(difficulty));
        let reward = 2.0 * shaped - 1.0
            - self.velocity_penalty * state.angular_velocity * state.angular_velocity
            - self.position_penalty * state.cart_position * state.cart_position;
        bounded(reward)
    }

    fn reward(&self, prev: &SimulationState, next: &SimulationState, difficulty: f32) -> f32 {
        let progress = prev.upright_deviation() - next.upright_deviation();
        bounded(self.state_reward(next, difficulty) + self.progress_weight * progress)
    }

    fn failure_reward(&self) -> f32 {
        bounded(self.failure)
    }
}

fn bounded(reward: f32) -> f32 {
    if reward.is_nan() {
        return -1.0;
    }
    reward.clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    #[test]
    fn upright_beats_hanging() {
        let model = BalanceReward::default();
        let up = model.state_reward(&SimulationState::at_rest(0.0), 0.0);
        let down = model.state_reward(&SimulationState::at_rest(PI), 0.0);
        assert!((up - 1.0).abs() < 1e-6);
        assert!((down + 1.0).abs() < 1e-6);
    }

    #[test]
    fn difficulty_narrows_the_reward_band() {
        let model = BalanceReward::default();
        let tilted = SimulationState::at_rest(0.6);
        let easy = model.state_reward(&tilted, 0.0);
        let hard = model.state_reward(&tilted, 1.0);
        assert!(hard < easy);
    }

    #[test]
    fn progress_toward_upright_is_rewarded() {
        let model = BalanceReward::default();
        let a = SimulationState::at_rest(1.0);
        let b = SimulationState::at_rest(0.9);
        assert!(model.reward(&a, &b, 0.0) > model.reward(&b, &a, 0.0));
    }

    #[test]
    fn rewards_stay_bounded() {
        let model = BalanceReward::default();
        let wild = SimulationState {
            cart_position: 50.0,
            cart_velocity: 100.0,
            angle: 0.3,
            angular_velocity: -80.0,
            tick: 7,
        };
        for d in [0.0, 0.5, 1.0] {
            let r = model.reward(&SimulationState::at_rest(PI), &wild, d);
            assert!((-1.0..=1.0).contains(&r));
        }
        assert_eq!(model.failure_reward(), -1.0);
    }

    #[test]
    fn validation_names_the_bad_field() {
        assert!(BalanceReward::default().validate().is_ok());

        let cases = [
            BalanceReward { sharpness: 0.5, ..Default::default() },
            BalanceReward { velocity_penalty: -0.1, ..Default::default() },
            BalanceReward { position_penalty: f32::NAN, ..Default::default() },
            BalanceReward { progress_weight: -2.0, ..Default::default() },
            BalanceReward { failure: f32::NEG_INFINITY, ..Default::default() },
        ];
        let fields = [
            "sharpness",
            "velocity_penalty",
            "position_penalty",
            "progress_weight",
            "failure",
        ];
        for (model, expected) in cases.iter().zip(fields) {
            assert!(matches!(
                model.validate(),
                Err(RewardError::InvalidSetting { field, .. }) if field == expected
            ));
        }
    }
}
