//! # Single-Neuron Controller
//!
//! A linear combination of pendulum angle, scaled angular velocity and a
//! bias, squashed through `tanh` and scaled to the force range.
//!
//! The controller learns online: every [`Controller::forward`] (or
//! [`Controller::predict`]) call leaves a [`GradientContext`] in a single
//! pending slot, and the next [`Controller::update`] consumes it to turn a
//! reward into a weight step. Calling `update` with an empty slot does
//! nothing, so the caller is responsible for the forward/update ordering.
//!
//! With [`TdTarget::Discounted`] a transition is only learned from once the
//! value of the state that follows it is known. `update(r_t)` after the
//! forward pass on `s_t` pairs the previous step's reward with the current
//! value estimate:
//!
//! ```text
//! δ_{t-1} = r_{t-1} + γ·V(s_t) − V(s_{t-1})
//! ```
//!
//! and steps the weights along the context of `s_{t-1}`. The last transition
//! of an episode is flushed by [`Controller::end_episode`] with the terminal
//! error `δ = r − V(s)`, so nothing carries over into the next episode.
//! [`TdTarget::Raw`] learns from every step at once with `δ = r`.
//!
//! Besides the weights, `update` adapts the learning rate and the difficulty
//! level from a rolling window of per-step successes.

use physics::{wrap_angle, SimulationState};
use tracing::debug;

use crate::config::{ControllerConfig, TdTarget};
use crate::error::ControllerError;
use crate::optim::Momentum;
use crate::params::{ControllerParameters, Weights};

/// Inputs and activation of the most recent forward pass.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GradientContext {
    /// `[angle, scaled angular velocity, 1.0]`
    pub inputs: [f32; 3],
    /// `tanh` of the weighted sum, doubling as the state-value estimate
    pub activation: f32,
}

/// A step whose error waits for the value of the next state.
#[derive(Copy, Clone, Debug)]
struct Transition {
    context: GradientContext,
    reward: f32,
}

pub struct Controller {
    config: ControllerConfig,
    params: ControllerParameters,
    /// Pending gradient context, filled by forward/predict and taken by update
    pending: Option<GradientContext>,
    /// Discounted mode only: the latest step, not yet learned from
    previous: Option<Transition>,
    momentum: Momentum,
}

impl Controller {
    #[must_use]
    pub fn new(config: ControllerConfig) -> Self {
        let weights = config.initial_weights;
        Self::with_weights(config, weights)
    }

    #[must_use]
    pub fn with_weights(config: ControllerConfig, weights: Weights) -> Self {
        let params = ControllerParameters {
            weights: weights.clamped(config.weight_min, config.weight_max),
            learning_rate: config.initial_learning_rate,
            difficulty: config.initial_difficulty,
            success_window: std::collections::VecDeque::with_capacity(config.success_window),
            window_capacity: config.success_window,
            raise_threshold: config.raise_threshold,
            lower_threshold: config.lower_threshold,
        };
        let momentum = Momentum::new(config.momentum);
        Self {
            config,
            params,
            pending: None,
            previous: None,
            momentum,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    #[must_use]
    pub fn parameters(&self) -> &ControllerParameters {
        &self.params
    }

    #[must_use]
    pub fn weights(&self) -> Weights {
        self.params.weights
    }

    #[must_use]
    pub fn learning_rate(&self) -> f32 {
        self.params.learning_rate
    }

    #[must_use]
    pub fn difficulty(&self) -> f32 {
        self.params.difficulty
    }

    #[must_use]
    pub fn success_rate(&self) -> f32 {
        self.params.success_rate()
    }

    /// Context that the next `update` would consume, if any.
    #[must_use]
    pub fn pending(&self) -> Option<&GradientContext> {
        self.pending.as_ref()
    }

    /// Network inputs for a pendulum configuration.
    #[must_use]
    pub fn inputs(&self, angle: f32, angular_velocity: f32) -> [f32; 3] {
        [
            wrap_angle(angle),
            angular_velocity * self.config.velocity_scale,
            1.0,
        ]
    }

    fn activate(&self, inputs: &[f32; 3]) -> f32 {
        let w = self.params.weights.to_array();
        let hidden: f32 = w.iter().zip(inputs).map(|(w, x)| w * x).sum();
        hidden.tanh()
    }

    /// Force to apply for `state`. Overwrites the pending gradient context.
    pub fn forward(&mut self, state: &SimulationState) -> f32 {
        let inputs = self.inputs(state.angle, state.angular_velocity);
        let activation = self.activate(&inputs);
        self.pending = Some(GradientContext { inputs, activation });
        activation * self.config.max_force
    }

    /// State-value estimate in `[-1, 1]`. Overwrites the pending gradient
    /// context just like [`Controller::forward`].
    pub fn predict(&mut self, angle: f32, angular_velocity: f32) -> f32 {
        let inputs = self.inputs(angle, angular_velocity);
        let activation = self.activate(&inputs);
        self.pending = Some(GradientContext { inputs, activation });
        activation
    }

    /// Same value as [`Controller::predict`] without touching the pending slot.
    #[must_use]
    pub fn evaluate(&self, angle: f32, angular_velocity: f32) -> f32 {
        self.activate(&self.inputs(angle, angular_velocity))
    }

    /// Learning rate after difficulty scaling: harder curricula take finer steps.
    #[must_use]
    pub fn effective_learning_rate(&self) -> f32 {
        self.params.learning_rate * (1.0 - 0.5 * self.params.difficulty)
    }

    /// Turn `reward` into a weight step against the pending context.
    ///
    /// Returns `false` without changing anything when no forward/predict
    /// call preceded it, or when the reward is not finite (the context is
    /// still consumed in that case, and a discounted transition waiting for
    /// it is dropped).
    pub fn update(&mut self, reward: f32) -> bool {
        let Some(ctx) = self.pending.take() else {
            return false;
        };
        if !reward.is_finite() {
            self.previous = None;
            return false;
        }

        match self.config.td_target {
            TdTarget::Raw => self.learn(&ctx, reward),
            TdTarget::Discounted => {
                if let Some(prev) = self.previous.take() {
                    let error = prev.reward + self.config.discount * ctx.activation
                        - prev.context.activation;
                    self.learn(&prev.context, error);
                }
                self.previous = Some(Transition {
                    context: ctx,
                    reward,
                });
            }
        }

        self.params.record(reward >= self.config.success_reward);
        self.adapt();
        true
    }

    /// Close the current episode. A discounted transition still waiting for
    /// its successor is learned from as terminal (`δ = r − V(s)`); the
    /// pending context is dropped. Weights, momentum and the adaptation
    /// state are kept.
    ///
    /// Returns whether a weight step was taken.
    pub fn end_episode(&mut self) -> bool {
        self.pending = None;
        let Some(last) = self.previous.take() else {
            return false;
        };
        self.learn(&last.context, last.reward - last.context.activation);
        true
    }

    fn learn(&mut self, ctx: &GradientContext, error: f32) {
        let direction = signum_or_zero(ctx.activation);
        let lr = self.effective_learning_rate();
        let step = ctx.inputs.map(|x| lr * error * x * direction);
        let step = self.momentum.accelerate(step);
        self.add_clipped(step);
    }

    fn adapt(&mut self) {
        if !self.params.window_full() {
            return;
        }
        let rate = self.params.success_rate();
        let before = self.params.difficulty;
        if rate >= self.params.raise_threshold {
            self.params.difficulty = (before + self.config.difficulty_step).min(1.0);
            self.scale_learning_rate(self.config.learning_rate_growth);
        } else if rate <= self.params.lower_threshold {
            self.params.difficulty = (before - self.config.difficulty_step).max(0.0);
            self.scale_learning_rate(self.config.learning_rate_shrink);
        } else {
            return;
        }
        debug!(
            success_rate = rate,
            difficulty = self.params.difficulty,
            learning_rate = self.params.learning_rate,
            "controller adapted from {before:.2}"
        );
        self.params.success_window.clear();
    }

    fn add_clipped(&mut self, delta: [f32; 3]) {
        let mut w = self.params.weights.to_array();
        for (w, d) in w.iter_mut().zip(delta) {
            if d.is_finite() {
                *w += d;
            }
        }
        self.params.weights =
            Weights::from_array(w).clamped(self.config.weight_min, self.config.weight_max);
    }

    /// Add an externally computed step to the weights, clipped to bounds.
    /// Non-finite components are skipped.
    pub fn apply_delta(&mut self, delta: [f32; 3]) {
        self.add_clipped(delta);
    }

    /// Replace the weights from a flat `[angle, angular_velocity, bias]` slice.
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::InvalidWeightVector`] for a slice that does
    /// not have exactly three entries and [`ControllerError::NonFiniteWeight`]
    /// for NaN or infinite entries. The previous weights are kept on error.
    pub fn set_weights(&mut self, weights: &[f32]) -> Result<(), ControllerError> {
        let values: [f32; 3] =
            weights
                .try_into()
                .map_err(|_| ControllerError::InvalidWeightVector {
                    expected: Weights::LEN,
                    actual: weights.len(),
                })?;
        if let Some(index) = values.iter().position(|w| !w.is_finite()) {
            return Err(ControllerError::NonFiniteWeight { index });
        }
        self.replace_weights(Weights::from_array(values));
        Ok(())
    }

    /// Replace the weights, clipped to bounds.
    pub fn replace_weights(&mut self, weights: Weights) {
        self.params.weights = weights.clamped(self.config.weight_min, self.config.weight_max);
    }

    /// Set the learning rate, clamped to the configured bounds.
    pub fn set_learning_rate(&mut self, learning_rate: f32) {
        if learning_rate.is_finite() {
            self.params.learning_rate = learning_rate
                .clamp(self.config.min_learning_rate, self.config.max_learning_rate);
        }
    }

    /// Multiply the learning rate by `factor`, clamped to the configured bounds.
    pub fn scale_learning_rate(&mut self, factor: f32) {
        self.set_learning_rate(self.params.learning_rate * factor);
    }

    /// Forget all adaptive state: momentum, pending context, success window,
    /// difficulty and learning rate go back to their initial values. Weights
    /// are kept.
    pub fn reset_adaptation(&mut self) {
        self.pending = None;
        self.previous = None;
        self.momentum.reset();
        self.params.success_window.clear();
        self.params.difficulty = self.config.initial_difficulty;
        self.params.learning_rate = self.config.initial_learning_rate;
    }
}

/// `-1`, `0` or `1`; unlike `f32::signum`, zero maps to zero.
#[must_use]
pub fn signum_or_zero(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}
