//! Parameter types for the single-neuron controller.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// The three trainable scalars of the controller.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    pub angle: f32,
    pub angular_velocity: f32,
    pub bias: f32,
}

impl Weights {
    /// Number of entries in a flat weight vector.
    pub const LEN: usize = 3;

    #[must_use]
    pub const fn new(angle: f32, angular_velocity: f32, bias: f32) -> Self {
        Self {
            angle,
            angular_velocity,
            bias,
        }
    }

    /// `[angle, angular_velocity, bias]`
    #[must_use]
    pub const fn to_array(self) -> [f32; 3] {
        [self.angle, self.angular_velocity, self.bias]
    }

    #[must_use]
    pub const fn from_array(values: [f32; 3]) -> Self {
        Self::new(values[0], values[1], values[2])
    }

    /// Copy with every component clamped into `[min, max]`.
    #[must_use]
    pub fn clamped(self, min: f32, max: f32) -> Self {
        Self::from_array(self.to_array().map(|w| w.clamp(min, max)))
    }

    /// Copy with uniform noise in `[-scale, scale)` added to every component.
    #[must_use]
    pub fn perturbed(self, rng: &mut fastrand::Rng, scale: f32) -> Self {
        Self::from_array(
            self.to_array()
                .map(|w| w + (rng.f32() * 2.0 - 1.0) * scale),
        )
    }

    /// Linear interpolation: `t = 0` gives `self`, `t = 1` gives `other`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let a = self.to_array();
        let b = other.to_array();
        Self::new(
            a[0] + t * (b[0] - a[0]),
            a[1] + t * (b[1] - a[1]),
            a[2] + t * (b[2] - a[2]),
        )
    }

    /// True when both vectors have exactly the same bit patterns.
    #[must_use]
    pub fn bit_eq(&self, other: &Self) -> bool {
        self.to_array()
            .iter()
            .zip(other.to_array())
            .all(|(a, b)| a.to_bits() == b.to_bits())
    }
}

impl Default for Weights {
    fn default() -> Self {
        // Push the cart toward the side the pendulum leans to
        Self::new(2.0, 1.0, 0.0)
    }
}

/// Adaptive state owned by a controller.
///
/// Cloned out for checkpointing and ensemble selection; only the
/// controller itself mutates it.
#[derive(Clone, Debug, PartialEq)]
pub struct ControllerParameters {
    pub weights: Weights,
    pub learning_rate: f32,
    /// Curriculum knob in `[0, 1]`
    pub difficulty: f32,
    /// Most recent success flags, oldest first
    pub success_window: VecDeque<bool>,
    pub window_capacity: usize,
    /// Success rate at or above which difficulty rises
    pub raise_threshold: f32,
    /// Success rate at or below which difficulty falls
    pub lower_threshold: f32,
}

impl ControllerParameters {
    /// Fraction of successes in the window, `0.0` when empty.
    #[must_use]
    pub fn success_rate(&self) -> f32 {
        if self.success_window.is_empty() {
            return 0.0;
        }
        let hits = self.success_window.iter().filter(|&&s| s).count();
        hits as f32 / self.success_window.len() as f32
    }

    /// Push a flag, dropping the oldest once the window is full.
    pub fn record(&mut self, success: bool) {
        self.success_window.push_back(success);
        while self.success_window.len() > self.window_capacity {
            self.success_window.pop_front();
        }
    }

    #[must_use]
    pub fn window_full(&self) -> bool {
        self.success_window.len() >= self.window_capacity
    }
}
