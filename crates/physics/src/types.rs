//! # Physics Types
//!
//! Plain value types shared by the integrator and the engine: the per-tick
//! [`SimulationState`] snapshot and the immutable [`PhysicsConfig`].

use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

use crate::error::ConfigError;

/// Snapshot of the cart and pendulum after a given tick.
///
/// The angle is measured from the upright position and is always kept in
/// the half-open range `(-π, π]`: `0` is upright, `π` is hanging straight down.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    /// Cart position along the track in meters
    pub cart_position: f32,
    /// Cart velocity in m/s
    pub cart_velocity: f32,
    /// Pendulum angle from upright in radians
    pub angle: f32,
    /// Pendulum angular velocity in rad/s
    pub angular_velocity: f32,
    /// Number of successful integration steps since the last reset
    pub tick: u64,
}

impl SimulationState {
    /// State at rest with the pendulum at `angle`.
    #[must_use]
    pub const fn at_rest(angle: f32) -> Self {
        Self {
            cart_position: 0.0,
            cart_velocity: 0.0,
            angle,
            angular_velocity: 0.0,
            tick: 0,
        }
    }

    /// Absolute distance of the pendulum from upright, in `[0, π]`.
    #[must_use]
    pub fn upright_deviation(&self) -> f32 {
        self.angle.abs()
    }

    /// State as `[x, x_dot, theta, theta_dot]`.
    #[must_use]
    pub fn to_array(&self) -> [f32; 4] {
        [
            self.cart_position,
            self.cart_velocity,
            self.angle,
            self.angular_velocity,
        ]
    }
}

/// Configuration for a cart-pendulum system
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Cart mass in kg
    pub cart_mass: f32,
    /// Pendulum mass in kg
    pub pole_mass: f32,
    /// Full pendulum length in meters (center of mass sits at half length)
    pub pole_length: f32,
    /// Gravitational acceleration in m/s^2 (positive)
    pub gravity: f32,
    /// Largest force magnitude that reaches the cart, in N
    pub max_force: f32,
    /// Integration timestep in seconds
    pub timestep: f32,
    /// Total track length in meters; the cart must stay within ±length/2
    pub track_length: f32,
    /// Angle the pendulum starts from after a reset (radians from upright)
    pub initial_angle: f32,
}

impl PhysicsConfig {
    /// Angle of a pendulum hanging straight down.
    pub const HANGING: f32 = PI;

    /// Half of the track length: the largest allowed `|cart_position|`.
    #[must_use]
    pub fn track_limit(&self) -> f32 {
        self.track_length / 2.0
    }

    /// Distance from the pivot to the pendulum center of mass.
    #[must_use]
    pub fn half_length(&self) -> f32 {
        self.pole_length / 2.0
    }

    /// Check that every physical quantity is usable by the integrator.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NonPositive`] for a non-positive (or non-finite)
    /// mass, length, gravity, force limit, timestep or track length, and
    /// [`ConfigError::NonFinite`] for a non-finite initial angle.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positives = [
            ("cart_mass", self.cart_mass),
            ("pole_mass", self.pole_mass),
            ("pole_length", self.pole_length),
            ("gravity", self.gravity),
            ("max_force", self.max_force),
            ("timestep", self.timestep),
            ("track_length", self.track_length),
        ];
        for (field, value) in positives {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NonPositive { field, value });
            }
        }
        if !self.initial_angle.is_finite() {
            return Err(ConfigError::NonFinite {
                field: "initial_angle",
            });
        }
        Ok(())
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            cart_mass: 1.0,
            pole_mass: 0.1,
            pole_length: 1.0,
            gravity: 9.81,
            max_force: 10.0,
            timestep: 0.02,
            track_length: 4.8, // ±2.4 m
            initial_angle: Self::HANGING,
        }
    }
}
