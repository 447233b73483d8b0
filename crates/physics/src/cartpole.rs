//! CartPole engine for reinforcement learning environments
//!
//! This module provides [`PhysicsEngine`], the owner of one cart-pendulum
//! simulation. It clamps the applied force, integrates one timestep and
//! enforces the track bounds.

use crate::error::{ConfigError, ConstraintViolation};
use crate::integrator::{integrate, total_energy};
use crate::types::{PhysicsConfig, SimulationState};

/// A single cart-pendulum simulation
#[derive(Clone, Debug)]
pub struct PhysicsEngine {
    config: PhysicsConfig,
    state: SimulationState,
}

impl PhysicsEngine {
    /// Create an engine at rest with the pendulum at `config.initial_angle`.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] produced by [`PhysicsConfig::validate`].
    pub fn new(config: PhysicsConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let state = Self::initial_state(&config);
        Ok(Self { config, state })
    }

    fn initial_state(config: &PhysicsConfig) -> SimulationState {
        SimulationState::at_rest(crate::wrap_angle(config.initial_angle))
    }

    #[must_use]
    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> SimulationState {
        self.state
    }

    /// Clamp a requested force into `[-max_force, max_force]`.
    ///
    /// A NaN request is treated as no force at all.
    #[must_use]
    pub fn clamp_force(&self, force: f32) -> f32 {
        if force.is_nan() {
            return 0.0;
        }
        force.clamp(-self.config.max_force, self.config.max_force)
    }

    /// Advance the simulation by one timestep.
    ///
    /// # Errors
    ///
    /// Returns [`ConstraintViolation::TrackBoundsExceeded`] when the cart
    /// would end up beyond ±`track_length / 2`. The engine's state is left
    /// exactly as it was before the call in that case.
    pub fn step(&mut self, force: f32) -> Result<SimulationState, ConstraintViolation> {
        let force = self.clamp_force(force);
        let next = integrate(&self.config, &self.state, force);

        let limit = self.config.track_limit();
        if next.cart_position.abs() > limit {
            return Err(ConstraintViolation::TrackBoundsExceeded {
                position: next.cart_position,
                limit,
            });
        }

        self.state = next;
        Ok(next)
    }

    /// Put the system back at rest at its configured starting angle.
    pub fn reset(&mut self) {
        self.state = Self::initial_state(&self.config);
    }

    /// Replace the state wholesale, wrapping the angle into range.
    pub fn reset_to(&mut self, state: SimulationState) {
        self.state = SimulationState {
            angle: crate::wrap_angle(state.angle),
            ..state
        };
    }

    /// Mechanical energy of the current state.
    #[must_use]
    pub fn total_energy(&self) -> f32 {
        total_energy(&self.config, &self.state)
    }
}
