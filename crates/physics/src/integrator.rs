//! # Cart-Pendulum Integration
//!
//! Closed-form equations of motion for a rigid pendulum hinged on a cart,
//! plus the explicit Euler update that advances a [`SimulationState`].

use crate::types::{PhysicsConfig, SimulationState};
use std::f32::consts::{PI, TAU};

/// Cart and angular accelerations for a given state and applied force
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Accelerations {
    pub cart: f32,
    pub angular: f32,
}

/// Reduce `angle` into `(-π, π]`.
///
/// Angles already in range are returned untouched, which makes the function
/// exactly idempotent.
#[must_use]
pub fn wrap_angle(angle: f32) -> f32 {
    if angle > -PI && angle <= PI {
        return angle;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    // rem_euclid lands on 0 for odd multiples of π, which maps to -π here
    if wrapped <= -PI {
        PI
    } else {
        wrapped
    }
}

/// Solve the inverted-pendulum-on-cart dynamics for the accelerations.
///
/// `force` is used as given; clamping is the caller's job.
#[must_use]
pub fn accelerations(config: &PhysicsConfig, state: &SimulationState, force: f32) -> Accelerations {
    let total_mass = config.cart_mass + config.pole_mass;
    let half_length = config.half_length();
    let pole_moment = config.pole_mass * half_length;

    let (sin_theta, cos_theta) = state.angle.sin_cos();
    let theta_dot = state.angular_velocity;

    let temp = (force + pole_moment * theta_dot * theta_dot * sin_theta) / total_mass;
    let angular = (config.gravity * sin_theta - cos_theta * temp)
        / (half_length
            * (4.0 / 3.0 - config.pole_mass * cos_theta * cos_theta / total_mass));
    let cart = temp - pole_moment * angular * cos_theta / total_mass;

    Accelerations { cart, angular }
}

/// Advance `state` by one timestep with forward Euler.
///
/// Positions move with the velocities of the *previous* state, then the
/// velocities pick up the accelerations. The angle is wrapped afterwards.
/// The returned state is a candidate: bounds are checked by the engine.
#[must_use]
pub fn integrate(config: &PhysicsConfig, state: &SimulationState, force: f32) -> SimulationState {
    let acc = accelerations(config, state, force);
    let dt = config.timestep;

    SimulationState {
        cart_position: state.cart_position + dt * state.cart_velocity,
        cart_velocity: state.cart_velocity + dt * acc.cart,
        angle: wrap_angle(state.angle + dt * state.angular_velocity),
        angular_velocity: state.angular_velocity + dt * acc.angular,
        tick: state.tick + 1,
    }
}

/// Kinetic plus potential energy of the system, with the pivot height as
/// the potential reference.
#[must_use]
pub fn total_energy(config: &PhysicsConfig, state: &SimulationState) -> f32 {
    let l = config.half_length();
    let m = config.pole_mass;
    let (sin_theta, cos_theta) = state.angle.sin_cos();

    // Pendulum center of mass velocity
    let com_vx = state.cart_velocity + l * state.angular_velocity * cos_theta;
    let com_vy = -l * state.angular_velocity * sin_theta;
    // Rod inertia about its own center
    let inertia = m * config.pole_length * config.pole_length / 12.0;

    let cart_kinetic = 0.5 * config.cart_mass * state.cart_velocity * state.cart_velocity;
    let pole_kinetic = 0.5 * m * (com_vx * com_vx + com_vy * com_vy)
        + 0.5 * inertia * state.angular_velocity * state.angular_velocity;
    let potential = m * config.gravity * l * cos_theta;

    cart_kinetic + pole_kinetic + potential
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_keeps_hanging_at_pi() {
        assert_eq!(wrap_angle(PI), PI);
        assert_eq!(wrap_angle(-PI), PI);
    }

    #[test]
    fn wrap_brings_large_angles_into_range() {
        for &x in &[7.0_f32, -7.0, 100.0, -100.0, 1.0e4] {
            let w = wrap_angle(x);
            assert!(w > -PI && w <= PI, "wrap({x}) = {w}");
            assert!((w.sin() - x.sin()).abs() < 1e-2);
            assert!((w.cos() - x.cos()).abs() < 1e-2);
        }
    }

    #[test]
    fn hanging_pendulum_is_an_equilibrium() {
        let config = PhysicsConfig::default();
        let state = SimulationState::at_rest(PI);
        let acc = accelerations(&config, &state, 0.0);
        assert!(acc.angular.abs() < 1e-4);
        assert!(acc.cart.abs() < 1e-4);
    }

    #[test]
    fn upright_pendulum_falls_toward_its_lean() {
        let config = PhysicsConfig::default();
        let state = SimulationState::at_rest(0.1);
        let acc = accelerations(&config, &state, 0.0);
        assert!(acc.angular > 0.0);
    }

    #[test]
    fn positive_force_accelerates_cart_right() {
        let config = PhysicsConfig::default();
        let state = SimulationState::at_rest(PI);
        let acc = accelerations(&config, &state, 5.0);
        assert!(acc.cart > 0.0);
    }
}
