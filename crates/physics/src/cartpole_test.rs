//! Tests for PhysicsEngine behavior

use crate::cartpole::PhysicsEngine;
use crate::error::{ConfigError, ConstraintViolation};
use crate::types::{PhysicsConfig, SimulationState};

#[test]
fn test_inverted_pendulum_falls() {
    let config = PhysicsConfig {
        initial_angle: std::f32::consts::PI / 6.0, // 30 degrees from vertical
        ..Default::default()
    };
    let mut engine = PhysicsEngine::new(config).unwrap();

    let initial_angle = engine.state().angle;
    for _ in 0..25 {
        engine.step(0.0).unwrap();
    }
    let final_angle = engine.state().angle;
    println!("Pole angle: initial={initial_angle:.3} rad, final={final_angle:.3} rad");

    assert!(
        final_angle > initial_angle + 0.3,
        "Pole didn't fall: initial angle={initial_angle:.3}, final angle={final_angle:.3}"
    );
}

#[test]
fn test_hanging_pendulum_stays_put_without_force() {
    let mut engine = PhysicsEngine::new(PhysicsConfig::default()).unwrap();
    for _ in 0..200 {
        engine.step(0.0).unwrap();
    }
    let state = engine.state();
    assert!(state.cart_position.abs() < 1e-3);
    assert!((state.angle.abs() - std::f32::consts::PI).abs() < 1e-3);
}

#[test]
fn test_reset_to_wraps_angle() {
    let mut engine = PhysicsEngine::new(PhysicsConfig::default()).unwrap();
    engine.reset_to(SimulationState {
        angle: 2.0 * std::f32::consts::PI + 0.25,
        ..SimulationState::at_rest(0.0)
    });
    assert!((engine.state().angle - 0.25).abs() < 1e-5);
}

#[test]
fn test_nan_force_is_ignored() {
    let mut a = PhysicsEngine::new(PhysicsConfig::default()).unwrap();
    let mut b = a.clone();
    let sa = a.step(f32::NAN).unwrap();
    let sb = b.step(0.0).unwrap();
    assert_eq!(sa, sb);
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = PhysicsConfig {
        timestep: 0.0,
        ..Default::default()
    };
    assert_eq!(
        PhysicsEngine::new(config).unwrap_err(),
        ConfigError::NonPositive {
            field: "timestep",
            value: 0.0
        }
    );
}

#[test]
fn test_violation_reports_limit() {
    let config = PhysicsConfig {
        track_length: 0.2,
        ..Default::default()
    };
    let mut engine = PhysicsEngine::new(config).unwrap();
    let err = loop {
        match engine.step(10.0) {
            Ok(_) => continue,
            Err(e) => break e,
        }
    };
    let ConstraintViolation::TrackBoundsExceeded { position, limit } = err;
    assert!((limit - 0.1).abs() < 1e-6);
    assert!(position > limit);
}
