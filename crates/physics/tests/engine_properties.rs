//! Behavioural properties of the cart-pendulum engine
//!
//! - Force clamping is invisible beyond the limit
//! - The starting state is the hanging rest position
//! - Angle wrapping is idempotent and 2π periodic
//! - Leaving the track fails without touching the state

use approx::assert_relative_eq;
use physics::{wrap_angle, ConstraintViolation, PhysicsConfig, PhysicsEngine, SimulationState};
use std::f32::consts::PI;

fn engine() -> PhysicsEngine {
    PhysicsEngine::new(PhysicsConfig::default()).unwrap()
}

#[test]
fn test_oversized_force_matches_clamped_force() {
    let max = PhysicsConfig::default().max_force;
    for &(requested, clamped) in &[(max * 3.0, max), (-max * 7.5, -max), (1.0e9, max)] {
        let mut a = engine();
        let mut b = engine();
        for _ in 0..30 {
            let sa = a.step(requested);
            let sb = b.step(clamped);
            assert_eq!(sa, sb);
        }
        assert_eq!(a.state(), b.state());
    }
}

#[test]
fn test_starts_hanging_at_rest() {
    let state = engine().state();
    assert_eq!(state, SimulationState::at_rest(PI));
    assert_eq!(state.angle, PhysicsConfig::HANGING);
    assert_eq!(state.tick, 0);
}

#[test]
fn test_wrap_is_idempotent() {
    let mut x = -50.0_f32;
    while x < 50.0 {
        let once = wrap_angle(x);
        assert_eq!(wrap_angle(once), once, "x = {x}");
        assert!(once > -PI && once <= PI);
        x += 0.173;
    }
}

#[test]
fn test_wrap_is_periodic() {
    for &x in &[0.0_f32, 0.5, -1.2, 2.9, -3.0, 4.0, 10.0, -17.3] {
        assert_relative_eq!(wrap_angle(x + 2.0 * PI), wrap_angle(x), epsilon = 1e-4);
    }
}

#[test]
fn test_angle_stays_wrapped_while_spinning() {
    let config = PhysicsConfig {
        track_length: 1.0e6,
        ..Default::default()
    };
    let mut engine = PhysicsEngine::new(config).unwrap();
    engine.reset_to(SimulationState {
        angular_velocity: 40.0,
        ..SimulationState::at_rest(0.0)
    });
    for _ in 0..500 {
        let state = engine.step(0.0).unwrap();
        assert!(state.angle > -PI && state.angle <= PI);
    }
}

#[test]
fn test_constant_push_eventually_leaves_track() {
    let mut engine = engine();
    let mut ticks = 0;
    let violation = loop {
        let before = engine.state();
        match engine.step(PhysicsConfig::default().max_force) {
            Ok(state) => {
                ticks += 1;
                assert_eq!(state.tick, before.tick + 1);
                assert!(ticks < 10_000, "cart never reached the track limit");
            }
            Err(violation) => {
                // Round-trip: a failing step leaves the state untouched
                assert_eq!(engine.state(), before);
                break violation;
            }
        }
    };
    match violation {
        ConstraintViolation::TrackBoundsExceeded { position, limit } => {
            assert!(position > limit);
            assert_relative_eq!(limit, 2.4);
        }
    }

    // A second attempt fails the same way from the same state
    let before = engine.state();
    assert!(engine.step(10.0).is_err());
    assert_eq!(engine.state(), before);
}

#[test]
fn test_reset_restores_start_state() {
    let mut engine = engine();
    for _ in 0..20 {
        engine.step(-3.0).unwrap();
    }
    assert_ne!(engine.state(), SimulationState::at_rest(PI));
    engine.reset();
    assert_eq!(engine.state(), SimulationState::at_rest(PI));
}

#[test]
fn test_energy_roughly_conserved_without_force() {
    let config = PhysicsConfig {
        timestep: 0.001,
        initial_angle: 2.5,
        ..Default::default()
    };
    let mut engine = PhysicsEngine::new(config).unwrap();
    let initial = engine.total_energy();
    for _ in 0..500 {
        engine.step(0.0).unwrap();
    }
    let drift = (engine.total_energy() - initial).abs();
    assert!(drift < 0.05, "energy drifted by {drift}");
}
