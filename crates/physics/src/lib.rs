#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! # Cart-Pendulum Physics
//!
//! A small, deterministic simulator for a rigid pendulum hinged on a cart
//! that slides along a bounded track.
//!
//! ## Key Components
//!
//! -   **State:** [`SimulationState`] is a `Copy` snapshot that the engine
//!     replaces on every successful step. The pendulum angle is measured from
//!     upright and kept in `(-π, π]` by [`wrap_angle`].
//! -   **Engine:** [`PhysicsEngine`] owns the state, clamps the applied force
//!     to the configured limit, integrates with forward Euler and refuses any
//!     step that would carry the cart off the track.
//! -   **Configuration:** [`PhysicsConfig`] carries masses, lengths, gravity,
//!     the force limit, the timestep and the track length.
//!
//! ## Usage
//!
//! ```rust
//! use physics::{PhysicsConfig, PhysicsEngine};
//!
//! let mut engine = PhysicsEngine::new(PhysicsConfig::default()).unwrap();
//! for _ in 0..10 {
//!     if engine.step(2.0).is_err() {
//!         engine.reset();
//!     }
//! }
//! assert_eq!(engine.state().tick, 10);
//! ```

pub mod cartpole;
pub mod error;
pub mod integrator;
pub mod types;

#[cfg(test)]
mod cartpole_test;

pub use cartpole::PhysicsEngine;
pub use error::{ConfigError, ConstraintViolation};
pub use integrator::{accelerations, wrap_angle, Accelerations};
pub use types::{PhysicsConfig, SimulationState};
