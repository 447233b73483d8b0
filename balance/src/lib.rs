//! # Balance: learning to hold a pendulum upright
//!
//! A cart slides along a bounded track with a pendulum hinged on top. The
//! pendulum starts hanging straight down, and a population of tiny
//! controllers learns to swing it up and keep it balanced.
//!
//! ## The Crates
//!
//! -   **[`physics`]:** The cart-pendulum integrator. One deterministic
//!     forward-Euler step per call, with a force clamp and a track bound that
//!     rejects steps leaving the track.
//! -   **[`ml`]:** The single-neuron controller (`tanh` of a weighted sum of
//!     angle, angular velocity and bias) with its online update rule, and the
//!     reward model that scores states.
//! -   **[`rl`]:** Everything around the controller: the batch trainer,
//!     checkpoints, metrics sinks, JSON settings and the evolutionary
//!     ensemble that ties it all together.
//!
//! ## Running
//!
//! ```text
//! balance --ticks 200000 --members 16 --checkpoint-dir runs/ckpt
//! ```
//!
//! Logging goes through `tracing`; set `RUST_LOG=debug` to see every episode.

pub use ml;
pub use physics;
pub use rl;
