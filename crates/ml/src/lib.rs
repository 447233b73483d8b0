//! # Balance Controller
//!
//! Learning building blocks for the cart-pendulum task: a single-neuron
//! [`Controller`] that adapts online from scalar rewards, the [`RewardModel`]
//! trait with its default [`BalanceReward`], and the [`Momentum`] helper both
//! the controller and the batch trainer use to smooth their updates.

pub mod config;
pub mod controller;
pub mod error;
pub mod optim;
pub mod params;
pub mod reward;

pub use config::{ControllerConfig, TdTarget};
pub use controller::{signum_or_zero, Controller, GradientContext};
pub use error::{ControllerError, RewardError};
pub use optim::Momentum;
pub use params::{ControllerParameters, Weights};
pub use reward::{BalanceReward, RewardModel};
