use physics::SimulationState;
use serde::{Deserialize, Serialize};

/// One transition observed while driving the environment.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub state: SimulationState,
    /// Force that was applied, after clamping
    pub action: f32,
    pub reward: f32,
    /// State after the step; equal to `state` when the step was refused
    pub next_state: SimulationState,
    /// Whether the episode ended with this transition
    pub terminal: bool,
    pub tick: u64,
}

impl Experience {
    #[must_use]
    pub fn new(
        state: SimulationState,
        action: f32,
        reward: f32,
        next_state: SimulationState,
        terminal: bool,
    ) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
            terminal,
            tick: state.tick,
        }
    }
}
