//! # Ensemble Manager
//!
//! Runs a population of independent learners side by side. Every member owns
//! a physics engine, a controller and a trainer. Members that fail wait for
//! the rest of the population; once every member has failed, the population
//! evolves:
//!
//! 1. Rank members by their longest episode (ties broken by index).
//! 2. Keep the top `selection_rate` share unchanged (the elites).
//! 3. Replace the bottom `replacement_rate` share with mutated elites.
//! 4. Replace everyone in between with a blend of two elites.
//!
//! All population state sits behind one [`RwLock`]. A tick holds the write
//! lock from the first member to the evolution check; readers take the read
//! lock and never observe a half-finished tick.

use ml::{BalanceReward, Controller, ControllerParameters, RewardModel, Weights};
use parking_lot::{Mutex, RwLock};
use physics::{PhysicsEngine, SimulationState};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::checkpoint::{JsonCheckpointStore, PersistenceError};
use crate::experience::Experience;
use crate::metrics::MetricsSink;
use crate::settings::{ConfigError, Settings};
use crate::trainer::{EpisodeSummary, Trainer};

/// Configuration for an [`EnsembleManager`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Number of members
    pub size: usize,
    /// Spread of the initial weights around the configured base weights
    pub weight_perturbation: f32,
    /// Share of the population kept unchanged on evolution
    pub selection_rate: f32,
    /// Share of the population replaced by mutated elites
    pub replacement_rate: f32,
    /// Noise added to a mutated elite
    pub mutation_rate: f32,
    /// Noise added to a blend of two elites
    pub crossover_perturbation: f32,
    pub seed: u64,
    /// Episode length counted as a success; `None` lets episodes run until
    /// the member fails
    pub max_episode_ticks: Option<u64>,
    /// Weight of the latest episode in a member's average reward
    pub reward_smoothing: f32,
    /// Prefix of every member's metrics session
    pub session: String,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            size: 10,
            weight_perturbation: 0.1,
            selection_rate: 0.2,
            replacement_rate: 0.3,
            mutation_rate: 0.2,
            crossover_perturbation: 0.05,
            seed: 42,
            max_episode_ticks: Some(1000),
            reward_smoothing: 0.1,
            session: "balance".to_string(),
        }
    }
}

impl EnsembleConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first unusable field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |field: &'static str, reason: &'static str| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid { field, reason })
        };

        if self.size == 0 {
            return fail("size", "must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.selection_rate) {
            return fail("selection_rate", "must be in [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.replacement_rate) {
            return fail("replacement_rate", "must be in [0, 1]");
        }
        let noise = [
            self.weight_perturbation,
            self.mutation_rate,
            self.crossover_perturbation,
        ];
        if noise.iter().any(|n| !(n.is_finite() && *n >= 0.0)) {
            return fail("mutation_rate", "noise scales must be non-negative");
        }
        if self.max_episode_ticks == Some(0) {
            return fail("max_episode_ticks", "must be at least 1 when set");
        }
        if !(self.reward_smoothing > 0.0 && self.reward_smoothing <= 1.0) {
            return fail("reward_smoothing", "must be in (0, 1]");
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Active,
    /// Waiting for the next generation
    Failed,
}

/// Read-only copy of one member's state.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MemberSnapshot {
    pub index: usize,
    pub status: MemberStatus,
    /// Ticks in the current episode
    pub ticks: u64,
    pub best_ticks: u64,
    pub episodes: u64,
    pub success_rate: f32,
    pub average_reward: f32,
    pub weights: Weights,
    pub learning_rate: f32,
    pub difficulty: f32,
    pub state: SimulationState,
}

/// Every member plus the population bookkeeping, taken under one read lock.
#[derive(Clone, Debug, Serialize)]
pub struct PopulationSnapshot {
    pub tick: u64,
    pub generation: u64,
    pub best_index: usize,
    pub members: Vec<MemberSnapshot>,
}

/// What happened during one [`EnsembleManager::step`].
#[derive(Debug)]
pub struct TickReport {
    pub tick: u64,
    /// Members that left the track this tick
    pub failures: Vec<usize>,
    /// Members that reached the episode length limit this tick
    pub completed: Vec<usize>,
    pub evolved: bool,
    pub generation: u64,
    pub best_index: usize,
    pub best_ticks: u64,
    /// Checkpoints that were due but could not be written
    pub checkpoint_errors: Vec<(usize, PersistenceError)>,
}

enum StepOutcome {
    Continued,
    Completed(Result<EpisodeSummary, PersistenceError>),
    Failed(Result<EpisodeSummary, PersistenceError>),
}

struct Member {
    index: usize,
    engine: PhysicsEngine,
    controller: Controller,
    trainer: Trainer,
    ticks: u64,
    best_ticks: u64,
    episodes: u64,
    episode_reward: f32,
    average_reward: f32,
    status: MemberStatus,
}

impl Member {
    fn step<R: RewardModel>(&mut self, model: &R, config: &EnsembleConfig) -> StepOutcome {
        let prev = self.engine.state();
        let force = self.engine.clamp_force(self.controller.forward(&prev));

        match self.engine.step(force) {
            Ok(next) => {
                let reward = model.reward(&prev, &next, self.controller.difficulty());
                self.controller.update(reward);
                self.ticks += 1;
                self.episode_reward += reward;

                let done = config.max_episode_ticks.is_some_and(|max| self.ticks >= max);
                let exp = Experience::new(prev, force, reward, next, done);
                let _ = self.trainer.add_experience(&mut self.controller, exp);
                if done {
                    let result = self.end_episode(config.reward_smoothing);
                    self.engine.reset();
                    StepOutcome::Completed(result)
                } else {
                    StepOutcome::Continued
                }
            }
            Err(violation) => {
                let reward = model.failure_reward();
                self.controller.update(reward);
                self.episode_reward += reward;

                let exp = Experience::new(prev, force, reward, prev, true);
                let _ = self.trainer.add_experience(&mut self.controller, exp);
                debug!(member = self.index, ticks = self.ticks, "{violation}");

                let result = self.end_episode(config.reward_smoothing);
                self.engine.reset();
                self.status = MemberStatus::Failed;
                StepOutcome::Failed(result)
            }
        }
    }

    fn end_episode(&mut self, smoothing: f32) -> Result<EpisodeSummary, PersistenceError> {
        self.best_ticks = self.best_ticks.max(self.ticks);
        self.episodes += 1;
        self.average_reward = if self.episodes == 1 {
            self.episode_reward
        } else {
            self.average_reward + smoothing * (self.episode_reward - self.average_reward)
        };
        let ticks = std::mem::take(&mut self.ticks);
        self.episode_reward = 0.0;
        self.controller.end_episode();
        self.trainer.on_episode_end(&mut self.controller, ticks)
    }

    /// Start over with new weights and a clean history.
    fn replace(&mut self, weights: Weights) {
        self.controller.replace_weights(weights);
        self.controller.reset_adaptation();
        self.trainer.reset();
        self.engine.reset();
        self.ticks = 0;
        self.best_ticks = 0;
        self.episodes = 0;
        self.episode_reward = 0.0;
        self.average_reward = 0.0;
        self.status = MemberStatus::Active;
    }

    fn snapshot(&self) -> MemberSnapshot {
        MemberSnapshot {
            index: self.index,
            status: self.status,
            ticks: self.ticks,
            best_ticks: self.best_ticks,
            episodes: self.episodes,
            success_rate: self.trainer.success_rate(),
            average_reward: self.average_reward,
            weights: self.controller.weights(),
            learning_rate: self.controller.learning_rate(),
            difficulty: self.controller.difficulty(),
            state: self.engine.state(),
        }
    }
}

struct Population<R> {
    config: EnsembleConfig,
    reward: R,
    members: Vec<Member>,
    // `fastrand::Rng` is not `Sync`; only ever reached through `get_mut`
    rng: Mutex<fastrand::Rng>,
    best_index: usize,
    generation: u64,
    tick: u64,
}

impl<R: RewardModel> Population<R> {
    fn refresh_best(&mut self) {
        let mut best = 0;
        for (i, member) in self.members.iter().enumerate() {
            if member.best_ticks > self.members[best].best_ticks {
                best = i;
            }
        }
        self.best_index = best;
    }

    fn evolve(&mut self) {
        let n = self.members.len();
        let mut order: Vec<usize> = (0..n).collect();
        // Stable, so equal best_ticks keep index order
        order.sort_by(|&a, &b| self.members[b].best_ticks.cmp(&self.members[a].best_ticks));

        let elite_count = ((n as f32 * self.config.selection_rate).round() as usize).clamp(1, n);
        let replace_count =
            ((n as f32 * self.config.replacement_rate).floor() as usize).min(n - elite_count);
        let crossover_count = n - elite_count - replace_count;

        let rng = self.rng.get_mut();
        let elites: Vec<Weights> = order[..elite_count]
            .iter()
            .map(|&i| self.members[i].controller.weights())
            .collect();

        for (rank, &i) in order[elite_count..].iter().enumerate() {
            let weights = if rank < crossover_count {
                let (a, b) = pick_parents(rng, elite_count);
                elites[a]
                    .lerp(elites[b], rng.f32())
                    .perturbed(rng, self.config.crossover_perturbation)
            } else {
                let parent = elites[rng.usize(..elite_count)];
                parent.perturbed(rng, self.config.mutation_rate)
            };
            self.members[i].replace(weights);
        }
        for &i in &order[..elite_count] {
            self.members[i].status = MemberStatus::Active;
        }

        self.best_index = order[0];
        self.generation += 1;
        info!(
            generation = self.generation,
            best = self.best_index,
            best_ticks = self.members[self.best_index].best_ticks,
            elites = elite_count,
            mutated = replace_count,
            crossed = crossover_count,
            "population evolved"
        );
    }
}

/// Two elite indices below `count`, distinct whenever `count > 1`.
fn pick_parents(rng: &mut fastrand::Rng, count: usize) -> (usize, usize) {
    let first = rng.usize(..count);
    if count < 2 {
        return (first, first);
    }
    let second = rng.usize(..count - 1);
    (first, if second >= first { second + 1 } else { second })
}

pub struct EnsembleManager<R: RewardModel = BalanceReward> {
    population: RwLock<Population<R>>,
}

impl EnsembleManager<BalanceReward> {
    /// Build an ensemble that scores states with the settings' reward section.
    ///
    /// # Errors
    ///
    /// See [`EnsembleManager::new`].
    pub fn from_settings(settings: Settings) -> Result<Self, ConfigError> {
        let reward = settings.reward.clone();
        Self::new(settings, reward)
    }
}

impl<R: RewardModel> EnsembleManager<R> {
    /// Build `settings.ensemble.size` members. Member weights are the
    /// configured initial weights plus seeded uniform noise.
    ///
    /// # Errors
    ///
    /// Returns the first validation error in `settings`.
    pub fn new(settings: Settings, reward: R) -> Result<Self, ConfigError> {
        settings.validate()?;
        let Settings {
            physics,
            mut controller,
            trainer,
            ensemble,
            ..
        } = settings;
        // The controller saturates at the force the cart can actually take
        controller.max_force = physics.max_force;

        let mut rng = fastrand::Rng::with_seed(ensemble.seed);
        let base = controller.initial_weights;
        let mut members = Vec::with_capacity(ensemble.size);
        for index in 0..ensemble.size {
            let weights = base.perturbed(&mut rng, ensemble.weight_perturbation);
            members.push(Member {
                index,
                engine: PhysicsEngine::new(physics.clone())?,
                controller: Controller::with_weights(controller.clone(), weights),
                trainer: Trainer::new(
                    trainer.clone(),
                    format!("{}-{index:02}", ensemble.session),
                ),
                ticks: 0,
                best_ticks: 0,
                episodes: 0,
                episode_reward: 0.0,
                average_reward: 0.0,
                status: MemberStatus::Active,
            });
        }
        info!(members = members.len(), seed = ensemble.seed, "ensemble created");

        Ok(Self {
            population: RwLock::new(Population {
                config: ensemble,
                reward,
                members,
                rng: Mutex::new(rng),
                best_index: 0,
                generation: 0,
                tick: 0,
            }),
        })
    }

    /// Advance every active member by one physics step, then evolve if the
    /// whole population has failed.
    pub fn step(&self) -> TickReport {
        let mut guard = self.population.write();
        let pop = &mut *guard;
        pop.tick += 1;

        let mut failures = Vec::new();
        let mut completed = Vec::new();
        let mut checkpoint_errors = Vec::new();
        for member in pop
            .members
            .iter_mut()
            .filter(|m| m.status == MemberStatus::Active)
        {
            let result = match member.step(&pop.reward, &pop.config) {
                StepOutcome::Continued => continue,
                StepOutcome::Completed(result) => {
                    completed.push(member.index);
                    result
                }
                StepOutcome::Failed(result) => {
                    failures.push(member.index);
                    result
                }
            };
            if let Err(e) = result {
                checkpoint_errors.push((member.index, e));
            }
        }

        pop.refresh_best();
        let evolved = pop
            .members
            .iter()
            .all(|m| m.status == MemberStatus::Failed);
        if evolved {
            pop.evolve();
        }

        TickReport {
            tick: pop.tick,
            failures,
            completed,
            evolved,
            generation: pop.generation,
            best_index: pop.best_index,
            best_ticks: pop.members[pop.best_index].best_ticks,
            checkpoint_errors,
        }
    }

    /// Run an evolution event now, whatever the member states.
    pub fn evolve(&self) {
        self.population.write().evolve();
    }

    #[must_use]
    pub fn best_index(&self) -> usize {
        self.population.read().best_index
    }

    /// Longest episode any member has survived.
    #[must_use]
    pub fn best_ticks(&self) -> u64 {
        let pop = self.population.read();
        pop.members[pop.best_index].best_ticks
    }

    #[must_use]
    pub fn best_parameters(&self) -> ControllerParameters {
        let pop = self.population.read();
        pop.members[pop.best_index].controller.parameters().clone()
    }

    #[must_use]
    pub fn best_weights(&self) -> Weights {
        let pop = self.population.read();
        pop.members[pop.best_index].controller.weights()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<MemberSnapshot> {
        self.population
            .read()
            .members
            .iter()
            .map(Member::snapshot)
            .collect()
    }

    /// Consistent view of the whole population at one tick boundary.
    #[must_use]
    pub fn population(&self) -> PopulationSnapshot {
        let pop = self.population.read();
        PopulationSnapshot {
            tick: pop.tick,
            generation: pop.generation,
            best_index: pop.best_index,
            members: pop.members.iter().map(Member::snapshot).collect(),
        }
    }

    #[must_use]
    pub fn member(&self, index: usize) -> Option<MemberSnapshot> {
        self.population.read().members.get(index).map(Member::snapshot)
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.population.read().generation
    }

    #[must_use]
    pub fn tick(&self) -> u64 {
        self.population.read().tick
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.population.read().members.len()
    }

    /// Give every member a JSON checkpoint store writing into `dir`, with
    /// file names prefixed `member_<index>`.
    pub fn attach_checkpoints(&self, dir: impl AsRef<Path>) {
        let dir = dir.as_ref();
        for member in &mut self.population.write().members {
            let store = JsonCheckpointStore::new(dir, format!("member_{:02}", member.index));
            member.trainer.set_store(Box::new(store));
        }
    }

    /// Give every member the sink `factory` builds for its index.
    pub fn attach_metrics<F>(&self, mut factory: F)
    where
        F: FnMut(usize) -> Box<dyn MetricsSink>,
    {
        for member in &mut self.population.write().members {
            member.trainer.set_sink(factory(member.index));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(size: usize) -> EnsembleManager {
        let mut settings = Settings::default();
        settings.ensemble.size = size;
        EnsembleManager::from_settings(settings).unwrap()
    }

    #[test]
    fn members_start_from_perturbed_base_weights() {
        let ensemble = manager(6);
        let base = Weights::default().to_array();
        let snapshot = ensemble.snapshot();
        assert_eq!(snapshot.len(), 6);
        for member in &snapshot {
            for (w, b) in member.weights.to_array().iter().zip(base) {
                assert!((w - b).abs() <= 0.1 + 1e-6);
            }
            assert_eq!(member.state, SimulationState::at_rest(std::f32::consts::PI));
        }
        assert_ne!(snapshot[0].weights, snapshot[1].weights);
    }

    #[test]
    fn same_seed_gives_same_population() {
        let a = manager(4).snapshot();
        let b = manager(4).snapshot();
        for (x, y) in a.iter().zip(&b) {
            assert!(x.weights.bit_eq(&y.weights));
        }
    }

    #[test]
    fn elites_survive_evolution_bit_identical() {
        let ensemble = manager(10);
        {
            let mut pop = ensemble.population.write();
            for (i, member) in pop.members.iter_mut().enumerate() {
                member.best_ticks = [5, 80, 12, 80, 3, 40, 7, 1, 90, 2][i];
                member.episodes = 3;
                member.status = MemberStatus::Failed;
            }
        }
        let before = ensemble.snapshot();

        ensemble.evolve();
        let after = ensemble.snapshot();

        // 10 * 0.2 = 2 elites: index 8 (90) then index 1 (80, lower index wins)
        for i in [8, 1] {
            assert!(after[i].weights.bit_eq(&before[i].weights));
            assert_eq!(after[i].best_ticks, before[i].best_ticks);
            assert_eq!(after[i].episodes, 3);
        }
        assert_eq!(ensemble.best_index(), 8);
        assert_eq!(ensemble.generation(), 1);
        assert!(after.iter().all(|m| m.status == MemberStatus::Active));

        let replaced: Vec<_> = after.iter().filter(|m| m.best_ticks == 0).collect();
        assert_eq!(replaced.len(), 8);
        assert!(replaced.iter().all(|m| m.episodes == 0));
    }

    /// Ranks as in `elites_survive_evolution_bit_identical`, with the two
    /// elites (8 and 1) pushed far apart.
    fn ranked_with_distant_elites(crossover_perturbation: f32) -> EnsembleManager {
        let ensemble = manager(10);
        {
            let mut pop = ensemble.population.write();
            pop.config.crossover_perturbation = crossover_perturbation;
            for (i, member) in pop.members.iter_mut().enumerate() {
                member.best_ticks = [5, 80, 12, 80, 3, 40, 7, 1, 90, 2][i];
                member.status = MemberStatus::Failed;
            }
            pop.members[8].controller.replace_weights(Weights::new(1.0, 1.0, 1.0));
            pop.members[1].controller.replace_weights(Weights::new(-1.0, -1.0, -1.0));
        }
        ensemble
    }

    #[test]
    fn each_band_draws_from_its_own_operator() {
        let ensemble = ranked_with_distant_elites(0.05);
        ensemble.evolve();
        let after = ensemble.snapshot();
        let elites = [Weights::new(1.0, 1.0, 1.0), Weights::new(-1.0, -1.0, -1.0)];
        let eps = 1e-5;

        // ranks 2..7: blends of the two elites plus at most 0.05 of noise
        for i in [3, 5, 2, 6, 0] {
            for w in after[i].weights.to_array() {
                assert!((-1.05 - eps..=1.05 + eps).contains(&w), "member {i}: {w}");
            }
        }
        // bottom three: one elite plus at most mutation_rate of noise
        for i in [4, 9, 7] {
            let near = elites.iter().any(|e| {
                e.to_array()
                    .iter()
                    .zip(after[i].weights.to_array())
                    .all(|(e, w)| (e - w).abs() <= 0.2 + eps)
            });
            assert!(near, "member {i} is not a mutated elite: {:?}", after[i].weights);
        }
    }

    #[test]
    fn crossover_blends_two_different_elites() {
        let ensemble = ranked_with_distant_elites(0.0);
        ensemble.evolve();
        let after = ensemble.snapshot();
        for i in [3, 5, 2, 6, 0] {
            let w = after[i].weights;
            assert!(w.angle > -1.0 && w.angle < 1.0, "member {i} copied an elite: {w:?}");
            assert_eq!(w.angle, w.angular_velocity);
            assert_eq!(w.angle, w.bias);
        }
    }

    #[test]
    fn parents_differ_when_there_is_a_choice() {
        let mut rng = fastrand::Rng::with_seed(7);
        for count in 2..6 {
            for _ in 0..500 {
                let (a, b) = pick_parents(&mut rng, count);
                assert_ne!(a, b);
                assert!(a < count && b < count);
            }
        }
        assert_eq!(pick_parents(&mut rng, 1), (0, 0));
    }

    #[test]
    fn single_member_is_its_own_elite() {
        let ensemble = manager(1);
        let before = ensemble.best_weights();
        ensemble.evolve();
        assert!(ensemble.best_weights().bit_eq(&before));
    }
}
