//! # Batch Trainer
//!
//! Buffers transitions for one controller and turns each full batch into a
//! single momentum-smoothed weight update. Only the best-rewarded fraction of
//! a batch contributes to the gradient. At the end of every episode the
//! trainer flushes the partial batch, updates its success bookkeeping,
//! decays the learning rate and saves a checkpoint when one is due.

use ml::{signum_or_zero, Controller, Momentum};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::checkpoint::{Checkpoint, CheckpointStore, PersistenceError};
use crate::experience::Experience;
use crate::metrics::{MetricKind, MetricRecord, MetricsSink};
use crate::settings::ConfigError;

/// Configuration for a [`Trainer`]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Experiences per gradient update
    pub batch_size: usize,
    /// Fraction of each batch, best rewards first, used for the gradient
    pub top_fraction: f32,
    pub discount: f32,
    /// Smoothing factor of the running gradient
    pub momentum: f32,
    /// An episode succeeds when its closest approach to upright (the
    /// smallest `|θ|` over its steps) is within this many radians. Starting
    /// from hanging, a single swing through the band is enough; staying
    /// there is not required. Steps inside the band also count toward
    /// `balance_ticks`.
    pub success_approach_angle: f32,
    /// Number of recent episodes in the success rate
    pub success_history: usize,
    /// Success rate from which the gentler decay applies
    pub high_success_rate: f32,
    /// Learning rate multiplier applied after each episode
    pub decay: f32,
    /// Multiplier used instead once the success rate is high
    pub decay_when_successful: f32,
    /// Save a checkpoint after this many episodes...
    pub checkpoint_every: u32,
    /// ...or after this many seconds, whichever comes first
    pub checkpoint_interval_secs: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            top_fraction: 0.8,
            discount: 0.95,
            momentum: 0.9,
            success_approach_angle: 0.2,
            success_history: 20,
            high_success_rate: 0.8,
            decay: 0.999,
            decay_when_successful: 0.99,
            checkpoint_every: 50,
            checkpoint_interval_secs: 300,
        }
    }
}

impl TrainerConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first unusable field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |field: &'static str, reason: &'static str| -> Result<(), ConfigError> {
            Err(ConfigError::Invalid { field, reason })
        };

        if self.batch_size == 0 {
            return fail("batch_size", "must be at least 1");
        }
        if !(self.top_fraction > 0.0 && self.top_fraction <= 1.0) {
            return fail("top_fraction", "must be in (0, 1]");
        }
        if !(0.0..=1.0).contains(&self.discount) {
            return fail("discount", "must be in [0, 1]");
        }
        if !(0.0..1.0).contains(&self.momentum) {
            return fail("momentum", "must be in [0, 1)");
        }
        if !(self.success_approach_angle >= 0.0 && self.success_approach_angle.is_finite()) {
            return fail("success_approach_angle", "must be a non-negative angle");
        }
        if self.success_history == 0 {
            return fail("success_history", "must hold at least one episode");
        }
        if !(self.decay > 0.0 && self.decay <= 1.0)
            || !(self.decay_when_successful > 0.0 && self.decay_when_successful <= 1.0)
        {
            return fail("decay", "decay factors must be in (0, 1]");
        }
        if self.checkpoint_every == 0 {
            return fail("checkpoint_every", "must be at least 1");
        }
        Ok(())
    }
}

/// Result of one batch update
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BatchSummary {
    /// Experiences that contributed to the gradient
    pub retained: usize,
    /// Experiences that were in the buffer
    pub buffered: usize,
    pub mean_td_error: f32,
    /// Weight change that was requested, before clipping
    pub delta: [f32; 3],
}

/// Running totals for the current episode
#[derive(Clone, Debug, PartialEq)]
pub struct EpisodeMetrics {
    pub total_reward: f32,
    pub steps: u64,
    /// Largest distance from upright seen this episode
    pub max_angle: f32,
    /// Closest approach to upright this episode
    pub min_angle: f32,
    /// Steps spent within the success angle
    pub balance_ticks: u64,
}

impl Default for EpisodeMetrics {
    fn default() -> Self {
        Self {
            total_reward: 0.0,
            steps: 0,
            max_angle: 0.0,
            min_angle: f32::INFINITY,
            balance_ticks: 0,
        }
    }
}

impl EpisodeMetrics {
    fn observe(&mut self, exp: &Experience, band: f32) {
        let deviation = exp.next_state.upright_deviation();
        self.total_reward += exp.reward;
        self.steps += 1;
        self.max_angle = self.max_angle.max(deviation);
        self.min_angle = self.min_angle.min(deviation);
        if deviation <= band {
            self.balance_ticks += 1;
        }
    }
}

/// Per-episode summary handed to the metrics sink
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EpisodeSummary {
    pub episode: u64,
    pub ticks: u64,
    pub steps: u64,
    pub total_reward: f32,
    pub max_angle: f32,
    pub min_angle: f32,
    pub balance_ticks: u64,
    pub success: bool,
    pub success_rate: f32,
    pub learning_rate: f32,
    pub checkpoint: Option<PathBuf>,
}

pub struct Trainer {
    config: TrainerConfig,
    session: String,
    buffer: Vec<Experience>,
    gradient: Momentum,
    episode: EpisodeMetrics,
    episodes: u64,
    total_steps: u64,
    successes: VecDeque<bool>,
    episodes_since_checkpoint: u32,
    last_checkpoint: Instant,
    last_summary: Option<EpisodeSummary>,
    store: Option<Box<dyn CheckpointStore>>,
    sink: Option<Box<dyn MetricsSink>>,
}

impl Trainer {
    #[must_use]
    pub fn new(config: TrainerConfig, session: impl Into<String>) -> Self {
        let gradient = Momentum::new(config.momentum);
        Self {
            buffer: Vec::with_capacity(config.batch_size),
            gradient,
            episode: EpisodeMetrics::default(),
            episodes: 0,
            total_steps: 0,
            successes: VecDeque::with_capacity(config.success_history),
            episodes_since_checkpoint: 0,
            last_checkpoint: Instant::now(),
            last_summary: None,
            store: None,
            sink: None,
            session: session.into(),
            config,
        }
    }

    #[must_use]
    pub fn with_store(mut self, store: Box<dyn CheckpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Box<dyn MetricsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn set_store(&mut self, store: Box<dyn CheckpointStore>) {
        self.store = Some(store);
    }

    pub fn set_sink(&mut self, sink: Box<dyn MetricsSink>) {
        self.sink = Some(sink);
    }

    #[must_use]
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    #[must_use]
    pub fn session(&self) -> &str {
        &self.session
    }

    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    #[must_use]
    pub fn current_episode(&self) -> &EpisodeMetrics {
        &self.episode
    }

    #[must_use]
    pub fn last_summary(&self) -> Option<&EpisodeSummary> {
        self.last_summary.as_ref()
    }

    /// Fraction of successful episodes among the recent history.
    #[must_use]
    pub fn success_rate(&self) -> f32 {
        if self.successes.is_empty() {
            return 0.0;
        }
        let hits = self.successes.iter().filter(|&&s| s).count();
        hits as f32 / self.successes.len() as f32
    }

    /// Buffer one transition, running a batch update once the buffer is full.
    pub fn add_experience(
        &mut self,
        controller: &mut Controller,
        exp: Experience,
    ) -> Option<BatchSummary> {
        self.episode.observe(&exp, self.config.success_approach_angle);
        self.total_steps += 1;
        self.buffer.push(exp);
        if self.buffer.len() >= self.config.batch_size {
            self.process_batch(controller)
        } else {
            None
        }
    }

    /// Apply one aggregate update from the buffered experiences and clear
    /// the buffer. Returns `None` when the buffer is empty.
    pub fn process_batch(&mut self, controller: &mut Controller) -> Option<BatchSummary> {
        if self.buffer.is_empty() {
            return None;
        }

        let mut batch = std::mem::take(&mut self.buffer);
        batch.sort_by(|a, b| b.reward.total_cmp(&a.reward));
        let buffered = batch.len();
        let retained = retained_count(buffered, self.config.top_fraction);

        let mut td_sum = 0.0;
        for exp in &batch[..retained] {
            let value = controller.evaluate(exp.state.angle, exp.state.angular_velocity);
            let next_value = if exp.terminal {
                0.0
            } else {
                controller.evaluate(exp.next_state.angle, exp.next_state.angular_velocity)
            };
            let td_error = exp.reward + self.config.discount * next_value - value;
            td_sum += td_error;

            let direction = signum_or_zero(exp.action);
            let inputs = controller.inputs(exp.state.angle, exp.state.angular_velocity);
            self.gradient.smooth(inputs.map(|x| td_error * direction * x));
        }

        let lr = controller.effective_learning_rate();
        let delta = self.gradient.velocity().map(|g| lr * g);
        controller.apply_delta(delta);

        // Keep the allocation for the next batch
        batch.clear();
        self.buffer = batch;

        let summary = BatchSummary {
            retained,
            buffered,
            mean_td_error: td_sum / retained as f32,
            delta,
        };
        self.emit(
            MetricKind::Batch,
            "mean_td_error",
            f64::from(summary.mean_td_error),
        );
        Some(summary)
    }

    /// Close the current episode.
    ///
    /// # Errors
    ///
    /// Returns the [`PersistenceError`] of a checkpoint that was due but
    /// could not be written. All episode bookkeeping, including the learning
    /// rate decay, has already been applied by then, and the summary is
    /// available from [`Trainer::last_summary`].
    pub fn on_episode_end(
        &mut self,
        controller: &mut Controller,
        ticks: u64,
    ) -> Result<EpisodeSummary, PersistenceError> {
        let _ = self.process_batch(controller);

        let metrics = std::mem::take(&mut self.episode);
        let success =
            metrics.steps > 0 && metrics.min_angle <= self.config.success_approach_angle;
        self.successes.push_back(success);
        while self.successes.len() > self.config.success_history {
            self.successes.pop_front();
        }

        let rate = self.success_rate();
        let decay = if rate >= self.config.high_success_rate {
            self.config.decay_when_successful
        } else {
            self.config.decay
        };
        controller.scale_learning_rate(decay);

        self.episodes += 1;
        self.episodes_since_checkpoint += 1;

        let mut summary = EpisodeSummary {
            episode: self.episodes,
            ticks,
            steps: metrics.steps,
            total_reward: metrics.total_reward,
            max_angle: metrics.max_angle,
            min_angle: if metrics.steps > 0 { metrics.min_angle } else { 0.0 },
            balance_ticks: metrics.balance_ticks,
            success,
            success_rate: rate,
            learning_rate: controller.learning_rate(),
            checkpoint: None,
        };
        debug!(
            session = %self.session,
            episode = summary.episode,
            ticks,
            success,
            "episode closed"
        );

        let saved = if self.checkpoint_due() {
            self.save_checkpoint(controller)
        } else {
            Ok(None)
        };
        if let Ok(path) = &saved {
            summary.checkpoint.clone_from(path);
        }

        if let Some(sink) = self.sink.as_mut() {
            sink.record_episode(&self.session, &summary);
        }
        self.last_summary = Some(summary.clone());

        saved.map(|_| summary)
    }

    fn checkpoint_due(&self) -> bool {
        self.store.is_some()
            && (self.episodes_since_checkpoint >= self.config.checkpoint_every
                || self.last_checkpoint.elapsed()
                    >= Duration::from_secs(self.config.checkpoint_interval_secs))
    }

    /// Save the controller now, regardless of the schedule. Returns
    /// `Ok(None)` when no store is attached.
    ///
    /// # Errors
    ///
    /// Propagates the store's [`PersistenceError`]. The schedule restarts
    /// either way; failed saves are not retried.
    pub fn save_checkpoint(
        &mut self,
        controller: &Controller,
    ) -> Result<Option<PathBuf>, PersistenceError> {
        let Some(store) = self.store.as_mut() else {
            return Ok(None);
        };
        self.episodes_since_checkpoint = 0;
        self.last_checkpoint = Instant::now();

        match store.save(&Checkpoint::from_controller(controller)) {
            Ok(path) => {
                info!(session = %self.session, "saved checkpoint {}", path.display());
                self.emit(MetricKind::Checkpoint, "saved", 1.0);
                Ok(Some(path))
            }
            Err(e) => {
                warn!(session = %self.session, "checkpoint failed: {e}");
                self.emit(MetricKind::Checkpoint, "saved", 0.0);
                Err(e)
            }
        }
    }

    /// Load a checkpoint through the attached store into `controller`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::NotFound`] when no store is attached or
    /// the file is missing, plus whatever the store or
    /// [`Checkpoint::apply_to`] reports.
    pub fn restore_checkpoint(
        &self,
        controller: &mut Controller,
        path: &Path,
    ) -> Result<Checkpoint, PersistenceError> {
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| PersistenceError::NotFound(path.to_path_buf()))?;
        let checkpoint = store.load(path)?;
        checkpoint.apply_to(controller)?;
        Ok(checkpoint)
    }

    /// Drop buffered experiences and all episode and momentum state.
    /// Attached store and sink are kept.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.gradient.reset();
        self.episode = EpisodeMetrics::default();
        self.episodes = 0;
        self.successes.clear();
        self.episodes_since_checkpoint = 0;
        self.last_checkpoint = Instant::now();
        self.last_summary = None;
    }

    fn emit(&mut self, kind: MetricKind, name: &str, value: f64) {
        if let Some(sink) = self.sink.as_mut() {
            sink.record(MetricRecord::new(
                &self.session,
                self.episodes,
                self.total_steps,
                kind,
                name,
                value,
            ));
        }
    }
}

/// `ceil(len * fraction)`, at least one and at most `len`.
fn retained_count(len: usize, fraction: f32) -> usize {
    let wanted = (len as f32 * fraction).ceil();
    if wanted.is_nan() || wanted < 1.0 {
        1
    } else {
        (wanted as usize).min(len)
    }
}
