//! # Balance Training
//!
//! Training infrastructure around the single-neuron controller:
//!
//! - [`Trainer`]: batched, momentum-smoothed updates and episode bookkeeping
//!   for one controller
//! - [`EnsembleManager`]: a population of independent learners evolved by
//!   elitism, mutation and crossover
//! - [`CheckpointStore`] / [`JsonCheckpointStore`]: checkpoint persistence
//! - [`MetricsSink`]: write-only hand-off of training metrics
//! - [`Settings`]: every configuration section, loadable from JSON
//!
//! ```no_run
//! use rl::{EnsembleManager, Settings};
//!
//! let ensemble = EnsembleManager::from_settings(Settings::default())?;
//! for _ in 0..10_000 {
//!     let report = ensemble.step();
//!     if report.evolved {
//!         println!("generation {} best {}", report.generation, report.best_ticks);
//!     }
//! }
//! # Ok::<(), rl::ConfigError>(())
//! ```

pub mod checkpoint;
pub mod ensemble;
pub mod experience;
pub mod metrics;
pub mod settings;
pub mod trainer;

pub use checkpoint::{
    read_checkpoint, Checkpoint, CheckpointStore, JsonCheckpointStore, PersistenceError,
    FORMAT_VERSION,
};
pub use ensemble::{
    EnsembleConfig, EnsembleManager, MemberSnapshot, MemberStatus, PopulationSnapshot, TickReport,
};
pub use experience::Experience;
pub use metrics::{MemorySink, MetricKind, MetricRecord, MetricsSink, TracingSink};
pub use settings::{ConfigError, Settings};
pub use trainer::{BatchSummary, EpisodeMetrics, EpisodeSummary, Trainer, TrainerConfig};
