//! Write-only metrics hand-off.
//!
//! The trainer pushes timestamped records and per-episode summaries into a
//! [`MetricsSink`]; nothing in the training loop ever reads them back.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::trainer::EpisodeSummary;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Step,
    Batch,
    Episode,
    Checkpoint,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricRecord {
    pub timestamp: DateTime<Utc>,
    pub session: String,
    pub episode: u64,
    pub step: u64,
    pub kind: MetricKind,
    pub name: String,
    pub value: f64,
    pub metadata: Option<serde_json::Value>,
}

impl MetricRecord {
    #[must_use]
    pub fn new(
        session: &str,
        episode: u64,
        step: u64,
        kind: MetricKind,
        name: &str,
        value: f64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            session: session.to_string(),
            episode,
            step,
            kind,
            name: name.to_string(),
            value,
            metadata: None,
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

pub trait MetricsSink: Send + Sync {
    fn record(&mut self, record: MetricRecord);
    fn record_episode(&mut self, session: &str, summary: &EpisodeSummary);
}

/// Forwards everything to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn record(&mut self, record: MetricRecord) {
        debug!(
            session = %record.session,
            episode = record.episode,
            step = record.step,
            kind = ?record.kind,
            "{} = {}",
            record.name,
            record.value
        );
    }

    fn record_episode(&mut self, session: &str, summary: &EpisodeSummary) {
        info!(
            session,
            episode = summary.episode,
            ticks = summary.ticks,
            total_reward = summary.total_reward,
            max_angle = summary.max_angle,
            success = summary.success,
            "episode finished"
        );
    }
}

/// Keeps everything in memory. Clones share the same buffers, so a driver
/// can keep one handle and give others to trainers.
#[derive(Clone, Debug, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<MetricRecord>>>,
    episodes: Arc<Mutex<Vec<(String, EpisodeSummary)>>>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn records(&self) -> Vec<MetricRecord> {
        self.records.lock().clone()
    }

    #[must_use]
    pub fn episodes(&self) -> Vec<(String, EpisodeSummary)> {
        self.episodes.lock().clone()
    }
}

impl MetricsSink for MemorySink {
    fn record(&mut self, record: MetricRecord) {
        self.records.lock().push(record);
    }

    fn record_episode(&mut self, session: &str, summary: &EpisodeSummary) {
        self.episodes
            .lock()
            .push((session.to_string(), summary.clone()));
    }
}
