//! # Balance Application Logic
//!
//! Builds the ensemble from settings and drives it for a fixed number of
//! ticks, logging evolution events and a periodic population summary.

use anyhow::{Context, Result};
use rl::{EnsembleManager, MetricsSink, Settings, TracingSink};

use crate::Args;

/// Resolve settings from the file and command line overrides.
///
/// # Errors
///
/// Returns an error when the settings file cannot be read or the resulting
/// settings do not validate.
pub fn load_settings(args: &Args) -> Result<Settings> {
    let mut settings = match &args.config {
        Some(path) => Settings::from_json_file(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(members) = args.members {
        settings.ensemble.size = members;
    }
    if let Some(seed) = args.seed {
        settings.ensemble.seed = seed;
    }
    settings.validate().context("validating settings")?;
    Ok(settings)
}

/// Run the training loop.
///
/// # Errors
///
/// Returns an error for unusable settings. Checkpoint failures during the
/// run are logged and training continues.
pub fn run(args: Args) -> Result<()> {
    tracing_subscriber::fmt::init();

    let settings = load_settings(&args)?;
    tracing::info!(
        members = settings.ensemble.size,
        seed = settings.ensemble.seed,
        ticks = args.ticks,
        "initializing ensemble"
    );
    let ensemble = EnsembleManager::from_settings(settings)?;
    ensemble.attach_metrics(|_| Box::new(TracingSink) as Box<dyn MetricsSink>);
    if let Some(dir) = &args.checkpoint_dir {
        ensemble.attach_checkpoints(dir);
        tracing::info!("writing checkpoints to {}", dir.display());
    }

    let report_every = args.report_every.max(1);
    for _ in 0..args.ticks {
        let report = ensemble.step();
        for (member, e) in &report.checkpoint_errors {
            tracing::warn!(member, "checkpoint failed: {e}");
        }
        if report.evolved {
            tracing::info!(
                generation = report.generation,
                best = report.best_index,
                best_ticks = report.best_ticks,
                "generation complete"
            );
        }
        if report.tick % report_every == 0 {
            let population = ensemble.population();
            let active = population
                .members
                .iter()
                .filter(|m| m.status == rl::MemberStatus::Active)
                .count();
            let best = &population.members[population.best_index];
            tracing::info!(
                tick = population.tick,
                active,
                generation = population.generation,
                best_ticks = best.best_ticks,
                success_rate = best.success_rate,
                learning_rate = best.learning_rate,
                difficulty = best.difficulty,
                "population"
            );
        }
    }

    let best = ensemble.best_weights();
    tracing::info!(
        generation = ensemble.generation(),
        best_ticks = ensemble.best_ticks(),
        "finished; best weights angle={:.4} angular_velocity={:.4} bias={:.4}",
        best.angle,
        best.angular_velocity,
        best.bias
    );
    Ok(())
}
