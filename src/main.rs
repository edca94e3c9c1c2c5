use anyhow::{Context, Result};
use clap::Parser;

use lhdsim::{Cache, Config, LhdPolicy, TraceReader};

/// Replay a trace file through the cache engine and print a final stats report.
fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::parse();
    config.validate().context("invalid configuration")?;

    let policy = LhdPolicy::new(config.associativity, config.admission_samples, config.available_capacity, config.seed)
        .with_diagnostics(config.dump_class_ranks);
    let mut cache = Cache::new(
        config.available_capacity,
        config.associativity,
        config.admission,
        config.warmup_accesses,
        policy,
    );

    let reader = TraceReader::open(&config.trace)
        .with_context(|| format!("opening trace file {}", config.trace.display()))?;

    for (line_no, request) in reader.enumerate() {
        let request = request.with_context(|| format!("reading trace line {}", line_no + 1))?;
        cache
            .access(&request)
            .with_context(|| format!("processing trace line {} ({:?})", line_no + 1, request))?;

        if config.stats_interval > 0 && cache.stats().accesses % config.stats_interval == 0 {
            tracing::info!(accesses = cache.stats().accesses, hit_rate = cache.stats().hit_rate(), "progress");
        }
    }

    println!("{}", cache.stats().report());
    Ok(())
}
