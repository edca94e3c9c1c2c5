use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::error::ConfigError;

/// Selects which of the two eviction-loop variants the cache engine runs.
/// A compile-time flag would force choosing one variant per build; a runtime
/// enum lets one binary demonstrate either, and lets tests cover both without
/// duplicate builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AdmissionPolicy {
    /// Evict until the request fits; every nominated victim (other than the
    /// requesting key on a hit-with-grow) is committed.
    Baseline,
    /// Build a candidate victim set, then ask the policy's cost/benefit gate
    /// whether the set is worth evicting before committing it.
    CostBenefit,
}

/// The flat set of knobs the simulator is configured with, fixed for the
/// lifetime of a run.
#[derive(Debug, Clone, Parser)]
#[command(name = "lhdsim", about = "Trace-driven simulator for the LHD cache replacement policy")]
pub struct Config {
    /// Path to the trace file to replay.
    #[arg(long)]
    pub trace: PathBuf,

    /// Cache capacity in bytes.
    #[arg(long)]
    pub available_capacity: u64,

    /// Number of tags sampled per `rank()` call once the policy has warmed up.
    #[arg(long, default_value_t = 32)]
    pub associativity: usize,

    /// Length of the recently-admitted ring buffer.
    #[arg(long, default_value_t = 8)]
    pub admission_samples: usize,

    /// Which eviction-loop variant to run.
    #[arg(long, value_enum, default_value_t = AdmissionPolicy::Baseline)]
    pub admission: AdmissionPolicy,

    /// Seed for the deterministic random sampler.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Number of leading accesses excluded from the headline miss rate.
    #[arg(long, default_value_t = 128_000_000)]
    pub warmup_accesses: u64,

    /// How often (in accesses) to print a progress line. Zero disables it.
    #[arg(long, default_value_t = 1_000_000)]
    pub stats_interval: u64,

    /// Emit per-class rank/hit/eviction diagnostics at every reconfiguration.
    #[arg(long, default_value_t = false)]
    pub dump_class_ranks: bool,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.available_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.associativity == 0 {
            return Err(ConfigError::ZeroAssociativity);
        }
        if self.admission_samples == 0 {
            return Err(ConfigError::ZeroAdmissionSamples);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectral::prelude::*;

    fn base() -> Config {
        Config {
            trace: PathBuf::from("trace.csv"),
            available_capacity: 100,
            associativity: 32,
            admission_samples: 8,
            admission: AdmissionPolicy::Baseline,
            seed: 0,
            warmup_accesses: 0,
            stats_interval: 0,
            dump_class_ranks: false,
        }
    }

    #[test]
    fn rejects_zero_capacity() {
        let mut cfg = base();
        cfg.available_capacity = 0;
        asserting("zero capacity rejected").that(&cfg.validate().is_err()).is_true();
    }

    #[test]
    fn rejects_zero_associativity() {
        let mut cfg = base();
        cfg.associativity = 0;
        asserting("zero associativity rejected").that(&cfg.validate().is_err()).is_true();
    }

    #[test]
    fn rejects_zero_admission_samples() {
        let mut cfg = base();
        cfg.admission_samples = 0;
        asserting("zero admission samples rejected").that(&cfg.validate().is_err()).is_true();
    }

    #[test]
    fn accepts_sane_config() {
        asserting("sane config accepted").that(&base().validate().is_ok()).is_true();
    }
}
