/// Derived rates and the human-readable summary for a cache run.
///
/// All counters are public so the engine can update them directly; `report`
/// renders a fixed line set: accesses, allocated bytes, hit/miss percentages
/// with warmup excluded, compulsory misses, fills, evictions, and averages.
#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub accesses: u64,
    pub hits: u64,
    pub misses: u64,
    pub compulsory_misses: u64,
    pub fills: u64,
    pub evictions: u64,
    pub accesses_triggering_evictions: u64,
    pub misses_triggering_evictions: u64,
    pub cumulative_allocated_space: u64,
    pub cumulative_filled_space: u64,
    pub cumulative_evicted_space: u64,
    pub warmup_misses: u64,
    pub warmup_accesses: u64,
}

impl Stats {
    pub fn new(warmup_accesses: u64) -> Self {
        Stats { warmup_accesses, ..Default::default() }
    }

    pub fn hit_rate(&self) -> f64 {
        if self.accesses == 0 {
            0.0
        } else {
            self.hits as f64 / self.accesses as f64 * 100.0
        }
    }

    /// Accesses past the warmup prefix; the denominator for the headline miss rate.
    pub fn post_warmup_accesses(&self) -> u64 {
        self.accesses.saturating_sub(self.warmup_accesses)
    }

    fn post_warmup_misses(&self) -> u64 {
        self.misses.saturating_sub(self.warmup_misses)
    }

    /// Miss rate with the warmup window excluded from both numerator and denominator.
    pub fn miss_rate(&self) -> f64 {
        let denom = self.post_warmup_accesses();
        if denom == 0 {
            0.0
        } else {
            self.post_warmup_misses() as f64 / denom as f64 * 100.0
        }
    }

    /// Hit rate among accesses that were not the first-ever touch of their key.
    pub fn non_compulsory_hit_rate(&self) -> f64 {
        let denom = self.accesses.saturating_sub(self.compulsory_misses);
        if denom == 0 {
            0.0
        } else {
            self.hits as f64 / denom as f64 * 100.0
        }
    }

    pub fn avg_evictions_per_trigger(&self) -> f64 {
        if self.accesses_triggering_evictions == 0 {
            0.0
        } else {
            self.evictions as f64 / self.accesses_triggering_evictions as f64
        }
    }

    pub fn report(&self) -> String {
        format!(
            "accesses={accesses} allocated={allocated}B\n\
             hits={hits} ({hit_rate:.2}%)\n\
             misses={misses} ({miss_rate:.2}%, warmup excluded)\n\
             compulsory_misses={compulsory_misses} non_compulsory_hit_rate={ncq:.2}%\n\
             fills={fills} filled={filled}B\n\
             misses_triggering_evictions={misses_triggering_evictions}\n\
             evictions={evictions} evicted={evicted}B\n\
             accesses_triggering_evictions={accesses_triggering_evictions} avg_evictions_per_trigger={avg:.3}\n\
             warmup_misses={warmup_misses} warmup_accesses={warmup_accesses}",
            accesses = self.accesses,
            allocated = self.cumulative_allocated_space,
            hits = self.hits,
            hit_rate = self.hit_rate(),
            misses = self.misses,
            miss_rate = self.miss_rate(),
            compulsory_misses = self.compulsory_misses,
            ncq = self.non_compulsory_hit_rate(),
            fills = self.fills,
            filled = self.cumulative_filled_space,
            misses_triggering_evictions = self.misses_triggering_evictions,
            evictions = self.evictions,
            evicted = self.cumulative_evicted_space,
            accesses_triggering_evictions = self.accesses_triggering_evictions,
            avg = self.avg_evictions_per_trigger(),
            warmup_misses = self.warmup_misses,
            warmup_accesses = self.warmup_accesses,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectral::prelude::*;

    #[test]
    fn miss_rate_excludes_warmup() {
        let mut stats = Stats::new(2);
        stats.accesses = 3;
        stats.misses = 3;
        stats.warmup_misses = 2;
        asserting("post-warmup accesses").that(&stats.post_warmup_accesses()).is_equal_to(1);
        asserting("miss rate is 100% on the single post-warmup miss")
            .that(&stats.miss_rate())
            .is_close_to(100.0, 1e-9);
    }

    #[test]
    fn rates_are_zero_with_no_accesses() {
        let stats = Stats::new(0);
        asserting("hit rate").that(&stats.hit_rate()).is_equal_to(0.0);
        asserting("miss rate").that(&stats.miss_rate()).is_equal_to(0.0);
        asserting("non-compulsory hit rate").that(&stats.non_compulsory_hit_rate()).is_equal_to(0.0);
    }
}
