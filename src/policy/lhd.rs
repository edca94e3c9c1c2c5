//! Least Hit Density replacement policy.
//!
//! Ranks cached objects by an estimate of *hit density* — expected future
//! hits per byte per unit access-time — derived from per-class age
//! histograms that are periodically decayed and rebuilt. Ported from
//! `yipkeikwok/LHD`'s `lhd.cpp`/`lhd.hpp`.

use std::collections::HashMap;

use crate::candidate::Candidate;
use crate::error::CacheError;
use crate::request::Request;
use crate::sampler::Sampler;

use super::{Policy, PolicyContext};

pub(crate) const HIT_AGE_CLASSES: u32 = 16;
pub(crate) const APP_CLASSES: u32 = 16;
pub(crate) const NUM_CLASSES: usize = (HIT_AGE_CLASSES * APP_CLASSES) as usize;
pub(crate) const MAX_AGE: usize = 20_000;
pub(crate) const ACCS_PER_RECONFIGURATION: u64 = 1 << 20;
pub(crate) const EWMA_DECAY: f32 = 0.9;
pub(crate) const EXPLORER_BUDGET_FRACTION: f64 = 0.01;
pub(crate) const EXPLORE_INVERSE_PROBABILITY: usize = 32;
pub(crate) const AGE_COARSENING_ERROR_TOLERANCE: f32 = 0.01;

/// Per-object metadata the policy tracks for everything currently in the
/// cache. Deliberately `Copy` so callers can take a snapshot of a tag
/// without holding a borrow of `LhdPolicy::tags` while they consult other
/// fields of `self` (notably `overflows`, bumped by age coarsening).
#[derive(Debug, Clone, Copy)]
struct Tag {
    timestamp: u64,
    last_hit_age: u64,
    last_last_hit_age: u64,
    app: u32,
    id: Candidate,
    size: u32,
    explorer: bool,
}

/// Per-`(hitAgeClass, appClass)` bucket of age-indexed hit/eviction counts
/// and the derived hit-density curve ranking reads from.
#[derive(Debug, Clone)]
struct Class {
    hits: Vec<f32>,
    evictions: Vec<f32>,
    total_hits: f32,
    total_evictions: f32,
    hit_densities: Vec<f32>,
}

impl Class {
    fn new() -> Self {
        Class {
            hits: vec![0.0; MAX_AGE],
            evictions: vec![0.0; MAX_AGE],
            total_hits: 0.0,
            total_evictions: 0.0,
            hit_densities: vec![0.0; MAX_AGE],
        }
    }

    /// Decay the histograms toward zero and recompute the totals.
    fn decay(&mut self, factor: f32) {
        self.total_hits = 0.0;
        self.total_evictions = 0.0;
        for age in 0..MAX_AGE {
            self.hits[age] *= factor;
            self.evictions[age] *= factor;
            self.total_hits += self.hits[age];
            self.total_evictions += self.evictions[age];
        }
    }
}

pub struct LhdPolicy {
    tags: Vec<Tag>,
    classes: Vec<Class>,
    indices: HashMap<Candidate, usize>,

    timestamp: u64,
    next_reconfiguration: u64,
    num_reconfigurations: u32,

    age_coarsening_shift: u32,
    ewma_num_objects: f32,
    ewma_num_objects_mass: f32,
    overflows: u64,

    sampler: Sampler,
    associativity: usize,

    recently_admitted: Vec<Option<Candidate>>,
    recently_admitted_head: usize,
    ewma_victim_hit_density: f32,

    explorer_budget: i64,

    dump_class_ranks: bool,
}

impl LhdPolicy {
    pub fn new(associativity: usize, admission_samples: usize, available_capacity: u64, seed: u64) -> Self {
        let mut classes: Vec<Class> = (0..NUM_CLASSES).map(|_| Class::new()).collect();
        // Initialize policy to ~GDSF by default, same as the original (lhd.cpp).
        for (c, cl) in classes.iter_mut().enumerate() {
            for a in 0..MAX_AGE {
                cl.hit_densities[a] = (c + 1) as f32 / (a + 1) as f32;
            }
        }

        LhdPolicy {
            tags: Vec::new(),
            classes,
            indices: HashMap::new(),
            timestamp: 0,
            next_reconfiguration: ACCS_PER_RECONFIGURATION,
            num_reconfigurations: 0,
            age_coarsening_shift: 10,
            ewma_num_objects: 0.0,
            ewma_num_objects_mass: 0.0,
            overflows: 0,
            sampler: Sampler::new(seed),
            associativity,
            recently_admitted: vec![None; admission_samples.max(1)],
            recently_admitted_head: 0,
            ewma_victim_hit_density: 0.0,
            explorer_budget: (available_capacity as f64 * EXPLORER_BUDGET_FRACTION) as i64,
            dump_class_ranks: false,
        }
    }

    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.dump_class_ranks = enabled;
        self
    }

    /// `age = (timestamp - tag.timestamp) >> ageCoarseningShift`, clamped to
    /// `MAX_AGE - 1`. Each clamp is an overflow: the age-coarsening shift
    /// couldn't keep the live population's ages inside the histogram domain.
    fn coarsened_age(&mut self, tag: Tag) -> u64 {
        let age = (self.timestamp - tag.timestamp) >> self.age_coarsening_shift;
        if age >= MAX_AGE as u64 {
            self.overflows += 1;
            (MAX_AGE - 1) as u64
        } else {
            age
        }
    }

    /// `hitAgeClass` — roughly `log2(MAX_AGE - age)`: how many left-shifts of
    /// `age` are needed before it reaches or exceeds `MAX_AGE`, capped at
    /// `HIT_AGE_CLASSES - 1`. `age == 0` is a special case mapped to the
    /// highest class.
    fn hit_age_class(age: u64) -> u32 {
        if age == 0 {
            return HIT_AGE_CLASSES - 1;
        }
        let mut age = age;
        let mut log = 0u32;
        while age < MAX_AGE as u64 && log < HIT_AGE_CLASSES - 1 {
            age <<= 1;
            log += 1;
        }
        log
    }

    fn class_index(tag: Tag) -> usize {
        let hit_age_id = Self::hit_age_class(tag.last_hit_age + tag.last_last_hit_age);
        (tag.app * HIT_AGE_CLASSES + hit_age_id) as usize
    }

    /// Estimated hit density of `tag`: hits per byte-cycle, biased up by 1.0
    /// for explorers so they are effectively never the minimum.
    fn density(&mut self, tag: Tag) -> f32 {
        let age = self.coarsened_age(tag);
        if age == (MAX_AGE - 1) as u64 {
            return f32::NEG_INFINITY;
        }
        let class = Self::class_index(tag);
        let mut d = self.classes[class].hit_densities[age as usize] / tag.size as f32;
        if tag.explorer {
            d += 1.0;
        }
        d
    }

    fn reconfigure(&mut self, ctx: PolicyContext) {
        let mut total_hits = 0.0f32;
        let mut total_evictions = 0.0f32;
        for cl in self.classes.iter_mut() {
            cl.decay(EWMA_DECAY);
            total_hits += cl.total_hits;
            total_evictions += cl.total_evictions;
        }

        self.adapt_age_coarsening(ctx);
        self.model_hit_density();

        if self.dump_class_ranks {
            self.log_class_diagnostics();
        }

        tracing::info!(
            timestamp = self.timestamp,
            num_reconfigurations = self.num_reconfigurations,
            age_coarsening_shift = self.age_coarsening_shift,
            hits = total_hits,
            evictions = total_evictions,
            overflows = self.overflows,
            "LHD reconfiguration"
        );

        self.overflows = 0;
    }

    /// Rebuild `hitDensities` per class with a single backward sweep:
    /// `hitDensities[a] = E[hits | ageAtEviction >= a] / E[lifetime | ageAtEviction >= a]`.
    fn model_hit_density(&mut self) {
        for cl in self.classes.iter_mut() {
            let last = MAX_AGE - 1;
            let mut total_events = cl.hits[last] + cl.evictions[last];
            let mut total_hits = cl.hits[last];
            let mut lifetime_unconditioned = total_events;

            for age in (0..MAX_AGE - 1).rev() {
                total_hits += cl.hits[age];
                total_events += cl.hits[age] + cl.evictions[age];
                lifetime_unconditioned += total_events;

                cl.hit_densities[age] = if total_events > 1e-5 {
                    total_hits / lifetime_unconditioned
                } else {
                    0.0
                };
            }
        }
    }

    fn adapt_age_coarsening(&mut self, ctx: PolicyContext) {
        self.ewma_num_objects *= EWMA_DECAY;
        self.ewma_num_objects_mass *= EWMA_DECAY;
        self.ewma_num_objects += ctx.num_objects as f32;
        self.ewma_num_objects_mass += 1.0;

        let num_objects = self.ewma_num_objects / self.ewma_num_objects_mass;
        let optimal = num_objects / (AGE_COARSENING_ERROR_TOLERANCE * MAX_AGE as f32);

        if self.num_reconfigurations == 5 || self.num_reconfigurations == 25 {
            let mut shift = 1u32;
            while ((1u64 << shift) as f32) < optimal {
                shift += 1;
            }

            let delta = shift as i64 - self.age_coarsening_shift as i64;
            self.age_coarsening_shift = shift;

            // Increase weight to delay another shift for a while.
            self.ewma_num_objects *= 8.0;
            self.ewma_num_objects_mass *= 8.0;

            if delta != 0 {
                self.rescale_histograms(delta);
            }
        }
    }

    /// Compress or stretch every class's histograms to approximate the new
    /// age-coarsening resolution chosen by `adapt_age_coarsening`.
    fn rescale_histograms(&mut self, delta: i64) {
        if delta < 0 {
            let shift = (-delta) as u32;
            for cl in self.classes.iter_mut() {
                let start = MAX_AGE >> shift;
                for age in start..MAX_AGE - 1 {
                    cl.hits[MAX_AGE - 1] += cl.hits[age];
                    cl.evictions[MAX_AGE - 1] += cl.evictions[age];
                }
                for age in (0..MAX_AGE - 1).rev() {
                    cl.hits[age] = cl.hits[age >> shift] / (1u64 << shift) as f32;
                    cl.evictions[age] = cl.evictions[age >> shift] / (1u64 << shift) as f32;
                }
            }
        } else {
            let shift = delta as u32;
            for cl in self.classes.iter_mut() {
                let limit = MAX_AGE >> shift;
                for age in 0..limit {
                    let base = age << shift;
                    cl.hits[age] = cl.hits[base];
                    cl.evictions[age] = cl.evictions[base];
                    for i in 1..(1usize << shift) {
                        cl.hits[age] += cl.hits[base + i];
                        cl.evictions[age] += cl.evictions[base + i];
                    }
                }
                for age in limit..MAX_AGE - 1 {
                    cl.hits[age] = 0.0;
                    cl.evictions[age] = 0.0;
                }
            }
        }
    }

    fn log_class_diagnostics(&self) {
        for (c, cl) in self.classes.iter().enumerate() {
            let mut left = cl.total_hits + cl.total_evictions;
            let mut truncate_at = MAX_AGE;
            for age in 0..MAX_AGE {
                left -= cl.hits[age] + cl.evictions[age];
                if cl.hit_densities[age] == 0.0 && left < 1e-2 {
                    truncate_at = age + 1;
                    break;
                }
            }
            tracing::debug!(
                class = c,
                ranks = ?&cl.hit_densities[..truncate_at],
                hits = ?&cl.hits[..truncate_at],
                evictions = ?&cl.evictions[..truncate_at],
                "LHD class diagnostics"
            );
        }
    }
}

impl Policy for LhdPolicy {
    fn rank(&mut self, _req: &Request) -> Result<Candidate, CacheError> {
        if self.tags.is_empty() {
            return Err(CacheError::IndexMismatch("rank called with an empty tag table"));
        }

        let candidates = if self.num_reconfigurations > 50 {
            self.associativity
        } else {
            8
        };

        let mut victim: Option<usize> = None;
        let mut victim_density = f32::MAX;

        for _ in 0..candidates {
            let idx = self.sampler.next_bounded(self.tags.len());
            let tag = self.tags[idx];
            let density = self.density(tag);
            if density < victim_density {
                victim = Some(idx);
                victim_density = density;
            }
        }

        for slot in 0..self.recently_admitted.len() {
            let Some(id) = self.recently_admitted[slot] else { continue };
            // A recently-admitted candidate may since have been evicted.
            let Some(&idx) = self.indices.get(&id) else { continue };
            let tag = self.tags[idx];
            let density = self.density(tag);
            if density < victim_density {
                victim = Some(idx);
                victim_density = density;
            }
        }

        let victim = victim.ok_or(CacheError::IndexMismatch("rank found no candidate"))?;
        self.ewma_victim_hit_density =
            EWMA_DECAY * self.ewma_victim_hit_density + (1.0 - EWMA_DECAY) * victim_density;

        Ok(self.tags[victim].id)
    }

    fn update(&mut self, id: Candidate, req: &Request, ctx: PolicyContext) -> Result<(), CacheError> {
        let insert = !self.indices.contains_key(&id);

        if insert {
            let tag = Tag {
                timestamp: 0,
                last_hit_age: 0,
                last_last_hit_age: (MAX_AGE - 1) as u64,
                app: 0,
                id,
                size: 0,
                explorer: false,
            };
            self.tags.push(tag);
            self.indices.insert(id, self.tags.len() - 1);
        } else {
            let idx = self.indices[&id];
            let mut tag = self.tags[idx];
            let age = self.coarsened_age(tag);
            let class = Self::class_index(tag);
            self.classes[class].hits[age as usize] += 1.0;
            if tag.explorer {
                self.explorer_budget += tag.size as i64;
            }
            tag.last_last_hit_age = tag.last_hit_age;
            tag.last_hit_age = age;
            self.tags[idx] = tag;
        }

        let idx = self.indices[&id];
        let mut tag = self.tags[idx];
        tag.timestamp = self.timestamp;
        tag.app = id.app_class(APP_CLASSES);
        tag.size = req.size;

        let explore = self.sampler.next_bounded(EXPLORE_INVERSE_PROBABILITY) == 0;
        if explore && self.explorer_budget > 0 && self.num_reconfigurations < 50 {
            tag.explorer = true;
            self.explorer_budget -= tag.size as i64;
        } else {
            tag.explorer = false;
        }
        self.tags[idx] = tag;

        if insert && !explore {
            let density = self.density(tag);
            if density < self.ewma_victim_hit_density {
                let ring_len = self.recently_admitted.len();
                self.recently_admitted[self.recently_admitted_head % ring_len] = Some(id);
                self.recently_admitted_head = self.recently_admitted_head.wrapping_add(1);
            }
        }

        self.timestamp += 1;
        self.next_reconfiguration -= 1;
        if self.next_reconfiguration == 0 {
            self.reconfigure(ctx);
            self.next_reconfiguration = ACCS_PER_RECONFIGURATION;
            self.num_reconfigurations += 1;
        }

        Ok(())
    }

    fn replaced(&mut self, id: Candidate) -> Result<(), CacheError> {
        let idx = *self
            .indices
            .get(&id)
            .ok_or(CacheError::IndexMismatch("replaced: candidate not tracked"))?;

        let tag = self.tags[idx];
        let age = self.coarsened_age(tag);
        let class = Self::class_index(tag);
        self.classes[class].evictions[age as usize] += 1.0;
        if tag.explorer {
            self.explorer_budget += tag.size as i64;
        }

        self.indices.remove(&id);
        self.tags.swap_remove(idx);
        if idx < self.tags.len() {
            let moved_id = self.tags[idx].id;
            self.indices.insert(moved_id, idx);
        }

        Ok(())
    }

    fn to_evict(&mut self, req_id: Candidate, req_size: u32, victims: &[Candidate]) -> bool {
        if victims.is_empty() {
            return true;
        }

        let mut weighted_density = 0.0f32;
        let mut total_size = 0.0f32;
        for &v in victims {
            if let Some(&idx) = self.indices.get(&v) {
                let tag = self.tags[idx];
                let d = self.density(tag);
                weighted_density += d * tag.size as f32;
                total_size += tag.size as f32;
            }
        }
        if total_size <= 0.0 {
            return true;
        }
        let victim_density = weighted_density / total_size;

        let app_class = req_id.app_class(APP_CLASSES);
        // A brand new object starts at age 0 in the highest hit-age class
        // (see `hit_age_class`'s `age == 0` special case).
        let class = (app_class * HIT_AGE_CLASSES + (HIT_AGE_CLASSES - 1)) as usize;
        let newcomer_density = self.classes[class].hit_densities[0] / req_size.max(1) as f32;

        victim_density < newcomer_density
    }

    fn num_cached_objects(&self) -> usize {
        self.tags.len()
    }
}
