use proptest::prelude::*;

use lhdsim::{AdmissionPolicy, Cache, LhdPolicy, Policy, Request};

const CAPACITY: u64 = 2000;

fn arb_requests() -> impl Strategy<Value = Vec<(i32, i64, u32)>> {
    prop::collection::vec((0i32..4, 0i64..40, 1u32..200), 1..400)
}

fn run(admission: AdmissionPolicy, seed: u64, reqs: &[(i32, i64, u32)]) -> Cache<LhdPolicy> {
    let policy = LhdPolicy::new(8, 8, CAPACITY, seed);
    let mut cache = Cache::new(CAPACITY, 8, admission, 0, policy);
    for &(app, obj, size) in reqs {
        cache.access(&Request::get(app, obj, size)).unwrap();
    }
    cache
}

proptest! {
    #[test]
    fn capacity_invariant_holds(reqs in arb_requests()) {
        let cache = run(AdmissionPolicy::Baseline, 1, &reqs);
        prop_assert!(cache.consumed_capacity() <= cache.available_capacity());
        prop_assert_eq!(cache.total_size(), cache.consumed_capacity());
    }

    #[test]
    fn size_map_matches_policy_tag_count(reqs in arb_requests()) {
        let cache = run(AdmissionPolicy::Baseline, 1, &reqs);
        prop_assert_eq!(cache.num_tracked(), cache.policy().num_cached_objects());
    }

    #[test]
    fn access_counters_are_consistent(reqs in arb_requests()) {
        let cache = run(AdmissionPolicy::Baseline, 1, &reqs);
        let s = cache.stats();
        prop_assert_eq!(s.hits + s.misses, s.accesses);
        prop_assert!(s.compulsory_misses <= s.misses);
        prop_assert!(s.fills + s.misses_triggering_evictions <= s.misses);
    }

    #[test]
    fn cost_benefit_variant_also_respects_capacity(reqs in arb_requests()) {
        let cache = run(AdmissionPolicy::CostBenefit, 1, &reqs);
        prop_assert!(cache.consumed_capacity() <= cache.available_capacity());
        prop_assert_eq!(cache.total_size(), cache.consumed_capacity());
    }

    #[test]
    fn determinism_given_seed(reqs in arb_requests()) {
        let a = run(AdmissionPolicy::Baseline, 42, &reqs);
        let b = run(AdmissionPolicy::Baseline, 42, &reqs);
        prop_assert_eq!(a.stats().hits, b.stats().hits);
        prop_assert_eq!(a.stats().misses, b.stats().misses);
        prop_assert_eq!(a.stats().evictions, b.stats().evictions);
        prop_assert_eq!(a.consumed_capacity(), b.consumed_capacity());
    }
}

#[test]
fn compulsory_miss_counted_at_most_once_per_key() {
    let policy = LhdPolicy::new(8, 8, CAPACITY, 3);
    let mut cache = Cache::new(CAPACITY, 8, AdmissionPolicy::Baseline, 0, policy);
    for _ in 0..5 {
        cache.access(&Request::get(1, 1, 10)).unwrap();
    }
    assert_eq!(cache.stats().compulsory_misses, 1);
}

#[test]
fn idempotent_warmup_replay_is_non_decreasing() {
    let trace: Vec<(i32, i64, u32)> =
        (0..200).map(|i| (i % 3, i % 25, 10 + (i as u32 % 30))).collect();

    let policy = LhdPolicy::new(8, 8, CAPACITY, 9);
    let mut cache = Cache::new(CAPACITY, 8, AdmissionPolicy::Baseline, 0, policy);

    for &(app, obj, size) in &trace {
        cache.access(&Request::get(app, obj, size)).unwrap();
    }
    let hits_first_pass = cache.stats().hits;
    let accesses_first_pass = cache.stats().accesses;

    for &(app, obj, size) in &trace {
        cache.access(&Request::get(app, obj, size)).unwrap();
    }
    assert!(cache.stats().accesses >= accesses_first_pass);
    assert!(cache.stats().hits >= hits_first_pass);
}
