pub mod lhd;

use crate::candidate::Candidate;
use crate::error::CacheError;
use crate::request::Request;

/// Read-only facts about the owning cache that a policy's `update` pass may
/// need (for LHD, to adapt its age-coarsening shift).
///
/// A back-reference from policy to owning cache would mean either shared
/// ownership (`Rc<RefCell<_>>`) or a raw pointer, both overkill for three
/// scalars read once per access. This struct is built by the engine and
/// passed in instead.
#[derive(Debug, Clone, Copy)]
pub struct PolicyContext {
    pub consumed_capacity: u64,
    pub available_capacity: u64,
    pub num_objects: usize,
}

/// The interface the cache engine drives a replacement policy through.
///
/// `rank`, `update` and `replaced` are called a bounded, small number of times
/// per access, so dynamic dispatch is unnecessary; the engine is generic over
/// `P: Policy` instead.
pub trait Policy {
    /// Nominate a victim from the live population (plus, for LHD, the
    /// recently-admitted ring). The returned candidate must currently be
    /// tracked by the policy.
    fn rank(&mut self, req: &Request) -> Result<Candidate, CacheError>;

    /// Register a touch (existing key) or insertion (new key), refreshing
    /// whatever per-object state the policy keeps.
    fn update(&mut self, id: Candidate, req: &Request, ctx: PolicyContext) -> Result<(), CacheError>;

    /// Notify the policy that `id` has just been evicted from the cache.
    fn replaced(&mut self, id: Candidate) -> Result<(), CacheError>;

    /// Cost/benefit admission gate used only by the `CostBenefit` eviction
    /// variant: is this victim set worth evicting to admit `req_id`? The
    /// default accepts every proposed set, which is exactly the baseline
    /// variant's behavior (no gate).
    fn to_evict(&mut self, _req_id: Candidate, _req_size: u32, _victims: &[Candidate]) -> bool {
        true
    }

    /// Number of objects the policy currently tracks. Used as a diagnostic
    /// cross-check against the cache's own size map.
    fn num_cached_objects(&self) -> usize;
}
