use crate::candidate::Candidate;

/// Fatal errors raised by the cache engine or the policy it drives.
///
/// None of these are recoverable: per the design, a malformed trace or a
/// broken invariant is a programmer error in the caller or the policy, not
/// a condition the simulator should try to paper over.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("request size {size} is not less than available capacity {capacity}")]
    OversizeRequest { size: u32, capacity: u64 },

    #[error("request size must be greater than zero")]
    ZeroSizeRequest,

    #[error("victim {0:?} nominated by the policy is not present in the size map")]
    VictimNotCached(Candidate),

    #[error("consumed capacity {consumed} exceeds available capacity {available}")]
    CapacityExceeded { consumed: u64, available: u64 },

    #[error("policy index/tag table mismatch: {0}")]
    IndexMismatch(&'static str),

    #[error(
        "cost/benefit admission could not assemble a victim set large enough \
         to admit the request"
    )]
    VictimSetExhausted,

    #[error("a first-time access to {0:?} was classified as a hit")]
    CompulsoryMissViolation(Candidate),
}

/// Errors raised while validating a [`crate::config::Config`].
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("available_capacity must be greater than zero")]
    ZeroCapacity,

    #[error("associativity must be greater than zero")]
    ZeroAssociativity,

    #[error("admission_samples must be greater than zero")]
    ZeroAdmissionSamples,
}
