pub mod error;
pub mod problem;

pub use error::{
    FailureClassifier, FailureKind, ParseFailure, PoolError, ProviderFailure, Result, ResultExt,
};
pub use problem::{AllocationKey, Difficulty, GenerationRequest, PoolStats, ProblemRecord};
