//! Ragdoll lifecycle errors
//!
//! Only construction can fail; authored-content problems are recovered at
//! parse time and never reach the caller.

use crate::description::ModelId;

/// Errors surfaced by ragdoll construction
#[derive(Debug, thiserror::Error)]
pub enum RagdollError {
    #[error("ragdoll has {count} solids, limit is {max}")]
    TooManyElements { count: usize, max: usize },

    #[error("no collision data parsed for model {model}")]
    MissingCollisionData { model: ModelId },
}

/// Result alias for ragdoll operations
pub type RagdollResult<T> = Result<T, RagdollError>;
