use thiserror::Error;

use crate::ActorId;

pub type CoreResult<T> = Result<T, CoreError>;

/// Caller mistakes are their own variants; anything wrong with the store
/// itself surfaces as `StoreUnavailable`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("an actor cannot express interest in itself")]
    SelfInterest,

    #[error("actor {0} must register a profile first")]
    ProfileRequired(ActorId),

    #[error("profile {0} not found")]
    ProfileNotFound(ActorId),

    #[error("pair is already matched; matches are permanent")]
    AlreadyMatched,

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),
}
