use serde::Serialize;

use crate::ActorId;

/// Emitted after a match row is committed. Pair is in canonical order
/// (lower id first). Delivery is fire-and-forget; a dropped event never
/// rolls back the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MatchedEvent {
    pub actor_a: ActorId,
    pub actor_b: ActorId,
    pub at: i64,
}
