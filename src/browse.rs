use rand::seq::IndexedRandom;
use serde::Deserialize;
use tracing::debug;

use crate::ActorId;
use crate::error::{CoreError, CoreResult};
use crate::store::{Profile, Store};

/// Optional predicate supplied by the front-end. Department matching is a
/// substring match, case-sensitive as stored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrowseFilter {
    pub age_min: Option<i64>,
    pub age_max: Option<i64>,
    pub department: Option<String>,
}

/// Draws one profile uniformly at random from the actor's eligible pool:
/// not the actor itself, not disabled, not already liked or passed, not
/// blocked in either direction, and matching the filter when supplied.
/// Returns `Ok(None)` when the pool is empty.
pub async fn select_candidate(
    store: &Store,
    actor: ActorId,
    filter: Option<&BrowseFilter>,
) -> CoreResult<Option<Profile>> {
    if !store.profile_exists(actor).await? {
        return Err(CoreError::ProfileRequired(actor));
    }

    let f = filter.cloned().unwrap_or_default();
    let eligible: Vec<(ActorId,)> = sqlx::query_as(
        "SELECT p.actor_id FROM profiles p
         WHERE p.actor_id != ? AND p.disabled = 0
         AND NOT EXISTS (SELECT 1 FROM interests i WHERE i.from_actor=? AND i.to_actor=p.actor_id)
         AND NOT EXISTS (SELECT 1 FROM passes s WHERE s.from_actor=? AND s.to_actor=p.actor_id)
         AND NOT EXISTS (SELECT 1 FROM blocks b
             WHERE (b.blocker=? AND b.blocked=p.actor_id) OR (b.blocker=p.actor_id AND b.blocked=?))
         AND p.age >= COALESCE(?, p.age) AND p.age <= COALESCE(?, p.age)
         AND (? IS NULL OR p.department LIKE '%' || ? || '%')",
    )
    .bind(actor)
    .bind(actor)
    .bind(actor)
    .bind(actor)
    .bind(actor)
    .bind(f.age_min)
    .bind(f.age_max)
    .bind(&f.department)
    .bind(&f.department)
    .fetch_all(store.pool())
    .await?;

    let Some((chosen,)) = eligible.choose(&mut rand::rng()) else {
        debug!(actor, "no eligible candidates");
        return Ok(None);
    };

    store.profile(*chosen).await
}
