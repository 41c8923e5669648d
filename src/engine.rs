use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::ActorId;
use crate::error::{CoreError, CoreResult};
use crate::events::MatchedEvent;
use crate::store::{Store, now_ts};

/// Outcome of `express_interest`. `Matched` means a reciprocal interest
/// exists; it is reported on every call that observes the pair, not only
/// the one that created the match row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterestOutcome {
    Recorded,
    Matched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ActorStats {
    pub interests_given: i64,
    pub interests_received: i64,
    pub matches: i64,
    pub profile_views: i64,
}

pub fn canonical_pair(a: ActorId, b: ActorId) -> (ActorId, ActorId) {
    if a < b { (a, b) } else { (b, a) }
}

/// The transactional like/match state machine. Holds a store handle and
/// the broadcast side of the match-notification channel.
#[derive(Clone)]
pub struct Engine {
    store: Store,
    events: broadcast::Sender<MatchedEvent>,
}

impl Engine {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            events: broadcast::channel(64).0,
        }
    }

    /// Receiver end for the notification collaborator.
    pub fn subscribe(&self) -> broadcast::Receiver<MatchedEvent> {
        self.events.subscribe()
    }

    /// Records `from`'s interest in `to`, confirming a match when the
    /// reciprocal interest already exists. Idempotent: repeating the call
    /// changes nothing and reports the same outcome.
    ///
    /// Interest insert, reciprocal check and match insert run in one
    /// transaction. SQLite admits a single writer at a time, so whichever
    /// of two symmetric calls commits second sees the other's row; the
    /// canonical primary key on `matches` backstops the pair even if the
    /// check ran against a stale snapshot. A busy abort is retried once,
    /// then degraded to `Recorded` and the symmetric caller's commit is
    /// trusted to confirm the match.
    pub async fn express_interest(
        &self,
        from: ActorId,
        to: ActorId,
    ) -> CoreResult<InterestOutcome> {
        if from == to {
            return Err(CoreError::SelfInterest);
        }
        if !self.store.profile_exists(to).await? {
            return Err(CoreError::ProfileNotFound(to));
        }

        let mut retried = false;
        loop {
            match self.try_express(from, to).await {
                Ok((outcome, created)) => {
                    if outcome == InterestOutcome::Matched && created {
                        let (a, b) = canonical_pair(from, to);
                        info!(actor_a = a, actor_b = b, "match confirmed");
                        let _ = self.events.send(MatchedEvent {
                            actor_a: a,
                            actor_b: b,
                            at: now_ts(),
                        });
                    }
                    return Ok(outcome);
                }
                Err(e) if is_write_conflict(&e) && !retried => {
                    debug!(from, to, "interest transaction conflicted, retrying");
                    retried = true;
                }
                Err(e) if is_write_conflict(&e) => {
                    warn!(from, to, "interest transaction conflicted twice");
                    return Ok(InterestOutcome::Recorded);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn try_express(
        &self,
        from: ActorId,
        to: ActorId,
    ) -> Result<(InterestOutcome, bool), sqlx::Error> {
        let mut tx = self.store.pool().begin().await?;

        sqlx::query("INSERT OR IGNORE INTO interests (from_actor,to_actor,created_at) VALUES (?,?,?)")
            .bind(from)
            .bind(to)
            .bind(now_ts())
            .execute(&mut *tx)
            .await?;

        let reciprocal =
            sqlx::query_as::<_, ()>("SELECT 1 FROM interests WHERE from_actor=? AND to_actor=?")
                .bind(to)
                .bind(from)
                .fetch_optional(&mut *tx)
                .await?
                .is_some();

        let mut created = false;
        let outcome = if reciprocal {
            let (a, b) = canonical_pair(from, to);
            let result =
                sqlx::query("INSERT OR IGNORE INTO matches (actor_a,actor_b,created_at) VALUES (?,?,?)")
                    .bind(a)
                    .bind(b)
                    .bind(now_ts())
                    .execute(&mut *tx)
                    .await?;
            created = result.rows_affected() > 0;
            InterestOutcome::Matched
        } else {
            InterestOutcome::Recorded
        };

        tx.commit().await?;
        Ok((outcome, created))
    }

    /// Removes `from`'s interest in `to` unless the pair already matched.
    /// The delete is guarded in a single statement, so a concurrent match
    /// confirmation cannot slip between check and delete. Withdrawing a
    /// nonexistent interest is a no-op.
    pub async fn withdraw(&self, from: ActorId, to: ActorId) -> CoreResult<()> {
        let (a, b) = canonical_pair(from, to);
        let affected = sqlx::query(
            "DELETE FROM interests WHERE from_actor=? AND to_actor=?
             AND NOT EXISTS (SELECT 1 FROM matches WHERE actor_a=? AND actor_b=?)",
        )
        .bind(from)
        .bind(to)
        .bind(a)
        .bind(b)
        .execute(self.store.pool())
        .await?
        .rows_affected();

        if affected == 0 {
            let matched =
                sqlx::query_as::<_, ()>("SELECT 1 FROM matches WHERE actor_a=? AND actor_b=?")
                    .bind(a)
                    .bind(b)
                    .fetch_optional(self.store.pool())
                    .await?
                    .is_some();
            if matched {
                return Err(CoreError::AlreadyMatched);
            }
        } else {
            debug!(from, to, "interest withdrawn");
        }
        Ok(())
    }

    /// Skip bookkeeping for browse. A pass keeps the profile out of
    /// `from`'s browse pool but never participates in match detection.
    pub async fn pass(&self, from: ActorId, to: ActorId) -> CoreResult<()> {
        if from == to {
            return Err(CoreError::SelfInterest);
        }
        sqlx::query("INSERT OR IGNORE INTO passes (from_actor,to_actor,created_at) VALUES (?,?,?)")
            .bind(from)
            .bind(to)
            .bind(now_ts())
            .execute(self.store.pool())
            .await?;
        Ok(())
    }

    /// Counterpart ids of every confirmed match, oldest first.
    pub async fn query_mutual(&self, actor: ActorId) -> CoreResult<Vec<ActorId>> {
        let rows: Vec<(ActorId,)> = sqlx::query_as(
            "SELECT CASE WHEN actor_a=? THEN actor_b ELSE actor_a END
             FROM matches WHERE actor_a=? OR actor_b=? ORDER BY created_at",
        )
        .bind(actor)
        .bind(actor)
        .bind(actor)
        .fetch_all(self.store.pool())
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Actors who expressed interest in `actor` without a reciprocal
    /// interest yet.
    pub async fn admirers(&self, actor: ActorId) -> CoreResult<Vec<ActorId>> {
        let rows: Vec<(ActorId,)> = sqlx::query_as(
            "SELECT i.from_actor FROM interests i
             WHERE i.to_actor=?
             AND NOT EXISTS (SELECT 1 FROM interests r WHERE r.from_actor=? AND r.to_actor=i.from_actor)
             ORDER BY i.created_at",
        )
        .bind(actor)
        .bind(actor)
        .fetch_all(self.store.pool())
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Hides `target` from `actor`'s browse pool and vice versa.
    pub async fn block(&self, actor: ActorId, target: ActorId) -> CoreResult<()> {
        if actor == target {
            return Err(CoreError::SelfInterest);
        }
        sqlx::query("INSERT OR IGNORE INTO blocks (blocker,blocked,created_at) VALUES (?,?,?)")
            .bind(actor)
            .bind(target)
            .bind(now_ts())
            .execute(self.store.pool())
            .await?;
        info!(actor, target, "actor blocked");
        Ok(())
    }

    pub async fn report(
        &self,
        reporter: ActorId,
        reported: ActorId,
        reason: Option<&str>,
    ) -> CoreResult<()> {
        sqlx::query("INSERT OR IGNORE INTO reports (reporter,reported,reason,created_at) VALUES (?,?,?,?)")
            .bind(reporter)
            .bind(reported)
            .bind(reason)
            .bind(now_ts())
            .execute(self.store.pool())
            .await?;
        warn!(reporter, reported, reason, "actor reported");
        Ok(())
    }

    /// Read accessors for the front-end's statistics view. Profile views
    /// count every evaluation of the actor's profile, i.e. interests and
    /// passes pointing at it.
    pub async fn stats(&self, actor: ActorId) -> CoreResult<ActorStats> {
        let pool = self.store.pool();
        let interests_given: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM interests WHERE from_actor=?")
                .bind(actor)
                .fetch_one(pool)
                .await?;
        let interests_received: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM interests WHERE to_actor=?")
                .bind(actor)
                .fetch_one(pool)
                .await?;
        let matches: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM matches WHERE actor_a=? OR actor_b=?")
                .bind(actor)
                .bind(actor)
                .fetch_one(pool)
                .await?;
        let passes_received: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM passes WHERE to_actor=?")
                .bind(actor)
                .fetch_one(pool)
                .await?;

        Ok(ActorStats {
            interests_given,
            interests_received,
            matches,
            profile_views: interests_received + passes_received,
        })
    }
}

/// SQLITE_BUSY / SQLITE_LOCKED family: another writer held the database
/// past the busy timeout.
fn is_write_conflict(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => {
            matches!(db.code().as_deref(), Some("5") | Some("6") | Some("517"))
        }
        _ => false,
    }
}
