use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::ActorId;
use crate::config::RateLimitConfig;

const SHARDS: usize = 16;

/// Admission verdict. Rejections and bans are expected steady-state
/// outcomes, not errors; both carry the metadata the front-end needs to
/// tell the actor when to come back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Rejected { retry_after: Duration },
    Banned { until: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Browse,
    Like,
    Pass,
    Withdraw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GovernorStats {
    pub recent_actions: u32,
    pub strikes: u32,
    pub banned: bool,
}

#[derive(Debug, Clone, Copy)]
struct ActorState {
    window_start: Instant,
    count: u32,
    strikes: u32,
    first_strike: Option<Instant>,
    banned_until: Option<Instant>,
}

impl ActorState {
    fn clear(now: Instant) -> Self {
        Self {
            window_start: now,
            count: 0,
            strikes: 0,
            first_strike: None,
            banned_until: None,
        }
    }
}

/// Sliding-window admission control, sharded by actor id so unrelated
/// actors never contend on one lock. Purely in-memory: rate state is
/// rebuilt from scratch on restart.
pub struct RateGovernor {
    cfg: RateLimitConfig,
    shards: [Mutex<HashMap<ActorId, ActorState>>; SHARDS],
}

impl RateGovernor {
    pub fn new(cfg: RateLimitConfig) -> Self {
        Self {
            cfg,
            shards: std::array::from_fn(|_| Mutex::new(HashMap::new())),
        }
    }

    /// Decides whether `actor` may perform one more action. Admitted
    /// actions are charged immediately, so an attempt that later times out
    /// downstream has already consumed its quota unit.
    ///
    /// Per actor: Clear, then `Rejected` once the window capacity is spent,
    /// then `Banned` after `strike_threshold` violations inside the strike
    /// period. A served ban resets the actor to Clear.
    pub fn admit(&self, actor: ActorId, kind: ActionKind) -> Admission {
        let now = Instant::now();
        let mut shard = self.shard(actor).lock().unwrap();
        let state = shard.entry(actor).or_insert_with(|| ActorState::clear(now));

        if let Some(until) = state.banned_until {
            if now < until {
                return Admission::Banned { until };
            }
            *state = ActorState::clear(now);
        }

        if now.duration_since(state.window_start) >= self.window() {
            state.window_start = now;
            state.count = 0;
        }
        if let Some(first) = state.first_strike {
            if now.duration_since(first) >= self.strike_period() {
                state.strikes = 0;
                state.first_strike = None;
            }
        }

        if state.count < self.cfg.max_actions {
            state.count += 1;
            return Admission::Allowed;
        }

        state.strikes += 1;
        state.first_strike.get_or_insert(now);

        if state.strikes >= self.cfg.strike_threshold {
            let until = now + self.ban();
            state.banned_until = Some(until);
            warn!(actor, ?kind, strikes = state.strikes, "actor banned for repeated rate violations");
            return Admission::Banned { until };
        }

        let retry_after = self.window() - now.duration_since(state.window_start);
        debug!(actor, ?kind, "action rejected by rate governor");
        Admission::Rejected { retry_after }
    }

    /// Admin override: forget everything about an actor.
    pub fn reset(&self, actor: ActorId) {
        self.shard(actor).lock().unwrap().remove(&actor);
    }

    /// Drops entries whose ban has expired and whose windows have gone
    /// stale. Called by the maintenance scheduler; returns how many actors
    /// were forgotten.
    pub fn prune_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;
        for shard in &self.shards {
            let mut map = shard.lock().unwrap();
            let before = map.len();
            map.retain(|_, state| {
                if let Some(until) = state.banned_until {
                    return now < until;
                }
                now.duration_since(state.window_start) < self.window()
                    || state
                        .first_strike
                        .is_some_and(|first| now.duration_since(first) < self.strike_period())
            });
            removed += before - map.len();
        }
        removed
    }

    pub fn snapshot(&self, actor: ActorId) -> GovernorStats {
        let now = Instant::now();
        let shard = self.shard(actor).lock().unwrap();
        let Some(state) = shard.get(&actor) else {
            return GovernorStats::default();
        };
        GovernorStats {
            recent_actions: if now.duration_since(state.window_start) < self.window() {
                state.count
            } else {
                0
            },
            strikes: state.strikes,
            banned: state.banned_until.is_some_and(|until| now < until),
        }
    }

    pub fn tracked_actors(&self) -> usize {
        self.shards.iter().map(|s| s.lock().unwrap().len()).sum()
    }

    fn shard(&self, actor: ActorId) -> &Mutex<HashMap<ActorId, ActorState>> {
        &self.shards[actor.unsigned_abs() as usize % SHARDS]
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.cfg.window_secs)
    }

    fn strike_period(&self) -> Duration {
        Duration::from_secs(self.cfg.strike_period_secs)
    }

    fn ban(&self) -> Duration {
        Duration::from_secs(self.cfg.ban_secs)
    }
}
